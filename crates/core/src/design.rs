use thiserror::Error;

use crate::{Value, Variables};

/// Errors that can occur when applying a design vector.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DesignError {
    #[error("design vector has {actual} elements, expected {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("design element {index} is not finite")]
    NonFinite { index: usize },

    #[error("design element {index} = {value} is outside [{lower}, {upper}]")]
    OutOfBounds {
        index: usize,
        value: f64,
        lower: f64,
        upper: f64,
    },
}

/// A variable the optimizer is allowed to set directly.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignVariable {
    pub name: String,
    pub default: Value,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl DesignVariable {
    /// Creates a design variable with the same bounds on every element.
    #[must_use]
    pub fn new(name: impl Into<String>, default: impl Into<Value>, lower: f64, upper: f64) -> Self {
        let default = default.into();
        let len = default.len();
        Self {
            name: name.into(),
            default,
            lower: vec![lower; len],
            upper: vec![upper; len],
        }
    }

    /// Creates a design variable with per-element bounds.
    #[must_use]
    pub fn with_bounds(
        name: impl Into<String>,
        default: impl Into<Value>,
        lower: Vec<f64>,
        upper: Vec<f64>,
    ) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
            lower,
            upper,
        }
    }
}

/// Elementwise lower and upper bounds on a flattened design vector.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: Vec<f64>,
    upper: Vec<f64>,
}

impl Bounds {
    /// Creates bounds from matching lower and upper vectors.
    ///
    /// # Panics
    ///
    /// Panics if the vectors differ in length.
    #[must_use]
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        assert_eq!(lower.len(), upper.len(), "bounds length mismatch");
        Self { lower, upper }
    }

    #[must_use]
    pub fn lower(&self) -> &[f64] {
        &self.lower
    }

    #[must_use]
    pub fn upper(&self) -> &[f64] {
        &self.upper
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lower.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Returns `x` with every element clamped into its bounds.
    ///
    /// Non-finite elements are replaced by the nearest finite bound.
    #[must_use]
    pub fn clip(&self, x: &[f64]) -> Vec<f64> {
        x.iter()
            .zip(self.lower.iter().zip(&self.upper))
            .map(|(&v, (&lo, &hi))| {
                if v.is_nan() {
                    if lo.is_finite() { lo } else { hi }
                } else {
                    v.clamp(lo, hi)
                }
            })
            .collect()
    }

    /// Checks that `x` has the right length and lies within the bounds.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn check(&self, x: &[f64]) -> Result<(), DesignError> {
        if x.len() != self.len() {
            return Err(DesignError::LengthMismatch {
                expected: self.len(),
                actual: x.len(),
            });
        }
        for (index, (&value, (&lower, &upper))) in
            x.iter().zip(self.lower.iter().zip(&self.upper)).enumerate()
        {
            if !value.is_finite() {
                return Err(DesignError::NonFinite { index });
            }
            if value < lower || value > upper {
                return Err(DesignError::OutOfBounds {
                    index,
                    value,
                    lower,
                    upper,
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, x: &[f64]) -> bool {
        self.check(x).is_ok()
    }
}

/// The ordered set of design variables of a problem.
///
/// The design vector seen by optimizers is the concatenation of every
/// design variable's elements, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignSpace {
    variables: Vec<DesignVariable>,
    bounds: Bounds,
}

impl DesignSpace {
    #[must_use]
    pub fn new(variables: Vec<DesignVariable>) -> Self {
        let lower = variables.iter().flat_map(|v| v.lower.iter().copied()).collect();
        let upper = variables.iter().flat_map(|v| v.upper.iter().copied()).collect();
        Self {
            variables,
            bounds: Bounds::new(lower, upper),
        }
    }

    #[must_use]
    pub fn variables(&self) -> &[DesignVariable] {
        &self.variables
    }

    #[must_use]
    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Returns the number of design elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bounds.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.variables.iter().any(|v| v.name == name)
    }

    /// Returns the flattened default design.
    #[must_use]
    pub fn initial(&self) -> Vec<f64> {
        self.variables
            .iter()
            .flat_map(|v| v.default.as_slice().iter().copied())
            .collect()
    }

    /// Returns a label for each design element, such as `x` or `z[1]`.
    #[must_use]
    pub fn labels(&self) -> Vec<String> {
        self.variables
            .iter()
            .flat_map(|v| match v.default {
                Value::Scalar(_) => vec![v.name.clone()],
                Value::Vector(ref elements) => (0..elements.len())
                    .map(|i| format!("{}[{i}]", v.name))
                    .collect(),
            })
            .collect()
    }

    /// Splits a design vector into named values.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` is the wrong length, not finite, or out of bounds.
    pub fn unflatten(&self, x: &[f64]) -> Result<Variables, DesignError> {
        self.bounds.check(x)?;

        let mut offset = 0;
        Ok(self
            .variables
            .iter()
            .map(|v| {
                let len = v.default.len();
                let value = v.default.with_elements(&x[offset..offset + len]);
                offset += len;
                (v.name.clone(), value)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sellar_space() -> DesignSpace {
        DesignSpace::new(vec![
            DesignVariable::new("x", 1.0, 0.0, 10.0),
            DesignVariable::new("z", [5.0, 2.0], 0.0, 10.0),
        ])
    }

    #[test]
    fn flattens_in_declaration_order() {
        let space = sellar_space();

        assert_eq!(space.len(), 3);
        assert_eq!(space.initial(), vec![1.0, 5.0, 2.0]);
        assert_eq!(space.labels(), vec!["x", "z[0]", "z[1]"]);

        let vars = space.unflatten(&[0.5, 1.0, 3.0]).unwrap();
        assert_eq!(vars.scalar("x"), Ok(0.5));
        assert_eq!(vars.get("z"), Ok(&Value::from([1.0, 3.0])));
    }

    #[test]
    fn rejects_bad_designs() {
        let space = sellar_space();

        assert_eq!(
            space.unflatten(&[1.0, 2.0]),
            Err(DesignError::LengthMismatch {
                expected: 3,
                actual: 2
            })
        );
        assert!(matches!(
            space.unflatten(&[1.0, 11.0, 2.0]),
            Err(DesignError::OutOfBounds { index: 1, .. })
        ));
        assert_eq!(
            space.unflatten(&[f64::NAN, 1.0, 2.0]),
            Err(DesignError::NonFinite { index: 0 })
        );
    }

    #[test]
    fn clip_clamps_into_bounds() {
        let bounds = sellar_space().bounds().clone();
        let clipped = bounds.clip(&[-1.0, 12.0, f64::NAN]);
        assert_eq!(clipped, vec![0.0, 10.0, 0.0]);
        assert!(bounds.contains(&clipped));
    }
}
