use std::fmt;

/// A real-valued scalar or fixed-length vector quantity.
///
/// The length of a vector value is fixed by the variable that declares it.
/// Solvers overwrite values in place but never change their shape.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl Value {
    /// Returns the number of elements (1 for a scalar).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(_) => 1,
            Self::Vector(v) => v.len(),
        }
    }

    /// Returns `true` for an empty vector.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the elements as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        match self {
            Self::Scalar(v) => std::slice::from_ref(v),
            Self::Vector(v) => v,
        }
    }

    /// Returns the elements as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        match self {
            Self::Scalar(v) => std::slice::from_mut(v),
            Self::Vector(v) => v,
        }
    }

    /// Returns the scalar, or the only element of a length-one vector.
    #[must_use]
    pub fn as_scalar(&self) -> Option<f64> {
        match self.as_slice() {
            [v] => Some(*v),
            _ => None,
        }
    }

    /// Returns the element at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<f64> {
        self.as_slice().get(index).copied()
    }

    /// Returns `true` if every element is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.as_slice().iter().all(|v| v.is_finite())
    }

    /// Returns a value with the same shape holding `elements`.
    ///
    /// # Panics
    ///
    /// Panics if `elements` does not match this value's length.
    #[must_use]
    pub fn with_elements(&self, elements: &[f64]) -> Self {
        assert_eq!(self.len(), elements.len(), "value shape mismatch");
        match self {
            Self::Scalar(_) => Self::Scalar(elements[0]),
            Self::Vector(_) => Self::Vector(elements.to_vec()),
        }
    }

    /// Largest absolute elementwise difference to `other`.
    ///
    /// Values of different shape are infinitely far apart.
    #[must_use]
    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        if self.len() != other.len() {
            return f64::INFINITY;
        }
        self.as_slice()
            .iter()
            .zip(other.as_slice())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    /// Largest absolute element.
    #[must_use]
    pub fn max_abs(&self) -> f64 {
        self.as_slice().iter().map(|v| v.abs()).fold(0.0, f64::max)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Scalar(value)
    }
}

impl From<Vec<f64>> for Value {
    fn from(value: Vec<f64>) -> Self {
        Self::Vector(value)
    }
}

impl<const N: usize> From<[f64; N]> for Value {
    fn from(value: [f64; N]) -> Self {
        Self::Vector(value.to_vec())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(v) => write!(f, "{v}"),
            Self::Vector(v) => write!(f, "{v:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_and_vector_shapes() {
        let s = Value::from(2.0);
        let v = Value::from([1.0, -3.0]);

        assert_eq!(s.len(), 1);
        assert_eq!(s.as_scalar(), Some(2.0));
        assert_eq!(v.len(), 2);
        assert_eq!(v.as_scalar(), None);
        assert_eq!(v.get(1), Some(-3.0));
        assert_eq!(v.max_abs(), 3.0);
    }

    #[test]
    fn diff_of_mismatched_shapes_is_infinite() {
        let a = Value::from([1.0, 2.0]);
        let b = Value::from(1.0);
        assert!(a.max_abs_diff(&b).is_infinite());
        assert_eq!(a.max_abs_diff(&Value::from([1.5, 1.0])), 1.0);
    }

    #[test]
    fn with_elements_keeps_shape() {
        let v = Value::from(vec![0.0, 0.0]);
        assert_eq!(v.with_elements(&[4.0, 5.0]), Value::from([4.0, 5.0]));
        assert_eq!(Value::Scalar(0.0).with_elements(&[7.0]), Value::Scalar(7.0));
    }
}
