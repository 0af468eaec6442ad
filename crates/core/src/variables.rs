use std::collections::BTreeMap;

use thiserror::Error;

use crate::Value;

/// Errors that can occur when reading a variable.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StateError {
    #[error("undefined variable `{name}`")]
    UndefinedVariable { name: String },

    #[error("variable `{name}` has {len} elements, index {index} is out of range")]
    IndexOutOfRange {
        name: String,
        index: usize,
        len: usize,
    },

    #[error("variable `{name}` is not a scalar")]
    NotScalar { name: String },
}

/// A declared variable: its name and default value.
///
/// For a discipline input, the default is the constant used when the input
/// is neither a design variable nor fed by a connection. For an output, it
/// is the initial guess used by the coupling solver.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableSpec {
    pub name: String,
    pub default: Value,
}

impl VariableSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            default: default.into(),
        }
    }
}

/// A set of named values.
///
/// Used both for the inputs and outputs of a single discipline call and for
/// the full analysis state of a problem.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct Variables {
    values: BTreeMap<String, Value>,
}

/// The value of every variable in a problem after a coupling solve.
///
/// A converged state is handed out by value; callers own their copy.
pub type AnalysisState = Variables;

impl Variables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a variable, returning its previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.values.insert(name.into(), value.into())
    }

    /// Builder-style [`Variables::insert`].
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    /// Returns the value of a variable.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::UndefinedVariable`] if the variable is absent.
    pub fn get(&self, name: &str) -> Result<&Value, StateError> {
        self.values
            .get(name)
            .ok_or_else(|| StateError::UndefinedVariable {
                name: name.to_owned(),
            })
    }

    /// Returns a scalar variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is absent or has more than one element.
    pub fn scalar(&self, name: &str) -> Result<f64, StateError> {
        self.get(name)?.as_scalar().ok_or_else(|| StateError::NotScalar {
            name: name.to_owned(),
        })
    }

    /// Returns one element of a variable.
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is absent or `index` is out of range.
    pub fn element(&self, name: &str, index: usize) -> Result<f64, StateError> {
        let value = self.get(name)?;
        value.get(index).ok_or_else(|| StateError::IndexOutOfRange {
            name: name.to_owned(),
            index,
            len: value.len(),
        })
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over variables in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(name, value)| (name.as_str(), value))
    }
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for Variables {
    fn from_iter<T: IntoIterator<Item = (N, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        }
    }
}
