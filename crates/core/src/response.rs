use std::fmt;

use thiserror::Error;

use crate::{AnalysisState, StateError};

/// Errors that can occur when evaluating responses.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResponseError {
    #[error("response `{response}` reads undefined variable `{name}`")]
    UndefinedVariable { response: String, name: String },

    #[error("response `{response}` could not read its inputs")]
    Variable {
        response: String,
        #[source]
        source: StateError,
    },

    #[error("response `{response}` evaluated to {value}")]
    NonFinite { response: String, value: f64 },
}

type Expression = Box<dyn Fn(&AnalysisState) -> Result<f64, StateError> + Send + Sync>;

/// A named scalar expression over the analysis state.
///
/// `reads` declares the variables the expression uses. It is checked
/// against the assembled problem before any solving starts and again
/// against the state at every evaluation.
pub struct Response {
    name: String,
    reads: Vec<String>,
    expression: Expression,
}

impl Response {
    pub fn new<F>(name: impl Into<String>, reads: &[&str], expression: F) -> Self
    where
        F: Fn(&AnalysisState) -> Result<f64, StateError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            reads: reads.iter().map(|&read| read.to_owned()).collect(),
            expression: Box::new(expression),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn reads(&self) -> &[String] {
        &self.reads
    }

    /// Evaluates the expression against a converged state.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is missing or the result is not finite.
    pub fn evaluate(&self, state: &AnalysisState) -> Result<f64, ResponseError> {
        if let Some(name) = self.reads.iter().find(|name| !state.contains(name)) {
            return Err(ResponseError::UndefinedVariable {
                response: self.name.clone(),
                name: name.clone(),
            });
        }

        let value = (self.expression)(state).map_err(|source| match source {
            StateError::UndefinedVariable { name } => ResponseError::UndefinedVariable {
                response: self.name.clone(),
                name,
            },
            source => ResponseError::Variable {
                response: self.name.clone(),
                source,
            },
        })?;

        if value.is_finite() {
            Ok(value)
        } else {
            Err(ResponseError::NonFinite {
                response: self.name.clone(),
                value,
            })
        }
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("name", &self.name)
            .field("reads", &self.reads)
            .finish_non_exhaustive()
    }
}

/// The comparison a constraint response must satisfy.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Bound {
    /// `value <= bound`
    Upper(f64),

    /// `value >= bound`
    Lower(f64),

    /// `value == bound`
    Equal(f64),
}

impl Bound {
    /// Rewrites a constraint value so the constraint reads `c <= 0`, or
    /// `h == 0` for equalities.
    #[must_use]
    pub fn normalize(self, value: f64) -> f64 {
        match self {
            Self::Upper(bound) | Self::Equal(bound) => value - bound,
            Self::Lower(bound) => bound - value,
        }
    }

    /// Returns how far `value` is from satisfying the bound (0 when satisfied).
    #[must_use]
    pub fn violation(self, value: f64) -> f64 {
        let normalized = self.normalize(value);
        match self {
            Self::Equal(_) => normalized.abs(),
            Self::Upper(_) | Self::Lower(_) => normalized.max(0.0),
        }
    }

    #[must_use]
    pub fn is_equality(self) -> bool {
        matches!(self, Self::Equal(_))
    }
}

/// A response paired with the bound it must satisfy.
#[derive(Debug)]
pub struct Constraint {
    pub response: Response,
    pub bound: Bound,
}

impl Constraint {
    #[must_use]
    pub fn new(response: Response, bound: Bound) -> Self {
        Self { response, bound }
    }
}

/// The evaluated value of one constraint.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConstraintValue {
    pub name: String,
    pub value: f64,
    pub bound: Bound,
}

impl ConstraintValue {
    /// Returns how far this constraint is from being satisfied.
    #[must_use]
    pub fn violation(&self) -> f64 {
        self.bound.violation(self.value)
    }

    /// Returns the value in `c <= 0` (or `h == 0`) form.
    #[must_use]
    pub fn normalized(&self) -> f64 {
        self.bound.normalize(self.value)
    }
}

/// The objective and constraint values at one analysis state.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Responses {
    pub objective: f64,
    pub constraints: Vec<ConstraintValue>,
}

impl Responses {
    /// Returns a constraint by name.
    #[must_use]
    pub fn constraint(&self, name: &str) -> Option<&ConstraintValue> {
        self.constraints.iter().find(|c| c.name == name)
    }

    /// Returns the largest constraint violation (0 when all are satisfied).
    #[must_use]
    pub fn max_violation(&self) -> f64 {
        self.constraints
            .iter()
            .map(ConstraintValue::violation)
            .fold(0.0, f64::max)
    }

    #[must_use]
    pub fn is_feasible(&self, tol: f64) -> bool {
        self.max_violation() <= tol
    }

    /// Returns `[objective, constraints...]`, the row order of a Jacobian.
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        std::iter::once(self.objective)
            .chain(self.constraints.iter().map(|c| c.value))
            .collect()
    }
}

/// The objective and constraints of a problem.
#[derive(Debug)]
pub struct ResponseSet {
    objective: Response,
    constraints: Vec<Constraint>,
}

impl ResponseSet {
    #[must_use]
    pub fn new(objective: Response) -> Self {
        Self {
            objective,
            constraints: Vec::new(),
        }
    }

    /// Adds a constraint.
    #[must_use]
    pub fn constrain(mut self, response: Response, bound: Bound) -> Self {
        self.constraints.push(Constraint::new(response, bound));
        self
    }

    #[must_use]
    pub fn objective(&self) -> &Response {
        &self.objective
    }

    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Iterates over the objective and then every constraint response.
    pub fn responses(&self) -> impl Iterator<Item = &Response> {
        std::iter::once(&self.objective).chain(self.constraints.iter().map(|c| &c.response))
    }

    /// Evaluates the objective and every constraint.
    ///
    /// The state must already be converged; nothing is recomputed here.
    ///
    /// # Errors
    ///
    /// Returns the first response that fails to evaluate.
    pub fn evaluate(&self, state: &AnalysisState) -> Result<Responses, ResponseError> {
        let objective = self.objective.evaluate(state)?;
        let constraints = self
            .constraints
            .iter()
            .map(|c| {
                Ok(ConstraintValue {
                    name: c.response.name().to_owned(),
                    value: c.response.evaluate(state)?,
                    bound: c.bound,
                })
            })
            .collect::<Result<_, ResponseError>>()?;

        Ok(Responses {
            objective,
            constraints,
        })
    }
}
