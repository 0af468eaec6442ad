use thiserror::Error;

use tether_core::{AnalysisState, Problem, ResponseError, Responses};

use crate::coupling;

/// The result of evaluating a problem at one design point.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub design: Vec<f64>,

    pub responses: Responses,

    /// The converged coupling solve the responses were computed from.
    pub solution: coupling::Solution,
}

impl Evaluation {
    /// Returns the converged analysis state.
    #[must_use]
    pub fn state(&self) -> &AnalysisState {
        &self.solution.state
    }
}

/// Errors that can occur when evaluating a problem at a design point.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    /// The coupling solve failed.
    #[error("coupling solve failed")]
    Coupling(#[source] coupling::Error),

    /// An objective or constraint could not be computed.
    #[error("response evaluation failed")]
    Response(#[source] ResponseError),
}

impl EvalError {
    /// Returns `true` for failures that depend on the evaluated point.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Coupling(error) => error.is_recoverable(),
            Self::Response(error) => matches!(error, ResponseError::NonFinite { .. }),
        }
    }
}

/// Evaluates a problem at `design`.
///
/// This solves the coupled analysis (warm-started from `guess` when given)
/// and then computes the objective and constraints from the converged state.
///
/// # Errors
///
/// Returns an error if the coupling solve or a response fails.
pub fn evaluate(
    problem: &Problem,
    design: &[f64],
    guess: Option<&AnalysisState>,
    config: &coupling::Config,
) -> Result<Evaluation, EvalError> {
    let solution = match guess {
        Some(guess) => coupling::solve_from_unobserved(problem, design, guess, config),
        None => coupling::solve_unobserved(problem, design, config),
    }
    .map_err(EvalError::Coupling)?;

    let responses = problem
        .responses()
        .evaluate(&solution.state)
        .map_err(EvalError::Response)?;

    Ok(Evaluation {
        design: design.to_vec(),
        responses,
        solution,
    })
}
