use thiserror::Error;

use tether_core::{DesignError, DisciplineError, StateError};

/// Errors that can occur during a coupling solve.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A feedback cycle did not converge within the sweep budget.
    ///
    /// This is recoverable: callers may retry from another initial guess or
    /// treat the design as infeasible.
    #[error("cycle {cycle:?} did not converge after {iters} sweeps (residual {residual:e})")]
    Convergence {
        cycle: Vec<String>,
        iters: usize,
        residual: f64,
    },

    #[error(transparent)]
    Discipline(#[from] DisciplineError),

    #[error("invalid design: {0}")]
    Design(#[from] DesignError),

    #[error("state error: {0}")]
    State(#[from] StateError),

    #[error("aborted by observer")]
    Aborted,
}

impl Error {
    /// Returns `true` for errors that depend on the evaluated point rather
    /// than on how the problem is assembled.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Convergence { .. } | Self::Discipline(_))
    }
}
