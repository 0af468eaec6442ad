use tether_core::{AnalysisState, Responses};

use crate::derivative;

/// How an optimization run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Status {
    /// The optimizer reached optimality at a feasible design.
    Optimal,

    /// The run ended without reaching a feasible design.
    Infeasible,

    /// The optimizer, the iteration budget, or repeated evaluation failures
    /// ended the run.
    Failed,

    /// Stopped early due to an observer decision.
    StoppedByObserver,
}

/// The driver's state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum DriverState {
    /// Nothing has been evaluated yet.
    Initialized,

    /// Proposals are being evaluated.
    Evaluating,

    Converged,

    Failed,
}

/// A design and the objective it evaluated to.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    pub design: Vec<f64>,
    pub objective: f64,
}

/// The result of an optimization run.
///
/// `design`, `objective`, `responses` and `analysis` describe the last design
/// that evaluated successfully. They are `None` (and `design` is the clipped
/// initial design) when nothing did.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationResult {
    pub status: Status,

    /// Where the state machine stopped.
    pub state: DriverState,

    pub design: Vec<f64>,

    pub objective: Option<f64>,

    pub responses: Option<Responses>,

    /// The converged analysis state at `design`.
    pub analysis: Option<AnalysisState>,

    /// Number of proposals evaluated (or attempted).
    pub iters: usize,

    /// Number of pipeline evaluations, including finite-difference solves
    /// of every Jacobian that completed.
    pub evaluations: usize,

    /// The last evaluated design that was feasible within tolerance.
    pub last_feasible: Option<Point>,

    /// The most recent evaluation failure, if any.
    pub last_error: Option<derivative::Error>,
}

impl OptimizationResult {
    /// Returns the largest constraint violation at `design`, if it evaluated.
    #[must_use]
    pub fn max_violation(&self) -> Option<f64> {
        self.responses.as_ref().map(Responses::max_violation)
    }
}
