use tether_core::AnalysisState;

/// A converged analysis state.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// The value of every variable in the problem.
    pub state: AnalysisState,

    /// Largest number of sweeps any stage needed (1 for acyclic problems).
    pub iters: usize,

    /// Largest final residual over all cycles (0 for acyclic problems).
    pub residual: f64,

    /// Total number of discipline evaluations.
    pub evaluations: usize,
}
