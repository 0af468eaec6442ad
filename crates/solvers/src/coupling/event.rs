use tether_core::AnalysisState;

/// Emitted after each sweep of a feedback cycle.
#[derive(Debug)]
pub struct Event<'a> {
    /// Position of the cycle in the evaluation plan.
    pub stage: usize,

    /// Sweep number within the cycle, starting at 1.
    pub iter: usize,

    /// Largest absolute change of any coupling variable during the sweep.
    pub residual: f64,

    /// `residual` relative to the largest coupling variable magnitude.
    pub relative_residual: f64,

    /// The state after the sweep.
    pub state: &'a AnalysisState,
}
