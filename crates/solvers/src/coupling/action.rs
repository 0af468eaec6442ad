/// Actions an observer can take during a coupling solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop the solve and return [`Error::Aborted`](super::Error::Aborted).
    ///
    /// A partially converged state is never returned.
    Abort,
}
