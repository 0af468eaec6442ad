/// Actions an observer can take during an optimization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Stop the run and return the last evaluated design.
    StopEarly,
}
