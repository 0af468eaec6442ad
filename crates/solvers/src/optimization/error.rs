use tether_core::DesignError;
use thiserror::Error;

/// Errors that prevent an optimization run from starting.
///
/// Failures during the run are reported through
/// [`Status`](super::Status), not as errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error("invalid initial design")]
    InitialDesign(#[source] DesignError),
}
