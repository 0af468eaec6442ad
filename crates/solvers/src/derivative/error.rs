use thiserror::Error;

use crate::EvalError;

/// Errors that can occur when approximating a Jacobian.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// The unperturbed design could not be evaluated.
    #[error("base evaluation failed")]
    Base(#[source] EvalError),

    /// A perturbed evaluation failed and the failure policy gave up.
    ///
    /// The Jacobian column for this element is undefined.
    #[error("perturbation of design element {column} ({label}) failed")]
    Perturbation {
        column: usize,
        label: String,
        #[source]
        source: EvalError,
    },
}
