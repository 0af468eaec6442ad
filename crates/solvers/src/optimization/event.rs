use tether_core::Responses;

use crate::derivative::{self, Jacobian};

/// Events emitted by the optimization driver, one per proposal.
#[derive(Debug)]
pub enum Event<'a> {
    /// The proposal and its Jacobian were evaluated.
    Evaluated {
        /// One-based proposal count.
        iter: usize,

        /// The evaluated design, after clipping into bounds.
        design: &'a [f64],

        responses: &'a Responses,

        jacobian: &'a Jacobian,
    },

    /// The proposal could not be evaluated.
    Failed {
        iter: usize,

        design: &'a [f64],

        error: &'a derivative::Error,
    },
}

impl Event<'_> {
    #[must_use]
    pub fn iter(&self) -> usize {
        match self {
            Self::Evaluated { iter, .. } | Self::Failed { iter, .. } => *iter,
        }
    }

    /// Returns the design that was evaluated (or attempted).
    #[must_use]
    pub fn design(&self) -> &[f64] {
        match self {
            Self::Evaluated { design, .. } | Self::Failed { design, .. } => design,
        }
    }
}
