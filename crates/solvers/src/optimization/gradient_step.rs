//! A fixed-step steepest-descent optimizer.
//!
//! Each proposal moves against the objective gradient by `step` and is
//! projected into the design bounds. Constraints are ignored. The run is
//! optimal once the projected move is shorter than `tol` in the infinity
//! norm, which makes this a deterministic stand-in for a real optimizer when
//! testing drivers and problems.

use thiserror::Error;

use tether_core::Bounds;

use super::{Optimizer, Outcome, Step, Termination};

/// Errors that can occur when configuring a [`GradientStep`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("step must be finite and positive")]
    Step,

    #[error("tol must be finite and non-negative")]
    Tol,
}

#[derive(Debug, Clone)]
pub struct GradientStep {
    step: f64,
    tol: f64,
    bounds: Option<Bounds>,
}

impl Default for GradientStep {
    fn default() -> Self {
        // Known-good values, unwrap is safe
        Self::new(0.1, 1e-6).unwrap()
    }
}

impl GradientStep {
    /// Creates the optimizer with a fixed step length and stopping tolerance.
    ///
    /// # Errors
    ///
    /// Returns an error if `step` is not positive or `tol` is negative.
    pub fn new(step: f64, tol: f64) -> Result<Self, ConfigError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(ConfigError::Step);
        }
        if !tol.is_finite() || tol < 0.0 {
            return Err(ConfigError::Tol);
        }

        Ok(Self {
            step,
            tol,
            bounds: None,
        })
    }

    #[must_use]
    pub fn step_size(&self) -> f64 {
        self.step
    }

    #[must_use]
    pub fn tol(&self) -> f64 {
        self.tol
    }
}

impl Optimizer for GradientStep {
    fn start(&mut self, x0: &[f64], bounds: &Bounds) -> Vec<f64> {
        self.bounds = Some(bounds.clone());
        x0.to_vec()
    }

    fn step(&mut self, outcome: Outcome) -> Step {
        let (Outcome::Evaluated(point), Some(bounds)) = (outcome, &self.bounds) else {
            return Step::Finish(Termination::Stalled);
        };

        let next: Vec<f64> = point
            .x
            .iter()
            .zip(&point.gradient)
            .map(|(x, g)| x - self.step * g)
            .collect();
        let next = bounds.clip(&next);

        let moved = next
            .iter()
            .zip(&point.x)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);

        if moved < self.tol {
            Step::Finish(Termination::Optimal)
        } else {
            Step::Propose(next)
        }
    }
}
