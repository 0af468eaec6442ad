use thiserror::Error;

use crate::{coupling, derivative};

/// Configuration for the optimization driver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    max_iters: usize,
    max_failed_evaluations: usize,
    feasibility_tol: f64,
    coupling: coupling::Config,
    derivative: derivative::Config,
}

/// Errors that can occur when validating a driver config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("feasibility_tol must be finite and non-negative")]
    FeasibilityTol,
}

impl Default for Config {
    fn default() -> Self {
        // Known-good values, unwrap is safe
        Self::new(1000, 3, 1e-6).unwrap()
    }
}

impl Config {
    /// Creates a new config with default coupling and derivative settings.
    ///
    /// # Errors
    ///
    /// Returns an error if `feasibility_tol` is negative or non-finite.
    pub fn new(
        max_iters: usize,
        max_failed_evaluations: usize,
        feasibility_tol: f64,
    ) -> Result<Self, ConfigError> {
        if !feasibility_tol.is_finite() || feasibility_tol < 0.0 {
            return Err(ConfigError::FeasibilityTol);
        }

        Ok(Self {
            max_iters,
            max_failed_evaluations,
            feasibility_tol,
            coupling: coupling::Config::default(),
            derivative: derivative::Config::default(),
        })
    }

    /// Replaces the coupling solver settings used for every evaluation.
    #[must_use]
    pub fn with_coupling(mut self, coupling: coupling::Config) -> Self {
        self.coupling = coupling;
        self
    }

    /// Replaces the finite-difference settings.
    #[must_use]
    pub fn with_derivative(mut self, derivative: derivative::Config) -> Self {
        self.derivative = derivative;
        self
    }

    /// Returns the maximum number of proposals the driver will evaluate.
    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    /// Returns how many consecutive failed evaluations are tolerated.
    #[must_use]
    pub fn max_failed_evaluations(&self) -> usize {
        self.max_failed_evaluations
    }

    /// Returns the largest constraint violation still counted as feasible.
    #[must_use]
    pub fn feasibility_tol(&self) -> f64 {
        self.feasibility_tol
    }

    #[must_use]
    pub fn coupling(&self) -> &coupling::Config {
        &self.coupling
    }

    #[must_use]
    pub fn derivative(&self) -> &derivative::Config {
        &self.derivative
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.max_iters(), 1000);
        assert_eq!(config.max_failed_evaluations(), 3);
        assert_eq!(config.feasibility_tol(), 1e-6);
        assert_eq!(config.coupling(), &coupling::Config::default());
    }

    #[test]
    fn rejects_bad_feasibility_tol() {
        assert_eq!(Config::new(10, 1, -1.0), Err(ConfigError::FeasibilityTol));
        assert_eq!(Config::new(10, 1, f64::NAN), Err(ConfigError::FeasibilityTol));
    }
}
