use thiserror::Error;

/// Configuration for the fixed-point coupling solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    max_iters: usize,
    abs_tol: f64,
    rel_tol: f64,
}

/// Errors that can occur when validating a coupling solver config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("abs_tol must be finite and non-negative")]
    AbsTol,

    #[error("rel_tol must be finite and non-negative")]
    RelTol,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_iters: 100,
            abs_tol: 1e-10,
            rel_tol: 1e-10,
        }
    }
}

impl Config {
    /// Creates a new config with validated tolerances.
    ///
    /// A cycle converges once a sweep changes no coupling variable by more
    /// than `abs_tol`, or by more than `rel_tol` relative to the largest
    /// coupling variable magnitude. `max_iters` caps the number of sweeps
    /// per cycle; zero makes every cyclic solve fail.
    ///
    /// # Errors
    ///
    /// Returns an error if any tolerance is negative or non-finite.
    pub fn new(max_iters: usize, abs_tol: f64, rel_tol: f64) -> Result<Self, ConfigError> {
        if !abs_tol.is_finite() || abs_tol < 0.0 {
            return Err(ConfigError::AbsTol);
        }
        if !rel_tol.is_finite() || rel_tol < 0.0 {
            return Err(ConfigError::RelTol);
        }

        Ok(Self {
            max_iters,
            abs_tol,
            rel_tol,
        })
    }

    /// Returns the maximum number of sweeps per cycle.
    #[must_use]
    pub fn max_iters(&self) -> usize {
        self.max_iters
    }

    /// Returns the absolute tolerance on coupling variable changes.
    #[must_use]
    pub fn abs_tol(&self) -> f64 {
        self.abs_tol
    }

    /// Returns the relative tolerance on coupling variable changes.
    #[must_use]
    pub fn rel_tol(&self) -> f64 {
        self.rel_tol
    }
}
