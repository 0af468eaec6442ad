use thiserror::Error;

/// Configuration for the augmented Lagrangian optimizer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    tol: f64,
    constraint_tol: f64,
    max_outer_iters: usize,
    max_inner_iters: usize,
    initial_penalty: f64,
    penalty_factor: f64,
    max_penalty: f64,
}

/// Errors that can occur when validating an augmented Lagrangian config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("tol must be finite and non-negative")]
    Tol,

    #[error("constraint_tol must be finite and non-negative")]
    ConstraintTol,

    #[error("penalty must be positive, grow by a factor above 1, and not exceed its maximum")]
    Penalty,
}

impl Default for Config {
    fn default() -> Self {
        // Known-good values, unwrap is safe
        Self::new(1e-6, 1e-6, 50).unwrap()
    }
}

impl Config {
    /// Creates a new config with the default inner budget and penalty schedule.
    ///
    /// # Errors
    ///
    /// Returns an error if a tolerance is negative or non-finite.
    pub fn new(tol: f64, constraint_tol: f64, max_outer_iters: usize) -> Result<Self, ConfigError> {
        if !tol.is_finite() || tol < 0.0 {
            return Err(ConfigError::Tol);
        }
        if !constraint_tol.is_finite() || constraint_tol < 0.0 {
            return Err(ConfigError::ConstraintTol);
        }

        Ok(Self {
            tol,
            constraint_tol,
            max_outer_iters,
            max_inner_iters: 500,
            initial_penalty: 10.0,
            penalty_factor: 10.0,
            max_penalty: 1e10,
        })
    }

    /// Sets how many projected-gradient steps one subproblem may take.
    #[must_use]
    pub fn with_max_inner_iters(mut self, max_inner_iters: usize) -> Self {
        self.max_inner_iters = max_inner_iters;
        self
    }

    /// Sets the penalty schedule.
    ///
    /// # Errors
    ///
    /// Returns an error unless `0 < initial <= max`, `factor > 1`, and all
    /// three are finite.
    pub fn with_penalty(
        mut self,
        initial: f64,
        factor: f64,
        max: f64,
    ) -> Result<Self, ConfigError> {
        let valid = initial.is_finite()
            && factor.is_finite()
            && max.is_finite()
            && initial > 0.0
            && factor > 1.0
            && max >= initial;
        if !valid {
            return Err(ConfigError::Penalty);
        }

        self.initial_penalty = initial;
        self.penalty_factor = factor;
        self.max_penalty = max;
        Ok(self)
    }

    /// Returns the projected-gradient tolerance of each subproblem.
    #[must_use]
    pub fn tol(&self) -> f64 {
        self.tol
    }

    /// Returns the largest constraint violation accepted at an optimum.
    #[must_use]
    pub fn constraint_tol(&self) -> f64 {
        self.constraint_tol
    }

    #[must_use]
    pub fn max_outer_iters(&self) -> usize {
        self.max_outer_iters
    }

    #[must_use]
    pub fn max_inner_iters(&self) -> usize {
        self.max_inner_iters
    }

    #[must_use]
    pub fn initial_penalty(&self) -> f64 {
        self.initial_penalty
    }

    #[must_use]
    pub fn penalty_factor(&self) -> f64 {
        self.penalty_factor
    }

    #[must_use]
    pub fn max_penalty(&self) -> f64 {
        self.max_penalty
    }
}
