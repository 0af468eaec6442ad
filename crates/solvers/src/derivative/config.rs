use thiserror::Error;

/// The finite-difference stencil requested for every design element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum Scheme {
    /// `(f(x + h) - f(x)) / h`, one extra solve per element, O(h) error.
    #[default]
    Forward,

    /// `(f(x) - f(x - h)) / h`, one extra solve per element, O(h) error.
    Backward,

    /// `(f(x + h) - f(x - h)) / 2h`, two extra solves per element, O(h²) error.
    Central,
}

/// How the configured step is turned into a perturbation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum StepKind {
    /// `h = step`
    #[default]
    Absolute,

    /// `h = step * max(|x|, 1)`
    Relative,
}

/// What to do when a perturbed evaluation fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum FailurePolicy {
    /// Fail the whole Jacobian.
    #[default]
    FailFast,

    /// Retry the element with the opposite one-sided difference, and fail
    /// only if that also fails.
    OneSided,
}

/// Configuration for finite-difference Jacobians.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    step: f64,
    scheme: Scheme,
    step_kind: StepKind,
    failure_policy: FailurePolicy,
}

/// Errors that can occur when validating a finite-difference config.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("step must be finite and positive")]
    Step,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            step: 1e-6,
            scheme: Scheme::Forward,
            step_kind: StepKind::Absolute,
            failure_policy: FailurePolicy::FailFast,
        }
    }
}

impl Config {
    /// Creates a config with the given step and scheme.
    ///
    /// Large steps add truncation error, small steps add cancellation error
    /// (including the coupling solver's own tolerance divided by `step`).
    ///
    /// # Errors
    ///
    /// Returns an error if `step` is not finite and positive.
    pub fn new(step: f64, scheme: Scheme) -> Result<Self, ConfigError> {
        if !step.is_finite() || step <= 0.0 {
            return Err(ConfigError::Step);
        }
        Ok(Self {
            step,
            scheme,
            ..Self::default()
        })
    }

    #[must_use]
    pub fn with_step_kind(mut self, step_kind: StepKind) -> Self {
        self.step_kind = step_kind;
        self
    }

    #[must_use]
    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    #[must_use]
    pub fn step(&self) -> f64 {
        self.step
    }

    #[must_use]
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    #[must_use]
    pub fn step_kind(&self) -> StepKind {
        self.step_kind
    }

    #[must_use]
    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    /// Returns the perturbation size at `x`.
    #[must_use]
    pub fn step_at(&self, x: f64) -> f64 {
        match self.step_kind {
            StepKind::Absolute => self.step,
            StepKind::Relative => self.step * x.abs().max(1.0),
        }
    }
}
