//! Run configuration for the `sellar` binary.
//!
//! Settings come from an optional TOML file, are overlaid with command-line
//! overrides, and are finally validated into the solver configs. Every key
//! is optional and falls back to the solver default.
//!
//! ```toml
//! [design]
//! x = 1.0
//! z = [5.0, 2.0]
//!
//! [coupling]
//! max-iters = 100
//! abs-tol = 1e-10
//! rel-tol = 1e-10
//!
//! [derivative]
//! step = 1e-6
//! scheme = "forward"          # "backward", "central"
//! step-kind = "absolute"      # "relative"
//! failure-policy = "fail-fast" # "one-sided"
//!
//! [driver]
//! max-iters = 1000
//! max-failed-evaluations = 3
//! feasibility-tol = 1e-6
//!
//! [optimizer]
//! kind = "augmented-lagrangian" # "gradient-step"
//! tol = 1e-6
//! constraint-tol = 1e-6
//! max-outer-iters = 50
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use tether_core::{Bounds, DesignSpace, Value, Variables};
use tether_solvers::{
    coupling,
    derivative::{self, FailurePolicy, Scheme, StepKind},
    optimization::{
        self, AugmentedLagrangian, GradientStep, Optimizer, Outcome, Step, augmented_lagrangian,
        gradient_step,
    },
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}'", path = path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),

    #[error("unknown design variable `{0}`")]
    UnknownDesignVariable(String),

    #[error("design variable `{name}` needs {expected} element(s), got {actual}")]
    DesignShape {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid [coupling] settings")]
    Coupling(#[from] coupling::ConfigError),

    #[error("invalid [derivative] settings")]
    Derivative(#[from] derivative::ConfigError),

    #[error("invalid [driver] settings")]
    Driver(#[from] optimization::ConfigError),

    #[error("invalid [optimizer] settings")]
    AugmentedLagrangian(#[from] augmented_lagrangian::ConfigError),

    #[error("invalid [optimizer] settings")]
    GradientStep(#[from] gradient_step::ConfigError),
}

/// Which optimizer to run.
#[derive(Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OptimizerKind {
    #[default]
    AugmentedLagrangian,
    GradientStep,
}

/// The contents of a config file, or a set of overrides.
#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PartialConfig {
    #[serde(default)]
    pub design: Variables,
    #[serde(default)]
    pub coupling: PartialCoupling,
    #[serde(default)]
    pub derivative: PartialDerivative,
    #[serde(default)]
    pub driver: PartialDriver,
    #[serde(default)]
    pub optimizer: PartialOptimizer,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialCoupling {
    pub max_iters: Option<usize>,
    pub abs_tol: Option<f64>,
    pub rel_tol: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialDerivative {
    pub step: Option<f64>,
    pub scheme: Option<Scheme>,
    pub step_kind: Option<StepKind>,
    pub failure_policy: Option<FailurePolicy>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialDriver {
    pub max_iters: Option<usize>,
    pub max_failed_evaluations: Option<usize>,
    pub feasibility_tol: Option<f64>,
}

#[derive(Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct PartialOptimizer {
    pub kind: Option<OptimizerKind>,
    pub tol: Option<f64>,
    pub constraint_tol: Option<f64>,
    pub max_outer_iters: Option<usize>,
    pub max_inner_iters: Option<usize>,
    /// Step length of the gradient-step optimizer.
    pub step: Option<f64>,
}

impl PartialConfig {
    /// Reads and parses a TOML config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "read config file");
        Self::parse(&text)
    }

    /// Parses TOML config text.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML or unknown keys.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Overlays `overrides` on top of `self`; set fields in `overrides` win.
    #[must_use]
    pub fn merge(mut self, overrides: PartialConfig) -> Self {
        for (name, value) in overrides.design.iter() {
            self.design.insert(name, value.clone());
        }

        let (c, o) = (&mut self.coupling, overrides.coupling);
        c.max_iters = o.max_iters.or(c.max_iters);
        c.abs_tol = o.abs_tol.or(c.abs_tol);
        c.rel_tol = o.rel_tol.or(c.rel_tol);

        let (d, o) = (&mut self.derivative, overrides.derivative);
        d.step = o.step.or(d.step);
        d.scheme = o.scheme.or(d.scheme);
        d.step_kind = o.step_kind.or(d.step_kind);
        d.failure_policy = o.failure_policy.or(d.failure_policy);

        let (r, o) = (&mut self.driver, overrides.driver);
        r.max_iters = o.max_iters.or(r.max_iters);
        r.max_failed_evaluations = o.max_failed_evaluations.or(r.max_failed_evaluations);
        r.feasibility_tol = o.feasibility_tol.or(r.feasibility_tol);

        let (p, o) = (&mut self.optimizer, overrides.optimizer);
        p.kind = o.kind.or(p.kind);
        p.tol = o.tol.or(p.tol);
        p.constraint_tol = o.constraint_tol.or(p.constraint_tol);
        p.max_outer_iters = o.max_outer_iters.or(p.max_outer_iters);
        p.max_inner_iters = o.max_inner_iters.or(p.max_inner_iters);
        p.step = o.step.or(p.step);

        self
    }

    /// Validates the settings against a problem's design space.
    ///
    /// # Errors
    ///
    /// Returns an error if a design value does not fit the design space or a
    /// solver setting is out of range.
    pub fn build(self, space: &DesignSpace) -> Result<RunConfig, ConfigError> {
        let initial_design = self.initial_design(space)?;
        let coupling = self.coupling.build()?;
        let derivative = self.derivative.build()?;
        let driver = self
            .driver
            .build()?
            .with_coupling(coupling)
            .with_derivative(derivative);
        let optimizer = self.optimizer.build()?;

        Ok(RunConfig {
            initial_design,
            driver,
            optimizer,
        })
    }

    fn initial_design(&self, space: &DesignSpace) -> Result<Vec<f64>, ConfigError> {
        if let Some((name, _)) = self.design.iter().find(|(name, _)| !space.contains(name)) {
            return Err(ConfigError::UnknownDesignVariable(name.to_owned()));
        }

        let mut design = Vec::with_capacity(space.len());
        for variable in space.variables() {
            let value: &Value = self.design.get(&variable.name).unwrap_or(&variable.default);
            if value.len() != variable.default.len() {
                return Err(ConfigError::DesignShape {
                    name: variable.name.clone(),
                    expected: variable.default.len(),
                    actual: value.len(),
                });
            }
            design.extend_from_slice(value.as_slice());
        }
        Ok(design)
    }
}

impl PartialCoupling {
    fn build(self) -> Result<coupling::Config, coupling::ConfigError> {
        let default = coupling::Config::default();
        coupling::Config::new(
            self.max_iters.unwrap_or(default.max_iters()),
            self.abs_tol.unwrap_or(default.abs_tol()),
            self.rel_tol.unwrap_or(default.rel_tol()),
        )
    }
}

impl PartialDerivative {
    fn build(self) -> Result<derivative::Config, derivative::ConfigError> {
        let default = derivative::Config::default();
        Ok(derivative::Config::new(
            self.step.unwrap_or(default.step()),
            self.scheme.unwrap_or_default(),
        )?
        .with_step_kind(self.step_kind.unwrap_or_default())
        .with_failure_policy(self.failure_policy.unwrap_or_default()))
    }
}

impl PartialDriver {
    fn build(self) -> Result<optimization::Config, optimization::ConfigError> {
        let default = optimization::Config::default();
        optimization::Config::new(
            self.max_iters.unwrap_or(default.max_iters()),
            self.max_failed_evaluations
                .unwrap_or(default.max_failed_evaluations()),
            self.feasibility_tol.unwrap_or(default.feasibility_tol()),
        )
    }
}

impl PartialOptimizer {
    fn build(self) -> Result<SellarOptimizer, ConfigError> {
        match self.kind.unwrap_or_default() {
            OptimizerKind::AugmentedLagrangian => {
                let default = augmented_lagrangian::Config::default();
                let config = augmented_lagrangian::Config::new(
                    self.tol.unwrap_or(default.tol()),
                    self.constraint_tol.unwrap_or(default.constraint_tol()),
                    self.max_outer_iters.unwrap_or(default.max_outer_iters()),
                )?
                .with_max_inner_iters(self.max_inner_iters.unwrap_or(default.max_inner_iters()));
                Ok(SellarOptimizer::AugmentedLagrangian(AugmentedLagrangian::new(config)))
            }
            OptimizerKind::GradientStep => {
                let default = GradientStep::default();
                let optimizer = GradientStep::new(
                    self.step.unwrap_or(default.step_size()),
                    self.tol.unwrap_or(default.tol()),
                )?;
                Ok(SellarOptimizer::GradientStep(optimizer))
            }
        }
    }
}

/// Validated settings for one run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub initial_design: Vec<f64>,
    pub driver: optimization::Config,
    pub optimizer: SellarOptimizer,
}

/// The optimizer selected by a config.
#[derive(Debug, Clone)]
pub enum SellarOptimizer {
    AugmentedLagrangian(AugmentedLagrangian),
    GradientStep(GradientStep),
}

impl Optimizer for SellarOptimizer {
    fn start(&mut self, x0: &[f64], bounds: &Bounds) -> Vec<f64> {
        match self {
            Self::AugmentedLagrangian(optimizer) => optimizer.start(x0, bounds),
            Self::GradientStep(optimizer) => optimizer.start(x0, bounds),
        }
    }

    fn step(&mut self, outcome: Outcome) -> Step {
        match self {
            Self::AugmentedLagrangian(optimizer) => optimizer.step(outcome),
            Self::GradientStep(optimizer) => optimizer.step(outcome),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use crate::{NativeKernels, problem};

    fn space() -> DesignSpace {
        problem(Arc::new(NativeKernels::new()))
            .unwrap()
            .design_space()
            .clone()
    }

    #[test]
    fn empty_file_gives_defaults() {
        let run = PartialConfig::parse("").unwrap().build(&space()).unwrap();

        assert_eq!(run.initial_design, vec![1.0, 5.0, 2.0]);
        assert_eq!(run.driver, optimization::Config::default());
        assert!(matches!(run.optimizer, SellarOptimizer::AugmentedLagrangian(_)));
    }

    #[test]
    fn parses_every_table() {
        let text = r#"
            [design]
            z = [1.0, 0.5]

            [coupling]
            max-iters = 20
            abs-tol = 1e-8

            [derivative]
            scheme = "central"
            step-kind = "relative"
            failure-policy = "one-sided"

            [driver]
            max-failed-evaluations = 5

            [optimizer]
            kind = "gradient-step"
            step = 0.05
        "#;
        let run = PartialConfig::parse(text).unwrap().build(&space()).unwrap();

        assert_eq!(run.initial_design, vec![1.0, 1.0, 0.5]);
        assert_eq!(run.driver.coupling().max_iters(), 20);
        assert_eq!(run.driver.coupling().abs_tol(), 1e-8);
        assert_eq!(run.driver.derivative().scheme(), Scheme::Central);
        assert_eq!(run.driver.derivative().step_kind(), StepKind::Relative);
        assert_eq!(
            run.driver.derivative().failure_policy(),
            FailurePolicy::OneSided
        );
        assert_eq!(run.driver.max_failed_evaluations(), 5);
        let SellarOptimizer::GradientStep(optimizer) = run.optimizer else {
            panic!("expected gradient step");
        };
        assert_eq!(optimizer.step_size(), 0.05);
    }

    #[test]
    fn overrides_win() {
        let file = PartialConfig::parse("[driver]\nmax-iters = 10\n[design]\nx = 2.0").unwrap();
        let overrides = PartialConfig {
            design: Variables::new().with("z", [3.0, 4.0]),
            driver: PartialDriver {
                max_iters: Some(99),
                ..PartialDriver::default()
            },
            ..PartialConfig::default()
        };

        let run = file.merge(overrides).build(&space()).unwrap();
        assert_eq!(run.initial_design, vec![2.0, 3.0, 4.0]);
        assert_eq!(run.driver.max_iters(), 99);
    }

    #[test]
    fn rejects_unknown_keys_and_bad_values() {
        assert!(matches!(
            PartialConfig::parse("[driver]\nmax-iter = 3"),
            Err(ConfigError::Parse(_))
        ));

        let bad_tol = PartialConfig::parse("[coupling]\nabs-tol = -1.0").unwrap();
        assert!(matches!(bad_tol.build(&space()), Err(ConfigError::Coupling(_))));

        let bad_design = PartialConfig::parse("[design]\nz = [1.0]").unwrap();
        assert!(matches!(
            bad_design.build(&space()),
            Err(ConfigError::DesignShape { expected: 2, actual: 1, .. })
        ));

        let unknown = PartialConfig::parse("[design]\nw = 1.0").unwrap();
        assert!(matches!(
            unknown.build(&space()),
            Err(ConfigError::UnknownDesignVariable(name)) if name == "w"
        ));
    }
}
