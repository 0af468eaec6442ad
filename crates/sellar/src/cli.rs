use std::path::PathBuf;

use clap::Parser;

use tether_core::Variables;
use tether_sellar::config::{
    OptimizerKind, PartialConfig, PartialCoupling, PartialDerivative, PartialDriver,
    PartialOptimizer,
};
use tether_solvers::derivative::Scheme;

/// Solve or optimize the Sellar two-discipline problem.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Cli {
    /// TOML config file; command-line values override it.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run one coupled analysis at the initial design instead of optimizing.
    #[arg(long)]
    pub analyze: bool,

    /// Optimizer to run.
    #[arg(long, value_enum, value_name = "KIND")]
    pub optimizer: Option<OptimizerKind>,

    /// Initial value of the local design variable `x`.
    #[arg(long, value_name = "FLOAT")]
    pub x: Option<f64>,

    /// Initial values of the global design variables `z`.
    #[arg(long, num_args = 2, value_names = ["Z1", "Z2"])]
    pub z: Option<Vec<f64>>,

    /// Maximum number of optimizer proposals.
    #[arg(long, value_name = "NUM")]
    pub max_iters: Option<usize>,

    /// Maximum number of coupling iterations per analysis.
    #[arg(long, value_name = "NUM")]
    pub coupling_iters: Option<usize>,

    /// Finite-difference scheme.
    #[arg(long, value_enum, value_name = "SCHEME")]
    pub scheme: Option<SchemeArg>,

    /// Finite-difference step.
    #[arg(long, value_name = "FLOAT")]
    pub step: Option<f64>,

    /// Write the report as TOML to this file instead of printing it.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a file in addition to stderr
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemeArg {
    Forward,
    Backward,
    Central,
}

impl From<SchemeArg> for Scheme {
    fn from(scheme: SchemeArg) -> Self {
        match scheme {
            SchemeArg::Forward => Self::Forward,
            SchemeArg::Backward => Self::Backward,
            SchemeArg::Central => Self::Central,
        }
    }
}

impl Cli {
    /// Collects the command-line settings that override the config file.
    pub fn overrides(&self) -> PartialConfig {
        let mut design = Variables::new();
        if let Some(x) = self.x {
            design.insert("x", x);
        }
        if let Some(z) = &self.z {
            design.insert("z", z.clone());
        }

        PartialConfig {
            design,
            coupling: PartialCoupling {
                max_iters: self.coupling_iters,
                ..PartialCoupling::default()
            },
            derivative: PartialDerivative {
                step: self.step,
                scheme: self.scheme.map(Scheme::from),
                ..PartialDerivative::default()
            },
            driver: PartialDriver {
                max_iters: self.max_iters,
                ..PartialDriver::default()
            },
            optimizer: PartialOptimizer {
                kind: self.optimizer,
                ..PartialOptimizer::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use clap::CommandFactory;

    #[test]
    fn command_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_become_overrides() {
        let cli = Cli::parse_from([
            "sellar",
            "--x",
            "2",
            "--z",
            "3",
            "4",
            "--scheme",
            "central",
            "--optimizer",
            "gradient-step",
            "-vv",
        ]);
        let overrides = cli.overrides();

        assert_eq!(cli.verbose, 2);
        assert_eq!(overrides.design.scalar("x").unwrap(), 2.0);
        assert_eq!(overrides.design.element("z", 1).unwrap(), 4.0);
        assert_eq!(overrides.derivative.scheme, Some(Scheme::Central));
        assert_eq!(overrides.optimizer.kind, Some(OptimizerKind::GradientStep));
        assert_eq!(overrides.driver.max_iters, None);
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["sellar", "-q", "-v"]).is_err());
    }
}
