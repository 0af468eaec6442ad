mod cli;
mod logging;

use std::{process::ExitCode, sync::Arc};

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info, warn};

use tether_sellar::{NativeKernels, Report, config::PartialConfig, problem};
use tether_solvers::{
    evaluate,
    optimization::{Action, Driver, Event, Status},
};

use crate::cli::Cli;

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(error) => {
            eprintln!("Error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when the run completed without an optimum.
fn run() -> anyhow::Result<bool> {
    let cli = Cli::parse();
    logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref())?;

    let file = match &cli.config {
        Some(path) => PartialConfig::from_file(path)?,
        None => PartialConfig::default(),
    };
    let problem = problem(Arc::new(NativeKernels::new())).context("failed to assemble problem")?;
    let mut run = file
        .merge(cli.overrides())
        .build(problem.design_space())
        .context("invalid configuration")?;
    debug!(?run, "resolved configuration");

    let (report, optimal) = if cli.analyze {
        let evaluation = evaluate(
            &problem,
            &run.initial_design,
            None,
            run.driver.coupling(),
        )
        .context("analysis failed")?;
        (Report::from_evaluation(&problem, &evaluation)?, true)
    } else {
        let driver = Driver::new(&problem, run.driver);
        let result = driver.run(
            &mut run.optimizer,
            &run.initial_design,
            |event: &Event<'_>| -> Option<Action> {
                match event {
                    Event::Evaluated {
                        iter, responses, ..
                    } => info!(
                        iter,
                        design = ?event.design(),
                        objective = responses.objective,
                        violation = responses.max_violation(),
                        "evaluated"
                    ),
                    Event::Failed { iter, error, .. } => {
                        warn!(iter, design = ?event.design(), %error, "evaluation failed");
                    }
                }
                None
            },
        )?;
        if result.status != Status::Optimal {
            warn!(status = ?result.status, "optimization did not reach an optimum");
        }
        (
            Report::from_result(&problem, &result)?,
            result.status == Status::Optimal,
        )
    };

    match &cli.output {
        Some(path) => {
            std::fs::write(path, report.to_toml()?)
                .with_context(|| format!("failed to write report to '{}'", path.display()))?;
            info!(path = %path.display(), "wrote report");
        }
        None => println!("{report}"),
    }

    Ok(optimal)
}
