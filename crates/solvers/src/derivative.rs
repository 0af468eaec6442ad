//! Finite-difference total derivatives of a coupled problem.
//!
//! Each design element is perturbed and the *whole* pipeline (coupling solve
//! and responses) is re-run at the perturbed point, so the resulting
//! Jacobian captures how the converged coupling responds to the design, not
//! just each discipline's local sensitivity.
//!
//! Perturbed solves are warm-started from a private copy of the base state.
//! With the `parallel` feature, columns are evaluated concurrently; the
//! result is identical to the sequential path.
//!
//! # Bounds
//!
//! A perturbation never leaves the design bounds. A forward step that would
//! cross the upper bound is taken backward instead (and vice versa), and a
//! central stencil that does not fit falls back to the one-sided stencil
//! that does. When neither side has room for the full step, the step is
//! shortened to the larger side.
//!
//! # Failures
//!
//! See [`FailurePolicy`]. A failed perturbation is never replaced by a stale
//! value.

mod config;
mod error;
mod jacobian;

pub use config::{Config, ConfigError, FailurePolicy, Scheme, StepKind};
pub use error::Error;
pub use jacobian::{Jacobian, Stencil};

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tether_core::{AnalysisState, Problem};
use tracing::{debug, warn};

use crate::{EvalError, Evaluation, coupling, evaluate};

/// Approximates the Jacobian of `[objective, constraints...]` at `base`.
///
/// `base` must be an evaluation of `problem`, typically the one the
/// optimizer just received.
///
/// # Errors
///
/// Returns [`Error::Perturbation`] for the lowest design element whose
/// perturbed evaluations failed under the configured policy.
pub fn jacobian(
    problem: &Problem,
    base: &Evaluation,
    coupling: &coupling::Config,
    config: &Config,
) -> Result<Jacobian, Error> {
    let rows = 1 + problem.constraint_count();
    let cols = base.design.len();
    let compute = |col| column(problem, base, col, rows, coupling, config);

    #[cfg(feature = "parallel")]
    let columns: Vec<_> = (0..cols).into_par_iter().map(compute).collect();

    #[cfg(not(feature = "parallel"))]
    let columns: Vec<_> = (0..cols).map(compute).collect();

    let columns = columns
        .into_iter()
        .enumerate()
        .map(|(col, result)| {
            result.map_err(|source| Error::Perturbation {
                column: col,
                label: problem
                    .design_space()
                    .labels()
                    .swap_remove(col),
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let jacobian = Jacobian::from_columns(rows, columns);
    debug!(
        rows,
        cols,
        evaluations = jacobian.evaluations(),
        "jacobian approximated"
    );
    Ok(jacobian)
}

/// Evaluates `design` and approximates the Jacobian there.
///
/// # Errors
///
/// Returns [`Error::Base`] if `design` itself cannot be evaluated and
/// [`Error::Perturbation`] as for [`jacobian`].
pub fn evaluate_with_jacobian(
    problem: &Problem,
    design: &[f64],
    guess: Option<&AnalysisState>,
    coupling: &coupling::Config,
    config: &Config,
) -> Result<(Evaluation, Jacobian), Error> {
    let base = evaluate(problem, design, guess, coupling).map_err(Error::Base)?;
    let jacobian = jacobian(problem, &base, coupling, config)?;
    Ok((base, jacobian))
}

type Column = (Vec<f64>, Stencil, usize);

/// Computes one column: the derivatives with respect to design element `col`.
fn column(
    problem: &Problem,
    base: &Evaluation,
    col: usize,
    rows: usize,
    coupling: &coupling::Config,
    config: &Config,
) -> Result<Column, EvalError> {
    let bounds = problem.design_space().bounds();
    let (lower, upper) = (bounds.lower()[col], bounds.upper()[col]);
    let x = base.design[col];

    if lower == upper {
        return Ok((vec![0.0; rows], Stencil::Fixed, 0));
    }

    let room_up = upper - x;
    let room_down = x - lower;
    let mut h = config.step_at(x);
    if h > room_up && h > room_down {
        h = room_up.max(room_down);
    }
    let fits_up = h <= room_up;
    let fits_down = h <= room_down;

    let stencil = match config.scheme() {
        Scheme::Central if fits_up && fits_down => Stencil::Central,
        Scheme::Backward if fits_down => Stencil::Backward,
        _ if fits_up => Stencil::Forward,
        _ => Stencil::Backward,
    };

    let base_values = base.responses.to_vec();
    let mut solves = 0;
    let mut perturb = |delta: f64| -> Result<(Vec<f64>, f64), EvalError> {
        solves += 1;
        let mut design = base.design.clone();
        design[col] = (x + delta).clamp(lower, upper);
        let actual = design[col] - x;
        let eval = evaluate(problem, &design, Some(base.state()), coupling)?;
        Ok((eval.responses.to_vec(), actual))
    };
    let one_sided = config.failure_policy() == FailurePolicy::OneSided;

    let forward = |(plus, dx): (Vec<f64>, f64)| -> Vec<f64> {
        plus.iter()
            .zip(&base_values)
            .map(|(p, b)| (p - b) / dx)
            .collect()
    };
    let backward = |(minus, dx): (Vec<f64>, f64)| -> Vec<f64> {
        minus
            .iter()
            .zip(&base_values)
            .map(|(m, b)| (b - m) / -dx)
            .collect()
    };

    let (values, used) = match stencil {
        Stencil::Central => match (perturb(h), perturb(-h)) {
            (Ok((plus, dp)), Ok((minus, dm))) => {
                let span = dp - dm;
                let values = plus
                    .iter()
                    .zip(&minus)
                    .map(|(p, m)| (p - m) / span)
                    .collect();
                (values, Stencil::Central)
            }
            (Ok(plus), Err(error)) if one_sided => {
                warn!(col, %error, "backward perturbation failed, using forward difference");
                (forward(plus), Stencil::Forward)
            }
            (Err(error), Ok(minus)) if one_sided => {
                warn!(col, %error, "forward perturbation failed, using backward difference");
                (backward(minus), Stencil::Backward)
            }
            (Err(error), _) | (_, Err(error)) => return Err(error),
        },
        Stencil::Forward => match perturb(h) {
            Ok(plus) => (forward(plus), Stencil::Forward),
            Err(error) if one_sided && fits_down => {
                warn!(col, %error, "forward perturbation failed, retrying backward");
                (backward(perturb(-h)?), Stencil::Backward)
            }
            Err(error) => return Err(error),
        },
        Stencil::Backward => match perturb(-h) {
            Ok(minus) => (backward(minus), Stencil::Backward),
            Err(error) if one_sided && fits_up => {
                warn!(col, %error, "backward perturbation failed, retrying forward");
                (forward(perturb(h)?), Stencil::Forward)
            }
            Err(error) => return Err(error),
        },
        Stencil::Fixed => unreachable!("fixed elements return early"),
    };

    Ok((values, used, solves))
}
