//! An augmented Lagrangian optimizer for bound-constrained nonlinear programs.
//!
//! # Algorithm
//!
//! Constraints are folded into the merit function
//!
//! ```text
//! L(x) = f(x)
//!      + Σ_i [max(0, λ_i + μ c_i(x))² - λ_i²] / (2μ)
//!      + Σ_j (ν_j h_j(x) + μ/2 h_j(x)²)
//! ```
//!
//! which is minimized over the design bounds by projected gradient descent
//! with Barzilai-Borwein step lengths and Armijo backtracking. When a
//! subproblem is solved (projected gradient below `tol`, a negligible step,
//! a failed line search, or the inner budget spent) the multipliers are
//! updated as `λ <- max(0, λ + μ c)` and `ν <- ν + μ h`, and the penalty `μ`
//! grows whenever the constraint violation failed to shrink by a factor of
//! four.
//!
//! The run is [`Optimal`](Termination::Optimal) once a subproblem ends
//! within `constraint_tol` of feasibility, and
//! [`Infeasible`](Termination::Infeasible) when the penalty is at its
//! maximum and the violation still does not shrink.
//!
//! Before finishing, the optimizer re-proposes its current iterate if the
//! driver's most recent evaluation was a rejected trial point, so the last
//! evaluated design is always the one it stopped at.

mod config;

pub use config::{Config, ConfigError};

use tether_core::Bounds;
use tracing::debug;

use super::{NlpPoint, Optimizer, Outcome, Step, Termination};

/// Sufficient decrease parameter of the Armijo condition.
const ARMIJO: f64 = 1e-4;

const MAX_BACKTRACKS: usize = 30;

const MIN_STEP: f64 = 1e-10;
const MAX_STEP: f64 = 1e10;

#[derive(Debug, Clone)]
pub struct AugmentedLagrangian {
    config: Config,
    bounds: Option<Bounds>,
    ineq_multipliers: Vec<f64>,
    eq_multipliers: Vec<f64>,
    penalty: f64,
    current: Option<Iterate>,
    trial: Option<Trial>,
    step: f64,
    outer_iters: usize,
    inner_iters: usize,
    last_violation: f64,
    current_is_latest: bool,
    pending: Option<Termination>,
}

/// An accepted point with its merit value and merit gradient.
#[derive(Debug, Clone)]
struct Iterate {
    point: NlpPoint,
    merit: f64,
    gradient: Vec<f64>,
}

/// The line search state of an outstanding proposal.
#[derive(Debug, Clone, Copy)]
struct Trial {
    step: f64,
    slope: f64,
    backtracks: usize,
}

impl Default for AugmentedLagrangian {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl AugmentedLagrangian {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config,
            bounds: None,
            ineq_multipliers: Vec::new(),
            eq_multipliers: Vec::new(),
            penalty: config.initial_penalty(),
            current: None,
            trial: None,
            step: 1.0,
            outer_iters: 0,
            inner_iters: 0,
            last_violation: f64::INFINITY,
            current_is_latest: false,
            pending: None,
        }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the current inequality multiplier estimates.
    #[must_use]
    pub fn ineq_multipliers(&self) -> &[f64] {
        &self.ineq_multipliers
    }

    /// Returns the current equality multiplier estimates.
    #[must_use]
    pub fn eq_multipliers(&self) -> &[f64] {
        &self.eq_multipliers
    }

    #[must_use]
    pub fn penalty(&self) -> f64 {
        self.penalty
    }

    /// Returns how many multiplier updates have been made.
    #[must_use]
    pub fn outer_iters(&self) -> usize {
        self.outer_iters
    }

    /// Computes the merit value and gradient of `point` under the current
    /// multipliers and penalty.
    fn iterate(&self, point: NlpPoint) -> Iterate {
        let mu = self.penalty;
        let mut merit = point.objective;
        let mut gradient = point.gradient.clone();

        let ineq = point.ineq.iter().zip(&point.ineq_jacobian);
        for ((c, row), lambda) in ineq.zip(&self.ineq_multipliers) {
            let shifted = (lambda + mu * c).max(0.0);
            merit += (shifted * shifted - lambda * lambda) / (2.0 * mu);
            axpy(&mut gradient, shifted, row);
        }

        let eq = point.eq.iter().zip(&point.eq_jacobian);
        for ((h, row), nu) in eq.zip(&self.eq_multipliers) {
            merit += nu * h + 0.5 * mu * h * h;
            axpy(&mut gradient, nu + mu * h, row);
        }

        Iterate {
            point,
            merit,
            gradient,
        }
    }

    fn tell(&mut self, outcome: Outcome) -> Step {
        let Some(current_merit) = self.current.as_ref().map(|current| current.merit) else {
            return match outcome {
                Outcome::Evaluated(point) => {
                    self.ineq_multipliers = vec![0.0; point.ineq.len()];
                    self.eq_multipliers = vec![0.0; point.eq.len()];
                    let first = self.iterate(point);
                    self.step = initial_step(&first.gradient);
                    self.current = Some(first);
                    self.current_is_latest = true;
                    self.advance()
                }
                Outcome::Failed => Step::Finish(Termination::Stalled),
            };
        };

        let Some(trial) = self.trial.take() else {
            return Step::Finish(Termination::Stalled);
        };

        if let Outcome::Evaluated(point) = outcome {
            let candidate = self.iterate(point);
            if candidate.merit <= current_merit + ARMIJO * trial.slope {
                let moved = self.accept(candidate);
                return if moved <= self.config.tol() {
                    self.end_subproblem()
                } else {
                    self.advance()
                };
            }
        }

        if trial.backtracks >= MAX_BACKTRACKS {
            debug!(outer = self.outer_iters, "line search failed");
            return self.end_subproblem();
        }
        match self.propose(0.5 * trial.step, trial.backtracks + 1) {
            Some(x) => Step::Propose(x),
            None => self.end_subproblem(),
        }
    }

    /// Makes `candidate` the current iterate, updates the Barzilai-Borwein
    /// step, and returns the infinity norm of the move.
    fn accept(&mut self, candidate: Iterate) -> f64 {
        let previous = self.current.replace(candidate);
        self.current_is_latest = true;

        let (Some(previous), Some(current)) = (previous, &self.current) else {
            return 0.0;
        };

        let s = difference(&current.point.x, &previous.point.x);
        let y = difference(&current.gradient, &previous.gradient);
        let sy = dot(&s, &y);

        self.step = if sy > 0.0 {
            (dot(&s, &s) / sy).clamp(MIN_STEP, MAX_STEP)
        } else {
            initial_step(&current.gradient)
        };

        norm_inf(&s)
    }

    /// Proposes the next trial point of the current subproblem, or updates
    /// multipliers until there is one (or the run is over).
    fn advance(&mut self) -> Step {
        loop {
            if let Some(x) = self.next_trial() {
                return Step::Propose(x);
            }
            if let Some(termination) = self.update_multipliers() {
                return Step::Finish(termination);
            }
        }
    }

    fn end_subproblem(&mut self) -> Step {
        match self.update_multipliers() {
            Some(termination) => Step::Finish(termination),
            None => self.advance(),
        }
    }

    /// Returns `None` once the current subproblem is solved.
    fn next_trial(&mut self) -> Option<Vec<f64>> {
        let (current, bounds) = (self.current.as_ref()?, self.bounds.as_ref()?);

        self.inner_iters += 1;
        if self.inner_iters > self.config.max_inner_iters() {
            return None;
        }

        let full_step = bounds.clip(&descend(&current.point.x, &current.gradient, 1.0));
        if norm_inf(&difference(&full_step, &current.point.x)) <= self.config.tol() {
            return None;
        }

        self.propose(self.step, 0)
    }

    fn propose(&mut self, step: f64, backtracks: usize) -> Option<Vec<f64>> {
        let (current, bounds) = (self.current.as_ref()?, self.bounds.as_ref()?);

        let trial = bounds.clip(&descend(&current.point.x, &current.gradient, step));
        let direction = difference(&trial, &current.point.x);
        if norm_inf(&direction) <= 0.0 {
            return None;
        }

        let slope = dot(&current.gradient, &direction);
        self.trial = Some(Trial {
            step,
            slope,
            backtracks,
        });
        self.current_is_latest = false;
        Some(trial)
    }

    /// Ends a subproblem: either terminates or updates the multipliers and
    /// penalty and re-prices the current iterate.
    fn update_multipliers(&mut self) -> Option<Termination> {
        let Some(current) = self.current.as_ref() else {
            return Some(Termination::Stalled);
        };

        let violation = current.point.max_violation();
        if violation <= self.config.constraint_tol() {
            debug!(
                outer = self.outer_iters,
                objective = current.point.objective,
                violation,
                "subproblem solved at a feasible point"
            );
            return Some(Termination::Optimal);
        }

        self.outer_iters += 1;
        if self.outer_iters >= self.config.max_outer_iters() {
            return Some(Termination::IterationLimit);
        }

        let shrinking = violation <= 0.25 * self.last_violation;
        if !shrinking && self.penalty >= self.config.max_penalty() {
            return Some(Termination::Infeasible);
        }

        let mu = self.penalty;
        for (lambda, c) in self.ineq_multipliers.iter_mut().zip(&current.point.ineq) {
            *lambda = (*lambda + mu * c).max(0.0);
        }
        for (nu, h) in self.eq_multipliers.iter_mut().zip(&current.point.eq) {
            *nu += mu * h;
        }
        if !shrinking {
            self.penalty = (mu * self.config.penalty_factor()).min(self.config.max_penalty());
        }

        debug!(
            outer = self.outer_iters,
            violation,
            penalty = self.penalty,
            "multipliers updated"
        );

        self.last_violation = violation;
        self.inner_iters = 0;
        if let Some(current) = self.current.take() {
            self.current = Some(self.iterate(current.point));
        }
        None
    }
}

impl Optimizer for AugmentedLagrangian {
    fn start(&mut self, x0: &[f64], bounds: &Bounds) -> Vec<f64> {
        *self = Self::new(self.config);
        self.bounds = Some(bounds.clone());
        bounds.clip(x0)
    }

    fn step(&mut self, outcome: Outcome) -> Step {
        if let Some(termination) = self.pending.take() {
            return Step::Finish(termination);
        }

        match self.tell(outcome) {
            Step::Finish(termination) if !self.current_is_latest => match &self.current {
                Some(current) => {
                    debug!(?termination, "re-evaluating the final iterate");
                    self.pending = Some(termination);
                    Step::Propose(current.point.x.clone())
                }
                None => Step::Finish(termination),
            },
            step => step,
        }
    }
}

fn initial_step(gradient: &[f64]) -> f64 {
    1.0 / norm_inf(gradient).max(1.0)
}

fn descend(x: &[f64], gradient: &[f64], step: f64) -> Vec<f64> {
    x.iter().zip(gradient).map(|(x, g)| x - step * g).collect()
}

fn difference(a: &[f64], b: &[f64]) -> Vec<f64> {
    a.iter().zip(b).map(|(a, b)| a - b).collect()
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(a, b)| a * b).sum()
}

fn axpy(y: &mut [f64], a: f64, x: &[f64]) {
    for (y, x) in y.iter_mut().zip(x) {
        *y += a * x;
    }
}

fn norm_inf(v: &[f64]) -> f64 {
    v.iter().fold(0.0, |max, x| max.max(x.abs()))
}
