use tether_core::{Bound, Bounds};

use crate::{Evaluation, derivative::Jacobian};

/// A fully evaluated design point in the form optimizers consume.
///
/// Constraints are normalized: every entry of `ineq` must satisfy `c <= 0`
/// and every entry of `eq` must satisfy `h == 0`. Jacobian rows line up with
/// the constraint values and each row has one entry per design element.
#[derive(Debug, Clone, PartialEq)]
pub struct NlpPoint {
    pub x: Vec<f64>,
    pub objective: f64,
    pub gradient: Vec<f64>,
    pub ineq: Vec<f64>,
    pub ineq_jacobian: Vec<Vec<f64>>,
    pub eq: Vec<f64>,
    pub eq_jacobian: Vec<Vec<f64>>,
}

impl NlpPoint {
    /// Builds a point from an evaluation and its Jacobian.
    ///
    /// `Lower` bounds are flipped so that their value and gradient read as
    /// `c <= 0`.
    #[must_use]
    pub fn new(evaluation: &Evaluation, jacobian: &Jacobian) -> Self {
        let mut point = Self {
            x: evaluation.design.clone(),
            objective: evaluation.responses.objective,
            gradient: jacobian.objective_gradient().to_vec(),
            ineq: Vec::new(),
            ineq_jacobian: Vec::new(),
            eq: Vec::new(),
            eq_jacobian: Vec::new(),
        };

        for (index, constraint) in evaluation.responses.constraints.iter().enumerate() {
            let sign = match constraint.bound {
                Bound::Lower(_) => -1.0,
                Bound::Upper(_) | Bound::Equal(_) => 1.0,
            };
            let row = jacobian
                .constraint_gradient(index)
                .iter()
                .map(|d| sign * d)
                .collect();

            if constraint.bound.is_equality() {
                point.eq.push(constraint.normalized());
                point.eq_jacobian.push(row);
            } else {
                point.ineq.push(constraint.normalized());
                point.ineq_jacobian.push(row);
            }
        }

        point
    }

    /// Returns the largest constraint violation (0 when feasible).
    #[must_use]
    pub fn max_violation(&self) -> f64 {
        let ineq = self.ineq.iter().map(|c| c.max(0.0));
        let eq = self.eq.iter().map(|h| h.abs());
        ineq.chain(eq).fold(0.0, f64::max)
    }
}

/// What the driver tells an optimizer about its last proposal.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The proposal (possibly clipped into bounds) was evaluated.
    Evaluated(NlpPoint),

    /// The proposal could not be evaluated.
    Failed,
}

/// Why an optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// First-order optimality reached within the optimizer's tolerances.
    Optimal,

    /// The optimizer concluded no feasible point is reachable.
    Infeasible,

    /// The optimizer ran out of its own iteration budget.
    IterationLimit,

    /// No further progress is possible.
    Stalled,
}

/// An optimizer's reply to an [`Outcome`].
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// Evaluate this design next.
    Propose(Vec<f64>),

    /// Stop.
    Finish(Termination),
}

/// A constrained optimizer driven in ask/tell form.
///
/// The driver owns evaluation: it calls [`start`](Optimizer::start) once,
/// evaluates every proposal, and reports each result through
/// [`step`](Optimizer::step) until the optimizer finishes. Optimizers never
/// call into the problem themselves.
pub trait Optimizer {
    /// Begins a run and returns the first design to evaluate.
    fn start(&mut self, x0: &[f64], bounds: &Bounds) -> Vec<f64>;

    /// Consumes the outcome of the last proposal.
    fn step(&mut self, outcome: Outcome) -> Step;
}
