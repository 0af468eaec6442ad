use tether_core::{AnalysisState, DesignError, Observer, Problem};
use tracing::{debug, info, info_span, warn};

use crate::{
    EvalError, Evaluation, coupling,
    derivative::{self, Jacobian, evaluate_with_jacobian},
};

use super::{
    Action, Config, DriverState, Error, Event, NlpPoint, OptimizationResult, Optimizer, Outcome,
    Point, Status, Step, Termination,
};

/// Runs an [`Optimizer`] against a [`Problem`].
///
/// The driver owns every evaluation. Each proposal is clipped into the
/// problem's design bounds, solved (warm-started from the last converged
/// state), differentiated by finite differences, and reported back to the
/// optimizer. Evaluation failures are reported as [`Outcome::Failed`] and
/// never abort the run on their own.
#[derive(Debug)]
pub struct Driver<'p> {
    problem: &'p Problem,
    config: Config,
}

impl<'p> Driver<'p> {
    #[must_use]
    pub fn new(problem: &'p Problem, config: Config) -> Self {
        Self { problem, config }
    }

    #[must_use]
    pub fn problem(&self) -> &'p Problem {
        self.problem
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Optimizes starting from `initial_design`.
    ///
    /// The observer receives one [`Event`] per proposal and can return
    /// [`Action::StopEarly`] to end the run.
    ///
    /// # Errors
    ///
    /// Returns an error only if `initial_design` has the wrong length or a
    /// non-finite element. Everything that goes wrong afterwards is reported
    /// through [`OptimizationResult::status`].
    pub fn run<O, Obs>(
        &self,
        optimizer: &mut O,
        initial_design: &[f64],
        mut observer: Obs,
    ) -> Result<OptimizationResult, Error>
    where
        O: Optimizer + ?Sized,
        Obs: for<'a> Observer<Event<'a>, Action>,
    {
        let bounds = self.problem.design_space().bounds();
        check_initial(bounds.len(), initial_design).map_err(Error::InitialDesign)?;

        let _span = info_span!("optimize", variables = bounds.len()).entered();

        let mut result = OptimizationResult {
            status: Status::Failed,
            state: DriverState::Initialized,
            design: self.clip(initial_design).map_err(Error::InitialDesign)?,
            objective: None,
            responses: None,
            analysis: None,
            iters: 0,
            evaluations: 0,
            last_feasible: None,
            last_error: None,
        };

        let mut proposal = optimizer.start(&result.design, bounds);
        let mut failures = 0;

        let status = loop {
            if result.iters >= self.config.max_iters() {
                info!(iters = result.iters, "iteration limit reached");
                break Status::Failed;
            }
            result.iters += 1;
            result.state = DriverState::Evaluating;

            let iter = result.iters;
            let (design, evaluated) = match self.clip(&proposal) {
                Ok(design) => {
                    let evaluated =
                        self.evaluate(&design, result.analysis.as_ref(), &mut result.evaluations);
                    (design, evaluated)
                }
                Err(error) => {
                    warn!(iter, %error, "malformed proposal");
                    let error = EvalError::Coupling(coupling::Error::Design(error));
                    (proposal.clone(), Err(derivative::Error::Base(error)))
                }
            };

            let outcome = match evaluated {
                Ok((evaluation, jacobian)) => {
                    failures = 0;
                    let action = observer.observe(&Event::Evaluated {
                        iter,
                        design: &design,
                        responses: &evaluation.responses,
                        jacobian: &jacobian,
                    });

                    let point = NlpPoint::new(&evaluation, &jacobian);
                    self.record(&mut result, evaluation);

                    if let Some(Action::StopEarly) = action {
                        break Status::StoppedByObserver;
                    }
                    Outcome::Evaluated(point)
                }
                Err(error) => {
                    failures += 1;
                    warn!(iter, %error, failures, "evaluation failed");
                    let action = observer.observe(&Event::Failed {
                        iter,
                        design: &design,
                        error: &error,
                    });
                    result.last_error = Some(error);

                    if let Some(Action::StopEarly) = action {
                        break Status::StoppedByObserver;
                    }
                    if failures > self.config.max_failed_evaluations() {
                        info!(failures, "too many consecutive failed evaluations");
                        break Status::Failed;
                    }
                    Outcome::Failed
                }
            };

            match optimizer.step(outcome) {
                Step::Propose(next) => proposal = next,
                Step::Finish(termination) => break self.classify(termination, &result),
            }
        };

        result.status = status;
        result.state = match status {
            Status::Optimal => DriverState::Converged,
            Status::StoppedByObserver => DriverState::Evaluating,
            Status::Infeasible | Status::Failed => DriverState::Failed,
        };

        info!(
            ?status,
            iters = result.iters,
            evaluations = result.evaluations,
            objective = result.objective,
            "optimization finished"
        );
        Ok(result)
    }

    /// Optimizes without observer support.
    ///
    /// # Errors
    ///
    /// See [`Driver::run`].
    pub fn run_unobserved<O>(
        &self,
        optimizer: &mut O,
        initial_design: &[f64],
    ) -> Result<OptimizationResult, Error>
    where
        O: Optimizer + ?Sized,
    {
        self.run(optimizer, initial_design, ())
    }

    /// Clamps a proposal into the design bounds.
    ///
    /// A proposal of the wrong length is rejected rather than truncated.
    fn clip(&self, proposal: &[f64]) -> Result<Vec<f64>, DesignError> {
        let bounds = self.problem.design_space().bounds();
        if proposal.len() != bounds.len() {
            return Err(DesignError::LengthMismatch {
                expected: bounds.len(),
                actual: proposal.len(),
            });
        }

        let clipped = bounds.clip(proposal);
        if clipped.as_slice() != proposal {
            warn!(?proposal, ?clipped, "proposal clipped into bounds");
        }
        Ok(clipped)
    }

    /// Evaluates a design and its Jacobian, retrying once from the declared
    /// defaults if the warm-started coupling solve fails.
    fn evaluate(
        &self,
        design: &[f64],
        guess: Option<&AnalysisState>,
        evaluations: &mut usize,
    ) -> Result<(Evaluation, Jacobian), derivative::Error> {
        let attempt = |guess: Option<&AnalysisState>| {
            evaluate_with_jacobian(
                self.problem,
                design,
                guess,
                self.config.coupling(),
                self.config.derivative(),
            )
        };

        *evaluations += 1;
        let result = match attempt(guess) {
            Err(derivative::Error::Base(EvalError::Coupling(error))) if guess.is_some() => {
                warn!(%error, "warm-started coupling solve failed, retrying from defaults");
                *evaluations += 1;
                attempt(None)
            }
            result => result,
        };

        if let Ok((_, jacobian)) = &result {
            *evaluations += jacobian.evaluations();
        }
        result
    }

    fn record(&self, result: &mut OptimizationResult, evaluation: Evaluation) {
        let objective = evaluation.responses.objective;
        let violation = evaluation.responses.max_violation();
        debug!(iter = result.iters, objective, violation, "design evaluated");

        if violation <= self.config.feasibility_tol() {
            result.last_feasible = Some(Point {
                design: evaluation.design.clone(),
                objective,
            });
        }

        result.design = evaluation.design;
        result.objective = Some(objective);
        result.responses = Some(evaluation.responses);
        result.analysis = Some(evaluation.solution.state);
    }

    fn classify(&self, termination: Termination, result: &OptimizationResult) -> Status {
        let feasible = result
            .responses
            .as_ref()
            .is_some_and(|responses| responses.is_feasible(self.config.feasibility_tol()));

        match termination {
            Termination::Optimal if feasible => Status::Optimal,
            Termination::Optimal | Termination::Infeasible => Status::Infeasible,
            Termination::IterationLimit | Termination::Stalled => Status::Failed,
        }
    }
}

fn check_initial(expected: usize, design: &[f64]) -> Result<(), DesignError> {
    if design.len() != expected {
        return Err(DesignError::LengthMismatch {
            expected,
            actual: design.len(),
        });
    }
    match design.iter().position(|x| !x.is_finite()) {
        Some(index) => Err(DesignError::NonFinite { index }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use tether_core::{
        Bound, Bounds, DesignVariable, DisciplineError, FnDiscipline, Response, ResponseSet,
        VariableSpec, Variables,
    };

    /// Minimize (x0 - 1)^2 + (x1 + 2)^2 on [-1, 1]^2 subject to x0 >= 0.5.
    fn bowl() -> Problem {
        Problem::builder()
            .design_variable(DesignVariable::with_bounds(
                "x",
                [0.0, 0.0],
                vec![-1.0, -1.0],
                vec![1.0, 1.0],
            ))
            .discipline(FnDiscipline::new(
                "bowl",
                vec![VariableSpec::new("x", [0.0, 0.0])],
                vec![VariableSpec::new("y", 0.0)],
                |i| {
                    let (a, b) = (i.element("x", 0)?, i.element("x", 1)?);
                    Ok(Variables::new().with("y", (a - 1.0).powi(2) + (b + 2.0).powi(2)))
                },
            ))
            .responses(
                ResponseSet::new(Response::new("f", &["y"], |s| s.scalar("y"))).constrain(
                    Response::new("g", &["x"], |s| s.element("x", 0)),
                    Bound::Lower(0.5),
                ),
            )
            .build()
            .unwrap()
    }

    /// Proposes a fixed list of designs, then finishes.
    struct Scripted {
        proposals: Vec<Vec<f64>>,
        finish: Termination,
        outcomes: Vec<Outcome>,
    }

    impl Scripted {
        fn new(proposals: Vec<Vec<f64>>, finish: Termination) -> Self {
            Self {
                proposals,
                finish,
                outcomes: Vec::new(),
            }
        }
    }

    impl Optimizer for Scripted {
        fn start(&mut self, x0: &[f64], _bounds: &Bounds) -> Vec<f64> {
            x0.to_vec()
        }

        fn step(&mut self, outcome: Outcome) -> Step {
            self.outcomes.push(outcome);
            if self.proposals.is_empty() {
                Step::Finish(self.finish)
            } else {
                Step::Propose(self.proposals.remove(0))
            }
        }
    }

    /// Proposes 0.5 for every element, forever.
    #[derive(Default)]
    struct Restless {
        len: usize,
    }

    impl Optimizer for Restless {
        fn start(&mut self, x0: &[f64], bounds: &Bounds) -> Vec<f64> {
            self.len = bounds.len();
            x0.to_vec()
        }

        fn step(&mut self, _outcome: Outcome) -> Step {
            Step::Propose(vec![0.5; self.len])
        }
    }

    #[test]
    fn never_evaluates_outside_bounds() {
        let problem = bowl();
        let driver = Driver::new(&problem, Config::default());
        let mut optimizer = Scripted::new(
            vec![vec![5.0, -7.0], vec![f64::NAN, 0.0], vec![0.75, 0.25]],
            Termination::Optimal,
        );

        let mut designs = Vec::new();
        let result = driver
            .run(&mut optimizer, &[3.0, 3.0], |event: &Event<'_>| -> Option<Action> {
                assert!(matches!(event, Event::Evaluated { .. }));
                designs.push(event.design().to_vec());
                None
            })
            .unwrap();

        assert_eq!(
            designs,
            vec![
                vec![1.0, 1.0],
                vec![1.0, -1.0],
                vec![-1.0, 0.0],
                vec![0.75, 0.25]
            ]
        );
        assert!(optimizer.outcomes.iter().all(|o| matches!(o, Outcome::Evaluated(_))));
        assert_eq!(result.status, Status::Optimal);
        assert_eq!(result.state, DriverState::Converged);
        assert_eq!(result.iters, 4);
        assert_eq!(result.design, vec![0.75, 0.25]);
        assert_relative_eq!(result.objective.unwrap(), 0.0625 + 5.0625);
    }

    #[test]
    fn optimal_at_infeasible_point_is_infeasible() {
        let problem = bowl();
        let driver = Driver::new(&problem, Config::default());
        let mut optimizer = Scripted::new(vec![vec![0.0, 0.0]], Termination::Optimal);

        let result = driver.run_unobserved(&mut optimizer, &[1.0, 0.0]).unwrap();

        assert_eq!(result.status, Status::Infeasible);
        assert_eq!(result.state, DriverState::Failed);
        assert_relative_eq!(result.max_violation().unwrap(), 0.5);

        let last_feasible = result.last_feasible.unwrap();
        assert_eq!(last_feasible.design, vec![1.0, 0.0]);
        assert_relative_eq!(last_feasible.objective, 4.0);
    }

    #[test]
    fn stalled_optimizer_fails() {
        let problem = bowl();
        let driver = Driver::new(&problem, Config::default());
        let mut optimizer = Scripted::new(vec![], Termination::Stalled);

        let result = driver.run_unobserved(&mut optimizer, &[1.0, 0.0]).unwrap();
        assert_eq!(result.status, Status::Failed);
    }

    #[test]
    fn iteration_limit() {
        let problem = bowl();
        let config = Config::new(5, 3, 1e-6).unwrap();
        let driver = Driver::new(&problem, config);

        let result = driver.run_unobserved(&mut Restless::default(), &[0.0, 0.0]).unwrap();

        assert_eq!(result.status, Status::Failed);
        assert_eq!(result.iters, 5);
        // Each proposal costs one base solve and one solve per design element.
        assert_eq!(result.evaluations, 15);
    }

    #[test]
    fn observer_can_stop_early() {
        let problem = bowl();
        let driver = Driver::new(&problem, Config::default());

        let result = driver
            .run(&mut Restless::default(), &[0.0, 0.0], |event: &Event<'_>| {
                (event.iter() == 2).then_some(Action::StopEarly)
            })
            .unwrap();

        assert_eq!(result.status, Status::StoppedByObserver);
        assert_eq!(result.state, DriverState::Evaluating);
        assert_eq!(result.iters, 2);
        assert_eq!(result.design, vec![0.5, 0.5]);
    }

    #[test]
    fn gives_up_after_consecutive_failures() {
        let problem = Problem::builder()
            .design_variable(DesignVariable::new("x", 0.0, -1.0, 1.0))
            .discipline(FnDiscipline::new(
                "broken",
                vec![VariableSpec::new("x", 0.0)],
                vec![VariableSpec::new("y", 0.0)],
                |_| Err(DisciplineError::failed("broken", "always")),
            ))
            .responses(ResponseSet::new(Response::new("f", &["y"], |s| s.scalar("y"))))
            .build()
            .unwrap();
        let config = Config::new(100, 2, 1e-6).unwrap();
        let driver = Driver::new(&problem, config);

        let result = driver.run_unobserved(&mut Restless::default(), &[0.0]).unwrap();

        assert_eq!(result.status, Status::Failed);
        assert_eq!(result.iters, 3);
        assert_eq!(result.evaluations, 3);
        assert_eq!(result.state, DriverState::Failed);
        assert!(result.objective.is_none());
        assert!(matches!(
            result.last_error,
            Some(derivative::Error::Base(EvalError::Coupling(_)))
        ));
    }

    #[test]
    fn wrong_length_proposal_is_a_failed_evaluation() {
        let problem = bowl();
        let driver = Driver::new(&problem, Config::default());
        let mut optimizer = Scripted::new(
            vec![vec![0.75, 0.25, 9.0], vec![0.5]],
            Termination::Optimal,
        );

        let mut failed = Vec::new();
        let result = driver
            .run(&mut optimizer, &[0.75, 0.25], |event: &Event<'_>| -> Option<Action> {
                if let Event::Failed { design, .. } = event {
                    failed.push(design.to_vec());
                }
                None
            })
            .unwrap();

        assert_eq!(failed, vec![vec![0.75, 0.25, 9.0], vec![0.5]]);
        assert_eq!(result.iters, 3);
        assert_eq!(result.evaluations, 3);
        assert_eq!(result.design, vec![0.75, 0.25]);
        assert!(matches!(
            optimizer.outcomes.as_slice(),
            [Outcome::Evaluated(_), Outcome::Failed, Outcome::Failed]
        ));
        assert_eq!(
            result.last_error,
            Some(derivative::Error::Base(EvalError::Coupling(
                coupling::Error::Design(DesignError::LengthMismatch {
                    expected: 2,
                    actual: 1
                })
            )))
        );
    }

    #[test]
    fn rejects_malformed_initial_design() {
        let problem = bowl();
        let driver = Driver::new(&problem, Config::default());

        let err = driver.run_unobserved(&mut Restless::default(), &[0.0]).unwrap_err();
        assert_eq!(
            err,
            Error::InitialDesign(DesignError::LengthMismatch {
                expected: 2,
                actual: 1
            })
        );

        let err = driver
            .run_unobserved(&mut Restless::default(), &[0.0, f64::INFINITY])
            .unwrap_err();
        assert_eq!(err, Error::InitialDesign(DesignError::NonFinite { index: 1 }));
    }
}
