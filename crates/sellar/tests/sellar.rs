use std::sync::Arc;

use approx::assert_relative_eq;

use tether_sellar::{NativeKernels, Report, problem};
use tether_solvers::{
    EvalError, coupling, evaluate,
    derivative::{self, Scheme},
    optimization::{
        Action, AugmentedLagrangian, Config, Driver, DriverState, Event, Status,
    },
};

fn sellar() -> tether_core::Problem {
    problem(Arc::new(NativeKernels::new())).unwrap()
}

#[test]
fn analysis_at_the_default_design() {
    let problem = sellar();
    let evaluation = evaluate(
        &problem,
        &[1.0, 5.0, 2.0],
        None,
        &coupling::Config::default(),
    )
    .unwrap();

    let state = evaluation.state();
    assert_relative_eq!(state.scalar("y1").unwrap(), 25.588, epsilon = 1e-3);
    assert_relative_eq!(state.scalar("y2").unwrap(), 12.0585, epsilon = 1e-3);
    assert_relative_eq!(evaluation.responses.objective, 28.588, epsilon = 1e-3);
    assert!(evaluation.responses.constraint("g1").unwrap().value < 0.0);
    assert!(evaluation.responses.constraint("g2").unwrap().value < 0.0);
    assert!(evaluation.responses.is_feasible(0.0));
}

#[test]
fn zero_coupling_budget_cannot_converge() {
    let problem = sellar();
    let config = coupling::Config::new(0, 1e-10, 1e-10).unwrap();

    let err = evaluate(&problem, &[1.0, 5.0, 2.0], None, &config).unwrap_err();
    assert!(matches!(
        err,
        EvalError::Coupling(coupling::Error::Convergence { .. })
    ));
}

#[test]
fn augmented_lagrangian_finds_the_known_optimum() {
    let problem = sellar();
    let driver = Driver::new(&problem, Config::default());

    let result = driver
        .run_unobserved(
            &mut AugmentedLagrangian::default(),
            &problem.design_space().initial(),
        )
        .unwrap();

    assert_eq!(result.status, Status::Optimal);
    assert_eq!(result.state, DriverState::Converged);
    assert_relative_eq!(result.objective.unwrap(), 3.18339, epsilon = 1e-3);
    assert_relative_eq!(result.design[0], 0.0, epsilon = 1e-3);
    assert_relative_eq!(result.design[1], 1.97764, epsilon = 1e-2);
    assert_relative_eq!(result.design[2], 0.0, epsilon = 1e-3);

    let g1 = result.responses.as_ref().unwrap().constraint("g1").unwrap();
    assert_relative_eq!(g1.value, 0.0, epsilon = 1e-3);
    assert!(result.evaluations > result.iters);

    let report = Report::from_result(&problem, &result).unwrap();
    assert!(report.to_string().starts_with("minimum found at"));
}

#[test]
fn central_differences_reach_the_same_optimum() {
    let problem = sellar();
    let derivative = derivative::Config::new(1e-6, Scheme::Central).unwrap();
    let driver = Driver::new(&problem, Config::default().with_derivative(derivative));

    let result = driver
        .run_unobserved(
            &mut AugmentedLagrangian::default(),
            &problem.design_space().initial(),
        )
        .unwrap();

    assert_eq!(result.status, Status::Optimal);
    assert_relative_eq!(result.objective.unwrap(), 3.18339, epsilon = 1e-3);
}

#[test]
fn every_evaluated_design_is_within_bounds() {
    let problem = sellar();
    let bounds = problem.design_space().bounds().clone();
    let driver = Driver::new(&problem, Config::default());

    let mut count = 0;
    driver
        .run(
            &mut AugmentedLagrangian::default(),
            &[10.0, 10.0, 10.0],
            |event: &Event<'_>| -> Option<Action> {
                assert!(bounds.contains(event.design()));
                count += 1;
                None
            },
        )
        .unwrap();

    assert!(count > 0);
}

#[test]
fn undefined_initial_design_fails_cleanly() {
    let problem = sellar();
    let driver = Driver::new(&problem, Config::default());

    let result = driver
        .run_unobserved(&mut AugmentedLagrangian::default(), &[0.0, 0.0, 0.0])
        .unwrap();

    assert_eq!(result.status, Status::Failed);
    assert_eq!(result.objective, None);
    assert!(result.last_error.is_some());
    assert_eq!(result.design, vec![0.0, 0.0, 0.0]);
}
