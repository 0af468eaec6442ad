use approx::assert_relative_eq;

use tether_core::{
    Bound, DesignVariable, FnDiscipline, Problem, Response, ResponseSet, VariableSpec, Variables,
};
use tether_solvers::{
    coupling,
    derivative::{self, Scheme},
    optimization::{AugmentedLagrangian, Config, Driver, DriverState, Status},
};

/// a = 0.5 b + x and b = 0.5 a, so a = 4x/3 at the fixed point.
///
/// Minimizes `(a - 4)²` subject to `x <= 2`; the unconstrained minimum at
/// `x = 3` is cut off and the optimum sits on the constraint.
fn coupled_bowl() -> Problem {
    Problem::builder()
        .design_variable(DesignVariable::new("x", 0.0, -5.0, 5.0))
        .discipline(FnDiscipline::new(
            "da",
            vec![VariableSpec::new("x", 0.0), VariableSpec::new("b", 0.0)],
            vec![VariableSpec::new("a", 0.0)],
            |i| Ok(Variables::new().with("a", 0.5 * i.scalar("b")? + i.scalar("x")?)),
        ))
        .discipline(FnDiscipline::new(
            "db",
            vec![VariableSpec::new("a", 0.0)],
            vec![VariableSpec::new("b", 0.0)],
            |i| Ok(Variables::new().with("b", 0.5 * i.scalar("a")?)),
        ))
        .responses(
            ResponseSet::new(Response::new("f", &["a"], |s| Ok((s.scalar("a")? - 4.0).powi(2))))
                .constrain(Response::new("g", &["x"], |s| s.scalar("x")), Bound::Upper(2.0)),
        )
        .build()
        .unwrap()
}

#[test]
fn total_derivative_through_a_cycle() {
    let problem = coupled_bowl();
    let config = derivative::Config::new(1e-6, Scheme::Central).unwrap();

    let (base, jacobian) = derivative::evaluate_with_jacobian(
        &problem,
        &[1.5],
        None,
        &coupling::Config::new(200, 1e-14, 0.0).unwrap(),
        &config,
    )
    .unwrap();

    // df/dx = 2 (a - 4) da/dx with a = 2 and da/dx = 4/3.
    assert_relative_eq!(base.state().scalar("a").unwrap(), 2.0, epsilon = 1e-9);
    assert_relative_eq!(jacobian.get(0, 0), -16.0 / 3.0, epsilon = 1e-4);
    assert_relative_eq!(jacobian.get(1, 0), 1.0, epsilon = 1e-6);
    assert_eq!(jacobian.evaluations(), 2);
}

#[test]
fn driver_stops_on_the_active_constraint() {
    let problem = coupled_bowl();
    let driver = Driver::new(&problem, Config::default());

    let result = driver
        .run_unobserved(&mut AugmentedLagrangian::default(), &[0.0])
        .unwrap();

    assert_eq!(result.status, Status::Optimal);
    assert_eq!(result.state, DriverState::Converged);
    assert_relative_eq!(result.design[0], 2.0, epsilon = 1e-3);
    assert_relative_eq!(result.objective.unwrap(), 16.0 / 9.0, epsilon = 1e-3);

    let last_feasible = result.last_feasible.unwrap();
    assert!(last_feasible.design[0] <= 2.0 + 1e-6);
    assert!(result.analysis.unwrap().contains("b"));
}

#[test]
fn unreachable_budget_reports_failure_with_diagnostics() {
    let problem = coupled_bowl();
    let config = Config::new(2, 3, 1e-6).unwrap();
    let driver = Driver::new(&problem, config);

    let result = driver
        .run_unobserved(&mut AugmentedLagrangian::default(), &[0.0])
        .unwrap();

    assert_eq!(result.status, Status::Failed);
    assert_eq!(result.state, DriverState::Failed);
    assert_eq!(result.iters, 2);
    assert!(result.objective.is_some());
    assert!(result.last_feasible.is_some());
}
