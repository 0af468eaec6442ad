//! Fixed-point solver for coupled disciplines.
//!
//! # Algorithm
//!
//! The problem's evaluation plan lists groups of disciplines in topological
//! order. A discipline outside any feedback cycle is evaluated exactly once,
//! after everything it depends on, so an acyclic problem is solved by a
//! single sweep no matter how tight the tolerances are.
//!
//! A feedback cycle is resolved by nonlinear block Gauss-Seidel: its
//! disciplines are evaluated in declaration order, each one immediately
//! overwriting its outputs in the state, and the sweep is repeated until no
//! coupling variable changes by more than the configured tolerance.
//!
//! # Observer Events
//!
//! The solver emits one [`Event`] per sweep of each cycle. Acyclic stages
//! emit nothing. Observers can return [`Action::Abort`] to stop the solve
//! with [`Error::Aborted`].
//!
//! # Errors
//!
//! A cycle that does not converge within [`Config::max_iters`] sweeps fails
//! with [`Error::Convergence`]. A non-converged state is never returned.

mod action;
mod config;
mod error;
mod event;
mod solution;

pub use action::Action;
pub use config::{Config, ConfigError};
pub use error::Error;
pub use event::Event;
pub use solution::Solution;

use tether_core::{AnalysisState, Observer, Problem, Stage, Value, evaluate_checked};
use tracing::{debug, debug_span, trace};

/// Solves the coupled analysis at `design`, starting every coupling
/// variable from its declared default.
///
/// # Errors
///
/// Returns an error if the design is invalid, a discipline fails, a cycle
/// does not converge, or the observer aborts.
pub fn solve<Obs>(
    problem: &Problem,
    design: &[f64],
    config: &Config,
    observer: Obs,
) -> Result<Solution, Error>
where
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    let design = problem.design_space().unflatten(design)?;
    run(problem, problem.initial_state(&design), config, observer)
}

/// Solves the coupled analysis at `design` without observer support.
///
/// # Errors
///
/// See [`solve`].
pub fn solve_unobserved(
    problem: &Problem,
    design: &[f64],
    config: &Config,
) -> Result<Solution, Error> {
    solve(problem, design, config, ())
}

/// Solves the coupled analysis at `design`, starting coupling variables
/// from `guess` (typically a previously converged state).
///
/// Design values in `guess` are ignored. `guess` is only read.
///
/// # Errors
///
/// See [`solve`].
pub fn solve_from<Obs>(
    problem: &Problem,
    design: &[f64],
    guess: &AnalysisState,
    config: &Config,
    observer: Obs,
) -> Result<Solution, Error>
where
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    let design = problem.design_space().unflatten(design)?;
    run(problem, problem.warm_state(&design, guess), config, observer)
}

/// Warm-started solve without observer support.
///
/// # Errors
///
/// See [`solve`].
pub fn solve_from_unobserved(
    problem: &Problem,
    design: &[f64],
    guess: &AnalysisState,
    config: &Config,
) -> Result<Solution, Error> {
    solve_from(problem, design, guess, config, ())
}

fn run<Obs>(
    problem: &Problem,
    mut state: AnalysisState,
    config: &Config,
    mut observer: Obs,
) -> Result<Solution, Error>
where
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    let _span = debug_span!("coupling", stages = problem.plan().len()).entered();

    let mut solution = Solution {
        state: AnalysisState::new(),
        iters: 1,
        residual: 0.0,
        evaluations: 0,
    };

    for (stage_index, stage) in problem.plan().iter().enumerate() {
        match stage {
            Stage::Single(index) => {
                evaluate_into(problem, *index, &mut state)?;
                solution.evaluations += 1;
            }
            Stage::Cycle(members) => {
                let report = iterate_cycle(
                    problem,
                    stage_index,
                    members,
                    &mut state,
                    config,
                    &mut observer,
                )?;
                solution.iters = solution.iters.max(report.iters);
                solution.residual = solution.residual.max(report.residual);
                solution.evaluations += report.iters * members.len();
            }
        }
    }

    solution.state = state;
    Ok(solution)
}

struct CycleReport {
    iters: usize,
    residual: f64,
}

/// Sweeps one cycle until its coupling variables stop changing.
fn iterate_cycle<Obs>(
    problem: &Problem,
    stage: usize,
    members: &[usize],
    state: &mut AnalysisState,
    config: &Config,
    observer: &mut Obs,
) -> Result<CycleReport, Error>
where
    Obs: for<'a> Observer<Event<'a>, Action>,
{
    let coupling: Vec<&str> = members
        .iter()
        .flat_map(|&index| problem.disciplines()[index].outputs())
        .map(|spec| spec.name.as_str())
        .collect();

    let mut residual = f64::INFINITY;

    for iter in 1..=config.max_iters() {
        let previous = coupling
            .iter()
            .map(|name| state.get(name).cloned())
            .collect::<Result<Vec<Value>, _>>()?;

        for &index in members {
            evaluate_into(problem, index, state)?;
        }

        let mut scale = 0.0_f64;
        residual = 0.0;
        for (name, old) in coupling.iter().zip(&previous) {
            let new = state.get(name)?;
            residual = residual.max(new.max_abs_diff(old));
            scale = scale.max(new.max_abs());
        }
        let relative_residual = if scale > 0.0 { residual / scale } else { residual };

        trace!(stage, iter, residual, relative_residual, "coupling sweep");

        let event = Event {
            stage,
            iter,
            residual,
            relative_residual,
            state: &*state,
        };
        if let Some(Action::Abort) = observer.observe(&event) {
            return Err(Error::Aborted);
        }

        if residual <= config.abs_tol() || relative_residual <= config.rel_tol() {
            debug!(stage, iter, residual, "cycle converged");
            return Ok(CycleReport { iters: iter, residual });
        }
    }

    let cycle: Vec<String> = members
        .iter()
        .map(|&index| problem.disciplines()[index].name().to_owned())
        .collect();
    debug!(?cycle, residual, "cycle did not converge");

    Err(Error::Convergence {
        cycle,
        iters: config.max_iters(),
        residual,
    })
}

/// Evaluates one discipline and writes its outputs into the state.
fn evaluate_into(problem: &Problem, index: usize, state: &mut AnalysisState) -> Result<(), Error> {
    let discipline = problem.disciplines()[index].as_ref();
    let inputs = problem.inputs_for(index, state)?;
    let outputs = evaluate_checked(discipline, &inputs)?;

    for spec in discipline.outputs() {
        state.insert(spec.name.clone(), outputs.get(&spec.name)?.clone());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use tether_core::{
        DesignVariable, DisciplineError, FnDiscipline, Response, ResponseSet, VariableSpec,
        Variables,
    };

    /// u = 2x, v = u + 1, w = v * x: a chain with no feedback.
    fn chain(calls: Arc<AtomicUsize>) -> Problem {
        let count = move |calls: &Arc<AtomicUsize>| {
            calls.fetch_add(1, Ordering::Relaxed);
        };
        let (c1, c2, c3) = (calls.clone(), calls.clone(), calls);

        Problem::builder()
            .design_variable(DesignVariable::new("x", 3.0, -10.0, 10.0))
            .discipline(FnDiscipline::new(
                "c",
                vec![VariableSpec::new("v", 0.0), VariableSpec::new("x", 0.0)],
                vec![VariableSpec::new("w", 0.0)],
                move |i| {
                    count(&c3);
                    Ok(Variables::new().with("w", i.scalar("v")? * i.scalar("x")?))
                },
            ))
            .discipline(FnDiscipline::new(
                "a",
                vec![VariableSpec::new("x", 0.0)],
                vec![VariableSpec::new("u", 0.0)],
                move |i| {
                    count(&c1);
                    Ok(Variables::new().with("u", 2.0 * i.scalar("x")?))
                },
            ))
            .discipline(FnDiscipline::new(
                "b",
                vec![VariableSpec::new("u", 0.0)],
                vec![VariableSpec::new("v", 0.0)],
                move |i| {
                    count(&c2);
                    Ok(Variables::new().with("v", i.scalar("u")? + 1.0))
                },
            ))
            .responses(ResponseSet::new(Response::new("f", &["w"], |s| s.scalar("w"))))
            .build()
            .unwrap()
    }

    /// a = 0.5 b + x, b = 0.5 a: a linear contraction with a = 4x/3, b = 2x/3.
    fn linear_cycle() -> Problem {
        Problem::builder()
            .design_variable(DesignVariable::new("x", 3.0, -10.0, 10.0))
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
            .responses(ResponseSet::new(Response::new("f", &["a"], |s| s.scalar("a"))))
            .build()
            .unwrap()
    }

    #[test]
    fn acyclic_chain_takes_one_sweep_regardless_of_tolerance() {
        let calls = Arc::new(AtomicUsize::new(0));
        let problem = chain(calls.clone());

        let config = Config::new(100, 0.0, 0.0).unwrap();
        let mut events = 0;
        let solution = solve(&problem, &[3.0], &config, |_: &Event<'_>| -> Option<Action> {
            events += 1;
            None
        })
        .unwrap();

        assert_eq!(solution.iters, 1);
        assert_eq!(solution.evaluations, 3);
        assert_eq!(calls.load(Ordering::Relaxed), 3);
        assert_eq!(events, 0);
        assert_eq!(solution.state.scalar("w"), Ok(21.0));
    }

    #[test]
    fn acyclic_chain_ignores_iteration_cap() {
        let problem = chain(Arc::new(AtomicUsize::new(0)));
        let config = Config::new(0, 1e-10, 1e-10).unwrap();
        let solution = solve_unobserved(&problem, &[1.0], &config).unwrap();
        assert_eq!(solution.state.scalar("w"), Ok(3.0));
    }

    #[test]
    fn linear_cycle_converges_to_fixed_point() {
        let problem = linear_cycle();
        let solution = solve_unobserved(&problem, &[3.0], &Config::default()).unwrap();

        assert_relative_eq!(solution.state.scalar("a").unwrap(), 4.0, epsilon = 1e-9);
        assert_relative_eq!(solution.state.scalar("b").unwrap(), 2.0, epsilon = 1e-9);
        assert!(solution.iters > 1);
    }

    #[test]
    fn contraction_residuals_decrease_monotonically() {
        let problem = linear_cycle();
        let mut residuals = Vec::new();
        solve(&problem, &[3.0], &Config::default(), |event: &Event<'_>| -> Option<Action> {
            residuals.push(event.residual);
            None
        })
        .unwrap();

        assert!(residuals.len() > 2);
        assert!(residuals.windows(2).all(|pair| pair[1] < pair[0]));
    }

    #[test]
    fn zero_iterations_is_a_convergence_error() {
        let problem = linear_cycle();
        let config = Config::new(0, 1e-10, 1e-10).unwrap();

        let err = solve_unobserved(&problem, &[3.0], &config).unwrap_err();
        assert!(matches!(
            err,
            Error::Convergence { iters: 0, ref cycle, .. } if cycle == &["da", "db"]
        ));
        assert!(err.is_recoverable());
    }

    #[test]
    fn too_few_iterations_is_a_convergence_error() {
        let problem = linear_cycle();
        let config = Config::new(3, 1e-12, 0.0).unwrap();

        let Err(Error::Convergence { iters, residual, .. }) =
            solve_unobserved(&problem, &[3.0], &config)
        else {
            panic!("expected a convergence error");
        };
        assert_eq!(iters, 3);
        assert!(residual > 1e-12 && residual.is_finite());
    }

    #[test]
    fn solve_is_idempotent() {
        let problem = linear_cycle();
        let first = solve_unobserved(&problem, &[2.5], &Config::default()).unwrap();
        let second = solve_unobserved(&problem, &[2.5], &Config::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn warm_start_needs_fewer_sweeps() {
        let problem = linear_cycle();
        let config = Config::default();
        let cold = solve_unobserved(&problem, &[3.0], &config).unwrap();
        let warm = solve_from_unobserved(&problem, &[3.0], &cold.state, &config).unwrap();

        assert!(warm.iters < cold.iters);
        assert_relative_eq!(
            warm.state.scalar("a").unwrap(),
            cold.state.scalar("a").unwrap(),
            epsilon = 1e-9
        );
    }

    #[test]
    fn observer_can_abort() {
        let problem = linear_cycle();
        let err = solve(&problem, &[3.0], &Config::default(), |_: &Event<'_>| {
            Some(Action::Abort)
        })
        .unwrap_err();
        assert_eq!(err, Error::Aborted);
    }

    #[test]
    fn discipline_failure_propagates() {
        let problem = Problem::builder()
            .design_variable(DesignVariable::new("x", 1.0, -1.0, 1.0))
            .discipline(FnDiscipline::new(
                "broken",
                vec![VariableSpec::new("x", 0.0)],
                vec![VariableSpec::new("y", 0.0)],
                |_| Err(DisciplineError::failed("broken", "native routine returned status 3")),
            ))
            .responses(ResponseSet::new(Response::new("f", &["y"], |s| s.scalar("y"))))
            .build()
            .unwrap();

        let err = solve_unobserved(&problem, &[0.0], &Config::default()).unwrap_err();
        assert!(matches!(err, Error::Discipline(DisciplineError::Failed { .. })));
    }

    #[test]
    fn out_of_bounds_design_is_rejected() {
        let problem = linear_cycle();
        let err = solve_unobserved(&problem, &[11.0], &Config::default()).unwrap_err();
        assert!(matches!(err, Error::Design(_)));
        assert!(!err.is_recoverable());
    }
}
