use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::{
    AnalysisState, CouplingGraph, DesignSpace, DesignVariable, Discipline, ResponseSet, Stage,
    StateError, Value, Variables, graph::Source, graph::Target,
};

/// Errors in how a problem is wired together.
///
/// These indicate an assembly bug and are raised by
/// [`ProblemBuilder::build`] before any solving starts.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum WiringError {
    #[error("`{context}` references undefined variable `{name}`")]
    UndefinedVariable { context: String, name: String },

    #[error("unknown discipline `{0}`")]
    UnknownDiscipline(String),

    #[error("discipline `{0}` is declared more than once")]
    DuplicateDiscipline(String),

    #[error("design variable `{0}` is declared more than once")]
    DuplicateDesignVariable(String),

    #[error("`{variable}` is produced by both `{first}` and `{second}`")]
    DuplicateProducer {
        variable: String,
        first: String,
        second: String,
    },

    #[error("output `{variable}` of `{discipline}` shadows a design variable")]
    ShadowsDesignVariable { variable: String, discipline: String },

    #[error("input `{input}` of `{discipline}` is fed more than once")]
    InputFedTwice { discipline: String, input: String },

    #[error("`{variable}` has {actual} elements where {expected} are expected")]
    ShapeMismatch {
        variable: String,
        expected: usize,
        actual: usize,
    },

    #[error("design variable `{0}` has invalid bounds")]
    InvalidBounds(String),

    #[error("a problem needs at least one design variable")]
    NoDesignVariables,
}

/// Where a discipline input takes its value from.
#[derive(Debug, Clone, PartialEq)]
enum InputSource {
    /// A design variable or a discipline output, by state key.
    State(String),

    /// The input's declared default.
    Constant(Value),
}

/// An assembled, validated coupled-analysis problem.
///
/// A problem is read-only after assembly and can be shared between threads.
pub struct Problem {
    disciplines: Vec<Box<dyn Discipline>>,
    graph: CouplingGraph,
    plan: Vec<Stage>,
    design: DesignSpace,
    responses: ResponseSet,
    sources: Vec<Vec<(String, InputSource)>>,
}

impl Problem {
    /// Starts assembling a problem.
    #[must_use]
    pub fn builder() -> ProblemBuilder {
        ProblemBuilder::default()
    }

    #[must_use]
    pub fn disciplines(&self) -> &[Box<dyn Discipline>] {
        &self.disciplines
    }

    #[must_use]
    pub fn graph(&self) -> &CouplingGraph {
        &self.graph
    }

    /// Returns the evaluation plan, in topological order.
    #[must_use]
    pub fn plan(&self) -> &[Stage] {
        &self.plan
    }

    #[must_use]
    pub fn design_space(&self) -> &DesignSpace {
        &self.design
    }

    #[must_use]
    pub fn responses(&self) -> &ResponseSet {
        &self.responses
    }

    /// Returns the number of constraints.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.responses.constraints().len()
    }

    /// Builds a state from design values and the declared output defaults.
    #[must_use]
    pub fn initial_state(&self, design: &Variables) -> AnalysisState {
        let mut state = design.clone();
        for discipline in &self.disciplines {
            for spec in discipline.outputs() {
                state.insert(spec.name.clone(), spec.default.clone());
            }
        }
        state
    }

    /// Builds a state from design values, taking coupling variables from
    /// `guess` where present and from the declared defaults otherwise.
    #[must_use]
    pub fn warm_state(&self, design: &Variables, guess: &AnalysisState) -> AnalysisState {
        let mut state = self.initial_state(design);
        for discipline in &self.disciplines {
            for spec in discipline.outputs() {
                if let Ok(value) = guess.get(&spec.name) {
                    if value.len() == spec.default.len() {
                        state.insert(spec.name.clone(), value.clone());
                    }
                }
            }
        }
        state
    }

    /// Gathers the inputs of discipline `index` from the current state.
    ///
    /// # Errors
    ///
    /// Returns an error if a connected variable is missing from `state`.
    pub fn inputs_for(&self, index: usize, state: &AnalysisState) -> Result<Variables, StateError> {
        let mut inputs = Variables::new();
        for (name, source) in &self.sources[index] {
            let value = match source {
                InputSource::State(key) => state.get(key)?.clone(),
                InputSource::Constant(value) => value.clone(),
            };
            inputs.insert(name.clone(), value);
        }
        Ok(inputs)
    }
}

impl std::fmt::Debug for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.disciplines.iter().map(|d| d.name()).collect();
        f.debug_struct("Problem")
            .field("disciplines", &names)
            .field("plan", &self.plan)
            .field("design", &self.design)
            .field("responses", &self.responses)
            .finish_non_exhaustive()
    }
}

/// Assembles a [`Problem`].
///
/// Outputs are promoted by name: an output named `y1` feeds every input
/// named `y1` unless that input is connected explicitly with
/// [`ProblemBuilder::connect`]. Inputs that are neither connected nor a
/// design variable keep their declared default as a constant.
#[derive(Default)]
pub struct ProblemBuilder {
    disciplines: Vec<Box<dyn Discipline>>,
    design: Vec<DesignVariable>,
    connections: Vec<(Source, Target)>,
    responses: Option<ResponseSet>,
}

impl ProblemBuilder {
    /// Adds a discipline.
    #[must_use]
    pub fn discipline(mut self, discipline: impl Discipline + 'static) -> Self {
        self.disciplines.push(Box::new(discipline));
        self
    }

    /// Adds a boxed discipline.
    #[must_use]
    pub fn boxed_discipline(mut self, discipline: Box<dyn Discipline>) -> Self {
        self.disciplines.push(discipline);
        self
    }

    /// Declares a design variable.
    #[must_use]
    pub fn design_variable(mut self, variable: DesignVariable) -> Self {
        self.design.push(variable);
        self
    }

    /// Connects an output to a differently named input.
    #[must_use]
    pub fn connect<S: Into<Source>, T: Into<Target>>(mut self, source: S, target: T) -> Self {
        self.connections.push((source.into(), target.into()));
        self
    }

    /// Sets the objective and constraints.
    #[must_use]
    pub fn responses(mut self, responses: ResponseSet) -> Self {
        self.responses = Some(responses);
        self
    }

    /// Validates the wiring and builds the problem.
    ///
    /// # Errors
    ///
    /// Returns the first wiring error found. A problem without responses
    /// fails with [`WiringError::UndefinedVariable`] for the objective.
    pub fn build(self) -> Result<Problem, WiringError> {
        let Self {
            disciplines,
            design,
            connections,
            responses,
        } = self;

        let responses = responses.ok_or_else(|| WiringError::UndefinedVariable {
            context: "problem".into(),
            name: "objective".into(),
        })?;

        if design.is_empty() {
            return Err(WiringError::NoDesignVariables);
        }

        let mut design_shapes: HashMap<&str, usize> = HashMap::new();
        for variable in &design {
            let len = variable.default.len();
            let valid = variable.lower.len() == len
                && variable.upper.len() == len
                && variable
                    .lower
                    .iter()
                    .zip(&variable.upper)
                    .all(|(lo, hi)| !lo.is_nan() && !hi.is_nan() && lo <= hi);
            if !valid || !variable.default.is_finite() {
                return Err(WiringError::InvalidBounds(variable.name.clone()));
            }
            if design_shapes.insert(&variable.name, len).is_some() {
                return Err(WiringError::DuplicateDesignVariable(variable.name.clone()));
            }
        }

        let mut graph = CouplingGraph::new();
        let mut producers: HashMap<&str, (usize, usize)> = HashMap::new();
        for (index, discipline) in disciplines.iter().enumerate() {
            if graph.index_of(discipline.name()).is_some() {
                return Err(WiringError::DuplicateDiscipline(discipline.name().to_owned()));
            }
            graph.add_discipline(discipline.name());

            for spec in discipline.outputs() {
                if design_shapes.contains_key(spec.name.as_str()) {
                    return Err(WiringError::ShadowsDesignVariable {
                        variable: spec.name.clone(),
                        discipline: discipline.name().to_owned(),
                    });
                }
                if let Some((first, _)) = producers.insert(&spec.name, (index, spec.default.len()))
                {
                    return Err(WiringError::DuplicateProducer {
                        variable: spec.name.clone(),
                        first: disciplines[first].name().to_owned(),
                        second: discipline.name().to_owned(),
                    });
                }
            }
        }

        let find = |name: &str| {
            disciplines
                .iter()
                .position(|d| d.name() == name)
                .ok_or_else(|| WiringError::UnknownDiscipline(name.to_owned()))
        };

        let mut explicit: HashMap<(usize, &str), &str> = HashMap::new();
        for (source, target) in &connections {
            let from = find(&source.discipline)?;
            let to = find(&target.discipline)?;

            let output = disciplines[from]
                .outputs()
                .iter()
                .find(|spec| spec.name == source.output)
                .ok_or_else(|| WiringError::UndefinedVariable {
                    context: source.discipline.clone(),
                    name: source.output.clone(),
                })?;
            let input = disciplines[to]
                .inputs()
                .iter()
                .find(|spec| spec.name == target.input)
                .ok_or_else(|| WiringError::UndefinedVariable {
                    context: target.discipline.clone(),
                    name: target.input.clone(),
                })?;

            check_shape(&input.name, input.default.len(), output.default.len())?;

            if explicit
                .insert((to, target.input.as_str()), source.output.as_str())
                .is_some()
            {
                return Err(WiringError::InputFedTwice {
                    discipline: target.discipline.clone(),
                    input: target.input.clone(),
                });
            }
            graph.connect(source.clone(), target.clone());
        }

        let mut sources = Vec::with_capacity(disciplines.len());
        for (index, discipline) in disciplines.iter().enumerate() {
            let mut seen = HashSet::new();
            let mut discipline_sources = Vec::with_capacity(discipline.inputs().len());

            for spec in discipline.inputs() {
                if !seen.insert(spec.name.as_str()) {
                    return Err(WiringError::InputFedTwice {
                        discipline: discipline.name().to_owned(),
                        input: spec.name.clone(),
                    });
                }
                let expected = spec.default.len();

                let source = if let Some(&output) = explicit.get(&(index, spec.name.as_str())) {
                    InputSource::State(output.to_owned())
                } else if let Some(&(producer, len)) = producers.get(spec.name.as_str()) {
                    check_shape(&spec.name, expected, len)?;
                    graph.connect(
                        Source::new(disciplines[producer].name(), spec.name.as_str()),
                        Target::new(discipline.name(), spec.name.as_str()),
                    );
                    InputSource::State(spec.name.clone())
                } else if let Some(&len) = design_shapes.get(spec.name.as_str()) {
                    check_shape(&spec.name, expected, len)?;
                    InputSource::State(spec.name.clone())
                } else {
                    InputSource::Constant(spec.default.clone())
                };
                discipline_sources.push((spec.name.clone(), source));
            }
            sources.push(discipline_sources);
        }

        for response in responses.responses() {
            for name in response.reads() {
                if !producers.contains_key(name.as_str())
                    && !design_shapes.contains_key(name.as_str())
                {
                    return Err(WiringError::UndefinedVariable {
                        context: response.name().to_owned(),
                        name: name.clone(),
                    });
                }
            }
        }

        let plan = graph.plan();

        Ok(Problem {
            disciplines,
            graph,
            plan,
            design: DesignSpace::new(design),
            responses,
            sources,
        })
    }
}

fn check_shape(variable: &str, expected: usize, actual: usize) -> Result<(), WiringError> {
    if expected == actual {
        Ok(())
    } else {
        Err(WiringError::ShapeMismatch {
            variable: variable.to_owned(),
            expected,
            actual,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::{Bound, DisciplineError, FnDiscipline, Response, VariableSpec};

    fn copy(
        name: &str,
        input: &str,
        output: &str,
    ) -> FnDiscipline<impl Fn(&Variables) -> Result<Variables, DisciplineError> + Send + Sync> {
        let (i, o) = (input.to_owned(), output.to_owned());
        FnDiscipline::new(
            name,
            vec![VariableSpec::new(input, 0.0)],
            vec![VariableSpec::new(output, 0.0)],
            move |inputs| Ok(Variables::new().with(o.clone(), inputs.scalar(&i)?)),
        )
    }

    fn objective(read: &str) -> ResponseSet {
        let name = read.to_owned();
        ResponseSet::new(Response::new("f", &[read], move |s| s.scalar(&name)))
    }

    fn x() -> DesignVariable {
        DesignVariable::new("x", 1.0, -10.0, 10.0)
    }

    #[test]
    fn promotes_outputs_to_same_named_inputs() {
        let problem = Problem::builder()
            .design_variable(x())
            .discipline(copy("a", "x", "u"))
            .discipline(copy("b", "u", "v"))
            .responses(objective("v"))
            .build()
            .unwrap();

        assert_eq!(problem.plan(), &[Stage::Single(0), Stage::Single(1)]);
        assert_eq!(problem.graph().edge_count(), 1);

        let state = problem.initial_state(&Variables::new().with("x", 2.0));
        assert_eq!(problem.inputs_for(0, &state).unwrap().scalar("x"), Ok(2.0));
        assert_eq!(problem.inputs_for(1, &state).unwrap().scalar("u"), Ok(0.0));
    }

    #[test]
    fn explicit_connection_feeds_renamed_input() {
        let problem = Problem::builder()
            .design_variable(x())
            .discipline(copy("a", "x", "u"))
            .discipline(copy("b", "w", "v"))
            .connect(("a", "u"), ("b", "w"))
            .responses(objective("v"))
            .build()
            .unwrap();

        let state = problem
            .initial_state(&Variables::new().with("x", 0.0))
            .with("u", 4.0);
        assert_eq!(problem.inputs_for(1, &state).unwrap().scalar("w"), Ok(4.0));
    }

    #[test]
    fn unconnected_input_is_a_constant() {
        let problem = Problem::builder()
            .design_variable(x())
            .discipline(copy("a", "c", "u"))
            .responses(objective("u"))
            .build()
            .unwrap();

        let state = problem.initial_state(&Variables::new().with("x", 0.0));
        assert_eq!(problem.inputs_for(0, &state).unwrap().scalar("c"), Ok(0.0));
    }

    #[test]
    fn wiring_errors() {
        let duplicate = Problem::builder()
            .design_variable(x())
            .discipline(copy("a", "x", "u"))
            .discipline(copy("b", "x", "u"))
            .responses(objective("u"))
            .build();
        assert!(matches!(duplicate, Err(WiringError::DuplicateProducer { .. })));

        let undefined = Problem::builder()
            .design_variable(x())
            .discipline(copy("a", "x", "u"))
            .responses(objective("nope"))
            .build();
        assert_eq!(
            undefined.unwrap_err(),
            WiringError::UndefinedVariable {
                context: "f".into(),
                name: "nope".into()
            }
        );

        let unknown = Problem::builder()
            .design_variable(x())
            .discipline(copy("a", "x", "u"))
            .connect(("ghost", "u"), ("a", "x"))
            .responses(objective("u"))
            .build();
        assert_eq!(unknown.unwrap_err(), WiringError::UnknownDiscipline("ghost".into()));

        let shadow = Problem::builder()
            .design_variable(x())
            .discipline(copy("a", "u", "x"))
            .responses(objective("x"))
            .build();
        assert!(matches!(shadow, Err(WiringError::ShadowsDesignVariable { .. })));

        let bounds = Problem::builder()
            .design_variable(DesignVariable::new("x", 1.0, 2.0, -2.0))
            .responses(objective("x"))
            .build();
        assert_eq!(bounds.unwrap_err(), WiringError::InvalidBounds("x".into()));

        let no_design = Problem::builder()
            .discipline(copy("a", "c", "u"))
            .responses(objective("u"))
            .build();
        assert_eq!(no_design.unwrap_err(), WiringError::NoDesignVariables);
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let result = Problem::builder()
            .design_variable(DesignVariable::new("x", [1.0, 2.0], 0.0, 5.0))
            .discipline(copy("a", "x", "u"))
            .responses(objective("u").constrain(
                Response::new("g", &["u"], |s| s.scalar("u")),
                Bound::Upper(0.0),
            ))
            .build();

        assert_eq!(
            result.unwrap_err(),
            WiringError::ShapeMismatch {
                variable: "x".into(),
                expected: 1,
                actual: 2
            }
        );
    }

    #[test]
    fn warm_state_keeps_guessed_coupling_values() {
        let problem = Problem::builder()
            .design_variable(x())
            .discipline(copy("a", "x", "u"))
            .responses(objective("u"))
            .build()
            .unwrap();

        let guess = Variables::new().with("u", 7.0).with("x", 100.0);
        let state = problem.warm_state(&Variables::new().with("x", 1.0), &guess);
        assert_eq!(state.scalar("u"), Ok(7.0));
        assert_eq!(state.scalar("x"), Ok(1.0));
    }
}
