use thiserror::Error;

use crate::{StateError, VariableSpec, Variables};

/// Errors raised while evaluating a discipline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DisciplineError {
    /// The discipline itself reported a failure.
    #[error("discipline `{discipline}` failed: {message}")]
    Failed { discipline: String, message: String },

    /// An output contained NaN or an infinity.
    #[error("discipline `{discipline}` produced a non-finite `{output}`")]
    NonFinite { discipline: String, output: String },

    /// A declared output was not produced, or changed shape.
    #[error("discipline `{discipline}` did not produce a valid `{output}`")]
    MissingOutput { discipline: String, output: String },

    /// The discipline read an input it was not given.
    #[error(transparent)]
    Input(#[from] StateError),
}

impl DisciplineError {
    /// Creates a [`DisciplineError::Failed`].
    pub fn failed(discipline: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            discipline: discipline.into(),
            message: message.into(),
        }
    }
}

/// One sub-analysis of a coupled system.
///
/// A discipline maps a fixed set of named inputs to a fixed set of named
/// outputs. It must be a deterministic function of its declared inputs with
/// no hidden state, since solvers call it many times with varying inputs and
/// may call it from several threads.
///
/// Whether `evaluate` is plain arithmetic or a call into native code is an
/// implementation detail of the discipline.
pub trait Discipline: Send + Sync {
    /// Returns the unique name of this discipline.
    fn name(&self) -> &str;

    /// Returns the declared inputs with their default values.
    fn inputs(&self) -> &[VariableSpec];

    /// Returns the declared outputs with their initial values.
    fn outputs(&self) -> &[VariableSpec];

    /// Computes outputs from inputs.
    ///
    /// `inputs` holds exactly the declared inputs.
    ///
    /// # Errors
    ///
    /// Returns an error if the computation fails.
    fn evaluate(&self, inputs: &Variables) -> Result<Variables, DisciplineError>;
}

/// Evaluates a discipline and checks its outputs against the declaration.
///
/// # Errors
///
/// Returns the discipline's own error, or an error if a declared output is
/// missing, has the wrong shape, or is not finite.
pub fn evaluate_checked(
    discipline: &dyn Discipline,
    inputs: &Variables,
) -> Result<Variables, DisciplineError> {
    let outputs = discipline.evaluate(inputs)?;

    for spec in discipline.outputs() {
        let value = outputs
            .get(&spec.name)
            .ok()
            .filter(|value| value.len() == spec.default.len())
            .ok_or_else(|| DisciplineError::MissingOutput {
                discipline: discipline.name().to_owned(),
                output: spec.name.clone(),
            })?;

        if !value.is_finite() {
            return Err(DisciplineError::NonFinite {
                discipline: discipline.name().to_owned(),
                output: spec.name.clone(),
            });
        }
    }

    Ok(outputs)
}

/// A discipline backed by a closure.
pub struct FnDiscipline<F> {
    name: String,
    inputs: Vec<VariableSpec>,
    outputs: Vec<VariableSpec>,
    func: F,
}

impl<F> FnDiscipline<F>
where
    F: Fn(&Variables) -> Result<Variables, DisciplineError> + Send + Sync,
{
    pub fn new(
        name: impl Into<String>,
        inputs: Vec<VariableSpec>,
        outputs: Vec<VariableSpec>,
        func: F,
    ) -> Self {
        Self {
            name: name.into(),
            inputs,
            outputs,
            func,
        }
    }
}

impl<F> Discipline for FnDiscipline<F>
where
    F: Fn(&Variables) -> Result<Variables, DisciplineError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> &[VariableSpec] {
        &self.inputs
    }

    fn outputs(&self) -> &[VariableSpec] {
        &self.outputs
    }

    fn evaluate(&self, inputs: &Variables) -> Result<Variables, DisciplineError> {
        (self.func)(inputs)
    }
}

impl<F> std::fmt::Debug for FnDiscipline<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnDiscipline")
            .field("name", &self.name)
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .finish_non_exhaustive()
    }
}
