use std::fmt;

use serde::Serialize;

use tether_core::{DesignError, Problem, Responses, Variables};
use tether_solvers::{
    Evaluation,
    optimization::{OptimizationResult, Status},
};

/// A serializable summary of an analysis or optimization run.
///
/// Scalar fields come first so the TOML rendering stays valid; tables
/// (`design`, `responses`, `analysis`) follow.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct Report {
    /// `None` for a single analysis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    pub iters: usize,

    pub evaluations: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub objective: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_violation: Option<f64>,

    /// The most recent evaluation failure with its full source chain.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,

    pub design: Variables,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub responses: Option<Responses>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<Variables>,
}

impl Report {
    /// Summarizes an optimization run.
    ///
    /// # Errors
    ///
    /// Returns an error if the result's design does not fit the problem.
    pub fn from_result(
        problem: &Problem,
        result: &OptimizationResult,
    ) -> Result<Self, DesignError> {
        Ok(Self {
            status: Some(result.status),
            iters: result.iters,
            evaluations: result.evaluations,
            objective: result.objective,
            max_violation: result.max_violation(),
            last_error: result
                .last_error
                .clone()
                .map(|error| format!("{:#}", anyhow::Error::new(error))),
            design: problem.design_space().unflatten(&result.design)?,
            responses: result.responses.clone(),
            analysis: result.analysis.clone(),
        })
    }

    /// Summarizes a single analysis.
    ///
    /// # Errors
    ///
    /// Returns an error if the evaluated design does not fit the problem.
    pub fn from_evaluation(
        problem: &Problem,
        evaluation: &Evaluation,
    ) -> Result<Self, DesignError> {
        Ok(Self {
            status: None,
            iters: 0,
            evaluations: 1,
            objective: Some(evaluation.responses.objective),
            max_violation: Some(evaluation.responses.max_violation()),
            last_error: None,
            design: problem.design_space().unflatten(&evaluation.design)?,
            responses: Some(evaluation.responses.clone()),
            analysis: Some(evaluation.state().clone()),
        })
    }

    /// Renders the report as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(Status::Optimal) => writeln!(f, "minimum found at")?,
            Some(status) => writeln!(f, "optimization ended ({status:?}) at")?,
            None => writeln!(f, "analysis at")?,
        }
        for (name, value) in self.design.iter() {
            writeln!(f, "  {name} = {value}")?;
        }

        if let Some(objective) = self.objective {
            let heading = match self.status {
                Some(Status::Optimal) => "minimum objective",
                _ => "objective",
            };
            writeln!(f, "{heading}")?;
            writeln!(f, "  f = {objective}")?;
        }
        if let Some(responses) = &self.responses {
            for constraint in &responses.constraints {
                writeln!(f, "  {} = {}", constraint.name, constraint.value)?;
            }
        }
        if let Some(error) = &self.last_error {
            writeln!(f, "last error: {error}")?;
        }
        write!(f, "{} iteration(s), {} evaluation(s)", self.iters, self.evaluations)
    }
}
