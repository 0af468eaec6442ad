//! Core traits and types for coupled multidisciplinary analysis.
//!
//! This crate defines the problem side of Tether; the solvers live in
//! `tether-solvers`.
//!
//! - [`Discipline`]: a pure function from named inputs to named outputs
//! - [`CouplingGraph`]: which outputs feed which inputs, and the feedback
//!   cycles and evaluation order that follow from that
//! - [`DesignSpace`]: the bounded variables an optimizer may set
//! - [`ResponseSet`]: the objective and constraints over the analysis state
//! - [`Problem`]: all of the above, validated by [`ProblemBuilder::build`]
//! - [`Observer`]: receives solver events and optionally returns control
//!   actions

mod design;
mod discipline;
mod graph;
mod observer;
mod problem;
mod response;
mod value;
mod variables;

pub use design::{Bounds, DesignError, DesignSpace, DesignVariable};
pub use discipline::{Discipline, DisciplineError, FnDiscipline, evaluate_checked};
pub use graph::{Connection, CouplingGraph, Source, Stage, Target};
pub use observer::Observer;
pub use problem::{Problem, ProblemBuilder, WiringError};
pub use response::{
    Bound, Constraint, ConstraintValue, Response, ResponseError, ResponseSet, Responses,
};
pub use value::Value;
pub use variables::{AnalysisState, StateError, VariableSpec, Variables};
