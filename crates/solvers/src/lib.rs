//! Solvers for coupled multidisciplinary problems.
//!
//! - [`coupling`]: fixed-point (block Gauss-Seidel) solve of the coupled
//!   analysis at one design point
//! - [`evaluate`]: coupling solve followed by the objective and constraints
//! - [`derivative`]: finite-difference total derivatives through the
//!   converged coupling
//! - [`optimization`]: the optimization driver and the optimizers it runs
//!
//! # Features
//!
//! - `parallel`: evaluates Jacobian columns concurrently with `rayon`.
//! - `serde`: `Serialize`/`Deserialize` for the derivative settings and run
//!   status enums.

pub mod coupling;
pub mod derivative;
pub mod optimization;

mod evaluate;

pub use evaluate::{EvalError, Evaluation, evaluate};
