//! Gradient-based optimization of coupled problems.
//!
//! A [`Driver`] connects a [`Problem`](tether_core::Problem) to an
//! [`Optimizer`]. The optimizer only ever sees [`NlpPoint`]s: objective and
//! normalized constraint values with their finite-difference gradients. The
//! driver evaluates every proposal, keeps it inside the design bounds, and
//! decides the final [`Status`].
//!
//! # Optimizers
//!
//! - [`AugmentedLagrangian`]: projected-gradient augmented Lagrangian for
//!   inequality and equality constraints
//! - [`GradientStep`]: fixed-step steepest descent that ignores constraints
//!
//! # Observer Events
//!
//! The driver emits one [`Event`] per proposal. Observers can return
//! [`Action::StopEarly`] to end the run with [`Status::StoppedByObserver`].

mod action;
mod config;
mod driver;
mod error;
mod event;
mod optimizer;
mod solution;

pub mod augmented_lagrangian;
pub mod gradient_step;

pub use action::Action;
pub use augmented_lagrangian::AugmentedLagrangian;
pub use config::{Config, ConfigError};
pub use driver::Driver;
pub use error::Error;
pub use event::Event;
pub use gradient_step::GradientStep;
pub use optimizer::{NlpPoint, Optimizer, Outcome, Step, Termination};
pub use solution::{DriverState, OptimizationResult, Point, Status};
