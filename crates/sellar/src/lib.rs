//! The Sellar problem on Tether.
//!
//! Sellar is the standard two-discipline MDO benchmark: discipline `d1`
//! computes `y1` from `y2`, discipline `d2` computes `y2` from `y1`, and the
//! optimizer minimizes `f` over `x` and `z` subject to two inequality
//! constraints. The discipline arithmetic lives in [`native`] behind a C ABI
//! and is reached through function pointers, the way an externally compiled
//! analysis code would be.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tether_sellar::{NativeKernels, problem};
//! use tether_solvers::optimization::{AugmentedLagrangian, Driver};
//!
//! let problem = problem(Arc::new(NativeKernels::new()))?;
//! let driver = Driver::new(&problem, Default::default());
//! let result = driver.run_unobserved(
//!     &mut AugmentedLagrangian::default(),
//!     &problem.design_space().initial(),
//! )?;
//! println!("{:?} f = {:?}", result.status, result.objective);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod native;

mod disciplines;
mod problem;
mod report;

pub use disciplines::{D1, D2};
pub use native::NativeKernels;
pub use problem::problem;
pub use report::Report;
