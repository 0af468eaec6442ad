use std::sync::Arc;

use tether_core::{Bound, DesignVariable, Problem, Response, ResponseSet, WiringError};

use crate::{
    disciplines::{D1, D2},
    native::NativeKernels,
};

/// Assembles the Sellar problem around a kernel handle.
///
/// Design variables are `x ∈ [0, 10]` (default 1) and `z ∈ [0, 10]²`
/// (default `(5, 2)`). The objective is `f = x² + z2 + y1 + e^(-y2)`,
/// subject to `g1 = 3.16 - y1 <= 0` and `g2 = y2 - 24 <= 0`.
///
/// # Errors
///
/// Returns a [`WiringError`] only if the assembly itself is inconsistent.
pub fn problem(kernels: Arc<NativeKernels>) -> Result<Problem, WiringError> {
    Problem::builder()
        .design_variable(DesignVariable::new("x", 1.0, 0.0, 10.0))
        .design_variable(DesignVariable::new("z", [5.0, 2.0], 0.0, 10.0))
        .discipline(D1::new(Arc::clone(&kernels)))
        .discipline(D2::new(kernels))
        .responses(responses())
        .build()
}

fn responses() -> ResponseSet {
    let objective = Response::new("f", &["x", "z", "y1", "y2"], |s| {
        Ok(s.scalar("x")?.powi(2) + s.element("z", 1)? + s.scalar("y1")? + (-s.scalar("y2")?).exp())
    });
    let g1 = Response::new("g1", &["y1"], |s| Ok(3.16 - s.scalar("y1")?));
    let g2 = Response::new("g2", &["y2"], |s| Ok(s.scalar("y2")? - 24.0));

    ResponseSet::new(objective)
        .constrain(g1, Bound::Upper(0.0))
        .constrain(g2, Bound::Upper(0.0))
}
