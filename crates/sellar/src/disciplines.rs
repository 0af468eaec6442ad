use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use tether_core::{Discipline, DisciplineError, VariableSpec, Variables};

use crate::native::NativeKernels;

/// The first Sellar discipline: `y1 = z1² + z2 + x - 0.2 y2`.
#[derive(Debug)]
pub struct D1 {
    kernels: Arc<NativeKernels>,
    inputs: Vec<VariableSpec>,
    outputs: Vec<VariableSpec>,
}

impl D1 {
    #[must_use]
    pub fn new(kernels: Arc<NativeKernels>) -> Self {
        Self {
            kernels,
            inputs: vec![
                VariableSpec::new("z", [0.0, 0.0]),
                VariableSpec::new("x", 0.0),
                VariableSpec::new("y2", 1.0),
            ],
            outputs: vec![VariableSpec::new("y1", 1.0)],
        }
    }
}

impl Discipline for D1 {
    fn name(&self) -> &str {
        "d1"
    }

    fn inputs(&self) -> &[VariableSpec] {
        &self.inputs
    }

    fn outputs(&self) -> &[VariableSpec] {
        &self.outputs
    }

    fn evaluate(&self, inputs: &Variables) -> Result<Variables, DisciplineError> {
        let z1 = inputs.element("z", 0)?;
        let z2 = inputs.element("z", 1)?;
        let x = inputs.scalar("x")?;
        let y2 = inputs.scalar("y2")?;

        let y1 = call_kernel(self.name(), "y1", || self.kernels.d1(z1, z2, x, y2))?;
        Ok(Variables::new().with("y1", y1))
    }
}

/// The second Sellar discipline: `y2 = √y1 + z1 + z2`.
#[derive(Debug)]
pub struct D2 {
    kernels: Arc<NativeKernels>,
    inputs: Vec<VariableSpec>,
    outputs: Vec<VariableSpec>,
}

impl D2 {
    #[must_use]
    pub fn new(kernels: Arc<NativeKernels>) -> Self {
        Self {
            kernels,
            inputs: vec![
                VariableSpec::new("z", [0.0, 0.0]),
                VariableSpec::new("y1", 1.0),
            ],
            outputs: vec![VariableSpec::new("y2", 1.0)],
        }
    }
}

impl Discipline for D2 {
    fn name(&self) -> &str {
        "d2"
    }

    fn inputs(&self) -> &[VariableSpec] {
        &self.inputs
    }

    fn outputs(&self) -> &[VariableSpec] {
        &self.outputs
    }

    fn evaluate(&self, inputs: &Variables) -> Result<Variables, DisciplineError> {
        let z1 = inputs.element("z", 0)?;
        let z2 = inputs.element("z", 1)?;
        let y1 = inputs.scalar("y1")?;

        let y2 = call_kernel(self.name(), "y2", || self.kernels.d2(z1, z2, y1))?;
        Ok(Variables::new().with("y2", y2))
    }
}

/// Calls a kernel, turning a panic or a non-finite result into an error.
fn call_kernel(
    discipline: &str,
    output: &str,
    kernel: impl FnOnce() -> f64,
) -> Result<f64, DisciplineError> {
    let value = panic::catch_unwind(AssertUnwindSafe(kernel))
        .map_err(|payload| DisciplineError::failed(discipline, panic_message(payload.as_ref())))?;

    if value.is_finite() {
        Ok(value)
    } else {
        Err(DisciplineError::NonFinite {
            discipline: discipline.to_owned(),
            output: output.to_owned(),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("native kernel panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("native kernel panicked: {message}")
    } else {
        "native kernel panicked".to_owned()
    }
}
