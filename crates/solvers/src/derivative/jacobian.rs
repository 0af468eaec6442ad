/// The stencil actually used for one design element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stencil {
    Forward,
    Backward,
    Central,

    /// The element's bounds coincide, so it cannot move and its column is zero.
    Fixed,
}

/// Total derivatives of `[objective, constraints...]` with respect to the
/// flattened design vector.
///
/// Row 0 is the objective gradient; row `1 + i` is the gradient of
/// constraint `i`, in declaration order, on the constraint's raw value.
#[derive(Debug, Clone, PartialEq)]
pub struct Jacobian {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
    stencils: Vec<Stencil>,
    evaluations: usize,
}

impl Jacobian {
    /// Assembles a Jacobian from its columns.
    pub(super) fn from_columns(rows: usize, columns: Vec<(Vec<f64>, Stencil, usize)>) -> Self {
        let cols = columns.len();
        let mut data = vec![0.0; rows * cols];
        let mut stencils = Vec::with_capacity(cols);
        let mut evaluations = 0;

        for (col, (values, stencil, solves)) in columns.into_iter().enumerate() {
            debug_assert_eq!(values.len(), rows);
            for (row, value) in values.into_iter().enumerate() {
                data[row * cols + col] = value;
            }
            stencils.push(stencil);
            evaluations += solves;
        }

        Self {
            rows,
            cols,
            data,
            stencils,
            evaluations,
        }
    }

    /// Number of rows (one objective plus one per constraint).
    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns (design elements).
    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.cols + col]
    }

    #[must_use]
    pub fn row(&self, row: usize) -> &[f64] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    #[must_use]
    pub fn objective_gradient(&self) -> &[f64] {
        self.row(0)
    }

    #[must_use]
    pub fn constraint_gradient(&self, index: usize) -> &[f64] {
        self.row(index + 1)
    }

    /// The stencil used for each design element.
    #[must_use]
    pub fn stencils(&self) -> &[Stencil] {
        &self.stencils
    }

    /// Number of perturbed pipeline evaluations that were performed.
    #[must_use]
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }
}
