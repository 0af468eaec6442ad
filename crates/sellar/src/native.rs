//! The Sellar discipline kernels behind a C ABI.
//!
//! The kernels take every argument by pointer and return the result by
//! value, the calling convention of the Fortran routines they mirror. They
//! use the `C-unwind` ABI so a panic inside a kernel reaches the caller as
//! an unwind rather than an abort, which lets the disciplines report it as
//! an ordinary failure.
//!
//! Disciplines never call the raw symbols directly. They share a
//! [`NativeKernels`] handle, created explicitly and dropped with the last
//! discipline holding it.

/// Signature of the first discipline kernel: `(z1, z2, x1, y2) -> y1`.
pub type D1Kernel =
    unsafe extern "C-unwind" fn(*const f64, *const f64, *const f64, *const f64) -> f64;

/// Signature of the second discipline kernel: `(z1, z2, y1) -> y2`.
pub type D2Kernel = unsafe extern "C-unwind" fn(*const f64, *const f64, *const f64) -> f64;

/// Computes `y1 = z1² + z2 + x1 - 0.2 y2`.
///
/// # Safety
///
/// Every pointer must be valid for a read of one `f64`.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn sellar_d1(
    z1: *const f64,
    z2: *const f64,
    x1: *const f64,
    y2: *const f64,
) -> f64 {
    // SAFETY: the caller guarantees all four pointers are readable.
    unsafe { (*z1).powi(2) + *z2 + *x1 - 0.2 * *y2 }
}

/// Computes `y2 = √y1 + z1 + z2`.
///
/// Returns NaN for negative `y1`.
///
/// # Safety
///
/// Every pointer must be valid for a read of one `f64`.
#[unsafe(no_mangle)]
pub unsafe extern "C-unwind" fn sellar_d2(z1: *const f64, z2: *const f64, y1: *const f64) -> f64 {
    // SAFETY: the caller guarantees all three pointers are readable.
    unsafe { (*y1).sqrt() + *z1 + *z2 }
}

/// A handle to a pair of discipline kernels.
#[derive(Debug, Clone, Copy)]
pub struct NativeKernels {
    d1: D1Kernel,
    d2: D2Kernel,
}

impl Default for NativeKernels {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeKernels {
    /// Returns a handle to the kernels built into this crate.
    #[must_use]
    pub fn new() -> Self {
        Self {
            d1: sellar_d1,
            d2: sellar_d2,
        }
    }

    /// Returns a handle to externally provided kernels.
    ///
    /// # Safety
    ///
    /// Both kernels must only read through their pointer arguments, must not
    /// retain them, and must be safe to call from several threads at once.
    #[must_use]
    pub unsafe fn from_raw(d1: D1Kernel, d2: D2Kernel) -> Self {
        Self { d1, d2 }
    }

    /// Calls the first kernel.
    #[must_use]
    pub fn d1(&self, z1: f64, z2: f64, x1: f64, y2: f64) -> f64 {
        // SAFETY: the arguments are live locals and the kernel contract is
        // upheld by `new` or the caller of `from_raw`.
        unsafe { (self.d1)(&z1, &z2, &x1, &y2) }
    }

    /// Calls the second kernel.
    #[must_use]
    pub fn d2(&self, z1: f64, z2: f64, y1: f64) -> f64 {
        // SAFETY: as for `d1`.
        unsafe { (self.d2)(&z1, &z2, &y1) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn raw_symbols_match_the_formulas() {
        let (z1, z2, x1, y2, y1) = (5.0, 2.0, 1.0, 12.0, 25.0);
        // SAFETY: pointers to live locals.
        let d1 = unsafe { sellar_d1(&z1, &z2, &x1, &y2) };
        let d2 = unsafe { sellar_d2(&z1, &z2, &y1) };

        assert_relative_eq!(d1, 25.6, epsilon = 1e-12);
        assert_relative_eq!(d2, 12.0, epsilon = 1e-12);
    }

    #[test]
    fn handle_calls_kernels() {
        let kernels = NativeKernels::new();
        assert_relative_eq!(kernels.d1(1.0, 0.0, 0.0, 5.0), 0.0);
        assert_relative_eq!(kernels.d2(0.0, 0.0, 4.0), 2.0);
        assert!(kernels.d2(0.0, 0.0, -1.0).is_nan());
    }
}
