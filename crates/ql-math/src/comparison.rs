//! Floating-point comparison utilities.
//!
//! Both tests scale the tolerance `n * f64::EPSILON` by the magnitude of the
//! operands. `close` requires the difference to be small relative to *both*
//! values, `close_enough` relative to *either*.

use ql_core::Real;

const DEFAULT_ULPS: u32 = 42;

/// `close_n(x, y, 42)`.
#[inline]
pub fn close(x: Real, y: Real) -> bool {
    close_n(x, y, DEFAULT_ULPS)
}

/// Return `true` if `x` and `y` agree to within `n` relative epsilons of
/// both operands. When either is zero the comparison is absolute against
/// `(n * eps)²`.
pub fn close_n(x: Real, y: Real, n: u32) -> bool {
    if x == y {
        return true;
    }
    let diff = (x - y).abs();
    let tolerance = n as Real * f64::EPSILON;
    if x * y == 0.0 {
        return diff < tolerance * tolerance;
    }
    diff <= tolerance * x.abs() && diff <= tolerance * y.abs()
}

/// `close_enough_n(x, y, 42)`.
#[inline]
pub fn close_enough(x: Real, y: Real) -> bool {
    close_enough_n(x, y, DEFAULT_ULPS)
}

/// Like [`close_n`] but only one operand needs to bound the difference.
pub fn close_enough_n(x: Real, y: Real, n: u32) -> bool {
    if x == y {
        return true;
    }
    let diff = (x - y).abs();
    let tolerance = n as Real * f64::EPSILON;
    if x * y == 0.0 {
        return diff < tolerance * tolerance;
    }
    diff <= tolerance * x.abs() || diff <= tolerance * y.abs()
}
