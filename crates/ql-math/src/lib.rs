//! # ql-math
//!
//! Numerical building blocks: `Array`/`Matrix` newtypes over nalgebra, the
//! normal distribution (via statrs), floating-point comparison, 1D root
//! finders, 1D interpolation, and the optimization stack with its MINPACK
//! Levenberg-Marquardt core.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// ── Modules ───────────────────────────────────────────────────────────────────

/// One-dimensional real vectors.
pub mod array;

/// Floating-point comparison utilities.
pub mod comparison;

/// Probability distributions.
pub mod distributions;

/// Numerical integration.
pub mod integrals;

/// 1D interpolation schemes.
pub mod interpolations;

/// Two-dimensional real matrices.
pub mod matrix;

/// Cost functions, constraints and minimizers.
pub mod optimization;

/// 1D root-finding solvers.
pub mod solvers1d;

// ── Convenience re-exports ────────────────────────────────────────────────────

pub use array::Array;
pub use comparison::{close, close_enough};
pub use distributions::{normal_cdf, normal_cdf_inverse, normal_pdf};
pub use integrals::{Integrator, SimpsonIntegral};
pub use matrix::Matrix;
