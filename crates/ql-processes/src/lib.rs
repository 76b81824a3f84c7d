//! # ql-processes
//!
//! One-dimensional stochastic processes and their discretizations.
//!
//! The generalized Black-Scholes process drives the lattice and
//! finite-difference engines; it derives its local volatility lazily from
//! the Black volatility surface it observes.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Generalized Black-Scholes process and its constructors.
pub mod black_scholes_process;

/// Discretization schemes (`EulerDiscretization`).
pub mod euler_discretization;

/// `StochasticProcess1D` base trait.
pub mod stochastic_process;

pub use black_scholes_process::{
    black_scholes_merton_process, black_scholes_process, GeneralizedBlackScholesProcess,
};
pub use euler_discretization::{Discretization1D, EulerDiscretization};
pub use stochastic_process::StochasticProcess1D;
