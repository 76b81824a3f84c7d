//! # ql-methods
//!
//! Numerical methods behind the option engines.
//!
//! * [`lattice`]: recombining binomial trees and backward induction of
//!   discretized assets
//! * [`finite_differences`]: log-spot meshes, the Black-Scholes operator,
//!   time-stepping schemes and step conditions

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod finite_differences;
pub mod lattice;

pub use finite_differences::{
    FdmBlackScholesMesher, FdmBlackScholesSolver, FdmSchemeDesc, FdmSchemeType, FdmSolverDesc,
    FdmStepConditionComposite,
};
pub use lattice::{
    BinomialTree, BlackScholesLattice, DiscretizedAsset, DiscretizedVanillaOption, Lattice,
    TimeGrid, TreeKind,
};
