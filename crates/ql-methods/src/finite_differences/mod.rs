//! Finite-difference solvers for one-factor Black-Scholes problems.
//!
//! The pieces compose as follows: a [`Fdm1dMesher`] lays out log-spot
//! nodes, [`FdmBlackScholesOp`] discretizes the PDE on them, step
//! conditions impose exercise and dividends at [stopping times](FdmStepConditionComposite),
//! and [`FdmBackwardSolver`] rolls the payoff back to today with the
//! scheme chosen in [`FdmSchemeDesc`].

pub mod inner_value;
pub mod meshers;
pub mod operators;
pub mod schemes;
pub mod solver;
pub mod step_conditions;

pub use inner_value::{EscrowedDividendAdjustment, FdmLogInnerValue};
pub use meshers::{Concentrating1dMesher, Fdm1dMesher, FdmBlackScholesMesher, Uniform1dMesher};
pub use operators::{FdmBlackScholesOp, FdmLinearOp, TridiagonalOperator};
pub use schemes::{FdmBackwardSolver, FdmSchemeDesc, FdmSchemeEvolver, FdmSchemeType};
pub use solver::{Fdm1dSolver, FdmBlackScholesSolver, FdmSolverDesc};
pub use step_conditions::{
    FdmAmericanStepCondition, FdmBermudanStepCondition, FdmDividendHandler, FdmSnapshotCondition,
    FdmStepConditionComposite, StepCondition,
};
