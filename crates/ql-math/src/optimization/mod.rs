//! Optimization framework.
//!
//! A [`Problem`] pairs a [`CostFunction`] with a [`Constraint`] and a
//! starting point; an [`OptimizationMethod`] drives it until an
//! [`EndCriteria`] fires and reports which one as an [`EndCriteriaType`].
//! Fatal conditions (bad shapes, infeasible starts, failing cost
//! functions) come back as errors instead.
//!
//! Methods: [`LevenbergMarquardt`] (MINPACK `lmdif`) for least squares and
//! [`Simplex`] (Nelder-Mead) for general objectives. [`Projection`] and
//! friends hold a subset of parameters fixed.

mod constraint;
mod cost_function;
mod end_criteria;
mod levenberg_marquardt;
pub mod lmdif;
mod problem;
mod projection;
mod simplex;

pub use constraint::{
    BoundaryConstraint, CompositeConstraint, Constraint, NoConstraint,
    NonhomogeneousBoundaryConstraint, PositiveConstraint, MAX_STEP_HALVINGS,
};
pub use cost_function::{CostFunction, FINITE_DIFFERENCE_EPSILON};
pub use end_criteria::{EndCriteria, EndCriteriaType};
pub use levenberg_marquardt::LevenbergMarquardt;
pub use problem::Problem;
pub use projection::{ProjectedConstraint, ProjectedCostFunction, Projection};
pub use simplex::Simplex;

use ql_core::errors::Result;

/// An algorithm minimizing a [`Problem`].
pub trait OptimizationMethod {
    /// Minimize `problem` starting from its current value.
    ///
    /// On return the problem's current value and function value hold the
    /// best point found.
    fn minimize(&self, problem: &mut Problem<'_>, end_criteria: &EndCriteria) -> Result<EndCriteriaType>;
}
