//! An optimization problem: cost function, constraint and current state.

use crate::{array::Array, matrix::Matrix};
use ql_core::{errors::Result, Real};

use super::{Constraint, CostFunction};

/// A cost function minimized subject to a constraint, together with the
/// current iterate and evaluation counters.
///
/// Optimizers read the starting point from [`current_value`](Self::current_value)
/// and leave the minimizer and its cost there when they return.
pub struct Problem<'a> {
    cost_function: &'a dyn CostFunction,
    constraint: &'a dyn Constraint,
    current_value: Array,
    function_value: Option<Real>,
    squared_norm: Option<Real>,
    function_evaluations: usize,
    gradient_evaluations: usize,
}

impl<'a> Problem<'a> {
    /// Set up a problem starting at `initial_value`.
    pub fn new(
        cost_function: &'a dyn CostFunction,
        constraint: &'a dyn Constraint,
        initial_value: Array,
    ) -> Self {
        Self {
            cost_function,
            constraint,
            current_value: initial_value,
            function_value: None,
            squared_norm: None,
            function_evaluations: 0,
            gradient_evaluations: 0,
        }
    }

    /// Clear counters and cached results; the current value is kept.
    pub fn reset(&mut self) {
        self.function_evaluations = 0;
        self.gradient_evaluations = 0;
        self.function_value = None;
        self.squared_norm = None;
    }

    /// Scalar cost at `x`, counted as one function evaluation.
    pub fn value(&mut self, x: &Array) -> Result<Real> {
        self.function_evaluations += 1;
        self.cost_function.value(x)
    }

    /// Residuals at `x`, counted as one function evaluation.
    pub fn values(&mut self, x: &Array) -> Result<Array> {
        self.function_evaluations += 1;
        self.cost_function.values(x)
    }

    /// Gradient at `x`, counted as one gradient evaluation.
    pub fn gradient(&mut self, x: &Array) -> Result<Array> {
        self.gradient_evaluations += 1;
        self.cost_function.gradient(x)
    }

    /// Value and gradient at `x`.
    pub fn value_and_gradient(&mut self, x: &Array) -> Result<(Real, Array)> {
        self.function_evaluations += 1;
        self.gradient_evaluations += 1;
        self.cost_function.value_and_gradient(x)
    }

    /// Jacobian at `x` (not counted).
    pub fn jacobian(&self, x: &Array) -> Result<Matrix> {
        self.cost_function.jacobian(x)
    }

    /// The cost function.
    pub fn cost_function(&self) -> &'a dyn CostFunction {
        self.cost_function
    }

    /// The constraint.
    pub fn constraint(&self) -> &'a dyn Constraint {
        self.constraint
    }

    /// Current iterate.
    pub fn current_value(&self) -> &Array {
        &self.current_value
    }

    /// Replace the current iterate.
    pub fn set_current_value(&mut self, x: Array) {
        self.current_value = x;
    }

    /// Cost at the current iterate, once an optimizer has set it.
    pub fn function_value(&self) -> Option<Real> {
        self.function_value
    }

    /// Record the cost at the current iterate.
    pub fn set_function_value(&mut self, f: Real) {
        self.function_value = Some(f);
    }

    /// Squared gradient norm at the current iterate, if recorded.
    pub fn gradient_norm_value(&self) -> Option<Real> {
        self.squared_norm
    }

    /// Record the squared gradient norm.
    pub fn set_gradient_norm_value(&mut self, squared_norm: Real) {
        self.squared_norm = Some(squared_norm);
    }

    /// Function evaluations since the last reset.
    pub fn function_evaluation(&self) -> usize {
        self.function_evaluations
    }

    /// Gradient evaluations since the last reset.
    pub fn gradient_evaluation(&self) -> usize {
        self.gradient_evaluations
    }
}

impl std::fmt::Debug for Problem<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Problem")
            .field("current_value", &self.current_value)
            .field("function_value", &self.function_value)
            .field("function_evaluations", &self.function_evaluations)
            .field("gradient_evaluations", &self.gradient_evaluations)
            .finish()
    }
}
