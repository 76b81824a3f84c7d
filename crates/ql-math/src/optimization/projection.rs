//! Holding a subset of parameters fixed during an optimization.
//!
//! A [`Projection`] splits a full parameter vector into free and fixed
//! parts. [`ProjectedCostFunction`] and [`ProjectedConstraint`] present a
//! cost function and a constraint over the free parameters only, so any
//! optimizer can run in the reduced space.

use std::cell::RefCell;

use crate::array::Array;
use ql_core::{ensure, errors::Result, Real};

use super::{Constraint, CostFunction};

/// Mapping between the full parameter space and its free subspace.
#[derive(Debug, Clone)]
pub struct Projection {
    number_of_free_parameters: usize,
    fixed_parameters: Array,
    actual_parameters: RefCell<Array>,
    fix_parameters: Vec<bool>,
}

impl Projection {
    /// Fix the parameters flagged in `fix_parameters` at their values in
    /// `parameter_values`. An empty flag vector leaves everything free.
    pub fn new(parameter_values: Array, fix_parameters: Vec<bool>) -> Result<Self> {
        let fix_parameters = if fix_parameters.is_empty() {
            vec![false; parameter_values.size()]
        } else {
            fix_parameters
        };
        ensure!(
            parameter_values.size() == fix_parameters.len(),
            "fix_parameters size ({}) does not match parameter_values size ({})",
            fix_parameters.len(),
            parameter_values.size()
        );
        let number_of_free_parameters = fix_parameters.iter().filter(|&&fixed| !fixed).count();
        ensure!(number_of_free_parameters > 0, "number of free parameters is zero");
        Ok(Self {
            number_of_free_parameters,
            actual_parameters: RefCell::new(parameter_values.clone()),
            fixed_parameters: parameter_values,
            fix_parameters,
        })
    }

    /// Number of free parameters.
    pub fn number_of_free_parameters(&self) -> usize {
        self.number_of_free_parameters
    }

    /// Write `free` into the free slots of the current full vector.
    pub fn map_free_parameters(&self, free: &Array) -> Result<()> {
        ensure!(
            free.size() == self.number_of_free_parameters,
            "number of free parameters ({}) does not match the projection ({})",
            free.size(),
            self.number_of_free_parameters
        );
        let mut actual = self.actual_parameters.borrow_mut();
        let mut i = 0;
        for (j, &fixed) in self.fix_parameters.iter().enumerate() {
            if !fixed {
                actual[j] = free[i];
                i += 1;
            }
        }
        Ok(())
    }

    /// The full vector after the last [`map_free_parameters`](Self::map_free_parameters).
    pub fn actual_parameters(&self) -> Array {
        self.actual_parameters.borrow().clone()
    }

    /// Free components of a full parameter vector.
    pub fn project(&self, parameters: &Array) -> Result<Array> {
        ensure!(
            parameters.size() == self.fix_parameters.len(),
            "parameters size ({}) does not match the projection ({})",
            parameters.size(),
            self.fix_parameters.len()
        );
        Ok(Array::from_vec(
            parameters
                .iter()
                .zip(&self.fix_parameters)
                .filter(|(_, &fixed)| !fixed)
                .map(|(&v, _)| v)
                .collect(),
        ))
    }

    /// Full vector with the fixed values and `projected` in the free slots.
    pub fn include(&self, projected: &Array) -> Result<Array> {
        ensure!(
            projected.size() == self.number_of_free_parameters,
            "projected parameters size ({}) does not match the number of free parameters ({})",
            projected.size(),
            self.number_of_free_parameters
        );
        let mut y = self.fixed_parameters.clone();
        let mut i = 0;
        for (j, &fixed) in self.fix_parameters.iter().enumerate() {
            if !fixed {
                y[j] = projected[i];
                i += 1;
            }
        }
        Ok(y)
    }
}

/// A cost function over the free parameters of a [`Projection`].
pub struct ProjectedCostFunction<'a> {
    cost_function: &'a dyn CostFunction,
    projection: Projection,
}

impl<'a> ProjectedCostFunction<'a> {
    /// Restrict `cost_function` to the parameters not flagged in
    /// `fix_parameters`.
    pub fn new(
        cost_function: &'a dyn CostFunction,
        parameter_values: Array,
        fix_parameters: Vec<bool>,
    ) -> Result<Self> {
        Ok(Self {
            cost_function,
            projection: Projection::new(parameter_values, fix_parameters)?,
        })
    }

    /// The underlying projection.
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// See [`Projection::project`].
    pub fn project(&self, parameters: &Array) -> Result<Array> {
        self.projection.project(parameters)
    }

    /// See [`Projection::include`].
    pub fn include(&self, projected: &Array) -> Result<Array> {
        self.projection.include(projected)
    }
}

impl CostFunction for ProjectedCostFunction<'_> {
    fn value(&self, free_parameters: &Array) -> Result<Real> {
        self.projection.map_free_parameters(free_parameters)?;
        self.cost_function.value(&self.projection.actual_parameters())
    }

    fn values(&self, free_parameters: &Array) -> Result<Array> {
        self.projection.map_free_parameters(free_parameters)?;
        self.cost_function.values(&self.projection.actual_parameters())
    }
}

/// A constraint over the free parameters of a [`Projection`].
pub struct ProjectedConstraint<'a> {
    constraint: &'a dyn Constraint,
    projection: Projection,
}

impl<'a> ProjectedConstraint<'a> {
    /// Restrict `constraint` to the free subspace of `projection`.
    pub fn new(constraint: &'a dyn Constraint, projection: Projection) -> Self {
        Self {
            constraint,
            projection,
        }
    }
}

impl Constraint for ProjectedConstraint<'_> {
    fn test(&self, params: &Array) -> bool {
        self.projection
            .include(params)
            .is_ok_and(|full| self.constraint.test(&full))
    }

    fn upper_bound(&self, params: &Array) -> Array {
        self.projection
            .include(params)
            .and_then(|full| self.projection.project(&self.constraint.upper_bound(&full)))
            .unwrap_or_else(|_| Array::from_element(params.size(), Real::MAX))
    }

    fn lower_bound(&self, params: &Array) -> Array {
        self.projection
            .include(params)
            .and_then(|full| self.projection.project(&self.constraint.lower_bound(&full)))
            .unwrap_or_else(|_| Array::from_element(params.size(), -Real::MAX))
    }
}
