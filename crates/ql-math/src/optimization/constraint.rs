//! Parameter-space constraints.
//!
//! A [`Constraint`] answers whether a parameter vector is admissible and
//! knows how to move along a direction without leaving the admissible
//! region: [`Constraint::update`] halves the step until the trial point
//! passes [`Constraint::test`], giving up after a bounded number of tries.

use crate::array::Array;
use ql_core::{
    ensure,
    errors::{Error, Result},
    Real,
};

/// Halvings attempted by [`Constraint::update`] before it fails.
pub const MAX_STEP_HALVINGS: usize = 200;

/// A constraint on the parameter space.
pub trait Constraint {
    /// Return `true` if `params` satisfies the constraint.
    fn test(&self, params: &Array) -> bool;

    /// Element-wise upper bound for `params`.
    fn upper_bound(&self, params: &Array) -> Array {
        Array::from_element(params.size(), Real::MAX)
    }

    /// Element-wise lower bound for `params`.
    fn lower_bound(&self, params: &Array) -> Array {
        Array::from_element(params.size(), -Real::MAX)
    }

    /// Move `params` by `beta * direction`, halving the step until the
    /// result is admissible. Returns the step length actually taken.
    ///
    /// Fails, leaving `params` untouched, if no admissible step is found
    /// within [`MAX_STEP_HALVINGS`] halvings.
    fn update(&self, params: &mut Array, direction: &Array, beta: Real) -> Result<Real> {
        ensure!(
            params.size() == direction.size(),
            "direction size ({}) differs from parameter size ({})",
            direction.size(),
            params.size()
        );
        let mut diff = beta;
        let mut icount = 0;
        while !self.test(&(&*params + &(diff * direction))) {
            if icount > MAX_STEP_HALVINGS {
                return Err(Error::Runtime("can't update parameter vector".into()));
            }
            diff *= 0.5;
            icount += 1;
        }
        *params += &(diff * direction);
        Ok(diff)
    }
}

/// No constraint: every parameter vector is admissible.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConstraint;

impl Constraint for NoConstraint {
    fn test(&self, _params: &Array) -> bool {
        true
    }
}

/// Every parameter must be strictly positive.
#[derive(Debug, Clone, Copy, Default)]
pub struct PositiveConstraint;

impl Constraint for PositiveConstraint {
    fn test(&self, params: &Array) -> bool {
        params.iter().all(|&v| v > 0.0)
    }

    fn lower_bound(&self, params: &Array) -> Array {
        Array::zeros(params.size())
    }
}

/// Every parameter must lie in `[low, high]`.
#[derive(Debug, Clone, Copy)]
pub struct BoundaryConstraint {
    low: Real,
    high: Real,
}

impl BoundaryConstraint {
    /// Create a boundary constraint shared by all parameters.
    pub fn new(low: Real, high: Real) -> Self {
        Self { low, high }
    }
}

impl Constraint for BoundaryConstraint {
    fn test(&self, params: &Array) -> bool {
        params.iter().all(|&v| v >= self.low && v <= self.high)
    }

    fn upper_bound(&self, params: &Array) -> Array {
        Array::from_element(params.size(), self.high)
    }

    fn lower_bound(&self, params: &Array) -> Array {
        Array::from_element(params.size(), self.low)
    }
}

/// Parameter `i` must lie in `[low[i], high[i]]`.
#[derive(Debug, Clone)]
pub struct NonhomogeneousBoundaryConstraint {
    low: Array,
    high: Array,
}

impl NonhomogeneousBoundaryConstraint {
    /// Create per-parameter bounds.
    pub fn new(low: Array, high: Array) -> Result<Self> {
        ensure!(
            low.size() == high.size(),
            "upper and lower boundaries sizes are inconsistent ({} vs {})",
            low.size(),
            high.size()
        );
        Ok(Self { low, high })
    }
}

impl Constraint for NonhomogeneousBoundaryConstraint {
    fn test(&self, params: &Array) -> bool {
        params.size() == self.low.size()
            && params
                .iter()
                .zip(self.low.iter().zip(self.high.iter()))
                .all(|(&v, (&lo, &hi))| v >= lo && v <= hi)
    }

    fn upper_bound(&self, _params: &Array) -> Array {
        self.high.clone()
    }

    fn lower_bound(&self, _params: &Array) -> Array {
        self.low.clone()
    }
}

/// Both constraints must hold; bounds are the tighter of the two.
pub struct CompositeConstraint<A, B> {
    first: A,
    second: B,
}

impl<A: Constraint, B: Constraint> CompositeConstraint<A, B> {
    /// Intersect two constraints.
    pub fn new(first: A, second: B) -> Self {
        Self { first, second }
    }
}

impl<A: Constraint, B: Constraint> Constraint for CompositeConstraint<A, B> {
    fn test(&self, params: &Array) -> bool {
        self.first.test(params) && self.second.test(params)
    }

    fn upper_bound(&self, params: &Array) -> Array {
        let a = self.first.upper_bound(params);
        let b = self.second.upper_bound(params);
        Array::from_vec(a.iter().zip(b.iter()).map(|(x, y)| x.min(*y)).collect())
    }

    fn lower_bound(&self, params: &Array) -> Array {
        let a = self.first.lower_bound(params);
        let b = self.second.lower_bound(params);
        Array::from_vec(a.iter().zip(b.iter()).map(|(x, y)| x.max(*y)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use proptest::prelude::*;

    #[test]
    fn update_halves_until_admissible() {
        let c = BoundaryConstraint::new(0.0, 1.0);
        let mut x = Array::from_slice(&[0.5, 0.5]);
        let dir = Array::from_slice(&[1.0, 0.0]);
        let step = c.update(&mut x, &dir, 2.0).unwrap();
        assert_abs_diff_eq!(step, 0.25, epsilon = 1e-15);
        assert_abs_diff_eq!(x[0], 0.75, epsilon = 1e-15);
        assert!(c.test(&x));
    }

    #[test]
    fn update_fails_when_start_is_infeasible() {
        let c = PositiveConstraint;
        let mut x = Array::from_slice(&[-1.0]);
        let before = x.clone();
        let err = c.update(&mut x, &Array::from_slice(&[1.0]), 0.1).unwrap_err();
        assert_eq!(err, Error::Runtime("can't update parameter vector".into()));
        assert_eq!(x, before);
    }

    #[test]
    fn composite_takes_the_tighter_bounds() {
        let c = CompositeConstraint::new(
            BoundaryConstraint::new(-1.0, 5.0),
            NonhomogeneousBoundaryConstraint::new(
                Array::from_slice(&[0.0, -3.0]),
                Array::from_slice(&[10.0, 2.0]),
            )
            .unwrap(),
        );
        let x = Array::from_slice(&[1.0, 1.0]);
        assert_eq!(c.upper_bound(&x).to_vec(), vec![5.0, 2.0]);
        assert_eq!(c.lower_bound(&x).to_vec(), vec![0.0, -1.0]);
        assert!(c.test(&x));
        assert!(!c.test(&Array::from_slice(&[-0.5, 1.0])));
    }

    #[test]
    fn nonhomogeneous_rejects_wrong_sizes() {
        assert!(NonhomogeneousBoundaryConstraint::new(Array::zeros(2), Array::zeros(3)).is_err());
        let c = NonhomogeneousBoundaryConstraint::new(Array::zeros(2), Array::from_element(2, 1.0))
            .unwrap();
        assert!(!c.test(&Array::zeros(3)));
    }

    proptest! {
        #[test]
        fn update_terminates_and_stays_feasible(
            x0 in 0.01f64..0.99,
            dir in -5.0f64..5.0,
            beta in 0.0f64..1e6,
        ) {
            let c = BoundaryConstraint::new(0.0, 1.0);
            let mut x = Array::from_slice(&[x0]);
            let step = c.update(&mut x, &Array::from_slice(&[dir]), beta).unwrap();
            prop_assert!(c.test(&x));
            prop_assert!(step <= beta);
        }
    }
}
