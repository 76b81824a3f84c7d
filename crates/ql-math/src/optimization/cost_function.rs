//! Objective functions for the optimizers.

use crate::{array::Array, matrix::Matrix};
use ql_core::{errors::Result, Real};

/// Step used by the default central-difference derivatives.
pub const FINITE_DIFFERENCE_EPSILON: Real = 1e-8;

/// A vector of residuals `r(x)` together with the scalar cost built from it.
///
/// Only [`values`](Self::values) is required. The scalar cost defaults to
/// the sum of squared residuals, and derivatives default to central
/// differences with step [`finite_difference_epsilon`](Self::finite_difference_epsilon).
pub trait CostFunction {
    /// Residuals at `x`.
    fn values(&self, x: &Array) -> Result<Array>;

    /// Scalar cost at `x`.
    fn value(&self, x: &Array) -> Result<Real> {
        Ok(self.values(x)?.norm_squared())
    }

    /// Gradient of [`value`](Self::value).
    fn gradient(&self, x: &Array) -> Result<Array> {
        let eps = self.finite_difference_epsilon();
        let mut xx = x.clone();
        let mut grad = Array::zeros(x.size());
        for i in 0..x.size() {
            xx[i] += eps;
            let fp = self.value(&xx)?;
            xx[i] -= 2.0 * eps;
            let fm = self.value(&xx)?;
            grad[i] = 0.5 * (fp - fm) / eps;
            xx[i] = x[i];
        }
        Ok(grad)
    }

    /// Value and gradient in one call.
    fn value_and_gradient(&self, x: &Array) -> Result<(Real, Array)> {
        Ok((self.value(x)?, self.gradient(x)?))
    }

    /// Jacobian of [`values`](Self::values): one row per residual, one
    /// column per parameter.
    fn jacobian(&self, x: &Array) -> Result<Matrix> {
        let eps = self.finite_difference_epsilon();
        let mut xx = x.clone();
        let mut jac: Option<Matrix> = None;
        for i in 0..x.size() {
            xx[i] += eps;
            let fp = self.values(&xx)?;
            xx[i] -= 2.0 * eps;
            let fm = self.values(&xx)?;
            let jac = jac.get_or_insert_with(|| Matrix::zeros(fp.size(), x.size()));
            for j in 0..fp.size() {
                jac[(j, i)] = 0.5 * (fp[j] - fm[j]) / eps;
            }
            xx[i] = x[i];
        }
        match jac {
            Some(jac) => Ok(jac),
            None => Ok(Matrix::zeros(self.values(x)?.size(), 0)),
        }
    }

    /// Step used by the finite-difference derivatives.
    fn finite_difference_epsilon(&self) -> Real {
        FINITE_DIFFERENCE_EPSILON
    }
}

impl<F> CostFunction for F
where
    F: Fn(&Array) -> Result<Array>,
{
    fn values(&self, x: &Array) -> Result<Array> {
        self(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn rosenbrock(x: &Array) -> Result<Array> {
        Ok(Array::from_slice(&[10.0 * (x[1] - x[0] * x[0]), 1.0 - x[0]]))
    }

    #[test]
    fn value_is_sum_of_squares() {
        let x = Array::from_slice(&[0.0, 0.0]);
        assert_abs_diff_eq!(rosenbrock.value(&x).unwrap(), 1.0, epsilon = 1e-15);
    }

    #[test]
    fn central_difference_jacobian() {
        let x = Array::from_slice(&[0.5, 0.2]);
        let jac = rosenbrock.jacobian(&x).unwrap();
        assert_eq!((jac.rows(), jac.cols()), (2, 2));
        assert_abs_diff_eq!(jac[(0, 0)], -20.0 * 0.5, epsilon = 1e-6);
        assert_abs_diff_eq!(jac[(0, 1)], 10.0, epsilon = 1e-6);
        assert_abs_diff_eq!(jac[(1, 0)], -1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(jac[(1, 1)], 0.0, epsilon = 1e-6);
    }

    #[test]
    fn gradient_matches_jacobian_chain_rule() {
        let x = Array::from_slice(&[0.3, -0.4]);
        let r = rosenbrock.values(&x).unwrap();
        let jac = rosenbrock.jacobian(&x).unwrap();
        let expected = &jac.transpose().mul_vec(&r) * 2.0;
        let grad = rosenbrock.gradient(&x).unwrap();
        for i in 0..2 {
            assert_abs_diff_eq!(grad[i], expected[i], epsilon = 1e-5);
        }
    }
}
