//! Levenberg-Marquardt on top of [`lmdif`](super::lmdif::lmdif).

use crate::{array::Array, matrix::Matrix};
use ql_core::{ensure, errors::Result, fail, Real};

use super::{
    lmdif::{lmdif, LmdifControl, LmdifInfo, LmdifSystem, Scaling},
    EndCriteria, EndCriteriaType, OptimizationMethod, Problem,
};

/// Levenberg-Marquardt least-squares minimizer.
///
/// Trial points rejected by the problem's constraint are not evaluated:
/// the residuals (and Jacobian) of the starting point are reported in
/// their place, which makes the step look unproductive so the trust
/// region shrinks back toward the feasible region.
#[derive(Debug, Clone, Copy)]
pub struct LevenbergMarquardt {
    epsfcn: Real,
    xtol: Real,
    gtol: Real,
    use_cost_functions_jacobian: bool,
}

impl Default for LevenbergMarquardt {
    fn default() -> Self {
        Self::new(1e-8, 1e-8, 1e-8, false)
    }
}

impl LevenbergMarquardt {
    /// Create a minimizer.
    ///
    /// `epsfcn` sizes the forward-difference steps, `xtol` and `gtol` are
    /// MINPACK's tolerances on the parameters and on the gradient.
    /// With `use_cost_functions_jacobian` the cost function's own
    /// [`jacobian`](super::CostFunction::jacobian) replaces the internal
    /// forward differences.
    pub fn new(epsfcn: Real, xtol: Real, gtol: Real, use_cost_functions_jacobian: bool) -> Self {
        Self {
            epsfcn,
            xtol,
            gtol,
            use_cost_functions_jacobian,
        }
    }
}

struct ConstrainedSystem<'p, 'a> {
    problem: &'p mut Problem<'a>,
    init_cost_values: Array,
    init_jacobian: Option<Matrix>,
}

impl LmdifSystem for ConstrainedSystem<'_, '_> {
    fn residuals(&mut self, x: &[Real], fvec: &mut [Real]) -> Result<()> {
        let xt = Array::from_slice(x);
        if self.problem.constraint().test(&xt) {
            let values = self.problem.values(&xt)?;
            ensure!(
                values.size() == fvec.len(),
                "cost function returned {} values, expected {}",
                values.size(),
                fvec.len()
            );
            fvec.copy_from_slice(values.as_slice());
        } else {
            fvec.copy_from_slice(self.init_cost_values.as_slice());
        }
        Ok(())
    }

    fn has_jacobian(&self) -> bool {
        self.init_jacobian.is_some()
    }

    fn jacobian(&mut self, x: &[Real], fjac: &mut [Real]) -> Result<()> {
        let xt = Array::from_slice(x);
        if self.problem.constraint().test(&xt) {
            let jac = self.problem.jacobian(&xt)?;
            ensure!(
                jac.as_column_major().len() == fjac.len(),
                "cost function jacobian has the wrong shape ({}x{})",
                jac.rows(),
                jac.cols()
            );
            fjac.copy_from_slice(jac.as_column_major());
        } else if let Some(jac) = &self.init_jacobian {
            fjac.copy_from_slice(jac.as_column_major());
        }
        Ok(())
    }
}

impl OptimizationMethod for LevenbergMarquardt {
    fn minimize(&self, problem: &mut Problem<'_>, end_criteria: &EndCriteria) -> Result<EndCriteriaType> {
        problem.reset();
        let x0 = problem.current_value().clone();
        let init_cost_values = problem.cost_function().values(&x0)?;
        let m = init_cost_values.size();
        let n = x0.size();
        let init_jacobian = if self.use_cost_functions_jacobian {
            Some(problem.cost_function().jacobian(&x0)?)
        } else {
            None
        };

        ensure!(n > 0, "no variables given");
        ensure!(m >= n, "less functions ({m}) than available variables ({n})");
        ensure!(end_criteria.function_epsilon() >= 0.0, "negative f tolerance");
        ensure!(self.xtol >= 0.0, "negative x tolerance");
        ensure!(self.gtol >= 0.0, "negative g tolerance");
        ensure!(end_criteria.max_iterations() > 0, "null number of evaluations");

        let control = LmdifControl {
            ftol: end_criteria.function_epsilon(),
            xtol: self.xtol,
            gtol: self.gtol,
            maxfev: end_criteria.max_iterations(),
            epsfcn: self.epsfcn,
            factor: 100.0,
            scaling: Scaling::Automatic,
        };

        let mut xx = x0.to_vec();
        let mut fvec = vec![0.0; m];
        let mut diag = vec![0.0; n];
        let report = {
            let mut system = ConstrainedSystem {
                problem: &mut *problem,
                init_cost_values,
                init_jacobian,
            };
            lmdif(&mut system, &mut xx, &mut fvec, &mut diag, &control)?
        };

        let mut ec_type = EndCriteriaType::None;
        match report.info {
            LmdifInfo::ImproperInput => fail!("MINPACK: improper input parameters"),
            LmdifInfo::FtolTooSmall => {}
            _ => ec_type = EndCriteriaType::StationaryFunctionValue,
        }
        if let Some(t) = end_criteria.check_max_iterations(report.nfev) {
            ec_type = t;
        }
        match report.info {
            LmdifInfo::XtolTooSmall => fail!(
                "MINPACK: xtol is too small. no further improvement in the approximate solution x is possible."
            ),
            LmdifInfo::GtolTooSmall => fail!(
                "MINPACK: gtol is too small. fvec is orthogonal to the columns of the jacobian to machine precision."
            ),
            _ => {}
        }

        let x = Array::from_vec(xx);
        let f = problem.cost_function().value(&x)?;
        problem.set_current_value(x);
        problem.set_function_value(f);
        tracing::debug!(
            info = report.info.code(),
            nfev = report.nfev,
            function_value = f,
            end_criteria = %ec_type,
            "levenberg-marquardt finished"
        );
        Ok(ec_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::{CostFunction, NoConstraint, PositiveConstraint};
    use approx::assert_abs_diff_eq;

    struct Quadratic {
        target: Vec<Real>,
    }

    impl CostFunction for Quadratic {
        fn values(&self, x: &Array) -> Result<Array> {
            let t = &self.target;
            Ok(Array::from_slice(&[
                x[0] - t[0],
                x[1] - t[1],
                (x[0] - t[0]) * (x[1] - t[1]),
            ]))
        }
    }

    fn criteria() -> EndCriteria {
        EndCriteria::new(1000, Some(100), 1e-10, 1e-10, None).unwrap()
    }

    #[test]
    fn zero_residual_problem_reaches_stationarity() {
        let cost = Quadratic {
            target: vec![1.5, -0.5],
        };
        let mut problem = Problem::new(&cost, &NoConstraint, Array::from_slice(&[0.0, 0.0]));
        let ec = LevenbergMarquardt::default()
            .minimize(&mut problem, &criteria())
            .unwrap();
        assert_eq!(ec, EndCriteriaType::StationaryFunctionValue);
        assert_abs_diff_eq!(problem.current_value()[0], 1.5, epsilon = 1e-6);
        assert_abs_diff_eq!(problem.current_value()[1], -0.5, epsilon = 1e-6);
        assert!(problem.function_value().unwrap() < 1e-12);
        assert!(problem.function_evaluation() > 0);
    }

    #[test]
    fn analytic_jacobian_path() {
        let cost = Quadratic {
            target: vec![0.3, 0.4],
        };
        let mut problem = Problem::new(&cost, &PositiveConstraint, Array::from_slice(&[1.0, 1.0]));
        LevenbergMarquardt::new(1e-8, 1e-8, 1e-8, true)
            .minimize(&mut problem, &criteria())
            .unwrap();
        assert_abs_diff_eq!(problem.current_value()[0], 0.3, epsilon = 1e-6);
        assert_abs_diff_eq!(problem.current_value()[1], 0.4, epsilon = 1e-6);
    }

    #[test]
    fn shape_preconditions() {
        let cost = |x: &Array| -> Result<Array> { Ok(Array::from_slice(&[x[0] + x[1]])) };
        let mut problem = Problem::new(&cost, &NoConstraint, Array::from_slice(&[0.0, 0.0]));
        let err = LevenbergMarquardt::default()
            .minimize(&mut problem, &criteria())
            .unwrap_err();
        assert!(err.to_string().contains("less functions"));
    }
}
