use super::{Bracket, Solver1D, SolverConfig};
use crate::comparison::close;
use ql_core::{
    errors::{Error, Result},
    Real,
};

/// Brent's method: inverse quadratic interpolation safeguarded by bisection.
#[derive(Debug, Clone, Copy, Default)]
pub struct Brent {
    config: SolverConfig,
}

impl Brent {
    /// A Brent solver with the default evaluation budget and no bounds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of objective evaluations.
    pub fn with_max_evaluations(mut self, n: usize) -> Self {
        self.config.max_evaluations = n;
        self
    }

    /// Never evaluate below `lo`.
    pub fn with_lower_bound(mut self, lo: Real) -> Self {
        self.config.lower_bound = Some(lo);
        self
    }

    /// Never evaluate above `hi`.
    pub fn with_upper_bound(mut self, hi: Real) -> Self {
        self.config.upper_bound = Some(hi);
        self
    }
}

impl Solver1D for Brent {
    fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn solve_impl<F>(&self, f: &mut F, bracket: Bracket, accuracy: Real) -> Result<Real>
    where
        F: FnMut(Real) -> Result<Real>,
    {
        let Bracket {
            mut x_min,
            mut x_max,
            mut fx_min,
            mut fx_max,
            mut evaluations,
            ..
        } = bracket;

        let mut d = 0.0;
        let mut e = 0.0;
        let mut root = x_max;
        let mut froot = fx_max;

        while evaluations <= self.config.max_evaluations {
            if (froot > 0.0 && fx_max > 0.0) || (froot < 0.0 && fx_max < 0.0) {
                // Rename x_min/x_max so the root stays bracketed.
                x_max = x_min;
                fx_max = fx_min;
                d = root - x_min;
                e = d;
            }
            if fx_max.abs() < froot.abs() {
                x_min = root;
                root = x_max;
                x_max = x_min;
                fx_min = froot;
                froot = fx_max;
                fx_max = fx_min;
            }
            let x_acc1 = 2.0 * f64::EPSILON * root.abs() + 0.5 * accuracy;
            let x_mid = (x_max - root) / 2.0;
            if x_mid.abs() <= x_acc1 || close(froot, 0.0) {
                // Leave the objective's side effects consistent with the root.
                f(root)?;
                tracing::trace!(root, evaluations = evaluations + 1, "brent converged");
                return Ok(root);
            }
            if e.abs() >= x_acc1 && fx_min.abs() > froot.abs() {
                // Attempt inverse quadratic interpolation.
                let s = froot / fx_min;
                let (mut p, mut q);
                if close(x_min, x_max) {
                    p = 2.0 * x_mid * s;
                    q = 1.0 - s;
                } else {
                    q = fx_min / fx_max;
                    let r = froot / fx_max;
                    p = s * (2.0 * x_mid * q * (q - r) - (root - x_min) * (r - 1.0));
                    q = (q - 1.0) * (r - 1.0) * (s - 1.0);
                }
                if p > 0.0 {
                    q = -q;
                }
                p = p.abs();
                let min1 = 3.0 * x_mid * q - (x_acc1 * q).abs();
                let min2 = (e * q).abs();
                if 2.0 * p < min1.min(min2) {
                    e = d;
                    d = p / q;
                } else {
                    d = x_mid;
                    e = d;
                }
            } else {
                d = x_mid;
                e = d;
            }
            x_min = root;
            fx_min = froot;
            if d.abs() > x_acc1 {
                root += d;
            } else {
                root += x_acc1.copysign(x_mid);
            }
            froot = f(root)?;
            evaluations += 1;
        }

        tracing::debug!(root, "brent exceeded its evaluation budget");
        Err(Error::Convergence(format!(
            "maximum number of function evaluations ({}) exceeded",
            self.config.max_evaluations
        )))
    }
}
