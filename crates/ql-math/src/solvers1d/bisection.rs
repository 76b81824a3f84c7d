use super::{Bracket, Solver1D, SolverConfig};
use crate::comparison::close;
use ql_core::{
    errors::{Error, Result},
    Real,
};

/// Plain interval halving.
#[derive(Debug, Clone, Copy, Default)]
pub struct Bisection {
    config: SolverConfig,
}

impl Bisection {
    /// A bisection solver with the default evaluation budget and no bounds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cap the number of objective evaluations.
    pub fn with_max_evaluations(mut self, n: usize) -> Self {
        self.config.max_evaluations = n;
        self
    }
}

impl Solver1D for Bisection {
    fn config(&self) -> &SolverConfig {
        &self.config
    }

    fn solve_impl<F>(&self, f: &mut F, bracket: Bracket, accuracy: Real) -> Result<Real>
    where
        F: FnMut(Real) -> Result<Real>,
    {
        let mut evaluations = bracket.evaluations;
        // Orient the search so that f(root) < 0.
        let (mut dx, mut root) = if bracket.fx_min < 0.0 {
            (bracket.x_max - bracket.x_min, bracket.x_min)
        } else {
            (bracket.x_min - bracket.x_max, bracket.x_max)
        };

        while evaluations <= self.config.max_evaluations {
            dx /= 2.0;
            let x_mid = root + dx;
            let f_mid = f(x_mid)?;
            evaluations += 1;
            if f_mid <= 0.0 {
                root = x_mid;
            }
            if dx.abs() < accuracy || close(f_mid, 0.0) {
                f(root)?;
                return Ok(root);
            }
        }
        Err(Error::Convergence(format!(
            "maximum number of function evaluations ({}) exceeded",
            self.config.max_evaluations
        )))
    }
}
