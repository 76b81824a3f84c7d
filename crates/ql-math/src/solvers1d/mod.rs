//! 1D root-finding solvers.
//!
//! [`Solver1D`] supplies the shared driver: bracketing a root from a guess
//! and a step, or validating a caller-supplied bracket, then handing the
//! bracket to the concrete method. Methods only implement
//! [`solve_impl`](Solver1D::solve_impl).
//!
//! Objective functions are fallible (`FnMut(Real) -> Result<Real>`) so a
//! pricing error inside the search propagates instead of being mistaken for
//! a function value. Exhausting the evaluation budget is reported as
//! [`Error::Convergence`].

mod bisection;
mod brent;

pub use bisection::Bisection;
pub use brent::Brent;

use crate::comparison::close;
use ql_core::{
    ensure,
    errors::{Error, Result},
    Real,
};

/// Default cap on objective evaluations.
pub const DEFAULT_MAX_EVALUATIONS: usize = 100;

/// Evaluation budget and optional hard bounds shared by all methods.
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Maximum number of objective evaluations.
    pub max_evaluations: usize,
    /// Lower bound the search never crosses.
    pub lower_bound: Option<Real>,
    /// Upper bound the search never crosses.
    pub upper_bound: Option<Real>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_evaluations: DEFAULT_MAX_EVALUATIONS,
            lower_bound: None,
            upper_bound: None,
        }
    }
}

impl SolverConfig {
    fn enforce_bounds(&self, x: Real) -> Real {
        let x = match self.lower_bound {
            Some(lo) if x < lo => lo,
            _ => x,
        };
        match self.upper_bound {
            Some(hi) if x > hi => hi,
            _ => x,
        }
    }
}

/// A root bracket `[x_min, x_max]` with cached function values, plus the
/// current root estimate and evaluation count.
#[derive(Debug, Clone, Copy)]
pub struct Bracket {
    /// Lower end.
    pub x_min: Real,
    /// Upper end.
    pub x_max: Real,
    /// `f(x_min)`.
    pub fx_min: Real,
    /// `f(x_max)`.
    pub fx_max: Real,
    /// Current root estimate.
    pub root: Real,
    /// Objective evaluations so far.
    pub evaluations: usize,
}

/// A one-dimensional root finder.
pub trait Solver1D {
    /// The solver's evaluation budget and bounds.
    fn config(&self) -> &SolverConfig;

    /// Refine a valid bracket (`fx_min * fx_max <= 0`) to `accuracy`.
    fn solve_impl<F>(&self, f: &mut F, bracket: Bracket, accuracy: Real) -> Result<Real>
    where
        F: FnMut(Real) -> Result<Real>;

    /// Find a root starting from `guess`, growing a bracket outward by
    /// `step` until the function changes sign.
    fn solve<F>(&self, mut f: F, accuracy: Real, guess: Real, step: Real) -> Result<Real>
    where
        F: FnMut(Real) -> Result<Real>,
    {
        ensure!(accuracy > 0.0, "accuracy ({accuracy}) must be positive");
        let accuracy = accuracy.max(f64::EPSILON);
        let config = self.config();
        const GROWTH_FACTOR: Real = 1.6;
        let mut flipflop = -1;

        let root = guess;
        let mut fx_max = f(root)?;
        if close(fx_max, 0.0) {
            return Ok(root);
        }
        let (mut x_min, mut fx_min, mut x_max);
        if fx_max > 0.0 {
            x_min = config.enforce_bounds(root - step);
            fx_min = f(x_min)?;
            x_max = root;
        } else {
            x_min = root;
            fx_min = fx_max;
            x_max = config.enforce_bounds(root + step);
            fx_max = f(x_max)?;
        }

        let mut evaluations = 2;
        while evaluations <= config.max_evaluations {
            if fx_min * fx_max <= 0.0 {
                if close(fx_min, 0.0) {
                    return Ok(x_min);
                }
                if close(fx_max, 0.0) {
                    return Ok(x_max);
                }
                let bracket = Bracket {
                    x_min,
                    x_max,
                    fx_min,
                    fx_max,
                    root: 0.5 * (x_max + x_min),
                    evaluations,
                };
                return self.solve_impl(&mut f, bracket, accuracy);
            }
            if fx_min.abs() < fx_max.abs() {
                x_min = config.enforce_bounds(x_min + GROWTH_FACTOR * (x_min - x_max));
                fx_min = f(x_min)?;
            } else if fx_min.abs() > fx_max.abs() {
                x_max = config.enforce_bounds(x_max + GROWTH_FACTOR * (x_max - x_min));
                fx_max = f(x_max)?;
            } else if flipflop == -1 {
                x_min = config.enforce_bounds(x_min + GROWTH_FACTOR * (x_min - x_max));
                fx_min = f(x_min)?;
                evaluations += 1;
                flipflop = 1;
            } else {
                x_max = config.enforce_bounds(x_max + GROWTH_FACTOR * (x_max - x_min));
                fx_max = f(x_max)?;
                flipflop = -1;
            }
            evaluations += 1;
        }

        tracing::debug!(x_min, x_max, fx_min, fx_max, "unable to bracket root");
        Err(Error::Convergence(format!(
            "unable to bracket root in {} function evaluations (last bracket attempt: \
             f[{x_min},{x_max}] -> [{fx_min},{fx_max}])",
            config.max_evaluations
        )))
    }

    /// Find a root inside the caller-supplied bracket `[x_min, x_max]`.
    fn solve_bracketed<F>(
        &self,
        mut f: F,
        accuracy: Real,
        guess: Real,
        x_min: Real,
        x_max: Real,
    ) -> Result<Real>
    where
        F: FnMut(Real) -> Result<Real>,
    {
        ensure!(accuracy > 0.0, "accuracy ({accuracy}) must be positive");
        let accuracy = accuracy.max(f64::EPSILON);
        let config = self.config();

        ensure!(x_min < x_max, "invalid range: x_min ({x_min}) >= x_max ({x_max})");
        if let Some(lo) = config.lower_bound {
            ensure!(x_min >= lo, "x_min ({x_min}) < enforced lower bound ({lo})");
        }
        if let Some(hi) = config.upper_bound {
            ensure!(x_max <= hi, "x_max ({x_max}) > enforced upper bound ({hi})");
        }

        let fx_min = f(x_min)?;
        if close(fx_min, 0.0) {
            return Ok(x_min);
        }
        let fx_max = f(x_max)?;
        if close(fx_max, 0.0) {
            return Ok(x_max);
        }

        if fx_min * fx_max >= 0.0 {
            return Err(Error::Convergence(format!(
                "root not bracketed: f[{x_min},{x_max}] -> [{fx_min},{fx_max}]"
            )));
        }
        ensure!(guess > x_min, "guess ({guess}) < x_min ({x_min})");
        ensure!(guess < x_max, "guess ({guess}) > x_max ({x_max})");

        let bracket = Bracket {
            x_min,
            x_max,
            fx_min,
            fx_max,
            root: guess,
            evaluations: 2,
        };
        self.solve_impl(&mut f, bracket, accuracy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn square_minus_two(x: Real) -> Result<Real> {
        Ok(x * x - 2.0)
    }

    #[test]
    fn brackets_from_a_guess() {
        for solver_root in [
            Brent::new().solve(square_minus_two, 1e-12, 0.1, 0.01).unwrap(),
            Bisection::new().solve(square_minus_two, 1e-12, 0.1, 0.01).unwrap(),
        ] {
            assert_abs_diff_eq!(solver_root, 2f64.sqrt(), epsilon = 1e-10);
        }
    }

    #[test]
    fn bounds_stop_the_bracket_search() {
        let solver = Brent::new().with_lower_bound(0.5).with_max_evaluations(20);
        let err = solver
            .solve(|x: Real| Ok(x * x + 1.0), 1e-8, 1.0, 0.1)
            .unwrap_err();
        assert!(matches!(err, Error::Convergence(_)));
    }

    #[test]
    fn unbracketed_interval_is_a_convergence_error() {
        let err = Brent::new()
            .solve_bracketed(square_minus_two, 1e-10, 3.0, 2.0, 4.0)
            .unwrap_err();
        assert!(matches!(err, Error::Convergence(_)));
    }

    #[test]
    fn guess_must_lie_inside_bracket() {
        let err = Brent::new()
            .solve_bracketed(square_minus_two, 1e-10, 5.0, 0.0, 2.0)
            .unwrap_err();
        assert!(matches!(err, Error::Precondition(_)));
    }

    #[test]
    fn objective_errors_propagate() {
        let err = Brent::new()
            .solve_bracketed(
                |x: Real| {
                    if x > 1.2 {
                        Err(Error::Runtime("pricing failed".into()))
                    } else {
                        Ok(x - 1.0)
                    }
                },
                1e-10,
                0.5,
                0.0,
                2.0,
            )
            .unwrap_err();
        assert_eq!(err, Error::Runtime("pricing failed".into()));
    }
}
