//! Numerical integration on a finite interval.

use ql_core::{fail, errors::Result, Real};

/// A numerical integrator.
pub trait Integrator {
    /// Integrate `f` on `[a, b]`.
    fn integrate<F: Fn(Real) -> Real>(&self, f: F, a: Real, b: Real) -> Result<Real>;
}

/// Simpson's rule built on successive trapezoid refinements.
///
/// Each pass halves the trapezoid step and combines the last two estimates
/// as `(4 I_2n - I_n) / 3`. Iteration stops once two successive Simpson
/// estimates differ by less than the absolute accuracy, after at least
/// five refinements.
#[derive(Debug, Clone)]
pub struct SimpsonIntegral {
    absolute_accuracy: Real,
    max_iterations: usize,
}

impl SimpsonIntegral {
    /// A Simpson integrator.
    pub fn new(absolute_accuracy: Real, max_iterations: usize) -> Self {
        Self {
            absolute_accuracy,
            max_iterations,
        }
    }
}

fn refine<F: Fn(Real) -> Real>(f: &F, a: Real, b: Real, previous: Real, n: usize) -> Real {
    let dx = (b - a) / n as Real;
    let sum: Real = (0..n).map(|i| f(a + (i as Real + 0.5) * dx)).sum();
    0.5 * (previous + dx * sum)
}

impl Integrator for SimpsonIntegral {
    fn integrate<F: Fn(Real) -> Real>(&self, f: F, a: Real, b: Real) -> Result<Real> {
        if a == b {
            return Ok(0.0);
        }
        let mut n = 1usize;
        let mut trapezoid = 0.5 * (f(a) + f(b)) * (b - a);
        let mut simpson = trapezoid;
        let mut iteration = 1usize;
        while iteration < self.max_iterations {
            let refined = refine(&f, a, b, trapezoid, n);
            n *= 2;
            let refined_simpson = (4.0 * refined - trapezoid) / 3.0;
            if (simpson - refined_simpson).abs() <= self.absolute_accuracy && iteration > 5 {
                return Ok(refined_simpson);
            }
            trapezoid = refined;
            simpson = refined_simpson;
            iteration += 1;
        }
        fail!(
            "max number of iterations ({}) reached in Simpson integration",
            self.max_iterations
        )
    }
}
