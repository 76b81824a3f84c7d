//! Natural cubic spline.
//!
//! Slopes at the nodes come from the global C² condition with zero second
//! derivative at both ends. Each interval then carries the polynomial
//!
//!   `f(x) = y_i + dx*(a_i + dx*(b_i + dx*c_i))`,  `dx = x - x_i`.

use ql_core::{errors::Result, Real};

use super::{check_nodes, locate, Interpolation1D};

/// Convert node slopes `ts` into per-interval polynomial coefficients.
fn compute_coefficients(
    xs: &[Real],
    ys: &[Real],
    ts: &[Real],
) -> (Vec<Real>, Vec<Real>, Vec<Real>) {
    let n = xs.len();
    let mut a = Vec::with_capacity(n - 1);
    let mut b = Vec::with_capacity(n - 1);
    let mut c = Vec::with_capacity(n - 1);

    for i in 0..n - 1 {
        let dx = xs[i + 1] - xs[i];
        let s = (ys[i + 1] - ys[i]) / dx;
        a.push(ts[i]);
        b.push((3.0 * s - ts[i + 1] - 2.0 * ts[i]) / dx);
        c.push((ts[i + 1] + ts[i] - 2.0 * s) / (dx * dx));
    }

    (a, b, c)
}

/// Solve the tridiagonal system for the node slopes of a natural spline.
fn natural_slopes(xs: &[Real], ys: &[Real]) -> Vec<Real> {
    let n = xs.len();
    let dx: Vec<Real> = xs.windows(2).map(|w| w[1] - w[0]).collect();
    let s: Vec<Real> = (0..n - 1).map(|i| (ys[i + 1] - ys[i]) / dx[i]).collect();

    let mut lower = vec![0.0; n];
    let mut diag = vec![0.0; n];
    let mut upper = vec![0.0; n];
    let mut rhs = vec![0.0; n];

    // f''(x_0) = 0
    diag[0] = 2.0;
    upper[0] = 1.0;
    rhs[0] = 3.0 * s[0];
    for i in 1..n - 1 {
        lower[i] = dx[i];
        diag[i] = 2.0 * (dx[i] + dx[i - 1]);
        upper[i] = dx[i - 1];
        rhs[i] = 3.0 * (dx[i] * s[i - 1] + dx[i - 1] * s[i]);
    }
    // f''(x_{n-1}) = 0
    lower[n - 1] = 1.0;
    diag[n - 1] = 2.0;
    rhs[n - 1] = 3.0 * s[n - 2];

    // Thomas algorithm; the system is diagonally dominant.
    let mut c_prime = vec![0.0; n];
    let mut d_prime = vec![0.0; n];
    c_prime[0] = upper[0] / diag[0];
    d_prime[0] = rhs[0] / diag[0];
    for i in 1..n {
        let m = diag[i] - lower[i] * c_prime[i - 1];
        c_prime[i] = upper[i] / m;
        d_prime[i] = (rhs[i] - lower[i] * d_prime[i - 1]) / m;
    }
    let mut ts = vec![0.0; n];
    ts[n - 1] = d_prime[n - 1];
    for i in (0..n - 1).rev() {
        ts[i] = d_prime[i] - c_prime[i] * ts[i + 1];
    }
    ts
}

/// Cubic spline with natural (zero second derivative) boundary conditions.
#[derive(Debug, Clone)]
pub struct CubicNaturalSpline {
    xs: Vec<Real>,
    ys: Vec<Real>,
    a: Vec<Real>,
    b: Vec<Real>,
    c: Vec<Real>,
}

impl CubicNaturalSpline {
    /// Build the spline through `(xs[i], ys[i])`.
    ///
    /// Requires at least 2 strictly increasing abscissae; two points give
    /// the straight line through them.
    pub fn new(xs: &[Real], ys: &[Real]) -> Result<Self> {
        check_nodes(xs, ys, 2)?;
        let ts = natural_slopes(xs, ys);
        let (a, b, c) = compute_coefficients(xs, ys, &ts);
        Ok(Self {
            xs: xs.to_vec(),
            ys: ys.to_vec(),
            a,
            b,
            c,
        })
    }
}

impl Interpolation1D for CubicNaturalSpline {
    fn value(&self, x: Real) -> Real {
        let i = locate(&self.xs, x);
        let dx = x - self.xs[i];
        self.ys[i] + dx * (self.a[i] + dx * (self.b[i] + dx * self.c[i]))
    }

    fn derivative(&self, x: Real) -> Real {
        let i = locate(&self.xs, x);
        let dx = x - self.xs[i];
        self.a[i] + (2.0 * self.b[i] + 3.0 * self.c[i] * dx) * dx
    }

    fn second_derivative(&self, x: Real) -> Real {
        let i = locate(&self.xs, x);
        let dx = x - self.xs[i];
        2.0 * self.b[i] + 6.0 * self.c[i] * dx
    }

    fn x_min(&self) -> Real {
        self.xs[0]
    }

    fn x_max(&self) -> Real {
        self.xs[self.xs.len() - 1]
    }
}
