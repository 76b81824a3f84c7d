//! Spatial operators on a 1-D mesh.

use std::rc::Rc;

use ql_core::{ensure, errors::Result, Real, Time};
use ql_math::Array;
use ql_processes::GeneralizedBlackScholesProcess;
use ql_termstructures::{
    BlackVolTermStructure, LocalVolTermStructure, YieldTermStructure,
};
use tracing::trace;

use super::inner_value::EscrowedDividendAdjustment;
use super::meshers::Fdm1dMesher;

/// A tridiagonal matrix.
///
/// Row `i` reads `lower[i]·u[i-1] + diag[i]·u[i] + upper[i]·u[i+1]`;
/// `lower[0]` and `upper[n-1]` are never read.
#[derive(Debug, Clone, PartialEq)]
pub struct TridiagonalOperator {
    /// Sub-diagonal.
    pub lower: Vec<Real>,
    /// Main diagonal.
    pub diag: Vec<Real>,
    /// Super-diagonal.
    pub upper: Vec<Real>,
}

impl TridiagonalOperator {
    /// The zero operator of size `n`.
    pub fn new(n: usize) -> Self {
        Self {
            lower: vec![0.0; n],
            diag: vec![0.0; n],
            upper: vec![0.0; n],
        }
    }

    /// First derivative on a non-uniform mesh.
    ///
    /// Central three-point weights inside, one-sided differences on the
    /// two boundary rows.
    pub fn first_derivative(mesher: &Fdm1dMesher) -> Self {
        let n = mesher.size();
        let mut op = Self::new(n);
        for i in 0..n {
            match (mesher.dminus(i), mesher.dplus(i)) {
                (None, Some(hp)) => {
                    op.diag[i] = -1.0 / hp;
                    op.upper[i] = 1.0 / hp;
                }
                (Some(hm), None) => {
                    op.lower[i] = -1.0 / hm;
                    op.diag[i] = 1.0 / hm;
                }
                (Some(hm), Some(hp)) => {
                    op.lower[i] = -hp / (hm * (hm + hp));
                    op.diag[i] = (hp - hm) / (hm * hp);
                    op.upper[i] = hm / (hp * (hm + hp));
                }
                (None, None) => {}
            }
        }
        op
    }

    /// Second derivative on a non-uniform mesh; zero on the boundary rows.
    pub fn second_derivative(mesher: &Fdm1dMesher) -> Self {
        let n = mesher.size();
        let mut op = Self::new(n);
        for i in 0..n {
            if let (Some(hm), Some(hp)) = (mesher.dminus(i), mesher.dplus(i)) {
                op.lower[i] = 2.0 / (hm * (hm + hp));
                op.diag[i] = -2.0 / (hm * hp);
                op.upper[i] = 2.0 / (hp * (hm + hp));
            }
        }
        op
    }

    /// Size (number of rows/columns).
    pub fn size(&self) -> usize {
        self.diag.len()
    }

    /// `y = A · x`.
    pub fn apply(&self, x: &Array) -> Array {
        let n = self.size();
        let mut y = Array::zeros(n);
        if n == 1 {
            y[0] = self.diag[0] * x[0];
            return y;
        }
        y[0] = self.diag[0] * x[0] + self.upper[0] * x[1];
        for i in 1..n - 1 {
            y[i] = self.lower[i] * x[i - 1] + self.diag[i] * x[i] + self.upper[i] * x[i + 1];
        }
        y[n - 1] = self.lower[n - 1] * x[n - 2] + self.diag[n - 1] * x[n - 1];
        y
    }

    /// Row `i` scaled by `u[i]`.
    pub fn mult(&self, u: &[Real]) -> Self {
        let scale = |v: &[Real]| -> Vec<Real> { v.iter().zip(u).map(|(a, b)| a * b).collect() };
        Self {
            lower: scale(&self.lower),
            diag: scale(&self.diag),
            upper: scale(&self.upper),
        }
    }

    /// `a·x + y + b` where `a` and `b` hold either one value for every row
    /// or one value per row, and `b` is added to the diagonal.
    pub fn axpyb(a: &[Real], x: &Self, y: &Self, b: &[Real]) -> Self {
        let n = x.size();
        let at = |v: &[Real], i: usize| if v.len() > 1 { v[i] } else { v[0] };
        let mut out = Self::new(n);
        for i in 0..n {
            let s = at(a, i);
            out.lower[i] = y.lower[i] + s * x.lower[i];
            out.diag[i] = y.diag[i] + s * x.diag[i];
            out.upper[i] = y.upper[i] + s * x.upper[i];
            if !b.is_empty() {
                out.diag[i] += at(b, i);
            }
        }
        out
    }

    /// Solve `(b·I + a·A) x = r` with the Thomas algorithm.
    pub fn solve_splitting(&self, r: &Array, a: Real, b: Real) -> Result<Array> {
        let n = self.size();
        ensure!(
            r.size() == n,
            "inconsistent size of rhs ({} instead of {n})",
            r.size()
        );
        let mut x = Array::zeros(n);
        let mut tmp = vec![0.0; n];

        let mut bet = a * self.diag[0] + b;
        ensure!(bet != 0.0, "division by zero in tridiagonal solve");
        bet = 1.0 / bet;
        x[0] = r[0] * bet;
        for j in 1..n {
            tmp[j] = a * self.upper[j - 1] * bet;
            bet = b + a * (self.diag[j] - tmp[j] * self.lower[j]);
            ensure!(bet != 0.0, "division by zero in tridiagonal solve");
            bet = 1.0 / bet;
            x[j] = (r[j] - a * self.lower[j] * x[j - 1]) * bet;
        }
        for j in (0..n.saturating_sub(1)).rev() {
            x[j] -= tmp[j + 1] * x[j + 1];
        }
        Ok(x)
    }

    /// Solve `A · x = r`.
    pub fn solve(&self, r: &Array) -> Result<Array> {
        self.solve_splitting(r, 1.0, 0.0)
    }
}

/// A time-dependent linear operator `L(t)` for `∂u/∂t = L u`
/// rolled backwards in time.
pub trait FdmLinearOp {
    /// Number of grid points.
    fn size(&self) -> usize;

    /// Freeze the coefficients for the interval `[t1, t2]`.
    fn set_time(&mut self, t1: Time, t2: Time) -> Result<()>;

    /// `L · u`.
    fn apply(&self, u: &Array) -> Array;

    /// Solve `(I + a·L) x = r`.
    fn solve_splitting(&self, r: &Array, a: Real) -> Result<Array>;
}

/// The Black-Scholes operator in log-spot coordinates:
///
/// `L = (r - q - σ²/2) ∂x + σ²/2 ∂xx - r`
///
/// with rates taken as forward rates over each time step. The variance
/// is either the Black forward variance at the strike, constant across
/// the grid, or the local volatility at each node. With escrowed
/// dividends the grid carries the spot net of dividends, and the local
/// volatility is read at the grid spot plus the dividends still to come.
#[derive(Debug)]
pub struct FdmBlackScholesOp {
    r_ts: Rc<dyn YieldTermStructure>,
    q_ts: Rc<dyn YieldTermStructure>,
    vol_ts: Rc<dyn BlackVolTermStructure>,
    local_vol: Option<Rc<dyn LocalVolTermStructure>>,
    spots: Vec<Real>,
    dx_map: TridiagonalOperator,
    dxx_map: TridiagonalOperator,
    map_t: TridiagonalOperator,
    strike: Real,
    illegal_local_vol_overwrite: Option<Real>,
    escrowed: Option<Rc<EscrowedDividendAdjustment>>,
}

impl FdmBlackScholesOp {
    /// The operator for `process` on `mesher`.
    ///
    /// With `local_vol` the variance comes from the process's local
    /// volatility surface; a failing surface lookup is replaced by
    /// `illegal_local_vol_overwrite` when given and fails otherwise.
    pub fn new(
        mesher: &Fdm1dMesher,
        process: &GeneralizedBlackScholesProcess,
        strike: Real,
        local_vol: bool,
        illegal_local_vol_overwrite: Option<Real>,
    ) -> Result<Self> {
        let local_vol = if local_vol {
            Some(process.local_volatility()?)
        } else {
            None
        };
        let spots = if local_vol.is_some() {
            mesher.locations().iter().map(|x| x.exp()).collect()
        } else {
            Vec::new()
        };
        let n = mesher.size();
        Ok(Self {
            r_ts: process.risk_free_rate().current_link()?,
            q_ts: process.dividend_yield().current_link()?,
            vol_ts: process.black_volatility().current_link()?,
            local_vol,
            spots,
            dx_map: TridiagonalOperator::first_derivative(mesher),
            dxx_map: TridiagonalOperator::second_derivative(mesher),
            map_t: TridiagonalOperator::new(n),
            strike,
            illegal_local_vol_overwrite,
            escrowed: None,
        })
    }

    /// Read the local volatility at spots shifted by the escrowed
    /// dividends outstanding at each time.
    pub fn with_escrowed_dividends(mut self, adjustment: Rc<EscrowedDividendAdjustment>) -> Self {
        self.escrowed = Some(adjustment);
        self
    }

    fn local_variance(&self, surface: &dyn LocalVolTermStructure, t: Time, spot: Real) -> Result<Real> {
        match surface.local_vol(t, spot) {
            Ok(vol) => Ok(vol * vol),
            Err(err) => match self.illegal_local_vol_overwrite {
                Some(vol) => {
                    trace!(t, spot, %err, "overwriting illegal local volatility");
                    Ok(vol * vol)
                }
                None => Err(err),
            },
        }
    }
}

impl FdmLinearOp for FdmBlackScholesOp {
    fn size(&self) -> usize {
        self.map_t.size()
    }

    fn set_time(&mut self, t1: Time, t2: Time) -> Result<()> {
        let r = self.r_ts.forward_rate(t1, t2)?;
        let q = self.q_ts.forward_rate(t1, t2)?;
        let map_t = match &self.local_vol {
            Some(surface) => {
                let t = 0.5 * (t1 + t2);
                let shift = match &self.escrowed {
                    Some(adjustment) => -adjustment.dividend_adjustment(t)?,
                    None => 0.0,
                };
                let variance = self
                    .spots
                    .iter()
                    .map(|&s| self.local_variance(&**surface, t, s + shift))
                    .collect::<Result<Vec<Real>>>()?;
                let drift: Vec<Real> = variance.iter().map(|v| r - q - 0.5 * v).collect();
                let half_variance: Vec<Real> = variance.iter().map(|v| 0.5 * v).collect();
                TridiagonalOperator::axpyb(
                    &drift,
                    &self.dx_map,
                    &self.dxx_map.mult(&half_variance),
                    &[-r],
                )
            }
            None => {
                let v = self.vol_ts.black_forward_variance(t1, t2, self.strike)? / (t2 - t1);
                let half_variance = vec![0.5 * v; self.size()];
                TridiagonalOperator::axpyb(
                    &[r - q - 0.5 * v],
                    &self.dx_map,
                    &self.dxx_map.mult(&half_variance),
                    &[-r],
                )
            }
        };
        self.map_t = map_t;
        Ok(())
    }

    fn apply(&self, u: &Array) -> Array {
        self.map_t.apply(u)
    }

    fn solve_splitting(&self, r: &Array, a: Real) -> Result<Array> {
        self.map_t.solve_splitting(r, a, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finite_differences::meshers::{Concentrating1dMesher, Uniform1dMesher};
    use crate::lattice::binomial_tree::tests::flat_process;
    use approx::assert_abs_diff_eq;

    #[test]
    fn thomas_algorithm_solves_identity() {
        let mut op = TridiagonalOperator::new(4);
        op.diag = vec![1.0; 4];
        let rhs = Array::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
        let x = op.solve(&rhs).unwrap();
        for i in 0..4 {
            assert_abs_diff_eq!(x[i], rhs[i], epsilon = 1e-12);
        }
    }

    #[test]
    fn thomas_algorithm_solves_tridiagonal() {
        // [[2, -1, 0], [-1, 2, -1], [0, -1, 2]] · [1, 2, 3] = [0, 0, 4]
        let op = TridiagonalOperator {
            lower: vec![0.0, -1.0, -1.0],
            diag: vec![2.0, 2.0, 2.0],
            upper: vec![-1.0, -1.0, 0.0],
        };
        let x = op.solve(&Array::from_vec(vec![0.0, 0.0, 4.0])).unwrap();
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[1], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(x[2], 3.0, epsilon = 1e-12);
        let back = op.apply(&x);
        assert_abs_diff_eq!(back[2], 4.0, epsilon = 1e-12);
    }

    #[test]
    fn splitting_solve_inverts_identity_plus_operator() {
        let op = TridiagonalOperator {
            lower: vec![0.0, 0.3, -0.2, 0.1],
            diag: vec![-1.0, -0.5, -0.8, -0.4],
            upper: vec![0.2, 0.1, 0.4, 0.0],
        };
        let x = Array::from_vec(vec![1.0, -2.0, 0.5, 3.0]);
        let a = -0.7;
        let r = &x + &(&op.apply(&x) * a);
        let solved = op.solve_splitting(&r, a, 1.0).unwrap();
        for i in 0..4 {
            assert_abs_diff_eq!(solved[i], x[i], epsilon = 1e-12);
        }
        assert!(op.solve_splitting(&Array::zeros(3), a, 1.0).is_err());
    }

    #[test]
    fn derivatives_are_exact_for_quadratics_on_nonuniform_grids() {
        let mesher = Concentrating1dMesher::new(-1.0, 2.0, 21)
            .concentrate(0.3, 0.1)
            .build()
            .unwrap();
        let u = Array::from_vec(mesher.locations().iter().map(|x| x * x + x).collect());
        let du = TridiagonalOperator::first_derivative(&mesher).apply(&u);
        let d2u = TridiagonalOperator::second_derivative(&mesher).apply(&u);
        for i in 1..20 {
            let x = mesher.location(i);
            assert_abs_diff_eq!(du[i], 2.0 * x + 1.0, epsilon = 1e-10);
            assert_abs_diff_eq!(d2u[i], 2.0, epsilon = 1e-8);
        }
        assert_eq!(d2u[0], 0.0);
    }

    #[test]
    fn black_scholes_operator_annihilates_the_discounted_forward() {
        // e^{x} is the forward of the spot: L e^x = (r - q) e^x - r e^x
        let process = flat_process(100.0, 0.05, 0.02, 0.20);
        let mesher = Uniform1dMesher::new(3.0, 6.0, 301).build().unwrap();
        let mut op = FdmBlackScholesOp::new(&mesher, &process, 100.0, false, None).unwrap();
        op.set_time(0.5, 0.51).unwrap();
        let u = Array::from_vec(mesher.locations().iter().map(|x| x.exp()).collect());
        let lu = op.apply(&u);
        for i in [50, 150, 250] {
            assert_abs_diff_eq!(lu[i] / u[i], -0.02, epsilon = 1e-3);
        }
    }

    #[test]
    fn local_vol_operator_matches_constant_vol() {
        let process = flat_process(100.0, 0.05, 0.0, 0.25);
        let mesher = Uniform1dMesher::new(3.0, 6.0, 51).build().unwrap();
        let mut black = FdmBlackScholesOp::new(&mesher, &process, 100.0, false, None).unwrap();
        let mut local = FdmBlackScholesOp::new(&mesher, &process, 100.0, true, None).unwrap();
        black.set_time(0.1, 0.2).unwrap();
        local.set_time(0.1, 0.2).unwrap();
        let u = Array::from_vec(mesher.locations().iter().map(|x| (x - 4.6).powi(2)).collect());
        let (a, b) = (black.apply(&u), local.apply(&u));
        for i in 0..51 {
            assert_abs_diff_eq!(a[i], b[i], epsilon = 1e-10);
        }
    }

    proptest::proptest! {
        #[test]
        fn splitting_solve_round_trips_on_dominant_systems(
            lower in proptest::collection::vec(-1.0..1.0_f64, 6),
            upper in proptest::collection::vec(-1.0..1.0_f64, 6),
            x in proptest::collection::vec(-10.0..10.0_f64, 6),
            a in 0.0..0.5_f64,
        ) {
            let op = TridiagonalOperator {
                lower,
                diag: vec![3.0; 6],
                upper,
            };
            let x = Array::from_vec(x);
            let r = &x + &(&op.apply(&x) * a);
            let solved = op.solve_splitting(&r, a, 1.0).unwrap();
            for i in 0..6 {
                proptest::prop_assert!((solved[i] - x[i]).abs() < 1e-9);
            }
        }
    }
}
