//! MINPACK `lmdif` and its helpers.
//!
//! Column-major storage throughout: the `m × n` Jacobian lives in a slice
//! of length `m * n` with leading dimension `m`. The floating-point
//! operation order of the Fortran routines is kept; the convergence tests
//! of the calibration fixtures depend on it.

use ql_core::{
    errors::{Error, Result},
    Real,
};

const P1: Real = 0.1;
const P5: Real = 0.5;
const P25: Real = 0.25;
const P75: Real = 0.75;
const P001: Real = 0.001;
const P0001: Real = 1.0e-4;
const P05: Real = 0.05;

/// Machine precision.
const MACHEP: Real = f64::EPSILON;
/// Smallest positive normalised magnitude.
const DWARF: Real = f64::MIN_POSITIVE;

/// Residual system solved by [`lmdif`].
pub trait LmdifSystem {
    /// Write the `m` residuals at `x` into `fvec`.
    fn residuals(&mut self, x: &[Real], fvec: &mut [Real]) -> Result<()>;

    /// Whether [`jacobian`](Self::jacobian) is implemented. When `false`
    /// the Jacobian is approximated by forward differences.
    fn has_jacobian(&self) -> bool {
        false
    }

    /// Write the `m × n` Jacobian at `x` into `fjac`, column-major.
    fn jacobian(&mut self, _x: &[Real], _fjac: &mut [Real]) -> Result<()> {
        Err(Error::NotImplemented("analytic jacobian".into()))
    }
}

/// How the variables are scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scaling {
    /// Scale by the column norms of the Jacobian, updated as they grow.
    #[default]
    Automatic,
    /// Use the caller's `diag`, which must be positive.
    User,
}

/// Tolerances and budget for [`lmdif`].
#[derive(Debug, Clone, Copy)]
pub struct LmdifControl {
    /// Relative reduction in the sum of squares considered negligible.
    pub ftol: Real,
    /// Relative change in `x` considered negligible.
    pub xtol: Real,
    /// Cosine between `fvec` and the Jacobian columns considered zero.
    pub gtol: Real,
    /// Maximum number of residual evaluations.
    pub maxfev: usize,
    /// Relative error in the residuals, used to size difference steps.
    pub epsfcn: Real,
    /// Initial step bound, as a multiple of the scaled `x` norm.
    pub factor: Real,
    /// Variable scaling.
    pub scaling: Scaling,
}

/// Termination status of [`lmdif`], numbered as in MINPACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LmdifInfo {
    /// 0: improper input parameters.
    ImproperInput,
    /// 1: actual and predicted relative reductions are at most `ftol`.
    RelativeReduction,
    /// 2: relative error between two iterates is at most `xtol`.
    RelativeError,
    /// 3: both 1 and 2 hold.
    ReductionAndError,
    /// 4: `fvec` is orthogonal to the Jacobian columns to within `gtol`.
    Orthogonal,
    /// 5: the evaluation budget was spent.
    MaxEvaluations,
    /// 6: `ftol` is too small for further reduction.
    FtolTooSmall,
    /// 7: `xtol` is too small for further improvement of `x`.
    XtolTooSmall,
    /// 8: `gtol` is too small; `fvec` is orthogonal to machine precision.
    GtolTooSmall,
}

impl LmdifInfo {
    /// MINPACK's integer code.
    pub fn code(self) -> i32 {
        match self {
            Self::ImproperInput => 0,
            Self::RelativeReduction => 1,
            Self::RelativeError => 2,
            Self::ReductionAndError => 3,
            Self::Orthogonal => 4,
            Self::MaxEvaluations => 5,
            Self::FtolTooSmall => 6,
            Self::XtolTooSmall => 7,
            Self::GtolTooSmall => 8,
        }
    }
}

/// Outcome of [`lmdif`].
#[derive(Debug, Clone)]
pub struct LmdifReport {
    /// Why the iteration stopped.
    pub info: LmdifInfo,
    /// Residual evaluations, including those spent on the Jacobian.
    pub nfev: usize,
    /// Upper triangle: `R` of the final QR factorization; below it, the
    /// Householder vectors. Column-major `m × n`.
    pub fjac: Vec<Real>,
    /// Column permutation of the factorization.
    pub ipvt: Vec<usize>,
    /// First `n` elements of `Qᵀ fvec`.
    pub qtf: Vec<Real>,
}

/// Euclidean norm, accumulated in three magnitude bands to avoid
/// destructive underflow and overflow.
pub fn enorm(x: &[Real]) -> Real {
    const RDWARF: Real = 3.834e-20;
    const RGIANT: Real = 1.304e19;

    let mut s1 = 0.0;
    let mut s2 = 0.0;
    let mut s3 = 0.0;
    let mut x1max: Real = 0.0;
    let mut x3max: Real = 0.0;
    let agiant = RGIANT / x.len() as Real;

    for &xi in x {
        let xabs = xi.abs();
        if xabs > RDWARF && xabs < agiant {
            s2 += xabs * xabs;
        } else if xabs > RDWARF {
            if xabs > x1max {
                let temp = x1max / xabs;
                s1 = 1.0 + s1 * temp * temp;
                x1max = xabs;
            } else {
                let temp = xabs / x1max;
                s1 += temp * temp;
            }
        } else if xabs > x3max {
            let temp = x3max / xabs;
            s3 = 1.0 + s3 * temp * temp;
            x3max = xabs;
        } else if xabs != 0.0 {
            let temp = xabs / x3max;
            s3 += temp * temp;
        }
    }

    if s1 != 0.0 {
        return x1max * (s1 + (s2 / x1max) / x1max).sqrt();
    }
    if s2 != 0.0 {
        let temp = if s2 >= x3max {
            s2 * (1.0 + (x3max / s2) * (x3max * s3))
        } else {
            x3max * ((s2 / x3max) + (x3max * s3))
        };
        temp.sqrt()
    } else {
        x3max * s3.sqrt()
    }
}

/// Forward-difference Jacobian of `system` at `x`, column-major into
/// `fjac`. `fvec` must hold the residuals at `x`; `wa` has length `m`.
fn fdjac2<S: LmdifSystem + ?Sized>(
    system: &mut S,
    x: &mut [Real],
    fvec: &[Real],
    fjac: &mut [Real],
    epsfcn: Real,
    wa: &mut [Real],
) -> Result<()> {
    let m = fvec.len();
    let eps = epsfcn.max(MACHEP).sqrt();
    let mut ij = 0;
    for j in 0..x.len() {
        let temp = x[j];
        let mut h = eps * temp.abs();
        if h == 0.0 {
            h = eps;
        }
        x[j] = temp + h;
        let evaluated = system.residuals(x, wa);
        x[j] = temp;
        evaluated?;
        for i in 0..m {
            fjac[ij] = (wa[i] - fvec[i]) / h;
            ij += 1;
        }
    }
    Ok(())
}

/// Householder QR factorization with optional column pivoting of the
/// `m × n` matrix `a`.
///
/// On return the strict upper triangle of `a` holds `R` without its
/// diagonal, which is in `rdiag`; the lower trapezoid holds the Householder
/// vectors. `acnorm` receives the original column norms.
#[allow(clippy::too_many_arguments)]
pub fn qrfac(
    m: usize,
    n: usize,
    a: &mut [Real],
    pivot: bool,
    ipvt: &mut [usize],
    rdiag: &mut [Real],
    acnorm: &mut [Real],
    wa: &mut [Real],
) {
    // Initial column norms.
    for j in 0..n {
        acnorm[j] = enorm(&a[m * j..m * j + m]);
        rdiag[j] = acnorm[j];
        wa[j] = rdiag[j];
        if pivot {
            ipvt[j] = j;
        }
    }

    let minmn = m.min(n);
    for j in 0..minmn {
        if pivot {
            // Bring the column of largest norm into the pivot position.
            let mut kmax = j;
            for k in j..n {
                if rdiag[k] > rdiag[kmax] {
                    kmax = k;
                }
            }
            if kmax != j {
                for i in 0..m {
                    a.swap(i + m * j, i + m * kmax);
                }
                rdiag[kmax] = rdiag[j];
                wa[kmax] = wa[j];
                ipvt.swap(j, kmax);
            }
        }

        // Householder transformation reducing column j to a multiple of
        // the j-th unit vector.
        let jj = j + m * j;
        let mut ajnorm = enorm(&a[jj..jj + m - j]);
        if ajnorm != 0.0 {
            if a[jj] < 0.0 {
                ajnorm = -ajnorm;
            }
            for i in j..m {
                a[i + m * j] /= ajnorm;
            }
            a[jj] += 1.0;

            // Apply it to the remaining columns and update the norms.
            let jp1 = j + 1;
            for k in jp1..n {
                let mut sum = 0.0;
                for i in j..m {
                    sum += a[i + m * j] * a[i + m * k];
                }
                let temp = sum / a[j + m * j];
                for i in j..m {
                    a[i + m * k] -= temp * a[i + m * j];
                }
                if pivot && rdiag[k] != 0.0 {
                    let temp = a[j + m * k] / rdiag[k];
                    let temp = (1.0 - temp * temp).max(0.0);
                    rdiag[k] *= temp.sqrt();
                    let temp = rdiag[k] / wa[k];
                    if P05 * temp * temp <= MACHEP {
                        rdiag[k] = enorm(&a[jp1 + m * k..m + m * k]);
                        wa[k] = rdiag[k];
                    }
                }
            }
        }
        rdiag[j] = -ajnorm;
    }
}

/// Solve `A x = b`, `D x = 0` in the least-squares sense given the QR
/// factorization `A P = Q R`.
///
/// `r` holds `R` in its upper triangle (leading dimension `ldr`); on
/// return its strict lower triangle holds the transpose of the strict
/// upper triangle of `S`, with `Pᵀ(AᵀA + DD)P = SᵀS`, and `sdiag` the
/// diagonal of `S`. `qtb` is the first `n` elements of `Qᵀb`.
#[allow(clippy::too_many_arguments)]
pub fn qrsolv(
    n: usize,
    r: &mut [Real],
    ldr: usize,
    ipvt: &[usize],
    diag: &[Real],
    qtb: &[Real],
    x: &mut [Real],
    sdiag: &mut [Real],
    wa: &mut [Real],
) {
    // Copy R and Qᵀb to preserve input and initialise S; save the diagonal
    // of R in x.
    for j in 0..n {
        for i in j..n {
            r[i + ldr * j] = r[j + ldr * i];
        }
        x[j] = r[j + ldr * j];
        wa[j] = qtb[j];
    }

    // Eliminate the diagonal matrix D with Givens rotations.
    for j in 0..n {
        let l = ipvt[j];
        if diag[l] != 0.0 {
            for k in j..n {
                sdiag[k] = 0.0;
            }
            sdiag[j] = diag[l];

            // Only one element of (Qᵀb, 0) beyond the first n is touched.
            let mut qtbpj = 0.0;
            for k in j..n {
                if sdiag[k] == 0.0 {
                    continue;
                }
                let kk = k + ldr * k;
                let (sin, cos);
                if r[kk].abs() < sdiag[k].abs() {
                    let cotan = r[kk] / sdiag[k];
                    sin = P5 / (P25 + P25 * cotan * cotan).sqrt();
                    cos = sin * cotan;
                } else {
                    let tan = sdiag[k] / r[kk];
                    cos = P5 / (P25 + P25 * tan * tan).sqrt();
                    sin = cos * tan;
                }

                r[kk] = cos * r[kk] + sin * sdiag[k];
                let temp = cos * wa[k] + sin * qtbpj;
                qtbpj = -sin * wa[k] + cos * qtbpj;
                wa[k] = temp;

                for i in k + 1..n {
                    let ik = i + ldr * k;
                    let temp = cos * r[ik] + sin * sdiag[i];
                    sdiag[i] = -sin * r[ik] + cos * sdiag[i];
                    r[ik] = temp;
                }
            }
        }
        // Store the diagonal of S and restore the diagonal of R.
        let kk = j + ldr * j;
        sdiag[j] = r[kk];
        r[kk] = x[j];
    }

    // Solve the triangular system; if singular, take a least-squares
    // solution.
    let mut nsing = n;
    for j in 0..n {
        if sdiag[j] == 0.0 && nsing == n {
            nsing = j;
        }
        if nsing < n {
            wa[j] = 0.0;
        }
    }
    for k in 0..nsing {
        let j = nsing - k - 1;
        let mut sum = 0.0;
        for i in j + 1..nsing {
            sum += r[i + ldr * j] * wa[i];
        }
        wa[j] = (wa[j] - sum) / sdiag[j];
    }

    // Undo the permutation.
    for j in 0..n {
        x[ipvt[j]] = wa[j];
    }
}

/// Determine the Levenberg-Marquardt parameter `par` such that the step
/// `x` solving `A x = b`, `sqrt(par) D x = 0` satisfies
/// `|D x| ≈ delta`, or `par = 0` if the Gauss-Newton step already does.
#[allow(clippy::too_many_arguments)]
pub fn lmpar(
    n: usize,
    r: &mut [Real],
    ldr: usize,
    ipvt: &[usize],
    diag: &[Real],
    qtb: &[Real],
    delta: Real,
    par: &mut Real,
    x: &mut [Real],
    sdiag: &mut [Real],
    wa1: &mut [Real],
    wa2: &mut [Real],
) {
    // Gauss-Newton direction; least-squares solution if rank-deficient.
    let mut nsing = n;
    for j in 0..n {
        wa1[j] = qtb[j];
        if r[j + ldr * j] == 0.0 && nsing == n {
            nsing = j;
        }
        if nsing < n {
            wa1[j] = 0.0;
        }
    }
    for k in 0..nsing {
        let j = nsing - k - 1;
        wa1[j] /= r[j + ldr * j];
        let temp = wa1[j];
        for i in 0..j {
            wa1[i] -= r[i + ldr * j] * temp;
        }
    }
    for j in 0..n {
        x[ipvt[j]] = wa1[j];
    }

    // Accept the Gauss-Newton direction if it is short enough.
    let mut iter = 0;
    for j in 0..n {
        wa2[j] = diag[j] * x[j];
    }
    let mut dxnorm = enorm(&wa2[..n]);
    let mut fp = dxnorm - delta;

    if fp > P1 * delta {
        // Lower bound from the Newton step when the Jacobian has full rank.
        let mut parl = 0.0;
        if nsing >= n {
            for j in 0..n {
                let l = ipvt[j];
                wa1[j] = diag[l] * (wa2[l] / dxnorm);
            }
            for j in 0..n {
                let mut sum = 0.0;
                for i in 0..j {
                    sum += r[i + ldr * j] * wa1[i];
                }
                wa1[j] = (wa1[j] - sum) / r[j + ldr * j];
            }
            let temp = enorm(&wa1[..n]);
            parl = ((fp / delta) / temp) / temp;
        }

        // Upper bound.
        for j in 0..n {
            let mut sum = 0.0;
            for i in 0..=j {
                sum += r[i + ldr * j] * qtb[i];
            }
            wa1[j] = sum / diag[ipvt[j]];
        }
        let gnorm = enorm(&wa1[..n]);
        let mut paru = gnorm / delta;
        if paru == 0.0 {
            paru = DWARF / delta.min(P1);
        }

        // Clamp the incoming par to (parl, paru).
        *par = par.max(parl);
        *par = par.min(paru);
        if *par == 0.0 {
            *par = gnorm / dxnorm;
        }

        loop {
            iter += 1;

            if *par == 0.0 {
                *par = DWARF.max(P001 * paru);
            }
            let temp = par.sqrt();
            for j in 0..n {
                wa1[j] = temp * diag[j];
            }
            qrsolv(n, r, ldr, ipvt, wa1, qtb, x, sdiag, wa2);
            for j in 0..n {
                wa2[j] = diag[j] * x[j];
            }
            dxnorm = enorm(&wa2[..n]);
            let temp = fp;
            fp = dxnorm - delta;

            // Accept par when the step length is close enough, or in the
            // exceptional cases.
            if fp.abs() <= P1 * delta
                || (parl == 0.0 && fp <= temp && temp < 0.0)
                || iter == 10
            {
                break;
            }

            // Newton correction.
            for j in 0..n {
                let l = ipvt[j];
                wa1[j] = diag[l] * (wa2[l] / dxnorm);
            }
            for j in 0..n {
                wa1[j] /= sdiag[j];
                let temp = wa1[j];
                for i in j + 1..n {
                    wa1[i] -= r[i + ldr * j] * temp;
                }
            }
            let temp = enorm(&wa1[..n]);
            let parc = ((fp / delta) / temp) / temp;

            if fp > 0.0 {
                parl = parl.max(*par);
            }
            if fp < 0.0 {
                paru = paru.min(*par);
            }
            *par = parl.max(*par + parc);
        }
    }

    if iter == 0 {
        *par = 0.0;
    }
}

/// Minimize the sum of squares of `m` residuals in `n` variables by the
/// Levenberg-Marquardt method.
///
/// On entry `x` is the starting point; on return it holds the final
/// estimate and `fvec` the residuals there. `diag` must have length `n`;
/// with [`Scaling::User`] it supplies positive scale factors, otherwise it
/// is overwritten. Improper inputs are reported as
/// [`LmdifInfo::ImproperInput`] without evaluating anything; errors from
/// `system` abort the iteration.
pub fn lmdif<S: LmdifSystem + ?Sized>(
    system: &mut S,
    x: &mut [Real],
    fvec: &mut [Real],
    diag: &mut [Real],
    control: &LmdifControl,
) -> Result<LmdifReport> {
    let m = fvec.len();
    let n = x.len();
    let LmdifControl {
        ftol,
        xtol,
        gtol,
        maxfev,
        epsfcn,
        factor,
        scaling,
    } = *control;

    let mut report = LmdifReport {
        info: LmdifInfo::ImproperInput,
        nfev: 0,
        fjac: vec![0.0; m * n],
        ipvt: vec![0; n],
        qtf: vec![0.0; n],
    };

    if n == 0
        || m < n
        || diag.len() != n
        || ftol < 0.0
        || xtol < 0.0
        || gtol < 0.0
        || maxfev == 0
        || factor <= 0.0
    {
        return Ok(report);
    }
    if scaling == Scaling::User && diag.iter().any(|&d| d <= 0.0) {
        return Ok(report);
    }

    let fjac = &mut report.fjac;
    let ipvt = &mut report.ipvt;
    let qtf = &mut report.qtf;
    let mut wa1 = vec![0.0; n];
    let mut wa2 = vec![0.0; n];
    let mut wa3 = vec![0.0; n];
    let mut wa4 = vec![0.0; m];

    // Starting point.
    system.residuals(x, fvec)?;
    report.nfev = 1;
    let mut fnorm = enorm(fvec);

    let mut par = 0.0;
    let mut iter = 1;
    let mut xnorm = 0.0;
    let mut delta = 0.0;

    let info = 'outer: loop {
        // Jacobian.
        if system.has_jacobian() {
            system.jacobian(x, fjac)?;
        } else {
            fdjac2(system, x, fvec, fjac, epsfcn, &mut wa4)?;
        }
        report.nfev += n;

        qrfac(m, n, fjac, true, ipvt, &mut wa1, &mut wa2, &mut wa3);

        // First iteration: scale by the initial column norms and set the
        // step bound.
        if iter == 1 {
            if scaling != Scaling::User {
                for j in 0..n {
                    diag[j] = wa2[j];
                    if wa2[j] == 0.0 {
                        diag[j] = 1.0;
                    }
                }
            }
            for j in 0..n {
                wa3[j] = diag[j] * x[j];
            }
            xnorm = enorm(&wa3);
            delta = factor * xnorm;
            if delta == 0.0 {
                delta = factor;
            }
        }

        // Qᵀ fvec, first n components into qtf.
        wa4.copy_from_slice(fvec);
        for j in 0..n {
            let jj = j + m * j;
            let temp3 = fjac[jj];
            if temp3 != 0.0 {
                let mut sum = 0.0;
                for i in j..m {
                    sum += fjac[i + m * j] * wa4[i];
                }
                let temp = -sum / temp3;
                for i in j..m {
                    wa4[i] += fjac[i + m * j] * temp;
                }
            }
            fjac[jj] = wa1[j];
            qtf[j] = wa4[j];
        }

        // Norm of the scaled gradient.
        let mut gnorm: Real = 0.0;
        if fnorm != 0.0 {
            for j in 0..n {
                let l = ipvt[j];
                if wa2[l] != 0.0 {
                    let mut sum = 0.0;
                    for i in 0..=j {
                        sum += fjac[i + m * j] * (qtf[i] / fnorm);
                    }
                    gnorm = gnorm.max((sum / wa2[l]).abs());
                }
            }
        }

        if gnorm <= gtol {
            break LmdifInfo::Orthogonal;
        }

        if scaling != Scaling::User {
            for j in 0..n {
                diag[j] = diag[j].max(wa2[j]);
            }
        }

        loop {
            lmpar(
                n, fjac, m, ipvt, diag, qtf, delta, &mut par, &mut wa1, &mut wa2, &mut wa3,
                &mut wa4,
            );

            // Direction p, trial point x + p and |D p|.
            for j in 0..n {
                wa1[j] = -wa1[j];
                wa2[j] = x[j] + wa1[j];
                wa3[j] = diag[j] * wa1[j];
            }
            let pnorm = enorm(&wa3);

            if iter == 1 {
                delta = delta.min(pnorm);
            }

            system.residuals(&wa2, &mut wa4)?;
            report.nfev += 1;
            let fnorm1 = enorm(&wa4);

            // Scaled actual reduction.
            let mut actred = -1.0;
            if P1 * fnorm1 < fnorm {
                let temp = fnorm1 / fnorm;
                actred = 1.0 - temp * temp;
            }

            // Scaled predicted reduction and directional derivative.
            for j in 0..n {
                wa3[j] = 0.0;
                let temp = wa1[ipvt[j]];
                for i in 0..=j {
                    wa3[i] += fjac[i + m * j] * temp;
                }
            }
            let temp1 = enorm(&wa3) / fnorm;
            let temp2 = (par.sqrt() * pnorm) / fnorm;
            let prered = temp1 * temp1 + (temp2 * temp2) / P5;
            let dirder = -(temp1 * temp1 + temp2 * temp2);

            let mut ratio = 0.0;
            if prered != 0.0 {
                ratio = actred / prered;
            }

            // Update the step bound.
            if ratio <= P25 {
                let mut temp = if actred >= 0.0 {
                    P5
                } else {
                    P5 * dirder / (dirder + P5 * actred)
                };
                if P1 * fnorm1 >= fnorm || temp < P1 {
                    temp = P1;
                }
                delta = temp * delta.min(pnorm / P1);
                par /= temp;
            } else if par == 0.0 || ratio >= P75 {
                delta = pnorm / P5;
                par *= P5;
            }

            // Successful iteration: accept x + p.
            if ratio >= P0001 {
                for j in 0..n {
                    x[j] = wa2[j];
                    wa2[j] = diag[j] * x[j];
                }
                fvec.copy_from_slice(&wa4);
                xnorm = enorm(&wa2);
                fnorm = fnorm1;
                iter += 1;
            }

            // Convergence.
            let reduced = actred.abs() <= ftol && prered <= ftol && P5 * ratio <= 1.0;
            let mut info = None;
            if reduced {
                info = Some(LmdifInfo::RelativeReduction);
            }
            if delta <= xtol * xnorm {
                info = Some(LmdifInfo::RelativeError);
            }
            if reduced && info == Some(LmdifInfo::RelativeError) {
                info = Some(LmdifInfo::ReductionAndError);
            }
            if let Some(info) = info {
                break 'outer info;
            }

            // Termination and stringent tolerances.
            if report.nfev >= maxfev {
                info = Some(LmdifInfo::MaxEvaluations);
            }
            if actred.abs() <= MACHEP && prered <= MACHEP && P5 * ratio <= 1.0 {
                info = Some(LmdifInfo::FtolTooSmall);
            }
            if delta <= MACHEP * xnorm {
                info = Some(LmdifInfo::XtolTooSmall);
            }
            if gnorm <= MACHEP {
                info = Some(LmdifInfo::GtolTooSmall);
            }
            if let Some(info) = info {
                break 'outer info;
            }

            if ratio >= P0001 {
                break;
            }
        }
    };

    report.info = info;
    Ok(report)
}
