//! One-dimensional finite-difference solvers.

use std::rc::Rc;

use ql_core::{ensure, errors::Result, fail, Real, Time};
use ql_math::interpolations::{CubicNaturalSpline, Interpolation1D};
use ql_math::Array;
use ql_processes::GeneralizedBlackScholesProcess;
use tracing::debug;

use super::inner_value::FdmLogInnerValue;
use super::meshers::Fdm1dMesher;
use super::operators::{FdmBlackScholesOp, FdmLinearOp};
use super::schemes::{FdmBackwardSolver, FdmSchemeDesc};
use super::step_conditions::{FdmSnapshotCondition, FdmStepConditionComposite};

/// Everything a solver needs apart from the operator and the scheme.
#[derive(Debug, Clone)]
pub struct FdmSolverDesc {
    /// Spatial mesh.
    pub mesher: Fdm1dMesher,
    /// Conditions applied during the rollback.
    pub conditions: FdmStepConditionComposite,
    /// Payoff on the mesh, used for the terminal values.
    pub calculator: Rc<FdmLogInnerValue>,
    /// Time to maturity.
    pub maturity: Time,
    /// Number of time steps.
    pub time_steps: usize,
    /// Number of implicit damping steps.
    pub damping_steps: usize,
}

/// Solves a one-factor problem back to time zero and interpolates the
/// result with a natural cubic spline.
///
/// A snapshot of the values is taken shortly before time zero, at
/// `0.99 * min(1 day, first stopping time)`, to estimate theta.
#[derive(Debug)]
pub struct Fdm1dSolver {
    x: Vec<Real>,
    result_values: Array,
    interpolation: CubicNaturalSpline,
    snapshot: Rc<FdmSnapshotCondition>,
    first_stopping_time: Time,
}

impl Fdm1dSolver {
    /// Roll the averaged payoff back from maturity with `op`.
    pub fn new(desc: FdmSolverDesc, scheme: FdmSchemeDesc, mut op: impl FdmLinearOp) -> Result<Self> {
        let first = desc
            .conditions
            .stopping_times()
            .first()
            .copied()
            .unwrap_or(desc.maturity);
        let snapshot = Rc::new(FdmSnapshotCondition::new(0.99 * first.min(1.0 / 365.0)));
        let conditions = FdmStepConditionComposite::join_conditions(snapshot.clone(), &desc.conditions);

        let x = desc.mesher.locations().to_vec();
        let mut rhs = Array::from_vec(
            (0..x.len())
                .map(|i| desc.calculator.avg_inner_value(i, desc.maturity))
                .collect::<Result<Vec<Real>>>()?,
        );

        FdmBackwardSolver::new(&mut op, conditions.stopping_times(), &conditions, scheme).rollback(
            &mut rhs,
            desc.maturity,
            0.0,
            desc.time_steps,
            desc.damping_steps,
        )?;

        let interpolation = CubicNaturalSpline::new(&x, rhs.as_slice())?;
        debug!(
            nodes = x.len(),
            maturity = desc.maturity,
            "finite-difference solution ready"
        );
        Ok(Self {
            x,
            result_values: rhs,
            interpolation,
            snapshot,
            first_stopping_time: conditions.stopping_times().first().copied().unwrap_or(0.0),
        })
    }

    /// Values on the mesh at time zero.
    pub fn result_values(&self) -> &Array {
        &self.result_values
    }

    /// Value at location `x`.
    pub fn interpolate_at(&self, x: Real) -> Real {
        self.interpolation.value(x)
    }

    /// First derivative in the mesh coordinate at `x`.
    pub fn derivative_x(&self, x: Real) -> Real {
        self.interpolation.derivative(x)
    }

    /// Second derivative in the mesh coordinate at `x`.
    pub fn derivative_xx(&self, x: Real) -> Real {
        self.interpolation.second_derivative(x)
    }

    /// Time decay at `x`, from the snapshot taken just before time zero.
    pub fn theta_at(&self, x: Real) -> Result<Real> {
        ensure!(
            self.first_stopping_time > 0.0,
            "stopping time at zero: can't calculate theta"
        );
        let Some(values) = self.snapshot.values() else {
            fail!("no snapshot taken: can't calculate theta")
        };
        let snapshot = CubicNaturalSpline::new(&self.x, values.as_slice())?;
        Ok((snapshot.value(x) - self.interpolate_at(x)) / self.snapshot.time())
    }
}

/// Black-Scholes problem in log-spot coordinates, with results read off
/// in spot terms.
#[derive(Debug)]
pub struct FdmBlackScholesSolver {
    solver: Fdm1dSolver,
}

impl FdmBlackScholesSolver {
    /// Solve `desc` for `process` with the Black-Scholes operator.
    pub fn new(
        process: &GeneralizedBlackScholesProcess,
        strike: Real,
        desc: FdmSolverDesc,
        scheme: FdmSchemeDesc,
        local_vol: bool,
        illegal_local_vol_overwrite: Option<Real>,
    ) -> Result<Self> {
        let mut op = FdmBlackScholesOp::new(
            &desc.mesher,
            process,
            strike,
            local_vol,
            illegal_local_vol_overwrite,
        )?;
        if let Some(adjustment) = desc.calculator.escrowed_adjustment() {
            op = op.with_escrowed_dividends(Rc::clone(adjustment));
        }
        Ok(Self {
            solver: Fdm1dSolver::new(desc, scheme, op)?,
        })
    }

    /// Value at spot `s`.
    pub fn value_at(&self, s: Real) -> Real {
        self.solver.interpolate_at(s.ln())
    }

    /// Delta at spot `s`.
    pub fn delta_at(&self, s: Real) -> Real {
        self.solver.derivative_x(s.ln()) / s
    }

    /// Gamma at spot `s`.
    pub fn gamma_at(&self, s: Real) -> Real {
        let x = s.ln();
        (self.solver.derivative_xx(x) - self.solver.derivative_x(x)) / (s * s)
    }

    /// Theta at spot `s`.
    pub fn theta_at(&self, s: Real) -> Result<Real> {
        self.solver.theta_at(s.ln())
    }
}
