//! Time-stepping schemes and the backward rollback.

use std::fmt;

use ql_core::{ensure, errors::Result, Real, Time};
use ql_math::Array;
use tracing::debug;

use super::operators::FdmLinearOp;
use super::step_conditions::StepCondition;

/// Time-stepping scheme family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdmSchemeType {
    /// Douglas ADI splitting; with one dimension a theta scheme.
    Douglas,
    /// Explicit half step followed by an implicit half step.
    CrankNicolson,
    /// Fully implicit Euler.
    ImplicitEuler,
    /// Fully explicit Euler.
    ExplicitEuler,
}

impl fmt::Display for FdmSchemeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Douglas => "Douglas",
            Self::CrankNicolson => "Crank-Nicolson",
            Self::ImplicitEuler => "implicit Euler",
            Self::ExplicitEuler => "explicit Euler",
        };
        f.write_str(name)
    }
}

/// Scheme choice with its parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FdmSchemeDesc {
    /// Scheme family.
    pub scheme_type: FdmSchemeType,
    /// Implicitness weight.
    pub theta: Real,
    /// Mixed-derivative weight; unused in one dimension.
    pub mu: Real,
}

impl FdmSchemeDesc {
    /// Douglas with `theta = 0.5`.
    pub fn douglas() -> Self {
        Self {
            scheme_type: FdmSchemeType::Douglas,
            theta: 0.5,
            mu: 0.0,
        }
    }

    /// Crank-Nicolson with `theta = 0.5`.
    pub fn crank_nicolson() -> Self {
        Self {
            scheme_type: FdmSchemeType::CrankNicolson,
            theta: 0.5,
            mu: 0.0,
        }
    }

    /// Implicit Euler.
    pub fn implicit_euler() -> Self {
        Self {
            scheme_type: FdmSchemeType::ImplicitEuler,
            theta: 0.0,
            mu: 0.0,
        }
    }

    /// Explicit Euler.
    pub fn explicit_euler() -> Self {
        Self {
            scheme_type: FdmSchemeType::ExplicitEuler,
            theta: 0.0,
            mu: 0.0,
        }
    }
}

impl Default for FdmSchemeDesc {
    fn default() -> Self {
        Self::douglas()
    }
}

#[derive(Debug, Clone, Copy)]
enum Stepping {
    Douglas(Real),
    CrankNicolson(Real),
    Implicit,
    Explicit,
}

/// One scheme bound to an operator, stepping the values backwards from
/// `t` to `t - dt`.
pub struct FdmSchemeEvolver<'a> {
    op: &'a mut dyn FdmLinearOp,
    stepping: Stepping,
    dt: Time,
}

impl fmt::Debug for FdmSchemeEvolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FdmSchemeEvolver")
            .field("stepping", &self.stepping)
            .field("dt", &self.dt)
            .finish()
    }
}

impl<'a> FdmSchemeEvolver<'a> {
    /// The scheme described by `desc` on `op`.
    pub fn new(op: &'a mut dyn FdmLinearOp, desc: FdmSchemeDesc) -> Self {
        let stepping = match desc.scheme_type {
            FdmSchemeType::Douglas => Stepping::Douglas(desc.theta),
            FdmSchemeType::CrankNicolson => Stepping::CrankNicolson(desc.theta),
            FdmSchemeType::ImplicitEuler => Stepping::Implicit,
            FdmSchemeType::ExplicitEuler => Stepping::Explicit,
        };
        Self {
            op,
            stepping,
            dt: 0.0,
        }
    }

    /// Fully implicit stepping on `op`.
    pub fn implicit(op: &'a mut dyn FdmLinearOp) -> Self {
        Self::new(op, FdmSchemeDesc::implicit_euler())
    }

    /// Set the step size.
    pub fn set_step(&mut self, dt: Time) {
        self.dt = dt;
    }

    /// Step `a` from `t` back to `t - dt`.
    pub fn step(&mut self, a: &mut Array, t: Time) -> Result<()> {
        match self.stepping {
            Stepping::Douglas(theta) => self.douglas_step(a, t, theta),
            Stepping::CrankNicolson(theta) => {
                if theta != 1.0 {
                    self.explicit_step(a, t, 1.0 - theta)?;
                }
                if theta != 0.0 {
                    self.implicit_step(a, t, theta)?;
                }
                Ok(())
            }
            Stepping::Implicit => self.implicit_step(a, t, 1.0),
            Stepping::Explicit => self.explicit_step(a, t, 1.0),
        }
    }

    fn set_time(&mut self, t: Time) -> Result<()> {
        ensure!(t - self.dt > -1e-8, "a step towards negative time given");
        self.op.set_time((t - self.dt).max(0.0), t)
    }

    fn douglas_step(&mut self, a: &mut Array, t: Time, theta: Real) -> Result<()> {
        self.set_time(t)?;
        let la = self.op.apply(a);
        let y = &*a + &(&la * ((1.0 - theta) * self.dt));
        *a = self.op.solve_splitting(&y, -theta * self.dt)?;
        Ok(())
    }

    fn explicit_step(&mut self, a: &mut Array, t: Time, theta: Real) -> Result<()> {
        self.set_time(t)?;
        let la = self.op.apply(a);
        *a = &*a + &(&la * (theta * self.dt));
        Ok(())
    }

    fn implicit_step(&mut self, a: &mut Array, t: Time, theta: Real) -> Result<()> {
        self.set_time(t)?;
        *a = self.op.solve_splitting(a, -theta * self.dt)?;
        Ok(())
    }
}

/// Roll `a` back from `from` to `to` in `steps` equal steps.
///
/// A step that crosses a stopping time is split so that the condition is
/// applied exactly at that time; the condition is also applied at the end
/// of every step, and at `from` when `from` is itself a stopping time.
pub fn rollback(
    evolver: &mut FdmSchemeEvolver<'_>,
    stopping_times: &[Time],
    a: &mut Array,
    from: Time,
    to: Time,
    steps: usize,
    condition: &dyn StepCondition,
) -> Result<()> {
    ensure!(
        from >= to,
        "trying to roll back from {from} to {to}"
    );
    ensure!(steps > 0, "at least one time step required");
    let dt = (from - to) / steps as Real;
    let mut t = from;
    evolver.set_step(dt);

    if stopping_times.last() == Some(&from) {
        condition.apply_to(a, from)?;
    }
    for _ in 0..steps {
        let mut now = t;
        let mut next = t - dt;
        if (to - next).abs() < Real::EPSILON.sqrt() {
            next = to;
        }
        let mut hit = false;
        for &stop in stopping_times.iter().rev() {
            if next <= stop && stop < now {
                hit = true;
                evolver.set_step(now - stop);
                evolver.step(a, now)?;
                condition.apply_to(a, stop)?;
                now = stop;
            }
        }
        if hit {
            if now > next {
                evolver.set_step(now - next);
                evolver.step(a, now)?;
                condition.apply_to(a, next)?;
            }
            evolver.set_step(dt);
        } else {
            evolver.step(a, now)?;
            condition.apply_to(a, next)?;
        }
        t -= dt;
    }
    Ok(())
}

/// Backward solver: optional implicit damping steps followed by the
/// chosen scheme.
pub struct FdmBackwardSolver<'a> {
    op: &'a mut dyn FdmLinearOp,
    stopping_times: &'a [Time],
    condition: &'a dyn StepCondition,
    scheme: FdmSchemeDesc,
}

impl fmt::Debug for FdmBackwardSolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FdmBackwardSolver")
            .field("stopping_times", &self.stopping_times)
            .field("scheme", &self.scheme)
            .finish()
    }
}

impl<'a> FdmBackwardSolver<'a> {
    /// Solver for `op` under `condition`, stopping at `stopping_times`.
    pub fn new(
        op: &'a mut dyn FdmLinearOp,
        stopping_times: &'a [Time],
        condition: &'a dyn StepCondition,
        scheme: FdmSchemeDesc,
    ) -> Self {
        Self {
            op,
            stopping_times,
            condition,
            scheme,
        }
    }

    /// Roll `rhs` back from `from` to `to`.
    ///
    /// The first `damping_steps` of `steps + damping_steps` equal
    /// sub-intervals use implicit Euler to smooth the payoff kink; the
    /// implicit scheme itself runs all steps in one pass.
    pub fn rollback(
        &mut self,
        rhs: &mut Array,
        from: Time,
        to: Time,
        steps: usize,
        damping_steps: usize,
    ) -> Result<()> {
        let delta_t = from - to;
        let all_steps = steps + damping_steps;
        ensure!(all_steps > 0, "at least one time step required");
        let damping_to = from - delta_t * damping_steps as Real / all_steps as Real;
        debug!(
            scheme = %self.scheme.scheme_type,
            steps,
            damping_steps,
            from,
            to,
            "finite-difference rollback"
        );

        if self.scheme.scheme_type == FdmSchemeType::ImplicitEuler {
            let mut evolver = FdmSchemeEvolver::implicit(&mut *self.op);
            return rollback(
                &mut evolver,
                self.stopping_times,
                rhs,
                from,
                to,
                all_steps,
                self.condition,
            );
        }

        if damping_steps > 0 {
            let mut damping = FdmSchemeEvolver::implicit(&mut *self.op);
            rollback(
                &mut damping,
                self.stopping_times,
                rhs,
                from,
                damping_to,
                damping_steps,
                self.condition,
            )?;
        }
        if steps > 0 {
            let mut evolver = FdmSchemeEvolver::new(&mut *self.op, self.scheme);
            rollback(
                &mut evolver,
                self.stopping_times,
                rhs,
                damping_to,
                to,
                steps,
                self.condition,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finite_differences::step_conditions::FdmSnapshotCondition;
    use approx::assert_abs_diff_eq;
    use std::cell::RefCell;

    /// `L = -r`: pure discounting.
    #[derive(Debug)]
    struct Discounting {
        rate: Real,
        size: usize,
        calls: usize,
    }

    impl FdmLinearOp for Discounting {
        fn size(&self) -> usize {
            self.size
        }

        fn set_time(&mut self, t1: Time, t2: Time) -> Result<()> {
            assert!(t1 <= t2);
            self.calls += 1;
            Ok(())
        }

        fn apply(&self, u: &Array) -> Array {
            u * -self.rate
        }

        fn solve_splitting(&self, r: &Array, a: Real) -> Result<Array> {
            Ok(r * (1.0 / (1.0 - a * self.rate)))
        }
    }

    #[derive(Debug, Default)]
    struct Recorder {
        times: RefCell<Vec<Time>>,
    }

    impl StepCondition for Recorder {
        fn apply_to(&self, _a: &mut Array, t: Time) -> Result<()> {
            self.times.borrow_mut().push(t);
            Ok(())
        }
    }

    fn discounting() -> Discounting {
        Discounting {
            rate: 0.1,
            size: 1,
            calls: 0,
        }
    }

    fn solve(scheme: FdmSchemeDesc, steps: usize, damping: usize) -> Real {
        let mut op = discounting();
        let condition = Recorder::default();
        let mut a = Array::from_vec(vec![1.0]);
        FdmBackwardSolver::new(&mut op, &[], &condition, scheme)
            .rollback(&mut a, 1.0, 0.0, steps, damping)
            .unwrap();
        a[0]
    }

    #[test]
    fn one_dimensional_schemes_discount_as_expected() {
        let h: Real = 0.1;
        let implicit = solve(FdmSchemeDesc::implicit_euler(), 10, 0);
        assert_abs_diff_eq!(implicit, (1.0 + 0.1 * h).powi(-10), epsilon = 1e-14);
        let explicit = solve(FdmSchemeDesc::explicit_euler(), 10, 0);
        assert_abs_diff_eq!(explicit, (1.0 - 0.1 * h).powi(10), epsilon = 1e-14);
        let theta_step = (1.0 - 0.05 * h) / (1.0 + 0.05 * h);
        let douglas = solve(FdmSchemeDesc::douglas(), 10, 0);
        assert_abs_diff_eq!(douglas, theta_step.powi(10), epsilon = 1e-14);
        let cn = solve(FdmSchemeDesc::crank_nicolson(), 10, 0);
        assert_abs_diff_eq!(cn, theta_step.powi(10), epsilon = 1e-14);
        assert_abs_diff_eq!(douglas, (-0.1_f64).exp(), epsilon = 1e-5);
    }

    #[test]
    fn damping_steps_run_implicitly_first() {
        // 2 damping + 8 scheme steps over [0, 1]: all of length 0.1.
        let value = solve(FdmSchemeDesc::douglas(), 8, 2);
        let theta_step: Real = (1.0 - 0.005) / (1.0 + 0.005);
        let expected = (1.0 + 0.01_f64).powi(-2) * theta_step.powi(8);
        assert_abs_diff_eq!(value, expected, epsilon = 1e-14);
        // The implicit scheme takes every step itself.
        let implicit = solve(FdmSchemeDesc::implicit_euler(), 8, 2);
        assert_abs_diff_eq!(implicit, (1.0 + 0.01_f64).powi(-10), epsilon = 1e-14);
    }

    #[test]
    fn stopping_times_split_steps() {
        let mut op = discounting();
        let condition = Recorder::default();
        let mut a = Array::from_vec(vec![1.0]);
        let stops = [0.25, 1.0];
        {
            let mut evolver = FdmSchemeEvolver::implicit(&mut op);
            rollback(&mut evolver, &stops, &mut a, 1.0, 0.0, 2, &condition).unwrap();
        }
        let times = condition.times.borrow().clone();
        assert_eq!(times, vec![1.0, 0.5, 0.25, 0.0]);
        // Three implicit steps: 0.5, 0.25 and 0.25.
        assert_eq!(op.calls, 3);
        let expected = 1.0 / ((1.0 + 0.05) * (1.0 + 0.025) * (1.0 + 0.025));
        assert_abs_diff_eq!(a[0], expected, epsilon = 1e-14);
    }

    #[test]
    fn snapshot_sees_the_stopping_time() {
        let mut op = discounting();
        let snapshot = FdmSnapshotCondition::new(0.01);
        let mut a = Array::from_vec(vec![1.0]);
        FdmBackwardSolver::new(&mut op, &[0.01], &snapshot, FdmSchemeDesc::douglas())
            .rollback(&mut a, 1.0, 0.0, 10, 0)
            .unwrap();
        let snap = snapshot.values().unwrap();
        assert!(snap[0] < a[0] * 1.002 && snap[0] > a[0]);
    }

    #[test]
    fn backward_rollback_is_required() {
        let mut op = discounting();
        let condition = Recorder::default();
        let mut a = Array::from_vec(vec![1.0]);
        let mut evolver = FdmSchemeEvolver::implicit(&mut op);
        assert!(rollback(&mut evolver, &[], &mut a, 0.0, 1.0, 5, &condition).is_err());
    }
}
