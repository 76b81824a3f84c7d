//! Conditions applied to the solution between time steps.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::Rc;

use ql_core::{ensure, errors::Result, Date, Real, Time};
use ql_instruments::{Dividend, Exercise, ExerciseType};
use ql_math::interpolations::{Interpolation1D, LinearInterpolation};
use ql_math::Array;
use ql_time::DayCounter;

use super::inner_value::FdmLogInnerValue;
use super::meshers::Fdm1dMesher;

/// A modification of the solution at time `t` during the rollback.
pub trait StepCondition: Debug {
    /// Apply the condition to the values `a` at time `t`.
    fn apply_to(&self, a: &mut Array, t: Time) -> Result<()>;
}

/// Early exercise at every time step.
#[derive(Debug)]
pub struct FdmAmericanStepCondition {
    calculator: Rc<FdmLogInnerValue>,
}

impl FdmAmericanStepCondition {
    /// Floor the values at the exercise value from `calculator`.
    pub fn new(calculator: Rc<FdmLogInnerValue>) -> Self {
        Self { calculator }
    }
}

impl StepCondition for FdmAmericanStepCondition {
    fn apply_to(&self, a: &mut Array, t: Time) -> Result<()> {
        for i in 0..a.size() {
            let inner = self.calculator.inner_value(i, t)?;
            if inner > a[i] {
                a[i] = inner;
            }
        }
        Ok(())
    }
}

/// Early exercise on a set of dates.
#[derive(Debug)]
pub struct FdmBermudanStepCondition {
    exercise_times: Vec<Time>,
    calculator: Rc<FdmLogInnerValue>,
}

impl FdmBermudanStepCondition {
    /// Exercise on `dates`, measured from `reference_date` with
    /// `day_counter`.
    pub fn new(
        dates: &[Date],
        reference_date: Date,
        day_counter: &dyn DayCounter,
        calculator: Rc<FdmLogInnerValue>,
    ) -> Self {
        let exercise_times = dates
            .iter()
            .map(|&d| day_counter.year_fraction(reference_date, d))
            .collect();
        Self {
            exercise_times,
            calculator,
        }
    }

    /// The exercise times.
    pub fn exercise_times(&self) -> &[Time] {
        &self.exercise_times
    }
}

impl StepCondition for FdmBermudanStepCondition {
    fn apply_to(&self, a: &mut Array, t: Time) -> Result<()> {
        if self.exercise_times.contains(&t) {
            for i in 0..a.size() {
                a[i] = a[i].max(self.calculator.inner_value(i, t)?);
            }
        }
        Ok(())
    }
}

/// Cash dividends as jumps of the log-spot grid.
///
/// On an ex-dividend time the value at spot `S` becomes the value at
/// `S - D`, linearly interpolated on the grid and floored at the lowest
/// grid node.
#[derive(Debug)]
pub struct FdmDividendHandler {
    dividend_times: Vec<Time>,
    dividends: Vec<Real>,
    x: Vec<Real>,
}

impl FdmDividendHandler {
    /// Handle `schedule` on `mesher`, with dividend times measured from
    /// `reference_date` with `day_counter`.
    pub fn new(
        schedule: &[Dividend],
        mesher: &Fdm1dMesher,
        reference_date: Date,
        day_counter: &dyn DayCounter,
    ) -> Self {
        Self {
            dividend_times: schedule
                .iter()
                .map(|d| day_counter.year_fraction(reference_date, d.date))
                .collect(),
            dividends: schedule.iter().map(|d| d.amount).collect(),
            x: mesher.locations().to_vec(),
        }
    }

    /// The ex-dividend times.
    pub fn dividend_times(&self) -> &[Time] {
        &self.dividend_times
    }
}

impl StepCondition for FdmDividendHandler {
    fn apply_to(&self, a: &mut Array, t: Time) -> Result<()> {
        let Some(k) = self.dividend_times.iter().position(|&dt| dt == t) else {
            return Ok(());
        };
        let dividend = self.dividends[k];
        let interpolation = LinearInterpolation::new(&self.x, a.as_slice())?;
        let lowest = self.x[0];
        for (i, &x) in self.x.iter().enumerate() {
            let shifted = lowest.max((x.exp() - dividend).ln());
            a[i] = interpolation.value(shifted);
        }
        Ok(())
    }
}

/// Records the solution when the rollback reaches a given time.
#[derive(Debug)]
pub struct FdmSnapshotCondition {
    t: Time,
    values: RefCell<Option<Array>>,
}

impl FdmSnapshotCondition {
    /// Snapshot at `t`.
    pub fn new(t: Time) -> Self {
        Self {
            t,
            values: RefCell::new(None),
        }
    }

    /// The snapshot time.
    pub fn time(&self) -> Time {
        self.t
    }

    /// The recorded values, if the rollback went through `t`.
    pub fn values(&self) -> Option<Array> {
        self.values.borrow().clone()
    }
}

impl StepCondition for FdmSnapshotCondition {
    fn apply_to(&self, a: &mut Array, t: Time) -> Result<()> {
        if t == self.t {
            *self.values.borrow_mut() = Some(a.clone());
        }
        Ok(())
    }
}

/// A set of conditions applied in order, with the union of their
/// stopping times.
#[derive(Debug, Clone, Default)]
pub struct FdmStepConditionComposite {
    stopping_times: Vec<Time>,
    conditions: Vec<Rc<dyn StepCondition>>,
}

impl FdmStepConditionComposite {
    /// Combine `conditions`; the stopping times are merged, sorted and
    /// de-duplicated.
    pub fn new(stopping_times: Vec<Vec<Time>>, conditions: Vec<Rc<dyn StepCondition>>) -> Self {
        let mut all: Vec<Time> = stopping_times.into_iter().flatten().collect();
        all.sort_by(|a, b| a.total_cmp(b));
        all.dedup();
        Self {
            stopping_times: all,
            conditions,
        }
    }

    /// The conditions of a vanilla option: dividend jumps, then American
    /// or Bermudan exercise.
    pub fn vanilla_composite(
        dividends: &[Dividend],
        exercise: &Exercise,
        mesher: &Fdm1dMesher,
        calculator: Rc<FdmLogInnerValue>,
        reference_date: Date,
        day_counter: &dyn DayCounter,
    ) -> Result<Self> {
        let mut stopping_times = Vec::new();
        let mut conditions: Vec<Rc<dyn StepCondition>> = Vec::new();

        if !dividends.is_empty() {
            let handler = FdmDividendHandler::new(dividends, mesher, reference_date, day_counter);
            stopping_times.push(handler.dividend_times().to_vec());
            conditions.push(Rc::new(handler));
        }

        match exercise.exercise_type() {
            ExerciseType::European => {}
            ExerciseType::American => {
                conditions.push(Rc::new(FdmAmericanStepCondition::new(calculator)));
            }
            ExerciseType::Bermudan => {
                let bermudan = FdmBermudanStepCondition::new(
                    exercise.dates(),
                    reference_date,
                    day_counter,
                    calculator,
                );
                stopping_times.push(bermudan.exercise_times().to_vec());
                conditions.push(Rc::new(bermudan));
            }
        }
        ensure!(
            conditions.len() <= 2,
            "unexpected number of step conditions ({})",
            conditions.len()
        );
        Ok(Self::new(stopping_times, conditions))
    }

    /// `conditions` followed by `snapshot`, with the snapshot time added to
    /// the stopping times.
    pub fn join_conditions(snapshot: Rc<FdmSnapshotCondition>, conditions: &Self) -> Self {
        let mut all = conditions.conditions.clone();
        let t = snapshot.time();
        all.push(snapshot);
        Self::new(vec![conditions.stopping_times.clone(), vec![t]], all)
    }

    /// Sorted times at which the rollback must stop.
    pub fn stopping_times(&self) -> &[Time] {
        &self.stopping_times
    }

    /// The conditions, in application order.
    pub fn conditions(&self) -> &[Rc<dyn StepCondition>] {
        &self.conditions
    }
}

impl StepCondition for FdmStepConditionComposite {
    fn apply_to(&self, a: &mut Array, t: Time) -> Result<()> {
        for condition in &self.conditions {
            condition.apply_to(a, t)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finite_differences::meshers::Uniform1dMesher;
    use approx::assert_abs_diff_eq;
    use ql_instruments::{OptionType, Payoff};
    use ql_time::Actual365Fixed;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    fn put_calculator(mesher: &Fdm1dMesher) -> Rc<FdmLogInnerValue> {
        let payoff = Payoff::plain_vanilla(OptionType::Put, 100.0);
        Rc::new(FdmLogInnerValue::new(payoff, mesher.clone()).unwrap())
    }

    #[test]
    fn american_condition_floors_at_intrinsic() {
        let mesher = Uniform1dMesher::new(4.0, 5.0, 11).build().unwrap();
        let condition = FdmAmericanStepCondition::new(put_calculator(&mesher));
        let mut a = Array::zeros(11);
        condition.apply_to(&mut a, 0.5).unwrap();
        assert_abs_diff_eq!(a[0], 100.0 - 4.0_f64.exp(), epsilon = 1e-12);
        assert_eq!(a[10], 0.0);
    }

    #[test]
    fn bermudan_condition_only_fires_on_exercise_times() {
        let mesher = Uniform1dMesher::new(4.0, 5.0, 11).build().unwrap();
        let today = d(2025, 1, 1);
        let condition = FdmBermudanStepCondition::new(
            &[d(2025, 7, 2)],
            today,
            &Actual365Fixed,
            put_calculator(&mesher),
        );
        let t = condition.exercise_times()[0];
        assert_abs_diff_eq!(t, 182.0 / 365.0, epsilon = 1e-15);
        let mut a = Array::zeros(11);
        condition.apply_to(&mut a, 0.25).unwrap();
        assert_eq!(a[0], 0.0);
        condition.apply_to(&mut a, t).unwrap();
        assert!(a[0] > 40.0);
    }

    #[test]
    fn dividend_shifts_values_down_the_grid() {
        let mesher = Uniform1dMesher::new(3.0, 6.0, 301).build().unwrap();
        let today = d(2025, 1, 1);
        let handler = FdmDividendHandler::new(
            &[Dividend::new(d(2025, 7, 2), 5.0)],
            &mesher,
            today,
            &Actual365Fixed,
        );
        let t = handler.dividend_times()[0];
        let mut a = Array::from_vec(mesher.locations().iter().map(|x| x.exp()).collect());
        let before = a.clone();
        handler.apply_to(&mut a, t + 0.01).unwrap();
        assert_eq!(a, before);
        handler.apply_to(&mut a, t).unwrap();
        let i = 150;
        let s = mesher.location(i).exp();
        assert_abs_diff_eq!(a[i], s - 5.0, epsilon = 2e-3);
        // Below the dividend amount the floor at the lowest node applies.
        assert_abs_diff_eq!(a[0], 3.0_f64.exp(), epsilon = 1e-12);
    }

    #[test]
    fn snapshot_records_values() {
        let snapshot = FdmSnapshotCondition::new(0.1);
        let mut a = Array::from_vec(vec![1.0, 2.0]);
        snapshot.apply_to(&mut a, 0.2).unwrap();
        assert!(snapshot.values().is_none());
        snapshot.apply_to(&mut a, 0.1).unwrap();
        assert_eq!(snapshot.values(), Some(a));
    }

    #[test]
    fn vanilla_composite_collects_stopping_times() {
        let mesher = Uniform1dMesher::new(4.0, 5.0, 11).build().unwrap();
        let today = d(2025, 1, 1);
        let exercise = Exercise::bermudan(vec![d(2025, 7, 2), d(2026, 1, 1)], false).unwrap();
        let composite = FdmStepConditionComposite::vanilla_composite(
            &[Dividend::new(d(2025, 4, 2), 1.0)],
            &exercise,
            &mesher,
            put_calculator(&mesher),
            today,
            &Actual365Fixed,
        )
        .unwrap();
        assert_eq!(composite.conditions().len(), 2);
        assert_eq!(
            composite.stopping_times(),
            &[91.0 / 365.0, 182.0 / 365.0, 1.0]
        );

        let snapshot = Rc::new(FdmSnapshotCondition::new(0.001));
        let joined = FdmStepConditionComposite::join_conditions(snapshot, &composite);
        assert_eq!(joined.conditions().len(), 3);
        assert_eq!(joined.stopping_times()[0], 0.001);

        let european = FdmStepConditionComposite::vanilla_composite(
            &[],
            &Exercise::european(d(2026, 1, 1)),
            &mesher,
            put_calculator(&mesher),
            today,
            &Actual365Fixed,
        )
        .unwrap();
        assert!(european.stopping_times().is_empty());
        assert!(european.conditions().is_empty());
    }
}
