//! Option exercise schedules.
//!
//! An `Exercise` defines *when* an option can be exercised.

use ql_core::{ensure, errors::Result, Date};
use std::fmt;

/// Type of exercise right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExerciseType {
    /// Can only be exercised at expiry.
    European,
    /// Can be exercised at any time between two dates.
    American,
    /// Can be exercised on specific dates.
    Bermudan,
}

/// Exercise specification for an option.
#[derive(Debug, Clone, PartialEq)]
pub struct Exercise {
    exercise_type: ExerciseType,
    /// - European: the expiry.
    /// - American: earliest and latest date.
    /// - Bermudan: the sorted exercise dates.
    dates: Vec<Date>,
    payoff_at_expiry: bool,
}

impl Exercise {
    /// A European exercise at `expiry`.
    pub fn european(expiry: Date) -> Self {
        Self {
            exercise_type: ExerciseType::European,
            dates: vec![expiry],
            payoff_at_expiry: false,
        }
    }

    /// An American exercise between `earliest` and `latest`.
    ///
    /// With `payoff_at_expiry` the exercise value is paid at `latest`
    /// rather than when exercised.
    pub fn american(earliest: Date, latest: Date, payoff_at_expiry: bool) -> Result<Self> {
        ensure!(
            earliest <= latest,
            "earliest > latest exercise date ({earliest} > {latest})"
        );
        Ok(Self {
            exercise_type: ExerciseType::American,
            dates: vec![earliest, latest],
            payoff_at_expiry,
        })
    }

    /// An American exercise that can start immediately.
    pub fn american_until(latest: Date, payoff_at_expiry: bool) -> Self {
        Self {
            exercise_type: ExerciseType::American,
            dates: vec![Date::MIN, latest],
            payoff_at_expiry,
        }
    }

    /// A Bermudan exercise on `dates`, which are sorted and de-duplicated.
    pub fn bermudan(mut dates: Vec<Date>, payoff_at_expiry: bool) -> Result<Self> {
        ensure!(!dates.is_empty(), "no exercise date given");
        dates.sort();
        dates.dedup();
        Ok(Self {
            exercise_type: ExerciseType::Bermudan,
            dates,
            payoff_at_expiry,
        })
    }

    /// The last possible exercise date.
    pub fn last_date(&self) -> Date {
        self.dates[self.dates.len() - 1]
    }

    /// The `i`-th exercise date.
    pub fn date(&self, i: usize) -> Option<Date> {
        self.dates.get(i).copied()
    }

    /// All exercise dates.
    pub fn dates(&self) -> &[Date] {
        &self.dates
    }

    /// The type of exercise.
    pub fn exercise_type(&self) -> ExerciseType {
        self.exercise_type
    }

    /// Whether an early exercise pays at the last date.
    pub fn payoff_at_expiry(&self) -> bool {
        self.payoff_at_expiry
    }
}

impl fmt::Display for Exercise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exercise_type {
            ExerciseType::European => write!(f, "European({})", self.dates[0]),
            ExerciseType::American => {
                write!(f, "American({} to {})", self.dates[0], self.last_date())
            }
            ExerciseType::Bermudan => {
                write!(f, "Bermudan({} dates)", self.dates.len())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> Date {
        Date::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn european_exercise() {
        let expiry = d(2026, 6, 15);
        let ex = Exercise::european(expiry);
        assert_eq!(ex.exercise_type(), ExerciseType::European);
        assert_eq!(ex.last_date(), expiry);
        assert_eq!(ex.dates().len(), 1);
        assert!(!ex.payoff_at_expiry());
    }

    #[test]
    fn american_exercise() {
        let early = d(2025, 1, 1);
        let late = d(2026, 6, 15);
        let ex = Exercise::american(early, late, true).unwrap();
        assert_eq!(ex.exercise_type(), ExerciseType::American);
        assert_eq!(ex.date(0), Some(early));
        assert_eq!(ex.last_date(), late);
        assert!(ex.payoff_at_expiry());
        assert!(Exercise::american(late, early, false).is_err());
    }

    #[test]
    fn bermudan_dates_are_sorted() {
        let dates = vec![d(2026, 6, 15), d(2025, 6, 15), d(2025, 12, 15), d(2025, 6, 15)];
        let ex = Exercise::bermudan(dates, false).unwrap();
        assert_eq!(ex.exercise_type(), ExerciseType::Bermudan);
        assert_eq!(ex.dates(), &[d(2025, 6, 15), d(2025, 12, 15), d(2026, 6, 15)]);
        assert_eq!(ex.last_date(), d(2026, 6, 15));
        assert!(Exercise::bermudan(Vec::new(), false).is_err());
    }
}
