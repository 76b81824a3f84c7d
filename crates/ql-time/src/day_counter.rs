//! `DayCounter` trait and built-in day-count conventions.
//!
//! A day counter computes the **day count fraction** (the fraction of a year
//! between two dates) used to turn dates into model times.

use chrono::Datelike;
use ql_core::{Date, Real, Time};

/// A convention for counting the fraction of a year between two dates.
pub trait DayCounter: std::fmt::Debug {
    /// Human-readable name of this convention (e.g. `"Actual/365 (Fixed)"`).
    fn name(&self) -> &str;

    /// Number of days between `d1` and `d2` according to this convention.
    fn day_count(&self, d1: Date, d2: Date) -> i64 {
        d2.signed_duration_since(d1).num_days()
    }

    /// Fraction of a year between `d1` and `d2`. Negative if `d2 < d1`.
    fn year_fraction(&self, d1: Date, d2: Date) -> Time;

    /// A boxed copy of this convention.
    fn clone_box(&self) -> Box<dyn DayCounter>;
}

impl Clone for Box<dyn DayCounter> {
    fn clone(&self) -> Self {
        self.as_ref().clone_box()
    }
}

impl DayCounter for Box<dyn DayCounter> {
    fn name(&self) -> &str {
        self.as_ref().name()
    }

    fn day_count(&self, d1: Date, d2: Date) -> i64 {
        self.as_ref().day_count(d1, d2)
    }

    fn year_fraction(&self, d1: Date, d2: Date) -> Time {
        self.as_ref().year_fraction(d1, d2)
    }

    fn clone_box(&self) -> Box<dyn DayCounter> {
        self.as_ref().clone_box()
    }
}

/// Actual/365 (Fixed) day counter.
///
/// `year_fraction = actual_days / 365`
#[derive(Debug, Clone, Copy, Default)]
pub struct Actual365Fixed;

impl DayCounter for Actual365Fixed {
    fn name(&self) -> &str {
        "Actual/365 (Fixed)"
    }

    fn year_fraction(&self, d1: Date, d2: Date) -> Time {
        self.day_count(d1, d2) as Real / 365.0
    }

    fn clone_box(&self) -> Box<dyn DayCounter> {
        Box::new(*self)
    }
}

/// Actual/360 day counter.
///
/// `year_fraction = actual_days / 360`
#[derive(Debug, Clone, Copy, Default)]
pub struct Actual360;

impl DayCounter for Actual360 {
    fn name(&self) -> &str {
        "Actual/360"
    }

    fn year_fraction(&self, d1: Date, d2: Date) -> Time {
        self.day_count(d1, d2) as Real / 360.0
    }

    fn clone_box(&self) -> Box<dyn DayCounter> {
        Box::new(*self)
    }
}

/// Thirty/360 day counter (Bond Basis).
///
/// `year_fraction = [360(Y2−Y1) + 30(M2−M1) + (D2−D1)] / 360`
#[derive(Debug, Clone, Copy, Default)]
pub struct Thirty360;

impl DayCounter for Thirty360 {
    fn name(&self) -> &str {
        "30/360"
    }

    fn day_count(&self, d1: Date, d2: Date) -> i64 {
        let (y1, m1) = (d1.year() as i64, d1.month() as i64);
        let (y2, m2) = (d2.year() as i64, d2.month() as i64);
        let dd1 = (d1.day() as i64).min(30);
        let mut dd2 = d2.day() as i64;
        if dd2 == 31 && dd1 == 30 {
            dd2 = 30;
        }
        360 * (y2 - y1) + 30 * (m2 - m1) + (dd2 - dd1)
    }

    fn year_fraction(&self, d1: Date, d2: Date) -> Time {
        self.day_count(d1, d2) as Real / 360.0
    }

    fn clone_box(&self) -> Box<dyn DayCounter> {
        Box::new(*self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn date(y: i32, m: u32, d: u32) -> Date {
        Date::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn actual365_fixed() {
        let dc = Actual365Fixed;
        let d1 = date(2023, 1, 1);
        let d2 = date(2024, 1, 1);
        assert_eq!(dc.day_count(d1, d2), 365);
        assert_abs_diff_eq!(dc.year_fraction(d1, d2), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(dc.year_fraction(d2, d1), -1.0, epsilon = 1e-12);
    }

    #[test]
    fn actual360() {
        let dc = Actual360;
        let d1 = date(2023, 1, 1);
        let d2 = date(2023, 7, 1);
        assert_eq!(dc.day_count(d1, d2), 181);
        assert_abs_diff_eq!(dc.year_fraction(d1, d2), 181.0 / 360.0, epsilon = 1e-12);
    }

    #[test]
    fn thirty360() {
        let dc = Thirty360;
        assert_eq!(dc.day_count(date(2023, 1, 1), date(2024, 1, 1)), 360);
        assert_eq!(dc.day_count(date(2023, 1, 31), date(2023, 2, 28)), 28);
        assert_eq!(dc.day_count(date(2023, 1, 15), date(2023, 3, 31)), 76);
        assert_abs_diff_eq!(
            dc.year_fraction(date(2023, 1, 1), date(2024, 1, 1)),
            1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn boxed_copies_keep_the_convention() {
        let dc: Box<dyn DayCounter> = Box::new(Actual360);
        let copy = dc.clone();
        assert_eq!(copy.name(), "Actual/360");
        assert_abs_diff_eq!(
            copy.year_fraction(date(2023, 1, 1), date(2023, 1, 31)),
            30.0 / 360.0,
            epsilon = 1e-15
        );
    }
}
