//! `TermStructure`: base trait for all term structures.
//!
//! Every term structure has a **reference date** (where time is zero), a
//! **day counter** converting dates into year fractions, and a **maximum
//! date** beyond which it may not be queried. Term structures are
//! observable: they notify their dependents whenever the market data they
//! are built on changes.

use ql_core::{ensure, errors::Result, Date, Observable, Time};
use ql_time::DayCounter;

/// Base trait for all term structures.
pub trait TermStructure: Observable + std::fmt::Debug {
    /// The date at which discount = 1.0 and from which time is measured.
    fn reference_date(&self) -> Date;

    /// The day counter used for date → time-fraction conversions.
    fn day_counter(&self) -> &dyn DayCounter;

    /// The latest date for which the curve can be used.
    fn max_date(&self) -> Date {
        Date::MAX
    }

    /// The latest time for which the curve can be used.
    fn max_time(&self) -> Time {
        self.time_from_reference(self.max_date())
    }

    /// Convert a date to a year fraction relative to the reference date.
    fn time_from_reference(&self, date: Date) -> Time {
        self.day_counter()
            .year_fraction(self.reference_date(), date)
    }

    /// Fail unless `t` lies in `[0, max_time]`.
    fn check_range(&self, t: Time) -> Result<()> {
        ensure!(t >= 0.0, "negative time ({t}) given");
        ensure!(
            t <= self.max_time(),
            "time ({t}) is past max curve time ({})",
            self.max_time()
        );
        Ok(())
    }
}
