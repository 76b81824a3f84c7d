//! # ql-time
//!
//! Dates and day-count conventions. Dates are chrono's `NaiveDate`;
//! calendar arithmetic beyond day counting is left to chrono.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// `DayCounter` trait and built-in day-count conventions.
pub mod day_counter;

pub use day_counter::{Actual360, Actual365Fixed, DayCounter, Thirty360};
pub use ql_core::Date;
