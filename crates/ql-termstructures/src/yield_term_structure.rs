//! `YieldTermStructure`: interest-rate term structures.
//!
//! A yield curve provides three related quantities, all continuously
//! compounded:
//!
//! * **discount factor** `P(0,t)`
//! * **zero rate** `-ln P(0,t) / t`
//! * **forward rate** between two times, `ln(P(t1)/P(t2)) / (t2 - t1)`

use crate::term_structure::TermStructure;
use ql_core::{errors::Result, Date, DiscountFactor, Rate, Time};

/// Time step used to turn a zero-length interval into a finite one.
pub const DT: Time = 1.0e-4;

/// A yield (interest-rate) term structure.
///
/// Implementors provide [`discount_impl`](Self::discount_impl); the public
/// methods add range checking and derive rates from discount factors.
pub trait YieldTermStructure: TermStructure {
    /// Discount factor at time `t`, with `t` already range-checked.
    fn discount_impl(&self, t: Time) -> Result<DiscountFactor>;

    /// Discount factor at time `t`.
    fn discount(&self, t: Time) -> Result<DiscountFactor> {
        self.check_range(t)?;
        self.discount_impl(t)
    }

    /// Discount factor at `date`.
    fn discount_date(&self, date: Date) -> Result<DiscountFactor> {
        self.discount(self.time_from_reference(date))
    }

    /// Continuously-compounded zero rate for maturity `t`.
    ///
    /// At `t = 0` the rate over the first [`DT`] is returned.
    fn zero_rate(&self, t: Time) -> Result<Rate> {
        let t = if t == 0.0 { DT } else { t };
        let df = self.discount(t)?;
        Ok(-df.ln() / t)
    }

    /// Continuously-compounded forward rate between `t1` and `t2`.
    ///
    /// When `t2 == t1` the instantaneous forward around `t1` is returned.
    fn forward_rate(&self, t1: Time, t2: Time) -> Result<Rate> {
        ql_core::ensure!(t2 >= t1, "t2 ({t2}) < t1 ({t1})");
        let (t1, t2) = if t2 == t1 {
            ((t1 - DT / 2.0).max(0.0), t1 + DT / 2.0)
        } else {
            (t1, t2)
        };
        let df1 = self.discount(t1)?;
        let df2 = self.discount(t2)?;
        Ok((df1 / df2).ln() / (t2 - t1))
    }
}
