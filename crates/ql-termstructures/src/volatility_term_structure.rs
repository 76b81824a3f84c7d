//! `VolatilityTermStructure`: base trait for volatility term structures.
//!
//! Extends `TermStructure` with the strike range on which the surface is
//! defined.

use crate::term_structure::TermStructure;
use ql_core::{ensure, errors::Result, Real, Time};

/// Base trait for all volatility term structures.
pub trait VolatilityTermStructure: TermStructure {
    /// The minimum strike for which the term structure is defined.
    fn min_strike(&self) -> Real {
        Real::MIN
    }

    /// The maximum strike for which the term structure is defined.
    fn max_strike(&self) -> Real {
        Real::MAX
    }

    /// Fail unless `t` is in range and `strike` lies in
    /// `[min_strike, max_strike]`.
    fn check_strike_range(&self, t: Time, strike: Real) -> Result<()> {
        self.check_range(t)?;
        ensure!(
            strike >= self.min_strike() && strike <= self.max_strike(),
            "strike ({strike}) is outside the curve domain [{}, {}]",
            self.min_strike(),
            self.max_strike()
        );
        Ok(())
    }
}
