//! `BlackVolTermStructure`: Black-volatility term structures.
//!
//! Provides the `BlackVolTermStructure` trait and `BlackConstantVol`, a flat
//! surface driven by a volatility quote.

use std::fmt;
use std::rc::Rc;

use crate::term_structure::TermStructure;
use crate::volatility_term_structure::VolatilityTermStructure;
use ql_core::{
    downgrade_observer, ensure, errors::Result, Date, Handle, Observable, ObservableImpl, Observer,
    Real, Time, Volatility,
};
use ql_quotes::{Quote, SimpleQuote};
use ql_time::DayCounter;

/// A Black-volatility term structure `σ(t, K)`.
///
/// Implementors must provide **at least one** of
/// [`black_vol_impl`](Self::black_vol_impl) and
/// [`black_variance_impl`](Self::black_variance_impl); each defaults to the
/// other.
pub trait BlackVolTermStructure: VolatilityTermStructure {
    /// Whether the volatility is the same at every time and strike.
    fn is_constant(&self) -> bool {
        false
    }

    /// Whether the volatility is the same at every strike.
    fn is_strike_independent(&self) -> bool {
        self.is_constant()
    }

    /// Black volatility at `(t, strike)`, already range-checked.
    fn black_vol_impl(&self, t: Time, strike: Real) -> Result<Volatility> {
        let t = if t == 0.0 { 1.0e-5 } else { t };
        let variance = self.black_variance_impl(t, strike)?;
        Ok((variance / t).sqrt())
    }

    /// Black variance `σ²·t` at `(t, strike)`, already range-checked.
    fn black_variance_impl(&self, t: Time, strike: Real) -> Result<Real> {
        let vol = self.black_vol_impl(t, strike)?;
        Ok(vol * vol * t)
    }

    /// Black volatility for a time and strike.
    fn black_vol(&self, t: Time, strike: Real) -> Result<Volatility> {
        self.check_strike_range(t, strike)?;
        self.black_vol_impl(t, strike)
    }

    /// Black variance for a time and strike.
    fn black_variance(&self, t: Time, strike: Real) -> Result<Real> {
        self.check_strike_range(t, strike)?;
        self.black_variance_impl(t, strike)
    }

    /// Black volatility for a date and strike.
    fn black_vol_date(&self, date: Date, strike: Real) -> Result<Volatility> {
        self.black_vol(self.time_from_reference(date), strike)
    }

    /// Black variance for a date and strike.
    fn black_variance_date(&self, date: Date, strike: Real) -> Result<Real> {
        self.black_variance(self.time_from_reference(date), strike)
    }

    /// Forward variance between `t1` and `t2` at `strike`.
    fn black_forward_variance(&self, t1: Time, t2: Time, strike: Real) -> Result<Real> {
        ensure!(t2 >= t1, "t2 ({t2}) < t1 ({t1})");
        let v1 = self.black_variance(t1, strike)?;
        let v2 = self.black_variance(t2, strike)?;
        ensure!(
            v2 >= v1,
            "variances must be non-decreasing: {v1} at {t1}, {v2} at {t2}"
        );
        Ok(v2 - v1)
    }

    /// Forward volatility between `t1` and `t2` at `strike`.
    ///
    /// For `t1 == t2` the volatility over a short interval starting at `t1`
    /// is returned.
    fn black_forward_vol(&self, t1: Time, t2: Time, strike: Real) -> Result<Volatility> {
        ensure!(t2 >= t1, "t2 ({t2}) < t1 ({t1})");
        if t2 == t1 {
            let epsilon = 1.0e-5;
            let var = self.black_forward_variance(t1, t1 + epsilon, strike)?;
            return Ok((var / epsilon).sqrt());
        }
        let var = self.black_forward_variance(t1, t2, strike)?;
        Ok((var / (t2 - t1)).sqrt())
    }
}

// ── BlackConstantVol ──────────────────────────────────────────────────────────

/// A flat Black volatility surface: `σ(t, K) = σ` for every `t` and `K`.
pub struct BlackConstantVol {
    reference_date: Date,
    volatility: Handle<dyn Quote>,
    day_counter: Box<dyn DayCounter>,
    observable: ObservableImpl,
}

impl BlackConstantVol {
    /// Create a surface whose level follows `volatility`.
    pub fn new(
        reference_date: Date,
        volatility: Handle<dyn Quote>,
        day_counter: impl DayCounter + 'static,
    ) -> Rc<Self> {
        let surface = Rc::new(Self {
            reference_date,
            volatility,
            day_counter: Box::new(day_counter),
            observable: ObservableImpl::new(),
        });
        surface
            .volatility
            .register_observer(downgrade_observer(&surface));
        surface
    }

    /// Create a surface at a fixed volatility level.
    pub fn with_volatility(
        reference_date: Date,
        volatility: Volatility,
        day_counter: impl DayCounter + 'static,
    ) -> Rc<Self> {
        let quote: Rc<dyn Quote> = Rc::new(SimpleQuote::new(volatility));
        Self::new(reference_date, Handle::new(quote), day_counter)
    }

    /// The current volatility level.
    pub fn volatility(&self) -> Result<Volatility> {
        self.volatility.current_link()?.value()
    }
}

impl fmt::Debug for BlackConstantVol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlackConstantVol")
            .field("reference_date", &self.reference_date)
            .field("volatility", &self.volatility().ok())
            .finish()
    }
}

impl Observable for BlackConstantVol {
    fn observable(&self) -> &ObservableImpl {
        &self.observable
    }
}

impl Observer for BlackConstantVol {
    fn update(&self) -> Result<()> {
        self.observable.notify()
    }
}

impl TermStructure for BlackConstantVol {
    fn reference_date(&self) -> Date {
        self.reference_date
    }

    fn day_counter(&self) -> &dyn DayCounter {
        self.day_counter.as_ref()
    }
}

impl VolatilityTermStructure for BlackConstantVol {}

impl BlackVolTermStructure for BlackConstantVol {
    fn is_constant(&self) -> bool {
        true
    }

    fn black_vol_impl(&self, _t: Time, _strike: Real) -> Result<Volatility> {
        self.volatility()
    }
}
