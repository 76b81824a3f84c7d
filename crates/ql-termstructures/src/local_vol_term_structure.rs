//! `LocalVolTermStructure`: local-volatility term structures.
//!
//! Provides the `LocalVolTermStructure` trait, `LocalConstantVol` and
//! `LocalVolCurve`.

use std::fmt;
use std::rc::Rc;

use crate::black_vol_term_structure::BlackVolTermStructure;
use crate::term_structure::TermStructure;
use crate::volatility_term_structure::VolatilityTermStructure;
use ql_core::{
    downgrade_observer, errors::Result, Date, Handle, Observable, ObservableImpl, Observer, Real,
    Time, Volatility,
};
use ql_quotes::{Quote, SimpleQuote};
use ql_time::DayCounter;

/// A local-volatility term structure: `σ_local(t, S)`.
pub trait LocalVolTermStructure: VolatilityTermStructure {
    /// Local volatility for time `t` and underlying level `underlying`,
    /// already range-checked.
    fn local_vol_impl(&self, t: Time, underlying: Real) -> Result<Volatility>;

    /// Local volatility for a time and underlying level.
    fn local_vol(&self, t: Time, underlying: Real) -> Result<Volatility> {
        self.check_strike_range(t, underlying)?;
        self.local_vol_impl(t, underlying)
    }

    /// Local volatility for a date and underlying level.
    fn local_vol_date(&self, date: Date, underlying: Real) -> Result<Volatility> {
        self.local_vol(self.time_from_reference(date), underlying)
    }
}

// ── LocalConstantVol ──────────────────────────────────────────────────────────

/// A constant local volatility surface.
pub struct LocalConstantVol {
    reference_date: Date,
    volatility: Handle<dyn Quote>,
    day_counter: Box<dyn DayCounter>,
    observable: ObservableImpl,
}

impl LocalConstantVol {
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
}

impl fmt::Debug for LocalConstantVol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalConstantVol")
            .field("reference_date", &self.reference_date)
            .field("volatility", &self.volatility)
            .finish()
    }
}

impl Observable for LocalConstantVol {
    fn observable(&self) -> &ObservableImpl {
        &self.observable
    }
}

impl Observer for LocalConstantVol {
    fn update(&self) -> Result<()> {
        self.observable.notify()
    }
}

impl TermStructure for LocalConstantVol {
    fn reference_date(&self) -> Date {
        self.reference_date
    }

    fn day_counter(&self) -> &dyn DayCounter {
        self.day_counter.as_ref()
    }
}

impl VolatilityTermStructure for LocalConstantVol {}

impl LocalVolTermStructure for LocalConstantVol {
    fn local_vol_impl(&self, _t: Time, _underlying: Real) -> Result<Volatility> {
        self.volatility.current_link()?.value()
    }
}

// ── LocalVolCurve ─────────────────────────────────────────────────────────────

/// Local volatility implied by a strike-independent Black surface.
///
/// With no smile, the local variance is the time derivative of the Black
/// total variance, taken here over one day.
pub struct LocalVolCurve {
    reference_date: Date,
    day_counter: Box<dyn DayCounter>,
    black_curve: Handle<dyn BlackVolTermStructure>,
    observable: ObservableImpl,
}

impl LocalVolCurve {
    /// Wrap `black_curve`, which must be linked.
    pub fn new(black_curve: Handle<dyn BlackVolTermStructure>) -> Result<Rc<Self>> {
        let curve = black_curve.current_link()?;
        let local = Rc::new(Self {
            reference_date: curve.reference_date(),
            day_counter: curve.day_counter().clone_box(),
            black_curve,
            observable: ObservableImpl::new(),
        });
        local
            .black_curve
            .register_observer(downgrade_observer(&local));
        Ok(local)
    }
}

impl fmt::Debug for LocalVolCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalVolCurve")
            .field("reference_date", &self.reference_date)
            .field("black_curve", &self.black_curve)
            .finish()
    }
}

impl Observable for LocalVolCurve {
    fn observable(&self) -> &ObservableImpl {
        &self.observable
    }
}

impl Observer for LocalVolCurve {
    fn update(&self) -> Result<()> {
        self.observable.notify()
    }
}

impl TermStructure for LocalVolCurve {
    fn reference_date(&self) -> Date {
        self.reference_date
    }

    fn day_counter(&self) -> &dyn DayCounter {
        self.day_counter.as_ref()
    }
}

impl VolatilityTermStructure for LocalVolCurve {}

impl LocalVolTermStructure for LocalVolCurve {
    fn local_vol_impl(&self, t: Time, underlying: Real) -> Result<Volatility> {
        let dt = 1.0 / 365.0;
        let curve = self.black_curve.current_link()?;
        let var1 = curve.black_variance(t, underlying)?;
        let var2 = curve.black_variance(t + dt, underlying)?;
        Ok(((var2 - var1) / dt).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ql_time::Actual365Fixed;

    fn ref_date() -> Date {
        Date::from_ymd_opt(2025, 1, 2).unwrap()
    }

    #[test]
    fn local_constant_vol_value() {
        let surface = LocalConstantVol::with_volatility(ref_date(), 0.30, Actual365Fixed);
        assert_abs_diff_eq!(surface.local_vol(1.0, 100.0).unwrap(), 0.30, epsilon = 1e-15);
        assert_abs_diff_eq!(surface.local_vol(5.0, 50.0).unwrap(), 0.30, epsilon = 1e-15);
    }

    #[test]
    fn local_constant_vol_at_date() {
        let surface = LocalConstantVol::with_volatility(ref_date(), 0.25, Actual365Fixed);
        let d1 = Date::from_ymd_opt(2026, 1, 2).unwrap();
        assert_abs_diff_eq!(surface.local_vol_date(d1, 105.0).unwrap(), 0.25, epsilon = 1e-15);
    }

    #[test]
    fn unbounded_strike_range() {
        let surface = LocalConstantVol::with_volatility(ref_date(), 0.20, Actual365Fixed);
        assert!(surface.min_strike() < 0.0);
        assert!(surface.max_strike() > 1e10);
        assert!(surface.local_vol(-1.0, 100.0).is_err());
    }

    #[test]
    fn local_vol_curve_of_flat_black_vol() {
        use crate::black_vol_term_structure::BlackConstantVol;
        let black: Rc<dyn BlackVolTermStructure> =
            BlackConstantVol::with_volatility(ref_date(), 0.35, Actual365Fixed);
        let curve = LocalVolCurve::new(Handle::new(black)).unwrap();
        assert_eq!(curve.reference_date(), ref_date());
        assert_abs_diff_eq!(curve.local_vol(2.0, 80.0).unwrap(), 0.35, epsilon = 1e-12);
        assert!(LocalVolCurve::new(Handle::empty()).is_err());
    }
}
