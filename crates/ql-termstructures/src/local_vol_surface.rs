//! `LocalVolSurface`: Dupire local volatility surface.
//!
//! Computes local volatilities from an implied (Black) volatility surface
//! using Dupire's formula, with derivatives taken by finite differences on
//! the total implied variance.

use std::fmt;
use std::rc::Rc;

use crate::black_vol_term_structure::BlackVolTermStructure;
use crate::local_vol_term_structure::LocalVolTermStructure;
use crate::term_structure::TermStructure;
use crate::volatility_term_structure::VolatilityTermStructure;
use crate::yield_term_structure::YieldTermStructure;
use ql_core::{
    downgrade_observer, ensure_post, errors::Result, Date, Handle, Observable, ObservableImpl,
    Observer, Real, Time, Volatility,
};
use ql_quotes::Quote;
use ql_time::DayCounter;

/// A local volatility surface derived from a Black volatility surface via
/// Dupire's formula.
///
/// Given a Black volatility surface `σ_B(T, K)`, the local variance is:
///
/// $$\sigma^2_\text{loc}(T, K) = \frac{\frac{\partial w}{\partial T}}
///     {1 - \frac{y}{w}\frac{\partial w}{\partial y}
///       + \frac14\left(-\frac14 - \frac{1}{w} + \frac{y^2}{w^2}\right)
///              \left(\frac{\partial w}{\partial y}\right)^2
///       + \frac12 \frac{\partial^2 w}{\partial y^2}}$$
///
/// where `w = σ²·T` is the total implied variance and `y = ln(K/F)` is
/// the log-moneyness. The time derivative is taken along a constant
/// forward-moneyness line.
///
/// The surface observes all four of its inputs.
pub struct LocalVolSurface {
    reference_date: Date,
    day_counter: Box<dyn DayCounter>,
    black_ts: Handle<dyn BlackVolTermStructure>,
    risk_free_ts: Handle<dyn YieldTermStructure>,
    dividend_ts: Handle<dyn YieldTermStructure>,
    underlying: Handle<dyn Quote>,
    observable: ObservableImpl,
}

impl LocalVolSurface {
    /// Build the surface and register it with its inputs.
    ///
    /// The reference date is taken from the Black surface, which must
    /// therefore be linked.
    pub fn new(
        black_ts: Handle<dyn BlackVolTermStructure>,
        risk_free_ts: Handle<dyn YieldTermStructure>,
        dividend_ts: Handle<dyn YieldTermStructure>,
        underlying: Handle<dyn Quote>,
        day_counter: impl DayCounter + 'static,
    ) -> Result<Rc<Self>> {
        let reference_date = black_ts.current_link()?.reference_date();
        let surface = Rc::new(Self {
            reference_date,
            day_counter: Box::new(day_counter),
            black_ts,
            risk_free_ts,
            dividend_ts,
            underlying,
            observable: ObservableImpl::new(),
        });
        let me = downgrade_observer(&surface);
        surface.black_ts.register_observer(me.clone());
        surface.risk_free_ts.register_observer(me.clone());
        surface.dividend_ts.register_observer(me.clone());
        surface.underlying.register_observer(me);
        Ok(surface)
    }
}

impl fmt::Debug for LocalVolSurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalVolSurface")
            .field("reference_date", &self.reference_date)
            .field("black_ts", &self.black_ts)
            .field("underlying", &self.underlying)
            .finish()
    }
}

impl Observable for LocalVolSurface {
    fn observable(&self) -> &ObservableImpl {
        &self.observable
    }
}

impl Observer for LocalVolSurface {
    fn update(&self) -> Result<()> {
        self.observable.notify()
    }
}

impl TermStructure for LocalVolSurface {
    fn reference_date(&self) -> Date {
        self.reference_date
    }

    fn day_counter(&self) -> &dyn DayCounter {
        self.day_counter.as_ref()
    }

    fn max_date(&self) -> Date {
        self.black_ts
            .current_link()
            .map_or(Date::MAX, |ts| ts.max_date())
    }
}

impl VolatilityTermStructure for LocalVolSurface {
    fn min_strike(&self) -> Real {
        self.black_ts
            .current_link()
            .map_or(Real::MIN, |ts| ts.min_strike())
    }

    fn max_strike(&self) -> Real {
        self.black_ts
            .current_link()
            .map_or(Real::MAX, |ts| ts.max_strike())
    }
}

impl LocalVolTermStructure for LocalVolSurface {
    fn local_vol_impl(&self, t: Time, underlying_level: Real) -> Result<Volatility> {
        let black_ts = self.black_ts.current_link()?;
        let risk_free_ts = self.risk_free_ts.current_link()?;
        let dividend_ts = self.dividend_ts.current_link()?;

        let dr = risk_free_ts.discount(t)?;
        let dq = dividend_ts.discount(t)?;
        let forward_value = self.underlying.current_link()?.value()? * dq / dr;

        // strike derivatives
        let strike = underlying_level;
        let y = (strike / forward_value).ln();
        let dy = if y.abs() > 0.001 { y * 0.0001 } else { 0.000001 };
        let strike_p = strike * dy.exp();
        let strike_m = strike / dy.exp();
        let w = black_ts.black_variance(t, strike)?;
        let wp = black_ts.black_variance(t, strike_p)?;
        let wm = black_ts.black_variance(t, strike_m)?;
        let dwdy = (wp - wm) / (2.0 * dy);
        let d2wdy2 = (wp - 2.0 * w + wm) / (dy * dy);

        // time derivative
        let dwdt = if t == 0.0 {
            let dt = 0.0001;
            let drpt = risk_free_ts.discount(t + dt)?;
            let dqpt = dividend_ts.discount(t + dt)?;
            let strike_pt = strike * dr * dqpt / (drpt * dq);
            let wpt = black_ts.black_variance(t + dt, strike_pt)?;
            ensure_post!(
                wpt >= w,
                "decreasing variance at strike {strike} between time {t} and time {}",
                t + dt
            );
            (wpt - w) / dt
        } else {
            let dt = (t / 2.0).min(0.0001);
            let drpt = risk_free_ts.discount(t + dt)?;
            let drmt = risk_free_ts.discount(t - dt)?;
            let dqpt = dividend_ts.discount(t + dt)?;
            let dqmt = dividend_ts.discount(t - dt)?;
            let strike_pt = strike * dr * dqpt / (drpt * dq);
            let strike_mt = strike * dr * dqmt / (drmt * dq);
            let wpt = black_ts.black_variance(t + dt, strike_pt)?;
            let wmt = black_ts.black_variance(t - dt, strike_mt)?;
            ensure_post!(
                wpt >= w,
                "decreasing variance at strike {strike} between time {t} and time {}",
                t + dt
            );
            ensure_post!(
                w >= wmt,
                "decreasing variance at strike {strike} between time {} and time {t}",
                t - dt
            );
            (wpt - wmt) / (2.0 * dt)
        };

        let local_variance = if dwdy == 0.0 && d2wdy2 == 0.0 {
            dwdt
        } else {
            let den1 = 1.0 - y / w * dwdy;
            let den2 = 0.25 * (-0.25 - 1.0 / w + y * y / w / w) * dwdy * dwdy;
            let den3 = 0.5 * d2wdy2;
            let den = den1 + den2 + den3;
            ensure_post!(
                den >= 0.0,
                "denominator ({den}) of the Dupire formula is negative at strike {strike}, time {t}"
            );
            dwdt / den
        };
        ensure_post!(
            local_variance >= 0.0,
            "negative local vol^2 at strike {strike} and time {t}; the black vol surface is not \
             smooth enough"
        );
        Ok(local_variance.sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::black_vol_term_structure::BlackConstantVol;
    use crate::flat_forward::FlatForward;
    use approx::assert_abs_diff_eq;
    use ql_quotes::SimpleQuote;
    use ql_time::Actual365Fixed;

    /// Black surface with a linear skew in strike and a term structure in
    /// time, arbitrage-free around the money.
    #[derive(Debug)]
    struct SkewedVol {
        observable: ObservableImpl,
    }

    impl Observable for SkewedVol {
        fn observable(&self) -> &ObservableImpl {
            &self.observable
        }
    }

    impl TermStructure for SkewedVol {
        fn reference_date(&self) -> Date {
            ref_date()
        }
        fn day_counter(&self) -> &dyn DayCounter {
            &Actual365Fixed
        }
    }

    impl VolatilityTermStructure for SkewedVol {}

    impl BlackVolTermStructure for SkewedVol {
        fn black_vol_impl(&self, t: Time, strike: Real) -> Result<Volatility> {
            Ok(0.20 + 0.02 * t - 0.0005 * (strike - 100.0))
        }
    }

    fn ref_date() -> Date {
        Date::from_ymd_opt(2025, 1, 2).unwrap()
    }

    fn surface_over(black: Rc<dyn BlackVolTermStructure>) -> Rc<LocalVolSurface> {
        let rf: Rc<dyn YieldTermStructure> = FlatForward::with_rate(ref_date(), 0.05, Actual365Fixed);
        let dy: Rc<dyn YieldTermStructure> = FlatForward::with_rate(ref_date(), 0.02, Actual365Fixed);
        let spot: Rc<dyn Quote> = Rc::new(SimpleQuote::new(100.0));
        LocalVolSurface::new(
            Handle::new(black),
            Handle::new(rf),
            Handle::new(dy),
            Handle::new(spot),
            Actual365Fixed,
        )
        .unwrap()
    }

    #[test]
    fn flat_black_vol_gives_flat_local_vol() {
        let surface = surface_over(BlackConstantVol::with_volatility(
            ref_date(),
            0.20,
            Actual365Fixed,
        ));
        assert_abs_diff_eq!(surface.local_vol(1.0, 100.0).unwrap(), 0.20, epsilon = 1e-6);
        assert_abs_diff_eq!(surface.local_vol(2.0, 80.0).unwrap(), 0.20, epsilon = 1e-6);
        assert_abs_diff_eq!(surface.local_vol(0.0, 120.0).unwrap(), 0.20, epsilon = 1e-6);
    }

    #[test]
    fn term_structure_of_vol_raises_local_vol() {
        let surface = surface_over(Rc::new(SkewedVol {
            observable: ObservableImpl::new(),
        }));
        let t: Time = 1.0;
        // at the forward the skew terms vanish to first order:
        // σ_loc² ≈ d(σ² t)/dt = σ² + 2 σ t σ'
        let forward = 100.0 * (-0.02_f64 * t).exp() / (-0.05_f64 * t).exp();
        let sigma = 0.20 + 0.02 * t - 0.0005 * (forward - 100.0);
        let local = surface.local_vol(t, forward).unwrap();
        assert!(local > sigma);
        assert!(local < 0.30);
    }

    #[test]
    fn empty_black_handle_is_rejected() {
        let rf: Rc<dyn YieldTermStructure> = FlatForward::with_rate(ref_date(), 0.05, Actual365Fixed);
        let dy: Rc<dyn YieldTermStructure> = FlatForward::with_rate(ref_date(), 0.0, Actual365Fixed);
        let spot: Rc<dyn Quote> = Rc::new(SimpleQuote::new(100.0));
        let surface = LocalVolSurface::new(
            Handle::empty(),
            Handle::new(rf),
            Handle::new(dy),
            Handle::new(spot),
            Actual365Fixed,
        );
        assert!(surface.is_err());
    }

    #[test]
    fn spot_moves_are_forwarded() {
        use std::cell::Cell;
        struct Hits(Cell<u32>);
        impl Observer for Hits {
            fn update(&self) -> Result<()> {
                self.0.set(self.0.get() + 1);
                Ok(())
            }
        }

        let spot = Rc::new(SimpleQuote::new(100.0));
        let black: Rc<dyn BlackVolTermStructure> =
            BlackConstantVol::with_volatility(ref_date(), 0.2, Actual365Fixed);
        let rf: Rc<dyn YieldTermStructure> = FlatForward::with_rate(ref_date(), 0.05, Actual365Fixed);
        let surface = LocalVolSurface::new(
            Handle::new(black),
            Handle::new(rf.clone()),
            Handle::new(rf),
            Handle::new(spot.clone() as Rc<dyn Quote>),
            Actual365Fixed,
        )
        .unwrap();
        let hits = Rc::new(Hits(Cell::new(0)));
        surface.register_observer(downgrade_observer(&hits));
        spot.set_value(101.0).unwrap();
        assert_eq!(hits.0.get(), 1);
    }
}
