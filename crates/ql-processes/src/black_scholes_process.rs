//! Generalized Black-Scholes process.
//!
//! `d ln S = (r(t) − q(t) − σ(t, S)²/2) dt + σ(t, S) dW`
//!
//! where `r` is the risk-free rate, `q` the continuous dividend yield and
//! `σ` the local volatility. The state variable is the spot price; drift
//! and diffusion refer to its logarithm, and [`apply`] exponentiates the
//! increment.
//!
//! Constructors:
//! * [`GeneralizedBlackScholesProcess::new`] with all three curves
//! * [`black_scholes_process`] with no dividends
//! * [`black_scholes_merton_process`] with a dividend yield curve
//!
//! [`apply`]: StochasticProcess1D::apply

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::euler_discretization::{Discretization1D, EulerDiscretization};
use crate::stochastic_process::StochasticProcess1D;
use ql_core::{
    downgrade_observer, errors::Result, fail, Date, Handle, Observable, ObservableImpl, Observer,
    Real, Time,
};
use ql_quotes::Quote;
use ql_termstructures::{
    BlackVolTermStructure, FlatForward, LocalConstantVol, LocalVolCurve, LocalVolSurface,
    LocalVolTermStructure, TermStructure, YieldTermStructure,
};
use ql_time::DayCounter;

/// Strike at which a strike-independent Black surface is sampled.
const ANY_STRIKE: Real = 0.01;

/// Forward-rate horizon used for the instantaneous drift.
const DRIFT_HORIZON: Time = 0.0001;

/// A generalized Black-Scholes stochastic process.
///
/// The local volatility is derived lazily from the Black surface (constant,
/// strike-independent, or a full Dupire surface) and rebuilt after any of
/// the observed inputs changes, unless an explicit local volatility was
/// supplied. When the Black surface is strike-independent the moments and
/// [`evolve`](StochasticProcess1D::evolve) are exact; otherwise they come
/// from the discretization.
pub struct GeneralizedBlackScholesProcess {
    x0: Handle<dyn Quote>,
    risk_free_rate: Handle<dyn YieldTermStructure>,
    dividend_yield: Handle<dyn YieldTermStructure>,
    black_volatility: Handle<dyn BlackVolTermStructure>,
    external_local_vol: Option<Handle<dyn LocalVolTermStructure>>,
    local_volatility: RefCell<Option<Rc<dyn LocalVolTermStructure>>>,
    discretization: Rc<dyn Discretization1D>,
    force_discretization: bool,
    updated: Cell<bool>,
    strike_independent: Cell<bool>,
    observable: ObservableImpl,
}

impl GeneralizedBlackScholesProcess {
    /// Create a process with the Euler discretization.
    pub fn new(
        x0: Handle<dyn Quote>,
        dividend_yield: Handle<dyn YieldTermStructure>,
        risk_free_rate: Handle<dyn YieldTermStructure>,
        black_volatility: Handle<dyn BlackVolTermStructure>,
    ) -> Rc<Self> {
        Self::with_discretization(
            x0,
            dividend_yield,
            risk_free_rate,
            black_volatility,
            Rc::new(EulerDiscretization),
            false,
        )
    }

    /// Create a process with an explicit discretization.
    ///
    /// With `force_discretization` the exact moments available for
    /// strike-independent volatilities are not used.
    pub fn with_discretization(
        x0: Handle<dyn Quote>,
        dividend_yield: Handle<dyn YieldTermStructure>,
        risk_free_rate: Handle<dyn YieldTermStructure>,
        black_volatility: Handle<dyn BlackVolTermStructure>,
        discretization: Rc<dyn Discretization1D>,
        force_discretization: bool,
    ) -> Rc<Self> {
        Self::build(
            x0,
            dividend_yield,
            risk_free_rate,
            black_volatility,
            None,
            discretization,
            force_discretization,
        )
    }

    /// Create a process whose diffusion uses `local_volatility` directly
    /// instead of deriving it from `black_volatility`.
    pub fn with_local_volatility(
        x0: Handle<dyn Quote>,
        dividend_yield: Handle<dyn YieldTermStructure>,
        risk_free_rate: Handle<dyn YieldTermStructure>,
        black_volatility: Handle<dyn BlackVolTermStructure>,
        local_volatility: Handle<dyn LocalVolTermStructure>,
    ) -> Rc<Self> {
        Self::build(
            x0,
            dividend_yield,
            risk_free_rate,
            black_volatility,
            Some(local_volatility),
            Rc::new(EulerDiscretization),
            false,
        )
    }

    fn build(
        x0: Handle<dyn Quote>,
        dividend_yield: Handle<dyn YieldTermStructure>,
        risk_free_rate: Handle<dyn YieldTermStructure>,
        black_volatility: Handle<dyn BlackVolTermStructure>,
        external_local_vol: Option<Handle<dyn LocalVolTermStructure>>,
        discretization: Rc<dyn Discretization1D>,
        force_discretization: bool,
    ) -> Rc<Self> {
        let process = Rc::new(Self {
            x0,
            risk_free_rate,
            dividend_yield,
            black_volatility,
            updated: Cell::new(external_local_vol.is_some()),
            external_local_vol,
            local_volatility: RefCell::new(None),
            discretization,
            force_discretization,
            strike_independent: Cell::new(false),
            observable: ObservableImpl::new(),
        });
        let me = downgrade_observer(&process);
        process.x0.register_observer(me.clone());
        process.risk_free_rate.register_observer(me.clone());
        process.dividend_yield.register_observer(me.clone());
        process.black_volatility.register_observer(me.clone());
        if let Some(local) = &process.external_local_vol {
            local.register_observer(me);
        }
        process
    }

    /// A process sharing this one's spot and curves but driven by
    /// `black_volatility`.
    ///
    /// The copy observes the same handles, so later market moves still
    /// reach it, while the original is unaffected by anything done to the
    /// new volatility.
    pub fn with_black_volatility(
        &self,
        black_volatility: Handle<dyn BlackVolTermStructure>,
    ) -> Rc<Self> {
        Self::with_discretization(
            self.x0.clone(),
            self.dividend_yield.clone(),
            self.risk_free_rate.clone(),
            black_volatility,
            Rc::clone(&self.discretization),
            self.force_discretization,
        )
    }

    /// The spot quote.
    pub fn state_variable(&self) -> &Handle<dyn Quote> {
        &self.x0
    }

    /// The dividend yield curve.
    pub fn dividend_yield(&self) -> &Handle<dyn YieldTermStructure> {
        &self.dividend_yield
    }

    /// The risk-free rate curve.
    pub fn risk_free_rate(&self) -> &Handle<dyn YieldTermStructure> {
        &self.risk_free_rate
    }

    /// The Black volatility surface.
    pub fn black_volatility(&self) -> &Handle<dyn BlackVolTermStructure> {
        &self.black_volatility
    }

    /// The local volatility used for the diffusion.
    ///
    /// Unless one was supplied at construction it is derived from the Black
    /// surface: a flat surface gives a constant local volatility, a
    /// strike-independent one a local volatility curve, anything else a
    /// Dupire surface.
    pub fn local_volatility(&self) -> Result<Rc<dyn LocalVolTermStructure>> {
        if let Some(local) = &self.external_local_vol {
            return local.current_link();
        }
        if !self.updated.get() {
            let black = self.black_volatility.current_link()?;
            let local: Rc<dyn LocalVolTermStructure> = if black.is_constant() {
                let vol = black.black_vol(0.0, self.x0()?)?;
                LocalConstantVol::with_volatility(
                    black.reference_date(),
                    vol,
                    black.day_counter().clone_box(),
                )
            } else if black.is_strike_independent() {
                LocalVolCurve::new(self.black_volatility.clone())?
            } else {
                LocalVolSurface::new(
                    self.black_volatility.clone(),
                    self.risk_free_rate.clone(),
                    self.dividend_yield.clone(),
                    self.x0.clone(),
                    black.day_counter().clone_box(),
                )?
            };
            self.strike_independent.set(black.is_strike_independent());
            *self.local_volatility.borrow_mut() = Some(local);
            self.updated.set(true);
            tracing::trace!(
                strike_independent = self.strike_independent.get(),
                "local volatility rebuilt"
            );
        }
        match self.local_volatility.borrow().as_ref() {
            Some(local) => Ok(Rc::clone(local)),
            None => fail!("local volatility not available"),
        }
    }

    fn uses_exact_moments(&self) -> Result<bool> {
        self.local_volatility()?;
        Ok(self.external_local_vol.is_none()
            && self.strike_independent.get()
            && !self.force_discretization)
    }

    fn forward_rate_spread(&self, t0: Time, t1: Time) -> Result<Real> {
        Ok(self.risk_free_rate.current_link()?.forward_rate(t0, t1)?
            - self.dividend_yield.current_link()?.forward_rate(t0, t1)?)
    }
}

impl fmt::Debug for GeneralizedBlackScholesProcess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeneralizedBlackScholesProcess")
            .field("x0", &self.x0)
            .field("risk_free_rate", &self.risk_free_rate)
            .field("dividend_yield", &self.dividend_yield)
            .field("black_volatility", &self.black_volatility)
            .field("force_discretization", &self.force_discretization)
            .finish()
    }
}

impl Observable for GeneralizedBlackScholesProcess {
    fn observable(&self) -> &ObservableImpl {
        &self.observable
    }
}

impl Observer for GeneralizedBlackScholesProcess {
    fn update(&self) -> Result<()> {
        if self.external_local_vol.is_none() {
            self.updated.set(false);
        }
        self.observable.notify()
    }
}

impl StochasticProcess1D for GeneralizedBlackScholesProcess {
    fn x0(&self) -> Result<Real> {
        self.x0.current_link()?.value()
    }

    fn drift(&self, t: Time, x: Real) -> Result<Real> {
        let sigma = self.diffusion(t, x)?;
        Ok(self.forward_rate_spread(t, t + DRIFT_HORIZON)? - 0.5 * sigma * sigma)
    }

    fn diffusion(&self, t: Time, x: Real) -> Result<Real> {
        self.local_volatility()?.local_vol(t, x)
    }

    fn expectation(&self, t0: Time, x0: Real, dt: Time) -> Result<Real> {
        if self.uses_exact_moments()? {
            Ok(x0 * (dt * self.forward_rate_spread(t0, t0 + dt)?).exp())
        } else {
            fail!("expectation not implemented for strike-dependent volatility")
        }
    }

    fn std_deviation(&self, t0: Time, x0: Real, dt: Time) -> Result<Real> {
        if self.uses_exact_moments()? {
            Ok(self.variance(t0, x0, dt)?.sqrt())
        } else {
            self.discretization.diffusion(self, t0, x0, dt)
        }
    }

    fn variance(&self, t0: Time, x0: Real, dt: Time) -> Result<Real> {
        if self.uses_exact_moments()? {
            let black = self.black_volatility.current_link()?;
            Ok(black.black_variance(t0 + dt, ANY_STRIKE)? - black.black_variance(t0, ANY_STRIKE)?)
        } else {
            self.discretization.variance(self, t0, x0, dt)
        }
    }

    fn evolve(&self, t0: Time, x0: Real, dt: Time, dw: Real) -> Result<Real> {
        if self.uses_exact_moments()? {
            let var = self.variance(t0, x0, dt)?;
            let drift = self.forward_rate_spread(t0, t0 + dt)? * dt - 0.5 * var;
            Ok(self.apply(x0, var.sqrt() * dw + drift))
        } else {
            let drift = self.discretization.drift(self, t0, x0, dt)?;
            Ok(self.apply(x0, drift + self.std_deviation(t0, x0, dt)? * dw))
        }
    }

    fn apply(&self, x0: Real, dx: Real) -> Real {
        x0 * dx.exp()
    }

    fn time(&self, date: Date) -> Result<Time> {
        Ok(self.risk_free_rate.current_link()?.time_from_reference(date))
    }
}

/// A Black-Scholes process with no dividends (`q = 0`).
///
/// The zero dividend curve shares the risk-free curve's reference date and
/// day counter.
pub fn black_scholes_process(
    x0: Handle<dyn Quote>,
    risk_free_rate: Handle<dyn YieldTermStructure>,
    black_volatility: Handle<dyn BlackVolTermStructure>,
) -> Result<Rc<GeneralizedBlackScholesProcess>> {
    let curve = risk_free_rate.current_link()?;
    let no_dividends: Rc<dyn YieldTermStructure> = FlatForward::with_rate(
        curve.reference_date(),
        0.0,
        curve.day_counter().clone_box(),
    );
    Ok(GeneralizedBlackScholesProcess::new(
        x0,
        Handle::new(no_dividends),
        risk_free_rate,
        black_volatility,
    ))
}

/// A Black-Scholes-Merton process with a continuous dividend yield.
pub fn black_scholes_merton_process(
    x0: Handle<dyn Quote>,
    dividend_yield: Handle<dyn YieldTermStructure>,
    risk_free_rate: Handle<dyn YieldTermStructure>,
    black_volatility: Handle<dyn BlackVolTermStructure>,
) -> Rc<GeneralizedBlackScholesProcess> {
    GeneralizedBlackScholesProcess::new(x0, dividend_yield, risk_free_rate, black_volatility)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ql_core::ObservableImpl;
    use ql_quotes::SimpleQuote;
    use ql_termstructures::{BlackConstantVol, VolatilityTermStructure};
    use ql_time::{Actual360, Actual365Fixed};

    fn ref_date() -> Date {
        Date::from_ymd_opt(2025, 1, 2).unwrap()
    }

    fn curve(rate: Real) -> Handle<dyn YieldTermStructure> {
        let curve: Rc<dyn YieldTermStructure> =
            FlatForward::with_rate(ref_date(), rate, Actual365Fixed);
        Handle::new(curve)
    }

    fn flat_vol(vol: Real) -> Handle<dyn BlackVolTermStructure> {
        let surface: Rc<dyn BlackVolTermStructure> =
            BlackConstantVol::with_volatility(ref_date(), vol, Actual365Fixed);
        Handle::new(surface)
    }

    fn bsm(spot: &Rc<SimpleQuote>) -> Rc<GeneralizedBlackScholesProcess> {
        black_scholes_merton_process(
            Handle::new(spot.clone() as Rc<dyn Quote>),
            curve(0.02),
            curve(0.05),
            flat_vol(0.20),
        )
    }

    /// Flat-in-strike, linear-in-time total variance `σ² t (1 + t)`.
    #[derive(Debug, Default)]
    struct GrowingVol {
        observable: ObservableImpl,
    }

    impl Observable for GrowingVol {
        fn observable(&self) -> &ObservableImpl {
            &self.observable
        }
    }

    impl TermStructure for GrowingVol {
        fn reference_date(&self) -> Date {
            ref_date()
        }
        fn day_counter(&self) -> &dyn DayCounter {
            &Actual365Fixed
        }
    }

    impl VolatilityTermStructure for GrowingVol {}

    impl BlackVolTermStructure for GrowingVol {
        fn is_strike_independent(&self) -> bool {
            true
        }
        fn black_variance_impl(&self, t: Time, _strike: Real) -> Result<Real> {
            Ok(0.04 * t * (1.0 + t))
        }
    }

    #[test]
    fn drift_and_diffusion_in_log_space() {
        let spot = Rc::new(SimpleQuote::new(100.0));
        let p = bsm(&spot);
        assert_abs_diff_eq!(p.x0().unwrap(), 100.0, epsilon = 1e-15);
        // r - q - σ²/2 = 0.05 - 0.02 - 0.02
        assert_abs_diff_eq!(p.drift(0.0, 100.0).unwrap(), 0.01, epsilon = 1e-9);
        assert_abs_diff_eq!(p.diffusion(0.5, 80.0).unwrap(), 0.20, epsilon = 1e-15);
        assert_abs_diff_eq!(p.apply(100.0, 0.1), 100.0 * 0.1_f64.exp(), epsilon = 1e-12);
    }

    #[test]
    fn exact_moments_for_flat_volatility() {
        let spot = Rc::new(SimpleQuote::new(100.0));
        let p = bsm(&spot);
        assert_abs_diff_eq!(
            p.expectation(0.0, 100.0, 1.0).unwrap(),
            100.0 * 0.03_f64.exp(),
            epsilon = 1e-10
        );
        assert_abs_diff_eq!(p.variance(0.0, 100.0, 0.5).unwrap(), 0.02, epsilon = 1e-15);
        assert_abs_diff_eq!(
            p.evolve(0.0, 100.0, 1.0, 0.0).unwrap(),
            100.0 * 0.01_f64.exp(),
            epsilon = 1e-10
        );
        assert_abs_diff_eq!(
            p.evolve(0.0, 100.0, 1.0, 1.0).unwrap(),
            100.0 * 0.21_f64.exp(),
            epsilon = 1e-10
        );
    }

    #[test]
    fn strike_independent_surface_uses_forward_variance() {
        let spot: Rc<dyn Quote> = Rc::new(SimpleQuote::new(50.0));
        let black: Rc<dyn BlackVolTermStructure> = Rc::new(GrowingVol::default());
        let p = GeneralizedBlackScholesProcess::new(
            Handle::new(spot),
            curve(0.0),
            curve(0.0),
            Handle::new(black),
        );
        // 0.04 * (2·3 - 1·2)
        assert_abs_diff_eq!(p.variance(1.0, 50.0, 1.0).unwrap(), 0.16, epsilon = 1e-14);
        // local variance d(σ²t(1+t))/dt = 0.04 (1 + 2t)
        assert_abs_diff_eq!(
            p.diffusion(1.0, 50.0).unwrap(),
            (0.04_f64 * 3.0).sqrt(),
            epsilon = 1e-3
        );
    }

    #[test]
    fn forced_discretization_uses_euler_moments() {
        let spot: Rc<dyn Quote> = Rc::new(SimpleQuote::new(100.0));
        let p = GeneralizedBlackScholesProcess::with_discretization(
            Handle::new(spot),
            curve(0.0),
            curve(0.05),
            flat_vol(0.3),
            Rc::new(EulerDiscretization),
            true,
        );
        assert_abs_diff_eq!(p.variance(0.0, 100.0, 0.25).unwrap(), 0.09 * 0.25, epsilon = 1e-15);
        assert!(p.expectation(0.0, 100.0, 0.25).is_err());
        let drift: Real = (0.05 - 0.045) * 0.25;
        assert_abs_diff_eq!(
            p.evolve(0.0, 100.0, 0.25, 0.0).unwrap(),
            100.0 * drift.exp(),
            epsilon = 1e-8
        );
    }

    #[test]
    fn no_dividend_process_has_zero_yield() {
        let spot: Rc<dyn Quote> = Rc::new(SimpleQuote::new(100.0));
        let p = black_scholes_process(Handle::new(spot), curve(0.05), flat_vol(0.2)).unwrap();
        let q = p.dividend_yield().current_link().unwrap();
        assert_abs_diff_eq!(q.zero_rate(1.0).unwrap(), 0.0, epsilon = 1e-15);
        assert_eq!(q.reference_date(), ref_date());
    }

    #[test]
    fn time_uses_the_risk_free_day_counter() {
        let spot: Rc<dyn Quote> = Rc::new(SimpleQuote::new(100.0));
        let rf: Rc<dyn YieldTermStructure> = FlatForward::with_rate(ref_date(), 0.05, Actual360);
        let p = black_scholes_process(Handle::new(spot), Handle::new(rf), flat_vol(0.2)).unwrap();
        let d = Date::from_ymd_opt(2025, 7, 1).unwrap();
        assert_abs_diff_eq!(p.time(d).unwrap(), 180.0 / 360.0, epsilon = 1e-15);
    }

    #[test]
    fn volatility_changes_rebuild_the_local_volatility() {
        let spot: Rc<dyn Quote> = Rc::new(SimpleQuote::new(100.0));
        let vol = Rc::new(SimpleQuote::new(0.2));
        let black: Rc<dyn BlackVolTermStructure> = BlackConstantVol::new(
            ref_date(),
            Handle::new(vol.clone() as Rc<dyn Quote>),
            Actual365Fixed,
        );
        let p = black_scholes_process(Handle::new(spot), curve(0.05), Handle::new(black)).unwrap();
        assert_abs_diff_eq!(p.diffusion(1.0, 100.0).unwrap(), 0.2, epsilon = 1e-15);
        vol.set_value(0.35).unwrap();
        assert_abs_diff_eq!(p.diffusion(1.0, 100.0).unwrap(), 0.35, epsilon = 1e-15);
    }

    #[test]
    fn cloned_process_is_isolated_from_the_original() {
        let spot = Rc::new(SimpleQuote::new(100.0));
        let p = bsm(&spot);
        let bumped = p.with_black_volatility(flat_vol(0.4));
        assert_abs_diff_eq!(bumped.diffusion(1.0, 100.0).unwrap(), 0.4, epsilon = 1e-15);
        assert_abs_diff_eq!(p.diffusion(1.0, 100.0).unwrap(), 0.2, epsilon = 1e-15);

        spot.set_value(120.0).unwrap();
        assert_abs_diff_eq!(bumped.x0().unwrap(), 120.0, epsilon = 1e-15);
    }
}
