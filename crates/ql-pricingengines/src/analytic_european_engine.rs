//! Analytic engine for European options under Black-Scholes dynamics.

use std::rc::Rc;

use ql_core::{
    downgrade_observer, ensure, errors::Result, fail, Observable, ObservableImpl, Observer,
};
use ql_instruments::{
    ExerciseType, GenericEngine, OneAssetOptionArguments, OneAssetOptionResults, PricingEngine,
};
use ql_processes::GeneralizedBlackScholesProcess;
use ql_termstructures::{BlackVolTermStructure, TermStructure, YieldTermStructure};
use tracing::debug;

use crate::black_calculator::BlackCalculator;

/// Prices European options with the Black formula.
///
/// The forward is `S · D_q / D_r` and the variance is read from the Black
/// surface at the strike; every Greek comes from a [`BlackCalculator`].
/// Rho, dividend rho and vega use times measured with the day counter of
/// the curve they refer to. If theta cannot be computed it is left empty
/// rather than failing the whole calculation.
#[derive(Debug)]
pub struct AnalyticEuropeanEngine {
    process: Rc<GeneralizedBlackScholesProcess>,
    engine: GenericEngine<OneAssetOptionArguments, OneAssetOptionResults>,
}

impl AnalyticEuropeanEngine {
    /// An engine observing `process`.
    pub fn new(process: Rc<GeneralizedBlackScholesProcess>) -> Rc<Self> {
        let engine = Rc::new(Self {
            process,
            engine: GenericEngine::new(),
        });
        engine
            .process
            .register_observer(downgrade_observer(&engine));
        engine
    }

    /// The process the engine prices with.
    pub fn process(&self) -> &Rc<GeneralizedBlackScholesProcess> {
        &self.process
    }
}

impl Observable for AnalyticEuropeanEngine {
    fn observable(&self) -> &ObservableImpl {
        self.engine.observable()
    }
}

impl Observer for AnalyticEuropeanEngine {
    fn update(&self) -> Result<()> {
        self.notify_observers()
    }
}

impl PricingEngine for AnalyticEuropeanEngine {
    type Arguments = OneAssetOptionArguments;
    type Results = OneAssetOptionResults;

    fn generic_engine(&self) -> &GenericEngine<Self::Arguments, Self::Results> {
        &self.engine
    }

    fn calculate(&self) -> Result<()> {
        let (payoff, exercise) = {
            let arguments = self.arguments();
            (arguments.payoff.clone(), arguments.exercise.clone())
        };
        let (Some(payoff), Some(exercise)) = (payoff, exercise) else {
            fail!("incomplete option arguments");
        };
        ensure!(
            exercise.exercise_type() == ExerciseType::European,
            "not an European option"
        );
        ensure!(
            self.arguments().dividends.is_empty(),
            "discrete dividends not supported by the analytic European engine"
        );
        let (_, strike) = payoff.striked()?;
        let last_date = exercise.last_date();

        let r_ts = self.process.risk_free_rate().current_link()?;
        let q_ts = self.process.dividend_yield().current_link()?;
        let vol_ts = self.process.black_volatility().current_link()?;

        let variance = vol_ts.black_variance_date(last_date, strike)?;
        let dividend_discount = q_ts.discount_date(last_date)?;
        let risk_free_discount = r_ts.discount_date(last_date)?;
        let spot = self.process.state_variable().current_link()?.value()?;
        ensure!(spot > 0.0, "negative or null underlying given");
        let forward = spot * dividend_discount / risk_free_discount;

        let black = BlackCalculator::new(&payoff, forward, variance.sqrt(), risk_free_discount)?;

        let rho_time = r_ts
            .day_counter()
            .year_fraction(r_ts.reference_date(), last_date);
        let dividend_time = q_ts
            .day_counter()
            .year_fraction(q_ts.reference_date(), last_date);
        let vol_time = vol_ts
            .day_counter()
            .year_fraction(vol_ts.reference_date(), last_date);

        let theta = match (black.theta(spot, vol_time), black.theta_per_day(spot, vol_time)) {
            (Ok(theta), Ok(per_day)) => (Some(theta), Some(per_day)),
            (Err(err), _) | (_, Err(err)) => {
                debug!(%err, "theta not available");
                (None, None)
            }
        };

        let mut results = self.results_mut();
        results.instrument.value = Some(black.value());
        results.greeks.delta = Some(black.delta(spot)?);
        results.greeks.gamma = Some(black.gamma(spot)?);
        results.greeks.rho = Some(black.rho(rho_time)?);
        results.greeks.dividend_rho = Some(black.dividend_rho(dividend_time)?);
        results.greeks.vega = Some(black.vega(vol_time)?);
        results.greeks.theta = theta.0;
        results.more_greeks.theta_per_day = theta.1;
        results.more_greeks.delta_forward = Some(black.delta_forward());
        results.more_greeks.elasticity = Some(black.elasticity(spot)?);
        results.more_greeks.strike_sensitivity = Some(black.strike_sensitivity());
        results.more_greeks.itm_cash_probability = Some(black.itm_cash_probability());

        let tte = vol_ts.time_from_reference(last_date);
        let instrument = &mut results.instrument;
        instrument.set_result("spot", spot);
        instrument.set_result("dividendDiscount", dividend_discount);
        instrument.set_result("riskFreeDiscount", risk_free_discount);
        instrument.set_result("forward", forward);
        instrument.set_result("strike", strike);
        instrument.set_result("volatility", (variance / tte).sqrt());
        instrument.set_result("timeToExpiry", tte);
        Ok(())
    }
}
