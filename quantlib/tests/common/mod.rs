//! Shared market setup for the integration tests.

#![allow(dead_code)]

use std::rc::Rc;

use quantlib::core::{Date, Handle, Real, Settings};
use quantlib::instruments::{Exercise, Instrument, Payoff, VanillaOption, VanillaOptionEngine};
use quantlib::processes::GeneralizedBlackScholesProcess;
use quantlib::quotes::{Quote, SimpleQuote};
use quantlib::termstructures::{
    BlackConstantVol, BlackVolTermStructure, FlatForward, YieldTermStructure,
};
use quantlib::time::DayCounter;

pub fn date(y: i32, m: u32, d: u32) -> Date {
    Date::from_ymd_opt(y, m, d).unwrap()
}

/// A flat market driven by mutable quotes.
pub struct FlatMarket {
    pub today: Date,
    pub settings: Rc<Settings>,
    pub spot: Rc<SimpleQuote>,
    pub dividend_yield: Rc<SimpleQuote>,
    pub risk_free_rate: Rc<SimpleQuote>,
    pub volatility: Rc<SimpleQuote>,
    pub process: Rc<GeneralizedBlackScholesProcess>,
}

impl FlatMarket {
    pub fn new<D>(today: Date, spot: Real, q: Real, r: Real, vol: Real, day_counter: D) -> Self
    where
        D: DayCounter + Clone + 'static,
    {
        let settings = Settings::with_evaluation_date(today);
        let spot = Rc::new(SimpleQuote::new(spot));
        let dividend_yield = Rc::new(SimpleQuote::new(q));
        let risk_free_rate = Rc::new(SimpleQuote::new(r));
        let volatility = Rc::new(SimpleQuote::new(vol));

        let q_ts: Rc<dyn YieldTermStructure> =
            FlatForward::new(today, handle(&dividend_yield), day_counter.clone());
        let r_ts: Rc<dyn YieldTermStructure> =
            FlatForward::new(today, handle(&risk_free_rate), day_counter.clone());
        let vol_ts: Rc<dyn BlackVolTermStructure> =
            BlackConstantVol::new(today, handle(&volatility), day_counter);
        let process = GeneralizedBlackScholesProcess::new(
            handle(&spot),
            Handle::new(q_ts),
            Handle::new(r_ts),
            Handle::new(vol_ts),
        );
        Self {
            today,
            settings,
            spot,
            dividend_yield,
            risk_free_rate,
            volatility,
            process,
        }
    }

    /// An option priced by `engine`.
    pub fn option(
        &self,
        payoff: Payoff,
        exercise: Exercise,
        engine: Rc<VanillaOptionEngine>,
    ) -> Rc<VanillaOption> {
        let option = VanillaOption::new(payoff, exercise, &self.settings);
        option.set_pricing_engine(engine).unwrap();
        option
    }
}

pub fn handle(quote: &Rc<SimpleQuote>) -> Handle<dyn Quote> {
    Handle::new(quote.clone() as Rc<dyn Quote>)
}
