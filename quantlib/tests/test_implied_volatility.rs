//! Implied volatility: round trips through the analytic engine and
//! isolation of the caller's market.

mod common;

use approx::assert_abs_diff_eq;
use common::{date, FlatMarket};
use proptest::prelude::*;
use quantlib::core::LazyObject;
use quantlib::instruments::{Exercise, Instrument, OptionType, Payoff};
use quantlib::pricingengines::{AnalyticEuropeanEngine, ImpliedVolatility, ImpliedVolatilityOptions};
use quantlib::quotes::Quote;
use quantlib::time::Actual365Fixed;

fn tight() -> ImpliedVolatilityOptions {
    ImpliedVolatilityOptions {
        accuracy: 1e-12,
        max_evaluations: 200,
        ..ImpliedVolatilityOptions::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_round_trip_through_the_analytic_engine(
        call in any::<bool>(),
        strike in 80.0..120.0_f64,
        vol in 0.10..0.80_f64,
        r in 0.0..0.08_f64,
    ) {
        let market = FlatMarket::new(date(2025, 1, 2), 100.0, 0.01, r, vol, Actual365Fixed);
        let option_type = if call { OptionType::Call } else { OptionType::Put };
        let option = market.option(
            Payoff::plain_vanilla(option_type, strike),
            Exercise::european(date(2026, 1, 2)),
            AnalyticEuropeanEngine::new(market.process.clone()),
        );
        let price = option.npv().unwrap();

        let implied = option.implied_volatility_with(price, &market.process, &tight()).unwrap();
        prop_assert!((implied - vol).abs() < 1e-6, "implied {implied} vs {vol}");

        market.volatility.set_value(implied).unwrap();
        prop_assert!((option.npv().unwrap() - price).abs() < 1e-6);
    }
}

#[test]
fn test_search_does_not_touch_other_instruments() {
    let market = FlatMarket::new(date(2025, 1, 2), 100.0, 0.0, 0.03, 0.25, Actual365Fixed);
    let engine = AnalyticEuropeanEngine::new(market.process.clone());
    let first = market.option(
        Payoff::plain_vanilla(OptionType::Call, 100.0),
        Exercise::european(date(2026, 1, 2)),
        engine.clone(),
    );
    let second = market.option(
        Payoff::plain_vanilla(OptionType::Put, 95.0),
        Exercise::european(date(2025, 7, 2)),
        engine,
    );
    let first_price = first.npv().unwrap();
    let second_price = second.npv().unwrap();

    let implied = first
        .implied_volatility(first_price * 1.2, &market.process)
        .unwrap();
    assert!(implied > 0.25);
    assert!(second.is_calculated());
    assert_eq!(second.npv().unwrap(), second_price);
    assert_eq!(market.volatility.value().unwrap(), 0.25);

    // The shared spot still reaches both the market and the next search.
    market.spot.set_value(110.0).unwrap();
    assert!(!second.is_calculated());
    assert!(second.npv().unwrap() < second_price);
    let after_move = first
        .implied_volatility(first_price * 1.2, &market.process)
        .unwrap();
    assert!(after_move < implied);
}

#[test]
fn test_american_round_trip_on_the_grid() {
    let market = FlatMarket::new(date(2025, 1, 2), 100.0, 0.0, 0.05, 0.30, Actual365Fixed);
    let engine = quantlib::pricingengines::FdBlackScholesVanillaEngine::new(market.process.clone())
        .unwrap();
    let option = market.option(
        Payoff::plain_vanilla(OptionType::Put, 110.0),
        Exercise::american(date(2025, 1, 2), date(2025, 10, 2), false).unwrap(),
        engine,
    );
    let price = option.npv().unwrap();
    let implied = option.implied_volatility(price, &market.process).unwrap();
    assert_abs_diff_eq!(implied, 0.30, epsilon = 1e-3);
}
