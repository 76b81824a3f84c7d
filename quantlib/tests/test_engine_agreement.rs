//! The analytic, binomial and finite-difference engines price the same
//! options consistently.

mod common;

use std::rc::Rc;

use approx::assert_abs_diff_eq;
use common::{date, FlatMarket};
use quantlib::instruments::{
    Dividend, Exercise, Instrument, OptionType, Payoff, VanillaOption, VanillaOptionEngine,
};
use quantlib::methods::finite_differences::FdmSchemeDesc;
use quantlib::methods::lattice::TreeKind;
use quantlib::pricingengines::{
    AnalyticEuropeanEngine, BinomialVanillaEngine, CashDividendModel, FdBlackScholesVanillaEngine,
};
use quantlib::time::Actual365Fixed;

fn market() -> FlatMarket {
    FlatMarket::new(date(2025, 1, 2), 100.0, 0.02, 0.05, 0.20, Actual365Fixed)
}

fn fd_engine(market: &FlatMarket, scheme: FdmSchemeDesc) -> Rc<VanillaOptionEngine> {
    FdBlackScholesVanillaEngine::builder(market.process.clone())
        .t_grid(200)
        .x_grid(400)
        .scheme(scheme)
        .build()
        .unwrap()
}

#[test]
fn test_european_engines_agree() {
    let market = market();
    let expiry = Exercise::european(date(2026, 1, 2));

    for option_type in [OptionType::Call, OptionType::Put] {
        for strike in [90.0, 100.0, 110.0] {
            let payoff = Payoff::plain_vanilla(option_type, strike);
            let option = market.option(
                payoff,
                expiry.clone(),
                AnalyticEuropeanEngine::new(market.process.clone()),
            );
            let (value, delta, gamma) = (
                option.npv().unwrap(),
                option.delta().unwrap(),
                option.gamma().unwrap(),
            );

            let tree: Rc<VanillaOptionEngine> =
                BinomialVanillaEngine::new(market.process.clone(), TreeKind::LeisenReimer, 251)
                    .unwrap();
            option.set_pricing_engine(tree).unwrap();
            assert_abs_diff_eq!(option.npv().unwrap(), value, epsilon = 1e-3);
            assert_abs_diff_eq!(option.delta().unwrap(), delta, epsilon = 1e-3);
            assert_abs_diff_eq!(option.gamma().unwrap(), gamma, epsilon = 1e-3);

            option
                .set_pricing_engine(fd_engine(&market, FdmSchemeDesc::douglas()))
                .unwrap();
            assert_abs_diff_eq!(option.npv().unwrap(), value, epsilon = 1e-2);
            assert_abs_diff_eq!(option.delta().unwrap(), delta, epsilon = 2e-3);
            assert_abs_diff_eq!(option.gamma().unwrap(), gamma, epsilon = 5e-4);
        }
    }
}

#[test]
fn test_american_put_tree_and_grid_agree() {
    let market = market();
    let exercise = Exercise::american(date(2025, 1, 2), date(2026, 1, 2), false).unwrap();
    let payoff = Payoff::plain_vanilla(OptionType::Put, 105.0);

    let tree: Rc<VanillaOptionEngine> =
        BinomialVanillaEngine::new(market.process.clone(), TreeKind::LeisenReimer, 801).unwrap();
    let option = market.option(payoff, exercise, tree);
    let tree_value = option.npv().unwrap();

    for scheme in [
        FdmSchemeDesc::douglas(),
        FdmSchemeDesc::crank_nicolson(),
        FdmSchemeDesc::implicit_euler(),
    ] {
        option.set_pricing_engine(fd_engine(&market, scheme)).unwrap();
        assert_abs_diff_eq!(option.npv().unwrap(), tree_value, epsilon = 2e-2);
    }
}

#[test]
fn test_engines_follow_the_market() {
    let market = market();
    let exercise = Exercise::american(date(2025, 1, 2), date(2026, 1, 2), false).unwrap();
    let payoff = Payoff::plain_vanilla(OptionType::Put, 100.0);
    let tree = market.option(
        payoff.clone(),
        exercise.clone(),
        BinomialVanillaEngine::new(market.process.clone(), TreeKind::CoxRossRubinstein, 200)
            .unwrap(),
    );
    let grid = market.option(payoff, exercise, fd_engine(&market, FdmSchemeDesc::douglas()));
    let (tree_before, grid_before) = (tree.npv().unwrap(), grid.npv().unwrap());

    market.spot.set_value(95.0).unwrap();
    assert!(tree.npv().unwrap() > tree_before);
    assert!(grid.npv().unwrap() > grid_before);
}

#[test]
fn test_dividend_models_bracket_the_cash_flows() {
    let market = FlatMarket::new(date(2025, 1, 2), 100.0, 0.0, 0.05, 0.25, Actual365Fixed);
    let payoff = Payoff::plain_vanilla(OptionType::Call, 100.0);
    let exercise = Exercise::european(date(2026, 1, 2));
    let dividends = vec![
        Dividend::new(date(2025, 4, 2), 2.0),
        Dividend::new(date(2025, 10, 2), 2.0),
    ];

    let priced = |model: CashDividendModel, dividends: Vec<Dividend>| {
        let engine: Rc<VanillaOptionEngine> =
            FdBlackScholesVanillaEngine::builder(market.process.clone())
                .t_grid(200)
                .x_grid(400)
                .cash_dividend_model(model)
                .build()
                .unwrap();
        let option = VanillaOption::with_dividends(
            payoff.clone(),
            exercise.clone(),
            dividends,
            &market.settings,
        );
        option.set_pricing_engine(engine).unwrap();
        option.npv().unwrap()
    };

    let without = priced(CashDividendModel::Spot, Vec::new());
    let spot_model = priced(CashDividendModel::Spot, dividends.clone());
    let escrowed = priced(CashDividendModel::Escrowed, dividends);
    assert!(spot_model < without);
    assert!(escrowed < without);
    assert!((spot_model - escrowed).abs() > 1e-6);
}
