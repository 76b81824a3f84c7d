//! # ql-pricingengines
//!
//! Pricing engines for vanilla options on a Black-Scholes process.
//!
//! ## Engines
//!
//! - [`AnalyticEuropeanEngine`]: Black-Scholes-Merton closed form with the full Greek set
//! - [`BinomialVanillaEngine`]: recombining trees for European, American and Bermudan exercise
//! - [`FdBlackScholesVanillaEngine`]: finite differences with discrete dividends and local volatility
//!
//! [`ImpliedVolatility`] backs the volatility out of a price with any of them.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod analytic_european_engine;
pub mod binomial_engine;
pub mod black_calculator;
pub mod fd_black_scholes_vanilla_engine;
pub mod greeks;
pub mod implied_volatility;

pub use analytic_european_engine::AnalyticEuropeanEngine;
pub use binomial_engine::BinomialVanillaEngine;
pub use black_calculator::{black_formula, black_formula_implied_std_dev, BlackCalculator};
pub use fd_black_scholes_vanilla_engine::{
    CashDividendModel, FdBlackScholesVanillaEngine, FdBlackScholesVanillaEngineBuilder,
};
pub use greeks::{black_scholes_theta, default_theta_per_day};
pub use implied_volatility::{ImpliedVolatility, ImpliedVolatilityHelper, ImpliedVolatilityOptions};
