//! # quantlib
//!
//! Option valuation on top of a lazy, observer-driven market model.
//!
//! This crate is a **façade** that re-exports all public items from the
//! underlying workspace crates. Application code should depend on this
//! crate rather than the individual `ql-*` crates.
//!
//! ## Quick start
//!
//! ```toml
//! [dependencies]
//! quantlib = "0.1"
//! ```
//!
//! ```rust
//! use std::rc::Rc;
//!
//! use quantlib::core::{Date, Handle, Settings};
//! use quantlib::instruments::{Exercise, Instrument, OptionType, Payoff, VanillaOption, VanillaOptionEngine};
//! use quantlib::pricingengines::AnalyticEuropeanEngine;
//! use quantlib::processes::GeneralizedBlackScholesProcess;
//! use quantlib::quotes::{Quote, SimpleQuote};
//! use quantlib::termstructures::{BlackConstantVol, BlackVolTermStructure, FlatForward, YieldTermStructure};
//! use quantlib::time::Actual365Fixed;
//!
//! let today = Date::from_ymd_opt(2025, 1, 2).unwrap();
//! let settings = Settings::with_evaluation_date(today);
//! let spot = Rc::new(SimpleQuote::new(100.0));
//! let r: Rc<dyn YieldTermStructure> = FlatForward::with_rate(today, 0.05, Actual365Fixed);
//! let q: Rc<dyn YieldTermStructure> = FlatForward::with_rate(today, 0.0, Actual365Fixed);
//! let vol: Rc<dyn BlackVolTermStructure> = BlackConstantVol::with_volatility(today, 0.2, Actual365Fixed);
//! let process = GeneralizedBlackScholesProcess::new(
//!     Handle::new(spot.clone() as Rc<dyn Quote>),
//!     Handle::new(q),
//!     Handle::new(r),
//!     Handle::new(vol),
//! );
//!
//! let option = VanillaOption::new(
//!     Payoff::plain_vanilla(OptionType::Call, 100.0),
//!     Exercise::european(Date::from_ymd_opt(2026, 1, 2).unwrap()),
//!     &settings,
//! );
//! let engine: Rc<VanillaOptionEngine> = AnalyticEuropeanEngine::new(process);
//! option.set_pricing_engine(engine).unwrap();
//! let before = option.npv().unwrap();
//!
//! spot.set_value(105.0).unwrap();
//! assert!(option.npv().unwrap() > before);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Core types, aliases, errors, observers and lazy objects.
pub use ql_core as core;

/// Day-count conventions.
pub use ql_time as time;

/// Mathematical utilities: distributions, interpolation, solvers, optimization.
pub use ql_math as math;

/// Market quotes.
pub use ql_quotes as quotes;

/// Yield and volatility term structures.
pub use ql_termstructures as termstructures;

/// Stochastic process definitions.
pub use ql_processes as processes;

/// Numerical methods (lattices, finite differences).
pub use ql_methods as methods;

/// Options, payoffs, exercises and the pricing-engine protocol.
pub use ql_instruments as instruments;

/// Pricing engines.
pub use ql_pricingengines as pricingengines;
