//! Implied volatility of vanilla options.
//!
//! The search never touches the caller's process: it prices on a copy
//! whose Black volatility is a flat surface over a private quote, and
//! moves that quote with Brent's method until the engine reproduces the
//! target value. Spot and curves stay shared with the original, so a
//! later move in the market reaches both.

use std::rc::Rc;

use ql_core::{ensure, errors::Error, errors::Result, Handle, Real, Volatility};
use ql_instruments::{
    ExerciseType, Instrument, PricingEngineArguments, VanillaOption, VanillaOptionEngine,
};
use ql_math::solvers1d::{Brent, Solver1D};
use ql_processes::GeneralizedBlackScholesProcess;
use ql_quotes::{Quote, SimpleQuote};
use ql_termstructures::{BlackConstantVol, BlackVolTermStructure, TermStructure};
use tracing::debug;

use crate::analytic_european_engine::AnalyticEuropeanEngine;
use crate::fd_black_scholes_vanilla_engine::FdBlackScholesVanillaEngine;

/// Search settings for [`ImpliedVolatility`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImpliedVolatilityOptions {
    /// Accuracy on the volatility.
    pub accuracy: Real,
    /// Maximum number of engine calls.
    pub max_evaluations: usize,
    /// Lower end of the search interval.
    pub min_vol: Volatility,
    /// Upper end of the search interval.
    pub max_vol: Volatility,
}

impl Default for ImpliedVolatilityOptions {
    fn default() -> Self {
        Self {
            accuracy: 1.0e-4,
            max_evaluations: 100,
            min_vol: 1.0e-7,
            max_vol: 4.0,
        }
    }
}

/// Building blocks of the implied-volatility search.
#[derive(Debug)]
pub struct ImpliedVolatilityHelper;

impl ImpliedVolatilityHelper {
    /// A copy of `process` whose Black volatility is flat at `vol_quote`.
    pub fn clone_process(
        process: &GeneralizedBlackScholesProcess,
        vol_quote: Rc<SimpleQuote>,
    ) -> Result<Rc<GeneralizedBlackScholesProcess>> {
        let black = process.black_volatility().current_link()?;
        let quote: Rc<dyn Quote> = vol_quote;
        let surface: Rc<dyn BlackVolTermStructure> = BlackConstantVol::new(
            black.reference_date(),
            Handle::new(quote),
            black.day_counter().clone_box(),
        );
        Ok(process.with_black_volatility(Handle::new(surface)))
    }

    /// Volatility at which `engine`, fed with `option`'s arguments, values
    /// the option at `target_value`.
    ///
    /// `engine` must price off a process driven by `vol_quote`.
    pub fn calculate(
        option: &VanillaOption,
        engine: &VanillaOptionEngine,
        vol_quote: &SimpleQuote,
        target_value: Real,
        options: &ImpliedVolatilityOptions,
    ) -> Result<Volatility> {
        engine.reset();
        option.setup_arguments(&mut engine.arguments())?;
        engine.arguments().validate()?;

        let guess = 0.5 * (options.min_vol + options.max_vol);
        let price_error = |vol: Real| -> Result<Real> {
            vol_quote.set_value(vol)?;
            engine.calculate()?;
            let value = engine
                .results()
                .instrument
                .value
                .ok_or_else(|| Error::Runtime("engine returned no value".into()))?;
            Ok(value - target_value)
        };
        Brent::new()
            .with_max_evaluations(options.max_evaluations)
            .solve_bracketed(
                price_error,
                options.accuracy,
                guess,
                options.min_vol,
                options.max_vol,
            )
    }
}

/// Implied volatility of an option under Black-Scholes dynamics.
pub trait ImpliedVolatility {
    /// Volatility reproducing `target_value` with the default settings.
    fn implied_volatility(
        &self,
        target_value: Real,
        process: &GeneralizedBlackScholesProcess,
    ) -> Result<Volatility> {
        self.implied_volatility_with(target_value, process, &ImpliedVolatilityOptions::default())
    }

    /// Volatility reproducing `target_value`.
    fn implied_volatility_with(
        &self,
        target_value: Real,
        process: &GeneralizedBlackScholesProcess,
        options: &ImpliedVolatilityOptions,
    ) -> Result<Volatility>;
}

impl ImpliedVolatility for VanillaOption {
    /// European options without dividends are priced analytically,
    /// everything else on the finite-difference engine with its default
    /// grid.
    fn implied_volatility_with(
        &self,
        target_value: Real,
        process: &GeneralizedBlackScholesProcess,
        options: &ImpliedVolatilityOptions,
    ) -> Result<Volatility> {
        ensure!(!self.is_expired(), "option expired");
        ensure!(
            options.min_vol < options.max_vol,
            "invalid volatility range [{}, {}]",
            options.min_vol,
            options.max_vol
        );
        let vol_quote = Rc::new(SimpleQuote::new(options.min_vol));
        let process = ImpliedVolatilityHelper::clone_process(process, Rc::clone(&vol_quote))?;
        let analytic = self.exercise().exercise_type() == ExerciseType::European
            && self.dividends().is_empty();
        let engine: Rc<VanillaOptionEngine> = if analytic {
            AnalyticEuropeanEngine::new(process)
        } else {
            FdBlackScholesVanillaEngine::new(process)?
        };
        let vol = ImpliedVolatilityHelper::calculate(self, &*engine, &vol_quote, target_value, options);
        match &vol {
            Ok(vol) => debug!(vol, target_value, analytic, "implied volatility found"),
            Err(err) => debug!(%err, target_value, analytic, "implied volatility search failed"),
        }
        vol
    }
}
