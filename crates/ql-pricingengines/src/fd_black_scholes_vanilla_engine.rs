//! Finite-difference engine for vanilla options with cash dividends.

use std::fmt;
use std::rc::Rc;

use ql_core::{
    downgrade_observer, ensure, errors::Result, fail, Observable, ObservableImpl, Observer, Real,
    Size,
};
use ql_instruments::{
    Dividend, ExerciseType, GenericEngine, OneAssetOptionArguments, OneAssetOptionResults,
    PricingEngine,
};
use ql_methods::finite_differences::{
    EscrowedDividendAdjustment, FdmBlackScholesMesher, FdmBlackScholesSolver, FdmLogInnerValue,
    FdmSchemeDesc, FdmSolverDesc, FdmStepConditionComposite,
};
use ql_processes::{GeneralizedBlackScholesProcess, StochasticProcess1D};
use ql_termstructures::TermStructure;
use tracing::debug;

/// How discrete cash dividends enter the finite-difference problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CashDividendModel {
    /// The spot drops by the dividend amount on each ex-dividend date.
    #[default]
    Spot,
    /// The present value of the outstanding dividends is taken out of the
    /// spot up front; the grid carries the spot net of dividends.
    Escrowed,
}

impl fmt::Display for CashDividendModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CashDividendModel::Spot => f.write_str("Spot"),
            CashDividendModel::Escrowed => f.write_str("Escrowed"),
        }
    }
}

/// Solves the Black-Scholes equation in log-spot on a grid concentrated
/// around the strike.
///
/// Supports European, American and Bermudan exercise, discrete cash
/// dividends under either [`CashDividendModel`], and local volatility.
/// Value, delta and gamma come from the solved grid at the spot. Theta
/// comes from a snapshot taken just before time zero and is left empty
/// when a stopping time falls at zero.
#[derive(Debug)]
pub struct FdBlackScholesVanillaEngine {
    process: Rc<GeneralizedBlackScholesProcess>,
    t_grid: Size,
    x_grid: Size,
    damping_steps: Size,
    scheme: FdmSchemeDesc,
    local_vol: bool,
    illegal_local_vol_overwrite: Option<Real>,
    cash_dividend_model: CashDividendModel,
    engine: GenericEngine<OneAssetOptionArguments, OneAssetOptionResults>,
}

/// Configures an [`FdBlackScholesVanillaEngine`].
///
/// Defaults: 100 time steps, 100 grid points, no damping steps, the
/// Douglas scheme, Black volatility and the spot dividend model.
#[derive(Debug, Clone)]
pub struct FdBlackScholesVanillaEngineBuilder {
    process: Rc<GeneralizedBlackScholesProcess>,
    t_grid: Size,
    x_grid: Size,
    damping_steps: Size,
    scheme: FdmSchemeDesc,
    local_vol: bool,
    illegal_local_vol_overwrite: Option<Real>,
    cash_dividend_model: CashDividendModel,
}

impl FdBlackScholesVanillaEngineBuilder {
    /// Number of time steps.
    pub fn t_grid(mut self, t_grid: Size) -> Self {
        self.t_grid = t_grid;
        self
    }

    /// Number of spatial grid points.
    pub fn x_grid(mut self, x_grid: Size) -> Self {
        self.x_grid = x_grid;
        self
    }

    /// Implicit Euler steps taken before switching to the scheme.
    pub fn damping_steps(mut self, damping_steps: Size) -> Self {
        self.damping_steps = damping_steps;
        self
    }

    /// The time-stepping scheme.
    pub fn scheme(mut self, scheme: FdmSchemeDesc) -> Self {
        self.scheme = scheme;
        self
    }

    /// Use the process's local volatility instead of the Black volatility
    /// at the strike.
    pub fn local_vol(mut self, local_vol: bool) -> Self {
        self.local_vol = local_vol;
        self
    }

    /// Volatility used where the local volatility cannot be computed.
    pub fn illegal_local_vol_overwrite(mut self, vol: Real) -> Self {
        self.illegal_local_vol_overwrite = Some(vol);
        self
    }

    /// The cash dividend model.
    pub fn cash_dividend_model(mut self, model: CashDividendModel) -> Self {
        self.cash_dividend_model = model;
        self
    }

    /// Build the engine.
    pub fn build(self) -> Result<Rc<FdBlackScholesVanillaEngine>> {
        ensure!(self.t_grid > 0, "at least one time step required");
        ensure!(self.x_grid >= 3, "at least three grid points required");
        let engine = Rc::new(FdBlackScholesVanillaEngine {
            process: self.process,
            t_grid: self.t_grid,
            x_grid: self.x_grid,
            damping_steps: self.damping_steps,
            scheme: self.scheme,
            local_vol: self.local_vol,
            illegal_local_vol_overwrite: self.illegal_local_vol_overwrite,
            cash_dividend_model: self.cash_dividend_model,
            engine: GenericEngine::new(),
        });
        engine
            .process
            .register_observer(downgrade_observer(&engine));
        Ok(engine)
    }
}

impl FdBlackScholesVanillaEngine {
    /// An engine with the default settings.
    pub fn new(process: Rc<GeneralizedBlackScholesProcess>) -> Result<Rc<Self>> {
        Self::builder(process).build()
    }

    /// Start configuring an engine for `process`.
    pub fn builder(process: Rc<GeneralizedBlackScholesProcess>) -> FdBlackScholesVanillaEngineBuilder {
        FdBlackScholesVanillaEngineBuilder {
            process,
            t_grid: 100,
            x_grid: 100,
            damping_steps: 0,
            scheme: FdmSchemeDesc::douglas(),
            local_vol: false,
            illegal_local_vol_overwrite: None,
            cash_dividend_model: CashDividendModel::Spot,
        }
    }

    /// The cash dividend model.
    pub fn cash_dividend_model(&self) -> CashDividendModel {
        self.cash_dividend_model
    }
}

impl Observable for FdBlackScholesVanillaEngine {
    fn observable(&self) -> &ObservableImpl {
        self.engine.observable()
    }
}

impl Observer for FdBlackScholesVanillaEngine {
    fn update(&self) -> Result<()> {
        self.notify_observers()
    }
}

impl PricingEngine for FdBlackScholesVanillaEngine {
    type Arguments = OneAssetOptionArguments;
    type Results = OneAssetOptionResults;

    fn generic_engine(&self) -> &GenericEngine<Self::Arguments, Self::Results> {
        &self.engine
    }

    fn calculate(&self) -> Result<()> {
        let arguments = self.arguments().clone();
        let (Some(payoff), Some(exercise)) = (arguments.payoff, arguments.exercise) else {
            fail!("incomplete option arguments");
        };
        let (_, strike) = payoff.striked()?;

        let exercise_date = exercise.last_date();
        let maturity = self.process.time(exercise_date)?;
        let r_ts = self.process.risk_free_rate().current_link()?;
        let q_ts = self.process.dividend_yield().current_link()?;
        let reference_date = r_ts.reference_date();
        let day_counter = r_ts.day_counter().clone_box();

        let dividends: Vec<Dividend> = arguments
            .dividends
            .iter()
            .filter(|d| d.date >= reference_date && d.date <= exercise_date)
            .copied()
            .collect();

        // Dividends seen by the mesher and the step conditions, and the
        // escrowed adjustment if any.
        let (schedule, escrowed, spot_adjustment) = match self.cash_dividend_model {
            CashDividendModel::Spot => (dividends, None, 0.0),
            CashDividendModel::Escrowed => {
                let schedule = if exercise.exercise_type() == ExerciseType::European {
                    Vec::new()
                } else {
                    // zero-amount dividends keep the ex-dividend dates as
                    // stopping times
                    dividends.iter().map(|d| Dividend::new(d.date, 0.0)).collect()
                };
                let adjustment = Rc::new(EscrowedDividendAdjustment::new(
                    &dividends,
                    Rc::clone(&r_ts),
                    Rc::clone(&q_ts),
                    reference_date,
                    &*day_counter,
                    maturity,
                ));
                let spot_adjustment = adjustment.dividend_adjustment(0.0)?;
                ensure!(
                    self.process.x0()? + spot_adjustment > 0.0,
                    "spot minus dividends becomes negative"
                );
                (schedule, Some(adjustment), spot_adjustment)
            }
        };

        let mesher = FdmBlackScholesMesher::new(self.x_grid, Rc::clone(&self.process), maturity, strike)
            .concentrate(strike, 0.1)
            .dividends(&schedule)
            .spot_adjustment(spot_adjustment)
            .build()?;

        let calculator = Rc::new(match escrowed {
            Some(adjustment) => FdmLogInnerValue::escrowed(payoff, mesher.clone(), adjustment)?,
            None => FdmLogInnerValue::new(payoff, mesher.clone())?,
        });

        let conditions = FdmStepConditionComposite::vanilla_composite(
            &schedule,
            &exercise,
            &mesher,
            Rc::clone(&calculator),
            reference_date,
            &*day_counter,
        )?;

        debug!(
            x_grid = self.x_grid,
            t_grid = self.t_grid,
            damping_steps = self.damping_steps,
            scheme = %self.scheme.scheme_type,
            dividends = %self.cash_dividend_model,
            "finite-difference rollback"
        );

        let desc = FdmSolverDesc {
            mesher,
            conditions,
            calculator,
            maturity,
            time_steps: self.t_grid,
            damping_steps: self.damping_steps,
        };
        let solver = FdmBlackScholesSolver::new(
            &self.process,
            strike,
            desc,
            self.scheme,
            self.local_vol,
            self.illegal_local_vol_overwrite,
        )?;

        let spot = self.process.x0()? + spot_adjustment;
        let theta = match solver.theta_at(spot) {
            Ok(theta) => Some(theta),
            Err(err) => {
                debug!(%err, "theta not available");
                None
            }
        };

        let mut results = self.results_mut();
        results.instrument.value = Some(solver.value_at(spot));
        results.greeks.delta = Some(solver.delta_at(spot));
        results.greeks.gamma = Some(solver.gamma_at(spot));
        results.greeks.theta = theta;
        Ok(())
    }
}
