//! Single-asset options.
//!
//! [`VanillaOption`] holds a payoff, an exercise schedule and, optionally,
//! a schedule of discrete cash dividends. All engines for these options
//! share one argument/result pair.

use std::fmt;
use std::rc::Rc;

use crate::dividend::DividendSchedule;
use crate::exercise::Exercise;
use crate::instrument::{
    Instrument, InstrumentResults, InstrumentState, PricingEngine, PricingEngineArguments,
    PricingEngineResults,
};
use crate::payoff::Payoff;
use ql_core::{
    downgrade_observer, ensure,
    errors::{Error, Result},
    LazyObject, LazyState, Observable, ObservableImpl, Observer, Real, Settings,
};

/// Engine inputs for a single-asset option.
#[derive(Debug, Clone, Default)]
pub struct OneAssetOptionArguments {
    /// The payoff.
    pub payoff: Option<Payoff>,
    /// The exercise schedule.
    pub exercise: Option<Exercise>,
    /// Cash dividends paid before the last exercise date.
    pub dividends: DividendSchedule,
}

impl PricingEngineArguments for OneAssetOptionArguments {
    fn validate(&self) -> Result<()> {
        ensure!(self.payoff.is_some(), "no payoff given");
        let Some(exercise) = &self.exercise else {
            return Err(Error::Precondition("no exercise given".into()));
        };
        let last = exercise.last_date();
        for (i, dividend) in self.dividends.iter().enumerate() {
            ensure!(
                dividend.date <= last,
                "dividend #{} date ({}) is later than the exercise date ({last})",
                i + 1,
                dividend.date
            );
        }
        Ok(())
    }
}

/// First-order sensitivities.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Greeks {
    /// ∂V/∂S.
    pub delta: Option<Real>,
    /// ∂²V/∂S².
    pub gamma: Option<Real>,
    /// ∂V/∂t, per year.
    pub theta: Option<Real>,
    /// ∂V/∂σ.
    pub vega: Option<Real>,
    /// ∂V/∂r.
    pub rho: Option<Real>,
    /// ∂V/∂q.
    pub dividend_rho: Option<Real>,
}

/// Further sensitivities and probabilities.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MoreGreeks {
    /// Risk-neutral probability of finishing in the money.
    pub itm_cash_probability: Option<Real>,
    /// ∂V/∂F.
    pub delta_forward: Option<Real>,
    /// Percentage change in value per percentage change in spot.
    pub elasticity: Option<Real>,
    /// Theta per calendar day.
    pub theta_per_day: Option<Real>,
    /// ∂V/∂K.
    pub strike_sensitivity: Option<Real>,
}

/// Engine outputs for a single-asset option.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OneAssetOptionResults {
    /// Value and additional results.
    pub instrument: InstrumentResults,
    /// First-order Greeks.
    pub greeks: Greeks,
    /// Further Greeks.
    pub more_greeks: MoreGreeks,
}

impl PricingEngineResults for OneAssetOptionResults {
    fn instrument_results(&self) -> &InstrumentResults {
        &self.instrument
    }

    fn instrument_results_mut(&mut self) -> &mut InstrumentResults {
        &mut self.instrument
    }

    fn expire(&mut self) {
        self.reset();
        self.instrument.value = Some(0.0);
        self.instrument.error_estimate = Some(0.0);
        self.greeks = Greeks {
            delta: Some(0.0),
            gamma: Some(0.0),
            theta: Some(0.0),
            vega: Some(0.0),
            rho: Some(0.0),
            dividend_rho: Some(0.0),
        };
        self.more_greeks = MoreGreeks {
            itm_cash_probability: Some(0.0),
            delta_forward: Some(0.0),
            elasticity: Some(0.0),
            theta_per_day: Some(0.0),
            strike_sensitivity: Some(0.0),
        };
    }
}

/// Any engine able to price a [`VanillaOption`].
pub type VanillaOptionEngine =
    dyn PricingEngine<Arguments = OneAssetOptionArguments, Results = OneAssetOptionResults>;

/// An option on a single underlying, with any payoff and exercise.
pub struct VanillaOption {
    payoff: Payoff,
    exercise: Exercise,
    dividends: DividendSchedule,
    settings: Rc<Settings>,
    state: InstrumentState<VanillaOptionEngine>,
}

/// A vanilla option whose underlying pays discrete cash dividends; build
/// one with [`VanillaOption::with_dividends`].
pub type DividendVanillaOption = VanillaOption;

impl VanillaOption {
    /// An option without discrete dividends.
    ///
    /// The option observes `settings` so a move of the evaluation date
    /// invalidates its results.
    pub fn new(payoff: Payoff, exercise: Exercise, settings: &Rc<Settings>) -> Rc<Self> {
        Self::with_dividends(payoff, exercise, DividendSchedule::new(), settings)
    }

    /// An option on an underlying paying `dividends`.
    pub fn with_dividends(
        payoff: Payoff,
        exercise: Exercise,
        mut dividends: DividendSchedule,
        settings: &Rc<Settings>,
    ) -> Rc<Self> {
        dividends.sort_by_key(|d| d.date);
        let option = Rc::new(Self {
            payoff,
            exercise,
            dividends,
            settings: Rc::clone(settings),
            state: InstrumentState::new(),
        });
        settings.register_observer(downgrade_observer(&option));
        option
    }

    /// The payoff.
    pub fn payoff(&self) -> &Payoff {
        &self.payoff
    }

    /// The exercise schedule.
    pub fn exercise(&self) -> &Exercise {
        &self.exercise
    }

    /// The dividend schedule.
    pub fn dividends(&self) -> &DividendSchedule {
        &self.dividends
    }

    /// The pricing context.
    pub fn settings(&self) -> &Rc<Settings> {
        &self.settings
    }

    fn greek(
        &self,
        name: &str,
        pick: impl Fn(&OneAssetOptionResults) -> Option<Real>,
    ) -> Result<Real> {
        self.calculate()?;
        pick(&*self.state.results()).ok_or_else(|| Error::Runtime(format!("{name} not provided")))
    }

    /// ∂V/∂S.
    pub fn delta(&self) -> Result<Real> {
        self.greek("delta", |r| r.greeks.delta)
    }

    /// ∂V/∂F.
    pub fn delta_forward(&self) -> Result<Real> {
        self.greek("forward delta", |r| r.more_greeks.delta_forward)
    }

    /// Elasticity.
    pub fn elasticity(&self) -> Result<Real> {
        self.greek("elasticity", |r| r.more_greeks.elasticity)
    }

    /// ∂²V/∂S².
    pub fn gamma(&self) -> Result<Real> {
        self.greek("gamma", |r| r.greeks.gamma)
    }

    /// ∂V/∂t, per year.
    pub fn theta(&self) -> Result<Real> {
        self.greek("theta", |r| r.greeks.theta)
    }

    /// ∂V/∂t, per day.
    pub fn theta_per_day(&self) -> Result<Real> {
        self.greek("theta per-day", |r| r.more_greeks.theta_per_day)
    }

    /// ∂V/∂σ.
    pub fn vega(&self) -> Result<Real> {
        self.greek("vega", |r| r.greeks.vega)
    }

    /// ∂V/∂r.
    pub fn rho(&self) -> Result<Real> {
        self.greek("rho", |r| r.greeks.rho)
    }

    /// ∂V/∂q.
    pub fn dividend_rho(&self) -> Result<Real> {
        self.greek("dividend rho", |r| r.greeks.dividend_rho)
    }

    /// ∂V/∂K.
    pub fn strike_sensitivity(&self) -> Result<Real> {
        self.greek("strike sensitivity", |r| r.more_greeks.strike_sensitivity)
    }

    /// Probability of finishing in the money.
    pub fn itm_cash_probability(&self) -> Result<Real> {
        self.greek("in-the-money cash probability", |r| {
            r.more_greeks.itm_cash_probability
        })
    }
}

impl fmt::Debug for VanillaOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VanillaOption")
            .field("payoff", &self.payoff)
            .field("exercise", &self.exercise)
            .field("dividends", &self.dividends)
            .field("state", &self.state)
            .finish()
    }
}

impl Observable for VanillaOption {
    fn observable(&self) -> &ObservableImpl {
        self.state.observable()
    }
}

impl Observer for VanillaOption {
    fn update(&self) -> Result<()> {
        self.lazy_update()
    }
}

impl LazyObject for VanillaOption {
    fn lazy_state(&self) -> &LazyState {
        self.state.lazy()
    }

    fn perform_calculations(&self) -> Result<()> {
        self.run_engine()
    }
}

impl Instrument for VanillaOption {
    type Engine = VanillaOptionEngine;

    fn instrument_state(&self) -> &InstrumentState<VanillaOptionEngine> {
        &self.state
    }

    fn is_expired(&self) -> bool {
        let last = self.exercise.last_date();
        let today = self.settings.evaluation_date();
        if self.settings.include_reference_date_events() {
            last < today
        } else {
            last <= today
        }
    }

    fn setup_arguments(&self, arguments: &mut OneAssetOptionArguments) -> Result<()> {
        arguments.payoff = Some(self.payoff.clone());
        arguments.exercise = Some(self.exercise.clone());
        arguments.dividends = self.dividends.clone();
        Ok(())
    }
}
