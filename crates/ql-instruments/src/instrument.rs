//! Instruments and the pricing-engine protocol.
//!
//! An [`Instrument`] is a lazy object: it asks its engine for results only
//! when one is read and the cached ones are stale. A calculation runs the
//! protocol
//!
//! 1. `engine.reset()`
//! 2. `instrument.setup_arguments(engine.arguments())`
//! 3. `engine.arguments().validate()`
//! 4. `engine.calculate()`
//! 5. `instrument.fetch_results(engine.results())`
//!
//! Engines keep their arguments and results in a [`GenericEngine`] and are
//! observable, so instruments are invalidated when an engine's inputs move.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashMap;
use std::fmt::Debug;
use std::rc::Rc;

use ql_core::{
    downgrade_observer,
    errors::{Error, Result},
    fail, Date, LazyObject, LazyState, Observable, ObservableImpl, Observer, Real,
};

/// Inputs an engine reads; filled in by the instrument.
pub trait PricingEngineArguments: Debug + Default {
    /// Check the arguments are complete and consistent.
    fn validate(&self) -> Result<()>;
}

/// Outputs an engine writes.
pub trait PricingEngineResults: Debug + Default + Clone {
    /// The results every instrument has.
    fn instrument_results(&self) -> &InstrumentResults;

    /// Mutable access to the common results.
    fn instrument_results_mut(&mut self) -> &mut InstrumentResults;

    /// Return to the "nothing calculated" state.
    fn reset(&mut self) {
        *self = Self::default();
    }

    /// Results of an expired instrument: everything zero.
    fn expire(&mut self) {
        self.reset();
        let results = self.instrument_results_mut();
        results.value = Some(0.0);
        results.error_estimate = Some(0.0);
    }
}

/// Results shared by all instruments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstrumentResults {
    /// Net present value.
    pub value: Option<Real>,
    /// Error estimate (e.g. from simulation).
    pub error_estimate: Option<Real>,
    /// Date the value refers to.
    pub valuation_date: Option<Date>,
    /// Additional named results.
    pub additional_results: HashMap<String, Real>,
}

impl InstrumentResults {
    /// Store a named result.
    pub fn set_result(&mut self, tag: impl Into<String>, value: Real) {
        self.additional_results.insert(tag.into(), value);
    }
}

impl PricingEngineResults for InstrumentResults {
    fn instrument_results(&self) -> &InstrumentResults {
        self
    }

    fn instrument_results_mut(&mut self) -> &mut InstrumentResults {
        self
    }
}

/// Argument and result storage for an engine.
#[derive(Debug, Default)]
pub struct GenericEngine<A, R> {
    arguments: RefCell<A>,
    results: RefCell<R>,
    observable: ObservableImpl,
}

impl<A: Default, R: Default> GenericEngine<A, R> {
    /// Empty arguments and results.
    pub fn new() -> Self {
        Self {
            arguments: RefCell::new(A::default()),
            results: RefCell::new(R::default()),
            observable: ObservableImpl::new(),
        }
    }
}

impl<A, R> Observable for GenericEngine<A, R> {
    fn observable(&self) -> &ObservableImpl {
        &self.observable
    }
}

/// A pricing engine.
///
/// Implementors embed a [`GenericEngine`] and provide
/// [`calculate`](Self::calculate), which reads the arguments and writes the
/// results.
pub trait PricingEngine: Observable + Debug {
    /// Inputs for this engine.
    type Arguments: PricingEngineArguments;
    /// Outputs of this engine.
    type Results: PricingEngineResults;

    /// The embedded storage.
    fn generic_engine(&self) -> &GenericEngine<Self::Arguments, Self::Results>;

    /// Compute results from the current arguments.
    fn calculate(&self) -> Result<()>;

    /// The arguments, for the instrument to fill in.
    fn arguments(&self) -> RefMut<'_, Self::Arguments> {
        self.generic_engine().arguments.borrow_mut()
    }

    /// The results of the last calculation.
    fn results(&self) -> Ref<'_, Self::Results> {
        self.generic_engine().results.borrow()
    }

    /// The results, for the engine to write.
    fn results_mut(&self) -> RefMut<'_, Self::Results> {
        self.generic_engine().results.borrow_mut()
    }

    /// Clear the results.
    fn reset(&self) {
        self.results_mut().reset();
    }
}

/// Lazy-object flags, engine link, and result cache of an instrument.
pub struct InstrumentState<E: PricingEngine + ?Sized> {
    lazy: LazyState,
    observable: ObservableImpl,
    engine: RefCell<Option<Rc<E>>>,
    results: RefCell<E::Results>,
}

impl<E: PricingEngine + ?Sized> InstrumentState<E> {
    /// State with no engine and no results.
    pub fn new() -> Self {
        Self {
            lazy: LazyState::new(),
            observable: ObservableImpl::new(),
            engine: RefCell::new(None),
            results: RefCell::new(E::Results::default()),
        }
    }

    /// The embedded lazy-object flags.
    pub fn lazy(&self) -> &LazyState {
        &self.lazy
    }

    /// The embedded observer list.
    pub fn observable(&self) -> &ObservableImpl {
        &self.observable
    }

    /// The current engine, if any.
    pub fn engine(&self) -> Option<Rc<E>> {
        self.engine.borrow().clone()
    }

    /// The cached results.
    pub fn results(&self) -> Ref<'_, E::Results> {
        self.results.borrow()
    }
}

impl<E: PricingEngine + ?Sized> Default for InstrumentState<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: PricingEngine + ?Sized> Debug for InstrumentState<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstrumentState")
            .field("calculated", &self.lazy)
            .field("engine", &self.engine.borrow().is_some())
            .field("results", &self.results.borrow())
            .finish()
    }
}

/// A priceable instrument.
///
/// Implementors embed an [`InstrumentState`], describe themselves to the
/// engine in [`setup_arguments`](Self::setup_arguments), and route
/// `LazyObject::perform_calculations` to
/// [`run_engine`](Self::run_engine).
pub trait Instrument: LazyObject {
    /// The engine family this instrument is priced with.
    type Engine: PricingEngine + ?Sized;

    /// The embedded state.
    fn instrument_state(&self) -> &InstrumentState<Self::Engine>;

    /// Whether the instrument has no remaining value.
    fn is_expired(&self) -> bool;

    /// Describe the instrument to the engine.
    fn setup_arguments(
        &self,
        arguments: &mut <Self::Engine as PricingEngine>::Arguments,
    ) -> Result<()>;

    /// Copy the engine's results into the cache.
    fn fetch_results(&self, results: &<Self::Engine as PricingEngine>::Results) -> Result<()> {
        *self.instrument_state().results.borrow_mut() = results.clone();
        Ok(())
    }

    /// Zero every result without calling the engine.
    fn setup_expired(&self) {
        self.instrument_state().results.borrow_mut().expire();
    }

    /// Run the engine protocol, or zero the results if expired.
    fn run_engine(&self) -> Result<()> {
        if self.is_expired() {
            self.setup_expired();
            return Ok(());
        }
        let Some(engine) = self.instrument_state().engine() else {
            fail!("null pricing engine");
        };
        engine.reset();
        self.setup_arguments(&mut engine.arguments())?;
        engine.arguments().validate()?;
        engine.calculate()?;
        let results = engine.results();
        self.fetch_results(&results)
    }

    /// Attach `engine`, stop observing the previous one, and invalidate the
    /// cached results.
    fn set_pricing_engine(self: &Rc<Self>, engine: Rc<Self::Engine>) -> Result<()>
    where
        Self: Observer + Sized + 'static,
    {
        let me = downgrade_observer(self);
        let state = self.instrument_state();
        if let Some(old) = state.engine.borrow().as_ref() {
            old.unregister_observer(&me);
        }
        engine.register_observer(me);
        *state.engine.borrow_mut() = Some(engine);
        self.lazy_update()
    }

    /// Net present value.
    fn npv(&self) -> Result<Real> {
        self.calculate()?;
        self.instrument_state()
            .results()
            .instrument_results()
            .value
            .ok_or_else(|| Error::Runtime("NPV not provided".into()))
    }

    /// Error estimate on the value.
    fn error_estimate(&self) -> Result<Real> {
        self.calculate()?;
        self.instrument_state()
            .results()
            .instrument_results()
            .error_estimate
            .ok_or_else(|| Error::Runtime("error estimate not provided".into()))
    }

    /// Date the value refers to.
    fn valuation_date(&self) -> Result<Date> {
        self.calculate()?;
        self.instrument_state()
            .results()
            .instrument_results()
            .valuation_date
            .ok_or_else(|| Error::Runtime("valuation date not provided".into()))
    }

    /// A named additional result.
    fn result(&self, tag: &str) -> Result<Real> {
        self.calculate()?;
        self.instrument_state()
            .results()
            .instrument_results()
            .additional_results
            .get(tag)
            .copied()
            .ok_or_else(|| Error::Runtime(format!("{tag} not provided")))
    }

    /// All named additional results.
    fn additional_results(&self) -> Result<HashMap<String, Real>> {
        self.calculate()?;
        Ok(self
            .instrument_state()
            .results()
            .instrument_results()
            .additional_results
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::cell::Cell;

    #[derive(Debug, Default)]
    struct Notional {
        amount: Real,
    }

    impl PricingEngineArguments for Notional {
        fn validate(&self) -> Result<()> {
            ql_core::ensure!(self.amount >= 0.0, "negative notional");
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct Doubler {
        engine: GenericEngine<Notional, InstrumentResults>,
        runs: Cell<usize>,
    }

    impl Observable for Doubler {
        fn observable(&self) -> &ObservableImpl {
            self.engine.observable()
        }
    }

    impl PricingEngine for Doubler {
        type Arguments = Notional;
        type Results = InstrumentResults;

        fn generic_engine(&self) -> &GenericEngine<Notional, InstrumentResults> {
            &self.engine
        }

        fn calculate(&self) -> Result<()> {
            self.runs.set(self.runs.get() + 1);
            let amount = self.arguments().amount;
            let mut results = self.results_mut();
            results.value = Some(2.0 * amount);
            results.set_result("amount", amount);
            Ok(())
        }
    }

    #[derive(Debug)]
    struct Deposit {
        amount: Cell<Real>,
        expired: Cell<bool>,
        state: InstrumentState<Doubler>,
    }

    impl Deposit {
        fn new(amount: Real) -> Rc<Self> {
            Rc::new(Self {
                amount: Cell::new(amount),
                expired: Cell::new(false),
                state: InstrumentState::new(),
            })
        }
    }

    impl Observable for Deposit {
        fn observable(&self) -> &ObservableImpl {
            self.state.observable()
        }
    }

    impl Observer for Deposit {
        fn update(&self) -> Result<()> {
            self.lazy_update()
        }
    }

    impl LazyObject for Deposit {
        fn lazy_state(&self) -> &LazyState {
            self.state.lazy()
        }

        fn perform_calculations(&self) -> Result<()> {
            self.run_engine()
        }
    }

    impl Instrument for Deposit {
        type Engine = Doubler;

        fn instrument_state(&self) -> &InstrumentState<Doubler> {
            &self.state
        }

        fn is_expired(&self) -> bool {
            self.expired.get()
        }

        fn setup_arguments(&self, arguments: &mut Notional) -> Result<()> {
            arguments.amount = self.amount.get();
            Ok(())
        }
    }

    #[test]
    fn results_are_cached_until_invalidated() {
        let deposit = Deposit::new(10.0);
        let engine = Rc::new(Doubler::default());
        deposit.set_pricing_engine(engine.clone()).unwrap();

        assert_abs_diff_eq!(deposit.npv().unwrap(), 20.0, epsilon = 1e-15);
        assert_abs_diff_eq!(deposit.result("amount").unwrap(), 10.0, epsilon = 1e-15);
        assert_eq!(engine.runs.get(), 1);

        deposit.amount.set(4.0);
        assert_abs_diff_eq!(deposit.npv().unwrap(), 20.0, epsilon = 1e-15);
        engine.notify_observers().unwrap();
        assert_abs_diff_eq!(deposit.npv().unwrap(), 8.0, epsilon = 1e-15);
        assert_eq!(engine.runs.get(), 2);
    }

    #[test]
    fn missing_engine_and_results_are_errors() {
        let deposit = Deposit::new(1.0);
        assert!(deposit.npv().is_err());
        assert!(!deposit.is_calculated());

        deposit.set_pricing_engine(Rc::new(Doubler::default())).unwrap();
        assert!(deposit.error_estimate().is_err());
        assert!(deposit.result("vega").is_err());
        assert_eq!(deposit.additional_results().unwrap().len(), 1);
    }

    #[test]
    fn invalid_arguments_are_rejected_before_calculation() {
        let deposit = Deposit::new(-1.0);
        let engine = Rc::new(Doubler::default());
        deposit.set_pricing_engine(engine.clone()).unwrap();
        assert!(matches!(deposit.npv(), Err(Error::Precondition(_))));
        assert_eq!(engine.runs.get(), 0);
    }

    #[test]
    fn expired_instruments_skip_the_engine() {
        let deposit = Deposit::new(5.0);
        let engine = Rc::new(Doubler::default());
        deposit.set_pricing_engine(engine.clone()).unwrap();
        deposit.expired.set(true);
        assert_abs_diff_eq!(deposit.npv().unwrap(), 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(deposit.error_estimate().unwrap(), 0.0, epsilon = 1e-15);
        assert_eq!(engine.runs.get(), 0);
    }

    #[test]
    fn replacing_the_engine_stops_observing_the_old_one() {
        let deposit = Deposit::new(3.0);
        let first = Rc::new(Doubler::default());
        let second = Rc::new(Doubler::default());
        deposit.set_pricing_engine(first.clone()).unwrap();
        deposit.npv().unwrap();
        deposit.set_pricing_engine(second.clone()).unwrap();
        assert!(!deposit.is_calculated());
        assert_eq!(first.observable().observer_count(), 0);
        assert_eq!(second.observable().observer_count(), 1);
        deposit.npv().unwrap();
        assert_eq!(second.runs.get(), 1);
    }
}
