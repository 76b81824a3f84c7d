//! Binomial-tree engine for vanilla options.

use std::rc::Rc;

use ql_core::{
    downgrade_observer, ensure, errors::Result, fail, Handle, Observable, ObservableImpl,
    Observer, Real, Time,
};
use ql_instruments::{
    GenericEngine, OneAssetOptionArguments, OneAssetOptionResults, PricingEngine,
};
use ql_methods::lattice::{
    BlackScholesLattice, DiscretizedAsset, DiscretizedVanillaOption, Lattice, TreeKind,
};
use ql_processes::{GeneralizedBlackScholesProcess, StochasticProcess1D};
use ql_termstructures::{
    BlackConstantVol, BlackVolTermStructure, FlatForward, TermStructure, YieldTermStructure,
};
use tracing::debug;

use crate::greeks::black_scholes_theta;

/// Prices vanilla options with European, American or Bermudan exercise on
/// a binomial tree.
///
/// The curves are flattened to their zero rates and the Black volatility
/// at the spot for the option's maturity, so every step shares the same
/// up/down moves. Delta and gamma are read from the option values on the
/// first two layers after rolling back, and theta follows from the
/// Black-Scholes equation.
#[derive(Debug)]
pub struct BinomialVanillaEngine {
    process: Rc<GeneralizedBlackScholesProcess>,
    tree_kind: TreeKind,
    time_steps: usize,
    engine: GenericEngine<OneAssetOptionArguments, OneAssetOptionResults>,
}

impl BinomialVanillaEngine {
    /// An engine building `tree_kind` trees of `time_steps` steps.
    pub fn new(
        process: Rc<GeneralizedBlackScholesProcess>,
        tree_kind: TreeKind,
        time_steps: usize,
    ) -> Result<Rc<Self>> {
        ensure!(
            time_steps >= 2,
            "at least 2 time steps required, {time_steps} provided"
        );
        let engine = Rc::new(Self {
            process,
            tree_kind,
            time_steps,
            engine: GenericEngine::new(),
        });
        engine
            .process
            .register_observer(downgrade_observer(&engine));
        Ok(engine)
    }

    /// The tree variant.
    pub fn tree_kind(&self) -> TreeKind {
        self.tree_kind
    }

    /// The number of time steps.
    pub fn time_steps(&self) -> usize {
        self.time_steps
    }

    /// A copy of the process with flat curves and volatility.
    fn flattened_process(
        &self,
        maturity: Time,
        spot: Real,
    ) -> Result<(Rc<GeneralizedBlackScholesProcess>, Real)> {
        let r_ts = self.process.risk_free_rate().current_link()?;
        let q_ts = self.process.dividend_yield().current_link()?;
        let vol_ts = self.process.black_volatility().current_link()?;

        let r = r_ts.zero_rate(maturity)?;
        let q = q_ts.zero_rate(maturity)?;
        let vol = vol_ts.black_vol(maturity, spot)?;
        let reference_date = r_ts.reference_date();

        let flat_r: Rc<dyn YieldTermStructure> =
            FlatForward::with_rate(reference_date, r, r_ts.day_counter().clone_box());
        let flat_q: Rc<dyn YieldTermStructure> =
            FlatForward::with_rate(reference_date, q, q_ts.day_counter().clone_box());
        let flat_vol: Rc<dyn BlackVolTermStructure> = BlackConstantVol::with_volatility(
            reference_date,
            vol,
            vol_ts.day_counter().clone_box(),
        );
        let process = GeneralizedBlackScholesProcess::new(
            self.process.state_variable().clone(),
            Handle::new(flat_q),
            Handle::new(flat_r),
            Handle::new(flat_vol),
        );
        Ok((process, r))
    }
}

impl Observable for BinomialVanillaEngine {
    fn observable(&self) -> &ObservableImpl {
        self.engine.observable()
    }
}

impl Observer for BinomialVanillaEngine {
    fn update(&self) -> Result<()> {
        self.notify_observers()
    }
}

impl PricingEngine for BinomialVanillaEngine {
    type Arguments = OneAssetOptionArguments;
    type Results = OneAssetOptionResults;

    fn generic_engine(&self) -> &GenericEngine<Self::Arguments, Self::Results> {
        &self.engine
    }

    fn calculate(&self) -> Result<()> {
        let arguments = self.arguments().clone();
        ensure!(
            arguments.dividends.is_empty(),
            "discrete dividends not supported by the binomial engine"
        );
        let (Some(payoff), Some(exercise)) = (&arguments.payoff, &arguments.exercise) else {
            fail!("incomplete option arguments");
        };
        let (_, strike) = payoff.striked()?;

        let spot = self.process.state_variable().current_link()?.value()?;
        ensure!(spot > 0.0, "negative or null underlying given");
        let maturity = self.process.time(exercise.last_date())?;
        let (process, r) = self.flattened_process(maturity, spot)?;

        let tree = self
            .tree_kind
            .build(&*process, maturity, self.time_steps, strike)?;
        let lattice = BlackScholesLattice::new(tree, r, maturity)?;
        let grid = lattice.time_grid().clone();
        debug!(
            tree = %self.tree_kind,
            steps = self.time_steps,
            maturity,
            "binomial rollback"
        );

        let mut option = DiscretizedVanillaOption::new(&arguments, &*process, Some(&grid))?;
        lattice.initialize(&mut option, maturity)?;

        // Gamma from the three nodes of the second layer.
        lattice.rollback(&mut option, grid[2])?;
        let values = option.values();
        ensure!(values.size() == 3, "expected 3 nodes at the second step");
        let (p2d, p2m, p2u) = (values[0], values[1], values[2]);
        let (s2d, s2m, s2u) = (
            lattice.underlying(2, 0),
            lattice.underlying(2, 1),
            lattice.underlying(2, 2),
        );
        let delta2u = (p2u - p2m) / (s2u - s2m);
        let delta2d = (p2m - p2d) / (s2m - s2d);
        let gamma = (delta2u - delta2d) / ((s2u - s2d) / 2.0);

        // Delta from the two nodes of the first layer.
        lattice.rollback(&mut option, grid[1])?;
        let values = option.values();
        ensure!(values.size() == 2, "expected 2 nodes at the first step");
        let delta = (values[1] - values[0]) / (lattice.underlying(1, 1) - lattice.underlying(1, 0));

        lattice.rollback(&mut option, 0.0)?;
        let value = lattice.present_value(&option)?;

        let theta = black_scholes_theta(&self.process, value, delta, gamma)?;
        let mut results = self.results_mut();
        results.instrument.value = Some(value);
        results.greeks.delta = Some(delta);
        results.greeks.gamma = Some(gamma);
        results.greeks.theta = Some(theta);
        Ok(())
    }
}
