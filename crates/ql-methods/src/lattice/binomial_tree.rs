//! Recombining binomial trees.
//!
//! | Variant | Family | Reference |
//! |---|---|---|
//! | [`BinomialTree::jarrow_rudd`] | equal probabilities | Jarrow & Rudd (1983) |
//! | [`BinomialTree::cox_ross_rubinstein`] | equal jumps | Cox, Ross & Rubinstein (1979) |
//! | [`BinomialTree::additive_eqp`] | equal probabilities | additive EQP |
//! | [`BinomialTree::trigeorgis`] | equal jumps | Trigeorgis (1991) |
//! | [`BinomialTree::tian`] | multiplicative | Tian (1993) |
//! | [`BinomialTree::leisen_reimer`] | multiplicative | Leisen & Reimer (1996) |
//! | [`BinomialTree::joshi4`] | multiplicative | Joshi (2008) |
//!
//! Every variant reads its per-step drift and variance from a process
//! whose drift and diffusion refer to the logarithm of the state variable.

use std::fmt;

use ql_core::{ensure, errors::Result, Real, Time};
use ql_processes::StochasticProcess1D;

/// Selects one of the tree variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeKind {
    /// Jarrow-Rudd.
    JarrowRudd,
    /// Cox-Ross-Rubinstein.
    CoxRossRubinstein,
    /// Additive equal probabilities.
    AdditiveEqp,
    /// Trigeorgis.
    Trigeorgis,
    /// Tian.
    Tian,
    /// Leisen-Reimer.
    LeisenReimer,
    /// Joshi fourth order.
    Joshi4,
}

impl TreeKind {
    /// Every variant, in declaration order.
    pub const ALL: [TreeKind; 7] = [
        TreeKind::JarrowRudd,
        TreeKind::CoxRossRubinstein,
        TreeKind::AdditiveEqp,
        TreeKind::Trigeorgis,
        TreeKind::Tian,
        TreeKind::LeisenReimer,
        TreeKind::Joshi4,
    ];

    /// Build the tree of this kind. `strike` is only read by the
    /// strike-dependent variants.
    pub fn build(
        self,
        process: &dyn StochasticProcess1D,
        end: Time,
        steps: usize,
        strike: Real,
    ) -> Result<BinomialTree> {
        match self {
            TreeKind::JarrowRudd => BinomialTree::jarrow_rudd(process, end, steps),
            TreeKind::CoxRossRubinstein => BinomialTree::cox_ross_rubinstein(process, end, steps),
            TreeKind::AdditiveEqp => BinomialTree::additive_eqp(process, end, steps),
            TreeKind::Trigeorgis => BinomialTree::trigeorgis(process, end, steps),
            TreeKind::Tian => BinomialTree::tian(process, end, steps),
            TreeKind::LeisenReimer => BinomialTree::leisen_reimer(process, end, steps, strike),
            TreeKind::Joshi4 => BinomialTree::joshi4(process, end, steps, strike),
        }
    }
}

impl fmt::Display for TreeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TreeKind::JarrowRudd => "JarrowRudd",
            TreeKind::CoxRossRubinstein => "CoxRossRubinstein",
            TreeKind::AdditiveEqp => "AdditiveEQP",
            TreeKind::Trigeorgis => "Trigeorgis",
            TreeKind::Tian => "Tian",
            TreeKind::LeisenReimer => "LeisenReimer",
            TreeKind::Joshi4 => "Joshi4",
        };
        f.write_str(name)
    }
}

/// How node values are laid out.
#[derive(Debug, Clone, Copy)]
enum NodeLayout {
    /// `x0 * exp(i * drift + (2j - i) * step)`
    EqualProbabilities { drift_per_step: Real, up: Real },
    /// `x0 * exp((2j - i) * step)`
    EqualJumps { dx: Real },
    /// `x0 * down^(i - j) * up^j`
    Multiplicative { up: Real, down: Real },
}

/// A recombining binomial tree approximating a 1-D diffusion.
///
/// The tree has `steps + 1` layers, layer `i` holding `i + 1` nodes.
/// Node `(i, j)` is reached after `j` up-moves and `i - j` down-moves.
#[derive(Debug, Clone)]
pub struct BinomialTree {
    x0: Real,
    dt: Time,
    steps: usize,
    layout: NodeLayout,
    pu: Real,
    pd: Real,
}

/// Spot, step length and per-step log drift.
struct StepParameters {
    x0: Real,
    dt: Time,
    drift_per_step: Real,
}

impl StepParameters {
    fn new(process: &dyn StochasticProcess1D, end: Time, steps: usize) -> Result<Self> {
        ensure!(steps > 0, "at least one time step is required");
        ensure!(end > 0.0, "non-positive tree length ({end}) given");
        let x0 = process.x0()?;
        let dt = end / steps as Real;
        let drift_per_step = process.drift(0.0, x0)? * dt;
        Ok(Self {
            x0,
            dt,
            drift_per_step,
        })
    }
}

fn check_probability(pu: Real) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&pu),
        "negative probability: up-move probability {pu} outside [0, 1]"
    );
    Ok(())
}

fn odd(steps: usize) -> usize {
    if steps % 2 == 1 {
        steps
    } else {
        steps + 1
    }
}

impl BinomialTree {
    /// Number of time steps.
    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Time step length.
    pub fn dt(&self) -> Time {
        self.dt
    }

    /// Initial value of the state variable.
    pub fn x0(&self) -> Real {
        self.x0
    }

    /// Number of nodes in layer `i`.
    pub fn size(&self, i: usize) -> usize {
        i + 1
    }

    /// Index in layer `i + 1` reached from node `index` along `branch`
    /// (0 = down, 1 = up).
    pub fn descendant(&self, _i: usize, index: usize, branch: usize) -> usize {
        index + branch
    }

    /// Value of the state variable at node `(i, index)`.
    pub fn underlying(&self, i: usize, index: usize) -> Real {
        let j = 2.0 * index as Real - i as Real;
        match self.layout {
            NodeLayout::EqualProbabilities { drift_per_step, up } => {
                self.x0 * (i as Real * drift_per_step + j * up).exp()
            }
            NodeLayout::EqualJumps { dx } => self.x0 * (j * dx).exp(),
            NodeLayout::Multiplicative { up, down } => {
                self.x0 * down.powi((i - index) as i32) * up.powi(index as i32)
            }
        }
    }

    /// Transition probability along `branch` (0 = down, 1 = up).
    pub fn probability(&self, _i: usize, _index: usize, branch: usize) -> Real {
        if branch == 1 {
            self.pu
        } else {
            self.pd
        }
    }

    /// Jarrow-Rudd: equal probabilities, step `σ√Δt`.
    pub fn jarrow_rudd(process: &dyn StochasticProcess1D, end: Time, steps: usize) -> Result<Self> {
        let p = StepParameters::new(process, end, steps)?;
        let up = process.std_deviation(0.0, p.x0, p.dt)?;
        Ok(Self {
            x0: p.x0,
            dt: p.dt,
            steps,
            layout: NodeLayout::EqualProbabilities {
                drift_per_step: p.drift_per_step,
                up,
            },
            pu: 0.5,
            pd: 0.5,
        })
    }

    /// Cox-Ross-Rubinstein: `dx = σ√Δt`, `pu = ½ + ½ μΔt / dx`.
    pub fn cox_ross_rubinstein(
        process: &dyn StochasticProcess1D,
        end: Time,
        steps: usize,
    ) -> Result<Self> {
        let p = StepParameters::new(process, end, steps)?;
        let dx = process.std_deviation(0.0, p.x0, p.dt)?;
        let pu = 0.5 + 0.5 * p.drift_per_step / dx;
        check_probability(pu)?;
        Ok(Self {
            x0: p.x0,
            dt: p.dt,
            steps,
            layout: NodeLayout::EqualJumps { dx },
            pu,
            pd: 1.0 - pu,
        })
    }

    /// Additive equal probabilities, step chosen to match the variance.
    pub fn additive_eqp(
        process: &dyn StochasticProcess1D,
        end: Time,
        steps: usize,
    ) -> Result<Self> {
        let p = StepParameters::new(process, end, steps)?;
        let variance = process.variance(0.0, p.x0, p.dt)?;
        let mu = p.drift_per_step;
        let up = -0.5 * mu + 0.5 * (4.0 * variance - 3.0 * mu * mu).sqrt();
        ensure!(
            up.is_finite(),
            "additive EQP tree: drift too large for the variance per step"
        );
        Ok(Self {
            x0: p.x0,
            dt: p.dt,
            steps,
            layout: NodeLayout::EqualProbabilities {
                drift_per_step: mu,
                up,
            },
            pu: 0.5,
            pd: 0.5,
        })
    }

    /// Trigeorgis: `dx = √(σ²Δt + μ²Δt²)`, `pu = ½ + ½ μΔt / dx`.
    pub fn trigeorgis(process: &dyn StochasticProcess1D, end: Time, steps: usize) -> Result<Self> {
        let p = StepParameters::new(process, end, steps)?;
        let variance = process.variance(0.0, p.x0, p.dt)?;
        let mu = p.drift_per_step;
        let dx = (variance + mu * mu).sqrt();
        let pu = 0.5 + 0.5 * mu / dx;
        check_probability(pu)?;
        Ok(Self {
            x0: p.x0,
            dt: p.dt,
            steps,
            layout: NodeLayout::EqualJumps { dx },
            pu,
            pd: 1.0 - pu,
        })
    }

    /// Tian: matches the first three moments of the lognormal step.
    pub fn tian(process: &dyn StochasticProcess1D, end: Time, steps: usize) -> Result<Self> {
        let p = StepParameters::new(process, end, steps)?;
        let q = process.variance(0.0, p.x0, p.dt)?.exp();
        let r = p.drift_per_step.exp() * q.sqrt();
        let root = (q * q + 2.0 * q - 3.0).sqrt();
        let up = 0.5 * r * q * (q + 1.0 + root);
        let down = 0.5 * r * q * (q + 1.0 - root);
        let pu = (r - down) / (up - down);
        check_probability(pu)?;
        Ok(Self {
            x0: p.x0,
            dt: p.dt,
            steps,
            layout: NodeLayout::Multiplicative { up, down },
            pu,
            pd: 1.0 - pu,
        })
    }

    /// Leisen-Reimer with Peizer-Pratt method 2 inversion.
    ///
    /// An even number of steps is rounded up to the next odd number.
    pub fn leisen_reimer(
        process: &dyn StochasticProcess1D,
        end: Time,
        steps: usize,
        strike: Real,
    ) -> Result<Self> {
        Self::strike_centred(process, end, steps, strike, |d, n| {
            peizer_pratt_method2_inversion(d, n)
        })
    }

    /// Joshi's fourth-order tree.
    ///
    /// An even number of steps is rounded up to the next odd number.
    pub fn joshi4(
        process: &dyn StochasticProcess1D,
        end: Time,
        steps: usize,
        strike: Real,
    ) -> Result<Self> {
        Self::strike_centred(process, end, steps, strike, |d, n| {
            joshi4_up_probability((n as Real - 1.0) / 2.0, d)
        })
    }

    fn strike_centred(
        process: &dyn StochasticProcess1D,
        end: Time,
        steps: usize,
        strike: Real,
        up_probability: impl Fn(Real, usize) -> Real,
    ) -> Result<Self> {
        ensure!(strike > 0.0, "strike ({strike}) must be positive");
        let odd_steps = odd(steps);
        let p = StepParameters::new(process, end, odd_steps)?;
        let variance = process.variance(0.0, p.x0, end)?;
        let std_dev = variance.sqrt();
        let n = odd_steps as Real;
        let ermqdt = (p.drift_per_step + 0.5 * variance / n).exp();
        let d2 = ((p.x0 / strike).ln() + p.drift_per_step * n) / std_dev;
        let pu = up_probability(d2, odd_steps);
        check_probability(pu)?;
        let pdash = up_probability(d2 + std_dev, odd_steps);
        let up = ermqdt * pdash / pu;
        let down = (ermqdt - pu * up) / (1.0 - pu);
        Ok(Self {
            x0: p.x0,
            dt: p.dt,
            steps: odd_steps,
            layout: NodeLayout::Multiplicative { up, down },
            pu,
            pd: 1.0 - pu,
        })
    }
}

/// Peizer-Pratt method 2 inversion: maps the quantile `z` to an up
/// probability for an `n`-step tree, `n` odd.
fn peizer_pratt_method2_inversion(z: Real, n: usize) -> Real {
    let n = n as Real;
    let r = z / (n + 1.0 / 3.0 + 0.1 / (n + 1.0));
    let ex = (-r * r * (n + 1.0 / 6.0)).exp();
    let sign = if z > 0.0 { 1.0 } else { -1.0 };
    0.5 + sign * (0.25 * (1.0 - ex)).sqrt()
}

fn joshi4_up_probability(k: Real, dj: Real) -> Real {
    let alpha = dj / 8.0_f64.sqrt();
    let alpha2 = alpha * alpha;
    let alpha3 = alpha * alpha2;
    let alpha5 = alpha3 * alpha2;
    let alpha7 = alpha5 * alpha2;
    let beta = -0.375 * alpha - alpha3;
    let gamma = (5.0 / 6.0) * alpha5 + (13.0 / 12.0) * alpha3 + (25.0 / 128.0) * alpha;
    let delta = -0.1025 * alpha - 0.9285 * alpha3 - 1.43 * alpha5 - 0.5 * alpha7;
    let rootk = k.sqrt();
    0.5 + alpha / rootk
        + beta / (k * rootk)
        + gamma / (k * k * rootk)
        + delta / (k * k * k * rootk)
}
