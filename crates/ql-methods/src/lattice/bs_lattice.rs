//! Binomial lattice for Black-Scholes dynamics.

use ql_core::{errors::Result, Rate, Real, Time};
use ql_math::Array;

use super::{BinomialTree, Lattice, TimeGrid};

/// A binomial tree discounted at a constant risk-free rate.
#[derive(Debug, Clone)]
pub struct BlackScholesLattice {
    tree: BinomialTree,
    grid: TimeGrid,
    risk_free_rate: Rate,
    discount: Real,
    pd: Real,
    pu: Real,
}

impl BlackScholesLattice {
    /// Wrap `tree`, spanning `[0, end]`, with discounting at `risk_free_rate`.
    pub fn new(tree: BinomialTree, risk_free_rate: Rate, end: Time) -> Result<Self> {
        let grid = TimeGrid::new(end, tree.steps())?;
        let discount = (-risk_free_rate * grid.dt(0)).exp();
        let pd = tree.probability(0, 0, 0);
        let pu = tree.probability(0, 0, 1);
        Ok(Self {
            tree,
            grid,
            risk_free_rate,
            discount,
            pd,
            pu,
        })
    }

    /// The underlying tree.
    pub fn tree(&self) -> &BinomialTree {
        &self.tree
    }

    /// The discounting rate.
    pub fn risk_free_rate(&self) -> Rate {
        self.risk_free_rate
    }

    /// One-step discount factor.
    pub fn discount(&self) -> Real {
        self.discount
    }
}

impl Lattice for BlackScholesLattice {
    fn time_grid(&self) -> &TimeGrid {
        &self.grid
    }

    fn size(&self, i: usize) -> usize {
        self.tree.size(i)
    }

    fn underlying(&self, i: usize, index: usize) -> Real {
        self.tree.underlying(i, index)
    }

    fn stepback(&self, i: usize, values: &Array) -> Array {
        Array::from_vec(
            (0..self.size(i))
                .map(|j| (self.pd * values[j] + self.pu * values[j + 1]) * self.discount)
                .collect(),
        )
    }
}
