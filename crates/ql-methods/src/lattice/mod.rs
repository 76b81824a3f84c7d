//! Lattice methods for option pricing.
//!
//! * [`TimeGrid`]: the time nodes a lattice is built on
//! * [`BinomialTree`]: recombining binomial trees in seven variants
//! * [`BlackScholesLattice`]: a binomial tree with constant discounting
//! * [`DiscretizedAsset`] / [`Lattice`]: backward induction of an asset
//!   through the lattice, with partial rollbacks that leave the values at
//!   an intermediate layer available to the caller
//! * [`DiscretizedVanillaOption`]: a vanilla option with European,
//!   American or Bermudan exercise

pub mod binomial_tree;
pub mod bs_lattice;
pub mod discretized_option;
pub mod time_grid;

pub use binomial_tree::{BinomialTree, TreeKind};
pub use bs_lattice::BlackScholesLattice;
pub use discretized_option::DiscretizedVanillaOption;
pub use time_grid::TimeGrid;

use ql_core::{ensure, errors::Result, Real, Time};
use ql_math::{close, close_enough, Array};

/// An asset whose values live on the nodes of a lattice layer.
pub trait DiscretizedAsset {
    /// The time of the current layer.
    fn time(&self) -> Time;

    /// Move the asset to another layer time.
    fn set_time(&mut self, t: Time);

    /// Values on the current layer.
    fn values(&self) -> &Array;

    /// Replace the values on the current layer.
    fn set_values(&mut self, values: Array);

    /// Initialize the values on a layer of `size` nodes.
    fn reset(&mut self, size: usize, lattice: &dyn Lattice) -> Result<()>;

    /// Times the lattice must contain as nodes.
    fn mandatory_times(&self) -> Vec<Time>;

    /// Adjustment applied before the asset's own conditions.
    fn pre_adjust_values(&mut self, _lattice: &dyn Lattice) -> Result<()> {
        Ok(())
    }

    /// The asset's own conditions (exercise, coupons...).
    fn post_adjust_values(&mut self, _lattice: &dyn Lattice) -> Result<()> {
        Ok(())
    }

    /// Apply both adjustments.
    fn adjust_values(&mut self, lattice: &dyn Lattice) -> Result<()> {
        self.pre_adjust_values(lattice)?;
        self.post_adjust_values(lattice)
    }

    /// Whether the asset currently sits on the grid node nearest to `t`.
    fn is_on_time(&self, t: Time, lattice: &dyn Lattice) -> Result<bool> {
        let grid = lattice.time_grid();
        Ok(close_enough(grid[grid.index(t)?], self.time()))
    }
}

/// A recombining lattice that assets can be rolled back on.
pub trait Lattice {
    /// The time nodes.
    fn time_grid(&self) -> &TimeGrid;

    /// Number of nodes in layer `i`.
    fn size(&self, i: usize) -> usize;

    /// State variable at node `(i, index)`.
    fn underlying(&self, i: usize, index: usize) -> Real;

    /// Discounted expectation of layer `i + 1` values, one per node of
    /// layer `i`.
    fn stepback(&self, i: usize, values: &Array) -> Array;

    /// State variable on every node of the layer at `t`.
    fn grid(&self, t: Time) -> Result<Array> {
        let i = self.time_grid().index(t)?;
        Ok(Array::from_vec(
            (0..self.size(i)).map(|j| self.underlying(i, j)).collect(),
        ))
    }

    /// Place `asset` on the layer at `t` and initialize its values.
    fn initialize(&self, asset: &mut dyn DiscretizedAsset, t: Time) -> Result<()>
    where
        Self: Sized,
    {
        let i = self.time_grid().index(t)?;
        asset.set_time(t);
        asset.reset(self.size(i), self)
    }

    /// Roll `asset` back to `to` and apply its conditions there.
    fn rollback(&self, asset: &mut dyn DiscretizedAsset, to: Time) -> Result<()>
    where
        Self: Sized,
    {
        self.partial_rollback(asset, to)?;
        asset.adjust_values(self)
    }

    /// Roll `asset` back to `to`, applying its conditions on every
    /// intermediate layer but not on the target one.
    fn partial_rollback(&self, asset: &mut dyn DiscretizedAsset, to: Time) -> Result<()>
    where
        Self: Sized,
    {
        let from = asset.time();
        if close(from, to) {
            return Ok(());
        }
        ensure!(
            from > to,
            "cannot roll the asset back to {to} (it is already at t = {from})"
        );
        let grid = self.time_grid();
        let i_from = grid.index(from)?;
        let i_to = grid.index(to)?;
        for i in (i_to..i_from).rev() {
            let values = self.stepback(i, asset.values());
            asset.set_time(grid[i]);
            asset.set_values(values);
            if i != i_to {
                asset.adjust_values(self)?;
            }
        }
        Ok(())
    }

    /// Value of an asset that has been rolled back to the root.
    fn present_value(&self, asset: &dyn DiscretizedAsset) -> Result<Real> {
        let i = self.time_grid().index(asset.time())?;
        ensure!(
            i == 0,
            "present value requested at t = {} instead of the lattice root",
            asset.time()
        );
        Ok(asset.values()[0])
    }
}
