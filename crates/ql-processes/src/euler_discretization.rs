//! Discretization schemes for one-dimensional processes.

use crate::stochastic_process::StochasticProcess1D;
use ql_core::{errors::Result, Real, Time};

/// A rule turning the continuous drift and diffusion of a process into
/// the moments of a finite step.
pub trait Discretization1D: std::fmt::Debug {
    /// Drift of the increment over `Δt`.
    fn drift(&self, process: &dyn StochasticProcess1D, t0: Time, x0: Real, dt: Time) -> Result<Real>;

    /// Standard deviation of the increment over `Δt`.
    fn diffusion(
        &self,
        process: &dyn StochasticProcess1D,
        t0: Time,
        x0: Real,
        dt: Time,
    ) -> Result<Real>;

    /// Variance of the increment over `Δt`.
    fn variance(&self, process: &dyn StochasticProcess1D, t0: Time, x0: Real, dt: Time)
        -> Result<Real>;
}

/// Euler scheme: `μ(t0, x0)·Δt` and `σ(t0, x0)·√Δt`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EulerDiscretization;

impl Discretization1D for EulerDiscretization {
    fn drift(&self, process: &dyn StochasticProcess1D, t0: Time, x0: Real, dt: Time) -> Result<Real> {
        Ok(process.drift(t0, x0)? * dt)
    }

    fn diffusion(
        &self,
        process: &dyn StochasticProcess1D,
        t0: Time,
        x0: Real,
        dt: Time,
    ) -> Result<Real> {
        Ok(process.diffusion(t0, x0)? * dt.sqrt())
    }

    fn variance(
        &self,
        process: &dyn StochasticProcess1D,
        t0: Time,
        x0: Real,
        dt: Time,
    ) -> Result<Real> {
        let sigma = process.diffusion(t0, x0)?;
        Ok(sigma * sigma * dt)
    }
}
