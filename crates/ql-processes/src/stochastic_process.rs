//! `StochasticProcess1D`: base trait for one-dimensional processes.
//!
//! A process `dX = μ(t,X) dt + σ(t,X) dW` is described by its drift (`μ`),
//! diffusion (`σ`), and an `apply` method that advances the state by an
//! increment. The remaining methods default to a first-order Euler step.

use ql_core::{
    errors::{Error, Result},
    Date, Observable, Real, Time,
};

/// A 1-dimensional stochastic process `dX = μ(t,X) dt + σ(t,X) dW`.
///
/// Processes are observable: they notify their dependents when any of the
/// market data they are built on changes.
pub trait StochasticProcess1D: Observable + std::fmt::Debug {
    /// Initial value of the process.
    fn x0(&self) -> Result<Real>;

    /// Drift `μ(t, x)`.
    fn drift(&self, t: Time, x: Real) -> Result<Real>;

    /// Diffusion `σ(t, x)`.
    fn diffusion(&self, t: Time, x: Real) -> Result<Real>;

    /// Expected value `E[x(t0+Δt) | x(t0) = x0]`.
    fn expectation(&self, t0: Time, x0: Real, dt: Time) -> Result<Real> {
        Ok(self.apply(x0, self.drift(t0, x0)? * dt))
    }

    /// Standard deviation of the increment over `Δt`.
    fn std_deviation(&self, t0: Time, x0: Real, dt: Time) -> Result<Real> {
        Ok(self.diffusion(t0, x0)? * dt.sqrt())
    }

    /// Variance of the increment over `Δt`.
    fn variance(&self, t0: Time, x0: Real, dt: Time) -> Result<Real> {
        let sigma = self.diffusion(t0, x0)?;
        Ok(sigma * sigma * dt)
    }

    /// Advance `x0` over `Δt` given a standard normal draw `dw`.
    fn evolve(&self, t0: Time, x0: Real, dt: Time, dw: Real) -> Result<Real> {
        let expectation = self.expectation(t0, x0, dt)?;
        Ok(self.apply(expectation, self.std_deviation(t0, x0, dt)? * dw))
    }

    /// Apply the increment `dx` to `x0`.
    fn apply(&self, x0: Real, dx: Real) -> Real {
        x0 + dx
    }

    /// Model time corresponding to `date`.
    fn time(&self, _date: Date) -> Result<Time> {
        Err(Error::NotImplemented(
            "date/time conversion not supported".into(),
        ))
    }
}
