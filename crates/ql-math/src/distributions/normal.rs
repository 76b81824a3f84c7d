//! Normal (Gaussian) distribution.
//!
//! The cumulative and inverse-cumulative functions are expressed through the
//! complementary error function from `statrs`, which keeps full relative
//! accuracy deep in the lower tail.

use std::f64::consts::{FRAC_1_SQRT_2, PI, SQRT_2};

use ql_core::{ensure, errors::Result, Real};
use statrs::function::erf::{erfc, erfc_inv};

/// The standard normal probability density function.
///
/// `φ(x) = exp(-x²/2) / √(2π)`
#[inline]
pub fn normal_pdf(x: Real) -> Real {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// The standard normal cumulative distribution function Φ(x).
#[inline]
pub fn normal_cdf(x: Real) -> Real {
    0.5 * erfc(-x * FRAC_1_SQRT_2)
}

/// The inverse standard normal CDF (probit function).
///
/// Fails unless `0 < p < 1`.
pub fn normal_cdf_inverse(p: Real) -> Result<Real> {
    ensure!(p > 0.0 && p < 1.0, "probability ({p}) must be in (0, 1)");
    Ok(-SQRT_2 * erfc_inv(2.0 * p))
}

/// Normal density with given mean and standard deviation.
#[derive(Debug, Clone, Copy)]
pub struct NormalDistribution {
    average: Real,
    sigma: Real,
}

impl NormalDistribution {
    /// Create the distribution; `sigma` must be positive.
    pub fn new(average: Real, sigma: Real) -> Result<Self> {
        ensure!(sigma > 0.0, "sigma must be greater than 0.0 ({sigma} not allowed)");
        Ok(Self { average, sigma })
    }

    /// Density at `x`.
    pub fn value(&self, x: Real) -> Real {
        normal_pdf((x - self.average) / self.sigma) / self.sigma
    }

    /// First derivative of the density at `x`.
    pub fn derivative(&self, x: Real) -> Real {
        -(x - self.average) / (self.sigma * self.sigma) * self.value(x)
    }
}

impl Default for NormalDistribution {
    fn default() -> Self {
        Self {
            average: 0.0,
            sigma: 1.0,
        }
    }
}

/// Cumulative normal distribution with given mean and standard deviation.
#[derive(Debug, Clone, Copy)]
pub struct CumulativeNormalDistribution {
    average: Real,
    sigma: Real,
}

impl CumulativeNormalDistribution {
    /// Create the distribution; `sigma` must be positive.
    pub fn new(average: Real, sigma: Real) -> Result<Self> {
        ensure!(sigma > 0.0, "sigma must be greater than 0.0 ({sigma} not allowed)");
        Ok(Self { average, sigma })
    }

    /// `P(X <= x)`.
    pub fn value(&self, x: Real) -> Real {
        normal_cdf((x - self.average) / self.sigma)
    }

    /// The density, i.e. the derivative of [`value`](Self::value).
    pub fn derivative(&self, x: Real) -> Real {
        normal_pdf((x - self.average) / self.sigma) / self.sigma
    }
}

impl Default for CumulativeNormalDistribution {
    fn default() -> Self {
        Self {
            average: 0.0,
            sigma: 1.0,
        }
    }
}

/// Inverse of [`CumulativeNormalDistribution`].
#[derive(Debug, Clone, Copy)]
pub struct InverseCumulativeNormal {
    average: Real,
    sigma: Real,
}

impl InverseCumulativeNormal {
    /// Create the inverse; `sigma` must be positive.
    pub fn new(average: Real, sigma: Real) -> Result<Self> {
        ensure!(sigma > 0.0, "sigma must be greater than 0.0 ({sigma} not allowed)");
        Ok(Self { average, sigma })
    }

    /// The `p`-quantile.
    pub fn value(&self, p: Real) -> Result<Real> {
        Ok(self.average + self.sigma * normal_cdf_inverse(p)?)
    }
}

impl Default for InverseCumulativeNormal {
    fn default() -> Self {
        Self {
            average: 0.0,
            sigma: 1.0,
        }
    }
}
