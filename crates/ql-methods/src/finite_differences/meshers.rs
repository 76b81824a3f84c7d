//! One-dimensional spatial grids.

use std::rc::Rc;

use ql_core::{ensure, errors::Result, Real, Time};
use ql_instruments::Dividend;
use ql_math::interpolations::{Interpolation1D, LinearInterpolation};
use ql_math::{close, normal_cdf_inverse};
use ql_processes::{GeneralizedBlackScholesProcess, StochasticProcess1D};
use ql_termstructures::{BlackVolTermStructure, YieldTermStructure};
use tracing::debug;

/// Grid locations with their forward and backward spacings.
///
/// `dplus(i) = x[i+1] - x[i]` and `dminus(i) = x[i] - x[i-1]`; both are
/// `None` where the neighbour does not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct Fdm1dMesher {
    locations: Vec<Real>,
    dplus: Vec<Option<Real>>,
    dminus: Vec<Option<Real>>,
}

impl Fdm1dMesher {
    /// A mesher over strictly increasing `locations`.
    pub fn from_locations(locations: Vec<Real>) -> Result<Self> {
        ensure!(
            locations.len() >= 2,
            "a mesher needs at least two points, got {}",
            locations.len()
        );
        ensure!(
            locations.windows(2).all(|w| w[0] < w[1]),
            "mesher locations must be strictly increasing"
        );
        let n = locations.len();
        let mut dplus = vec![None; n];
        let mut dminus = vec![None; n];
        for i in 0..n - 1 {
            let h = locations[i + 1] - locations[i];
            dplus[i] = Some(h);
            dminus[i + 1] = Some(h);
        }
        Ok(Self {
            locations,
            dplus,
            dminus,
        })
    }

    /// Number of grid points.
    pub fn size(&self) -> usize {
        self.locations.len()
    }

    /// All grid points.
    pub fn locations(&self) -> &[Real] {
        &self.locations
    }

    /// Grid point `i`.
    pub fn location(&self, i: usize) -> Real {
        self.locations[i]
    }

    /// Forward spacing at `i`.
    pub fn dplus(&self, i: usize) -> Option<Real> {
        self.dplus[i]
    }

    /// Backward spacing at `i`.
    pub fn dminus(&self, i: usize) -> Option<Real> {
        self.dminus[i]
    }
}

/// Equally spaced points between `start` and `end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Uniform1dMesher {
    start: Real,
    end: Real,
    size: usize,
}

impl Uniform1dMesher {
    /// `size` points from `start` to `end`, both included.
    pub fn new(start: Real, end: Real, size: usize) -> Self {
        Self { start, end, size }
    }

    /// Lay out the grid.
    pub fn build(&self) -> Result<Fdm1dMesher> {
        ensure!(
            self.end > self.start,
            "end ({}) must be larger than start ({})",
            self.end,
            self.start
        );
        ensure!(self.size >= 2, "a mesher needs at least two points");
        let dx = (self.end - self.start) / (self.size - 1) as Real;
        let mut locations: Vec<Real> = (0..self.size)
            .map(|i| self.start + i as Real * dx)
            .collect();
        locations[self.size - 1] = self.end;
        Fdm1dMesher::from_locations(locations)
    }
}

/// Points clustered around a concentration point with a sinh transform.
///
/// The grid is `c + density·sinh(c1(1-u) + c2·u)` for uniform `u`, where
/// the density is given relative to the width `end - start`. With
/// `require_c_point` the concentration point itself is a grid node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Concentrating1dMesher {
    start: Real,
    end: Real,
    size: usize,
    c_point: Option<(Real, Real)>,
    require_c_point: bool,
}

impl Concentrating1dMesher {
    /// `size` points from `start` to `end`, uniform until a concentration
    /// point is set.
    pub fn new(start: Real, end: Real, size: usize) -> Self {
        Self {
            start,
            end,
            size,
            c_point: None,
            require_c_point: false,
        }
    }

    /// Cluster points around `point` with relative `density`.
    pub fn concentrate(mut self, point: Real, density: Real) -> Self {
        self.c_point = Some((point, density));
        self
    }

    /// Force the concentration point onto the grid.
    pub fn require_c_point(mut self, require: bool) -> Self {
        self.require_c_point = require;
        self
    }

    /// Lay out the grid.
    pub fn build(&self) -> Result<Fdm1dMesher> {
        let (start, end, size) = (self.start, self.end, self.size);
        ensure!(end > start, "end ({end}) must be larger than start ({start})");
        ensure!(size >= 2, "a mesher needs at least two points");
        let dx = 1.0 / (size - 1) as Real;
        let mut locations = vec![0.0; size];

        match self.c_point {
            Some((point, relative_density)) => {
                ensure!(
                    point >= start && point <= end,
                    "concentration point {point} must be between start ({start}) and end ({end})"
                );
                let density = relative_density * (end - start);
                ensure!(density > 0.0, "density > 0 required, got {density}");
                let c1 = ((start - point) / density).asinh();
                let c2 = ((end - point) / density).asinh();

                let transform = if self.require_c_point {
                    let mut u = vec![0.0];
                    let mut z = vec![0.0];
                    if !close(point, start) && !close(point, end) {
                        let z0 = -c1 / (c2 - c1);
                        let node = (z0 * (size - 1) as Real).round() as i64;
                        let u0 = node.clamp(1, size as i64 - 2) as Real / (size - 1) as Real;
                        u.push(u0);
                        z.push(z0);
                    }
                    u.push(1.0);
                    z.push(1.0);
                    Some(LinearInterpolation::new(&u, &z)?)
                } else {
                    None
                };

                for (i, location) in locations.iter_mut().enumerate().take(size - 1).skip(1) {
                    let ui = i as Real * dx;
                    let li = transform.as_ref().map_or(ui, |f| f.value(ui));
                    *location = point + density * (c1 * (1.0 - li) + c2 * li).sinh();
                }
            }
            None => {
                for (i, location) in locations.iter_mut().enumerate().take(size - 1).skip(1) {
                    *location = start + i as Real * dx * (end - start);
                }
            }
        }
        locations[0] = start;
        locations[size - 1] = end;
        Fdm1dMesher::from_locations(locations)
    }
}

/// Log-spot grid for Black-Scholes problems.
///
/// The range covers the lowest and highest forward of the spot over the
/// option's life, after subtracting cash dividends, widened by
/// `scale_factor · σ√T · N⁻¹(1 - eps)` on both sides. If a concentration
/// point is set and falls inside the range the grid clusters there,
/// otherwise it is uniform.
#[derive(Debug, Clone)]
pub struct FdmBlackScholesMesher {
    size: usize,
    process: Rc<GeneralizedBlackScholesProcess>,
    maturity: Time,
    strike: Real,
    x_min_constraint: Option<Real>,
    x_max_constraint: Option<Real>,
    eps: Real,
    scale_factor: Real,
    c_point: Option<(Real, Real)>,
    dividends: Vec<Dividend>,
    spot_adjustment: Real,
}

impl FdmBlackScholesMesher {
    /// A grid of `size` points for an option on `process` expiring at
    /// `maturity`, with the volatility read at `strike`.
    pub fn new(
        size: usize,
        process: Rc<GeneralizedBlackScholesProcess>,
        maturity: Time,
        strike: Real,
    ) -> Self {
        Self {
            size,
            process,
            maturity,
            strike,
            x_min_constraint: None,
            x_max_constraint: None,
            eps: 0.0001,
            scale_factor: 1.5,
            c_point: None,
            dividends: Vec::new(),
            spot_adjustment: 0.0,
        }
    }

    /// Fix the lower and/or upper log-spot bound.
    pub fn constraints(mut self, x_min: Option<Real>, x_max: Option<Real>) -> Self {
        self.x_min_constraint = x_min;
        self.x_max_constraint = x_max;
        self
    }

    /// Tail probability left outside the grid.
    pub fn eps(mut self, eps: Real) -> Self {
        self.eps = eps;
        self
    }

    /// Multiplier on the confidence width.
    pub fn scale_factor(mut self, scale_factor: Real) -> Self {
        self.scale_factor = scale_factor;
        self
    }

    /// Cluster points around the spot level `point`.
    pub fn concentrate(mut self, point: Real, density: Real) -> Self {
        self.c_point = Some((point, density));
        self
    }

    /// Cash dividends paid during the option's life.
    pub fn dividends(mut self, dividends: &[Dividend]) -> Self {
        self.dividends = dividends.to_vec();
        self
    }

    /// Amount added to the spot before laying out the grid.
    pub fn spot_adjustment(mut self, adjustment: Real) -> Self {
        self.spot_adjustment = adjustment;
        self
    }

    /// Lay out the grid.
    pub fn build(&self) -> Result<Fdm1dMesher> {
        let spot = self.process.x0()?;
        ensure!(spot > 0.0, "negative or null underlying given");
        ensure!(self.maturity > 0.0, "non-positive maturity ({}) given", self.maturity);

        let mut steps: Vec<(Time, Real)> = Vec::new();
        for dividend in &self.dividends {
            let t = self.process.time(dividend.date)?;
            if t >= 0.0 && t <= self.maturity {
                steps.push((t, dividend.amount));
            }
        }
        let intermediate = ((24.0 * self.maturity) as usize).max(2);
        let dt = self.maturity / intermediate as Real;
        steps.extend((1..=intermediate).map(|i| (i as Real * dt, 0.0)));
        steps.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

        let r_ts = self.process.risk_free_rate().current_link()?;
        let q_ts = self.process.dividend_yield().current_link()?;
        let mut last_time = 0.0;
        let mut forward = spot + self.spot_adjustment;
        let mut lowest = forward;
        let mut highest = forward;
        for (t, amount) in steps {
            forward = forward / r_ts.discount(t)? * r_ts.discount(last_time)? * q_ts.discount(t)?
                / q_ts.discount(last_time)?;
            lowest = lowest.min(forward);
            highest = highest.max(forward);
            forward -= amount;
            lowest = lowest.min(forward);
            highest = highest.max(forward);
            last_time = t;
        }
        ensure!(
            lowest > 0.0,
            "spot minus dividends becomes negative or null ({lowest})"
        );

        let norm_inv_eps = normal_cdf_inverse(1.0 - self.eps)?;
        let sigma_sqrt_t = self
            .process
            .black_volatility()
            .current_link()?
            .black_vol(self.maturity, self.strike)?
            * self.maturity.sqrt();
        let width = sigma_sqrt_t * norm_inv_eps * self.scale_factor;
        let x_min = self.x_min_constraint.unwrap_or(lowest.ln() - width);
        let x_max = self.x_max_constraint.unwrap_or(highest.ln() + width);
        debug!(x_min, x_max, size = self.size, "Black-Scholes mesher range");

        match self.c_point {
            Some((point, density)) if point.ln() >= x_min && point.ln() <= x_max => {
                Concentrating1dMesher::new(x_min, x_max, self.size)
                    .concentrate(point.ln(), density)
                    .build()
            }
            _ => Uniform1dMesher::new(x_min, x_max, self.size).build(),
        }
    }
}
