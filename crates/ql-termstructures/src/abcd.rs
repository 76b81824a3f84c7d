//! The ABCD instantaneous volatility function.
//!
//! `f(T - t) = [a + b (T - t)] e^{-c (T - t)} + d` is the instantaneous
//! volatility at time `t` of a forward fixing at `T`. The parametrization
//! is popular for caplet and swaption volatilities because it has a hump
//! whose location and height follow directly from the parameters.

use ql_core::{ensure, errors::Result, Real, Time, Volatility};
use ql_math::close;

/// Parameters of the ABCD function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AbcdFunction {
    a: Real,
    b: Real,
    c: Real,
    d: Real,
}

impl Default for AbcdFunction {
    fn default() -> Self {
        Self {
            a: -0.06,
            b: 0.17,
            c: 0.54,
            d: 0.17,
        }
    }
}

impl AbcdFunction {
    /// Create the function, checking `c > 0`, `d > 0` and `a + d > 0`.
    pub fn new(a: Real, b: Real, c: Real, d: Real) -> Result<Self> {
        Self::validate(a, b, c, d)?;
        Ok(Self { a, b, c, d })
    }

    pub(crate) fn unchecked(a: Real, b: Real, c: Real, d: Real) -> Self {
        Self { a, b, c, d }
    }

    /// Check that the parameters give a strictly positive volatility.
    pub fn validate(a: Real, _b: Real, c: Real, d: Real) -> Result<()> {
        ensure!(c > 0.0, "c ({c}) must be positive");
        ensure!(d > 0.0, "d ({d}) must be positive");
        ensure!(a + d > 0.0, "a + d ({a} + {d}) must be positive");
        Ok(())
    }

    /// Parameter `a`.
    pub fn a(&self) -> Real {
        self.a
    }
    /// Parameter `b`.
    pub fn b(&self) -> Real {
        self.b
    }
    /// Parameter `c`.
    pub fn c(&self) -> Real {
        self.c
    }
    /// Parameter `d`.
    pub fn d(&self) -> Real {
        self.d
    }

    /// `f(u) = (a + b u) e^{-c u} + d` for a time-to-fixing `u`.
    pub fn value(&self, u: Time) -> Real {
        if u < 0.0 {
            0.0
        } else {
            (self.a + self.b * u) * (-self.c * u).exp() + self.d
        }
    }

    /// Instantaneous volatility at time `u` of the rate fixing at `big_t`.
    pub fn instantaneous_volatility(&self, u: Time, big_t: Time) -> Volatility {
        self.value(big_t - u)
    }

    /// Instantaneous variance at time `u` of the rate fixing at `big_t`.
    pub fn instantaneous_variance(&self, u: Time, big_t: Time) -> Real {
        let v = self.instantaneous_volatility(u, big_t);
        v * v
    }

    /// Instantaneous covariance at time `u` of the rates fixing at `big_t`
    /// and `s`.
    pub fn instantaneous_covariance(&self, u: Time, big_t: Time, s: Time) -> Real {
        self.instantaneous_volatility(u, big_t) * self.instantaneous_volatility(u, s)
    }

    /// Integral over `[t1, t2]` of the instantaneous covariance of the rates
    /// fixing at `big_t` and `s`.
    pub fn covariance(&self, t1: Time, t2: Time, big_t: Time, s: Time) -> Result<Real> {
        ensure!(t1 <= t2, "integrations bounds ({t1},{t2}) are in reverse order");
        let cut_off = big_t.min(s);
        if t1 >= cut_off {
            return Ok(0.0);
        }
        let cut_off = t2.min(cut_off);
        Ok(self.primitive(cut_off, big_t, s) - self.primitive(t1, big_t, s))
    }

    /// Integral over `[t_min, t_max]` of the instantaneous variance of the
    /// rate fixing at `big_t`.
    pub fn variance(&self, t_min: Time, t_max: Time, big_t: Time) -> Result<Real> {
        self.covariance(t_min, t_max, big_t, big_t)
    }

    /// Average volatility over `[t_min, t_max]` of the rate fixing at
    /// `big_t`.
    pub fn volatility(&self, t_min: Time, t_max: Time, big_t: Time) -> Result<Volatility> {
        if t_max == t_min {
            return Ok(self.instantaneous_volatility(t_max, big_t));
        }
        ensure!(t_max > t_min, "t_max ({t_max}) must be greater than t_min ({t_min})");
        Ok((self.variance(t_min, t_max, big_t)? / (t_max - t_min)).sqrt())
    }

    /// Time-to-fixing at which the volatility peaks.
    pub fn maximum_location(&self) -> Time {
        if self.b <= 0.0 {
            return 0.0;
        }
        ((self.b - self.c * self.a) / (self.c * self.b)).max(0.0)
    }

    /// Volatility at its peak.
    pub fn maximum_volatility(&self) -> Volatility {
        self.value(self.maximum_location())
    }

    /// Volatility of a rate about to fix, `a + d`.
    pub fn short_term_volatility(&self) -> Volatility {
        self.a + self.d
    }

    /// Volatility of a rate fixing far in the future, `d`.
    pub fn long_term_volatility(&self) -> Volatility {
        self.d
    }

    /// Indefinite integral of `f(big_t - t) f(s - t)` in `t`.
    fn primitive(&self, t: Time, big_t: Time, s: Time) -> Real {
        if big_t < t || s < t {
            return 0.0;
        }
        let (a, b, c, d) = (self.a, self.b, self.c, self.d);

        if close(c, 0.0) {
            let v = a + d;
            return t
                * (v * v + v * b * s + v * b * big_t - v * b * t + b * b * s * big_t
                    - 0.5 * b * b * t * (s + big_t)
                    + b * b * t * t / 3.0);
        }

        let k1 = (c * t).exp();
        let k2 = (c * s).exp();
        let k3 = (c * big_t).exp();

        (b * b
            * (-1.0 - 2.0 * c * c * s * big_t - c * (s + big_t)
                + k1 * k1
                    * (1.0 + c * (s + big_t - 2.0 * t) + 2.0 * c * c * (s - t) * (big_t - t)))
            + 2.0
                * c
                * c
                * (2.0 * d * a * (k2 + k3) * (k1 - 1.0)
                    + a * a * (k1 * k1 - 1.0)
                    + 2.0 * c * d * d * k2 * k3 * t)
            + 2.0
                * b
                * c
                * (a * (-1.0 - c * (s + big_t) + k1 * k1 * (1.0 + c * (s + big_t - 2.0 * t)))
                    - 2.0
                        * d
                        * (k3 * (1.0 + c * s) + k2 * (1.0 + c * big_t)
                            - k1 * k3 * (1.0 + c * (s - t))
                            - k1 * k2 * (1.0 + c * (big_t - t)))))
            / (4.0 * c * c * c * k2 * k3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn midpoint_covariance(f: &AbcdFunction, t1: Time, t2: Time, big_t: Time, s: Time) -> Real {
        let n = 20_000;
        let h = (t2 - t1) / n as Real;
        (0..n)
            .map(|i| {
                let u = t1 + (i as Real + 0.5) * h;
                f.instantaneous_covariance(u, big_t, s)
            })
            .sum::<Real>()
            * h
    }

    #[test]
    fn parameter_validation() {
        assert!(AbcdFunction::new(-0.06, 0.17, 0.54, 0.17).is_ok());
        assert!(AbcdFunction::new(0.1, 0.1, -0.5, 0.1).is_err());
        assert!(AbcdFunction::new(0.1, 0.1, 0.5, 0.0).is_err());
        assert!(AbcdFunction::new(-0.3, 0.1, 0.5, 0.2).is_err());
    }

    #[test]
    fn short_long_and_peak() {
        let f = AbcdFunction::default();
        assert_abs_diff_eq!(f.short_term_volatility(), 0.11, epsilon = 1e-15);
        assert_abs_diff_eq!(f.long_term_volatility(), 0.17, epsilon = 1e-15);
        assert_abs_diff_eq!(f.value(0.0), 0.11, epsilon = 1e-15);

        // peak where f'(u) = (b - c(a + b u)) e^{-cu} vanishes
        let u = f.maximum_location();
        assert_abs_diff_eq!(u, 1.0 / 0.54 + 0.06 / 0.17, epsilon = 1e-12);
        assert!(f.maximum_volatility() > f.value(u - 0.1));
        assert!(f.maximum_volatility() > f.value(u + 0.1));

        let decreasing = AbcdFunction::new(0.1, -0.05, 0.5, 0.1).unwrap();
        assert_eq!(decreasing.maximum_location(), 0.0);
        assert_abs_diff_eq!(decreasing.maximum_volatility(), 0.2, epsilon = 1e-15);
    }

    #[test]
    fn covariance_matches_quadrature() {
        let f = AbcdFunction::default();
        let closed = f.covariance(0.3, 1.7, 2.0, 3.5).unwrap();
        assert_abs_diff_eq!(closed, 0.083_405_857_949, epsilon = 1e-10);
        assert_abs_diff_eq!(
            closed,
            midpoint_covariance(&f, 0.3, 1.7, 2.0, 3.5),
            epsilon = 1e-8
        );

        let var = f.variance(0.0, 1.0, 1.0).unwrap();
        assert_abs_diff_eq!(var, midpoint_covariance(&f, 0.0, 1.0, 1.0, 1.0), epsilon = 1e-8);
        assert_abs_diff_eq!(f.volatility(0.0, 1.0, 1.0).unwrap(), var.sqrt(), epsilon = 1e-15);
    }

    #[test]
    fn covariance_stops_at_the_first_fixing() {
        let f = AbcdFunction::default();
        assert_eq!(f.covariance(2.0, 3.0, 1.0, 4.0).unwrap(), 0.0);
        assert_abs_diff_eq!(
            f.covariance(0.0, 5.0, 1.0, 4.0).unwrap(),
            f.covariance(0.0, 1.0, 1.0, 4.0).unwrap(),
            epsilon = 1e-15
        );
        assert!(f.covariance(1.0, 0.5, 2.0, 2.0).is_err());
    }

    #[test]
    fn flat_function_has_flat_volatility() {
        let f = AbcdFunction::new(0.0, 0.0, 1.0, 0.2).unwrap();
        assert_abs_diff_eq!(f.volatility(0.0, 3.0, 3.0).unwrap(), 0.2, epsilon = 1e-14);
        assert_abs_diff_eq!(f.volatility(1.0, 1.0, 3.0).unwrap(), 0.2, epsilon = 1e-15);
    }
}
