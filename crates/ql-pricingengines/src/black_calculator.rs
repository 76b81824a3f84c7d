//! Black 1976 calculator.
//!
//! A striked payoff on a forward `F` with total standard deviation `σ√T`
//! and discount factor `D` is valued as
//!
//! `V = D · (F·α + x·β)`
//!
//! where `α` and `β` depend on the payoff kind through `N(d1)` and `N(d2)`,
//! and `x` is the strike-like multiplier (the strike for vanillas, the cash
//! amount for cash-or-nothing, the second strike for gap payoffs). All
//! Greeks follow from the derivatives of `α`, `β` and `x`.

use ql_core::{ensure, errors::Result, fail, Real, Time};
use ql_instruments::{OptionType, Payoff};
use ql_math::solvers1d::{Brent, Solver1D};
use ql_math::{close, normal_cdf, normal_pdf};
use tracing::debug;

/// Closed-form Black prices and sensitivities for one payoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlackCalculator {
    option_type: OptionType,
    strike: Real,
    forward: Real,
    std_dev: Real,
    discount: Real,
    variance: Real,
    d1: Real,
    d2: Real,
    alpha: Real,
    beta: Real,
    dalpha_dd1: Real,
    dbeta_dd2: Real,
    n_d1: Real,
    cum_d1: Real,
    n_d2: Real,
    cum_d2: Real,
    x: Real,
    dx_dstrike: Real,
    dx_ds: Real,
}

impl BlackCalculator {
    /// Calculator for `payoff`.
    ///
    /// Plain vanilla, cash-or-nothing, asset-or-nothing and gap payoffs are
    /// supported.
    pub fn new(payoff: &Payoff, forward: Real, std_dev: Real, discount: Real) -> Result<Self> {
        let (option_type, strike) = payoff.striked()?;
        let mut calc = Self::with_type(option_type, strike, forward, std_dev, discount)?;
        match *payoff {
            Payoff::PlainVanilla { .. } => {}
            Payoff::CashOrNothing {
                option_type,
                cash_payoff,
                ..
            } => {
                calc.alpha = 0.0;
                calc.dalpha_dd1 = 0.0;
                calc.x = cash_payoff;
                calc.dx_dstrike = 0.0;
                match option_type {
                    OptionType::Call => {
                        calc.beta = calc.cum_d2;
                        calc.dbeta_dd2 = calc.n_d2;
                    }
                    OptionType::Put => {
                        calc.beta = 1.0 - calc.cum_d2;
                        calc.dbeta_dd2 = -calc.n_d2;
                    }
                }
            }
            Payoff::AssetOrNothing { option_type, .. } => {
                calc.beta = 0.0;
                calc.dbeta_dd2 = 0.0;
                match option_type {
                    OptionType::Call => {
                        calc.alpha = calc.cum_d1;
                        calc.dalpha_dd1 = calc.n_d1;
                    }
                    OptionType::Put => {
                        calc.alpha = 1.0 - calc.cum_d1;
                        calc.dalpha_dd1 = -calc.n_d1;
                    }
                }
            }
            Payoff::Gap { second_strike, .. } => {
                calc.x = second_strike;
                calc.dx_dstrike = 0.0;
            }
            _ => fail!("unsupported payoff type: {}", payoff.name()),
        }
        Ok(calc)
    }

    /// Calculator for a plain vanilla call or put.
    pub fn with_type(
        option_type: OptionType,
        strike: Real,
        forward: Real,
        std_dev: Real,
        discount: Real,
    ) -> Result<Self> {
        ensure!(strike >= 0.0, "strike ({strike}) must be non-negative");
        ensure!(forward > 0.0, "forward ({forward}) must be positive");
        ensure!(std_dev >= 0.0, "stdDev ({std_dev}) must be non-negative");
        ensure!(discount > 0.0, "discount ({discount}) must be positive");

        let (d1, d2, cum_d1, cum_d2, n_d1, n_d2);
        if std_dev >= Real::EPSILON {
            if close(strike, 0.0) {
                d1 = Real::MAX;
                d2 = Real::MAX;
                cum_d1 = 1.0;
                cum_d2 = 1.0;
                n_d1 = 0.0;
                n_d2 = 0.0;
            } else {
                d1 = (forward / strike).ln() / std_dev + 0.5 * std_dev;
                d2 = d1 - std_dev;
                cum_d1 = normal_cdf(d1);
                cum_d2 = normal_cdf(d2);
                n_d1 = normal_pdf(d1);
                n_d2 = normal_pdf(d2);
            }
        } else if close(forward, strike) {
            d1 = 0.0;
            d2 = 0.0;
            cum_d1 = 0.5;
            cum_d2 = 0.5;
            n_d1 = std::f64::consts::SQRT_2 * std::f64::consts::FRAC_2_SQRT_PI / 2.0;
            n_d2 = n_d1;
        } else if forward > strike {
            d1 = Real::MAX;
            d2 = Real::MAX;
            cum_d1 = 1.0;
            cum_d2 = 1.0;
            n_d1 = 0.0;
            n_d2 = 0.0;
        } else {
            d1 = -Real::MAX;
            d2 = -Real::MAX;
            cum_d1 = 0.0;
            cum_d2 = 0.0;
            n_d1 = 0.0;
            n_d2 = 0.0;
        }

        let (alpha, dalpha_dd1, beta, dbeta_dd2) = match option_type {
            OptionType::Call => (cum_d1, n_d1, -cum_d2, -n_d2),
            OptionType::Put => (cum_d1 - 1.0, n_d1, 1.0 - cum_d2, -n_d2),
        };

        Ok(Self {
            option_type,
            strike,
            forward,
            std_dev,
            discount,
            variance: std_dev * std_dev,
            d1,
            d2,
            alpha,
            beta,
            dalpha_dd1,
            dbeta_dd2,
            n_d1,
            cum_d1,
            n_d2,
            cum_d2,
            x: strike,
            dx_dstrike: 1.0,
            dx_ds: 0.0,
        })
    }

    /// `numerator / (σ√T · scale)`, zero without volatility.
    fn per_std_dev(&self, numerator: Real, scale: Real) -> Real {
        if self.std_dev >= Real::EPSILON {
            numerator / (self.std_dev * scale)
        } else {
            0.0
        }
    }

    /// `1 + d / (σ√T)`, used by the second derivatives.
    fn curvature(&self, d: Real, sign: Real) -> Real {
        if self.std_dev >= Real::EPSILON && d.abs() < Real::MAX {
            1.0 + sign * d / self.std_dev
        } else {
            1.0
        }
    }

    /// Present value.
    pub fn value(&self) -> Real {
        self.discount * (self.forward * self.alpha + self.x * self.beta)
    }

    /// Sensitivity to the forward.
    pub fn delta_forward(&self) -> Real {
        let dalpha = self.per_std_dev(self.dalpha_dd1, self.forward);
        let dbeta = self.per_std_dev(self.dbeta_dd2, self.forward);
        self.discount * (dalpha * self.forward + self.alpha + dbeta * self.x)
    }

    /// Sensitivity to the spot, for a forward proportional to `spot`.
    pub fn delta(&self, spot: Real) -> Result<Real> {
        ensure!(spot > 0.0, "positive spot value required: {spot} not allowed");
        let dforward_ds = self.forward / spot;
        let dalpha_ds = self.per_std_dev(self.dalpha_dd1, spot);
        let dbeta_ds = self.per_std_dev(self.dbeta_dd2, spot);
        Ok(self.discount
            * (dalpha_ds * self.forward
                + self.alpha * dforward_ds
                + dbeta_ds * self.x
                + self.beta * self.dx_ds))
    }

    /// Percentage change in value per percentage change in the forward.
    pub fn elasticity_forward(&self) -> Real {
        Self::elasticity_of(self.value(), self.delta_forward(), self.forward)
    }

    /// Percentage change in value per percentage change in the spot.
    pub fn elasticity(&self, spot: Real) -> Result<Real> {
        Ok(Self::elasticity_of(self.value(), self.delta(spot)?, spot))
    }

    fn elasticity_of(value: Real, delta: Real, level: Real) -> Real {
        if value > Real::EPSILON {
            delta / value * level
        } else if delta.abs() < Real::EPSILON {
            0.0
        } else if delta > 0.0 {
            Real::MAX
        } else {
            -Real::MAX
        }
    }

    /// Second derivative with respect to the forward.
    pub fn gamma_forward(&self) -> Real {
        let dalpha = self.per_std_dev(self.dalpha_dd1, self.forward);
        let dbeta = self.per_std_dev(self.dbeta_dd2, self.forward);
        let d2alpha = -dalpha / self.forward * self.curvature(self.d1, 1.0);
        let d2beta = -dbeta / self.forward * self.curvature(self.d2, 1.0);
        self.discount * (d2alpha * self.forward + 2.0 * dalpha + d2beta * self.x)
    }

    /// Second derivative with respect to the spot.
    pub fn gamma(&self, spot: Real) -> Result<Real> {
        ensure!(spot > 0.0, "positive spot value required: {spot} not allowed");
        let dforward_ds = self.forward / spot;
        let dalpha_ds = self.per_std_dev(self.dalpha_dd1, spot);
        let dbeta_ds = self.per_std_dev(self.dbeta_dd2, spot);
        let d2alpha_ds2 = -dalpha_ds / spot * self.curvature(self.d1, 1.0);
        let d2beta_ds2 = -dbeta_ds / spot * self.curvature(self.d2, 1.0);
        Ok(self.discount
            * (d2alpha_ds2 * self.forward
                + 2.0 * dalpha_ds * dforward_ds
                + d2beta_ds2 * self.x
                + 2.0 * dbeta_ds * self.dx_ds))
    }

    /// Time decay per year, assuming flat rates and volatility to
    /// `maturity`.
    pub fn theta(&self, spot: Real, maturity: Time) -> Result<Real> {
        ensure!(maturity >= 0.0, "maturity ({maturity}) must be non-negative");
        if close(maturity, 0.0) {
            return Ok(0.0);
        }
        Ok(-(self.discount.ln() * self.value()
            + (self.forward / spot).ln() * spot * self.delta(spot)?
            + 0.5 * self.variance * spot * spot * self.gamma(spot)?)
            / maturity)
    }

    /// Time decay per calendar day.
    pub fn theta_per_day(&self, spot: Real, maturity: Time) -> Result<Real> {
        Ok(self.theta(spot, maturity)? / 365.0)
    }

    /// Sensitivity to the volatility.
    pub fn vega(&self, maturity: Time) -> Result<Real> {
        ensure!(maturity >= 0.0, "negative maturity not allowed");
        if self.variance < Real::EPSILON || close(self.strike, 0.0) {
            return Ok(0.0);
        }
        let temp = (self.strike / self.forward).ln() / self.variance;
        let dalpha_dsigma = self.dalpha_dd1 * (temp + 0.5);
        let dbeta_dsigma = self.dbeta_dd2 * (temp - 0.5);
        Ok(self.discount * maturity.sqrt() * (dalpha_dsigma * self.forward + dbeta_dsigma * self.x))
    }

    /// Sensitivity to the risk-free rate.
    pub fn rho(&self, maturity: Time) -> Result<Real> {
        ensure!(maturity >= 0.0, "negative maturity not allowed");
        let dalpha_dr = self.per_std_dev(self.dalpha_dd1, 1.0);
        let dbeta_dr = self.per_std_dev(self.dbeta_dd2, 1.0);
        let temp = dalpha_dr * self.forward + self.alpha * self.forward + dbeta_dr * self.x;
        Ok(maturity * (self.discount * temp - self.value()))
    }

    /// Sensitivity to the dividend yield.
    pub fn dividend_rho(&self, maturity: Time) -> Result<Real> {
        ensure!(maturity >= 0.0, "negative maturity not allowed");
        let dalpha_dq = -self.per_std_dev(self.dalpha_dd1, 1.0);
        let dbeta_dq = -self.per_std_dev(self.dbeta_dd2, 1.0);
        let temp = dalpha_dq * self.forward - self.alpha * self.forward + dbeta_dq * self.x;
        Ok(maturity * self.discount * temp)
    }

    /// Sensitivity to the strike.
    pub fn strike_sensitivity(&self) -> Real {
        let dalpha = -self.per_std_dev(self.dalpha_dd1, self.strike);
        let dbeta = -self.per_std_dev(self.dbeta_dd2, self.strike);
        self.discount * (dalpha * self.forward + dbeta * self.x + self.beta * self.dx_dstrike)
    }

    /// Second derivative with respect to the strike.
    pub fn strike_gamma(&self) -> Real {
        let dalpha = -self.per_std_dev(self.dalpha_dd1, self.strike);
        let dbeta = -self.per_std_dev(self.dbeta_dd2, self.strike);
        let d2alpha = -dalpha / self.strike * self.curvature(self.d1, -1.0);
        let d2beta = -dbeta / self.strike * self.curvature(self.d2, -1.0);
        self.discount * (d2alpha * self.forward + d2beta * self.x + 2.0 * dbeta * self.dx_dstrike)
    }

    /// Risk-neutral probability of finishing in the money under the
    /// bond measure.
    pub fn itm_cash_probability(&self) -> Real {
        match self.option_type {
            OptionType::Call => self.cum_d2,
            OptionType::Put => 1.0 - self.cum_d2,
        }
    }

    /// Probability of finishing in the money under the asset measure.
    pub fn itm_asset_probability(&self) -> Real {
        match self.option_type {
            OptionType::Call => self.cum_d1,
            OptionType::Put => 1.0 - self.cum_d1,
        }
    }

    /// The coefficient of the forward.
    pub fn alpha(&self) -> Real {
        self.alpha
    }

    /// The coefficient of the strike-like multiplier.
    pub fn beta(&self) -> Real {
        self.beta
    }
}

/// Black 1976 price of a call or put.
pub fn black_formula(
    option_type: OptionType,
    strike: Real,
    forward: Real,
    std_dev: Real,
    discount: Real,
) -> Result<Real> {
    ensure!(strike >= 0.0, "strike ({strike}) must be non-negative");
    ensure!(forward > 0.0, "forward ({forward}) must be positive");
    ensure!(std_dev >= 0.0, "stdDev ({std_dev}) must be non-negative");
    ensure!(discount > 0.0, "discount ({discount}) must be positive");
    let phi = option_type.sign();
    if std_dev == 0.0 {
        return Ok((phi * (forward - strike)).max(0.0) * discount);
    }
    if strike == 0.0 {
        return Ok(match option_type {
            OptionType::Call => forward * discount,
            OptionType::Put => 0.0,
        });
    }
    let d1 = (forward / strike).ln() / std_dev + 0.5 * std_dev;
    let d2 = d1 - std_dev;
    let result = discount * phi * (forward * normal_cdf(phi * d1) - strike * normal_cdf(phi * d2));
    Ok(result.max(0.0))
}

/// Standard deviation `σ√T` reproducing a Black price.
///
/// The out-of-the-money side, obtained through put-call parity, is
/// inverted since it has the larger vega-to-price ratio. The search runs
/// with Brent's method on `[0, 24]`.
#[allow(clippy::too_many_arguments)]
pub fn black_formula_implied_std_dev(
    option_type: OptionType,
    strike: Real,
    forward: Real,
    black_price: Real,
    discount: Real,
    guess: Option<Real>,
    accuracy: Real,
    max_evaluations: usize,
) -> Result<Real> {
    ensure!(strike >= 0.0, "strike ({strike}) must be non-negative");
    ensure!(forward > 0.0, "forward ({forward}) must be positive");
    ensure!(discount > 0.0, "discount ({discount}) must be positive");
    ensure!(black_price >= 0.0, "option price ({black_price}) must be non-negative");

    let phi = option_type.sign();
    let other_price = black_price - phi * (forward - strike) * discount;
    ensure!(
        other_price >= 0.0,
        "negative price ({other_price}) of the opposite option implied by put-call parity: \
         no solution exists for {option_type} strike {strike}, forward {forward}, \
         price {black_price}, deflator {discount}"
    );
    let (option_type, price) = match option_type {
        OptionType::Put if strike > forward => (OptionType::Call, other_price),
        OptionType::Call if strike < forward => (OptionType::Put, other_price),
        _ => (option_type, black_price),
    };
    if close(price, 0.0) {
        return Ok(0.0);
    }

    const MAX_STD_DEV: Real = 24.0;
    let guess = match guess {
        Some(g) => {
            ensure!(g >= 0.0, "stdDev guess ({g}) must be non-negative");
            g
        }
        None => (2.0 * std::f64::consts::PI).sqrt() * price / (forward * discount),
    }
    .clamp(1e-4, MAX_STD_DEV - 1e-4);

    let target = price / discount;
    let std_dev = Brent::new().with_max_evaluations(max_evaluations).solve_bracketed(
        |s| Ok(black_formula(option_type, strike, forward, s, 1.0)? - target),
        accuracy,
        guess,
        0.0,
        MAX_STD_DEV,
    )?;
    debug!(std_dev, "implied standard deviation found");
    Ok(std_dev)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn calculator(payoff: &Payoff, s: Real, r: Real, q: Real, vol: Real, t: Time) -> BlackCalculator {
        let forward = s * ((r - q) * t).exp();
        BlackCalculator::new(payoff, forward, vol * t.sqrt(), (-r * t).exp()).unwrap()
    }

    #[test]
    fn vanilla_values() {
        let call = Payoff::plain_vanilla(OptionType::Call, 65.0);
        let value = calculator(&call, 60.0, 0.08, 0.0, 0.30, 0.25).value();
        assert_abs_diff_eq!(value, 2.1334, epsilon = 1e-4);

        let put = Payoff::plain_vanilla(OptionType::Put, 95.0);
        let value = calculator(&put, 100.0, 0.10, 0.05, 0.20, 0.5).value();
        assert_abs_diff_eq!(value, 2.4648, epsilon = 1e-4);
    }

    #[test]
    fn greeks_match_finite_differences() {
        let (s, r, q, vol, t) = (100.0, 0.05, 0.02, 0.25, 0.75);
        for payoff in [
            Payoff::plain_vanilla(OptionType::Call, 105.0),
            Payoff::plain_vanilla(OptionType::Put, 95.0),
            Payoff::cash_or_nothing(OptionType::Call, 100.0, 10.0),
            Payoff::cash_or_nothing(OptionType::Put, 100.0, 10.0),
            Payoff::asset_or_nothing(OptionType::Call, 100.0),
            Payoff::asset_or_nothing(OptionType::Put, 100.0),
            Payoff::gap(OptionType::Call, 100.0, 90.0),
        ] {
            let calc = calculator(&payoff, s, r, q, vol, t);
            let v = |s, r, q, vol, t| calculator(&payoff, s, r, q, vol, t).value();
            let h = 1e-4;

            let delta = (v(s + h, r, q, vol, t) - v(s - h, r, q, vol, t)) / (2.0 * h);
            assert_abs_diff_eq!(calc.delta(s).unwrap(), delta, epsilon = 1e-6);
            let hg = 1e-2;
            let gamma = (v(s + hg, r, q, vol, t) - 2.0 * calc.value() + v(s - hg, r, q, vol, t))
                / (hg * hg);
            assert_abs_diff_eq!(calc.gamma(s).unwrap(), gamma, epsilon = 1e-5);
            let vega = (v(s, r, q, vol + h, t) - v(s, r, q, vol - h, t)) / (2.0 * h);
            assert_abs_diff_eq!(calc.vega(t).unwrap(), vega, epsilon = 1e-5);
            let rho = (v(s, r + h, q, vol, t) - v(s, r - h, q, vol, t)) / (2.0 * h);
            assert_abs_diff_eq!(calc.rho(t).unwrap(), rho, epsilon = 1e-5);
            let div_rho = (v(s, r, q + h, vol, t) - v(s, r, q - h, vol, t)) / (2.0 * h);
            assert_abs_diff_eq!(calc.dividend_rho(t).unwrap(), div_rho, epsilon = 1e-5);
            let theta = -(v(s, r, q, vol, t + h) - v(s, r, q, vol, t - h)) / (2.0 * h);
            assert_abs_diff_eq!(calc.theta(s, t).unwrap(), theta, epsilon = 1e-5);
        }
    }

    #[test]
    fn strike_derivatives_of_a_vanilla() {
        let (forward, std_dev, discount) = (102.0, 0.3, 0.95);
        let v = |k| black_formula(OptionType::Call, k, forward, std_dev, discount).unwrap();
        let calc =
            BlackCalculator::with_type(OptionType::Call, 100.0, forward, std_dev, discount).unwrap();
        let h = 1e-3;
        let dk = (v(100.0 + h) - v(100.0 - h)) / (2.0 * h);
        let d2k = (v(100.0 + h) - 2.0 * v(100.0) + v(100.0 - h)) / (h * h);
        assert_abs_diff_eq!(calc.strike_sensitivity(), dk, epsilon = 1e-7);
        assert_abs_diff_eq!(calc.strike_gamma(), d2k, epsilon = 1e-5);
        // -dV/dK = D·N(d2) for a call.
        assert_abs_diff_eq!(-dk / discount, calc.itm_cash_probability(), epsilon = 1e-7);
    }

    #[test]
    fn forward_greeks_and_elasticity() {
        let calc = BlackCalculator::with_type(OptionType::Put, 100.0, 98.0, 0.2, 0.97).unwrap();
        let v = |f| black_formula(OptionType::Put, 100.0, f, 0.2, 0.97).unwrap();
        let h = 1e-3;
        let df = (v(98.0 + h) - v(98.0 - h)) / (2.0 * h);
        let d2f = (v(98.0 + h) - 2.0 * v(98.0) + v(98.0 - h)) / (h * h);
        assert_abs_diff_eq!(calc.delta_forward(), df, epsilon = 1e-7);
        assert_abs_diff_eq!(calc.gamma_forward(), d2f, epsilon = 1e-5);
        assert_abs_diff_eq!(calc.elasticity_forward(), df / calc.value() * 98.0, epsilon = 1e-6);
        assert!(calc.alpha() < 0.0 && calc.beta() > 0.0);
        assert_abs_diff_eq!(
            calc.itm_cash_probability() + calc.itm_asset_probability(),
            2.0 - normal_cdf(calc.d1) - normal_cdf(calc.d2),
            epsilon = 1e-15
        );
    }

    #[test]
    fn degenerate_inputs() {
        // No volatility: intrinsic value of the forward.
        let itm = BlackCalculator::with_type(OptionType::Call, 90.0, 100.0, 0.0, 0.9).unwrap();
        assert_abs_diff_eq!(itm.value(), 9.0, epsilon = 1e-12);
        assert_abs_diff_eq!(itm.delta_forward(), 0.9, epsilon = 1e-12);
        assert_eq!(itm.vega(1.0).unwrap(), 0.0);
        let otm = BlackCalculator::with_type(OptionType::Call, 110.0, 100.0, 0.0, 0.9).unwrap();
        assert_eq!(otm.value(), 0.0);
        let atm = BlackCalculator::with_type(OptionType::Put, 100.0, 100.0, 0.0, 0.9).unwrap();
        assert_abs_diff_eq!(atm.value(), 0.0, epsilon = 1e-12);
        // Zero strike: the call is the discounted forward.
        let zero = BlackCalculator::with_type(OptionType::Call, 0.0, 100.0, 0.2, 0.9).unwrap();
        assert_abs_diff_eq!(zero.value(), 90.0, epsilon = 1e-12);
        assert_abs_diff_eq!(zero.elasticity_forward(), 1.0, epsilon = 1e-12);

        assert!(BlackCalculator::with_type(OptionType::Call, -1.0, 100.0, 0.2, 0.9).is_err());
        assert!(BlackCalculator::with_type(OptionType::Call, 1.0, 0.0, 0.2, 0.9).is_err());
        assert!(BlackCalculator::with_type(OptionType::Call, 1.0, 100.0, -0.2, 0.9).is_err());
        assert!(BlackCalculator::with_type(OptionType::Call, 1.0, 100.0, 0.2, 0.0).is_err());
        assert!(itm.delta(0.0).is_err());

        let floating = Payoff::floating(OptionType::Call);
        assert!(BlackCalculator::new(&floating, 100.0, 0.2, 0.9).is_err());
        let share = Payoff::super_share(90.0, 110.0, 1.0).unwrap();
        assert!(BlackCalculator::new(&share, 100.0, 0.2, 0.9).is_err());
    }

    #[test]
    fn implied_std_dev_round_trip() {
        for (option_type, strike) in [
            (OptionType::Call, 80.0),
            (OptionType::Call, 120.0),
            (OptionType::Put, 80.0),
            (OptionType::Put, 120.0),
        ] {
            for std_dev in [0.05, 0.3, 1.2] {
                let price = black_formula(option_type, strike, 100.0, std_dev, 0.95).unwrap();
                let implied =
                    black_formula_implied_std_dev(option_type, strike, 100.0, price, 0.95, None, 1e-10, 100)
                        .unwrap();
                assert_abs_diff_eq!(implied, std_dev, epsilon = 1e-7);
            }
        }
        // Below intrinsic value there is no solution.
        assert!(black_formula_implied_std_dev(
            OptionType::Call,
            80.0,
            100.0,
            10.0,
            0.95,
            None,
            1e-8,
            100
        )
        .is_err());
    }
}
