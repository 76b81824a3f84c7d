//! Greeks shared by the numerical engines.

use ql_core::{errors::Result, Real};
use ql_processes::GeneralizedBlackScholesProcess;
use ql_termstructures::{LocalVolTermStructure, YieldTermStructure};

/// Theta implied by the Black-Scholes equation from value, delta and
/// gamma:
///
/// `θ = r·V - (r - q)·S·Δ - ½σ²S²Γ`
///
/// with short rates and the local volatility at the current spot.
pub fn black_scholes_theta(
    process: &GeneralizedBlackScholesProcess,
    value: Real,
    delta: Real,
    gamma: Real,
) -> Result<Real> {
    let spot = process.state_variable().current_link()?.value()?;
    let r = process.risk_free_rate().current_link()?.zero_rate(0.0)?;
    let q = process.dividend_yield().current_link()?.zero_rate(0.0)?;
    let vol = process.local_volatility()?.local_vol(0.0, spot)?;
    Ok(r * value - (r - q) * spot * delta - 0.5 * vol * vol * spot * spot * gamma)
}

/// Theta per calendar day.
pub fn default_theta_per_day(theta: Real) -> Real {
    theta / 365.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytic_european_engine::tests::market;
    use crate::black_calculator::BlackCalculator;
    use approx::assert_abs_diff_eq;
    use ql_instruments::OptionType;

    #[test]
    fn matches_the_analytic_theta() {
        let m = market(100.0, 0.02, 0.05, 0.25);
        let t: Real = 1.0;
        let forward = 100.0 * ((0.05 - 0.02) * t).exp();
        let black = BlackCalculator::with_type(
            OptionType::Call,
            95.0,
            forward,
            0.25 * t.sqrt(),
            (-0.05 * t).exp(),
        )
        .unwrap();
        let theta = black_scholes_theta(
            &m.process,
            black.value(),
            black.delta(100.0).unwrap(),
            black.gamma(100.0).unwrap(),
        )
        .unwrap();
        assert_abs_diff_eq!(theta, black.theta(100.0, t).unwrap(), epsilon = 1e-8);
        assert_abs_diff_eq!(default_theta_per_day(theta), theta / 365.0, epsilon = 1e-15);
    }
}
