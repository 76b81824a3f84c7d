//! Payoff values on a log-spot mesh.

use std::cell::RefCell;
use std::rc::Rc;

use ql_core::{errors::Result, Date, Real, Time};
use ql_instruments::{Dividend, Payoff};
use ql_math::{Integrator, SimpsonIntegral};
use ql_termstructures::YieldTermStructure;
use ql_time::DayCounter;

use super::meshers::Fdm1dMesher;

/// Present value at time `t` of the cash dividends still to be paid up to
/// maturity, with the sign of a spot adjustment.
///
/// Each dividend paid at `t_i >= t` is carried back to `t` with the ratio
/// of risk-free to dividend-yield discount factors.
#[derive(Debug)]
pub struct EscrowedDividendAdjustment {
    dividend_times: Vec<Time>,
    amounts: Vec<Real>,
    r_ts: Rc<dyn YieldTermStructure>,
    q_ts: Rc<dyn YieldTermStructure>,
    maturity: Time,
}

impl EscrowedDividendAdjustment {
    /// Adjustment for `schedule`, with times measured from
    /// `reference_date` with `day_counter`.
    pub fn new(
        schedule: &[Dividend],
        r_ts: Rc<dyn YieldTermStructure>,
        q_ts: Rc<dyn YieldTermStructure>,
        reference_date: Date,
        day_counter: &dyn DayCounter,
        maturity: Time,
    ) -> Self {
        Self {
            dividend_times: schedule
                .iter()
                .map(|d| day_counter.year_fraction(reference_date, d.date))
                .collect(),
            amounts: schedule.iter().map(|d| d.amount).collect(),
            r_ts,
            q_ts,
            maturity,
        }
    }

    /// The ex-dividend times.
    pub fn dividend_times(&self) -> &[Time] {
        &self.dividend_times
    }

    /// Minus the value at `t` of the dividends paid in `[t, maturity]`.
    pub fn dividend_adjustment(&self, t: Time) -> Result<Real> {
        let mut adjustment = 0.0;
        for (&div_time, &amount) in self.dividend_times.iter().zip(&self.amounts) {
            if div_time >= t && div_time <= self.maturity {
                let r_ratio = self.r_ts.discount(div_time)? / self.r_ts.discount(t)?;
                let q_ratio = self.q_ts.discount(div_time)? / self.q_ts.discount(t)?;
                adjustment += amount * r_ratio / q_ratio;
            }
        }
        Ok(-adjustment)
    }
}

/// Exercise value of a striked payoff on a mesh of log-spot levels.
///
/// With an escrowed dividend adjustment the mesh carries the spot net of
/// future dividends, and the payoff is evaluated at the grid spot plus
/// the dividends still outstanding at time `t`.
#[derive(Debug)]
pub struct FdmLogInnerValue {
    payoff: Payoff,
    mesher: Fdm1dMesher,
    escrowed: Option<Rc<EscrowedDividendAdjustment>>,
    averages: RefCell<Option<Vec<Real>>>,
}

impl FdmLogInnerValue {
    /// Evaluate `payoff` on `mesher`; the payoff must have a strike.
    pub fn new(payoff: Payoff, mesher: Fdm1dMesher) -> Result<Self> {
        payoff.striked()?;
        Ok(Self {
            payoff,
            mesher,
            escrowed: None,
            averages: RefCell::new(None),
        })
    }

    /// Evaluate `payoff` on a mesh of spots net of escrowed dividends.
    pub fn escrowed(
        payoff: Payoff,
        mesher: Fdm1dMesher,
        adjustment: Rc<EscrowedDividendAdjustment>,
    ) -> Result<Self> {
        let mut calculator = Self::new(payoff, mesher)?;
        calculator.escrowed = Some(adjustment);
        Ok(calculator)
    }

    /// The escrowed dividend adjustment, if any.
    pub fn escrowed_adjustment(&self) -> Option<&Rc<EscrowedDividendAdjustment>> {
        self.escrowed.as_ref()
    }

    fn spot_shift(&self, t: Time) -> Result<Real> {
        match &self.escrowed {
            Some(adjustment) => Ok(-adjustment.dividend_adjustment(t)?),
            None => Ok(0.0),
        }
    }

    /// Payoff at node `i`.
    pub fn inner_value(&self, i: usize, t: Time) -> Result<Real> {
        let shift = self.spot_shift(t)?;
        self.payoff.value(self.mesher.location(i).exp() + shift)
    }

    /// Payoff averaged over the cell around node `i`.
    ///
    /// The cell spans half the distance to each neighbour; boundary nodes
    /// and cells where the integration does not converge use the nodal
    /// value. Averages are computed once and cached.
    pub fn avg_inner_value(&self, i: usize, t: Time) -> Result<Real> {
        if self.averages.borrow().is_none() {
            let averages = (0..self.mesher.size())
                .map(|j| self.cell_average(j, t))
                .collect::<Result<Vec<Real>>>()?;
            *self.averages.borrow_mut() = Some(averages);
        }
        match self.averages.borrow().as_ref() {
            Some(averages) => Ok(averages[i]),
            None => self.inner_value(i, t),
        }
    }

    fn cell_average(&self, i: usize, t: Time) -> Result<Real> {
        let (Some(hm), Some(hp)) = (self.mesher.dminus(i), self.mesher.dplus(i)) else {
            return self.inner_value(i, t);
        };
        let x = self.mesher.location(i);
        let (a, b) = (x - 0.5 * hm, x + 0.5 * hp);
        let shift = self.spot_shift(t)?;
        let f = |x: Real| self.payoff.value(x.exp() + shift).unwrap_or(Real::NAN);
        let (fa, fb) = (f(a), f(b));
        let accuracy = if fa != 0.0 || fb != 0.0 {
            (fa + fb) * 5e-5
        } else {
            1e-4
        };
        match SimpsonIntegral::new(accuracy, 8).integrate(f, a, b) {
            Ok(integral) => Ok(integral / (b - a)),
            Err(_) => self.inner_value(i, t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finite_differences::meshers::Uniform1dMesher;
    use approx::assert_abs_diff_eq;
    use ql_instruments::OptionType;

    #[test]
    fn nodal_and_averaged_values() {
        let mesher = Uniform1dMesher::new(4.0, 5.2, 13).build().unwrap();
        let strike = 4.6_f64.exp();
        let calc =
            FdmLogInnerValue::new(Payoff::plain_vanilla(OptionType::Call, strike), mesher).unwrap();
        assert_eq!(calc.inner_value(0, 1.0).unwrap(), 0.0);
        let top = 5.2_f64.exp() - strike;
        assert_abs_diff_eq!(calc.inner_value(12, 1.0).unwrap(), top, epsilon = 1e-10);
        // Boundary nodes use the nodal value.
        assert_abs_diff_eq!(calc.avg_inner_value(12, 1.0).unwrap(), top, epsilon = 1e-10);
        // The kink at the strike is smoothed: the average is positive.
        let at_strike = calc.avg_inner_value(6, 1.0).unwrap();
        assert!(at_strike > 0.0 && at_strike < 0.05 * strike, "{at_strike}");
        // Away from the kink the average exceeds the convex nodal value.
        assert!(calc.avg_inner_value(9, 1.0).unwrap() > calc.inner_value(9, 1.0).unwrap());
    }

    #[test]
    fn escrowed_dividends_shift_the_payoff() {
        use ql_termstructures::FlatForward;
        use ql_time::Actual365Fixed;

        let today = Date::from_ymd_opt(2025, 1, 1).unwrap();
        let pay_date = Date::from_ymd_opt(2025, 7, 2).unwrap();
        let r_ts = FlatForward::with_rate(today, 0.05, Actual365Fixed);
        let q_ts = FlatForward::with_rate(today, 0.02, Actual365Fixed);
        let adjustment = Rc::new(EscrowedDividendAdjustment::new(
            &[Dividend::new(pay_date, 3.0)],
            r_ts,
            q_ts,
            today,
            &Actual365Fixed,
            1.0,
        ));
        let t_div: f64 = 182.0 / 365.0;
        let expected = -3.0 * (-(0.05 - 0.02) * t_div).exp();
        assert_abs_diff_eq!(adjustment.dividend_adjustment(0.0).unwrap(), expected, epsilon = 1e-12);
        assert_abs_diff_eq!(adjustment.dividend_adjustment(t_div).unwrap(), -3.0, epsilon = 1e-12);
        assert_eq!(adjustment.dividend_adjustment(0.6).unwrap(), 0.0);

        let mesher = Uniform1dMesher::new(4.0, 5.0, 11).build().unwrap();
        let payoff = Payoff::plain_vanilla(OptionType::Call, 50.0);
        let calc = FdmLogInnerValue::escrowed(payoff, mesher, adjustment).unwrap();
        let s0 = 4.0_f64.exp();
        assert_abs_diff_eq!(calc.inner_value(0, 0.0).unwrap(), s0 - expected - 50.0, epsilon = 1e-10);
        assert_abs_diff_eq!(calc.inner_value(0, 1.0).unwrap(), s0 - 50.0, epsilon = 1e-10);
    }

    #[test]
    fn floating_payoff_is_rejected() {
        let mesher = Uniform1dMesher::new(4.0, 5.0, 5).build().unwrap();
        assert!(FdmLogInnerValue::new(Payoff::floating(OptionType::Call), mesher).is_err());
    }
}
