//! Calibration of the ABCD function to a term structure of Black
//! volatilities.
//!
//! The model volatility for expiry `t` is the root-mean-square of the ABCD
//! instantaneous volatility over `[0, t]`. Any of `a, b, c, d` can be held
//! fixed; the others are fitted by least squares (Levenberg-Marquardt by
//! default) on a projected cost function over the free parameters only.
//! `c` and `d` are fitted on a log scale so they stay positive.

use crate::abcd::AbcdFunction;
use ql_core::{ensure, errors::Result, Real, Time, Volatility};
use ql_math::optimization::{
    CostFunction, EndCriteria, EndCriteriaType, LevenbergMarquardt, NoConstraint,
    OptimizationMethod, Problem, ProjectedCostFunction,
};
use ql_math::{normal_pdf, Array};

/// Calibrates [`AbcdFunction`] parameters to market Black volatilities.
pub struct AbcdCalibration {
    times: Vec<Time>,
    black_vols: Vec<Volatility>,
    parameters: [Real; 4],
    fixed: [bool; 4],
    vega_weighted: bool,
    weights: Vec<Real>,
    end_criteria: EndCriteria,
    method: Box<dyn OptimizationMethod>,
    end_criteria_type: EndCriteriaType,
}

impl std::fmt::Debug for AbcdCalibration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AbcdCalibration")
            .field("times", &self.times)
            .field("parameters", &self.parameters)
            .field("fixed", &self.fixed)
            .field("end_criteria_type", &self.end_criteria_type)
            .finish()
    }
}

impl AbcdCalibration {
    /// Set up a calibration to `black_vols` observed at `times`, starting
    /// from the default ABCD guess with every parameter free.
    pub fn new(times: Vec<Time>, black_vols: Vec<Volatility>) -> Result<Self> {
        ensure!(
            times.len() == black_vols.len(),
            "mismatch between number of times ({}) and blackVols ({})",
            times.len(),
            black_vols.len()
        );
        ensure!(!times.is_empty(), "no volatilities given");
        ensure!(
            times.iter().all(|&t| t > 0.0),
            "expiry times must be positive"
        );
        let n = times.len();
        let guess = AbcdFunction::default();
        Ok(Self {
            times,
            black_vols,
            parameters: [guess.a(), guess.b(), guess.c(), guess.d()],
            fixed: [false; 4],
            vega_weighted: false,
            weights: vec![1.0 / n as Real; n],
            end_criteria: EndCriteria::new(1000, Some(100), 1.0e-8, 1.0e-8, Some(1.0e-8))?,
            method: Box::new(LevenbergMarquardt::default()),
            end_criteria_type: EndCriteriaType::None,
        })
    }

    /// Start from `a, b, c, d` instead of the default guess.
    pub fn with_guess(mut self, a: Real, b: Real, c: Real, d: Real) -> Result<Self> {
        AbcdFunction::validate(a, b, c, d)?;
        self.parameters = [a, b, c, d];
        Ok(self)
    }

    /// Hold the flagged parameters at their current values.
    pub fn with_fixed(mut self, a: bool, b: bool, c: bool, d: bool) -> Self {
        self.fixed = [a, b, c, d];
        self
    }

    /// Weight each expiry by its at-the-money Black vega instead of
    /// uniformly.
    pub fn vega_weighted(mut self, vega_weighted: bool) -> Self {
        self.vega_weighted = vega_weighted;
        self
    }

    /// Replace the stopping criteria.
    pub fn with_end_criteria(mut self, end_criteria: EndCriteria) -> Self {
        self.end_criteria = end_criteria;
        self
    }

    /// Replace the optimizer.
    pub fn with_method(mut self, method: Box<dyn OptimizationMethod>) -> Self {
        self.method = method;
        self
    }

    /// Run the calibration and return why the optimizer stopped.
    ///
    /// The fitted parameters must describe a valid ABCD function.
    pub fn compute(&mut self) -> Result<EndCriteriaType> {
        self.weights = self.compute_weights();

        if self.fixed.iter().all(|&f| f) {
            self.end_criteria_type = EndCriteriaType::None;
            tracing::debug!(error = self.error(), "all abcd parameters fixed");
            return Ok(self.end_criteria_type);
        }

        let cost = AbcdError {
            times: &self.times,
            black_vols: &self.black_vols,
            weights: &self.weights,
        };
        let transformed = to_unconstrained(&self.parameters);
        let projected = ProjectedCostFunction::new(&cost, transformed.clone(), self.fixed.to_vec())?;
        let free = projected.project(&transformed)?;
        ensure!(
            free.size() <= self.times.len(),
            "{} free parameters cannot be fitted to {} volatilities",
            free.size(),
            self.times.len()
        );

        let constraint = NoConstraint;
        let mut problem = Problem::new(&projected, &constraint, free);
        let end = self.method.minimize(&mut problem, &self.end_criteria)?;
        let fitted = from_unconstrained(&projected.include(problem.current_value())?);
        AbcdFunction::validate(fitted[0], fitted[1], fitted[2], fitted[3])?;

        self.parameters = fitted;
        self.end_criteria_type = end;
        tracing::debug!(
            a = fitted[0],
            b = fitted[1],
            c = fitted[2],
            d = fitted[3],
            rms_error = self.error(),
            end = %end,
            "abcd calibration finished"
        );
        Ok(end)
    }

    /// The calibrated (or, before [`compute`](Self::compute), the guessed)
    /// function.
    pub fn function(&self) -> Result<AbcdFunction> {
        let [a, b, c, d] = self.parameters;
        AbcdFunction::new(a, b, c, d)
    }

    /// Parameter `a`.
    pub fn a(&self) -> Real {
        self.parameters[0]
    }
    /// Parameter `b`.
    pub fn b(&self) -> Real {
        self.parameters[1]
    }
    /// Parameter `c`.
    pub fn c(&self) -> Real {
        self.parameters[2]
    }
    /// Parameter `d`.
    pub fn d(&self) -> Real {
        self.parameters[3]
    }

    /// Why the last [`compute`](Self::compute) stopped.
    pub fn end_criteria(&self) -> EndCriteriaType {
        self.end_criteria_type
    }

    /// Model Black volatility for expiry `t`.
    pub fn value(&self, t: Time) -> Volatility {
        model_volatility(&self.parameters, t)
    }

    /// Per-expiry factors `k_i = σ_market(t_i) / σ_model(t_i)` that make
    /// the model reprice `black_vols` exactly.
    pub fn k(&self, times: &[Time], black_vols: &[Volatility]) -> Result<Vec<Real>> {
        ensure!(
            times.len() == black_vols.len(),
            "mismatch between number of times ({}) and blackVols ({})",
            times.len(),
            black_vols.len()
        );
        Ok(times
            .iter()
            .zip(black_vols)
            .map(|(&t, &v)| v / self.value(t))
            .collect())
    }

    /// Weighted root-mean-square volatility error.
    pub fn error(&self) -> Real {
        let n = self.times.len() as Real;
        let squared: Real = self
            .errors()
            .iter()
            .zip(&self.weights)
            .map(|(e, w)| e * e * w)
            .sum();
        if self.times.len() > 1 {
            (n * squared / (n - 1.0)).sqrt()
        } else {
            squared.sqrt()
        }
    }

    /// Largest absolute volatility error.
    pub fn max_error(&self) -> Real {
        self.errors().iter().fold(0.0, |m, e| m.max(e.abs()))
    }

    /// Model minus market volatility at each expiry.
    pub fn errors(&self) -> Vec<Real> {
        self.times
            .iter()
            .zip(&self.black_vols)
            .map(|(&t, &v)| self.value(t) - v)
            .collect()
    }

    fn compute_weights(&self) -> Vec<Real> {
        let raw: Vec<Real> = if self.vega_weighted {
            self.times
                .iter()
                .zip(&self.black_vols)
                .map(|(&t, &v)| {
                    let std_dev = v * t.sqrt();
                    t.sqrt() * normal_pdf(0.5 * std_dev)
                })
                .collect()
        } else {
            vec![1.0; self.times.len()]
        };
        let total: Real = raw.iter().sum();
        raw.into_iter().map(|w| w / total).collect()
    }
}

/// Square root of the average ABCD variance over `[0, t]`.
fn model_volatility(p: &[Real; 4], t: Time) -> Volatility {
    let f = AbcdFunction::unchecked(p[0], p[1], p[2], p[3]);
    if t <= 0.0 {
        return f.short_term_volatility();
    }
    f.variance(0.0, t, t)
        .map_or(Real::NAN, |var| (var / t).sqrt())
}

fn to_unconstrained(p: &[Real; 4]) -> Array {
    Array::from_slice(&[p[0], p[1], p[2].ln(), p[3].ln()])
}

fn from_unconstrained(x: &Array) -> [Real; 4] {
    [x[0], x[1], x[2].exp(), x[3].exp()]
}

struct AbcdError<'a> {
    times: &'a [Time],
    black_vols: &'a [Volatility],
    weights: &'a [Real],
}

impl CostFunction for AbcdError<'_> {
    fn values(&self, x: &Array) -> Result<Array> {
        let p = from_unconstrained(x);
        Ok(Array::from_vec(
            self.times
                .iter()
                .zip(self.black_vols)
                .zip(self.weights)
                .map(|((&t, &v), &w)| (model_volatility(&p, t) - v) * w.sqrt())
                .collect(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn market() -> (Vec<Time>, Vec<Volatility>, AbcdFunction) {
        let truth = AbcdFunction::new(0.02, 0.12, 0.8, 0.14).unwrap();
        let times: Vec<Time> = vec![0.5, 1.0, 2.0, 3.0, 5.0, 7.0, 10.0];
        let vols = times
            .iter()
            .map(|&t| (truth.variance(0.0, t, t).unwrap() / t).sqrt())
            .collect();
        (times, vols, truth)
    }

    #[test]
    fn fits_volatilities_generated_by_an_abcd_function() {
        let (times, vols, _) = market();
        let mut calibration = AbcdCalibration::new(times.clone(), vols.clone()).unwrap();
        let end = calibration.compute().unwrap();
        assert_ne!(end, EndCriteriaType::None);
        assert!(calibration.error() < 1e-4, "rms error {}", calibration.error());
        assert!(calibration.max_error() < 1e-4);

        for k in calibration.k(&times, &vols).unwrap() {
            assert_abs_diff_eq!(k, 1.0, epsilon = 1e-3);
        }
    }

    #[test]
    fn fixed_parameters_do_not_move() {
        let (times, vols, truth) = market();
        let mut calibration = AbcdCalibration::new(times, vols)
            .unwrap()
            .with_guess(0.0, 0.1, 0.5, truth.d())
            .unwrap()
            .with_fixed(false, false, false, true);
        calibration.compute().unwrap();
        assert_eq!(calibration.d(), truth.d());
        assert!(calibration.error() < 1e-4);
        assert!(calibration.function().is_ok());
    }

    #[test]
    fn all_fixed_only_measures_the_error() {
        let (times, vols, truth) = market();
        let mut calibration = AbcdCalibration::new(times, vols)
            .unwrap()
            .with_guess(truth.a(), truth.b(), truth.c(), truth.d())
            .unwrap()
            .with_fixed(true, true, true, true)
            .vega_weighted(true);
        assert_eq!(calibration.compute().unwrap(), EndCriteriaType::None);
        assert!(calibration.error() < 1e-12);
        assert_eq!(calibration.errors().len(), 7);
    }

    #[test]
    fn rejects_inconsistent_inputs() {
        assert!(AbcdCalibration::new(vec![1.0, 2.0], vec![0.2]).is_err());
        assert!(AbcdCalibration::new(vec![], vec![]).is_err());
        assert!(AbcdCalibration::new(vec![0.0], vec![0.2]).is_err());

        let mut too_few = AbcdCalibration::new(vec![1.0, 2.0], vec![0.2, 0.21]).unwrap();
        assert!(too_few.compute().is_err());
    }
}
