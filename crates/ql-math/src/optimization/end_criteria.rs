//! Stopping rules for the optimizers.
//!
//! Termination is reported as an [`EndCriteriaType`] value rather than an
//! error, so callers decide whether e.g. reaching the iteration cap is
//! acceptable.

use std::fmt;

use ql_core::{ensure, errors::Result, Real};

/// Why an optimizer stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EndCriteriaType {
    /// No criterion was met.
    #[default]
    None,
    /// The iteration (or function evaluation) cap was reached.
    MaxIterations,
    /// `x` stopped moving.
    StationaryPoint,
    /// `f(x)` stopped changing.
    StationaryFunctionValue,
    /// `f(x)` fell below the function tolerance in a positive problem.
    StationaryFunctionAccuracy,
    /// The gradient norm vanished.
    ZeroGradientNorm,
    /// The function tolerance is too small to make further progress.
    FunctionEpsilonTooSmall,
    /// Anything else.
    Unknown,
}

impl EndCriteriaType {
    /// Whether this termination counts as convergence.
    pub fn succeeded(self) -> bool {
        matches!(
            self,
            Self::StationaryPoint | Self::StationaryFunctionValue | Self::StationaryFunctionAccuracy
        )
    }
}

impl fmt::Display for EndCriteriaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "None",
            Self::MaxIterations => "MaxIterations",
            Self::StationaryPoint => "StationaryPoint",
            Self::StationaryFunctionValue => "StationaryFunctionValue",
            Self::StationaryFunctionAccuracy => "StationaryFunctionAccuracy",
            Self::ZeroGradientNorm => "ZeroGradientNorm",
            Self::FunctionEpsilonTooSmall => "FunctionEpsilonTooSmall",
            Self::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Tolerances and caps deciding when an optimization stops.
///
/// Stationarity checks only fire after the condition has persisted for
/// more than `max_stationary_state_iterations` consecutive iterations; the
/// caller owns the counter and passes it in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EndCriteria {
    max_iterations: usize,
    max_stationary_state_iterations: usize,
    root_epsilon: Real,
    function_epsilon: Real,
    gradient_norm_epsilon: Real,
}

impl EndCriteria {
    /// Build end criteria.
    ///
    /// `max_stationary_state_iterations` defaults to
    /// `min(max_iterations / 2, 100)` and must end up in
    /// `(1, max_iterations)`. `gradient_norm_epsilon` defaults to
    /// `function_epsilon`.
    pub fn new(
        max_iterations: usize,
        max_stationary_state_iterations: Option<usize>,
        root_epsilon: Real,
        function_epsilon: Real,
        gradient_norm_epsilon: Option<Real>,
    ) -> Result<Self> {
        let max_stationary_state_iterations =
            max_stationary_state_iterations.unwrap_or_else(|| (max_iterations / 2).min(100));
        ensure!(
            max_stationary_state_iterations > 1,
            "max_stationary_state_iterations ({max_stationary_state_iterations}) must be greater than one"
        );
        ensure!(
            max_stationary_state_iterations < max_iterations,
            "max_stationary_state_iterations ({max_stationary_state_iterations}) must be less than \
             max_iterations ({max_iterations})"
        );
        Ok(Self {
            max_iterations,
            max_stationary_state_iterations,
            root_epsilon,
            function_epsilon,
            gradient_norm_epsilon: gradient_norm_epsilon.unwrap_or(function_epsilon),
        })
    }

    /// Iteration cap.
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Consecutive stationary iterations tolerated before stopping.
    pub fn max_stationary_state_iterations(&self) -> usize {
        self.max_stationary_state_iterations
    }

    /// Tolerance on `x`.
    pub fn root_epsilon(&self) -> Real {
        self.root_epsilon
    }

    /// Tolerance on `f(x)`.
    pub fn function_epsilon(&self) -> Real {
        self.function_epsilon
    }

    /// Tolerance on the gradient norm.
    pub fn gradient_norm_epsilon(&self) -> Real {
        self.gradient_norm_epsilon
    }

    /// `MaxIterations` once `iteration` reaches the cap.
    pub fn check_max_iterations(&self, iteration: usize) -> Option<EndCriteriaType> {
        (iteration >= self.max_iterations).then_some(EndCriteriaType::MaxIterations)
    }

    /// `StationaryPoint` once `|x_new - x_old| < root_epsilon` has held for
    /// too long. Resets `stat_state_iterations` when `x` moves.
    pub fn check_stationary_point(
        &self,
        x_old: Real,
        x_new: Real,
        stat_state_iterations: &mut usize,
    ) -> Option<EndCriteriaType> {
        self.check_stationary(
            (x_new - x_old).abs() < self.root_epsilon,
            stat_state_iterations,
            EndCriteriaType::StationaryPoint,
        )
    }

    /// `StationaryFunctionValue` once `|f_new - f_old| < function_epsilon`
    /// has held for too long.
    pub fn check_stationary_function_value(
        &self,
        fx_old: Real,
        fx_new: Real,
        stat_state_iterations: &mut usize,
    ) -> Option<EndCriteriaType> {
        self.check_stationary(
            (fx_new - fx_old).abs() < self.function_epsilon,
            stat_state_iterations,
            EndCriteriaType::StationaryFunctionValue,
        )
    }

    fn check_stationary(
        &self,
        stationary: bool,
        stat_state_iterations: &mut usize,
        kind: EndCriteriaType,
    ) -> Option<EndCriteriaType> {
        if !stationary {
            *stat_state_iterations = 0;
            return None;
        }
        *stat_state_iterations += 1;
        (*stat_state_iterations > self.max_stationary_state_iterations).then_some(kind)
    }

    /// `StationaryFunctionAccuracy` when a positive objective drops below
    /// `function_epsilon`.
    pub fn check_stationary_function_accuracy(
        &self,
        f: Real,
        positive_optimization: bool,
    ) -> Option<EndCriteriaType> {
        (positive_optimization && f < self.function_epsilon)
            .then_some(EndCriteriaType::StationaryFunctionAccuracy)
    }

    /// `ZeroGradientNorm` when the gradient norm drops below tolerance.
    pub fn check_zero_gradient_norm(&self, gradient_norm: Real) -> Option<EndCriteriaType> {
        (gradient_norm < self.gradient_norm_epsilon).then_some(EndCriteriaType::ZeroGradientNorm)
    }

    /// All checks, first hit wins: iteration cap, stationary function
    /// value, function accuracy, zero gradient.
    #[allow(clippy::too_many_arguments)]
    pub fn check(
        &self,
        iteration: usize,
        stat_state_iterations: &mut usize,
        positive_optimization: bool,
        f_old: Real,
        _norm_g_old: Real,
        f_new: Real,
        norm_g_new: Real,
    ) -> Option<EndCriteriaType> {
        self.check_max_iterations(iteration)
            .or_else(|| self.check_stationary_function_value(f_old, f_new, stat_state_iterations))
            .or_else(|| self.check_stationary_function_accuracy(f_new, positive_optimization))
            .or_else(|| self.check_zero_gradient_norm(norm_g_new))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criteria() -> EndCriteria {
        EndCriteria::new(100, Some(3), 1e-8, 1e-8, None).unwrap()
    }

    #[test]
    fn defaults() {
        let ec = EndCriteria::new(1000, None, 1e-8, 1e-6, None).unwrap();
        assert_eq!(ec.max_stationary_state_iterations(), 100);
        assert_eq!(ec.gradient_norm_epsilon(), 1e-6);
        let ec = EndCriteria::new(50, None, 1e-8, 1e-6, Some(1e-3)).unwrap();
        assert_eq!(ec.max_stationary_state_iterations(), 25);
        assert_eq!(ec.gradient_norm_epsilon(), 1e-3);
    }

    #[test]
    fn stationary_bounds_are_enforced() {
        assert!(EndCriteria::new(100, Some(1), 1e-8, 1e-8, None).is_err());
        assert!(EndCriteria::new(100, Some(100), 1e-8, 1e-8, None).is_err());
        assert!(EndCriteria::new(3, None, 1e-8, 1e-8, None).is_err());
    }

    #[test]
    fn stationarity_must_persist() {
        let ec = criteria();
        let mut counter = 0;
        for _ in 0..3 {
            assert_eq!(ec.check_stationary_point(1.0, 1.0, &mut counter), None);
        }
        assert_eq!(
            ec.check_stationary_point(1.0, 1.0, &mut counter),
            Some(EndCriteriaType::StationaryPoint)
        );
        assert_eq!(ec.check_stationary_point(1.0, 2.0, &mut counter), None);
        assert_eq!(counter, 0);
    }

    #[test]
    fn combined_check_prefers_iteration_cap() {
        let ec = criteria();
        let mut counter = 0;
        assert_eq!(
            ec.check(100, &mut counter, true, 1.0, 1.0, 0.0, 0.0),
            Some(EndCriteriaType::MaxIterations)
        );
        assert_eq!(
            ec.check(1, &mut counter, true, 1.0, 1.0, 1e-10, 1.0),
            Some(EndCriteriaType::StationaryFunctionAccuracy)
        );
        assert_eq!(
            ec.check(1, &mut counter, false, 2.0, 1.0, 1.0, 1e-12),
            Some(EndCriteriaType::ZeroGradientNorm)
        );
        assert_eq!(ec.check(1, &mut counter, false, 2.0, 1.0, 1.0, 1.0), None);
    }

    #[test]
    fn success_classification() {
        assert!(EndCriteriaType::StationaryFunctionValue.succeeded());
        assert!(!EndCriteriaType::MaxIterations.succeeded());
        assert!(!EndCriteriaType::ZeroGradientNorm.succeeded());
    }
}
