//! Least-squares calibration end to end: the MINPACK minimizer on
//! synthetic curves and the ABCD fit of a Black volatility term structure.

use approx::assert_abs_diff_eq;
use quantlib::core::Result;
use quantlib::math::optimization::{
    BoundaryConstraint, EndCriteria, LevenbergMarquardt, NoConstraint, OptimizationMethod,
    Problem, ProjectedCostFunction, Simplex,
};
use quantlib::math::Array;
use quantlib::termstructures::{AbcdCalibration, AbcdFunction};

const TIMES: [f64; 12] = [0.25, 0.5, 1.0, 1.5, 2.0, 3.0, 4.0, 5.0, 7.0, 10.0, 15.0, 20.0];

/// Residuals of `a·exp(-b·t)` against a curve generated with a = 2, b = 0.5.
fn decay_residuals(x: &Array) -> Result<Array> {
    Ok(Array::from_vec(
        TIMES
            .iter()
            .map(|&t| x[0] * (-x[1] * t).exp() - 2.0 * (-0.5 * t).exp())
            .collect(),
    ))
}

fn criteria() -> EndCriteria {
    EndCriteria::new(2000, Some(100), 1e-12, 1e-12, None).unwrap()
}

#[test]
fn test_levenberg_marquardt_reaches_a_zero_residual() {
    let cost = decay_residuals;
    let mut problem = Problem::new(&cost, &NoConstraint, Array::from_slice(&[1.0, 0.3]));
    let end = LevenbergMarquardt::default()
        .minimize(&mut problem, &criteria())
        .unwrap();

    assert!(end.succeeded(), "stopped with {end}");
    assert!(problem.function_value().unwrap() < 1e-12);
    assert_abs_diff_eq!(problem.current_value()[0], 2.0, epsilon = 1e-6);
    assert_abs_diff_eq!(problem.current_value()[1], 0.5, epsilon = 1e-6);
}

#[test]
fn test_simplex_agrees_with_levenberg_marquardt() {
    let cost = decay_residuals;
    let constraint = BoundaryConstraint::new(0.0, 10.0);
    let mut problem = Problem::new(&cost, &constraint, Array::from_slice(&[1.0, 0.3]));
    Simplex::new(0.1).minimize(&mut problem, &criteria()).unwrap();

    assert!(problem.function_value().unwrap() < 1e-8);
    assert_abs_diff_eq!(problem.current_value()[0], 2.0, epsilon = 1e-3);
    assert_abs_diff_eq!(problem.current_value()[1], 0.5, epsilon = 1e-3);
}

#[test]
fn test_fixed_parameters_stay_put() {
    let cost = decay_residuals;
    let projected =
        ProjectedCostFunction::new(&cost, Array::from_slice(&[1.0, 0.5]), vec![false, true])
            .unwrap();
    let start = projected.project(&Array::from_slice(&[1.0, 0.5])).unwrap();
    assert_eq!(start.size(), 1);

    let mut problem = Problem::new(&projected, &NoConstraint, start);
    let end = LevenbergMarquardt::default()
        .minimize(&mut problem, &criteria())
        .unwrap();
    assert!(end.succeeded());

    let fitted = projected.include(problem.current_value()).unwrap();
    assert_abs_diff_eq!(fitted[0], 2.0, epsilon = 1e-8);
    assert_eq!(fitted[1], 0.5);
}

#[test]
fn test_abcd_fit_reproduces_the_generating_curve() {
    let generating = AbcdFunction::new(0.02, 0.15, 0.9, 0.12).unwrap();
    let vols: Vec<f64> = TIMES
        .iter()
        .map(|&t| (generating.variance(0.0, t, t).unwrap() / t).sqrt())
        .collect();

    let mut calibration = AbcdCalibration::new(TIMES.to_vec(), vols.clone())
        .unwrap()
        .with_guess(0.01, 0.1, 0.5, 0.1)
        .unwrap();
    let end = calibration.compute().unwrap();

    assert!(end.succeeded(), "stopped with {end}");
    assert!(calibration.error() < 1e-5, "rms error {}", calibration.error());
    for (&t, &vol) in TIMES.iter().zip(&vols) {
        assert_abs_diff_eq!(calibration.value(t), vol, epsilon = 1e-4);
    }
}
