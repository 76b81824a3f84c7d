//! Nelder-Mead downhill simplex.

use crate::array::Array;
use ql_core::{errors::Result, fail, Real};

use super::{EndCriteria, EndCriteriaType, OptimizationMethod, Problem};

/// Mean distance of the vertices from their centroid.
fn simplex_size(vertices: &[Array]) -> Real {
    let n = vertices.len() as Real;
    let mut center = Array::zeros(vertices[0].size());
    for v in vertices {
        center += v;
    }
    let center = &center * (1.0 / n);
    vertices.iter().map(|v| (v - &center).norm()).sum::<Real>() / n
}

/// Nelder-Mead simplex minimizer.
///
/// The initial simplex is the starting point plus one vertex per axis at
/// distance `lambda` (shortened to stay feasible). The search stops when
/// the simplex shrinks below the end criteria's root epsilon, hits the
/// iteration cap, or can no longer move without leaving the feasible
/// region.
#[derive(Debug, Clone, Copy)]
pub struct Simplex {
    lambda: Real,
}

impl Simplex {
    /// Create a simplex minimizer with initial edge length `lambda`.
    pub fn new(lambda: Real) -> Self {
        Self { lambda }
    }

    /// Initial edge length.
    pub fn lambda(&self) -> Real {
        self.lambda
    }
}

struct State {
    vertices: Vec<Array>,
    values: Vec<Real>,
    sum: Array,
}

impl State {
    /// Reflect the highest vertex through the opposite face, scaled by
    /// `factor`, halving `factor` until the trial point is feasible.
    /// Replaces the vertex when the trial improves on it.
    fn extrapolate(&mut self, problem: &mut Problem<'_>, i_highest: usize, factor: &mut Real) -> Result<Real> {
        let dimensions = (self.values.len() - 1) as Real;
        let mut p_try;
        loop {
            let factor1 = (1.0 - *factor) / dimensions;
            let factor2 = factor1 - *factor;
            p_try = &(&self.sum * factor1) - &(&self.vertices[i_highest] * factor2);
            *factor *= 0.5;
            if problem.constraint().test(&p_try) || factor.abs() <= f64::EPSILON {
                break;
            }
        }
        if factor.abs() <= f64::EPSILON {
            return Ok(self.values[i_highest]);
        }
        *factor *= 2.0;
        let v_try = problem.value(&p_try)?;
        if v_try < self.values[i_highest] {
            self.values[i_highest] = v_try;
            self.sum += &(&p_try - &self.vertices[i_highest]);
            self.vertices[i_highest] = p_try;
        }
        Ok(v_try)
    }
}

impl OptimizationMethod for Simplex {
    fn minimize(&self, problem: &mut Problem<'_>, end_criteria: &EndCriteria) -> Result<EndCriteriaType> {
        let xtol = end_criteria.root_epsilon();
        let mut max_stationary_state_iterations = end_criteria.max_stationary_state_iterations();
        problem.reset();
        let x0 = problem.current_value().clone();
        if !problem.constraint().test(&x0) {
            fail!("initial guess {x0} is not in the feasible region");
        }
        let mut iteration_number = 0;

        let n = x0.size();
        if n == 0 {
            fail!("no variables given");
        }
        let mut vertices = vec![x0; n + 1];
        for i in 0..n {
            let mut direction = Array::zeros(n);
            direction[i] = 1.0;
            problem
                .constraint()
                .update(&mut vertices[i + 1], &direction, self.lambda)?;
        }
        let mut values = Vec::with_capacity(n + 1);
        for v in &vertices {
            values.push(problem.value(v)?);
        }
        let mut state = State {
            vertices,
            values,
            sum: Array::zeros(n),
        };

        loop {
            state.sum = Array::zeros(n);
            for v in &state.vertices {
                state.sum += v;
            }

            // Best, worst and second worst vertices.
            let values = &state.values;
            let mut i_lowest = 0;
            let (mut i_highest, mut i_next_highest) = if values[0] < values[1] { (1, 0) } else { (0, 1) };
            for i in 1..=n {
                if values[i] > values[i_highest] {
                    i_next_highest = i_highest;
                    i_highest = i;
                } else if values[i] > values[i_next_highest] && i != i_highest {
                    i_next_highest = i;
                }
                if values[i] < values[i_lowest] {
                    i_lowest = i;
                }
            }

            let size = simplex_size(&state.vertices);
            iteration_number += 1;
            if size < xtol || end_criteria.check_max_iterations(iteration_number).is_some() {
                let mut ec_type = end_criteria
                    .check_stationary_point(0.0, 0.0, &mut max_stationary_state_iterations)
                    .unwrap_or(EndCriteriaType::None);
                if let Some(t) = end_criteria.check_max_iterations(iteration_number) {
                    ec_type = t;
                }
                problem.set_function_value(state.values[i_lowest]);
                problem.set_current_value(state.vertices[i_lowest].clone());
                tracing::debug!(
                    iterations = iteration_number,
                    simplex_size = size,
                    end_criteria = %ec_type,
                    "simplex finished"
                );
                return Ok(ec_type);
            }

            let mut factor = -1.0;
            let mut v_try = state.extrapolate(problem, i_highest, &mut factor)?;
            if v_try <= state.values[i_lowest] && factor == -1.0 {
                factor = 2.0;
                state.extrapolate(problem, i_highest, &mut factor)?;
            } else if factor.abs() > f64::EPSILON && v_try >= state.values[i_next_highest] {
                let v_save = state.values[i_highest];
                factor = 0.5;
                v_try = state.extrapolate(problem, i_highest, &mut factor)?;
                if v_try >= v_save && factor.abs() > f64::EPSILON {
                    // Shrink toward the best vertex.
                    for i in 0..=n {
                        if i != i_lowest {
                            let shrunk = &(&state.vertices[i] + &state.vertices[i_lowest]) * 0.5;
                            state.values[i] = problem.value(&shrunk)?;
                            state.vertices[i] = shrunk;
                        }
                    }
                }
            }

            if factor.abs() <= f64::EPSILON {
                problem.set_function_value(state.values[i_lowest]);
                problem.set_current_value(state.vertices[i_lowest].clone());
                tracing::debug!(iterations = iteration_number, "simplex cannot move inside the constraint");
                return Ok(EndCriteriaType::StationaryFunctionValue);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimization::{BoundaryConstraint, Constraint, CostFunction, NoConstraint};
    use approx::assert_abs_diff_eq;

    struct Bowl;

    impl CostFunction for Bowl {
        fn values(&self, x: &Array) -> Result<Array> {
            Ok(Array::from_slice(&[x[0] - 1.0, 2.0 * (x[1] + 0.5)]))
        }
    }

    #[test]
    fn finds_the_bottom_of_a_bowl() {
        let ec = EndCriteria::new(10_000, Some(100), 1e-10, 1e-10, None).unwrap();
        let mut problem = Problem::new(&Bowl, &NoConstraint, Array::from_slice(&[3.0, 3.0]));
        let result = Simplex::new(0.5).minimize(&mut problem, &ec).unwrap();
        assert_eq!(result, EndCriteriaType::StationaryPoint);
        assert_abs_diff_eq!(problem.current_value()[0], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(problem.current_value()[1], -0.5, epsilon = 1e-6);
        assert!(problem.function_value().unwrap() < 1e-10);
    }

    #[test]
    fn iteration_cap_is_reported() {
        let ec = EndCriteria::new(5, Some(2), 1e-12, 1e-12, None).unwrap();
        let mut problem = Problem::new(&Bowl, &NoConstraint, Array::from_slice(&[3.0, 3.0]));
        let result = Simplex::new(0.5).minimize(&mut problem, &ec).unwrap();
        assert_eq!(result, EndCriteriaType::MaxIterations);
    }

    #[test]
    fn infeasible_start_is_rejected() {
        let ec = EndCriteria::new(100, None, 1e-8, 1e-8, None).unwrap();
        let bounds = BoundaryConstraint::new(0.0, 1.0);
        let mut problem = Problem::new(&Bowl, &bounds, Array::from_slice(&[3.0, 3.0]));
        assert!(Simplex::new(0.5).minimize(&mut problem, &ec).is_err());
    }

    #[test]
    fn respects_box_constraint() {
        let ec = EndCriteria::new(10_000, Some(100), 1e-10, 1e-10, None).unwrap();
        let bounds = BoundaryConstraint::new(0.0, 10.0);
        let mut problem = Problem::new(&Bowl, &bounds, Array::from_slice(&[3.0, 3.0]));
        Simplex::new(0.5).minimize(&mut problem, &ec).unwrap();
        let x = problem.current_value();
        assert!(bounds.test(x));
        assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-2);
        assert_abs_diff_eq!(x[1], 0.0, epsilon = 1e-2);
    }
}
