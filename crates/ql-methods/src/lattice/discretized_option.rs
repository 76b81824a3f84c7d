//! Vanilla option rolled back on a lattice.

use ql_core::{errors::Result, fail, Time};
use ql_instruments::{ExerciseType, OneAssetOptionArguments, Payoff};
use ql_math::Array;
use ql_processes::StochasticProcess1D;

use super::{DiscretizedAsset, Lattice, TimeGrid};

/// A vanilla option on a lattice.
///
/// At each layer where exercise is allowed the values are floored at the
/// intrinsic value:
/// * European: only at expiry;
/// * American: on every layer between the first and last exercise times;
/// * Bermudan: on the layers nearest to each exercise date.
#[derive(Debug, Clone)]
pub struct DiscretizedVanillaOption {
    payoff: Payoff,
    exercise_type: ExerciseType,
    stopping_times: Vec<Time>,
    time: Time,
    values: Array,
}

impl DiscretizedVanillaOption {
    /// Prepare the option described by `arguments`, measuring exercise
    /// dates with `process`.
    ///
    /// When `grid` is given every exercise time is moved to its nearest
    /// grid node.
    pub fn new(
        arguments: &OneAssetOptionArguments,
        process: &dyn StochasticProcess1D,
        grid: Option<&TimeGrid>,
    ) -> Result<Self> {
        let Some(payoff) = arguments.payoff.clone() else {
            fail!("no payoff given")
        };
        let Some(exercise) = arguments.exercise.as_ref() else {
            fail!("no exercise given")
        };
        let stopping_times = exercise
            .dates()
            .iter()
            .map(|&date| {
                let t = process.time(date)?;
                Ok(grid.map_or(t, |g| g.closest_time(t)))
            })
            .collect::<Result<Vec<Time>>>()?;
        Ok(Self {
            payoff,
            exercise_type: exercise.exercise_type(),
            stopping_times,
            time: 0.0,
            values: Array::default(),
        })
    }

    fn apply_exercise(&mut self, lattice: &dyn Lattice) -> Result<()> {
        let grid = lattice.grid(self.time)?;
        for j in 0..self.values.size() {
            let intrinsic = self.payoff.value(grid[j])?;
            self.values[j] = self.values[j].max(intrinsic);
        }
        Ok(())
    }
}

impl DiscretizedAsset for DiscretizedVanillaOption {
    fn time(&self) -> Time {
        self.time
    }

    fn set_time(&mut self, t: Time) {
        self.time = t;
    }

    fn values(&self) -> &Array {
        &self.values
    }

    fn set_values(&mut self, values: Array) {
        self.values = values;
    }

    fn reset(&mut self, size: usize, lattice: &dyn Lattice) -> Result<()> {
        self.values = Array::zeros(size);
        self.adjust_values(lattice)
    }

    fn mandatory_times(&self) -> Vec<Time> {
        self.stopping_times.clone()
    }

    fn post_adjust_values(&mut self, lattice: &dyn Lattice) -> Result<()> {
        let now = self.time;
        let exercise_now = match self.exercise_type {
            ExerciseType::American => {
                now >= self.stopping_times[0] && now <= self.stopping_times[1]
            }
            ExerciseType::European => self.is_on_time(self.stopping_times[0], lattice)?,
            ExerciseType::Bermudan => {
                let mut hit = false;
                for &t in &self.stopping_times {
                    hit |= self.is_on_time(t, lattice)?;
                }
                hit
            }
        };
        if exercise_now {
            self.apply_exercise(lattice)?;
        }
        Ok(())
    }
}
