//! Time grids for lattice methods.

use std::ops::Index;

use ql_core::{ensure, errors::Result, fail, Real, Time};
use ql_math::close_enough;

/// An increasing sequence of times starting at zero.
///
/// Grids built from mandatory times contain each of them exactly; the
/// intervals between consecutive mandatory times are split evenly so that
/// no step exceeds the target step size.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeGrid {
    times: Vec<Time>,
    dt: Vec<Time>,
    mandatory_times: Vec<Time>,
}

impl TimeGrid {
    /// A regular grid of `steps` intervals between 0 and `end`.
    pub fn new(end: Time, steps: usize) -> Result<Self> {
        ensure!(end > 0.0, "negative or null end time ({end}) not allowed");
        ensure!(steps > 0, "at least one time step is required");
        let dt = end / steps as Real;
        let times = (0..=steps).map(|i| dt * i as Real).collect();
        Ok(Self {
            times,
            dt: vec![dt; steps],
            mandatory_times: vec![end],
        })
    }

    /// A grid hitting every time in `mandatory`.
    ///
    /// With `steps == 0` the step size is the smallest gap between the
    /// mandatory times; otherwise it is `last / steps`.
    pub fn with_mandatory_times(mandatory: &[Time], steps: usize) -> Result<Self> {
        ensure!(!mandatory.is_empty(), "empty time sequence");
        let mut mandatory_times = mandatory.to_vec();
        mandatory_times.sort_by(|a, b| a.total_cmp(b));
        mandatory_times.dedup_by(|a, b| close_enough(*a, *b));
        ensure!(mandatory_times[0] >= 0.0, "negative times not allowed");

        let last = mandatory_times[mandatory_times.len() - 1];
        ensure!(last > 0.0, "the last mandatory time must be positive");
        let dt_max = if steps == 0 {
            let mut gaps = vec![mandatory_times[0]];
            gaps.extend(mandatory_times.windows(2).map(|w| w[1] - w[0]));
            gaps.into_iter()
                .filter(|&gap| gap != 0.0)
                .fold(Real::INFINITY, Real::min)
        } else {
            last / steps as Real
        };

        let mut times = vec![0.0];
        let mut period_begin = 0.0;
        for &period_end in &mandatory_times {
            if period_end != 0.0 {
                let n = (((period_end - period_begin) / dt_max + 0.5) as usize).max(1);
                let dt = (period_end - period_begin) / n as Real;
                times.extend((1..=n).map(|k| period_begin + k as Real * dt));
            }
            period_begin = period_end;
        }
        let dt = times.windows(2).map(|w| w[1] - w[0]).collect();
        Ok(Self {
            times,
            dt,
            mandatory_times,
        })
    }

    /// Index of the grid node at `t`.
    ///
    /// Fails unless `t` coincides with a node.
    pub fn index(&self, t: Time) -> Result<usize> {
        let i = self.closest_index(t);
        if close_enough(t, self.times[i]) {
            return Ok(i);
        }
        let first = self.times[0];
        let last = self.times[self.times.len() - 1];
        if t < first {
            fail!(
                "using inadequate time grid: all nodes are later than the required time t = {t} (earliest node is t1 = {first})"
            )
        } else if t > last {
            fail!(
                "using inadequate time grid: all nodes are earlier than the required time t = {t} (latest node is t1 = {last})"
            )
        } else {
            let (j, k) = if t > self.times[i] { (i, i + 1) } else { (i - 1, i) };
            fail!(
                "using inadequate time grid: the nodes closest to the required time t = {t} are t1 = {} and t2 = {}",
                self.times[j],
                self.times[k]
            )
        }
    }

    /// Index of the node nearest to `t`.
    pub fn closest_index(&self, t: Time) -> usize {
        let i = self.times.partition_point(|&x| x < t);
        if i == 0 {
            0
        } else if i == self.times.len() {
            self.times.len() - 1
        } else if self.times[i] - t < t - self.times[i - 1] {
            i
        } else {
            i - 1
        }
    }

    /// The node nearest to `t`.
    pub fn closest_time(&self, t: Time) -> Time {
        self.times[self.closest_index(t)]
    }

    /// The sorted, de-duplicated mandatory times.
    pub fn mandatory_times(&self) -> &[Time] {
        &self.mandatory_times
    }

    /// Length of the `i`-th interval.
    pub fn dt(&self, i: usize) -> Time {
        self.dt[i]
    }

    /// All grid nodes.
    pub fn times(&self) -> &[Time] {
        &self.times
    }

    /// Number of nodes.
    pub fn size(&self) -> usize {
        self.times.len()
    }

    /// Number of intervals.
    pub fn steps(&self) -> usize {
        self.dt.len()
    }

    /// The last node.
    pub fn last(&self) -> Time {
        self.times[self.times.len() - 1]
    }
}

impl Index<usize> for TimeGrid {
    type Output = Time;

    fn index(&self, i: usize) -> &Time {
        &self.times[i]
    }
}
