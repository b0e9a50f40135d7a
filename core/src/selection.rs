//! Target selection under a total integration-time budget.
//!
//! Choosing which stars to observe is a 0/1 knapsack: one binary decision
//! per star, a single constraint `Σ xᵢ tᵢ <= max_time` and the objective
//! `max Σ xᵢ ckᵢ`.  The [`StarSelector`] solves it exactly with depth-first
//! branch and bound:
//!
//! - Stars that can never help (`t > max_time` or `ck == 0`) are dropped,
//!   stars with zero integration time are always taken.
//! - The rest are ordered by value density `ck / t`; the Dantzig
//!   (fractional) relaxation of the remaining items bounds every node.
//! - Nodes whose bound cannot beat the incumbent are pruned; the search
//!   ends with optimality proven.
//!
//! An optional wall-clock limit is checked every [`CLOCK_CHECK_MASK`] + 1
//! nodes.  Running out of time is reported as an error, never as a
//! (silently suboptimal) selection.

use std::time::{Duration, Instant};

use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Check the clock every 1024 nodes.
const CLOCK_CHECK_MASK: u64 = 0x3FF;

/// Relative slack on the time budget, so that sets summing to `max_time`
/// up to rounding (`0.1 + 0.2` against `0.3`) still fit.
pub const BUDGET_RTOL: f64 = 1e-12;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors raised by [`StarSelector::solve`].
#[derive(Debug, thiserror::Error)]
pub enum SelectionError {
    #[error("integration-time and ck arrays differ in length ({0} vs {1})")]
    MismatchedLengths(usize, usize),

    #[error("time budget {0} is not a non-negative number of days")]
    InvalidBudget(f64),

    #[error("star {index}: integration time {value} is not a non-negative number")]
    InvalidTime { index: usize, value: f64 },

    #[error("star {index}: ck {value} is not a non-negative number")]
    InvalidValue { index: usize, value: f64 },

    #[error("no proven-optimal selection within {limit:?} (best objective so far {best_objective}, {nodes_explored} nodes)")]
    TimeLimitReached {
        limit: Duration,
        best_objective: f64,
        nodes_explored: u64,
    },
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Counters collected during one solve.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionStatistics {
    /// Search-tree nodes visited.
    pub nodes_explored: u64,
    /// Nodes cut because the relaxation could not beat the incumbent.
    pub prunings_bound: u64,
    /// Nodes cut because the star did not fit in the remaining budget.
    pub prunings_infeasible: u64,
    /// Improving incumbents found.
    pub solutions_found: u64,
    /// Wall-clock time spent in the search.
    pub time_total: Duration,
}

/// A proven-optimal selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Selected star indices, ascending.
    pub indices: Vec<usize>,
    /// `Σ ck` over the selected stars.
    pub objective: f64,
    /// `Σ t` over the selected stars, in days.
    pub total_time: f64,
    pub statistics: SelectionStatistics,
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug)]
struct Item {
    index: usize,
    time: f64,
    value: f64,
}

#[derive(Clone, Copy, Debug)]
struct Frame {
    depth: usize,
    include: bool,
    value: f64,
    time: f64,
}

/// Exact branch-and-bound knapsack solver for star selection.
#[derive(Clone, Debug, Default)]
pub struct StarSelector {
    time_limit: Option<Duration>,
}

impl StarSelector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abort with [`SelectionError::TimeLimitReached`] after `limit`.
    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    /// Select stars maximising `Σ ck` subject to `Σ t <= max_time`.
    pub fn solve(&self, t0: &[f64], max_time: f64, ck: &[f64]) -> Result<Selection, SelectionError> {
        let start = Instant::now();

        if t0.len() != ck.len() {
            return Err(SelectionError::MismatchedLengths(t0.len(), ck.len()));
        }
        if !(max_time >= 0.0) || !max_time.is_finite() {
            return Err(SelectionError::InvalidBudget(max_time));
        }
        if let Some(index) = t0.iter().position(|t| !(t.is_finite() && *t >= 0.0)) {
            return Err(SelectionError::InvalidTime {
                index,
                value: t0[index],
            });
        }
        if let Some(index) = ck.iter().position(|c| !(c.is_finite() && *c >= 0.0)) {
            return Err(SelectionError::InvalidValue {
                index,
                value: ck[index],
            });
        }

        let capacity = max_time * (1.0 + BUDGET_RTOL);
        let mut forced = Vec::new();
        let mut items = Vec::new();
        for (index, (&time, &value)) in t0.iter().zip(ck).enumerate() {
            if value <= 0.0 || time > capacity {
                continue;
            }
            if time == 0.0 {
                forced.push(index);
            } else {
                items.push(Item { index, time, value });
            }
        }
        items.sort_by(|a, b| (b.value / b.time).total_cmp(&(a.value / a.time)));

        debug!(
            "Selecting from {} candidate stars ({} free, {} excluded)",
            items.len(),
            forced.len(),
            t0.len() - items.len() - forced.len()
        );

        let mut search = Search::new(&items, capacity, self.time_limit.map(|l| (start, l)));
        search.run()?;

        let mut indices: Vec<usize> = forced;
        indices.extend(
            items
                .iter()
                .zip(&search.best_set)
                .filter(|(_, taken)| **taken)
                .map(|(item, _)| item.index),
        );
        indices.sort_unstable();

        let objective: f64 = indices.iter().map(|&i| ck[i]).sum();
        let total_time: f64 = indices.iter().map(|&i| t0[i]).sum();
        let mut statistics = search.statistics;
        statistics.time_total = start.elapsed();

        info!(
            "Objective function value: {:.6} ({} stars, {:.3} of {:.3} days, {} nodes)",
            objective,
            indices.len(),
            total_time,
            max_time,
            statistics.nodes_explored
        );

        Ok(Selection {
            indices,
            objective,
            total_time,
            statistics,
        })
    }
}

/// Select stars with the default (unlimited) solver.
pub fn select_obs(t0: &[f64], max_time: f64, ck: &[f64]) -> Result<Selection, SelectionError> {
    StarSelector::new().solve(t0, max_time, ck)
}

/// Mutable state of one depth-first search.
struct Search<'a> {
    items: &'a [Item],
    capacity: f64,
    deadline: Option<(Instant, Duration)>,
    current: Vec<bool>,
    best_set: Vec<bool>,
    best_value: f64,
    statistics: SelectionStatistics,
}

impl<'a> Search<'a> {
    fn new(items: &'a [Item], capacity: f64, deadline: Option<(Instant, Duration)>) -> Self {
        Self {
            items,
            capacity,
            deadline,
            current: vec![false; items.len()],
            best_set: vec![false; items.len()],
            best_value: 0.0,
            statistics: SelectionStatistics::default(),
        }
    }

    /// Dantzig bound: greedily fill the remaining capacity with items from
    /// `from` on, taking a fraction of the first one that does not fit.
    fn upper_bound(&self, from: usize, value: f64, time: f64) -> f64 {
        let mut bound = value;
        let mut room = self.capacity - time;
        for item in &self.items[from..] {
            if item.time <= room {
                room -= item.time;
                bound += item.value;
            } else {
                bound += item.value * room / item.time;
                break;
            }
        }
        bound
    }

    fn check_clock(&self) -> Result<(), SelectionError> {
        if let Some((start, limit)) = self.deadline {
            if self.statistics.nodes_explored & CLOCK_CHECK_MASK == 0 && start.elapsed() >= limit {
                return Err(SelectionError::TimeLimitReached {
                    limit,
                    best_objective: self.best_value,
                    nodes_explored: self.statistics.nodes_explored,
                });
            }
        }
        Ok(())
    }

    fn run(&mut self) -> Result<(), SelectionError> {
        let n = self.items.len();
        if n == 0 {
            return Ok(());
        }

        // The include branch is pushed last so it is explored first.
        let mut stack = vec![
            Frame { depth: 0, include: false, value: 0.0, time: 0.0 },
            Frame { depth: 0, include: true, value: 0.0, time: 0.0 },
        ];

        while let Some(frame) = stack.pop() {
            self.check_clock()?;
            self.statistics.nodes_explored += 1;

            let item = self.items[frame.depth];
            let (value, time) = if frame.include {
                (frame.value + item.value, frame.time + item.time)
            } else {
                (frame.value, frame.time)
            };
            if time > self.capacity {
                self.statistics.prunings_infeasible += 1;
                continue;
            }

            // Ancestors of this frame own current[..depth]; deeper entries
            // are stale and treated as excluded.
            self.current[frame.depth] = frame.include;
            if value > self.best_value {
                self.best_value = value;
                self.best_set[..=frame.depth].copy_from_slice(&self.current[..=frame.depth]);
                self.best_set[frame.depth + 1..].fill(false);
                self.statistics.solutions_found += 1;
            }

            let next = frame.depth + 1;
            if next == n {
                continue;
            }
            if self.upper_bound(next, value, time) <= self.best_value {
                self.statistics.prunings_bound += 1;
                continue;
            }

            stack.push(Frame { depth: next, include: false, value, time });
            stack.push(Frame { depth: next, include: true, value, time });
        }

        Ok(())
    }
}
