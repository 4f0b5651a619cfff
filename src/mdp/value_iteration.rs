//! Value iteration over a [`GridMdp`].
//!
//! Each sweep applies the Bellman optimality update to every state using the
//! values of the previous sweep (a synchronous, Jacobi-style update):
//!
//! ```text
//! V'(s) = max_a sum_{s'} P(s' | s, a) * (R(s') + gamma * V(s'))
//! ```
//!
//! States without legal moves (terminals, and active cells walled in on all
//! sides) simply take their own reward. Sweeping stops once the largest change
//! over the states that have moves drops below `epsilon`. A snapshot of the
//! value grid is kept after every sweep.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::mdp::config::{Progress, SolveStats, SolverConfig};
use crate::mdp::grid::{Grid, ValueGrid};
use crate::mdp::model::{CellType, GridMdp, MdpError};
use crate::mdp::policy::{fixed_cell, PolicyCell, PolicyGrid};

/// Q-values closer than this to the best one count as tied.
pub const TIE_TOLERANCE: f64 = 1e-8;

/// Output of a value-iteration solve.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueIterationResult {
    /// Value grid after every sweep, oldest first. Never empty.
    pub history: Vec<ValueGrid>,
    /// Greedy policy under the final values.
    pub policy: PolicyGrid,
    /// Solve statistics.
    pub stats: SolveStats,
}

impl ValueIterationResult {
    /// The converged value grid.
    pub fn values(&self) -> &ValueGrid {
        // `solve` always records at least one sweep.
        &self.history[self.history.len() - 1]
    }
}

/// Value-iteration solver.
///
/// # Example
/// ```ignore
/// let mut solver = ValueIteration::new(mdp, SolverConfig::default());
/// let result = solver.solve();
/// println!("{} sweeps", result.stats.sweeps);
/// ```
#[derive(Debug, Clone)]
pub struct ValueIteration {
    mdp: GridMdp,
    config: SolverConfig,
    values: ValueGrid,
    history: Vec<ValueGrid>,
    sweeps: u64,
}

impl ValueIteration {
    /// Create a solver starting from an all-zero value grid.
    ///
    /// The model's own slip probability and discount are used; `config`
    /// supplies the convergence threshold and sweep cap.
    pub fn new(mdp: GridMdp, config: SolverConfig) -> Self {
        let values = mdp.zero_values();
        Self {
            mdp,
            config,
            values,
            history: Vec::new(),
            sweeps: 0,
        }
    }

    /// Run a single synchronous sweep and return its largest value change.
    pub fn run_sweep(&mut self) -> f64 {
        self.sweeps += 1;
        let previous = self.values.clone();
        let mdp = &self.mdp;
        let mut delta: f64 = 0.0;

        for state in mdp.states() {
            let actions = mdp.actions(state);
            if actions.is_empty() {
                self.values.set(state.index, mdp.reward(state));
                continue;
            }

            let best = actions
                .iter()
                .map(|&a| mdp.q_value(state, a, &previous))
                .fold(f64::NEG_INFINITY, f64::max);
            delta = delta.max((best - previous.at(state.index)).abs());
            self.values.set(state.index, best);
        }

        self.history.push(self.values.clone());
        debug!(sweep = self.sweeps, delta, "value iteration sweep");
        delta
    }

    /// Sweep until convergence and extract the greedy policy.
    pub fn solve(&mut self) -> ValueIterationResult {
        self.solve_with_callback(|_| {})
    }

    /// Like [`ValueIteration::solve`], calling `callback` after every sweep.
    pub fn solve_with_callback<F>(&mut self, mut callback: F) -> ValueIterationResult
    where
        F: FnMut(&Progress),
    {
        if self.mdp.discount_factor() >= 1.0 {
            warn!(
                discount = self.mdp.discount_factor(),
                "discount factor >= 1, value iteration may not converge"
            );
        }

        let start_time = Instant::now();
        let (converged, final_delta) = loop {
            let delta = self.run_sweep();
            callback(&Progress {
                sweeps: self.sweeps,
                policy_iteration: 0,
                delta,
                changed_states: 0,
            });

            if delta < self.config.epsilon {
                break (true, delta);
            }
            if self.config.sweep_cap_reached(self.sweeps) {
                warn!(sweeps = self.sweeps, delta, "sweep cap reached before convergence");
                break (false, delta);
            }
        };

        let stats = SolveStats {
            sweeps: self.sweeps,
            policy_iterations: 0,
            converged,
            final_delta,
            elapsed_seconds: start_time.elapsed().as_secs_f64(),
        };
        info!(sweeps = stats.sweeps, converged, "value iteration finished");

        ValueIterationResult {
            history: std::mem::take(&mut self.history),
            policy: greedy_policy(&self.mdp, &self.values),
            stats,
        }
    }

    /// Current value grid.
    pub fn values(&self) -> &ValueGrid {
        &self.values
    }

    /// Sweeps run so far.
    pub fn sweeps(&self) -> u64 {
        self.sweeps
    }

    /// Get reference to the model.
    pub fn mdp(&self) -> &GridMdp {
        &self.mdp
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }
}

/// Greedy policy for `values`.
///
/// Every move whose Q-value is within [`TIE_TOLERANCE`] of the best counts as
/// optimal; one optimal move is recorded as that move, several as
/// [`PolicyCell::Ambiguous`]. Active cells without legal moves are marked
/// terminal, matching how value iteration treats them.
pub fn greedy_policy(mdp: &GridMdp, values: &ValueGrid) -> PolicyGrid {
    let (rows, cols) = mdp.shape();
    let mut policy = Grid::filled(rows, cols, PolicyCell::Barrier);

    for state in mdp.states() {
        if let Some(cell) = fixed_cell(mdp.cell_type(state)) {
            policy.set(state.index, cell);
            continue;
        }

        let q_values: Vec<_> = mdp
            .actions(state)
            .into_iter()
            .map(|a| (a, mdp.q_value(state, a, values)))
            .collect();
        let best = q_values
            .iter()
            .map(|&(_, q)| q)
            .fold(f64::NEG_INFINITY, f64::max);
        let optimal: Vec<_> = q_values
            .iter()
            .filter(|&&(_, q)| (q - best).abs() < TIE_TOLERANCE)
            .map(|&(a, _)| a)
            .collect();

        let cell = match optimal.as_slice() {
            [] => PolicyCell::Terminal,
            [only] => PolicyCell::Move(*only),
            _ => PolicyCell::Ambiguous,
        };
        policy.set(state.index, cell);
    }
    policy
}

/// Build a model from raw grids and solve it with value iteration.
pub fn value_iteration(
    cells: Grid<CellType>,
    rewards: Grid<f64>,
    config: &SolverConfig,
) -> Result<ValueIterationResult, MdpError> {
    let mdp = GridMdp::new(cells, rewards, config.slip_success, config.discount)?;
    Ok(ValueIteration::new(mdp, config.clone()).solve())
}
