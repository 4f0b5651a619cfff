//! Policy iteration: alternate policy evaluation and greedy improvement.
//!
//! Starts from a default policy that takes the first legal move in the order
//! up, down, right, left. Each outer step evaluates the current policy (from
//! zero, or warm-started from the previous step's values) and then replaces
//! each state's action with the best one under those values if it beats the
//! current action by more than [`IMPROVEMENT_TOLERANCE`]. The loop ends when
//! no state changes.
//!
//! ```text
//!   pi_0 --evaluate--> V_0 --improve--> pi_1 --evaluate--> V_1 --> ... pi_k == pi_k+1
//! ```

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::mdp::config::{Progress, SolveStats, SolverConfig};
use crate::mdp::grid::{Grid, ValueGrid};
use crate::mdp::model::{CellType, Direction, GridMdp, MdpError};
use crate::mdp::policy::{fixed_cell, PolicyCell, PolicyGrid};
use crate::mdp::policy_evaluation::evaluate_policy;

/// A new action must beat the current one by more than this to be adopted.
pub const IMPROVEMENT_TOLERANCE: f64 = 1e-12;

/// Output of a policy-iteration solve.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicyIterationResult {
    /// Evaluated value grid of every outer step, oldest first.
    pub history: Vec<ValueGrid>,
    /// Final (stable) policy.
    pub policy: PolicyGrid,
    /// Sweeps each outer step's policy evaluation needed.
    pub sweep_counts: Vec<u64>,
    /// Solve statistics.
    pub stats: SolveStats,
}

/// Summary of one evaluate-then-improve step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    /// 1-based outer step number.
    pub iteration: u64,
    /// Sweeps the evaluation needed.
    pub sweeps: u64,
    /// Largest value change in the evaluation's last sweep.
    pub delta: f64,
    /// States whose action was replaced.
    pub changed_states: usize,
}

/// Policy-iteration solver.
#[derive(Debug, Clone)]
pub struct PolicyIteration {
    mdp: GridMdp,
    config: SolverConfig,
    reset_values: bool,
    policy: PolicyGrid,
    values: ValueGrid,
    history: Vec<ValueGrid>,
    sweep_counts: Vec<u64>,
    iteration: u64,
    stable: bool,
}

impl PolicyIteration {
    /// Create a solver starting from [`default_policy`] and zero values.
    ///
    /// # Arguments
    /// * `mdp` - The model to solve
    /// * `config` - Convergence threshold and caps
    /// * `reset_values` - Evaluate every policy from zero instead of warm-starting
    pub fn new(mdp: GridMdp, config: SolverConfig, reset_values: bool) -> Self {
        let policy = default_policy(&mdp);
        let values = mdp.zero_values();
        Self {
            mdp,
            config,
            reset_values,
            policy,
            values,
            history: Vec::new(),
            sweep_counts: Vec::new(),
            iteration: 0,
            stable: false,
        }
    }

    /// Run one evaluate-then-improve step.
    pub fn step(&mut self) -> StepReport {
        self.iteration += 1;

        let seed = (!self.reset_values).then_some(&self.values);
        let evaluation = evaluate_policy(&self.mdp, &self.policy, &self.config, seed);
        self.values = evaluation.values;
        self.history.push(self.values.clone());
        self.sweep_counts.push(evaluation.sweeps);

        let (policy, changed_states) = improve_policy(&self.mdp, &self.policy, &self.values);
        self.policy = policy;
        self.stable = changed_states == 0;
        if !self.stable && self.reset_values {
            self.values = self.mdp.zero_values();
        }

        debug!(
            iteration = self.iteration,
            sweeps = evaluation.sweeps,
            changed_states,
            "policy iteration step"
        );
        StepReport {
            iteration: self.iteration,
            sweeps: evaluation.sweeps,
            delta: evaluation.final_delta,
            changed_states,
        }
    }

    /// Iterate until the policy is stable.
    pub fn solve(&mut self) -> PolicyIterationResult {
        self.solve_with_callback(|_| {})
    }

    /// Like [`PolicyIteration::solve`], calling `callback` after every outer step.
    pub fn solve_with_callback<F>(&mut self, mut callback: F) -> PolicyIterationResult
    where
        F: FnMut(&Progress),
    {
        if self.mdp.discount_factor() >= 1.0 {
            warn!(
                discount = self.mdp.discount_factor(),
                "discount factor >= 1, policy evaluation may not converge"
            );
        }

        let start_time = Instant::now();
        let mut final_delta = 0.0;
        while !self.stable {
            let report = self.step();
            final_delta = report.delta;
            callback(&Progress {
                sweeps: self.total_sweeps(),
                policy_iteration: report.iteration,
                delta: report.delta,
                changed_states: report.changed_states,
            });

            if !self.stable
                && self
                    .config
                    .max_policy_iterations
                    .is_some_and(|cap| self.iteration >= cap)
            {
                warn!(iterations = self.iteration, "policy iteration cap reached before the policy stabilised");
                break;
            }
        }

        let stats = SolveStats {
            sweeps: self.total_sweeps(),
            policy_iterations: self.iteration,
            converged: self.stable,
            final_delta,
            elapsed_seconds: start_time.elapsed().as_secs_f64(),
        };
        info!(
            iterations = stats.policy_iterations,
            sweeps = stats.sweeps,
            converged = stats.converged,
            "policy iteration finished"
        );

        PolicyIterationResult {
            history: std::mem::take(&mut self.history),
            policy: self.policy.clone(),
            sweep_counts: std::mem::take(&mut self.sweep_counts),
            stats,
        }
    }

    /// Current policy.
    pub fn policy(&self) -> &PolicyGrid {
        &self.policy
    }

    /// Values that seed the next evaluation (zero after a step in reset mode).
    pub fn values(&self) -> &ValueGrid {
        &self.values
    }

    /// Evaluated value grids recorded so far.
    pub fn history(&self) -> &[ValueGrid] {
        &self.history
    }

    /// Outer steps run so far.
    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// True once a step changed no action.
    pub fn is_stable(&self) -> bool {
        self.stable
    }

    /// Get reference to the model.
    pub fn mdp(&self) -> &GridMdp {
        &self.mdp
    }

    fn total_sweeps(&self) -> u64 {
        self.sweep_counts.iter().sum()
    }
}

/// Initial policy: the first legal move in [`Direction::PREFERENCE`] order.
///
/// Barrier and terminal cells get their fixed labels; an active cell with no
/// legal move at all is left [`PolicyCell::Ambiguous`].
pub fn default_policy(mdp: &GridMdp) -> PolicyGrid {
    let (rows, cols) = mdp.shape();
    let mut policy = Grid::filled(rows, cols, PolicyCell::Barrier);
    for state in mdp.states() {
        let cell = fixed_cell(mdp.cell_type(state)).unwrap_or_else(|| {
            Direction::PREFERENCE
                .into_iter()
                .find(|&d| mdp.is_legal(state, d))
                .map_or(PolicyCell::Ambiguous, PolicyCell::Move)
        });
        policy.set(state.index, cell);
    }
    policy
}

/// Greedy improvement of `policy` under `values`.
///
/// Returns the new policy and how many states changed. The best move is the
/// first maximum in [`GridMdp::actions`] order; it replaces the current
/// action only if its Q-value is larger by more than [`IMPROVEMENT_TOLERANCE`].
/// An ambiguous cell is scored by its mean Q-value; a cell committing to no
/// legal move is always replaced.
pub fn improve_policy(mdp: &GridMdp, policy: &PolicyGrid, values: &ValueGrid) -> (PolicyGrid, usize) {
    let mut improved = policy.clone();
    let mut changed = 0;

    for state in mdp.states() {
        let mut best: Option<(Direction, f64)> = None;
        for action in mdp.actions(state) {
            let q = mdp.q_value(state, action, values);
            if best.map_or(true, |(_, best_q)| q > best_q) {
                best = Some((action, q));
            }
        }
        // Terminals and walled-in cells have nothing to choose from.
        let Some((best_action, best_q)) = best else {
            continue;
        };

        let current_q = policy
            .at(state.index)
            .q_value(mdp, state, values)
            .unwrap_or(f64::NEG_INFINITY);
        if best_q > current_q + IMPROVEMENT_TOLERANCE {
            improved.set(state.index, PolicyCell::Move(best_action));
            changed += 1;
        }
    }
    (improved, changed)
}

/// Build a model from raw grids and solve it with policy iteration.
pub fn policy_iteration(
    cells: Grid<CellType>,
    rewards: Grid<f64>,
    config: &SolverConfig,
    reset_values: bool,
) -> Result<PolicyIterationResult, MdpError> {
    let mdp = GridMdp::new(cells, rewards, config.slip_success, config.discount)?;
    Ok(PolicyIteration::new(mdp, config.clone(), reset_values).solve())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdp::value_iteration::value_iteration;

    const A: CellType = CellType::Active;
    const B: CellType = CellType::Barrier;
    const T: CellType = CellType::Terminal;

    /// 3x3 with the terminal in a corner and rewards skewed so no two moves tie.
    fn skewed_3x3() -> (Grid<CellType>, Grid<f64>) {
        let cells = Grid::from_rows(vec![vec![T, A, A], vec![A, A, A], vec![A, A, A]]).unwrap();
        let rewards = Grid::from_rows(vec![
            vec![10.0, -1.0, -1.0],
            vec![-2.0, -3.0, -1.5],
            vec![-2.0, -3.0, -3.0],
        ])
        .unwrap();
        (cells, rewards)
    }

    fn skewed_mdp() -> GridMdp {
        let (cells, rewards) = skewed_3x3();
        GridMdp::new(cells, rewards, 0.8, 0.9).unwrap()
    }

    #[test]
    fn test_default_policy_preference_order() {
        let cells = Grid::from_rows(vec![vec![T, A, A], vec![A, B, A], vec![A, A, A]]).unwrap();
        let rewards = Grid::filled(3, 3, 0.0);
        let mdp = GridMdp::new(cells, rewards, 0.8, 0.9).unwrap();
        let policy = default_policy(&mdp);

        assert_eq!(policy.get(0, 0), Some(&PolicyCell::Terminal));
        assert_eq!(policy.get(1, 1), Some(&PolicyCell::Barrier));
        // (0,1): up is off-grid, down is the barrier, right is next.
        assert_eq!(policy.get(0, 1), Some(&PolicyCell::Move(Direction::Right)));
        assert_eq!(policy.get(0, 2), Some(&PolicyCell::Move(Direction::Down)));
        assert_eq!(policy.get(2, 1), Some(&PolicyCell::Move(Direction::Right)));
        assert_eq!(policy.get(1, 0), Some(&PolicyCell::Move(Direction::Up)));
    }

    #[test]
    fn test_default_policy_walled_in_cell_is_ambiguous() {
        let cells = Grid::from_rows(vec![vec![A, B]]).unwrap();
        let rewards = Grid::filled(1, 2, 0.0);
        let mdp = GridMdp::new(cells, rewards, 0.8, 0.9).unwrap();
        assert_eq!(default_policy(&mdp).get(0, 0), Some(&PolicyCell::Ambiguous));
    }

    #[test]
    fn test_skewed_grid_terminates_toward_terminal() {
        let (cells, rewards) = skewed_3x3();
        let config = SolverConfig::default().with_max_policy_iterations(50);
        for reset in [true, false] {
            let result = policy_iteration(cells.clone(), rewards.clone(), &config, reset).unwrap();
            assert!(result.stats.converged, "reset={} did not stabilise", reset);
            assert_eq!(result.history.len(), result.sweep_counts.len());
            assert_eq!(result.stats.policy_iterations as usize, result.history.len());
            assert_eq!(result.policy.get(0, 1), Some(&PolicyCell::Move(Direction::Left)));
            assert_eq!(result.policy.get(1, 0), Some(&PolicyCell::Move(Direction::Up)));
            assert_eq!(result.policy.get(0, 0), Some(&PolicyCell::Terminal));
            assert!(result.sweep_counts.iter().all(|&s| s >= 1));
        }
    }

    #[test]
    fn test_agrees_with_value_iteration_on_skewed_grid() {
        let (cells, rewards) = skewed_3x3();
        let config = SolverConfig::default().with_epsilon(1e-8);
        let vi = value_iteration(cells.clone(), rewards.clone(), &config).unwrap();
        let pi = policy_iteration(cells, rewards, &config, false).unwrap();
        assert_eq!(vi.policy, pi.policy);
    }

    #[test]
    fn test_warm_start_seeds_next_evaluation() {
        let mdp = skewed_mdp();
        let config = SolverConfig::default();
        let mut solver = PolicyIteration::new(mdp.clone(), config.clone(), false);

        solver.step();
        let converged = solver.history()[0].clone();
        assert_eq!(solver.values(), &converged);

        let policy = solver.policy().clone();
        solver.step();
        let expected = evaluate_policy(&mdp, &policy, &config, Some(&converged));
        assert_eq!(solver.history()[1], expected.values);
    }

    #[test]
    fn test_reset_mode_zeroes_values_between_steps() {
        let mut solver = PolicyIteration::new(skewed_mdp(), SolverConfig::default(), true);
        let report = solver.step();
        assert!(report.changed_states > 0);
        assert!(!solver.is_stable());
        assert_eq!(solver.values(), &solver.mdp().zero_values());
    }

    #[test]
    fn test_improvement_never_lowers_q() {
        let mdp = skewed_mdp();
        let mut solver = PolicyIteration::new(mdp.clone(), SolverConfig::default(), false);

        while !solver.is_stable() && solver.iteration() < 50 {
            let before = solver.policy().clone();
            solver.step();
            let values = solver.values();
            for state in mdp.states() {
                if mdp.actions(state).is_empty() {
                    continue;
                }
                let old_q = before.at(state.index).q_value(&mdp, state, values).unwrap();
                let new_q = solver.policy().at(state.index).q_value(&mdp, state, values).unwrap();
                assert!(new_q >= old_q - IMPROVEMENT_TOLERANCE);
            }
        }
        assert!(solver.is_stable());
    }

    #[test]
    fn test_ambiguous_cell_compared_by_mean() {
        let cells = Grid::from_rows(vec![vec![T, A, A]]).unwrap();
        let rewards = Grid::from_rows(vec![vec![10.0, -1.0, -1.0]]).unwrap();
        let mdp = GridMdp::new(cells, rewards, 0.8, 0.9).unwrap();
        let policy = crate::mdp::policy::parse_policy(&["o+<"]).unwrap();
        let values = evaluate_policy(&mdp, &policy, &SolverConfig::default(), None).values;

        let (improved, changed) = improve_policy(&mdp, &policy, &values);
        assert_eq!(changed, 1);
        assert_eq!(improved.get(0, 1), Some(&PolicyCell::Move(Direction::Left)));
    }

    #[test]
    fn test_iteration_cap_reports_unconverged() {
        let (cells, rewards) = skewed_3x3();
        let config = SolverConfig::default().with_max_policy_iterations(1);
        let result = policy_iteration(cells, rewards, &config, true).unwrap();
        assert_eq!(result.history.len(), 1);
        assert!(!result.stats.converged);
    }
}
