//! Iterative evaluation of a fixed policy.
//!
//! Sweeps the Bellman expectation update for the given policy until the
//! largest per-sweep change falls below `epsilon`. Per cell:
//!
//! - terminal states take their own reward,
//! - cells labelled barrier or terminal keep whatever value they start with,
//! - an ambiguous cell takes the mean Q-value over all its legal moves,
//! - a single-move cell takes that move's Q-value,
//! - a cell that commits to no legal move is forced to 0.
//!
//! Like value iteration the update is synchronous: every state reads the
//! previous sweep's values.

use tracing::{debug, warn};

use crate::mdp::config::SolverConfig;
use crate::mdp::grid::ValueGrid;
use crate::mdp::model::GridMdp;
use crate::mdp::policy::{PolicyCell, PolicyGrid};

/// Result of evaluating a policy.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Converged value grid.
    pub values: ValueGrid,
    /// Number of full sweeps performed (at least 1).
    pub sweeps: u64,
    /// Largest value change in the last sweep.
    pub final_delta: f64,
    /// False when the sweep cap stopped evaluation first.
    pub converged: bool,
}

/// Evaluate `policy` on `mdp`.
///
/// # Arguments
/// * `mdp` - The model; its discount factor is used
/// * `policy` - Policy grid with the model's shape
/// * `config` - Supplies `epsilon` and the optional sweep cap
/// * `initial` - Warm-start values; copied, never modified. `None` starts from zero.
pub fn evaluate_policy(
    mdp: &GridMdp,
    policy: &PolicyGrid,
    config: &SolverConfig,
    initial: Option<&ValueGrid>,
) -> Evaluation {
    debug_assert_eq!(policy.shape(), mdp.shape(), "policy shape must match the model");

    let mut values = match initial {
        Some(v) => v.clone(),
        None => mdp.zero_values(),
    };
    let mut sweeps = 0u64;

    loop {
        sweeps += 1;
        let previous = values.clone();
        let mut delta: f64 = 0.0;

        for state in mdp.states() {
            if mdp.is_terminal(state) {
                values.set(state.index, mdp.reward(state));
                continue;
            }

            let cell = *policy.at(state.index);
            if matches!(cell, PolicyCell::Barrier | PolicyCell::Terminal) {
                continue;
            }

            let Some(q) = cell.q_value(mdp, state, &previous) else {
                values.set(state.index, 0.0);
                continue;
            };
            delta = delta.max((q - previous.at(state.index)).abs());
            values.set(state.index, q);
        }

        debug!(sweep = sweeps, delta, "policy evaluation sweep");
        if delta < config.epsilon {
            return Evaluation {
                values,
                sweeps,
                final_delta: delta,
                converged: true,
            };
        }
        if config.sweep_cap_reached(sweeps) {
            warn!(sweeps, delta, "policy evaluation hit the sweep cap");
            return Evaluation {
                values,
                sweeps,
                final_delta: delta,
                converged: false,
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdp::grid::Grid;
    use crate::mdp::model::{CellType, Direction};
    use crate::mdp::policy::parse_policy;

    const A: CellType = CellType::Active;
    const B: CellType = CellType::Barrier;
    const T: CellType = CellType::Terminal;

    fn corridor() -> GridMdp {
        let cells = Grid::from_rows(vec![vec![T, A, A]]).unwrap();
        let rewards = Grid::from_rows(vec![vec![10.0, -1.0, -1.0]]).unwrap();
        GridMdp::new(cells, rewards, 0.8, 0.9).unwrap()
    }

    #[test]
    fn test_fixed_policy_values() {
        let mdp = corridor();
        let policy = parse_policy(&["o<<"]).unwrap();
        let eval = evaluate_policy(&mdp, &policy, &SolverConfig::default(), None);

        // Deterministic corridor: V1 = 10 + 0.9 * 10, V2 = -1 + 0.9 * V1.
        let v1 = 10.0 + 0.9 * 10.0;
        let v2 = -1.0 + 0.9 * v1;
        assert!(eval.converged);
        assert!((eval.values.get(0, 0).unwrap() - 10.0).abs() < 1e-12);
        assert!((eval.values.get(0, 1).unwrap() - v1).abs() < 1e-9);
        assert!((eval.values.get(0, 2).unwrap() - v2).abs() < 1e-9);
        assert!(eval.sweeps >= 2);
    }

    #[test]
    fn test_ambiguous_cell_averages_moves() {
        let mdp = corridor();
        let policy = parse_policy(&["o+<"]).unwrap();
        let eval = evaluate_policy(&mdp, &policy, &SolverConfig::default(), None);

        let s = mdp.state_at(0, 1).unwrap();
        let left = mdp.q_value(&s, Direction::Left, &eval.values);
        let right = mdp.q_value(&s, Direction::Right, &eval.values);
        let got = *eval.values.get(0, 1).unwrap();
        assert!((got - (left + right) / 2.0).abs() < 1e-2);
    }

    #[test]
    fn test_warm_start_is_copied() {
        let mdp = corridor();
        let policy = parse_policy(&["o<<"]).unwrap();
        let config = SolverConfig::default();
        let cold = evaluate_policy(&mdp, &policy, &config, None);

        let seed = cold.values.clone();
        let warm = evaluate_policy(&mdp, &policy, &config, Some(&seed));
        assert_eq!(seed, cold.values);
        assert_eq!(warm.sweeps, 1);
        assert!(warm.sweeps < cold.sweeps);
    }

    #[test]
    fn test_labelled_cells_keep_start_values() {
        let mdp = corridor();
        // The active cell at (0,2) is labelled terminal and must be skipped.
        let policy = parse_policy(&["o<o"]).unwrap();
        let mut seed = mdp.zero_values();
        seed.set(2, 42.0);
        let eval = evaluate_policy(&mdp, &policy, &SolverConfig::default(), Some(&seed));
        assert_eq!(eval.values.get(0, 2), Some(&42.0));
    }

    #[test]
    fn test_cell_without_legal_move_is_zeroed() {
        let cells = Grid::from_rows(vec![vec![A, B, T]]).unwrap();
        let rewards = Grid::from_rows(vec![vec![5.0, 0.0, 1.0]]).unwrap();
        let mdp = GridMdp::new(cells, rewards, 0.8, 0.9).unwrap();
        let policy = parse_policy(&["+xo"]).unwrap();
        let mut seed = mdp.zero_values();
        seed.set(0, 3.0);

        let eval = evaluate_policy(&mdp, &policy, &SolverConfig::default(), Some(&seed));
        assert_eq!(eval.values.get(0, 0), Some(&0.0));
        assert_eq!(eval.values.get(0, 2), Some(&1.0));
        assert_eq!(eval.sweeps, 1);
    }
}
