//! Grid-world Markov Decision Process model and dynamic-programming solvers.
//!
//! This module provides the grid MDP itself and the two classical planners
//! built on it, for an agent moving on a 2-D grid whose moves sometimes slip
//! sideways.
//!
//! # Overview
//!
//! - [`GridMdp`]: states, legal moves, slip transitions and rewards derived
//!   from a cell-type grid and a reward grid
//! - [`ValueIteration`]: repeated Bellman-optimality sweeps plus greedy
//!   policy extraction
//! - [`evaluate_policy`]: value of a fixed policy, optionally warm-started
//! - [`PolicyIteration`]: evaluation and improvement until the policy is stable
//!
//! # Example
//!
//! ```
//! use grid_mdp::mdp::{value_iteration, CellType, Grid, PolicyCell, SolverConfig};
//!
//! let cells = Grid::from_rows(vec![vec![CellType::Terminal, CellType::Active]]).unwrap();
//! let rewards = Grid::from_rows(vec![vec![1.0, 0.0]]).unwrap();
//!
//! let result = value_iteration(cells, rewards, &SolverConfig::default()).unwrap();
//! assert_eq!(result.policy.get(0, 1).map(|c| c.symbol()), Some('<'));
//! assert_eq!(result.policy.get(0, 0), Some(&PolicyCell::Terminal));
//! ```
//!
//! # Theory
//!
//! **Bellman optimality**: the optimal value satisfies
//! ```text
//! V*(s) = max_a sum_{s'} P(s' | s, a) * (R(s') + gamma * V*(s'))
//! ```
//!
//! **Policy improvement**: acting greedily with respect to `V^pi` never does
//! worse than `pi`, and strictly better somewhere unless `pi` is optimal, so
//! policy iteration stops after finitely many steps.
//!
//! # References
//!
//! - Bellman, R. "Dynamic Programming" (1957)
//! - Howard, R. "Dynamic Programming and Markov Processes" (1960)
//! - Sutton, R., Barto, A. "Reinforcement Learning: An Introduction", ch. 4 (2018)

pub mod config;
pub mod grid;
pub mod model;
pub mod policy;
pub mod policy_evaluation;
pub mod policy_iteration;
pub mod value_iteration;

// Re-export main types for convenient access
pub use config::{
    ConfigError, Progress, SolveStats, SolverConfig, DEFAULT_DISCOUNT, DEFAULT_EPSILON,
    DEFAULT_SLIP_SUCCESS,
};
pub use grid::{Grid, ValueGrid};
pub use model::{CellType, Direction, GridMdp, MdpError, State, Transition};
pub use policy::{parse_policy, policy_symbols, PolicyCell, PolicyGrid};
pub use policy_evaluation::{evaluate_policy, Evaluation};
pub use policy_iteration::{
    default_policy, improve_policy, policy_iteration, PolicyIteration, PolicyIterationResult,
    StepReport,
};
pub use value_iteration::{greedy_policy, value_iteration, ValueIteration, ValueIterationResult};
