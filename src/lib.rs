//! # Grid MDP
//!
//! Optimal decision policies for an agent moving on a 2-D grid whose moves
//! sometimes slip sideways, computed with the two classical dynamic
//! programming planners for Markov Decision Processes.
//!
//! ## Features
//!
//! - **Grid Model**: states, legal moves, slip transitions and rewards from a
//!   cell-type grid and a reward grid
//! - **Value Iteration**: Bellman-optimality sweeps with a per-sweep value history
//! - **Policy Evaluation**: value of a fixed policy, optionally warm-started
//! - **Policy Iteration**: evaluation and improvement until the policy is stable,
//!   with per-step sweep counts
//! - **Input/Output**: validated JSON inputs, JSON reports, text renderings
//!
//! ## Quick Start
//!
//! ```
//! use grid_mdp::io::GridInput;
//! use grid_mdp::mdp::{SolverConfig, ValueIteration};
//!
//! let input = GridInput::from_json_str(
//!     r#"{ "states": [[-1, 1, 1]], "rewards": [[10, -1, -1]] }"#,
//! ).unwrap();
//! let config = SolverConfig::default();
//! let mdp = input.to_model(&config).unwrap();
//!
//! let result = ValueIteration::new(mdp, config).solve();
//! assert_eq!(grid_mdp::mdp::policy_symbols(&result.policy), vec!["o<<"]);
//! ```
//!
//! ## Modules
//!
//! - [`mdp`]: the model and the solvers
//! - [`io`]: input validation and output rendering
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────────────────────────────────┐     ┌──────────────┐
//! │  io::input   │     │                    mdp                     │     │  io::output  │
//! │ JSON grids   │────▶│ GridMdp ──▶ ValueIteration                 │────▶│ report, text │
//! │ validation   │     │         └─▶ PolicyIteration(+evaluation)   │     │ sweeps CSV   │
//! └──────────────┘     └────────────────────────────────────────────┘     └──────────────┘
//! ```

#![warn(missing_docs)]

/// Crate-level error type.
pub mod error;

/// Reading inputs and writing results.
pub mod io;

/// The grid MDP and its solvers.
pub mod mdp;

// Re-export commonly used types at crate root for convenience
pub use error::{Error, Result};
pub use mdp::{
    CellType, Direction, GridMdp, PolicyCell, PolicyGrid, PolicyIteration, SolverConfig,
    ValueGrid, ValueIteration,
};
