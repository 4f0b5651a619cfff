//! Configuration options for the grid solvers.
//!
//! This module provides the numeric parameters shared by value iteration,
//! policy evaluation and policy iteration, plus the statistics the solvers
//! report back.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default probability that the intended move succeeds.
pub const DEFAULT_SLIP_SUCCESS: f64 = 0.8;
/// Default discount factor.
pub const DEFAULT_DISCOUNT: f64 = 0.9;
/// Default convergence threshold.
pub const DEFAULT_EPSILON: f64 = 1e-3;

/// Configuration for the grid solvers.
///
/// # Example
/// ```
/// use grid_mdp::mdp::SolverConfig;
///
/// let config = SolverConfig::default().with_discount(0.95);
/// assert_eq!(config.slip_success, 0.8);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Probability `p` that the intended move happens.
    ///
    /// The remaining `1 - p` is split evenly between the two orthogonal slips.
    pub slip_success: f64,

    /// Discount factor `gamma`.
    ///
    /// Assumed to lie strictly between 0 and 1. The solvers do not enforce
    /// this; with `gamma >= 1` a sweep loop may never converge.
    pub discount: f64,

    /// Convergence threshold on the largest per-sweep value change.
    pub epsilon: f64,

    /// Upper bound on sweeps per solve (and per policy evaluation).
    ///
    /// `None` sweeps until convergence, however long that takes.
    pub max_sweeps: Option<u64>,

    /// Upper bound on outer policy-iteration steps. `None` means unbounded.
    pub max_policy_iterations: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            slip_success: DEFAULT_SLIP_SUCCESS,
            discount: DEFAULT_DISCOUNT,
            epsilon: DEFAULT_EPSILON,
            max_sweeps: None,
            max_policy_iterations: None,
        }
    }
}

impl SolverConfig {
    /// Create a new SolverConfig with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the slip-success probability.
    pub fn with_slip_success(mut self, p: f64) -> Self {
        self.slip_success = p;
        self
    }

    /// Builder method: set the discount factor.
    pub fn with_discount(mut self, gamma: f64) -> Self {
        self.discount = gamma;
        self
    }

    /// Builder method: set the convergence threshold.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Builder method: cap the number of sweeps.
    pub fn with_max_sweeps(mut self, sweeps: u64) -> Self {
        self.max_sweeps = Some(sweeps);
        self
    }

    /// Builder method: cap the number of policy-iteration steps.
    pub fn with_max_policy_iterations(mut self, iterations: u64) -> Self {
        self.max_policy_iterations = Some(iterations);
        self
    }

    /// Validate the configuration and return any errors.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.slip_success) {
            return Err(ConfigError::InvalidSlipSuccess(self.slip_success));
        }
        if !(self.discount > 0.0 && self.discount < 1.0) {
            return Err(ConfigError::InvalidDiscount(self.discount));
        }
        if !(self.epsilon > 0.0) {
            return Err(ConfigError::InvalidEpsilon(self.epsilon));
        }
        Ok(())
    }

    /// Load configuration from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json_str(&content)
    }

    /// Parse configuration from a JSON string. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// True once `sweeps` has reached the configured cap.
    pub(crate) fn sweep_cap_reached(&self, sweeps: u64) -> bool {
        self.max_sweeps.is_some_and(|cap| sweeps >= cap)
    }
}

/// Errors that can occur when validating or loading solver configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Slip-success probability is out of range [0, 1].
    #[error("slip-success probability {0} is out of range [0, 1]")]
    InvalidSlipSuccess(f64),
    /// Discount factor is out of range (0, 1).
    #[error("discount factor {0} is out of range (0, 1)")]
    InvalidDiscount(f64),
    /// Convergence threshold is not positive.
    #[error("convergence threshold {0} must be positive")]
    InvalidEpsilon(f64),
    /// The config file could not be read.
    #[error("IO error: {0}")]
    Io(String),
    /// The config file is not valid JSON for this struct.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Statistics reported by a solve.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SolveStats {
    /// Value sweeps performed, summed over every evaluation for policy iteration.
    pub sweeps: u64,

    /// Outer policy-iteration steps (0 for value iteration).
    pub policy_iterations: u64,

    /// Whether the stopping criterion was met rather than a cap.
    pub converged: bool,

    /// Largest value change in the final sweep.
    pub final_delta: f64,

    /// Total time spent solving (in seconds).
    pub elapsed_seconds: f64,
}

/// Progress snapshot handed to solver callbacks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    /// Sweeps completed so far.
    pub sweeps: u64,
    /// Outer policy-iteration step (0 for value iteration).
    pub policy_iteration: u64,
    /// Largest value change in the latest sweep.
    pub delta: f64,
    /// States whose action changed in the latest improvement step.
    pub changed_states: usize,
}
