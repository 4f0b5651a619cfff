//! Policies as grids of tagged cells.
//!
//! Each cell carries one [`PolicyCell`]. The single-character labels used by
//! renderers (`x`, `o`, `^`, `v`, `<`, `>`, `+`) only appear at the boundary,
//! through [`PolicyCell::symbol`] and [`PolicyCell::from_symbol`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::mdp::grid::{Grid, ValueGrid};
use crate::mdp::model::{CellType, Direction, GridMdp, State};

/// What a policy prescribes for one cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PolicyCell {
    /// Impassable cell, no action.
    Barrier,
    /// Absorbing cell, no action.
    Terminal,
    /// A single committed move.
    Move(Direction),
    /// No single move: several moves tie for the optimum (value iteration),
    /// or every legal move is averaged over (policy evaluation).
    Ambiguous,
}

impl PolicyCell {
    /// Rendering label of this cell.
    pub fn symbol(self) -> char {
        match self {
            PolicyCell::Barrier => 'x',
            PolicyCell::Terminal => 'o',
            PolicyCell::Move(d) => d.symbol(),
            PolicyCell::Ambiguous => '+',
        }
    }

    /// Decode a rendering label.
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            'x' => Some(PolicyCell::Barrier),
            'o' => Some(PolicyCell::Terminal),
            '+' => Some(PolicyCell::Ambiguous),
            other => Direction::from_symbol(other).map(PolicyCell::Move),
        }
    }

    /// Moves this cell commits to at `state`.
    ///
    /// `Ambiguous` expands to every legal move; `Move` yields its direction
    /// only if that move is legal from `state`.
    pub fn actions(self, mdp: &GridMdp, state: &State) -> Vec<Direction> {
        match self {
            PolicyCell::Barrier | PolicyCell::Terminal => Vec::new(),
            PolicyCell::Ambiguous => mdp.actions(state),
            PolicyCell::Move(d) if mdp.is_legal(state, d) => vec![d],
            PolicyCell::Move(_) => Vec::new(),
        }
    }

    /// Q-value of following this cell at `state`: the mean over its moves.
    ///
    /// Returns `None` when the cell commits to no legal move.
    pub fn q_value(self, mdp: &GridMdp, state: &State, values: &ValueGrid) -> Option<f64> {
        let actions = self.actions(mdp, state);
        if actions.is_empty() {
            return None;
        }
        let total: f64 = actions.iter().map(|&a| mdp.q_value(state, a, values)).sum();
        Some(total / actions.len() as f64)
    }
}

impl fmt::Display for PolicyCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// A full policy, one cell per grid cell.
pub type PolicyGrid = Grid<PolicyCell>;

/// The policy cell for a non-state cell type.
pub(crate) fn fixed_cell(cell: CellType) -> Option<PolicyCell> {
    match cell {
        CellType::Barrier => Some(PolicyCell::Barrier),
        CellType::Terminal => Some(PolicyCell::Terminal),
        CellType::Active => None,
    }
}

/// Rows of rendering labels, e.g. for reports.
pub fn policy_symbols(policy: &PolicyGrid) -> Vec<String> {
    policy
        .iter_rows()
        .map(|row| row.iter().map(|c| c.symbol()).collect())
        .collect()
}

/// Parse rows of rendering labels back into a policy grid.
///
/// Returns `None` for unknown labels or ragged rows.
pub fn parse_policy<S: AsRef<str>>(rows: &[S]) -> Option<PolicyGrid> {
    let parsed = rows
        .iter()
        .map(|row| row.as_ref().chars().map(PolicyCell::from_symbol).collect())
        .collect::<Option<Vec<Vec<PolicyCell>>>>()?;
    Grid::from_rows(parsed)
}
