//! The grid-world MDP: states, legal moves, slip transitions and rewards.
//!
//! The model owns the cell-type and reward grids and derives the state space
//! from them exactly once, at construction. States live in an arena indexed
//! by their position in [`GridMdp::states`]; a same-shape lookup table maps
//! each cell to its arena slot (or to nothing, for barriers).
//!
//! # Slip model
//!
//! Choosing a direction moves the agent there with probability `p`. With
//! probability `(1 - p) / 2` each, it instead moves to one of the two
//! orthogonal neighbours. When an orthogonal move would leave the grid or hit
//! a barrier, its mass is added to the intended move:
//!
//! ```text
//!            (1-p)/2
//!               ^
//!               |
//!     s  ---- p ---->  intended
//!               |
//!               v
//!            (1-p)/2
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::mdp::grid::{Grid, ValueGrid};

/// Errors raised while building or querying a [`GridMdp`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MdpError {
    /// The cell-type and reward grids differ in shape.
    #[error("cell grid is {cells:?} but reward grid is {rewards:?}")]
    ShapeMismatch {
        /// Shape of the cell-type grid.
        cells: (usize, usize),
        /// Shape of the reward grid.
        rewards: (usize, usize),
    },
    /// The grid has no cells.
    #[error("grid has no cells")]
    EmptyGrid,
    /// The coordinate is out of bounds or a barrier.
    #[error("({row}, {col}) is not a state")]
    NotAState {
        /// Row of the offending coordinate.
        row: usize,
        /// Column of the offending coordinate.
        col: usize,
    },
    /// The intended move is not legal from the given state.
    #[error("moving {direction} from ({row}, {col}) is not a legal action")]
    IllegalAction {
        /// Row of the state.
        row: usize,
        /// Column of the state.
        col: usize,
        /// The rejected move.
        direction: Direction,
    },
}

/// Type of a single grid cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CellType {
    /// Impassable; never part of the state space.
    Barrier,
    /// Ordinary state with legal moves.
    Active,
    /// Absorbing state; its reward is collected and no action is taken.
    Terminal,
}

impl CellType {
    /// Decode the integer encoding used by input files: `0` barrier, `1` active, `-1` terminal.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(CellType::Barrier),
            1 => Some(CellType::Active),
            -1 => Some(CellType::Terminal),
            _ => None,
        }
    }

    /// Integer encoding of this cell type.
    pub fn code(self) -> i64 {
        match self {
            CellType::Barrier => 0,
            CellType::Active => 1,
            CellType::Terminal => -1,
        }
    }
}

/// A grid move, stored as a coordinate delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Row - 1.
    Up,
    /// Row + 1.
    Down,
    /// Column - 1.
    Left,
    /// Column + 1.
    Right,
}

impl Direction {
    /// The order in which [`GridMdp::actions`] reports legal moves.
    ///
    /// Policy improvement keeps the first of several equal maxima, so this
    /// order decides which move wins a tie.
    pub const ALL: [Direction; 4] = [
        Direction::Down,
        Direction::Up,
        Direction::Right,
        Direction::Left,
    ];

    /// Priority used to build the default policy for policy iteration.
    pub const PREFERENCE: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Right,
        Direction::Left,
    ];

    /// `(d_row, d_col)` of this move.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (-1, 0),
            Direction::Down => (1, 0),
            Direction::Left => (0, -1),
            Direction::Right => (0, 1),
        }
    }

    /// The two moves perpendicular to this one.
    pub fn orthogonals(self) -> [Direction; 2] {
        match self {
            Direction::Up | Direction::Down => [Direction::Right, Direction::Left],
            Direction::Left | Direction::Right => [Direction::Down, Direction::Up],
        }
    }

    /// Single-character arrow used when rendering policies.
    pub fn symbol(self) -> char {
        match self {
            Direction::Up => '^',
            Direction::Down => 'v',
            Direction::Left => '<',
            Direction::Right => '>',
        }
    }

    /// Inverse of [`Direction::symbol`].
    pub fn from_symbol(symbol: char) -> Option<Self> {
        match symbol {
            '^' => Some(Direction::Up),
            'v' => Some(Direction::Down),
            '<' => Some(Direction::Left),
            '>' => Some(Direction::Right),
            _ => None,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        };
        write!(f, "{}", name)
    }
}

/// A non-barrier grid coordinate.
///
/// `index` is the cell's row-major position, which is also where its value
/// lives in every [`ValueGrid`] of the same shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct State {
    /// Grid row.
    pub row: usize,
    /// Grid column.
    pub col: usize,
    /// Flat row-major cell index.
    pub index: usize,
}

/// One possible outcome of taking an action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    /// Where the agent ends up.
    pub next: State,
    /// Probability of ending up there.
    pub probability: f64,
}

/// A grid-world MDP with slip transitions.
#[derive(Debug, Clone)]
pub struct GridMdp {
    cells: Grid<CellType>,
    rewards: Grid<f64>,
    slip_success: f64,
    discount: f64,
    states: Vec<State>,
    lookup: Grid<Option<usize>>,
}

impl GridMdp {
    /// Build the model and enumerate its state space.
    ///
    /// # Arguments
    /// * `cells` - Cell type per grid cell
    /// * `rewards` - Reward per grid cell, same shape as `cells`
    /// * `slip_success` - Probability `p` that the intended move happens
    /// * `discount` - Discount factor `gamma`
    pub fn new(
        cells: Grid<CellType>,
        rewards: Grid<f64>,
        slip_success: f64,
        discount: f64,
    ) -> Result<Self, MdpError> {
        if !cells.same_shape(&rewards) {
            return Err(MdpError::ShapeMismatch {
                cells: cells.shape(),
                rewards: rewards.shape(),
            });
        }
        if cells.is_empty() {
            return Err(MdpError::EmptyGrid);
        }

        let mut states = Vec::new();
        let mut lookup = Grid::filled(cells.rows(), cells.cols(), None);
        for row in 0..cells.rows() {
            for col in 0..cells.cols() {
                let index = row * cells.cols() + col;
                if *cells.at(index) == CellType::Barrier {
                    continue;
                }
                lookup.set(index, Some(states.len()));
                states.push(State { row, col, index });
            }
        }

        Ok(Self {
            cells,
            rewards,
            slip_success,
            discount,
            states,
            lookup,
        })
    }

    /// All non-barrier states, in row-major order.
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// The state at `(row, col)`, or `None` for barriers and out-of-bounds coordinates.
    pub fn state_at(&self, row: usize, col: usize) -> Option<State> {
        self.lookup
            .get(row, col)
            .copied()
            .flatten()
            .map(|slot| self.states[slot])
    }

    /// Like [`GridMdp::state_at`], but reports the missing state as an error.
    pub fn state(&self, row: usize, col: usize) -> Result<State, MdpError> {
        self.state_at(row, col)
            .ok_or(MdpError::NotAState { row, col })
    }

    /// Cell-type grid the model was built from.
    pub fn cells(&self) -> &Grid<CellType> {
        &self.cells
    }

    /// Reward grid the model was built from.
    pub fn rewards(&self) -> &Grid<f64> {
        &self.rewards
    }

    /// `(rows, cols)` of the underlying grid.
    pub fn shape(&self) -> (usize, usize) {
        self.cells.shape()
    }

    /// Cell type at a state.
    pub fn cell_type(&self, state: &State) -> CellType {
        *self.cells.at(state.index)
    }

    /// True iff the state's cell is terminal.
    pub fn is_terminal(&self, state: &State) -> bool {
        self.cell_type(state) == CellType::Terminal
    }

    /// Legal moves from a state, in [`Direction::ALL`] order.
    ///
    /// Terminal states have none. Otherwise a move is legal when its target
    /// is in bounds and not a barrier.
    pub fn actions(&self, state: &State) -> Vec<Direction> {
        if self.is_terminal(state) {
            return Vec::new();
        }
        Direction::ALL
            .into_iter()
            .filter(|&d| self.neighbour(state, d).is_some())
            .collect()
    }

    /// True if `direction` is one of [`GridMdp::actions`] for this state.
    pub fn is_legal(&self, state: &State, direction: Direction) -> bool {
        !self.is_terminal(state) && self.neighbour(state, direction).is_some()
    }

    /// Outcome distribution of moving `direction` from `state`.
    ///
    /// Orthogonal slips come first, the intended move last. Blocked slips are
    /// folded into the intended move, so the probabilities always sum to 1.
    pub fn transition_probabilities(
        &self,
        state: &State,
        direction: Direction,
    ) -> Result<Vec<Transition>, MdpError> {
        let intended = self
            .neighbour(state, direction)
            .filter(|_| !self.is_terminal(state))
            .ok_or(MdpError::IllegalAction {
                row: state.row,
                col: state.col,
                direction,
            })?;
        Ok(self.outcomes(state, direction, intended))
    }

    /// Reward for occupying a state.
    pub fn reward(&self, state: &State) -> f64 {
        *self.rewards.at(state.index)
    }

    /// Slip-success probability `p`.
    pub fn slip_success(&self) -> f64 {
        self.slip_success
    }

    /// Discount factor `gamma`.
    pub fn discount_factor(&self) -> f64 {
        self.discount
    }

    /// One-step lookahead `sum(prob * (reward(next) + gamma * V(next)))`.
    ///
    /// `direction` must be legal from `state`.
    pub fn q_value(&self, state: &State, direction: Direction, values: &ValueGrid) -> f64 {
        let Some(intended) = self.neighbour(state, direction) else {
            debug_assert!(false, "q_value called with an illegal move");
            return 0.0;
        };
        self.outcomes(state, direction, intended)
            .iter()
            .map(|t| t.probability * (self.reward(&t.next) + self.discount * values.at(t.next.index)))
            .sum()
    }

    /// A zero value grid shaped like this model.
    pub fn zero_values(&self) -> ValueGrid {
        let (rows, cols) = self.shape();
        ValueGrid::zeros(rows, cols)
    }

    fn outcomes(&self, state: &State, direction: Direction, intended: State) -> Vec<Transition> {
        let slip = (1.0 - self.slip_success) / 2.0;
        let mut redistributed = 0.0;
        let mut out = Vec::with_capacity(3);

        for side in direction.orthogonals() {
            match self.neighbour(state, side) {
                Some(next) => out.push(Transition {
                    next,
                    probability: slip,
                }),
                None => redistributed += slip,
            }
        }
        out.push(Transition {
            next: intended,
            probability: self.slip_success + redistributed,
        });
        out
    }

    fn neighbour(&self, state: &State, direction: Direction) -> Option<State> {
        let (dr, dc) = direction.delta();
        let index = self
            .cells
            .index_signed(state.row as isize + dr, state.col as isize + dc)?;
        (*self.lookup.at(index)).map(|slot| self.states[slot])
    }
}
