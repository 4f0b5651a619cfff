//! Loading and validating grid input files.
//!
//! An input file is a JSON object holding exactly two array members:
//!
//! ```json
//! {
//!   "states":  [[-1, 1, 1], [1, 0, 1]],
//!   "rewards": [[10, -1, -1], [-1, 0, -1]]
//! }
//! ```
//!
//! `states` uses `-1` for terminal, `0` for barrier and `1` for active cells;
//! `rewards` may hold any numbers. Both grids must be rectangular and share a
//! shape. Every check happens before a model is built.

use std::fs;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::mdp::{CellType, Grid, GridMdp, MdpError, SolverConfig};

/// Name of the cell-type array in an input file.
pub const STATES_KEY: &str = "states";
/// Name of the reward array in an input file.
pub const REWARDS_KEY: &str = "rewards";

/// Reasons an input file is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    /// The file could not be read.
    #[error("unable to load file: {0}")]
    Io(String),
    /// The file is not valid JSON.
    #[error("unable to parse file: {0}")]
    Parse(String),
    /// The top level is not a JSON object.
    #[error("expected a JSON object holding the grids")]
    NotAnObject,
    /// The object does not hold exactly two arrays.
    #[error("expected exactly 2 arrays, found {0}")]
    ArrayCount(usize),
    /// One of the two required arrays is absent.
    #[error("missing array `{0}`")]
    MissingArray(&'static str),
    /// An array is not a list of rows.
    #[error("`{name}` row {row} is not an array")]
    NotAGrid {
        /// Array name.
        name: &'static str,
        /// Offending row.
        row: usize,
    },
    /// Rows of an array differ in length.
    #[error("`{name}` row {row} has {found} columns, expected {expected}")]
    Ragged {
        /// Array name.
        name: &'static str,
        /// Offending row.
        row: usize,
        /// Length of the first row.
        expected: usize,
        /// Length of the offending row.
        found: usize,
    },
    /// A grid has no cells.
    #[error("`{0}` is empty")]
    Empty(&'static str),
    /// The two arrays differ in shape.
    #[error("arrays do not have the same shape: {states:?} and {rewards:?}")]
    ShapeMismatch {
        /// Shape of `states`.
        states: (usize, usize),
        /// Shape of `rewards`.
        rewards: (usize, usize),
    },
    /// `states` holds a value that is not an integer.
    #[error("states array is not integer: {value} at ({row}, {col})")]
    NonIntegerStates {
        /// Row of the value.
        row: usize,
        /// Column of the value.
        col: usize,
        /// The value as written.
        value: String,
    },
    /// `rewards` holds a value that is not a number.
    #[error("rewards array is not numerical: {value} at ({row}, {col})")]
    NonNumericRewards {
        /// Row of the value.
        row: usize,
        /// Column of the value.
        col: usize,
        /// The value as written.
        value: String,
    },
    /// `states` holds an integer outside {-1, 0, 1}.
    #[error("states array has invalid value {value} at ({row}, {col}) (allowed: -1, 0, 1)")]
    InvalidStateValue {
        /// Row of the value.
        row: usize,
        /// Column of the value.
        col: usize,
        /// The value.
        value: i64,
    },
}

/// A validated pair of grids.
#[derive(Debug, Clone, PartialEq)]
pub struct GridInput {
    /// Cell type per cell.
    pub cells: Grid<CellType>,
    /// Reward per cell.
    pub rewards: Grid<f64>,
}

impl GridInput {
    /// Parse and validate an input document.
    pub fn from_json_str(json: &str) -> Result<Self, InputError> {
        let document: Value =
            serde_json::from_str(json).map_err(|e| InputError::Parse(e.to_string()))?;
        Self::from_value(&document)
    }

    /// Validate an already-parsed input document.
    pub fn from_value(document: &Value) -> Result<Self, InputError> {
        let object = document.as_object().ok_or(InputError::NotAnObject)?;

        let arrays = object.values().filter(|v| v.is_array()).count();
        if arrays != 2 {
            return Err(InputError::ArrayCount(arrays));
        }
        let states = object
            .get(STATES_KEY)
            .ok_or(InputError::MissingArray(STATES_KEY))?;
        let rewards = object
            .get(REWARDS_KEY)
            .ok_or(InputError::MissingArray(REWARDS_KEY))?;

        let states = raw_grid(STATES_KEY, states)?;
        let rewards = raw_grid(REWARDS_KEY, rewards)?;
        if !states.same_shape(&rewards) {
            return Err(InputError::ShapeMismatch {
                states: states.shape(),
                rewards: rewards.shape(),
            });
        }

        let codes = typed_grid(&states, Value::as_i64, |row, col, v| {
            InputError::NonIntegerStates {
                row,
                col,
                value: v.to_string(),
            }
        })?;
        let rewards = typed_grid(&rewards, Value::as_f64, |row, col, v| {
            InputError::NonNumericRewards {
                row,
                col,
                value: v.to_string(),
            }
        })?;
        let cells = typed_grid(&codes, |&code| CellType::from_code(code), |row, col, &value| {
            InputError::InvalidStateValue { row, col, value }
        })?;

        Ok(Self { cells, rewards })
    }

    /// `(rows, cols)` of the input grids.
    pub fn shape(&self) -> (usize, usize) {
        self.cells.shape()
    }

    /// Build the MDP for these grids with the configured `p` and `gamma`.
    pub fn to_model(&self, config: &SolverConfig) -> Result<GridMdp, MdpError> {
        GridMdp::new(
            self.cells.clone(),
            self.rewards.clone(),
            config.slip_success,
            config.discount,
        )
    }
}

/// Read, parse and validate an input file.
pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<GridInput, InputError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| InputError::Io(e.to_string()))?;
    let input = GridInput::from_json_str(&content)?;
    debug!(path = %path.display(), shape = ?input.shape(), "loaded grid input");
    Ok(input)
}

/// Check that `value` is a non-empty rectangular list of rows.
fn raw_grid(name: &'static str, value: &Value) -> Result<Grid<Value>, InputError> {
    let rows = value.as_array().ok_or(InputError::NotAGrid { name, row: 0 })?;
    let mut parsed = Vec::with_capacity(rows.len());
    for (row, cells) in rows.iter().enumerate() {
        let cells = cells.as_array().ok_or(InputError::NotAGrid { name, row })?;
        if let Some(first) = parsed.first().map(Vec::len) {
            if cells.len() != first {
                return Err(InputError::Ragged {
                    name,
                    row,
                    expected: first,
                    found: cells.len(),
                });
            }
        }
        parsed.push(cells.clone());
    }

    let grid = Grid::from_rows(parsed).ok_or(InputError::Empty(name))?;
    if grid.is_empty() {
        return Err(InputError::Empty(name));
    }
    Ok(grid)
}

/// Convert every cell with `convert`, reporting the first failure via `error`.
fn typed_grid<T, U, C, E>(grid: &Grid<T>, mut convert: C, error: E) -> Result<Grid<U>, InputError>
where
    C: FnMut(&T) -> Option<U>,
    E: Fn(usize, usize, &T) -> InputError,
{
    let cols = grid.cols();
    let cells = grid
        .as_slice()
        .iter()
        .enumerate()
        .map(|(i, v)| convert(v).ok_or_else(|| error(i / cols, i % cols, v)))
        .collect::<Result<Vec<U>, InputError>>()?;
    // Same length as the source grid, so the shape always fits.
    Grid::from_vec(grid.rows(), cols, cells).ok_or(InputError::Empty("grid"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_valid_input() {
        let input = GridInput::from_json_str(
            r#"{ "states": [[-1, 1], [0, 1]], "rewards": [[10, -1], [0, -0.5]] }"#,
        )
        .unwrap();
        assert_eq!(input.shape(), (2, 2));
        assert_eq!(input.cells.get(0, 0), Some(&CellType::Terminal));
        assert_eq!(input.cells.get(1, 0), Some(&CellType::Barrier));
        assert_eq!(input.rewards.get(1, 1), Some(&-0.5));

        let mdp = input.to_model(&SolverConfig::default()).unwrap();
        assert_eq!(mdp.states().len(), 3);
    }

    #[test]
    fn test_wrong_array_count() {
        let err = GridInput::from_json_str(r#"{ "states": [[1]] }"#).unwrap_err();
        assert_eq!(err, InputError::ArrayCount(1));

        let err = GridInput::from_json_str(
            r#"{ "states": [[1]], "rewards": [[0]], "extra": [[0]] }"#,
        )
        .unwrap_err();
        assert_eq!(err, InputError::ArrayCount(3));
    }

    #[test]
    fn test_misnamed_array() {
        let err = GridInput::from_json_str(r#"{ "states": [[1]], "reward": [[0]] }"#).unwrap_err();
        assert_eq!(err, InputError::MissingArray(REWARDS_KEY));
    }

    #[test]
    fn test_shape_mismatch() {
        let err = GridInput::from_json_str(r#"{ "states": [[1, 1]], "rewards": [[0], [0]] }"#)
            .unwrap_err();
        assert_eq!(
            err,
            InputError::ShapeMismatch {
                states: (1, 2),
                rewards: (2, 1)
            }
        );
    }

    #[test]
    fn test_ragged_rows() {
        let err = GridInput::from_json_str(r#"{ "states": [[1, 1], [1]], "rewards": [[0, 0], [0]] }"#)
            .unwrap_err();
        assert!(matches!(err, InputError::Ragged { name: "states", row: 1, .. }));
    }

    #[test]
    fn test_non_integer_states() {
        let err = GridInput::from_json_str(r#"{ "states": [[1, 0.5]], "rewards": [[0, 0]] }"#)
            .unwrap_err();
        assert!(matches!(err, InputError::NonIntegerStates { row: 0, col: 1, .. }));
    }

    #[test]
    fn test_non_numeric_rewards() {
        let err = GridInput::from_json_str(r#"{ "states": [[1, 1]], "rewards": [[0, "a"]] }"#)
            .unwrap_err();
        assert!(matches!(err, InputError::NonNumericRewards { row: 0, col: 1, .. }));
    }

    #[test]
    fn test_out_of_range_state_value() {
        let err = GridInput::from_json_str(r#"{ "states": [[1], [2]], "rewards": [[0], [0]] }"#)
            .unwrap_err();
        assert_eq!(
            err,
            InputError::InvalidStateValue {
                row: 1,
                col: 0,
                value: 2
            }
        );
    }

    #[test]
    fn test_empty_and_malformed() {
        assert_eq!(
            GridInput::from_json_str(r#"{ "states": [], "rewards": [] }"#).unwrap_err(),
            InputError::Empty(STATES_KEY)
        );
        assert_eq!(
            GridInput::from_json_str("[1, 2]").unwrap_err(),
            InputError::NotAnObject
        );
        assert!(matches!(
            GridInput::from_json_str("{").unwrap_err(),
            InputError::Parse(_)
        ));
        assert_eq!(
            GridInput::from_json_str(r#"{ "states": [1], "rewards": [[0]] }"#).unwrap_err(),
            InputError::NotAGrid {
                name: STATES_KEY,
                row: 0
            }
        );
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "states": [[-1, 1, 1]], "rewards": [[1, 0, 0]] }}"#).unwrap();
        let input = load_and_validate(file.path()).unwrap();
        assert_eq!(input.shape(), (1, 3));

        assert!(matches!(
            load_and_validate("/definitely/not/here.json"),
            Err(InputError::Io(_))
        ));
    }
}
