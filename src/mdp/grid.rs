//! Row-major grid storage shared by the model, value functions and policies.

use serde::{Deserialize, Serialize};

/// A rectangular grid stored as a flat row-major vector.
///
/// Every per-cell quantity in the crate (cell types, rewards, values, policy
/// labels) lives in one of these, so a cell's flat index is the same in all
/// of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<T>,
}

/// A value function: one real value per cell.
pub type ValueGrid = Grid<f64>;

impl<T: Clone> Grid<T> {
    /// Create a grid with every cell set to `value`.
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self {
            rows,
            cols,
            cells: vec![value; rows * cols],
        }
    }
}

impl<T> Grid<T> {
    /// Build a grid from row-major cells.
    ///
    /// Returns `None` if `cells.len() != rows * cols`.
    pub fn from_vec(rows: usize, cols: usize, cells: Vec<T>) -> Option<Self> {
        if cells.len() != rows * cols {
            return None;
        }
        Some(Self { rows, cols, cells })
    }

    /// Build a grid from nested rows.
    ///
    /// Returns `None` for ragged input. An empty outer vector yields a 0x0 grid.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Option<Self> {
        let height = rows.len();
        let width = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|r| r.len() != width) {
            return None;
        }
        let cells = rows.into_iter().flatten().collect();
        Some(Self {
            rows: height,
            cols: width,
            cells,
        })
    }

    /// Number of rows.
    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Number of columns.
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Total number of cells.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// True if the grid has no cells.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Flat row-major index of `(row, col)`, or `None` when out of bounds.
    pub fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols).then(|| row * self.cols + col)
    }

    /// Flat index of a signed coordinate, or `None` when out of bounds.
    pub fn index_signed(&self, row: isize, col: isize) -> Option<usize> {
        if row < 0 || col < 0 {
            return None;
        }
        self.index(row as usize, col as usize)
    }

    /// Cell at `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        self.index(row, col).map(|i| &self.cells[i])
    }

    /// Mutable cell at `(row, col)`.
    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
        self.index(row, col).map(move |i| &mut self.cells[i])
    }

    /// Cell at a flat index. Panics when out of bounds, like slice indexing.
    pub fn at(&self, index: usize) -> &T {
        &self.cells[index]
    }

    /// Overwrite the cell at a flat index.
    pub fn set(&mut self, index: usize, value: T) {
        self.cells[index] = value;
    }

    /// Row-major view of all cells.
    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }

    /// Iterate over the rows as slices.
    pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> {
        // chunks(0) panics; an empty grid simply has no rows to yield.
        self.cells.chunks(self.cols.max(1)).take(self.rows)
    }

    /// Apply `f` to every cell, keeping the shape.
    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> Grid<U> {
        Grid {
            rows: self.rows,
            cols: self.cols,
            cells: self.cells.iter().map(f).collect(),
        }
    }

    /// True if both grids have the same shape.
    pub fn same_shape<U>(&self, other: &Grid<U>) -> bool {
        self.shape() == other.shape()
    }

    /// Nested-row copy of the grid.
    pub fn to_rows(&self) -> Vec<Vec<T>>
    where
        T: Clone,
    {
        self.iter_rows().map(<[T]>::to_vec).collect()
    }
}

impl ValueGrid {
    /// A value grid of zeros with the given shape.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    /// Largest absolute cell-wise difference between two value grids of the same shape.
    pub fn max_abs_diff(&self, other: &ValueGrid) -> f64 {
        self.cells
            .iter()
            .zip(other.cells.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }

    /// Largest absolute value in the grid (0 for an empty grid).
    pub fn max_abs(&self) -> f64 {
        self.cells.iter().map(|v| v.abs()).fold(0.0, f64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rows_and_indexing() {
        let grid = Grid::from_rows(vec![vec![1, 2, 3], vec![4, 5, 6]]).unwrap();
        assert_eq!(grid.shape(), (2, 3));
        assert_eq!(grid.index(1, 0), Some(3));
        assert_eq!(grid.get(1, 2), Some(&6));
        assert_eq!(grid.get(2, 0), None);
        assert_eq!(grid.index_signed(-1, 0), None);
        assert_eq!(grid.to_rows(), vec![vec![1, 2, 3], vec![4, 5, 6]]);
    }

    #[test]
    fn test_ragged_rows_rejected() {
        assert!(Grid::from_rows(vec![vec![1, 2], vec![3]]).is_none());
        assert!(Grid::from_vec(2, 2, vec![1, 2, 3]).is_none());
    }

    #[test]
    fn test_empty_grid_has_no_rows() {
        let grid: Grid<i32> = Grid::from_rows(vec![]).unwrap();
        assert!(grid.is_empty());
        assert_eq!(grid.iter_rows().count(), 0);
    }

    #[test]
    fn test_value_grid_diff() {
        let a = ValueGrid::from_rows(vec![vec![0.0, 1.0], vec![-2.0, 3.0]]).unwrap();
        let b = ValueGrid::zeros(2, 2);
        assert_eq!(a.max_abs_diff(&b), 3.0);
        assert_eq!(a.max_abs(), 3.0);
    }
}
