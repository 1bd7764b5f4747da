use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::cell::{CellAction, CellActionKind, CellRef};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GridError {
    #[error("cell {cell} is outside the {rows}x{cols} grid")]
    OutOfBounds { cell: CellRef, rows: u32, cols: u16 },
}

pub const GRID_ROWS: u32 = 12;
pub const GRID_COLS: u16 = 6;

const SAMPLE_SALES: [[&str; 6]; 6] = [
    ["Region", "Product", "Units", "Unit Price", "Revenue", "Notes"],
    ["North", "Widget", "120", "9.50", "", ""],
    ["South", "Gadget", "85", "14.00", "", ""],
    ["East", "Widget", "60", "9.50", "", ""],
    ["West", "Gizmo", "140", "7.25", "", ""],
    ["North", "Gizmo", "95", "7.25", "", ""],
];

/// Rectangular sheet of raw cell values, addressed with [`CellRef`].
///
/// Values are stored exactly as typed; formulas are kept as text and judged by
/// the evaluator rather than computed here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    cells: Vec<Vec<String>>,
}

impl Grid {
    /// Empty grid of the given size.
    #[must_use]
    pub fn blank(rows: u32, cols: u16) -> Self {
        let rows = usize::try_from(rows).unwrap_or(0);
        Self {
            cells: vec![vec![String::new(); usize::from(cols)]; rows],
        }
    }

    /// Standard sheet used by the spreadsheet tasks: a small sales table with a
    /// header row and empty `Revenue`/`Notes` columns to fill in.
    #[must_use]
    pub fn sample_sales() -> Self {
        let mut grid = Self::blank(GRID_ROWS, GRID_COLS);
        for (row, values) in SAMPLE_SALES.iter().enumerate() {
            for (col, value) in values.iter().enumerate() {
                grid.cells[row][col] = (*value).to_string();
            }
        }
        grid
    }

    #[must_use]
    pub fn rows(&self) -> u32 {
        u32::try_from(self.cells.len()).unwrap_or(u32::MAX)
    }

    #[must_use]
    pub fn cols(&self) -> u16 {
        self.cells
            .first()
            .map_or(0, |row| u16::try_from(row.len()).unwrap_or(u16::MAX))
    }

    /// Read a cell value.
    ///
    /// # Errors
    ///
    /// Returns `GridError::OutOfBounds` when the reference is outside the grid.
    pub fn get(&self, cell: CellRef) -> Result<&str, GridError> {
        let (row, col) = self.index(cell)?;
        Ok(&self.cells[row][col])
    }

    /// Write a value in place and describe the change as a [`CellAction`].
    ///
    /// # Errors
    ///
    /// Returns `GridError::OutOfBounds` when the reference is outside the grid.
    pub fn set(
        &mut self,
        cell: CellRef,
        value: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Result<CellAction, GridError> {
        let (row, col) = self.index(cell)?;
        let new = value.into();
        let previous = std::mem::replace(&mut self.cells[row][col], new.clone());
        Ok(CellAction {
            at,
            kind: CellActionKind::classify(&previous, &new),
            cell,
            previous,
            new,
        })
    }

    fn index(&self, cell: CellRef) -> Result<(usize, usize), GridError> {
        let out_of_bounds = || GridError::OutOfBounds {
            cell,
            rows: self.rows(),
            cols: self.cols(),
        };
        if cell.row() >= self.rows() || cell.col() >= self.cols() {
            return Err(out_of_bounds());
        }
        let row = usize::try_from(cell.row()).map_err(|_| out_of_bounds())?;
        Ok((row, usize::from(cell.col())))
    }
}

impl Default for Grid {
    fn default() -> Self {
        Self::sample_sales()
    }
}
