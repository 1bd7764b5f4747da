use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CellRefError {
    #[error("cell reference is empty")]
    Empty,

    #[error("cell reference `{0}` must be column letters followed by a row number")]
    Malformed(String),

    #[error("row numbers start at 1, got `{0}`")]
    ZeroRow(String),
}

//
// ─── CELL REFERENCE ───────────────────────────────────────────────────────────
//

/// Zero-based grid coordinate, written in A1 notation (`B3` is column 1, row 2).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CellRef {
    col: u16,
    row: u32,
}

impl CellRef {
    #[must_use]
    pub const fn new(col: u16, row: u32) -> Self {
        Self { col, row }
    }

    #[must_use]
    pub fn col(&self) -> u16 {
        self.col
    }

    #[must_use]
    pub fn row(&self) -> u32 {
        self.row
    }

    /// Column letters for this reference (`0 -> A`, `26 -> AA`).
    #[must_use]
    pub fn column_name(&self) -> String {
        column_name(self.col)
    }
}

#[must_use]
pub fn column_name(col: u16) -> String {
    let mut n = u32::from(col) + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(char::from(b'A' + u8::try_from(rem).unwrap_or(0)));
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.column_name(), u64::from(self.row) + 1)
    }
}

impl fmt::Debug for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellRef({self})")
    }
}

impl FromStr for CellRef {
    type Err = CellRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(CellRefError::Empty);
        }

        let split = raw
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(|| CellRefError::Malformed(raw.to_string()))?;
        let (letters, digits) = raw.split_at(split);
        if letters.is_empty()
            || !letters.chars().all(|c| c.is_ascii_alphabetic())
            || !digits.chars().all(|c| c.is_ascii_digit())
        {
            return Err(CellRefError::Malformed(raw.to_string()));
        }

        let mut col: u32 = 0;
        for c in letters.chars() {
            let digit = u32::from(c.to_ascii_uppercase()) - u32::from('A') + 1;
            col = col
                .checked_mul(26)
                .and_then(|v| v.checked_add(digit))
                .ok_or_else(|| CellRefError::Malformed(raw.to_string()))?;
        }
        let col = u16::try_from(col - 1).map_err(|_| CellRefError::Malformed(raw.to_string()))?;

        let row: u32 = digits
            .parse()
            .map_err(|_| CellRefError::Malformed(raw.to_string()))?;
        if row == 0 {
            return Err(CellRefError::ZeroRow(raw.to_string()));
        }

        Ok(Self { col, row: row - 1 })
    }
}

impl TryFrom<String> for CellRef {
    type Error = CellRefError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CellRef> for String {
    fn from(value: CellRef) -> Self {
        value.to_string()
    }
}

//
// ─── CELL ACTIONS ─────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CellActionKind {
    /// First value typed into an empty cell.
    Edit,
    /// Any value starting with `=`.
    FormulaEntry,
    /// A non-formula value replacing existing content.
    DataChange,
}

impl CellActionKind {
    /// Classify an edit from the value it replaces and the value written.
    #[must_use]
    pub fn classify(previous: &str, new: &str) -> Self {
        if new.trim_start().starts_with('=') {
            Self::FormulaEntry
        } else if previous.trim().is_empty() {
            Self::Edit
        } else {
            Self::DataChange
        }
    }
}

/// One cell-edit event captured while a task window is open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellAction {
    pub at: DateTime<Utc>,
    pub kind: CellActionKind,
    pub cell: CellRef,
    pub previous: String,
    pub new: String,
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
