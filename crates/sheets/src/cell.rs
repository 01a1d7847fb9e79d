//! A1-style cell references.

use crate::SheetError;
use std::fmt;
use std::str::FromStr;

/// A single cell position, 1-based, ordered row-major.
///
/// Ordering by `(row, column)` matches the order cells must appear in a worksheet's
/// `sheetData`, which is what the sheet rewriter relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    row: u32,
    column: u32,
}

/// Excel's last column (`XFD`).
const MAX_COLUMN: u32 = 16_384;

/// Excel's last row.
const MAX_ROW: u32 = 1_048_576;

impl CellRef {
    /// Creates a reference from 1-based row and column numbers.
    ///
    /// # Errors
    ///
    /// Returns [`SheetError::InvalidCellRef`] if either coordinate is zero or beyond the
    /// spreadsheet limits.
    pub fn new(row: u32, column: u32) -> Result<Self, SheetError> {
        if row == 0 || row > MAX_ROW || column == 0 || column > MAX_COLUMN {
            return Err(SheetError::InvalidCellRef(format!(
                "row {} / column {} out of range",
                row, column
            )));
        }
        Ok(Self { row, column })
    }

    /// 1-based row number.
    pub fn row(&self) -> u32 {
        self.row
    }

    /// 1-based column number (`A` = 1).
    pub fn column(&self) -> u32 {
        self.column
    }

    /// Column letters for a 1-based column number (`1` → `A`, `28` → `AB`).
    pub fn column_letters(mut column: u32) -> String {
        let mut letters = Vec::new();
        while column > 0 {
            let rem = (column - 1) % 26;
            letters.push(b'A' + rem as u8);
            column = (column - 1) / 26;
        }
        letters.reverse();
        String::from_utf8(letters).unwrap_or_default()
    }
}

impl FromStr for CellRef {
    type Err = SheetError;

    /// Parses `B5`, `aa10`, or `$C$3` (absolute markers are ignored).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SheetError::InvalidCellRef(s.to_string());
        let cleaned: String = s.trim().chars().filter(|c| *c != '$').collect();

        let split = cleaned
            .find(|c: char| c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (letters, digits) = cleaned.split_at(split);
        if letters.is_empty() || letters.len() > 3 || !letters.chars().all(|c| c.is_ascii_alphabetic())
        {
            return Err(invalid());
        }
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid());
        }

        let column = letters
            .bytes()
            .fold(0u32, |acc, b| acc * 26 + u32::from(b.to_ascii_uppercase() - b'A' + 1));
        let row: u32 = digits.parse().map_err(|_| invalid())?;

        CellRef::new(row, column).map_err(|_| invalid())
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::column_letters(self.column), self.row)
    }
}
