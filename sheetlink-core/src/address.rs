//! A1-style cell addressing

use std::fmt;
use std::str::FromStr;

use crate::error::LinkError;

/// Largest column an xlsx sheet can address (`XFD`)
pub const MAX_COLUMN: u32 = 16_384;
/// Largest row an xlsx sheet can address
pub const MAX_ROW: u32 = 1_048_576;

/// A cell position with 1-based row and column indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellAddress {
    pub row: u32,
    pub col: u32,
}

impl CellAddress {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }

    /// Render as an A1 reference (e.g. `B7`)
    pub fn to_a1(&self) -> String {
        self.to_string()
    }

    /// Same column, different row
    pub fn with_row(&self, row: u32) -> Self {
        Self { row, col: self.col }
    }
}

impl Default for CellAddress {
    fn default() -> Self {
        CellAddress::new(1, 1)
    }
}

impl fmt::Display for CellAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_letters(self.col), self.row)
    }
}

impl FromStr for CellAddress {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_cell_ref(s).ok_or_else(|| LinkError::Processing(format!("invalid cell reference '{s}'")))
    }
}

/// Parse a cell reference like "B7" (absolute markers allowed) into a 1-based address
pub fn parse_cell_ref(cell_ref: &str) -> Option<CellAddress> {
    let trimmed = cell_ref.trim();
    let mut letters = String::new();
    let mut digits = String::new();

    for ch in trimmed.chars() {
        if ch == '$' {
            continue;
        }
        if ch.is_ascii_alphabetic() {
            // letters after digits ("1A") are not a reference
            if !digits.is_empty() {
                return None;
            }
            letters.push(ch);
        } else if ch.is_ascii_digit() {
            digits.push(ch);
        } else {
            return None;
        }
    }

    let col = column_index(&letters)?;
    let row = digits.parse::<u32>().ok()?;
    if row == 0 || row > MAX_ROW {
        return None;
    }

    Some(CellAddress { row, col })
}

/// Convert a 1-based column index to letters (1 -> A, 27 -> AA)
pub fn column_letters(col: u32) -> String {
    let mut n = col;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.reverse();
    String::from_utf8(letters).unwrap_or_default()
}

/// Convert column letters to a 1-based index (A -> 1, AA -> 27)
pub fn column_index(letters: &str) -> Option<u32> {
    if letters.is_empty() || letters.len() > 3 {
        return None;
    }

    let mut col = 0u32;
    for ch in letters.chars() {
        if !ch.is_ascii_alphabetic() {
            return None;
        }
        col = col * 26 + (ch.to_ascii_uppercase() as u32 - 'A' as u32 + 1);
    }

    (col <= MAX_COLUMN).then_some(col)
}

/// Rectangular block of cells, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRange {
    pub start: CellAddress,
    pub end: CellAddress,
}

impl CellRange {
    /// Parse "A1:B2" or a single "A1"
    pub fn parse(range: &str) -> Option<Self> {
        match range.trim().split_once(':') {
            Some((a, b)) => {
                let a = parse_cell_ref(a)?;
                let b = parse_cell_ref(b)?;
                Some(Self {
                    start: CellAddress::new(a.row.min(b.row), a.col.min(b.col)),
                    end: CellAddress::new(a.row.max(b.row), a.col.max(b.col)),
                })
            }
            None => {
                let cell = parse_cell_ref(range)?;
                Some(Self {
                    start: cell,
                    end: cell,
                })
            }
        }
    }

    /// Every address in the range, row by row
    pub fn cells(&self) -> impl Iterator<Item = CellAddress> + '_ {
        (self.start.row..=self.end.row).flat_map(move |row| {
            (self.start.col..=self.end.col).map(move |col| CellAddress::new(row, col))
        })
    }

    pub fn cell_count(&self) -> usize {
        let rows = (self.end.row - self.start.row + 1) as usize;
        let cols = (self.end.col - self.start.col + 1) as usize;
        rows * cols
    }
}

impl fmt::Display for CellRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}
