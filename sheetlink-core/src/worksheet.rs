//! In-memory worksheet model: sparse rows of text cells plus out-of-band hyperlinks

use std::collections::HashMap;

use serde::Serialize;

use crate::address::CellAddress;

/// Visual marker carried alongside a cell. Maps onto the fixed `cellXfs`
/// table written by the workbook writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellStyle {
    #[default]
    Plain,
    /// Bold header text
    Header,
    /// Blue underlined text for hyperlink cells
    Link,
    /// Bold header on a blue fill (templates)
    TemplateHeader,
    /// Gray helper text
    Note,
    /// Bold header on a green fill (merge output)
    AccentHeader,
}

impl CellStyle {
    /// Index into the generated stylesheet's `cellXfs`
    pub fn xf_index(self) -> u32 {
        match self {
            CellStyle::Plain => 0,
            CellStyle::Header => 1,
            CellStyle::Link => 2,
            CellStyle::TemplateHeader => 3,
            CellStyle::Note => 4,
            CellStyle::AccentHeader => 5,
        }
    }
}

/// Cell payload. Everything the link engines look at is text; numbers are
/// kept apart only so they can be written back as numeric cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    /// Text rendering used for header matching and copying
    pub fn as_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Text(s) => s.clone(),
            CellValue::Number(n) => format_number(*n),
        }
    }

    /// Empty, or text made only of whitespace
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

/// Represents a single cell
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cell {
    pub address: CellAddress,
    pub value: CellValue,
    pub style: CellStyle,
}

impl Cell {
    pub fn text(address: CellAddress, text: impl Into<String>) -> Self {
        Self {
            address,
            value: CellValue::Text(text.into()),
            style: CellStyle::Plain,
        }
    }

    pub fn number(address: CellAddress, n: f64) -> Self {
        Self {
            address,
            value: CellValue::Number(n),
            style: CellStyle::Plain,
        }
    }

    pub fn styled(mut self, style: CellStyle) -> Self {
        self.style = style;
        self
    }

    pub fn col(&self) -> u32 {
        self.address.col
    }

    pub fn as_text(&self) -> String {
        self.value.as_text()
    }
}

/// A row of cells. Cells keep the order they were stored in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub index: u32,
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            cells: Vec::new(),
        }
    }

    /// Store `cell`, replacing any cell already held for its column
    pub fn set_cell(&mut self, cell: Cell) {
        match self.cells.iter_mut().find(|c| c.col() == cell.col()) {
            Some(existing) => *existing = cell,
            None => self.cells.push(cell),
        }
    }

    /// First cell stored for `col`
    pub fn cell_in_column(&self, col: u32) -> Option<&Cell> {
        self.cells.iter().find(|c| c.col() == col)
    }

    /// True when no cell carries visible content
    pub fn is_blank(&self) -> bool {
        self.cells.iter().all(|c| c.value.is_blank())
    }
}

/// Represents a worksheet
#[derive(Debug, Clone, Default)]
pub struct Worksheet {
    pub name: String,
    /// Rows sorted by row index; missing indices are simply absent
    pub rows: Vec<Row>,
    /// Hyperlink relations keyed by cell address
    pub hyperlinks: HashMap<CellAddress, String>,
    /// Fixed column widths as (1-based column, width)
    pub column_widths: Vec<(u32, f64)>,
}

impl Worksheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Append a row, keeping rows ordered by index
    pub fn push_row(&mut self, row: Row) {
        match self.rows.last() {
            Some(last) if last.index > row.index => {
                let pos = self.rows.partition_point(|r| r.index <= row.index);
                self.rows.insert(pos, row);
            }
            _ => self.rows.push(row),
        }
    }

    /// Row with the given index
    pub fn row(&self, index: u32) -> Option<&Row> {
        self.rows.iter().find(|r| r.index == index)
    }

    /// Cell at the given address
    pub fn cell(&self, address: CellAddress) -> Option<&Cell> {
        self.row(address.row)?.cell_in_column(address.col)
    }

    /// Hyperlink URL attached to `address`
    pub fn hyperlink(&self, address: CellAddress) -> Option<&str> {
        self.hyperlinks.get(&address).map(String::as_str)
    }

    pub fn add_hyperlink(&mut self, address: CellAddress, url: impl Into<String>) {
        self.hyperlinks.insert(address, url.into());
    }

    /// Hyperlinks in row-major order, the order they are written out in
    pub fn sorted_hyperlinks(&self) -> Vec<(CellAddress, &str)> {
        let mut links: Vec<_> = self
            .hyperlinks
            .iter()
            .map(|(addr, url)| (*addr, url.as_str()))
            .collect();
        links.sort_by_key(|(addr, _)| *addr);
        links
    }

    pub fn set_column_width(&mut self, col: u32, width: f64) {
        match self.column_widths.iter_mut().find(|(c, _)| *c == col) {
            Some(entry) => entry.1 = width,
            None => {
                self.column_widths.push((col, width));
                self.column_widths.sort_by_key(|(c, _)| *c);
            }
        }
    }

    /// Rows strictly below `header_row`
    pub fn rows_below(&self, header_row: u32) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(move |r| r.index > header_row)
    }
}

/// One hyperlink found by extraction or created by a merge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkRecord {
    pub row: u32,
    pub title: String,
    pub url: String,
}

impl LinkRecord {
    pub fn new(row: u32, title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            row,
            title: title.into(),
            url: url.into(),
        }
    }
}
