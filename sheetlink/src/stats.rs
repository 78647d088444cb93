//! Hyperlink statistics for the first worksheet of a workbook

use serde::Serialize;
use sheetlink_core::address::column_letters;
use sheetlink_core::Worksheet;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
pub struct SheetStats {
    pub sheet_name: String,
    pub rows: usize,
    pub non_empty_cells: usize,
    pub hyperlinks: usize,
    pub columns: Vec<ColumnStats>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct ColumnStats {
    pub column: String,
    /// Text of the first-row cell in this column, if any
    pub header: Option<String>,
    pub hyperlinks: usize,
}

pub fn collect(sheet: &Worksheet) -> SheetStats {
    let mut per_column: BTreeMap<u32, usize> = BTreeMap::new();
    for address in sheet.hyperlinks.keys() {
        *per_column.entry(address.col).or_insert(0) += 1;
    }

    let first_row = sheet.rows.first();
    let columns = per_column
        .into_iter()
        .map(|(col, hyperlinks)| ColumnStats {
            column: column_letters(col),
            header: first_row
                .and_then(|row| row.cell_in_column(col))
                .map(|cell| cell.as_text())
                .filter(|text| !text.trim().is_empty()),
            hyperlinks,
        })
        .collect();

    SheetStats {
        sheet_name: sheet.name.clone(),
        rows: sheet.rows.len(),
        non_empty_cells: sheet
            .rows
            .iter()
            .flat_map(|row| &row.cells)
            .filter(|cell| !cell.value.is_blank())
            .count(),
        hyperlinks: sheet.hyperlinks.len(),
        columns,
    }
}
