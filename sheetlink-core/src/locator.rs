//! Header lookup within the first rows of a worksheet

use log::debug;

use crate::address::CellAddress;
use crate::error::LinkError;
use crate::worksheet::Worksheet;

/// Where a header cell was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnLocation {
    pub header_row: u32,
    pub column: u32,
}

impl ColumnLocation {
    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.header_row, self.column)
    }
}

/// Find the first cell whose text equals `column_name`, ignoring case.
///
/// Only the first `max_search_rows` stored rows are visited, whatever their
/// indices are. Cells are compared in storage order.
pub fn locate_column(
    sheet: &Worksheet,
    column_name: &str,
    max_search_rows: usize,
) -> Option<ColumnLocation> {
    let wanted = column_name.to_lowercase();

    sheet
        .rows
        .iter()
        .take(max_search_rows)
        .find_map(|row| {
            row.cells
                .iter()
                .find(|cell| cell.as_text().to_lowercase() == wanted)
                .map(|cell| ColumnLocation {
                    header_row: row.index,
                    column: cell.col(),
                })
        })
}

/// [`locate_column`], turning a miss into `InvalidColumn`
pub fn require_column(
    sheet: &Worksheet,
    column_name: &str,
    max_search_rows: usize,
) -> Result<ColumnLocation, LinkError> {
    match locate_column(sheet, column_name, max_search_rows) {
        Some(location) => {
            debug!(
                "Found column '{}' at {}",
                column_name,
                location.address()
            );
            Ok(location)
        }
        None => Err(LinkError::invalid_column(column_name, max_search_rows)),
    }
}
