//! Builds hyperlink cells from separate Title and URL columns

use log::{info, warn};
use serde::Serialize;

use crate::address::CellAddress;
use crate::error::LinkError;
use crate::locator::require_column;
use crate::url::{UrlRejection, sanitize_url};
use crate::worksheet::{Cell, CellStyle, LinkRecord, Row, Worksheet};

pub const MERGE_SHEET_NAME: &str = "Merged Links";
pub const TITLE_COLUMN: &str = "Title";
pub const URL_COLUMN: &str = "URL";

/// Message reported for rejected URLs by callers that expect a single error
pub const INVALID_URL_MESSAGE: &str = "Invalid URL format.";

/// A source row whose URL did not survive sanitisation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedUrl {
    pub source_row: u32,
    pub title: String,
    pub url: String,
    pub reason: UrlRejection,
}

/// Output of a merge run
#[derive(Debug, Clone)]
pub struct Merge {
    /// Rows written below the header
    pub total_rows: usize,
    pub links: Vec<LinkRecord>,
    pub rejected: Vec<RejectedUrl>,
    pub sheet: Worksheet,
}

/// Merge the `Title` and `URL` columns of `source` into hyperlink cells.
///
/// Both headers are looked up independently; a missing `Title` is reported
/// before a missing `URL`. Data rows are every row after row 1.
pub fn merge_sheet(
    source: &Worksheet,
    max_search_rows: usize,
    max_url_length: usize,
) -> Result<Merge, LinkError> {
    let title = require_column(source, TITLE_COLUMN, max_search_rows)?;
    let url = require_column(source, URL_COLUMN, max_search_rows)?;

    let pairs = source.rows_below(1).map(|row| {
        let text = |col| {
            row.cell_in_column(col)
                .map(|c| c.as_text().trim().to_string())
                .unwrap_or_default()
        };
        (row.index, text(title.column), text(url.column))
    });

    Ok(build_merge(pairs, max_url_length))
}

/// Merge parallel title and URL lists. Entry `i` is treated as source row `i + 2`.
pub fn merge_pairs(
    titles: &[String],
    urls: &[String],
    max_url_length: usize,
) -> Result<Merge, LinkError> {
    if titles.len() != urls.len() {
        return Err(LinkError::InvalidInput(format!(
            "Title and URL counts must match ({} titles, {} URLs).",
            titles.len(),
            urls.len()
        )));
    }

    let pairs = titles
        .iter()
        .zip(urls)
        .enumerate()
        .map(|(i, (t, u))| (i as u32 + 2, t.trim().to_string(), u.trim().to_string()));

    Ok(build_merge(pairs, max_url_length))
}

fn build_merge(pairs: impl Iterator<Item = (u32, String, String)>, max_url_length: usize) -> Merge {
    let mut sheet = Worksheet::new(MERGE_SHEET_NAME);
    sheet.set_column_width(1, 40.0);
    sheet.set_column_width(2, 60.0);

    let mut header = Row::new(1);
    header
        .cells
        .push(Cell::text(CellAddress::new(1, 1), TITLE_COLUMN).styled(CellStyle::AccentHeader));
    header
        .cells
        .push(Cell::text(CellAddress::new(1, 2), URL_COLUMN).styled(CellStyle::AccentHeader));
    sheet.push_row(header);

    let mut links = Vec::new();
    let mut rejected = Vec::new();
    let mut next_row = 2u32;

    for (source_row, title, raw_url) in pairs {
        if title.is_empty() && raw_url.is_empty() {
            continue;
        }

        let url = match sanitize_url(&raw_url, max_url_length) {
            Ok(url) => url,
            Err(reason) => {
                warn!("Row {}: rejected URL '{}': {}", source_row, raw_url, reason);
                rejected.push(RejectedUrl {
                    source_row,
                    title,
                    url: raw_url,
                    reason,
                });
                continue;
            }
        };

        let mut row = Row::new(next_row);
        row.cells
            .push(Cell::text(CellAddress::new(next_row, 1), title.as_str()));
        let url_cell = CellAddress::new(next_row, 2);
        row.cells
            .push(Cell::text(url_cell, url.as_str()).styled(CellStyle::Link));
        sheet.add_hyperlink(url_cell, url.as_str());
        sheet.push_row(row);

        links.push(LinkRecord::new(next_row, title, url));
        next_row += 1;
    }

    info!(
        "Merge created {} links, rejected {} rows",
        links.len(),
        rejected.len()
    );

    Merge {
        total_rows: links.len(),
        links,
        rejected,
        sheet,
    }
}
