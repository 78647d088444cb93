//! Hyperlink extraction from a located column

use std::fmt;
use std::str::FromStr;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::address::CellAddress;
use crate::error::LinkError;
use crate::locator::{ColumnLocation, require_column};
use crate::worksheet::{Cell, CellStyle, LinkRecord, Row, Worksheet};

pub const EXTRACT_SHEET_NAME: &str = "Extracted Links";

/// Shape of the extraction workbook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractLayout {
    /// Header plus every non-blank data row, renumbered densely from row 2
    #[default]
    FullRow,
    /// One `Row | <column> | URL` line per link, numbered by source row
    Summary,
}

impl ExtractLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractLayout::FullRow => "full-row",
            ExtractLayout::Summary => "summary",
        }
    }
}

impl fmt::Display for ExtractLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtractLayout {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full-row" | "fullrow" | "full" => Ok(ExtractLayout::FullRow),
            "summary" => Ok(ExtractLayout::Summary),
            other => Err(LinkError::InvalidInput(format!(
                "Unknown extract layout '{other}'. Use 'full-row' or 'summary'."
            ))),
        }
    }
}

/// Links found in a worksheet and the workbook that presents them
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Data rows written to the output
    pub total_rows: usize,
    pub links: Vec<LinkRecord>,
    pub sheet: Worksheet,
}

/// Locate `column_name` and collect the hyperlinks attached to its data cells
pub fn extract_links(
    source: &Worksheet,
    column_name: &str,
    max_search_rows: usize,
    layout: ExtractLayout,
) -> Result<Extraction, LinkError> {
    let location = require_column(source, column_name, max_search_rows)?;
    info!(
        "Extracting links from column '{}' ({} layout)",
        column_name, layout
    );

    let extraction = match layout {
        ExtractLayout::FullRow => full_row(source, location),
        ExtractLayout::Summary => summary(source, location, column_name),
    };
    debug!(
        "Extraction wrote {} rows with {} links",
        extraction.total_rows,
        extraction.links.len()
    );
    Ok(extraction)
}

fn full_row(source: &Worksheet, location: ColumnLocation) -> Extraction {
    let mut sheet = Worksheet::new(EXTRACT_SHEET_NAME);
    sheet.set_column_width(1, 30.0);
    sheet.set_column_width(2, 50.0);

    let mut header = Row::new(1);
    if let Some(source_header) = source.row(location.header_row) {
        for cell in &source_header.cells {
            header.cells.push(
                Cell::text(CellAddress::new(1, cell.col()), cell.as_text()).styled(CellStyle::Header),
            );
        }
    }
    sheet.push_row(header);

    let mut links = Vec::new();
    let mut next_row = 2u32;

    for row in source.rows_below(location.header_row) {
        if row.is_blank() {
            continue;
        }

        let mut out = Row::new(next_row);
        for cell in &row.cells {
            let address = cell.address.with_row(next_row);
            let mut copy = Cell {
                address,
                value: cell.value.clone(),
                style: CellStyle::Plain,
            };

            if let Some(url) = source.hyperlink(cell.address) {
                copy.style = CellStyle::Link;
                sheet.add_hyperlink(address, url);
                if cell.col() == location.column {
                    links.push(LinkRecord::new(next_row, cell.as_text(), url));
                }
            }
            out.cells.push(copy);
        }

        sheet.push_row(out);
        next_row += 1;
    }

    Extraction {
        total_rows: (next_row - 2) as usize,
        links,
        sheet,
    }
}

fn summary(source: &Worksheet, location: ColumnLocation, column_name: &str) -> Extraction {
    let mut sheet = Worksheet::new(EXTRACT_SHEET_NAME);
    sheet.set_column_width(1, 10.0);
    sheet.set_column_width(2, 40.0);
    sheet.set_column_width(3, 60.0);

    let mut header = Row::new(1);
    for (col, title) in [(1, "Row"), (2, column_name), (3, "URL")] {
        header
            .cells
            .push(Cell::text(CellAddress::new(1, col), title).styled(CellStyle::Header));
    }
    sheet.push_row(header);

    let links: Vec<LinkRecord> = source
        .rows_below(location.header_row)
        .filter_map(|row| {
            let cell = row.cell_in_column(location.column)?;
            let url = source.hyperlink(cell.address)?;
            Some(LinkRecord::new(row.index, cell.as_text(), url))
        })
        .collect();

    for (i, link) in links.iter().enumerate() {
        let index = i as u32 + 2;
        let mut row = Row::new(index);
        row.cells
            .push(Cell::number(CellAddress::new(index, 1), f64::from(link.row)));
        row.cells
            .push(Cell::text(CellAddress::new(index, 2), link.title.as_str()));
        let url_cell = CellAddress::new(index, 3);
        row.cells
            .push(Cell::text(url_cell, link.url.as_str()).styled(CellStyle::Link));
        sheet.add_hyperlink(url_cell, link.url.as_str());
        sheet.push_row(row);
    }

    Extraction {
        total_rows: links.len(),
        links,
        sheet,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::worksheet::CellValue;

    fn text_row(sheet: &mut Worksheet, index: u32, texts: &[&str]) {
        let mut row = Row::new(index);
        for (i, text) in texts.iter().enumerate() {
            row.cells
                .push(Cell::text(CellAddress::new(index, i as u32 + 1), *text));
        }
        sheet.push_row(row);
    }

    /// Header at row 1, a blank row 3, links in column A
    fn google_github_sheet() -> Worksheet {
        let mut sheet = Worksheet::new("Sheet1");
        text_row(&mut sheet, 1, &["Title", "URL"]);
        text_row(&mut sheet, 2, &["Google"]);
        text_row(&mut sheet, 3, &["", "  "]);
        text_row(&mut sheet, 4, &["GitHub"]);
        sheet.add_hyperlink(CellAddress::new(2, 1), "https://google.com");
        sheet.add_hyperlink(CellAddress::new(4, 1), "https://github.com");
        sheet
    }

    #[test]
    fn test_full_row_renumbers_and_drops_blank_rows() {
        let extraction =
            extract_links(&google_github_sheet(), "Title", 10, ExtractLayout::FullRow).unwrap();

        assert_eq!(extraction.total_rows, 2);
        assert_eq!(
            extraction.links,
            vec![
                LinkRecord::new(2, "Google", "https://google.com"),
                LinkRecord::new(3, "GitHub", "https://github.com"),
            ]
        );

        let sheet = &extraction.sheet;
        assert_eq!(sheet.name, EXTRACT_SHEET_NAME);
        let header = sheet.row(1).unwrap();
        assert_eq!(header.cells[0].as_text(), "Title");
        assert_eq!(header.cells[0].style, CellStyle::Header);
        assert_eq!(header.cells[1].as_text(), "URL");

        let github = sheet.cell(CellAddress::new(3, 1)).unwrap();
        assert_eq!(github.as_text(), "GitHub");
        assert_eq!(github.style, CellStyle::Link);
        assert_eq!(sheet.hyperlink(CellAddress::new(3, 1)), Some("https://github.com"));
        assert!(sheet.row(4).is_none());
        assert_eq!(sheet.column_widths, vec![(1, 30.0), (2, 50.0)]);
    }

    #[test]
    fn test_full_row_keeps_links_outside_target_column() {
        let mut source = Worksheet::new("Sheet1");
        text_row(&mut source, 1, &["Name", "Title"]);
        text_row(&mut source, 2, &["docs", "Rust"]);
        source.add_hyperlink(CellAddress::new(2, 1), "https://docs.rs");
        source.add_hyperlink(CellAddress::new(2, 2), "https://rust-lang.org");

        let extraction = extract_links(&source, "title", 10, ExtractLayout::FullRow).unwrap();
        assert_eq!(
            extraction.links,
            vec![LinkRecord::new(2, "Rust", "https://rust-lang.org")]
        );
        // the non-target link is carried over but not reported
        assert_eq!(
            extraction.sheet.hyperlink(CellAddress::new(2, 1)),
            Some("https://docs.rs")
        );
        assert_eq!(
            extraction.sheet.cell(CellAddress::new(2, 1)).unwrap().style,
            CellStyle::Link
        );
    }

    #[test]
    fn test_header_below_first_row() {
        let mut source = Worksheet::new("Sheet1");
        text_row(&mut source, 1, &["Report"]);
        text_row(&mut source, 3, &["Title"]);
        text_row(&mut source, 4, &["Crates"]);
        source.add_hyperlink(CellAddress::new(4, 1), "https://crates.io");

        let extraction = extract_links(&source, "Title", 10, ExtractLayout::FullRow).unwrap();
        assert_eq!(extraction.total_rows, 1);
        assert_eq!(extraction.links, vec![LinkRecord::new(2, "Crates", "https://crates.io")]);
        assert_eq!(
            extraction.sheet.cell(CellAddress::new(1, 1)).unwrap().as_text(),
            "Title"
        );
    }

    #[test]
    fn test_rows_without_links_still_count() {
        let mut source = Worksheet::new("Sheet1");
        text_row(&mut source, 1, &["Title"]);
        text_row(&mut source, 2, &["plain"]);
        text_row(&mut source, 3, &["linked"]);
        source.add_hyperlink(CellAddress::new(3, 1), "https://example.org");

        let extraction = extract_links(&source, "Title", 10, ExtractLayout::FullRow).unwrap();
        assert_eq!(extraction.total_rows, 2);
        assert_eq!(extraction.links.len(), 1);
        assert_eq!(extraction.links[0].row, 3);
    }

    #[test]
    fn test_summary_layout() {
        let extraction =
            extract_links(&google_github_sheet(), "Title", 10, ExtractLayout::Summary).unwrap();

        assert_eq!(extraction.total_rows, 2);
        assert_eq!(
            extraction.links,
            vec![
                LinkRecord::new(2, "Google", "https://google.com"),
                LinkRecord::new(4, "GitHub", "https://github.com"),
            ]
        );

        let sheet = &extraction.sheet;
        let headers: Vec<String> = sheet.row(1).unwrap().cells.iter().map(|c| c.as_text()).collect();
        assert_eq!(headers, vec!["Row", "Title", "URL"]);
        assert_eq!(sheet.cell(CellAddress::new(3, 1)).unwrap().value, CellValue::Number(4.0));
        assert_eq!(sheet.cell(CellAddress::new(3, 2)).unwrap().as_text(), "GitHub");
        assert_eq!(sheet.hyperlink(CellAddress::new(3, 3)), Some("https://github.com"));
        assert_eq!(sheet.column_widths, vec![(1, 10.0), (2, 40.0), (3, 60.0)]);
    }

    #[test]
    fn test_missing_column() {
        let err = extract_links(&google_github_sheet(), "Link", 10, ExtractLayout::FullRow)
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidColumn);
    }

    #[test]
    fn test_layout_parsing() {
        assert_eq!("full-row".parse::<ExtractLayout>().unwrap(), ExtractLayout::FullRow);
        assert_eq!("Summary".parse::<ExtractLayout>().unwrap(), ExtractLayout::Summary);
        assert!("wide".parse::<ExtractLayout>().is_err());
        assert_eq!(ExtractLayout::default().to_string(), "full-row");
    }
}
