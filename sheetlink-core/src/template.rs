//! Sample workbooks handed out as starting points for extraction and merge

use crate::address::CellAddress;
use crate::error::LinkError;
use crate::worksheet::{Cell, CellStyle, Row, Worksheet};
use crate::writer::write_workbook;

pub const TEMPLATE_SHEET_NAME: &str = "Data";
pub const EXTRACT_TEMPLATE_FILE_NAME: &str = "link_extract_template.xlsx";
pub const MERGE_TEMPLATE_FILE_NAME: &str = "link_merge_template.xlsx";

const EXTRACT_NOTE: &str = "Add hyperlinks to Title column. URLs will be extracted automatically.";
const MERGE_NOTE: &str = "Add your Title and URL values. URLs will be converted to hyperlinks.";

const EXTRACT_SAMPLES: [(&str, &str); 2] = [
    ("Example Link 1", "https://www.example.com"),
    ("Example Link 2", "https://www.google.com"),
];

const MERGE_SAMPLES: [(&str, &str); 3] = [
    ("Google", "https://www.google.com"),
    ("GitHub", "https://github.com"),
    ("Stack Overflow", "https://stackoverflow.com"),
];

fn header_row(style: CellStyle) -> Row {
    let mut row = Row::new(1);
    row.cells
        .push(Cell::text(CellAddress::new(1, 1), "Title").styled(style));
    row.cells
        .push(Cell::text(CellAddress::new(1, 2), "URL").styled(style));
    row
}

fn note_row(index: u32, text: &str) -> Row {
    let mut row = Row::new(index);
    row.cells
        .push(Cell::text(CellAddress::new(index, 1), text).styled(CellStyle::Note));
    row
}

/// Worksheet behind the extraction template: titles carrying hyperlinks
pub fn extract_template_sheet() -> Worksheet {
    let mut sheet = Worksheet::new(TEMPLATE_SHEET_NAME);
    sheet.set_column_width(1, 30.0);
    sheet.set_column_width(2, 50.0);
    sheet.push_row(header_row(CellStyle::TemplateHeader));

    for (i, (title, url)) in EXTRACT_SAMPLES.iter().enumerate() {
        let index = i as u32 + 2;
        let address = CellAddress::new(index, 1);
        let mut row = Row::new(index);
        row.cells.push(Cell::text(address, *title).styled(CellStyle::Link));
        sheet.push_row(row);
        sheet.add_hyperlink(address, *url);
    }

    sheet.push_row(note_row(EXTRACT_SAMPLES.len() as u32 + 3, EXTRACT_NOTE));
    sheet
}

/// Worksheet behind the merge template: plain Title and URL text columns
pub fn merge_template_sheet() -> Worksheet {
    let mut sheet = Worksheet::new(TEMPLATE_SHEET_NAME);
    sheet.set_column_width(1, 30.0);
    sheet.set_column_width(2, 50.0);
    sheet.push_row(header_row(CellStyle::AccentHeader));

    for (i, (title, url)) in MERGE_SAMPLES.iter().enumerate() {
        let index = i as u32 + 2;
        let mut row = Row::new(index);
        row.cells.push(Cell::text(CellAddress::new(index, 1), *title));
        row.cells.push(Cell::text(CellAddress::new(index, 2), *url));
        sheet.push_row(row);
    }

    sheet.push_row(note_row(MERGE_SAMPLES.len() as u32 + 3, MERGE_NOTE));
    sheet
}

/// Serialised extraction template
pub fn build_extract_template() -> Result<Vec<u8>, LinkError> {
    write_workbook(&extract_template_sheet())
}

/// Serialised merge template
pub fn build_merge_template() -> Result<Vec<u8>, LinkError> {
    write_workbook(&merge_template_sheet())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractLayout, extract_links};
    use crate::merge::merge_sheet;
    use crate::reader::read_first_sheet;

    #[test]
    fn test_extract_template_layout() {
        let sheet = extract_template_sheet();
        assert_eq!(sheet.name, "Data");
        assert_eq!(sheet.cell(CellAddress::new(1, 1)).unwrap().style, CellStyle::TemplateHeader);
        assert_eq!(sheet.hyperlink(CellAddress::new(2, 1)), Some("https://www.example.com"));
        assert_eq!(sheet.hyperlink(CellAddress::new(3, 1)), Some("https://www.google.com"));
        let note = sheet.cell(CellAddress::new(5, 1)).unwrap();
        assert_eq!(note.as_text(), EXTRACT_NOTE);
        assert_eq!(note.style, CellStyle::Note);
        assert!(sheet.row(4).is_none());
    }

    #[test]
    fn test_merge_template_layout() {
        let sheet = merge_template_sheet();
        assert_eq!(sheet.cell(CellAddress::new(1, 2)).unwrap().style, CellStyle::AccentHeader);
        assert_eq!(sheet.cell(CellAddress::new(4, 1)).unwrap().as_text(), "Stack Overflow");
        assert_eq!(sheet.cell(CellAddress::new(6, 1)).unwrap().as_text(), MERGE_NOTE);
        assert!(sheet.hyperlinks.is_empty());
    }

    #[test]
    fn test_templates_are_deterministic() {
        assert_eq!(build_extract_template().unwrap(), build_extract_template().unwrap());
        assert_eq!(build_merge_template().unwrap(), build_merge_template().unwrap());
    }

    #[test]
    fn test_extract_template_feeds_extraction() {
        let bytes = build_extract_template().unwrap();
        let sheet = read_first_sheet(&bytes).unwrap();
        let extraction = extract_links(&sheet, "Title", 10, ExtractLayout::FullRow).unwrap();
        assert_eq!(extraction.links.len(), 2);
        assert_eq!(extraction.links[0].url, "https://www.example.com");
        // the note row is data too, so it is copied without a link
        assert_eq!(extraction.total_rows, 3);
    }

    #[test]
    fn test_merge_template_feeds_merge() {
        let bytes = build_merge_template().unwrap();
        let sheet = read_first_sheet(&bytes).unwrap();
        let merge = merge_sheet(&sheet, 10, 2000).unwrap();
        assert_eq!(merge.links.len(), 3);
        // the note has a title but no URL
        assert_eq!(merge.rejected.len(), 1);
        assert_eq!(merge.rejected[0].source_row, 6);
    }
}
