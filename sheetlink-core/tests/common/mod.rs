//! In-memory xlsx fixtures for integration tests

#![allow(dead_code)]

use sheetlink_core::reader::HYPERLINK_REL_TYPE;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// `<c>` element holding an inline string
pub fn inline(cell_ref: &str, text: &str) -> String {
    format!(r#"<c r="{cell_ref}" t="inlineStr"><is><t>{text}</t></is></c>"#)
}

/// `<c>` element pointing into the shared string table
pub fn shared(cell_ref: &str, index: usize) -> String {
    format!(r#"<c r="{cell_ref}" t="s"><v>{index}</v></c>"#)
}

pub fn row(index: u32, cells: &[String]) -> String {
    format!(r#"<row r="{index}">{}</row>"#, cells.concat())
}

/// Single-sheet workbook builder
#[derive(Default)]
pub struct XlsxFixture {
    sheet_name: String,
    rows: Vec<String>,
    shared_strings: Vec<String>,
    links: Vec<(String, String)>,
    deflated: bool,
    comment_bytes: usize,
}

impl XlsxFixture {
    pub fn new(sheet_name: &str) -> Self {
        Self {
            sheet_name: sheet_name.to_string(),
            ..Default::default()
        }
    }

    pub fn row(mut self, xml: String) -> Self {
        self.rows.push(xml);
        self
    }

    pub fn shared_strings(mut self, strings: &[&str]) -> Self {
        self.shared_strings = strings.iter().map(|s| s.to_string()).collect();
        self
    }

    /// Attach an external hyperlink to `range`
    pub fn link(mut self, range: &str, url: &str) -> Self {
        self.links.push((range.to_string(), url.to_string()));
        self
    }

    /// Compress every part with deflate instead of storing it
    pub fn deflated(mut self) -> Self {
        self.deflated = true;
        self
    }

    /// Pad the worksheet part with an XML comment of `len` bytes
    pub fn sheet_comment(mut self, len: usize) -> Self {
        self.comment_bytes = len;
        self
    }

    pub fn build(&self) -> anyhow::Result<Vec<u8>> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let method = if self.deflated {
            CompressionMethod::Deflated
        } else {
            CompressionMethod::Stored
        };
        let options = SimpleFileOptions::default().compression_method(method);

        zip.start_file("[Content_Types].xml", options)?;
        zip.write_all(
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
<Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>
</Types>"#,
        )?;

        zip.start_file("_rels/.rels", options)?;
        zip.write_all(
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
</Relationships>"#,
        )?;

        zip.start_file("xl/workbook.xml", options)?;
        write!(
            zip,
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="{MAIN_NS}" xmlns:r="{REL_NS}"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
            self.sheet_name
        )?;

        zip.start_file("xl/_rels/workbook.xml.rels", options)?;
        zip.write_all(
            br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/>
</Relationships>"#,
        )?;

        if !self.shared_strings.is_empty() {
            zip.start_file("xl/sharedStrings.xml", options)?;
            let items: String = self
                .shared_strings
                .iter()
                .map(|s| format!("<si><t>{s}</t></si>"))
                .collect();
            write!(
                zip,
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<sst xmlns="{MAIN_NS}" count="{n}" uniqueCount="{n}">{items}</sst>"#,
                n = self.shared_strings.len()
            )?;
        }

        zip.start_file("xl/worksheets/sheet1.xml", options)?;
        let hyperlinks = if self.links.is_empty() {
            String::new()
        } else {
            let anchors: String = self
                .links
                .iter()
                .enumerate()
                .map(|(i, (range, _))| format!(r#"<hyperlink ref="{range}" r:id="rId{}"/>"#, i + 1))
                .collect();
            format!("<hyperlinks>{anchors}</hyperlinks>")
        };
        let comment = if self.comment_bytes == 0 {
            String::new()
        } else {
            format!("<!--{}-->", "a".repeat(self.comment_bytes))
        };
        write!(
            zip,
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="{MAIN_NS}" xmlns:r="{REL_NS}">{comment}<sheetData>{}</sheetData>{hyperlinks}</worksheet>"#,
            self.rows.concat()
        )?;

        if !self.links.is_empty() {
            zip.start_file("xl/worksheets/_rels/sheet1.xml.rels", options)?;
            let rels: String = self
                .links
                .iter()
                .enumerate()
                .map(|(i, (_, url))| {
                    format!(
                        r#"<Relationship Id="rId{}" Type="{HYPERLINK_REL_TYPE}" Target="{url}" TargetMode="External"/>"#,
                        i + 1
                    )
                })
                .collect();
            write!(
                zip,
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">{rels}</Relationships>"#
            )?;
        }

        Ok(zip.finish()?.into_inner())
    }
}

/// Header ["Title", "URL"], Google on row 2, blank row 3, GitHub on row 4
pub fn google_github_workbook() -> anyhow::Result<Vec<u8>> {
    XlsxFixture::new("Links")
        .shared_strings(&["Title", "URL", "Google", "GitHub"])
        .row(row(1, &[shared("A1", 0), shared("B1", 1)]))
        .row(row(2, &[shared("A2", 2)]))
        .row(r#"<row r="3"/>"#.to_string())
        .row(row(4, &[shared("A4", 3)]))
        .link("A2", "https://google.com")
        .link("A4", "https://github.com")
        .build()
}
