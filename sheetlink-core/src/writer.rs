//! Serialises a [`Worksheet`] into a single-sheet xlsx package

use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

use crate::address::CellAddress;
use crate::error::LinkError;
use crate::reader::HYPERLINK_REL_TYPE;
use crate::worksheet::{Cell, CellValue, Worksheet};

const MAIN_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

const CONTENT_TYPES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/worksheets/sheet1.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/></Types>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

const WORKBOOK_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#;

// cellXfs order must match CellStyle::xf_index
const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="4"><font><sz val="11"/><name val="Calibri"/><family val="2"/></font><font><b/><sz val="11"/><name val="Calibri"/><family val="2"/></font><font><b/><u/><sz val="11"/><color rgb="FF0000FF"/><name val="Calibri"/><family val="2"/></font><font><sz val="11"/><color rgb="FF888888"/><name val="Calibri"/><family val="2"/></font></fonts><fills count="4"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill><fill><patternFill patternType="solid"><fgColor rgb="FFD9EAF7"/><bgColor indexed="64"/></patternFill></fill><fill><patternFill patternType="solid"><fgColor rgb="FFD9F7E8"/><bgColor indexed="64"/></patternFill></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="6"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="0" borderId="0" xfId="0" applyFont="1"/><xf numFmtId="0" fontId="2" fillId="0" borderId="0" xfId="0" applyFont="1"/><xf numFmtId="0" fontId="1" fillId="2" borderId="0" xfId="0" applyFont="1" applyFill="1"/><xf numFmtId="0" fontId="3" fillId="0" borderId="0" xfId="0" applyFont="1"/><xf numFmtId="0" fontId="1" fillId="3" borderId="0" xfId="0" applyFont="1" applyFill="1"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

/// Render `sheet` as a complete xlsx file held in memory
pub fn write_workbook(sheet: &Worksheet) -> Result<Vec<u8>, LinkError> {
    let hyperlinks = sheet.sorted_hyperlinks();

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    // fixed timestamp keeps identical sheets byte-identical
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    zip.start_file("[Content_Types].xml", options)?;
    zip.write_all(CONTENT_TYPES_XML.as_bytes())?;

    zip.start_file("_rels/.rels", options)?;
    zip.write_all(ROOT_RELS_XML.as_bytes())?;

    zip.start_file("xl/workbook.xml", options)?;
    zip.write_all(&workbook_xml(&sheet.name)?)?;

    zip.start_file("xl/_rels/workbook.xml.rels", options)?;
    zip.write_all(WORKBOOK_RELS_XML.as_bytes())?;

    zip.start_file("xl/styles.xml", options)?;
    zip.write_all(STYLES_XML.as_bytes())?;

    zip.start_file("xl/worksheets/sheet1.xml", options)?;
    zip.write_all(&sheet_xml(sheet, &hyperlinks)?)?;

    if !hyperlinks.is_empty() {
        zip.start_file("xl/worksheets/_rels/sheet1.xml.rels", options)?;
        zip.write_all(&sheet_rels_xml(&hyperlinks)?)?;
    }

    Ok(zip.finish()?.into_inner())
}

fn new_writer() -> Result<Writer<Cursor<Vec<u8>>>, LinkError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    Ok(writer)
}

fn workbook_xml(sheet_name: &str) -> Result<Vec<u8>, LinkError> {
    let mut writer = new_writer()?;

    let mut workbook = BytesStart::new("workbook");
    workbook.push_attribute(("xmlns", MAIN_NS));
    workbook.push_attribute(("xmlns:r", REL_NS));
    writer.write_event(Event::Start(workbook))?;
    writer.write_event(Event::Start(BytesStart::new("sheets")))?;

    let mut entry = BytesStart::new("sheet");
    entry.push_attribute(("name", sheet_display_name(sheet_name).as_str()));
    entry.push_attribute(("sheetId", "1"));
    entry.push_attribute(("r:id", "rId1"));
    writer.write_event(Event::Empty(entry))?;

    writer.write_event(Event::End(BytesEnd::new("sheets")))?;
    writer.write_event(Event::End(BytesEnd::new("workbook")))?;
    Ok(writer.into_inner().into_inner())
}

/// Sheet names are limited to 31 characters and may not contain `[]:*?/\`
fn sheet_display_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
        .filter(|c| !c.is_control())
        .take(31)
        .collect();
    if cleaned.trim().is_empty() {
        "Sheet1".to_string()
    } else {
        cleaned
    }
}

fn sheet_xml(sheet: &Worksheet, hyperlinks: &[(CellAddress, &str)]) -> Result<Vec<u8>, LinkError> {
    let mut writer = new_writer()?;

    let mut worksheet = BytesStart::new("worksheet");
    worksheet.push_attribute(("xmlns", MAIN_NS));
    worksheet.push_attribute(("xmlns:r", REL_NS));
    writer.write_event(Event::Start(worksheet))?;

    if !sheet.column_widths.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("cols")))?;
        for (col, width) in &sheet.column_widths {
            let col = col.to_string();
            let width = width.to_string();
            let mut entry = BytesStart::new("col");
            entry.push_attribute(("min", col.as_str()));
            entry.push_attribute(("max", col.as_str()));
            entry.push_attribute(("width", width.as_str()));
            entry.push_attribute(("customWidth", "1"));
            writer.write_event(Event::Empty(entry))?;
        }
        writer.write_event(Event::End(BytesEnd::new("cols")))?;
    }

    writer.write_event(Event::Start(BytesStart::new("sheetData")))?;
    for row in &sheet.rows {
        if row.cells.is_empty() {
            continue;
        }
        // one cell per column; a later cell for the same column wins
        let cells: BTreeMap<u32, &Cell> = row.cells.iter().map(|c| (c.col(), c)).collect();

        let index = row.index.to_string();
        let mut row_start = BytesStart::new("row");
        row_start.push_attribute(("r", index.as_str()));
        writer.write_event(Event::Start(row_start))?;
        for cell in cells.into_values() {
            write_cell(&mut writer, cell)?;
        }
        writer.write_event(Event::End(BytesEnd::new("row")))?;
    }
    writer.write_event(Event::End(BytesEnd::new("sheetData")))?;

    if !hyperlinks.is_empty() {
        writer.write_event(Event::Start(BytesStart::new("hyperlinks")))?;
        for (i, (address, _)) in hyperlinks.iter().enumerate() {
            let reference = address.to_a1();
            let rid = format!("rId{}", i + 1);
            let mut link = BytesStart::new("hyperlink");
            link.push_attribute(("ref", reference.as_str()));
            link.push_attribute(("r:id", rid.as_str()));
            writer.write_event(Event::Empty(link))?;
        }
        writer.write_event(Event::End(BytesEnd::new("hyperlinks")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("worksheet")))?;
    Ok(writer.into_inner().into_inner())
}

fn write_cell(writer: &mut Writer<Cursor<Vec<u8>>>, cell: &Cell) -> Result<(), LinkError> {
    let reference = cell.address.to_a1();
    let style = cell.style.xf_index();
    let style_attr = style.to_string();

    let mut start = BytesStart::new("c");
    start.push_attribute(("r", reference.as_str()));
    if style != 0 {
        start.push_attribute(("s", style_attr.as_str()));
    }

    match &cell.value {
        CellValue::Empty => writer.write_event(Event::Empty(start))?,
        CellValue::Number(n) if n.is_finite() => {
            let value = n.to_string();
            writer.write_event(Event::Start(start))?;
            writer.write_event(Event::Start(BytesStart::new("v")))?;
            writer.write_event(Event::Text(BytesText::new(&value)))?;
            writer.write_event(Event::End(BytesEnd::new("v")))?;
            writer.write_event(Event::End(BytesEnd::new("c")))?;
        }
        // <v> has no spelling for NaN or infinity
        CellValue::Number(n) => write_inline_text(writer, start, &n.to_string())?,
        CellValue::Text(text) => write_inline_text(writer, start, text)?,
    }
    Ok(())
}

fn write_inline_text(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    mut start: BytesStart<'_>,
    text: &str,
) -> Result<(), LinkError> {
    let text = xml_safe_text(text);
    start.push_attribute(("t", "inlineStr"));
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Start(BytesStart::new("is")))?;
    let mut t = BytesStart::new("t");
    if text.trim() != text {
        t.push_attribute(("xml:space", "preserve"));
    }
    writer.write_event(Event::Start(t))?;
    writer.write_event(Event::Text(BytesText::new(&text)))?;
    writer.write_event(Event::End(BytesEnd::new("t")))?;
    writer.write_event(Event::End(BytesEnd::new("is")))?;
    writer.write_event(Event::End(BytesEnd::new("c")))?;
    Ok(())
}

/// Drop characters XML 1.0 cannot carry
fn xml_safe_text(text: &str) -> String {
    text.chars()
        .filter(|&c| matches!(c, '\t' | '\n' | '\r') || !c.is_control())
        .collect()
}

fn sheet_rels_xml(hyperlinks: &[(CellAddress, &str)]) -> Result<Vec<u8>, LinkError> {
    let mut writer = new_writer()?;

    let mut root = BytesStart::new("Relationships");
    root.push_attribute((
        "xmlns",
        "http://schemas.openxmlformats.org/package/2006/relationships",
    ));
    writer.write_event(Event::Start(root))?;

    for (i, (_, url)) in hyperlinks.iter().enumerate() {
        let rid = format!("rId{}", i + 1);
        let target = xml_safe_text(url);
        let mut rel = BytesStart::new("Relationship");
        rel.push_attribute(("Id", rid.as_str()));
        rel.push_attribute(("Type", HYPERLINK_REL_TYPE));
        rel.push_attribute(("Target", target.as_str()));
        rel.push_attribute(("TargetMode", "External"));
        writer.write_event(Event::Empty(rel))?;
    }

    writer.write_event(Event::End(BytesEnd::new("Relationships")))?;
    Ok(writer.into_inner().into_inner())
}
