//! Reads the first worksheet of an in-memory xlsx package
//!
//! Only what the link engines need is parsed: cell text, cell numbers and the
//! external hyperlink relations of the sheet. Styles, formulas and every
//! worksheet after the first are ignored.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use log::{debug, warn};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use zip::ZipArchive;
use zip::result::ZipError;

use crate::address::{CellAddress, CellRange, MAX_ROW, parse_cell_ref};
use crate::error::LinkError;
use crate::validate::XLS_SIGNATURE;
use crate::worksheet::{Cell, CellValue, Row, Worksheet};

/// Relationship type carried by external hyperlink targets
pub const HYPERLINK_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/hyperlink";

/// Ranges larger than this only bind their top-left cell
pub const MAX_HYPERLINK_RANGE_CELLS: usize = 65_536;

/// Unpacked bytes [`read_first_sheet`] accepts across all parts it reads
pub const DEFAULT_MAX_DECOMPRESSED_BYTES: usize = 160 * 1024 * 1024;

/// Parse the first worksheet of an xlsx buffer
pub fn read_first_sheet(bytes: &[u8]) -> Result<Worksheet, LinkError> {
    read_first_sheet_limited(bytes, DEFAULT_MAX_DECOMPRESSED_BYTES)
}

/// Parse the first worksheet, refusing packages whose parts unpack to more
/// than `max_decompressed_bytes` in total
pub fn read_first_sheet_limited(
    bytes: &[u8],
    max_decompressed_bytes: usize,
) -> Result<Worksheet, LinkError> {
    if bytes.starts_with(&XLS_SIGNATURE) {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "legacy .xls workbooks cannot be read; save the file as .xlsx and try again",
        )
        .into());
    }

    let mut package = Package::new(bytes, max_decompressed_bytes)?;

    let workbook_xml = package.read_part("xl/workbook.xml")?.ok_or_else(|| {
        LinkError::Processing("Workbook is missing xl/workbook.xml.".to_string())
    })?;
    let (sheet_name, sheet_rid) = first_sheet_entry(&workbook_xml)?;

    let sheet_path = match package.read_part("xl/_rels/workbook.xml.rels")? {
        Some(rels_xml) => parse_relationships(&rels_xml)?
            .remove(&sheet_rid)
            .map(|rel| resolve_target("xl", &rel.target)),
        None => None,
    }
    .unwrap_or_else(|| "xl/worksheets/sheet1.xml".to_string());
    debug!("Reading worksheet '{}' from {}", sheet_name, sheet_path);

    let shared_strings = match package.read_part("xl/sharedStrings.xml")? {
        Some(xml) => parse_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let sheet_xml = package.read_part(&sheet_path)?.ok_or_else(|| {
        LinkError::Processing(format!("Worksheet part '{sheet_path}' is missing."))
    })?;
    let (mut sheet, anchors) = parse_sheet(&sheet_xml, &shared_strings)?;
    sheet.name = sheet_name;

    if !anchors.is_empty() {
        let relationships = match package.read_part(&sheet_rels_path(&sheet_path))? {
            Some(xml) => parse_relationships(&xml)?,
            None => HashMap::new(),
        };
        bind_hyperlinks(&mut sheet, anchors, &relationships);
    }

    debug!(
        "Worksheet '{}' has {} rows and {} hyperlinks",
        sheet.name,
        sheet.rows.len(),
        sheet.hyperlinks.len()
    );
    Ok(sheet)
}

/// Zip package with a shared budget for unpacked part data
struct Package<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
    limit: usize,
    remaining: usize,
}

impl<'a> Package<'a> {
    fn new(bytes: &'a [u8], limit: usize) -> Result<Self, LinkError> {
        Ok(Self {
            archive: ZipArchive::new(Cursor::new(bytes))?,
            limit,
            remaining: limit,
        })
    }

    /// Read a part as UTF-8, `None` when the part does not exist
    fn read_part(&mut self, name: &str) -> Result<Option<String>, LinkError> {
        let file = match self.archive.by_name(name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // declared sizes are not trusted; read at most one byte past the budget
        let mut raw = Vec::new();
        raw.try_reserve((file.size() as usize).min(self.remaining))?;
        file.take(self.remaining as u64 + 1).read_to_end(&mut raw)?;
        if raw.len() > self.remaining {
            return Err(decompressed_too_large(name, self.limit));
        }
        self.remaining -= raw.len();
        Ok(Some(String::from_utf8(raw)?))
    }
}

fn decompressed_too_large(part: &str, limit: usize) -> LinkError {
    warn!("Part '{}' pushed the unpacked workbook past {} bytes", part, limit);
    LinkError::invalid_format(
        format!(
            "Workbook expands beyond the maximum unpacked size of {}MB.",
            limit.div_ceil(1024 * 1024)
        ),
        "Tip: Remove unused sheets or split the workbook into smaller files.",
    )
}

/// Value of an unprefixed attribute
fn attr_value(e: &BytesStart<'_>, key: &[u8]) -> Result<Option<String>, LinkError> {
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Value of the relationship-namespace `id` attribute (`r:id`)
fn relationship_id(e: &BytesStart<'_>) -> Result<Option<String>, LinkError> {
    for attr in e.attributes().flatten() {
        if attr.key.prefix().is_some() && attr.key.local_name().as_ref() == b"id" {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

/// Name and relationship id of the first `<sheet>` in workbook.xml
fn first_sheet_entry(workbook_xml: &str) -> Result<(String, String), LinkError> {
    let mut reader = Reader::from_str(workbook_xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr_value(&e, b"name")?.unwrap_or_else(|| "Sheet1".to_string());
                let rid = relationship_id(&e)?.unwrap_or_default();
                return Ok((name, rid));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Err(LinkError::Processing(
        "Workbook does not contain any worksheets.".to_string(),
    ))
}

/// A `<Relationship>` entry of a `.rels` part
#[derive(Debug, Clone, PartialEq)]
struct Relationship {
    target: String,
    rel_type: String,
    external: bool,
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, Relationship>, LinkError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    let mut relationships = HashMap::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let Some(id) = attr_value(&e, b"Id")? {
                    let relationship = Relationship {
                        target: attr_value(&e, b"Target")?.unwrap_or_default(),
                        rel_type: attr_value(&e, b"Type")?.unwrap_or_default(),
                        external: attr_value(&e, b"TargetMode")?.as_deref() == Some("External"),
                    };
                    relationships.insert(id, relationship);
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(relationships)
}

/// Resolve a relationship target against the directory of its source part
fn resolve_target(base_dir: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }

    let mut parts: Vec<&str> = base_dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in target.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// `xl/worksheets/sheet1.xml` -> `xl/worksheets/_rels/sheet1.xml.rels`
fn sheet_rels_path(sheet_path: &str) -> String {
    match sheet_path.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{sheet_path}.rels"),
    }
}

/// Shared string table, rich-text runs concatenated, phonetic runs skipped
fn parse_shared_strings(xml: &str) -> Result<Vec<String>, LinkError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut current = String::new();
    let mut in_item = false;
    let mut in_text = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => {
                    in_item = true;
                    current.clear();
                }
                b"rPh" => in_phonetic = true,
                b"t" if in_item && !in_phonetic => in_text = true,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"si" => strings.push(String::new()),
            Event::Text(e) if in_text => current.push_str(&e.unescape()?),
            Event::CData(e) if in_text => current.push_str(&String::from_utf8_lossy(e.as_ref())),
            Event::End(e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"rPh" => in_phonetic = false,
                b"si" => {
                    in_item = false;
                    strings.push(std::mem::take(&mut current));
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

/// `<hyperlink>` element before its relationship is resolved
#[derive(Debug, Clone)]
struct HyperlinkAnchor {
    range: String,
    rid: Option<String>,
}

/// Cell being assembled while its children are read
#[derive(Debug, Default)]
struct PendingCell {
    address: CellAddress,
    cell_type: Option<String>,
    value: String,
    inline: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum TextTarget {
    None,
    Value,
    Inline,
}

fn parse_sheet(
    xml: &str,
    shared_strings: &[String],
) -> Result<(Worksheet, Vec<HyperlinkAnchor>), LinkError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut sheet = Worksheet::default();
    let mut anchors = Vec::new();

    let mut row: Option<Row> = None;
    let mut last_row = 0u32;
    let mut next_col = 1u32;
    let mut cell: Option<PendingCell> = None;
    let mut text_target = TextTarget::None;
    let mut in_inline = false;
    let mut in_phonetic = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"row" => {
                    let index = row_index(&e, last_row)?;
                    last_row = index;
                    next_col = 1;
                    row = Some(Row::new(index));
                }
                b"c" => {
                    let pending = pending_cell(&e, last_row, next_col)?;
                    next_col = pending.address.col + 1;
                    cell = Some(pending);
                }
                b"v" if cell.is_some() => text_target = TextTarget::Value,
                b"is" => in_inline = true,
                b"rPh" => in_phonetic = true,
                b"t" if in_inline && !in_phonetic => text_target = TextTarget::Inline,
                b"hyperlink" => anchors.extend(hyperlink_anchor(&e)?),
                _ => {}
            },
            Event::Empty(e) => match e.local_name().as_ref() {
                b"row" => {
                    last_row = row_index(&e, last_row)?;
                    next_col = 1;
                }
                b"c" => {
                    let pending = pending_cell(&e, last_row, next_col)?;
                    next_col = pending.address.col + 1;
                    if let Some(row) = row.as_mut() {
                        row.set_cell(Cell {
                            address: pending.address,
                            ..Default::default()
                        });
                    }
                }
                b"hyperlink" => anchors.extend(hyperlink_anchor(&e)?),
                _ => {}
            },
            Event::Text(e) if text_target != TextTarget::None => {
                cell_text(&mut cell, text_target).push_str(&e.unescape()?)
            }
            Event::CData(e) if text_target != TextTarget::None => {
                cell_text(&mut cell, text_target).push_str(&String::from_utf8_lossy(e.as_ref()))
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => text_target = TextTarget::None,
                b"is" => in_inline = false,
                b"rPh" => in_phonetic = false,
                b"c" => {
                    if let Some(pending) = cell.take() {
                        let value = resolve_value(&pending, shared_strings)?;
                        if let Some(row) = row.as_mut() {
                            row.set_cell(Cell {
                                address: pending.address,
                                value,
                                ..Default::default()
                            });
                        }
                    }
                }
                b"row" => {
                    if let Some(done) = row.take() {
                        sheet.push_row(done);
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok((sheet, anchors))
}

/// Buffer the current text event belongs to
fn cell_text(cell: &mut Option<PendingCell>, target: TextTarget) -> &mut String {
    let pending = cell.get_or_insert_with(PendingCell::default);
    match target {
        TextTarget::Inline => &mut pending.inline,
        _ => &mut pending.value,
    }
}

fn row_index(e: &BytesStart<'_>, last_row: u32) -> Result<u32, LinkError> {
    let index = match attr_value(e, b"r")? {
        Some(r) => r
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|&index| index > 0)
            .ok_or_else(|| LinkError::Processing(format!("Invalid row number '{r}'.")))?,
        None => last_row.checked_add(1).ok_or_else(|| {
            LinkError::Processing(format!("Row after {last_row} is out of range."))
        })?,
    };
    if index > MAX_ROW {
        return Err(LinkError::Processing(format!(
            "Row number {index} exceeds the worksheet limit of {MAX_ROW}."
        )));
    }
    Ok(index)
}

fn pending_cell(e: &BytesStart<'_>, row: u32, next_col: u32) -> Result<PendingCell, LinkError> {
    let address = match attr_value(e, b"r")? {
        Some(r) => parse_cell_ref(&r)
            .ok_or_else(|| LinkError::Processing(format!("Invalid cell reference '{r}'.")))?,
        None => CellAddress::new(row.max(1), next_col),
    };

    Ok(PendingCell {
        address,
        cell_type: attr_value(e, b"t")?,
        ..Default::default()
    })
}

fn resolve_value(cell: &PendingCell, shared_strings: &[String]) -> Result<CellValue, LinkError> {
    let raw = cell.value.as_str();
    let value = match cell.cell_type.as_deref() {
        Some("s") => {
            let index: usize = raw.trim().parse().map_err(|_| {
                LinkError::Processing(format!(
                    "Cell {} has an invalid shared string index '{raw}'.",
                    cell.address
                ))
            })?;
            let text = shared_strings.get(index).ok_or_else(|| {
                LinkError::Processing(format!(
                    "Cell {} refers to missing shared string {index}.",
                    cell.address
                ))
            })?;
            CellValue::Text(text.clone())
        }
        Some("inlineStr") => CellValue::Text(cell.inline.clone()),
        Some("b") => CellValue::Text(if raw.trim() == "1" { "TRUE" } else { "FALSE" }.to_string()),
        Some("str") | Some("e") | Some("d") => CellValue::Text(raw.to_string()),
        _ if raw.is_empty() => CellValue::Empty,
        _ => match raw.trim().parse::<f64>() {
            Ok(n) if n.is_finite() => CellValue::Number(n),
            _ => CellValue::Text(raw.to_string()),
        },
    };
    Ok(value)
}

fn hyperlink_anchor(e: &BytesStart<'_>) -> Result<Option<HyperlinkAnchor>, LinkError> {
    let Some(range) = attr_value(e, b"ref")? else {
        return Ok(None);
    };
    Ok(Some(HyperlinkAnchor {
        range,
        rid: relationship_id(e)?,
    }))
}

/// Attach external hyperlink targets to the cells they cover
fn bind_hyperlinks(
    sheet: &mut Worksheet,
    anchors: Vec<HyperlinkAnchor>,
    relationships: &HashMap<String, Relationship>,
) {
    for anchor in anchors {
        // internal `location` links have no relationship
        let Some(rid) = anchor.rid else {
            continue;
        };
        let Some(rel) = relationships.get(&rid) else {
            warn!("Hyperlink {} refers to unknown relationship {}", anchor.range, rid);
            continue;
        };
        if rel.rel_type != HYPERLINK_REL_TYPE {
            continue;
        }
        if !rel.external {
            debug!("Hyperlink {} has a package-internal target", anchor.range);
        }
        let Some(range) = CellRange::parse(&anchor.range) else {
            warn!("Skipping hyperlink with invalid range '{}'", anchor.range);
            continue;
        };

        if range.cell_count() > MAX_HYPERLINK_RANGE_CELLS {
            sheet
                .hyperlinks
                .entry(range.start)
                .or_insert_with(|| rel.target.clone());
            continue;
        }
        for address in range.cells() {
            sheet
                .hyperlinks
                .entry(address)
                .or_insert_with(|| rel.target.clone());
        }
    }
}
