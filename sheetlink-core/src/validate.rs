//! Upload validation by size and magic-number signature

use log::{info, warn};

use crate::error::LinkError;

/// ZIP local file header (`PK\x03\x04`), used by .xlsx packages
pub const XLSX_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
/// OLE2 compound file header, used by legacy .xls workbooks
pub const XLS_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

const BYTES_PER_MB: usize = 1024 * 1024;

/// Spreadsheet family recognised from the file signature
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// ZIP-packaged Office Open XML
    Xlsx,
    /// Legacy compound file
    Xls,
}

impl FileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileKind::Xlsx => "XLSX",
            FileKind::Xls => "XLS",
        }
    }
}

/// Check an uploaded buffer before any parsing happens.
///
/// Inspects at most the first 8 bytes and never mutates the buffer.
pub fn validate_upload(bytes: &[u8], max_file_size_bytes: usize) -> Result<FileKind, LinkError> {
    if bytes.len() > max_file_size_bytes {
        warn!("Upload exceeds maximum size: {} bytes", bytes.len());
        return Err(LinkError::invalid_format(
            format!(
                "File size ({}MB) exceeds maximum allowed size of {}MB.",
                bytes.len() / BYTES_PER_MB,
                max_file_size_bytes / BYTES_PER_MB
            ),
            "Tip: Try reducing the file size by removing unnecessary columns, rows, or formatting. Or split your data into smaller files.",
        ));
    }

    if bytes.is_empty() {
        warn!("Upload is empty");
        return Err(LinkError::invalid_format(
            "File is empty (0 bytes).",
            "Tip: Make sure the file uploaded correctly. Try re-saving your Excel file and uploading again.",
        ));
    }

    if bytes.len() < XLSX_SIGNATURE.len() {
        warn!("Upload is too small to be a workbook ({} bytes)", bytes.len());
        return Err(LinkError::invalid_format(
            "File is too small to be a valid Excel file.",
            "Tip: The file may be corrupted. Try opening it in Excel and re-saving as .xlsx format.",
        ));
    }

    let kind = if bytes.starts_with(&XLSX_SIGNATURE) {
        FileKind::Xlsx
    } else if bytes.starts_with(&XLS_SIGNATURE) {
        FileKind::Xls
    } else {
        warn!("Upload has an unknown file signature");
        return Err(LinkError::invalid_format(
            "File is not a valid Excel file (.xlsx or .xls).",
            "Tip: Make sure the file is actually an Excel file. If it's a CSV or other format, open it in Excel and save it as '.xlsx' format.",
        ));
    };

    info!(
        "Upload validated successfully ({} bytes, {})",
        bytes.len(),
        kind.as_str()
    );
    Ok(kind)
}
