//! Error taxonomy and the coded reports handed to callers

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Every failure a core operation can produce
#[derive(Debug, Error)]
pub enum LinkError {
    /// Bad signature, empty or oversized upload
    #[error("{message}")]
    InvalidFileFormat { message: String, suggestion: String },

    /// The named header was not found within the search budget
    #[error("Column '{column}' not found in the first {searched_rows} rows of the spreadsheet.")]
    InvalidColumn { column: String, searched_rows: usize },

    /// Structural problem with an otherwise readable workbook
    #[error("{0}")]
    Processing(String),

    /// Caller supplied inconsistent arguments
    #[error("{0}")]
    InvalidInput(String),

    #[error("File is too large to process. Please reduce the file size and try again.")]
    OutOfMemory,

    #[error("Could not read the file. Check if it is corrupted or locked. Details: {0}")]
    Io(std::io::Error),

    #[error("Permission denied while reading the file. Please check file permissions.")]
    PermissionDenied(String),

    #[error("Could not read the file. Check if it is corrupted or locked. Details: {0}")]
    Archive(zip::result::ZipError),

    #[error("Malformed spreadsheet XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

impl LinkError {
    pub fn invalid_format(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        LinkError::InvalidFileFormat {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    pub fn invalid_column(column: impl Into<String>, searched_rows: usize) -> Self {
        LinkError::InvalidColumn {
            column: column.into(),
            searched_rows,
        }
    }

    /// Stable identifier, independent of message text
    pub fn code(&self) -> ErrorCode {
        match self {
            LinkError::InvalidFileFormat { .. } => ErrorCode::InvalidFileFormat,
            LinkError::InvalidColumn { .. } => ErrorCode::InvalidColumn,
            LinkError::Processing(_) | LinkError::Xml(_) => ErrorCode::Processing,
            LinkError::InvalidInput(_) => ErrorCode::InvalidInput,
            LinkError::OutOfMemory => ErrorCode::OutOfMemory,
            LinkError::Io(_) | LinkError::Archive(_) => ErrorCode::Io,
            LinkError::PermissionDenied(_) => ErrorCode::PermissionDenied,
        }
    }

    /// Remediation hint shown after the message
    pub fn suggestion(&self) -> Option<String> {
        match self {
            LinkError::InvalidFileFormat { suggestion, .. } => Some(suggestion.clone()),
            LinkError::InvalidColumn { column, searched_rows } => Some(format!(
                "Tip: Make sure a header cell named '{column}' exists within the first {searched_rows} rows. Matching ignores case."
            )),
            _ => None,
        }
    }

    /// Message with its suggestion appended
    pub fn full_message(&self) -> String {
        match self.suggestion() {
            Some(tip) => format!("{self} {tip}"),
            None => self.to_string(),
        }
    }

    /// Convert into the coded report carried by operation results
    pub fn report(&self) -> ErrorReport {
        ErrorReport::new(self.code(), self.full_message())
    }
}

impl From<std::io::Error> for LinkError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => LinkError::PermissionDenied(err.to_string()),
            std::io::ErrorKind::OutOfMemory => LinkError::OutOfMemory,
            _ => LinkError::Io(err),
        }
    }
}

impl From<zip::result::ZipError> for LinkError {
    fn from(err: zip::result::ZipError) -> Self {
        match err {
            zip::result::ZipError::Io(io) => io.into(),
            other => LinkError::Archive(other),
        }
    }
}

impl From<quick_xml::events::attributes::AttrError> for LinkError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        LinkError::Xml(err.into())
    }
}

impl From<std::collections::TryReserveError> for LinkError {
    fn from(_: std::collections::TryReserveError) -> Self {
        LinkError::OutOfMemory
    }
}

impl From<std::string::FromUtf8Error> for LinkError {
    fn from(err: std::string::FromUtf8Error) -> Self {
        LinkError::Processing(format!("invalid UTF-8 in spreadsheet part: {err}"))
    }
}

/// Short error identifiers surfaced to collaborators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorCode {
    #[serde(rename = "E001")]
    InvalidFileFormat,
    #[serde(rename = "E002")]
    InvalidColumn,
    #[serde(rename = "E003")]
    Processing,
    #[serde(rename = "E004")]
    InvalidInput,
    #[serde(rename = "E010")]
    OutOfMemory,
    #[serde(rename = "E011")]
    Io,
    #[serde(rename = "E012")]
    PermissionDenied,
    #[serde(rename = "E999")]
    Unexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidFileFormat => "E001",
            ErrorCode::InvalidColumn => "E002",
            ErrorCode::Processing => "E003",
            ErrorCode::InvalidInput => "E004",
            ErrorCode::OutOfMemory => "E010",
            ErrorCode::Io => "E011",
            ErrorCode::PermissionDenied => "E012",
            ErrorCode::Unexpected => "E999",
        }
    }

    /// Label used for the metrics error map
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCode::InvalidFileFormat => "invalid_file_format",
            ErrorCode::InvalidColumn => "invalid_column",
            ErrorCode::Processing => "processing",
            ErrorCode::InvalidInput => "invalid_input",
            ErrorCode::OutOfMemory => "out_of_memory",
            ErrorCode::Io => "io",
            ErrorCode::PermissionDenied => "permission_denied",
            ErrorCode::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coded error attached to a result value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorReport {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unexpected(detail: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::Unexpected,
            format!("Error processing file: {detail}"),
        )
    }
}

impl fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        let cases: Vec<(LinkError, &str)> = vec![
            (LinkError::invalid_format("bad", "tip"), "E001"),
            (LinkError::invalid_column("Title", 10), "E002"),
            (LinkError::Processing("x".into()), "E003"),
            (LinkError::InvalidInput("x".into()), "E004"),
            (LinkError::OutOfMemory, "E010"),
            (
                LinkError::from(std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof")),
                "E011",
            ),
            (
                LinkError::from(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "denied",
                )),
                "E012",
            ),
        ];

        for (err, code) in cases {
            assert_eq!(err.code().as_str(), code, "{err:?}");
        }
    }

    #[test]
    fn test_zip_io_error_routes_through_io_kind() {
        let zip_err = zip::result::ZipError::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "locked",
        ));
        assert_eq!(LinkError::from(zip_err).code(), ErrorCode::PermissionDenied);

        let zip_err = zip::result::ZipError::InvalidArchive("bad central directory".into());
        assert_eq!(LinkError::from(zip_err).code(), ErrorCode::Io);
    }

    #[test]
    fn test_report_includes_suggestion() {
        let err = LinkError::invalid_format("File is empty (0 bytes).", "Tip: re-save it.");
        let report = err.report();
        assert_eq!(report.code, ErrorCode::InvalidFileFormat);
        assert_eq!(report.to_string(), "E001: File is empty (0 bytes). Tip: re-save it.");

        let err = LinkError::invalid_column("URL", 10);
        let report = err.report();
        assert!(report.to_string().starts_with("E002: Column 'URL' not found"));
        assert!(report.message.contains("first 10 rows"));
    }
}
