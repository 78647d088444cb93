//! sheetlink-core: hyperlink extraction and merge for Excel workbooks
//!
//! Reads the first worksheet of an `.xlsx` upload, pulls the hyperlinks out of
//! a named column or builds hyperlinks from `Title`/`URL` text columns, and
//! writes the result as a fresh workbook. [`LinkService`] is the entry point
//! used by the CLI and the web API.

pub mod address;
pub mod cache;
pub mod config;
pub mod error;
pub mod extract;
pub mod locator;
pub mod merge;
pub mod metrics;
pub mod reader;
pub mod service;
pub mod template;
pub mod url;
pub mod validate;
pub mod worksheet;
pub mod writer;

pub use address::{CellAddress, CellRange};
pub use config::{ProcessingConfig, SheetlinkConfig};
pub use error::{ErrorCode, ErrorReport, LinkError};
pub use extract::{ExtractLayout, Extraction, extract_links};
pub use locator::{ColumnLocation, locate_column};
pub use merge::{Merge, RejectedUrl, merge_pairs, merge_sheet};
pub use metrics::{InMemoryMetrics, MetricsSink, MetricsSnapshot};
pub use service::{ExtractionResult, HealthReport, HealthStatus, LinkService, MergeResult};
pub use template::{EXTRACT_TEMPLATE_FILE_NAME, MERGE_TEMPLATE_FILE_NAME};
pub use url::{UrlRejection, sanitize_url};
pub use validate::{FileKind, validate_upload};
pub use worksheet::{LinkRecord, Worksheet};
