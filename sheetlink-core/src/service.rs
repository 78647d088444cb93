//! Operation boundary: validation, processing, metrics and coded errors
//!
//! Every public operation returns a result value. Failures, including panics
//! raised while processing, are turned into an [`ErrorReport`] on that value.

use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Instant;

use log::{error, info, warn};
use serde::Serialize;

use crate::cache::TtlCache;
use crate::config::ProcessingConfig;
use crate::error::{ErrorCode, ErrorReport, LinkError};
use crate::extract::{ExtractLayout, extract_links};
use crate::merge::{INVALID_URL_MESSAGE, Merge, RejectedUrl, merge_pairs, merge_sheet};
use crate::metrics::{InMemoryMetrics, MetricsSink, MetricsSnapshot};
use crate::reader::read_first_sheet_limited;
use crate::template::{build_extract_template, build_merge_template};
use crate::validate::validate_upload;
use crate::worksheet::LinkRecord;
use crate::writer::write_workbook;

/// Links surfaced on a result; counts always cover every link
pub const PREVIEW_LIMIT: usize = 10;
pub const DEFAULT_LINK_COLUMN: &str = "Title";
pub const EXTRACT_TEMPLATE_KEY: &str = "template:extract";
pub const MERGE_TEMPLATE_KEY: &str = "template:merge";

/// Outcome of [`LinkService::extract`]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub total_rows: usize,
    pub links_found: usize,
    /// First links found, at most [`PREVIEW_LIMIT`]
    pub links: Vec<LinkRecord>,
    #[serde(skip)]
    pub output: Option<Vec<u8>>,
    pub error: Option<ErrorReport>,
}

impl ExtractionResult {
    fn failed(report: ErrorReport) -> Self {
        Self {
            error: Some(report),
            ..Default::default()
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Outcome of a merge operation
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    pub total_rows: usize,
    pub links_created: usize,
    /// First links created, at most [`PREVIEW_LIMIT`]
    pub links: Vec<LinkRecord>,
    /// Every row whose URL was refused
    pub rejected_rows: Vec<RejectedUrl>,
    #[serde(skip)]
    pub output: Option<Vec<u8>>,
    pub error: Option<ErrorReport>,
}

impl MergeResult {
    fn failed(report: ErrorReport) -> Self {
        Self {
            error: Some(report),
            ..Default::default()
        }
    }

    fn from_merge(merge: Merge, output: Vec<u8>) -> Self {
        Self {
            total_rows: merge.total_rows,
            links_created: merge.links.len(),
            links: merge.links.into_iter().take(PREVIEW_LIMIT).collect(),
            rejected_rows: merge.rejected,
            output: Some(output),
            error: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Single error string the way older clients expect it: the operation
    /// error if there is one, otherwise a generic URL error when any row was
    /// rejected.
    pub fn sticky_error(&self) -> Option<String> {
        if let Some(report) = &self.error {
            return Some(report.to_string());
        }
        (!self.rejected_rows.is_empty())
            .then(|| ErrorReport::new(ErrorCode::InvalidColumn, INVALID_URL_MESSAGE).to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    /// A panic was caught since start
    Degraded,
}

/// Liveness report with the service's cache and counter state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub uptime_secs: u64,
    pub cached_templates: usize,
    pub files_processed: u64,
    pub total_errors: u64,
    pub unexpected_errors: u64,
}

/// Hyperlink extraction and merge over in-memory workbook buffers
pub struct LinkService {
    config: ProcessingConfig,
    metrics: Arc<dyn MetricsSink>,
    templates: TtlCache<&'static str, Arc<Vec<u8>>>,
    started: Instant,
}

impl Default for LinkService {
    fn default() -> Self {
        Self::new(ProcessingConfig::default(), Arc::new(InMemoryMetrics::new()))
    }
}

impl LinkService {
    pub fn new(config: ProcessingConfig, metrics: Arc<dyn MetricsSink>) -> Self {
        let templates = TtlCache::new(config.template_cache_ttl());
        Self {
            config,
            metrics,
            templates,
            started: Instant::now(),
        }
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    /// Collect the hyperlinks under `column_name` (default `Title`)
    pub fn extract(
        &self,
        bytes: &[u8],
        column_name: Option<&str>,
        layout: ExtractLayout,
    ) -> ExtractionResult {
        let column_name = column_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(DEFAULT_LINK_COLUMN);
        let started = Instant::now();
        info!("Starting link extraction for column '{}'", column_name);

        let outcome = self.guard("extract", || {
            validate_upload(bytes, self.config.max_file_size_bytes())?;
            let sheet =
                read_first_sheet_limited(bytes, self.config.max_decompressed_size_bytes())?;
            let extraction =
                extract_links(&sheet, column_name, self.config.max_header_search_rows, layout)?;
            let output = write_workbook(&extraction.sheet)?;
            Ok((extraction, output))
        });

        let result = match outcome {
            Ok((extraction, output)) => {
                info!(
                    "Link extraction completed successfully. Total rows: {}, Links found: {}",
                    extraction.total_rows,
                    extraction.links.len()
                );
                ExtractionResult {
                    total_rows: extraction.total_rows,
                    links_found: extraction.links.len(),
                    links: extraction.links.into_iter().take(PREVIEW_LIMIT).collect(),
                    output: Some(output),
                    error: None,
                }
            }
            Err(report) => ExtractionResult::failed(report),
        };

        self.metrics.record_file_processed(
            bytes.len() as u64,
            result.total_rows as u64,
            started.elapsed(),
        );
        result
    }

    /// Turn the `Title` and `URL` columns of an uploaded workbook into hyperlinks
    pub fn merge_from_file(&self, bytes: &[u8]) -> MergeResult {
        let started = Instant::now();
        info!("Starting link merge from file");

        let outcome = self.guard("merge", || {
            validate_upload(bytes, self.config.max_file_size_bytes())?;
            let sheet =
                read_first_sheet_limited(bytes, self.config.max_decompressed_size_bytes())?;
            let merge = merge_sheet(
                &sheet,
                self.config.max_header_search_rows,
                self.config.max_url_length,
            )?;
            let output = write_workbook(&merge.sheet)?;
            Ok((merge, output))
        });

        let result = self.finish_merge(outcome);
        self.metrics.record_file_processed(
            bytes.len() as u64,
            result.total_rows as u64,
            started.elapsed(),
        );
        result
    }

    /// Merge parallel title and URL lists into a new workbook
    pub fn merge_pairs(&self, titles: &[String], urls: &[String]) -> MergeResult {
        let started = Instant::now();
        info!("Starting link merge from {} title/URL pairs", titles.len());

        let outcome = self.guard("merge_lists", || {
            let merge = merge_pairs(titles, urls, self.config.max_url_length)?;
            let output = write_workbook(&merge.sheet)?;
            Ok((merge, output))
        });

        let result = self.finish_merge(outcome);
        self.metrics
            .record_file_processed(0, result.total_rows as u64, started.elapsed());
        result
    }

    fn finish_merge(&self, outcome: Result<(Merge, Vec<u8>), ErrorReport>) -> MergeResult {
        match outcome {
            Ok((merge, output)) => {
                if !merge.rejected.is_empty() {
                    warn!("{} rows had invalid URLs and were skipped", merge.rejected.len());
                }
                info!(
                    "Link merge completed successfully. Total rows: {}, Links created: {}",
                    merge.total_rows,
                    merge.links.len()
                );
                MergeResult::from_merge(merge, output)
            }
            Err(report) => MergeResult::failed(report),
        }
    }

    /// Extraction sample workbook, cached under `template:extract`
    pub fn create_template(&self) -> Result<Arc<Vec<u8>>, ErrorReport> {
        self.cached_template(EXTRACT_TEMPLATE_KEY, build_extract_template)
    }

    /// Merge sample workbook, cached under `template:merge`
    pub fn create_merge_template(&self) -> Result<Arc<Vec<u8>>, ErrorReport> {
        self.cached_template(MERGE_TEMPLATE_KEY, build_merge_template)
    }

    fn cached_template(
        &self,
        key: &'static str,
        build: fn() -> Result<Vec<u8>, LinkError>,
    ) -> Result<Arc<Vec<u8>>, ErrorReport> {
        self.guard(key, || {
            self.templates
                .get_or_try_insert_with(key, || build().map(Arc::new))
        })
    }

    /// Drop cached templates that have not been read within the TTL
    pub fn purge_template_cache(&self) {
        self.templates.purge_expired();
    }

    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn health(&self) -> HealthReport {
        let snapshot = self.metrics.snapshot();
        let unexpected_errors = snapshot
            .errors
            .get(ErrorCode::Unexpected.label())
            .copied()
            .unwrap_or(0);
        HealthReport {
            status: if unexpected_errors == 0 {
                HealthStatus::Healthy
            } else {
                HealthStatus::Degraded
            },
            uptime_secs: self.started.elapsed().as_secs(),
            cached_templates: self.templates.len(),
            files_processed: snapshot.files_processed,
            total_errors: snapshot.total_errors(),
            unexpected_errors,
        }
    }

    /// Run `op`, converting errors and panics into a coded report
    fn guard<T>(
        &self,
        operation: &str,
        op: impl FnOnce() -> Result<T, LinkError>,
    ) -> Result<T, ErrorReport> {
        let outcome = match catch_unwind(AssertUnwindSafe(op)) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                let report = err.report();
                error!("{} failed: {}", operation, report);
                Err(report)
            }
            Err(payload) => {
                let report = ErrorReport::unexpected(panic_message(payload.as_ref()));
                error!("{} panicked: {}", operation, report);
                Err(report)
            }
        };

        match &outcome {
            Ok(_) => self.metrics.record_operation(operation, true),
            Err(report) => {
                self.metrics.record_error(report.code.label());
                self.metrics.record_operation(operation, false);
            }
        }
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::XLSX_SIGNATURE;

    #[test]
    fn test_invalid_upload_is_reported_not_raised() {
        let service = LinkService::default();
        let result = service.extract(&[0u8; 8], None, ExtractLayout::FullRow);

        assert!(!result.is_success());
        assert!(result.output.is_none());
        let report = result.error.unwrap();
        assert_eq!(report.code, ErrorCode::InvalidFileFormat);
        assert!(report.to_string().starts_with("E001: "));

        let snapshot = service.metrics_snapshot();
        assert_eq!(snapshot.files_processed, 1);
        assert_eq!(snapshot.total_bytes, 8);
        assert_eq!(snapshot.errors["invalid_file_format"], 1);
        assert_eq!(snapshot.operations["extract"].failure, 1);
    }

    #[test]
    fn test_corrupt_archive_is_io_error() {
        let service = LinkService::default();
        let mut bytes = XLSX_SIGNATURE.to_vec();
        bytes.extend_from_slice(b"garbage");
        let result = service.merge_from_file(&bytes);
        assert_eq!(result.error.unwrap().code, ErrorCode::Io);
    }

    #[test]
    fn test_guard_catches_panics() {
        let service = LinkService::default();
        let outcome: Result<(), ErrorReport> = service.guard("explode", || panic!("boom"));
        let report = outcome.unwrap_err();
        assert_eq!(report.code, ErrorCode::Unexpected);
        assert_eq!(report.to_string(), "E999: Error processing file: boom");
        assert_eq!(service.metrics_snapshot().errors["unexpected"], 1);
    }

    #[test]
    fn test_templates_are_cached() {
        let service = LinkService::default();
        let first = service.create_template().unwrap();
        let second = service.create_template().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let merge = service.create_merge_template().unwrap();
        assert!(!Arc::ptr_eq(&first, &merge));
        assert!(merge.starts_with(&XLSX_SIGNATURE));
    }

    #[test]
    fn test_health_reflects_cache_and_errors() {
        let service = LinkService::default();
        let health = service.health();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.cached_templates, 0);

        service.create_template().unwrap();
        service.extract(&[0u8; 8], None, ExtractLayout::FullRow);
        let health = service.health();
        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.cached_templates, 1);
        assert_eq!(health.files_processed, 1);
        assert_eq!(health.total_errors, 1);

        let _: Result<(), ErrorReport> = service.guard("explode", || panic!("boom"));
        let health = service.health();
        assert_eq!(health.status, HealthStatus::Degraded);
        assert_eq!(health.unexpected_errors, 1);

        let json = serde_json::to_value(&health).unwrap();
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["cachedTemplates"], 1);
    }

    #[test]
    fn test_merge_pairs_previews_and_sticky_error() {
        let service = LinkService::default();
        let titles: Vec<String> = (0..12).map(|i| format!("Link {i}")).collect();
        let mut urls: Vec<String> = (0..12).map(|i| format!("https://example.com/{i}")).collect();
        urls[5] = "not a url".to_string();

        let result = service.merge_pairs(&titles, &urls);
        assert!(result.is_success());
        assert!(result.output.is_some());
        assert_eq!(result.links_created, 11);
        assert_eq!(result.total_rows, 11);
        assert_eq!(result.links.len(), PREVIEW_LIMIT);
        assert_eq!(result.rejected_rows.len(), 1);
        assert_eq!(result.rejected_rows[0].source_row, 7);
        assert_eq!(result.sticky_error().as_deref(), Some("E002: Invalid URL format."));
    }

    #[test]
    fn test_merge_pairs_mismatch() {
        let service = LinkService::default();
        let result = service.merge_pairs(&["a".to_string()], &[]);
        assert_eq!(result.error.as_ref().unwrap().code, ErrorCode::InvalidInput);
        assert!(result.sticky_error().unwrap().starts_with("E004: "));
        assert_eq!(service.metrics_snapshot().operations["merge_lists"].failure, 1);
    }
}
