//! HTTP handlers for the `/api/file` endpoints

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use sheetlink_core::template::{EXTRACT_TEMPLATE_FILE_NAME, MERGE_TEMPLATE_FILE_NAME};
use sheetlink_core::{
    ErrorCode, ErrorReport, ExtractLayout, ExtractionResult, HealthReport, LinkRecord,
    LinkService, MergeResult, MetricsSnapshot, RejectedUrl,
};
use std::path::Path;
use std::sync::Arc;

const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Room for multipart boundaries and text fields on top of the file itself
const MULTIPART_OVERHEAD: usize = 64 * 1024;

const ALLOWED_EXTENSIONS: [&str; 2] = ["xlsx", "xls"];

pub struct AppState {
    pub service: LinkService,
}

pub type SharedState = Arc<AppState>;

pub fn router(state: SharedState) -> Router {
    let body_limit = state.service.config().max_file_size_bytes() + MULTIPART_OVERHEAD;
    Router::new()
        .route("/api/file/extract", post(extract))
        .route("/api/file/merge", post(merge))
        .route("/api/file/merge-lists", post(merge_lists))
        .route("/api/file/template", get(template))
        .route("/api/file/merge-template", get(merge_template))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// JSON error body with an optional error code
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: Option<ErrorCode>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<ErrorCode>,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            code: None,
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
            code: Some(ErrorCode::Unexpected),
        }
    }

    fn from_report(report: ErrorReport) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: report.to_string(),
            code: Some(report.code),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: &self.message,
            code: self.code,
        };
        (self.status, Json(body)).into_response()
    }
}

#[derive(Debug, Default)]
struct Upload {
    file_name: Option<String>,
    bytes: Vec<u8>,
    column_name: Option<String>,
    layout: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let read_error = |e: axum::extract::multipart::MultipartError| {
        ApiError::bad_request(format!("Could not read upload: {e}"))
    };

    let mut upload = Upload::default();
    while let Some(field) = multipart.next_field().await.map_err(read_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                upload.file_name = field.file_name().map(str::to_string);
                upload.bytes = field.bytes().await.map_err(read_error)?.to_vec();
            }
            "columnName" => upload.column_name = Some(field.text().await.map_err(read_error)?),
            "layout" => upload.layout = Some(field.text().await.map_err(read_error)?),
            _ => {}
        }
    }
    Ok(upload)
}

/// Reject uploads that are missing, too large or not named like a workbook
fn check_upload(upload: &Upload, max_file_size_bytes: usize) -> Result<(), ApiError> {
    if upload.bytes.is_empty() {
        return Err(ApiError::bad_request("No file uploaded."));
    }
    if upload.bytes.len() > max_file_size_bytes {
        return Err(ApiError::bad_request(format!(
            "File size exceeds maximum limit of {}MB.",
            max_file_size_bytes / (1024 * 1024)
        )));
    }

    let extension = upload
        .file_name
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .map(|ext| ext.to_string_lossy().to_lowercase());
    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(ApiError::bad_request(
            "Invalid file type. Only .xlsx and .xls files are allowed.",
        )),
    }
}

async fn run_blocking<T: Send + 'static>(
    state: SharedState,
    op: impl FnOnce(&LinkService) -> T + Send + 'static,
) -> Result<T, ApiError> {
    tokio::task::spawn_blocking(move || op(&state.service))
        .await
        .map_err(|e| {
            error!("Worker task failed: {}", e);
            ApiError::internal("An unexpected error occurred.")
        })
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractResponse {
    pub total_rows: usize,
    pub links_found: usize,
    pub links: Vec<LinkRecord>,
    pub output_file_base64: String,
}

impl TryFrom<ExtractionResult> for ExtractResponse {
    type Error = ApiError;

    fn try_from(result: ExtractionResult) -> Result<Self, ApiError> {
        if let Some(report) = result.error {
            return Err(ApiError::from_report(report));
        }
        let output = result
            .output
            .ok_or_else(|| ApiError::internal("Extraction produced no workbook."))?;
        Ok(Self {
            total_rows: result.total_rows,
            links_found: result.links_found,
            links: result.links,
            output_file_base64: STANDARD.encode(output),
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeResponse {
    pub total_rows: usize,
    pub links_created: usize,
    pub links: Vec<LinkRecord>,
    pub rejected_rows: Vec<RejectedUrl>,
    pub output_file_base64: String,
}

impl TryFrom<MergeResult> for MergeResponse {
    type Error = ApiError;

    fn try_from(result: MergeResult) -> Result<Self, ApiError> {
        if let Some(report) = result.error {
            return Err(ApiError::from_report(report));
        }
        let output = result
            .output
            .ok_or_else(|| ApiError::internal("Merge produced no workbook."))?;
        Ok(Self {
            total_rows: result.total_rows,
            links_created: result.links_created,
            links: result.links,
            rejected_rows: result.rejected_rows,
            output_file_base64: STANDARD.encode(output),
        })
    }
}

async fn extract(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<ExtractResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    check_upload(&upload, state.service.config().max_file_size_bytes())?;
    let layout = match upload.layout.as_deref() {
        Some(layout) => layout
            .parse::<ExtractLayout>()
            .map_err(|e| ApiError::bad_request(e.to_string()))?,
        None => ExtractLayout::FullRow,
    };
    info!(
        "Extract request for '{}' ({} bytes)",
        upload.file_name.as_deref().unwrap_or("upload"),
        upload.bytes.len()
    );

    let Upload {
        bytes, column_name, ..
    } = upload;
    let result = run_blocking(state, move |service| {
        service.extract(&bytes, column_name.as_deref(), layout)
    })
    .await?;
    Ok(Json(ExtractResponse::try_from(result)?))
}

async fn merge(
    State(state): State<SharedState>,
    multipart: Multipart,
) -> Result<Json<MergeResponse>, ApiError> {
    let upload = read_upload(multipart).await?;
    check_upload(&upload, state.service.config().max_file_size_bytes())?;
    info!(
        "Merge request for '{}' ({} bytes)",
        upload.file_name.as_deref().unwrap_or("upload"),
        upload.bytes.len()
    );

    let bytes = upload.bytes;
    let result = run_blocking(state, move |service| service.merge_from_file(&bytes)).await?;
    Ok(Json(MergeResponse::try_from(result)?))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeListsRequest {
    #[serde(default)]
    pub titles: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
}

async fn merge_lists(
    State(state): State<SharedState>,
    Json(request): Json<MergeListsRequest>,
) -> Result<Json<MergeResponse>, ApiError> {
    if request.titles.is_empty() && request.urls.is_empty() {
        warn!("Merge-lists request without data");
        return Err(ApiError::bad_request("No titles or URLs provided."));
    }
    let result = run_blocking(state, move |service| {
        service.merge_pairs(&request.titles, &request.urls)
    })
    .await?;
    Ok(Json(MergeResponse::try_from(result)?))
}

fn xlsx_attachment(file_name: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, XLSX_CONTENT_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

async fn template(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let bytes = run_blocking(state, |service| service.create_template())
        .await?
        .map_err(ApiError::from_report)?;
    Ok(xlsx_attachment(EXTRACT_TEMPLATE_FILE_NAME, bytes.to_vec()))
}

async fn merge_template(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let bytes = run_blocking(state, |service| service.create_merge_template())
        .await?
        .map_err(ApiError::from_report)?;
    Ok(xlsx_attachment(MERGE_TEMPLATE_FILE_NAME, bytes.to_vec()))
}

/// Liveness probe; a degraded service still answers 200
async fn health(State(state): State<SharedState>) -> Json<HealthReport> {
    Json(state.service.health())
}

async fn metrics(State(state): State<SharedState>) -> Json<MetricsSnapshot> {
    Json(state.service.metrics_snapshot())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn state() -> SharedState {
        Arc::new(AppState {
            service: LinkService::default(),
        })
    }

    fn upload(file_name: &str, bytes: &[u8]) -> Upload {
        Upload {
            file_name: Some(file_name.to_string()),
            bytes: bytes.to_vec(),
            ..Default::default()
        }
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_check_upload() {
        let max = 1024;
        assert!(check_upload(&upload("links.xlsx", b"PK\x03\x04"), max).is_ok());
        assert!(check_upload(&upload("OLD.XLS", b"data"), max).is_ok());

        let err = check_upload(&upload("links.csv", b"a,b"), max).unwrap_err();
        assert_eq!(err.message, "Invalid file type. Only .xlsx and .xls files are allowed.");

        let err = check_upload(&Upload::default(), max).unwrap_err();
        assert_eq!(err.message, "No file uploaded.");

        let big = vec![0u8; 2 * 1024 * 1024];
        let err = check_upload(&upload("big.xlsx", &big), 1024 * 1024).unwrap_err();
        assert_eq!(err.message, "File size exceeds maximum limit of 1MB.");
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_error_body_carries_code() {
        let report = ErrorReport::new(ErrorCode::InvalidColumn, "Column 'Title' not found.");
        let response = ApiError::from_report(report).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = json_body(response).await;
        assert_eq!(body["error"], "E002: Column 'Title' not found.");
        assert_eq!(body["code"], "E002");

        let body = json_body(ApiError::bad_request("No file uploaded.").into_response()).await;
        assert!(body.get("code").is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_merge_lists() {
        let request = MergeListsRequest {
            titles: vec!["Rust".to_string(), "Bad".to_string()],
            urls: vec!["https://www.rust-lang.org".to_string(), "ftp://x".to_string()],
        };
        let Json(response) = merge_lists(State(state()), Json(request)).await.unwrap();
        assert_eq!(response.links_created, 1);
        assert_eq!(response.rejected_rows.len(), 1);
        let workbook = STANDARD.decode(&response.output_file_base64).unwrap();
        assert!(workbook.starts_with(b"PK\x03\x04"));

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["rejectedRows"][0]["sourceRow"], 3);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_merge_lists_mismatch() {
        let request = MergeListsRequest {
            titles: vec!["Rust".to_string()],
            urls: Vec::new(),
        };
        let err = merge_lists(State(state()), Json(request)).await.unwrap_err();
        assert_eq!(err.code, Some(ErrorCode::InvalidInput));
        assert!(err.message.starts_with("E004: Title and URL counts must match"));

        let err = merge_lists(State(state()), Json(MergeListsRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_template_download() {
        let response = template(State(state())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert_eq!(disposition, "attachment; filename=\"link_extract_template.xlsx\"");
        assert_eq!(response.headers()[header::CONTENT_TYPE], XLSX_CONTENT_TYPE);

        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"PK\x03\x04"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_metrics_endpoint_reflects_work() {
        let state = state();
        let request = MergeListsRequest {
            titles: vec!["A".to_string()],
            urls: vec!["https://a.example".to_string()],
        };
        merge_lists(State(Arc::clone(&state)), Json(request)).await.unwrap();

        let Json(snapshot) = metrics(State(state)).await;
        assert_eq!(snapshot.files_processed, 1);
        assert_eq!(snapshot.operations["merge_lists"].success, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_health_reports_service_state() {
        let state = state();
        let Json(report) = health(State(Arc::clone(&state))).await;
        assert_eq!(report.status, sheetlink_core::HealthStatus::Healthy);
        assert_eq!(report.cached_templates, 0);

        template(State(Arc::clone(&state))).await.unwrap();
        let Json(report) = health(State(state)).await;
        assert_eq!(report.cached_templates, 1);
        assert_eq!(report.total_errors, 0);
    }

    #[test]
    fn test_router_builds() {
        let _ = router(state());
    }
}
