#![cfg(not(tarpaulin_include))]

use axum::{
    Json, Router,
    body::Body,
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

use crate::downloader;
use crate::error::ReportError;
use crate::filter::{RecordFilter, distinct_categories, distinct_clients};
use crate::graph::{GraphType, create_graph};
use crate::loader::{InputFormat, load_from_bytes};
use crate::record::SaleRecord;
use crate::report::SalesReport;
use crate::settings::Settings;
use crate::summary::PeriodSummary;

/// Rows shown in the preview table
const PREVIEW_ROWS: usize = 5;

/// Shared, read-only state of the server
pub struct AppState {
    settings: Settings,
}

/// Records parsed from one multipart upload, with the requested filter
struct Upload {
    records: Vec<SaleRecord>,
    filter: RecordFilter,
}

#[derive(Deserialize)]
struct ExportQuery {
    format: Option<String>,
}

#[derive(Serialize)]
struct PreviewResponse {
    status: String,
    record_count: usize,
    clients: Vec<String>,
    categories: Vec<String>,
    head: Vec<SaleRecord>,
    summary: Vec<PeriodSummary>,
}

#[derive(Serialize)]
struct ErrorResponse {
    status: String,
    kind: String,
    message: String,
}

/// `ReportError` as an HTTP response
struct ApiError(ReportError);

impl From<ReportError> for ApiError {
    fn from(err: ReportError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            err if err.is_input_error() => StatusCode::BAD_REQUEST,
            ReportError::EmptyResult => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            log::error!("report generation failed: {}", self.0);
        } else {
            log::warn!("rejected upload: {}", self.0);
        }

        let body = ErrorResponse {
            status: "error".to_string(),
            kind: self.0.kind().to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the application router
pub fn router(settings: Settings) -> Router {
    let static_dir = settings.server.static_dir.clone();
    let body_limit = settings.server.max_upload_bytes;
    let app_state = Arc::new(AppState { settings });

    Router::new()
        .route("/", get(serve_landing))
        .route("/api/preview", post(preview))
        .route("/api/chart/:kind", post(chart))
        .route("/api/export", post(export_summary))
        .route("/api/report", post(report_pdf))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(app_state)
}

/// Serve the upload form until the process is stopped
pub async fn run(settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    let address = settings.server.bind_address();
    let app = router(settings);

    let listener = TcpListener::bind(&address).await?;
    log::info!("Listening on http://{}", address);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_landing() -> Html<&'static str> {
    Html(include_str!("../static/index.html"))
}

/// Read the `file`, `clients` and `categories` fields of an upload form
async fn read_upload(settings: &Settings, mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut filter = RecordFilter::new();

    let bad_form = |e: axum::extract::multipart::MultipartError| {
        ReportError::InvalidInputFormat(format!("malformed upload: {}", e))
    };

    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let field_name = field.name().unwrap_or("unknown").to_string();

        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(bad_form)?;
                file = Some((file_name, data.to_vec()));
            }
            "clients" | "categories" => {
                let value = field.text().await.map_err(bad_form)?;
                let value = value.trim();
                if value.is_empty() {
                    continue;
                }
                if field_name == "clients" {
                    filter.clients.insert(value.to_string());
                } else {
                    filter.categories.insert(value.to_string());
                }
            }
            other => log::debug!("ignoring form field '{}'", other),
        }
    }

    let (file_name, data) = file.ok_or_else(|| {
        ReportError::InvalidInputFormat("No file data received".to_string())
    })?;
    let format = InputFormat::from_file_name(&file_name)?;
    log::info!(
        "received upload '{}' ({} bytes, {:?})",
        file_name,
        data.len(),
        format
    );

    let records = load_from_bytes(&data, format, &settings.columns)?;
    Ok(Upload { records, filter })
}

async fn preview(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<PreviewResponse>, ApiError> {
    let upload = read_upload(&state.settings, multipart).await?;
    let selected = upload.filter.apply(&upload.records);
    let report = SalesReport::from_records(&selected);

    Ok(Json(PreviewResponse {
        status: "ok".to_string(),
        record_count: report.record_count,
        clients: distinct_clients(&upload.records),
        categories: distinct_categories(&upload.records),
        head: selected.into_iter().take(PREVIEW_ROWS).collect(),
        summary: report.yearly,
    }))
}

async fn chart(
    Path(kind): Path<String>,
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let Some(graph_type) = GraphType::from_name(&kind) else {
        return Ok((StatusCode::NOT_FOUND, format!("unknown chart '{}'", kind)).into_response());
    };

    let upload = read_upload(&state.settings, multipart).await?;
    let report = SalesReport::build(&upload.records, &upload.filter)?;

    let task_state = state.clone();
    let png = render_blocking(move || {
        create_graph(&report, graph_type, &task_state.settings.chart)
    })
    .await?;

    match png {
        Some(png) => Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

async fn export_summary(
    Query(params): Query<ExportQuery>,
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = read_upload(&state.settings, multipart).await?;
    let report = SalesReport::build(&upload.records, &upload.filter)?;

    let (body, content_type, file_name) = match params.format.as_deref().unwrap_or("csv") {
        "csv" => (
            downloader::summary_to_csv(&report.yearly)?.into_bytes(),
            "text/csv",
            "sales_summary.csv",
        ),
        "xlsx" => (
            downloader::summary_to_xlsx(&report.yearly)?,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            "sales_summary.xlsx",
        ),
        other => {
            return Err(ReportError::InvalidInputFormat(format!(
                "unsupported export format: {}",
                other
            ))
            .into());
        }
    };

    Ok(attachment(body, content_type, file_name))
}

async fn report_pdf(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let upload = read_upload(&state.settings, multipart).await?;
    let report = SalesReport::build(&upload.records, &upload.filter)?;
    let task_state = state.clone();
    let pdf = render_blocking(move || report.render_pdf(&task_state.settings)).await?;
    log::info!("generated PDF report ({} bytes)", pdf.len());

    Ok(attachment(
        pdf,
        "application/pdf",
        &state.settings.report.file_name,
    ))
}

/// Run chart or PDF rendering on the blocking thread pool
async fn render_blocking<T, F>(task: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| ReportError::Export(format!("rendering task failed: {}", e)))?;
    Ok(result?)
}

/// Return bytes as a downloadable file
fn attachment(body: Vec<u8>, content_type: &str, file_name: &str) -> Response {
    let disposition = format!("attachment; filename=\"{}\"", file_name.replace('"', ""));
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from(body),
    )
        .into_response()
}
