//! HTTP server for roster upload, browsing and export.
//!
//! # API Endpoints
//!
//! | Method | Path                          | Description                              |
//! |--------|-------------------------------|------------------------------------------|
//! | GET    | `/health`                     | Health check                             |
//! | GET    | `/api/editais`                | List rosters, newest upload first        |
//! | POST   | `/api/editais`                | Upload a roster CSV (multipart)          |
//! | GET    | `/api/editais/{id}`           | Filtered, paginated rows plus facets     |
//! | GET    | `/api/editais/{id}/download`  | Filtered rows as a CSV attachment        |
//! | GET    | `/api/logs`                   | SSE stream of import logs                |
//!
//! Authentication happens upstream; the acting username arrives in the
//! `X-Remote-User` header.

use axum::{
    extract::{DefaultBodyLimit, FromRequestParts, Multipart, Path, Query, State},
    http::{header, request::Parts, HeaderValue, Method, StatusCode},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_info, LOG_BROADCASTER};
use super::pagination::{page_param, Page};
use super::types::{DetailResponse, RosterSummary, UploadResponse};
use crate::config::{AppConfig, MAX_UPLOAD_SIZE};
use crate::error::{ImportError, ServerError, ServerResult};
use crate::export::{export_csv, export_filename};
use crate::facets::index_facets;
use crate::filter::{filter_rows, FilterSet};
use crate::importer::{import_rows, ImportAction, ImportRequest};
use crate::models::{RosterId, RosterKind};
use crate::parser::ingest;
use crate::store::RecordStore;

/// Header carrying the authenticated username.
pub const USER_HEADER: &str = "x-remote-user";

/// Longest accepted roster label.
const MAX_LABEL_LEN: usize = 50;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<RecordStore>,
    pub page_size: usize,
}

impl AppState {
    pub fn new(store: RecordStore, page_size: usize) -> Self {
        Self {
            store: Arc::new(store),
            page_size,
        }
    }
}

/// Username of the authenticated caller.
pub struct ActingUser(pub String);

impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| ActingUser(name.to_string()))
            .ok_or(ServerError::Unauthorized)
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCEPT,
            header::HeaderName::from_static(USER_HEADER),
        ])
        .expose_headers([header::CONTENT_TYPE, header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/editais", get(list_editais).post(upload_edital))
        .route("/api/editais/{id}", get(detail_edital))
        .route("/api/editais/{id}/download", get(download_edital))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE))
        .layer(cors)
        .with_state(state)
}

/// Start the HTTP server
pub async fn start_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = RecordStore::open(&config.data_dir)?;
    let app = router(AppState::new(store, config.page_size));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    println!("🚀 Editais server running on http://localhost:{}", config.port);
    println!("   Data directory: {}", config.data_dir.display());
    println!("   GET  /api/editais               - List rosters");
    println!("   POST /api/editais               - Upload roster CSV");
    println!("   GET  /api/editais/{{id}}          - Filtered rows and facets");
    println!("   GET  /api/editais/{{id}}/download - Filtered CSV export");
    println!("   GET  /api/logs                  - SSE log stream");
    println!("   GET  /health                    - Health check");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "editais",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// SSE endpoint for real-time log streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

async fn list_editais(State(state): State<AppState>) -> Json<Vec<RosterSummary>> {
    let summaries = state
        .store
        .list_rosters()
        .into_iter()
        .map(|roster| {
            let count = state.store.row_count(roster.id);
            RosterSummary::new(roster, count)
        })
        .collect();
    Json(summaries)
}

/// Upload form as received.
#[derive(Default)]
struct UploadForm {
    kind: Option<String>,
    label: Option<String>,
    file_name: Option<String>,
    file: Option<Vec<u8>>,
    confirm: bool,
}

fn is_checked(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "on" | "true" | "1" | "yes" | "sim"
    )
}

async fn read_upload_form(mut multipart: Multipart) -> ServerResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "csv_file" => {
                form.file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                form.file = Some(bytes.to_vec());
            }
            "tipo" | "numero_ano" | "confirmar_substituicao" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("Read error: {}", e)))?;
                match name.as_str() {
                    "tipo" => form.kind = Some(text),
                    "numero_ano" => form.label = Some(text),
                    _ => form.confirm = is_checked(&text),
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

async fn upload_edital(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    multipart: Multipart,
) -> ServerResult<Response> {
    let form = read_upload_form(multipart).await?;

    let kind: RosterKind = form
        .kind
        .as_deref()
        .ok_or_else(|| ServerError::BadRequest("tipo: this field is required".into()))?
        .parse()
        .map_err(|e| ServerError::BadRequest(format!("tipo: {}", e)))?;

    let label = form.label.as_deref().map(str::trim).unwrap_or("");
    if label.is_empty() {
        return Err(ServerError::BadRequest("numero_ano: this field is required".into()));
    }
    if label.chars().count() > MAX_LABEL_LEN {
        return Err(ServerError::BadRequest(format!(
            "numero_ano: at most {} characters",
            MAX_LABEL_LEN
        )));
    }

    let bytes = form
        .file
        .ok_or_else(|| ServerError::BadRequest("csv_file: no file provided".into()))?;
    let file_name = form.file_name.unwrap_or_default();

    log_info(format!(
        "📄 Upload '{}' ({} bytes) for '{} - {}' by '{}'",
        file_name,
        bytes.len(),
        kind,
        label,
        user
    ));

    let csv = ingest(&bytes, &file_name).map_err(ImportError::from)?;
    let (encoding, delimiter) = (csv.encoding, csv.delimiter_char());
    log_info(format!(
        "Encoding: {}, delimiter: '{}', columns: {}",
        encoding,
        delimiter,
        csv.headers.join(", ")
    ));

    let request = ImportRequest {
        kind,
        label: label.to_string(),
        confirm_replace: form.confirm,
        user,
    };
    // The commit writes the snapshot file and may wait on the store lock.
    let store = Arc::clone(&state.store);
    let outcome = tokio::task::spawn_blocking(move || import_rows(&store, &request, csv))
        .await
        .map_err(|e| ServerError::Internal(format!("import task failed: {e}")))??;

    let status = match outcome.action {
        ImportAction::Created => StatusCode::CREATED,
        ImportAction::Replaced => StatusCode::OK,
    };
    Ok((status, Json(UploadResponse::new(outcome, encoding, delimiter))).into_response())
}

async fn detail_edital(
    State(state): State<AppState>,
    Path(id): Path<RosterId>,
    Query(query): Query<Vec<(String, String)>>,
) -> ServerResult<Json<DetailResponse>> {
    let roster = state.store.get_roster(id)?;
    let rows = state.store.rows(id)?;
    let total_rows = rows.len();

    let facets = index_facets(&rows);
    let filters = FilterSet::from_query(query.iter().map(|(k, v)| (k, v)));
    let matching = filter_rows(rows, &filters);
    let page = Page::paginate(matching, page_param(&query), state.page_size);

    Ok(Json(DetailResponse {
        roster,
        filters,
        facets,
        total_rows,
        page,
    }))
}

async fn download_edital(
    State(state): State<AppState>,
    Path(id): Path<RosterId>,
    Query(query): Query<Vec<(String, String)>>,
) -> ServerResult<Response> {
    let roster = state.store.get_roster(id)?;
    let rows = state.store.rows(id)?;

    let filters = FilterSet::from_query(query.iter().map(|(k, v)| (k, v)));
    let matching = filter_rows(rows, &filters);
    let body = export_csv(&matching)?;

    let filename = export_filename(&roster);
    log_info(format!("⬇️  Export of {} rows as {}", matching.len(), filename));

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename))
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/csv; charset=utf-8"),
            ),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}
