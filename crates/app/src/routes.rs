use crate::auth::{claims_from_headers, require_admin, SESSION_COOKIE};
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures_util::{Stream, StreamExt};
use rag_relay_core::{
    prepare_message, ChatOrchestrator, DocumentStore, Frame, HttpSnippetRetriever, IngestAction,
    IngestError, IngestPipeline, IngestRequest, OpenAiClient, RestStore, RetrievalOptions,
    SearchMode,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

const UPLOAD_BODY_LIMIT: usize = 20 * 1024 * 1024;
const FRAME_CHANNEL_CAPACITY: usize = 32;

pub type Orchestrator = ChatOrchestrator<HttpSnippetRetriever, OpenAiClient>;
pub type Pipeline = IngestPipeline<RestStore, OpenAiClient>;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub pipeline: Arc<Pipeline>,
    pub store: RestStore,
    pub session_secret: Arc<str>,
}

/// Synchronous failure payload: `{ok: false, error}` with a matching status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "ok": false, "error": self.message }))).into_response()
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat))
        .route("/admin/ingest", post(ingest))
        .route("/documents", get(list_documents))
        .route("/documents/{doc_name}", delete(delete_document))
        .route("/auth/me", get(me))
        .route("/auth/logout", post(logout))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

#[derive(Debug, Deserialize)]
struct ChatBody {
    #[serde(default)]
    message: String,
    match_count: Option<u32>,
    match_threshold: Option<f64>,
    search_mode: Option<SearchMode>,
}

fn frame_event(frame: Frame) -> Result<Event, Infallible> {
    let payload = serde_json::to_string(&frame).unwrap_or_else(|_| {
        r#"{"type":"error","message":"frame serialization failed"}"#.to_string()
    });
    Ok(Event::default().data(payload))
}

async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let message =
        prepare_message(&body.message).map_err(|error| ApiError::bad_request(error.to_string()))?;

    let mut options = RetrievalOptions::default();
    if let Some(match_count) = body.match_count {
        options.match_count = match_count;
    }
    if let Some(match_threshold) = body.match_threshold {
        options.match_threshold = match_threshold;
    }
    if let Some(search_mode) = body.search_mode {
        options.search_mode = search_mode;
    }

    // The spawned task owns the outbound calls; the caller dropping the SSE
    // body drops the receiver, which stops the relay's upstream read.
    let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
    let orchestrator = Arc::clone(&state.orchestrator);
    tokio::spawn(async move {
        orchestrator.stream(message, options, tx).await;
    });

    let frames = ReceiverStream::new(rx).map(frame_event);
    Ok(Sse::new(frames).keep_alive(KeepAlive::default()))
}

fn ingest_failure(error: IngestError) -> ApiError {
    match &error {
        IngestError::InvalidInput(_) | IngestError::SheetParse(_) | IngestError::Csv(_) => {
            ApiError::bad_request(error.to_string())
        }
        _ => ApiError::internal(error.to_string()),
    }
}

async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state.session_secret)?;

    let mut action = String::new();
    let mut doc_name = String::new();
    let mut uploaded_by = String::new();
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| ApiError::bad_request(error.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|error| ApiError::bad_request(error.to_string()))?;
                file = Some((file_name, bytes.to_vec()));
            }
            "action" => {
                action = field
                    .text()
                    .await
                    .map_err(|error| ApiError::bad_request(error.to_string()))?;
            }
            "doc_name" => {
                doc_name = field
                    .text()
                    .await
                    .map_err(|error| ApiError::bad_request(error.to_string()))?;
            }
            "uploaded_by" => {
                uploaded_by = field
                    .text()
                    .await
                    .map_err(|error| ApiError::bad_request(error.to_string()))?;
            }
            _ => {}
        }
    }

    let (file_name, bytes) = file.ok_or_else(|| ApiError::bad_request("missing file"))?;
    let action = IngestAction::parse(&action)
        .ok_or_else(|| ApiError::bad_request("invalid action (use preview|upload)"))?;

    let request = IngestRequest {
        file_name,
        bytes,
        doc_name,
        uploaded_by,
    };

    match action {
        IngestAction::Preview => {
            let preview = state.pipeline.preview(&request).await.map_err(ingest_failure)?;
            Ok(Json(json!({
                "ok": true,
                "document_id": preview.document_id,
                "rows": preview.rows,
                "csv": preview.rendered,
            })))
        }
        IngestAction::Upload => {
            let receipt = state.pipeline.upload(&request).await.map_err(|error| {
                warn!(doc_name = %request.doc_name, %error, "upload failed");
                ingest_failure(error)
            })?;
            info!(doc_name = %request.doc_name, count = receipt.written, "document uploaded");
            Ok(Json(json!({
                "ok": true,
                "document_id": receipt.document_id,
                "count": receipt.written,
            })))
        }
    }
}

async fn list_documents(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let items = state
        .store
        .list_documents()
        .await
        .map_err(|error| ApiError::internal(error.to_string()))?;
    Ok(Json(json!({ "ok": true, "items": items })))
}

async fn delete_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(doc_name): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&headers, &state.session_secret)?;

    let doc_name = doc_name.trim().to_string();
    if doc_name.is_empty() {
        return Err(ApiError::bad_request("missing doc_name"));
    }

    let deleted = state
        .store
        .delete_document(&doc_name)
        .await
        .map_err(|error| ApiError::internal(error.to_string()))?;
    info!(doc_name = %doc_name, deleted, "document deleted");
    Ok(Json(json!({ "ok": true, "deleted": deleted })))
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<Value>, ApiError> {
    match claims_from_headers(&headers, &state.session_secret) {
        Some(claims) => Ok(Json(json!({
            "ok": true,
            "user": { "subject": claims.subject, "role": claims.role },
        }))),
        None => Err(ApiError::unauthorized("no valid session")),
    }
}

async fn logout() -> impl IntoResponse {
    let cookie = format!("{SESSION_COOKIE}=; Path=/; Max-Age=0; HttpOnly; SameSite=Strict");
    ([(header::SET_COOKIE, cookie)], Json(json!({ "ok": true })))
}
