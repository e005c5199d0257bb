//! jotpad-api - HTTP API server for jotpad

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Multipart, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use jotpad_core::{AttachmentUpload, CreateNoteRequest, Note, NoteService, UpdateNoteRequest};
use jotpad_db::{Database, FilesystemStore};

/// Upper bound for a multipart request body, attachment included.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024; // 25 MB

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically — useful for
/// log correlation and debugging production incidents.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

// =============================================================================
// CORS
// =============================================================================

/// Build the CORS origin policy from `CORS_ALLOWED_ORIGINS`.
///
/// Unset or empty means any origin is allowed, matching the permissive
/// default of a personal single-user deployment. A comma-separated list
/// restricts to exactly those origins.
fn cors_allowed_origins() -> AllowOrigin {
    let origins_str = std::env::var("CORS_ALLOWED_ORIGINS").unwrap_or_default();

    if origins_str.trim().is_empty() {
        return AllowOrigin::any();
    }

    let origins: Vec<HeaderValue> = origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect();

    AllowOrigin::list(origins)
}

// =============================================================================
// APP STATE & ROUTER
// =============================================================================

#[derive(Clone)]
struct AppState {
    notes: NoteService,
}

/// Build the application router.
///
/// `upload_dir` is served read-only at `/uploads` so attachment files are
/// reachable by their stored name.
fn build_router(state: AppState, upload_dir: &std::path::Path) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // Notes CRUD
        .route("/api/notes", get(list_notes).post(create_note))
        .route(
            "/api/notes/:id",
            get(get_note).put(update_note).delete(delete_note),
        )
        // Static attachment files by stored name
        .nest_service("/uploads", ServeDir::new(upload_dir))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer(
            CorsLayer::new()
                .allow_origin(cors_allowed_origins())
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT]),
        )
        .layer(RequestBodyLimitLayer::new(MAX_UPLOAD_BYTES))
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   RUST_LOG    - standard env filter (default: "jotpad_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "jotpad_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);
    if log_format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    // Get configuration from environment
    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "postgres://localhost/jotpad".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "3000".to_string())
        .parse()
        .unwrap_or(3000);
    let upload_dir = PathBuf::from(
        std::env::var("UPLOAD_DIR").unwrap_or_else(|_| "/var/lib/jotpad/uploads".to_string()),
    );

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    // Initialize attachment storage with a write/read/delete round-trip
    let store = Arc::new(FilesystemStore::new(&upload_dir));
    store.validate().await?;
    info!("Attachment storage initialized at {}", upload_dir.display());

    // Create app state
    let state = AppState {
        notes: NoteService::new(db.notes.clone(), store),
    };

    let app = build_router(state, &upload_dir);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// HEALTH CHECK
// =============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// MULTIPART PARSING
// =============================================================================

/// Note fields extracted from a multipart form.
#[derive(Debug, Default)]
struct NoteForm {
    title: Option<String>,
    content: Option<String>,
    attachment: Option<AttachmentUpload>,
}

/// Read `title`, `content`, and `file` fields from a multipart body.
///
/// Unknown fields are skipped rather than rejected; a `file` part without a
/// filename is treated as absent.
async fn parse_note_form(mut multipart: Multipart) -> Result<NoteForm, ApiError> {
    let mut form = NoteForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read upload: {}", e)))?
    {
        match field.name() {
            Some("title") => {
                form.title = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read title field: {}", e))
                })?);
            }
            Some("content") => {
                form.content = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Failed to read content field: {}", e))
                })?);
            }
            Some("file") => {
                let original_filename = match field.file_name() {
                    Some(name) if !name.is_empty() => name.to_string(),
                    _ => continue,
                };
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {}", e)))?
                    .to_vec();
                form.attachment = Some(AttachmentUpload {
                    original_filename,
                    data,
                });
            }
            _ => {}
        }
    }

    Ok(form)
}

// =============================================================================
// NOTE HANDLERS
// =============================================================================

#[derive(Debug, Serialize)]
struct ListNotesResponse {
    ok: bool,
    notes: Vec<Note>,
}

#[derive(Debug, Serialize)]
struct NoteResponse {
    ok: bool,
    note: Note,
}

/// List all notes, most recently updated first.
async fn list_notes(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let notes = state.notes.list().await?;
    Ok(Json(ListNotesResponse { ok: true, notes }))
}

/// Fetch a single note by id.
async fn get_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let note = state.notes.get(id).await?;
    Ok(Json(NoteResponse { ok: true, note }))
}

/// Create a note from a multipart form, optionally with an attachment.
async fn create_note(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = parse_note_form(multipart).await?;

    let note = state
        .notes
        .create(CreateNoteRequest {
            title: form.title,
            content: form.content,
            attachment: form.attachment,
        })
        .await?;

    Ok(Json(serde_json::json!({
        "ok": true,
        "id": note.id,
    })))
}

/// Update a note from a multipart form. Absent or empty fields keep their
/// previous values; a new file replaces the old attachment.
async fn update_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let form = parse_note_form(multipart).await?;

    state
        .notes
        .update(
            id,
            UpdateNoteRequest {
                title: form.title,
                content: form.content,
                attachment: form.attachment,
            },
        )
        .await?;

    Ok(Json(serde_json::json!({ "ok": true })))
}

/// Delete a note and its attachment file, if any.
async fn delete_note(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.notes.delete(id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    Internal(jotpad_core::Error),
    NotFound(String),
    BadRequest(String),
    Conflict(String),
}

impl From<jotpad_core::Error> for ApiError {
    fn from(err: jotpad_core::Error) -> Self {
        match &err {
            jotpad_core::Error::NoteNotFound(id) => {
                ApiError::NotFound(format!("Note not found: {}", id))
            }
            jotpad_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            jotpad_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            jotpad_core::Error::DuplicateId(id) => {
                ApiError::Conflict(format!("Note already exists: {}", id))
            }
            _ => ApiError::Internal(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Internal(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
        };

        let body = Json(serde_json::json!({
            "ok": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use jotpad_core::MemoryNoteRepository;

    /// Spawn the full router on an ephemeral port, backed by an in-memory
    /// repository and a tempdir-rooted filesystem store.
    async fn spawn_test_server() -> (String, tempfile::TempDir) {
        let upload_dir = tempfile::tempdir().unwrap();

        let repo = Arc::new(MemoryNoteRepository::new());
        let store = Arc::new(FilesystemStore::new(upload_dir.path()));
        let state = AppState {
            notes: NoteService::new(repo, store),
        };

        let router = build_router(state, upload_dir.path());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        // Give server a moment to start
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        (base_url, upload_dir)
    }

    fn note_form(title: &str, content: &str) -> reqwest::multipart::Form {
        reqwest::multipart::Form::new()
            .text("title", title.to_string())
            .text("content", content.to_string())
    }

    async fn create_note_via_api(
        client: &reqwest::Client,
        base_url: &str,
        form: reqwest::multipart::Form,
    ) -> String {
        let resp = client
            .post(format!("{}/api/notes", base_url))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], true);
        body["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_health_check() {
        let (base_url, _dir) = spawn_test_server().await;

        let resp = reqwest::get(format!("{}/health", base_url)).await.unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_list_notes_empty() {
        let (base_url, _dir) = spawn_test_server().await;

        let resp = reqwest::get(format!("{}/api/notes", base_url))
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["notes"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_create_then_get_note() {
        let (base_url, _dir) = spawn_test_server().await;
        let client = reqwest::Client::new();

        let id = create_note_via_api(&client, &base_url, note_form("Shopping", "milk, eggs")).await;

        let resp = client
            .get(format!("{}/api/notes/{}", base_url, id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], true);
        assert_eq!(body["note"]["title"], "Shopping");
        assert_eq!(body["note"]["content"], "milk, eggs");
        assert!(body["note"]["filename"].is_null());
    }

    #[tokio::test]
    async fn test_create_without_title_defaults_to_untitled() {
        let (base_url, _dir) = spawn_test_server().await;
        let client = reqwest::Client::new();

        let form = reqwest::multipart::Form::new().text("content", "just content");
        let id = create_note_via_api(&client, &base_url, form).await;

        let body: serde_json::Value = client
            .get(format!("{}/api/notes/{}", base_url, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["note"]["title"], "Untitled");
        assert_eq!(body["note"]["content"], "just content");
    }

    #[tokio::test]
    async fn test_create_with_attachment_serves_file() {
        let (base_url, _dir) = spawn_test_server().await;
        let client = reqwest::Client::new();

        let form = note_form("With file", "see attached").part(
            "file",
            reqwest::multipart::Part::bytes(b"attachment bytes".to_vec())
                .file_name("readme.txt"),
        );
        let id = create_note_via_api(&client, &base_url, form).await;

        let body: serde_json::Value = client
            .get(format!("{}/api/notes/{}", base_url, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let stored_name = body["note"]["filename"].as_str().unwrap().to_string();
        assert!(stored_name.ends_with("readme.txt"));

        // The file is reachable under its stored name.
        let resp = client
            .get(format!("{}/uploads/{}", base_url, stored_name))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.bytes().await.unwrap().as_ref(), b"attachment bytes");
    }

    #[tokio::test]
    async fn test_get_unknown_note_is_404() {
        let (base_url, _dir) = spawn_test_server().await;

        let resp = reqwest::get(format!("{}/api/notes/{}", base_url, Uuid::now_v7()))
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], false);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_update_note_content() {
        let (base_url, _dir) = spawn_test_server().await;
        let client = reqwest::Client::new();

        let id = create_note_via_api(&client, &base_url, note_form("Report", "draft")).await;

        let form = reqwest::multipart::Form::new().text("content", "final");
        let resp = client
            .put(format!("{}/api/notes/{}", base_url, id))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], true);

        let body: serde_json::Value = client
            .get(format!("{}/api/notes/{}", base_url, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        // Title not supplied, so it survives the update.
        assert_eq!(body["note"]["title"], "Report");
        assert_eq!(body["note"]["content"], "final");
    }

    #[tokio::test]
    async fn test_update_replaces_attachment_and_removes_old_file() {
        let (base_url, dir) = spawn_test_server().await;
        let client = reqwest::Client::new();

        let form = note_form("Doc", "v1").part(
            "file",
            reqwest::multipart::Part::bytes(b"old".to_vec()).file_name("old.txt"),
        );
        let id = create_note_via_api(&client, &base_url, form).await;

        let body: serde_json::Value = client
            .get(format!("{}/api/notes/{}", base_url, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let old_name = body["note"]["filename"].as_str().unwrap().to_string();

        let form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(b"new".to_vec()).file_name("new.txt"),
        );
        let resp = client
            .put(format!("{}/api/notes/{}", base_url, id))
            .multipart(form)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = client
            .get(format!("{}/api/notes/{}", base_url, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let new_name = body["note"]["filename"].as_str().unwrap().to_string();
        assert_ne!(old_name, new_name);

        assert!(!dir.path().join(&old_name).exists());
        assert_eq!(
            std::fs::read(dir.path().join(&new_name)).unwrap(),
            b"new"
        );
    }

    #[tokio::test]
    async fn test_update_unknown_note_is_404() {
        let (base_url, _dir) = spawn_test_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .put(format!("{}/api/notes/{}", base_url, Uuid::now_v7()))
            .multipart(reqwest::multipart::Form::new().text("content", "x"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_delete_note_removes_row_and_file() {
        let (base_url, dir) = spawn_test_server().await;
        let client = reqwest::Client::new();

        let form = note_form("Doomed", "bye").part(
            "file",
            reqwest::multipart::Part::bytes(b"bytes".to_vec()).file_name("gone.txt"),
        );
        let id = create_note_via_api(&client, &base_url, form).await;

        let body: serde_json::Value = client
            .get(format!("{}/api/notes/{}", base_url, id))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let stored_name = body["note"]["filename"].as_str().unwrap().to_string();

        let resp = client
            .delete(format!("{}/api/notes/{}", base_url, id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], true);

        assert!(!dir.path().join(&stored_name).exists());

        let resp = client
            .get(format!("{}/api/notes/{}", base_url, id))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn test_delete_unknown_note_is_404() {
        let (base_url, _dir) = spawn_test_server().await;
        let client = reqwest::Client::new();

        let resp = client
            .delete(format!("{}/api/notes/{}", base_url, Uuid::now_v7()))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn test_list_orders_most_recent_first() {
        let (base_url, _dir) = spawn_test_server().await;
        let client = reqwest::Client::new();

        let first = create_note_via_api(&client, &base_url, note_form("first", "a")).await;
        let _second = create_note_via_api(&client, &base_url, note_form("second", "b")).await;

        // Touch the older note so it moves to the front.
        client
            .put(format!("{}/api/notes/{}", base_url, first))
            .multipart(reqwest::multipart::Form::new().text("content", "bumped"))
            .send()
            .await
            .unwrap();

        let body: serde_json::Value = client
            .get(format!("{}/api/notes", base_url))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let notes = body["notes"].as_array().unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0]["title"], "first");
        assert_eq!(notes[1]["title"], "second");
    }

    #[tokio::test]
    async fn test_invalid_uuid_path_is_client_error() {
        let (base_url, _dir) = spawn_test_server().await;

        let resp = reqwest::get(format!("{}/api/notes/not-a-uuid", base_url))
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
    }
}
