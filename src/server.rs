//! HTTP boundary: upload three files, get back a link to the generated document.

use crate::config::ServerConfig;
use crate::utils::document_processor::{DocumentProcessor, GenerationReport};
use crate::utils::session::{Session, SessionStore};
use crate::AssemblyError;
use axum::{
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use log::{debug, error, info, warn};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// State shared by all handlers.
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<DocumentProcessor>,
    pub sessions: SessionStore,
    pub frontend_dir: PathBuf,
}

/// Errors returned to HTTP clients as `{"detail": "..."}`.
#[derive(Debug)]
pub enum ServiceError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<AssemblyError> for ServiceError {
    fn from(err: AssemblyError) -> Self {
        if err.is_input_error() {
            ServiceError::BadRequest(err.to_string())
        } else {
            ServiceError::Internal(err.to_string())
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ServiceError::BadRequest(d) => (StatusCode::BAD_REQUEST, d),
            ServiceError::NotFound(d) => (StatusCode::NOT_FOUND, d),
            ServiceError::Internal(d) => {
                error!("Request failed: {}", d);
                (StatusCode::INTERNAL_SERVER_ERROR, d)
            }
        };
        (status, Json(serde_json::json!({ "detail": detail }))).into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub message: String,
    pub output_filename: String,
    pub download_filename: String,
    #[serde(flatten)]
    pub report: GenerationReport,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Build the router with all endpoints.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let static_files = ServeDir::new(state.frontend_dir.clone());
    Router::new()
        .route("/", get(index))
        .route("/favicon.ico", get(favicon))
        .route("/health", get(health_check))
        .route("/upload-and-process/", post(upload_and_process))
        .route("/download/{sid}/{fname}", get(download_file))
        .nest_service("/static", static_files)
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve until the process exits.
pub async fn start_server(config: &ServerConfig, processor: DocumentProcessor) -> anyhow::Result<()> {
    let state = AppState {
        processor: Arc::new(processor),
        sessions: SessionStore::new(&config.work_dir)?,
        frontend_dir: config.frontend_dir.clone(),
    };
    let app = build_router(state, config.max_upload_bytes());

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    info!(
        "Listening on {} (work dir {})",
        listener.local_addr()?,
        config.work_dir.display()
    );
    axum::serve(listener, app).await?;
    Ok(())
}

async fn index(State(state): State<AppState>) -> Result<Html<String>, ServiceError> {
    let index_path = state.frontend_dir.join("index.html");
    match tokio::fs::read_to_string(&index_path).await {
        Ok(html) => Ok(Html(html)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(ServiceError::NotFound("index.html not found".to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

async fn favicon() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

struct UploadedFile {
    file_name: String,
    data: Bytes,
}

#[derive(Default)]
struct Uploads {
    template: Option<UploadedFile>,
    config_sheet: Option<UploadedFile>,
    images_zip: Option<UploadedFile>,
}

async fn read_uploads(mut multipart: Multipart) -> Result<Uploads, ServiceError> {
    let bad_part = |e: axum::extract::multipart::MultipartError| ServiceError::BadRequest(e.body_text());
    let mut uploads = Uploads::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_part)? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(bad_part)?;
        debug!("Received part {:?} ({:?}, {} bytes)", name, file_name, data.len());

        let slot = match name.as_str() {
            "main_docx" => &mut uploads.template,
            "config_file" => &mut uploads.config_sheet,
            "images_zip" => &mut uploads.images_zip,
            _ => {
                warn!("Ignoring unexpected form part {:?}", name);
                continue;
            }
        };
        *slot = Some(UploadedFile { file_name, data });
    }
    Ok(uploads)
}

fn required(part: Option<UploadedFile>, name: &str) -> Result<UploadedFile, ServiceError> {
    part.ok_or_else(|| ServiceError::BadRequest(format!("missing form part: {}", name)))
}

async fn store(session: &Session, upload: &UploadedFile, fallback: &str) -> Result<PathBuf, ServiceError> {
    let path = session.path_for(&upload.file_name, fallback);
    tokio::fs::write(&path, &upload.data).await?;
    Ok(path)
}

async fn upload_and_process(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ProcessResponse>, ServiceError> {
    let uploads = read_uploads(multipart).await?;
    let template = required(uploads.template, "main_docx")?;
    let config_sheet = required(uploads.config_sheet, "config_file")?;
    let images_zip = required(uploads.images_zip, "images_zip")?;

    let session = state.sessions.create()?;
    info!("Session {}: processing {:?}", session.id, template.file_name);

    let template_path = store(&session, &template, "template.docx").await?;
    let sheet_path = store(&session, &config_sheet, "config.xlsx").await?;
    let zip_path = session.dir.join("images.zip");
    tokio::fs::write(&zip_path, &images_zip.data).await?;

    let template_name = template_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "template.docx".to_string());
    let output_filename = format!("processed_{}", template_name);
    let output_path = session.dir.join(&output_filename);
    let extract_dir = session.dir.join("unzipped_images");

    let processor = state.processor.clone();
    let report = tokio::task::spawn_blocking(move || {
        processor.process_archive(&template_path, &sheet_path, &zip_path, &extract_dir, &output_path)
    })
    .await
    .map_err(|e| ServiceError::Internal(format!("worker panicked: {}", e)))?
    .map_err(|e| {
        warn!("Session {} failed: {}", session.id, e);
        ServiceError::from(e)
    })?;

    Ok(Json(ProcessResponse {
        message: "處理完成！".to_string(),
        download_filename: session.download_ref(&output_filename),
        output_filename,
        report,
    }))
}

async fn download_file(
    State(state): State<AppState>,
    Path((sid, fname)): Path<(String, String)>,
) -> Result<Response, ServiceError> {
    let not_found = || ServiceError::NotFound("找不到檔案".to_string());
    let path = state.sessions.resolve(&sid, &fname).ok_or_else(not_found)?;

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Err(not_found()),
        Err(e) => return Err(e.into()),
    };

    Ok((
        [
            (header::CONTENT_TYPE, DOCX_MIME.to_string()),
            (header::CONTENT_DISPOSITION, content_disposition(&fname)),
        ],
        Body::from(bytes),
    )
        .into_response())
}

/// `attachment` disposition with an ASCII fallback and an RFC 5987 UTF-8 name.
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| if c.is_ascii_graphic() && c != '"' && c != '\\' { c } else { '_' })
        .collect();

    let mut encoded = String::new();
    for byte in file_name.bytes() {
        if byte.is_ascii_alphanumeric() || b"-._~".contains(&byte) {
            encoded.push(byte as char);
        } else {
            encoded.push_str(&format!("%{:02X}", byte));
        }
    }

    format!("attachment; filename=\"{}\"; filename*=UTF-8''{}", fallback, encoded)
}
