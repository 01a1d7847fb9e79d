//! # API REST
//!
//! REST API implementation for the techcard service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (multipart uploads, JSON serialization, CORS, status mapping)
//!
//! Uses `api-shared` for wire types and `techcard-core` for all recipe operations. Core calls
//! are synchronous and may run OCR, so every handler that touches storage runs them on a
//! blocking thread.

#![warn(rust_2018_idioms)]

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path as AxumPath, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use api_shared::{
    ErrorRes, GenerateTechCardReq, GenerateTechCardRes, HealthRes, HealthService, OcrRes,
    UploadImageForm,
};
use techcard_core::{
    config::core_config_from_env_values, CoreConfig, ImageUpload, RecipeError, RecipeService,
    XLSX_MIME_TYPE,
};

/// Room for multipart boundaries and part headers on top of the configured file limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state for the REST API server
///
/// Contains shared state that needs to be accessible to all request handlers.
#[derive(Clone)]
pub struct AppState {
    service: Arc<RecipeService>,
}

impl AppState {
    pub fn new(service: Arc<RecipeService>) -> Self {
        Self { service }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(health, ocr_image, generate_tech_card, download_tech_card),
    components(schemas(
        HealthRes,
        OcrRes,
        UploadImageForm,
        GenerateTechCardReq,
        GenerateTechCardRes,
        ErrorRes,
    ))
)]
pub struct ApiDoc;

/// An error response carrying a status code and a `{"detail": ...}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<RecipeError> for ApiError {
    fn from(e: RecipeError) -> Self {
        let status = match &e {
            RecipeError::InvalidInput(_) | RecipeError::Id(_) => StatusCode::BAD_REQUEST,
            RecipeError::NotFound(_) | RecipeError::MissingStore(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!("Request failed: {:?}", e);
        }
        Self::new(status, e.to_string())
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(e: tokio::task::JoinError) -> Self {
        tracing::error!("Blocking task failed: {:?}", e);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorRes { detail: self.detail })).into_response()
    }
}

/// Builds the `CoreConfig` from the `TECHCARD_*` environment variables.
///
/// # Environment Variables
/// - `TECHCARD_STORAGE_DIR`: storage root (default: "storage")
/// - `TECHCARD_TEMPLATE_PATH`: template workbook (default: "excel_templates/tech_card_template.xlsx")
/// - `TECHCARD_OCR_LANGUAGES`: Tesseract languages (default: "est+eng")
/// - `TECHCARD_TESSDATA_DIR`: Tesseract data directory (optional)
/// - `TECHCARD_MAX_UPLOAD_BYTES`: upload limit in bytes (default: 20 MiB)
pub fn core_config_from_env() -> anyhow::Result<CoreConfig> {
    Ok(core_config_from_env_values(
        std::env::var("TECHCARD_STORAGE_DIR").ok(),
        std::env::var("TECHCARD_TEMPLATE_PATH").ok(),
        std::env::var("TECHCARD_OCR_LANGUAGES").ok(),
        std::env::var("TECHCARD_TESSDATA_DIR").ok(),
        std::env::var("TECHCARD_MAX_UPLOAD_BYTES").ok(),
    )?)
}

/// Builds the full REST router: endpoints, Swagger UI, CORS, request tracing and body limit.
pub fn router(service: Arc<RecipeService>) -> Router {
    let body_limit = service
        .config()
        .max_upload_bytes()
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(health))
        .route("/ocr", post(ocr_image))
        .route("/generate-tech-card", post(generate_tech_card))
        .route("/download-tech-card/:id", get(download_tech_card))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(service))
}

/// Binds `addr` and serves the router until the process is stopped.
pub async fn serve(addr: &str, service: Arc<RecipeService>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(service)).await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for the REST API
///
/// Returns the current health status of the techcard REST API service.
/// This endpoint is used for monitoring and load balancer health checks.
///
/// # Returns
/// * `Json<HealthRes>` - Health status response containing service status
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/ocr",
    request_body(content = UploadImageForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Image recognised and recipe stored", body = OcrRes),
        (status = 400, description = "Not an image upload", body = ErrorRes),
        (status = 413, description = "Upload too large", body = ErrorRes),
        (status = 500, description = "Recognition or storage failed", body = ErrorRes)
    )
)]
/// Upload a recipe image
///
/// Stores the image, recognises its text, stores the text and appends the recipe to the
/// recipe store.
///
/// # Parameters
/// * `multipart` - Form with a `file` part holding the image
///
/// # Returns
/// * `Ok(Json<OcrRes>)` - New recipe id, recognised text, title and stored text path
/// * `Err(ApiError)` - 400 for non-image uploads, 500 for recognition or storage failures
#[axum::debug_handler]
async fn ocr_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<OcrRes>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::new(e.status(), e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::new(e.status(), e.body_text()))?;
        upload = Some(ImageUpload {
            filename,
            content_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let upload = upload
        .ok_or_else(|| ApiError::new(StatusCode::BAD_REQUEST, "missing multipart field 'file'"))?;

    let service = state.service.clone();
    let outcome = tokio::task::spawn_blocking(move || service.upload_image(upload)).await??;

    Ok(Json(OcrRes {
        id: outcome.id.to_string(),
        text: outcome.text,
        title: outcome.title,
        saved_text_path: outcome.saved_text_path.display().to_string(),
    }))
}

#[utoipa::path(
    post,
    path = "/generate-tech-card",
    request_body = GenerateTechCardReq,
    responses(
        (status = 200, description = "Technical card generated", body = GenerateTechCardRes),
        (status = 400, description = "Invalid id", body = ErrorRes),
        (status = 404, description = "Unknown id or recipe store missing", body = ErrorRes),
        (status = 500, description = "Template missing or card could not be written", body = ErrorRes)
    )
)]
/// Generate a technical card
///
/// Parses the supplied text, or the stored text of the recipe with the supplied id, and fills
/// the technical-card template with it.
///
/// # Parameters
/// * `req` - Optional id and optional text
///
/// # Returns
/// * `Ok(Json<GenerateTechCardRes>)` - Card id, stored card path and parsed title
/// * `Err(ApiError)` - 400 invalid id, 404 unknown id, 500 missing template
#[axum::debug_handler]
async fn generate_tech_card(
    State(state): State<AppState>,
    Json(req): Json<GenerateTechCardReq>,
) -> Result<Json<GenerateTechCardRes>, ApiError> {
    let service = state.service.clone();
    let card = tokio::task::spawn_blocking(move || {
        service.generate_card(req.id.as_deref(), req.text.as_deref())
    })
    .await??;

    tracing::info!(id = %card.id, "generated technical card");
    Ok(Json(GenerateTechCardRes {
        id: card.id.to_string(),
        tech_card_path: card.tech_card_path.display().to_string(),
        title: card.title,
    }))
}

#[utoipa::path(
    get,
    path = "/download-tech-card/{id}",
    params(("id" = String, Path, description = "Recipe id")),
    responses(
        (status = 200, description = "Technical card workbook (xlsx attachment)"),
        (status = 400, description = "Invalid id", body = ErrorRes),
        (status = 404, description = "No card for this id", body = ErrorRes)
    )
)]
/// Download a generated technical card
///
/// # Parameters
/// * `id` - Recipe id the card was generated for
///
/// # Returns
/// * `Ok(Response)` - The xlsx file as an attachment
/// * `Err(ApiError)` - 400 invalid id, 404 card not generated
#[axum::debug_handler]
async fn download_tech_card(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Response, ApiError> {
    let path: PathBuf = state.service.card_path(&id)?;
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ApiError::from(RecipeError::FileRead(e)))?;

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok((
        [
            (header::CONTENT_TYPE, XLSX_MIME_TYPE.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response())
}
