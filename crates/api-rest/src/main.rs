//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the REST API server on its own.
//!
//! ## Intended use
//! This binary is useful for development and debugging when you only want the REST server (with
//! OpenAPI/Swagger UI). The workspace's main `techcard-run` binary also loads `.env` and checks
//! the template before serving.

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_rest::{core_config_from_env, serve};
use techcard_core::{default_recognizer, RecipeService};

/// Main entry point for the techcard REST API server
///
/// Starts the REST API server on the configured address (default: 0.0.0.0:3000).
///
/// # Environment Variables
/// - `TECHCARD_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `TECHCARD_*` storage, template and OCR settings (see `api_rest::core_config_from_env`)
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid or the storage directory cannot be prepared,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("techcard_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("TECHCARD_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    tracing::info!("-- Starting techcard REST API on {}", addr);

    let cfg = Arc::new(core_config_from_env()?);
    let recognizer = default_recognizer(cfg.ocr_languages(), cfg.tessdata_dir());
    let service = Arc::new(RecipeService::new(cfg, recognizer)?);

    serve(&addr, service).await
}
