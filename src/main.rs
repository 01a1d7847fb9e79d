use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use api_shared::HealthService;
use techcard_core::{RecipeService, default_recognizer};

/// Main entry point for the techcard application
///
/// Loads `.env`, resolves the configuration once, prepares the storage directory and serves
/// the REST API (upload, card generation, download, Swagger UI).
///
/// # Environment Variables
/// - `TECHCARD_REST_ADDR`: REST server address (default: "0.0.0.0:3000")
/// - `TECHCARD_STORAGE_DIR`: Directory for images, texts, the recipe store and cards (default: "storage")
/// - `TECHCARD_TEMPLATE_PATH`: Technical-card template (default: "excel_templates/tech_card_template.xlsx")
/// - `TECHCARD_OCR_LANGUAGES`: Tesseract languages (default: "est+eng")
/// - `TECHCARD_TESSDATA_DIR`: Tesseract data directory (optional)
/// - `TECHCARD_MAX_UPLOAD_BYTES`: Upload limit in bytes (default: 20971520)
///
/// # Returns
/// * `Ok(())` - If the server starts and runs successfully
/// * `Err(anyhow::Error)` - If configuration, startup or the server fails
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("techcard_run=info".parse()?)
                .add_directive("techcard_core=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("TECHCARD_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());

    let cfg = Arc::new(api_rest::core_config_from_env()?);
    tracing::info!(
        "++ Storage in {}, template {}",
        cfg.storage_dir().display(),
        cfg.template_path().display()
    );

    let recognizer = default_recognizer(cfg.ocr_languages(), cfg.tessdata_dir());
    let service = Arc::new(RecipeService::new(cfg, recognizer)?);

    tracing::info!("++ {}", HealthService::check_health().message);
    tracing::info!("++ Starting techcard REST on {}", rest_addr);

    api_rest::serve(&rest_addr, service).await
}
