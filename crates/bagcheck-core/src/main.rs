use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bagcheck_core::rubric::RubricSource;
use bagcheck_core::web::{router, AppState};
use bagcheck_core::{Config, OpenAiInspector, Rubric};
use bagcheck_vision::JpegCodec;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "bagcheck=debug,info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("🎒 Bagcheck starting up...");

    // Load configuration; a missing API key stops startup here
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    info!("Configuration loaded");
    info!("  Model API: {}", config.openai_api_url);
    info!("  Model: {}", config.openai_model);
    info!("  Max tokens: {}", config.max_tokens);
    match config.timeout {
        Some(timeout) => info!("  Request timeout: {:?}", timeout),
        None => info!("  Request timeout: transport default"),
    }

    let rubric = Rubric::load(config.rubric_path.as_deref())?;
    match rubric.source() {
        RubricSource::BuiltIn => info!("Using built-in rubric"),
        RubricSource::File(path) => info!("Using rubric from {}", path.display()),
    }

    let inspector = OpenAiInspector::new(&config, rubric)?;

    let app = router(AppState {
        inspector: Arc::new(inspector),
        codec: JpegCodec::new(config.jpeg_quality),
        max_upload_bytes: config.max_upload_bytes,
    });

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("🎒 Bagcheck is listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutting down...");
        })
        .await?;

    info!("🎒 Bagcheck has shut down.");

    Ok(())
}
