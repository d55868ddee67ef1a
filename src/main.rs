use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use docutape_backend::controllers::conversion::ConversionController;
use docutape_backend::controllers::history::HistoryController;
use docutape_backend::domain::conversion::{ConversionService, JobRegistry};
use docutape_backend::infrastructure::config::{Config, LogFormat};
use docutape_backend::infrastructure::db::{check_connection, create_pool, init_schema};
use docutape_backend::infrastructure::http::start_http_server;
use docutape_backend::infrastructure::repositories::{
    ConversionRepository, HttpSpeechRepository, SpeechRepository,
};
use docutape_backend::infrastructure::storage::StorageQuota;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    init_logging(&config);

    tracing::info!(
        "Starting DocuTape Backend on {}:{}",
        config.host,
        config.port
    );

    if config.speech_api_key.is_empty() {
        tracing::warn!(
            "SPEECH_API_KEY is not set; conversions will fail until it is configured"
        );
    }

    // Data directories for audio artifacts and archived sources
    std::fs::create_dir_all(config.audio_dir())?;
    std::fs::create_dir_all(config.sources_dir())?;

    // Create database connection pool and schema
    let pool = create_pool(&config.database_path()).await?;
    tracing::info!("Database connection pool created");

    check_connection(&pool).await?;
    init_schema(&pool).await?;
    tracing::info!("Database schema ready");

    let pool = Arc::new(pool);
    let config = Arc::new(config);

    // === DEPENDENCY INJECTION SETUP ===
    // 1. Instantiate repositories (inject db pool / endpoint client)
    tracing::info!("Instantiating repositories...");
    let conversion_repo = Arc::new(ConversionRepository::new(pool.clone()));
    let speech_repo: Arc<dyn SpeechRepository> = Arc::new(HttpSpeechRepository::new(
        config.speech_base_url.clone(),
        config.speech_api_key.clone(),
        config.tts_model.clone(),
    ));

    // 2. Instantiate shared services
    tracing::info!("Instantiating services...");
    let storage = Arc::new(StorageQuota::new(
        &config.data_dir,
        config.max_storage_bytes,
        conversion_repo.clone(),
    ));
    let jobs = Arc::new(JobRegistry::new());
    let conversion_service = Arc::new(ConversionService::new(
        config.clone(),
        speech_repo,
        conversion_repo.clone(),
        storage.clone(),
        jobs.clone(),
    ));

    // 3. Instantiate controllers (inject services)
    tracing::info!("Instantiating controllers...");
    let conversion_controller = Arc::new(ConversionController::new(
        conversion_service,
        jobs,
        config.clone(),
    ));
    let history_controller = Arc::new(HistoryController::new(
        conversion_repo,
        storage.clone(),
    ));

    // Start HTTP server with all routes
    start_http_server(config, conversion_controller, history_controller, storage).await?;

    Ok(())
}

fn init_logging(config: &Config) {
    if config.log_format == LogFormat::Json {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "docutape_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "docutape_backend=debug,tower_http=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}
