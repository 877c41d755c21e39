mod ai_providers;
mod ai_service;
mod api;
mod challenge;
mod config;
mod database;
mod errors;
mod grading;
mod logging;
mod models;
mod preparer;
mod session;
mod srs;
mod word_service;

use anyhow::Result;
use axum::{http::StatusCode, response::Html, routing::get, Router};
use tokio::fs;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{
    ai_service::AiService,
    api::{create_router, AppState},
    config::{Config, LoggingConfig},
    database::Database,
    word_service::WordService,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = Config::from_env()?;
    config.validate()?;

    // Initialize comprehensive logging with file output
    let _guard = setup_logging(&config.logging)?;

    info!("Starting vocabulary trainer server...");

    // Initialize database
    let db = Database::new(&config.database.url).await?;
    info!("Database initialized successfully");

    // Initialize services
    let word_service = WordService::new(db);
    let ai_service = AiService::new(
        config.ai.provider,
        config.ai.api_key.clone(),
        config.ai.base_url.clone(),
        config.ai.model.clone(),
    );
    info!(
        provider = ai_service.provider_name(),
        model = ai_service.model_name(),
        "Initialized AI service"
    );

    let state = AppState::new(word_service, ai_service, config.ai.native_language.clone());

    // Build the application router
    let app = Router::new()
        // Serve static files
        .route("/", get(serve_index))
        .route("/index.html", get(serve_index))
        .route("/styles.css", get(serve_css))
        .route("/app.js", get(serve_js))
        // API routes
        .merge(create_router(state))
        // CORS middleware
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    // Start the server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server starting on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_index() -> Result<Html<String>, StatusCode> {
    match fs::read_to_string("static/index.html").await {
        Ok(content) => Ok(Html(content)),
        Err(_) => Err(StatusCode::NOT_FOUND),
    }
}

async fn serve_css() -> Result<(StatusCode, [(&'static str, &'static str); 1], String), StatusCode> {
    match fs::read_to_string("static/styles.css").await {
        Ok(content) => Ok((StatusCode::OK, [("content-type", "text/css")], content)),
        Err(_) => Err(StatusCode::NOT_FOUND),
    }
}

async fn serve_js() -> Result<(StatusCode, [(&'static str, &'static str); 1], String), StatusCode> {
    match fs::read_to_string("static/app.js").await {
        Ok(content) => Ok((
            StatusCode::OK,
            [("content-type", "application/javascript")],
            content,
        )),
        Err(_) => Err(StatusCode::NOT_FOUND),
    }
}

fn setup_logging(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    use std::fs;
    use tracing_subscriber::fmt;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    // Console output, gated on LOG_CONSOLE_ENABLED
    let console_layer = config.console_enabled.then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(true)
    });

    // File output with daily rotation, gated on LOG_FILE_ENABLED.
    // The worker guard only exists while the file layer does.
    let (file_layer, guard) = if config.file_enabled {
        fs::create_dir_all(&config.log_directory).unwrap_or_else(|e| {
            eprintln!("Warning: Could not create logs directory: {}", e);
        });

        let file_appender =
            tracing_appender::rolling::daily(&config.log_directory, "vocab-trainer.log");
        let (non_blocking_file, guard) = tracing_appender::non_blocking(file_appender);

        let layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false)
            .with_writer(non_blocking_file);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if config.file_enabled {
        info!(
            "Logging initialized - writing to {}/vocab-trainer.log with daily rotation",
            config.log_directory
        );
    }

    Ok(guard)
}
