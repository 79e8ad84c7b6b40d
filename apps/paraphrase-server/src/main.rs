//! Document Paraphraser Server
//!
//! Accepts `.docx` and `.pdf` uploads from authenticated callers, rewrites
//! every paragraph through the generative-text service and returns a new
//! `.docx`. Endpoints:
//!
//! - `GET /` banner
//! - `GET /health` health check
//! - `POST /paraphrase` multipart upload (`file` field)
//!
//! Rewriting runs under one process-wide concurrency ceiling shared by all
//! in-flight requests.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use clap::Parser;
use paraphrase_core::{ParaphraseConfig, Paraphraser};
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod auth;
mod error;
mod state;
#[cfg(test)]
mod tests;

use api::{handle_health, handle_paraphrase, handle_root};
use auth::GoogleTokenVerifier;
use error::ApiError;
use state::AppState;

/// Command-line arguments for the paraphrase server
#[derive(Parser, Debug)]
#[command(name = "paraphrase-server")]
#[command(about = "Rewrites .docx/.pdf documents through a generative-text service")]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "8000")]
    port: u16,

    /// Host address to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Maximum simultaneous rewrite calls across all requests
    #[arg(long)]
    max_concurrency: Option<usize>,

    /// Maximum upload size in megabytes
    #[arg(long, default_value = "25")]
    max_upload_mb: usize,

    /// OAuth client id expected in the token audience
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    google_client_id: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Build the application router
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    Router::new()
        .route("/", get(handle_root))
        .route("/health", get(handle_health))
        .route("/paraphrase", post(handle_paraphrase))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(CatchPanicLayer::custom(handle_panic))
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = detail, "Request handler panicked");
    ApiError::Internal(detail.to_string()).into_response()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = ParaphraseConfig::from_env();
    if let Some(max) = args.max_concurrency {
        config = config.with_max_concurrency(max);
    }

    let paraphraser =
        Paraphraser::from_config(&config).context("Failed to create generative client")?;
    let http = reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .context("Failed to create identity provider client")?;
    if args.google_client_id.is_none() {
        info!("GOOGLE_CLIENT_ID not set; token audience will not be checked");
    }
    let verifier = GoogleTokenVerifier::new(http, args.google_client_id.clone());
    let state = AppState::new(paraphraser, Arc::new(verifier));

    let app = build_router(state, args.max_upload_mb * 1024 * 1024);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Model: {}", config.model);
    info!("Max concurrency: {}", config.max_concurrency);
    info!("Max upload: {} MB", args.max_upload_mb);

    axum::serve(listener, app).await?;

    Ok(())
}
