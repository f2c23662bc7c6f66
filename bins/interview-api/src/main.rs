mod config;
mod error;
mod handlers;
mod judge;
mod language_config;
mod metrics;
mod orchestrator;
mod remarks;
mod routes;
mod session;
mod store;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};
use tracing::{info, warn};

use crate::config::Config;
use crate::judge::{Judge, Judge0Client};
use crate::language_config::LanguageRegistry;
use crate::orchestrator::Orchestrator;
use crate::remarks::{GeminiRemarks, RemarksGenerator};
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub judge: Arc<dyn Judge>,
    pub orchestrator: Orchestrator,
    pub languages: Arc<LanguageRegistry>,
    /// Narrative generator, absent when no API key is configured
    pub remarks: Option<Arc<dyn RemarksGenerator>>,
    pub event_timeout: Duration,
    pub remarks_timeout: Duration,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
        )
        .with_target(false)
        .init();

    info!("Interview API booting...");

    let config = Config::from_env()?;
    metrics::register_metrics();

    let languages = if Path::new(&config.languages_path).exists() {
        LanguageRegistry::load_from_file(&config.languages_path)?
    } else {
        warn!(path = %config.languages_path, "languages.json not found, using built-in table");
        LanguageRegistry::builtin()
    };
    info!(languages = ?languages.enabled_ids(), "Language table loaded");

    if config.judge.api_key.is_none() {
        warn!("RAPIDAPI_KEY not set, judge calls will fail");
    }
    let judge: Arc<dyn Judge> = Arc::new(Judge0Client::new(config.judge.clone())?);
    info!(judge = %config.judge.base_url, "Judge client ready");

    let remarks: Option<Arc<dyn RemarksGenerator>> = match &config.gemini_api_key {
        Some(key) => {
            let client = GeminiRemarks::new(key.clone(), config.gemini_model.clone())?;
            info!(model = %config.gemini_model, "Narrative remarks enabled");
            Some(Arc::new(client))
        }
        None => {
            info!("GEMINI_API_KEY not set, stats will carry no remarks");
            None
        }
    };

    let store = Arc::new(Store::new(config.limits));
    let orchestrator = Orchestrator::new(store.clone(), judge.clone(), config.polling);

    let state = Arc::new(AppState {
        store,
        judge,
        orchestrator,
        languages: Arc::new(languages),
        remarks,
        event_timeout: config.event_timeout,
        remarks_timeout: config.remarks_timeout,
    });

    // Build router
    let app = routes::routes()
        .layer(routes::cors_layer(&config.cors_origins))
        .with_state(state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("HTTP server listening on {}", config.bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
