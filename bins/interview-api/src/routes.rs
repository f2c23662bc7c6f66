// Route table for the interview API

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::warn;

use crate::handlers;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    let api = Router::new()
        .route("/healthz", get(handlers::health_check))
        .route("/interviews", post(handlers::create_interview))
        .route("/interviews/:id/end", post(handlers::end_interview))
        .route("/interviews/:id", axum::routing::delete(handlers::delete_interview))
        .route("/execute", post(handlers::submit_execution))
        .route("/execute/:run_id", get(handlers::get_execution_result))
        .route("/execute/:run_id/events", get(handlers::execution_events))
        .route("/stats/session/:id", get(handlers::session_stats));

    Router::new()
        .nest("/api/v1", api)
        .route("/metrics", get(handlers::metrics))
}

/// CORS for the configured browser origins. Unparseable origins are skipped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::ACCEPT,
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            handlers::SESSION_HEADER.clone(),
            handlers::CLIENT_KEY_HEADER.clone(),
        ])
        .max_age(Duration::from_secs(300))
}
