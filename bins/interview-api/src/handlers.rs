// HTTP route handlers for the interview API

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, HeaderName, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Json,
    },
};
use chrono::Utc;
use futures_util::stream::{self, Stream};
use interview_common::types::{
    ExecuteRequest, ExecuteResponse, InterviewResponse, JudgeResult, RunSummary,
    SessionStatsResponse,
};
use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ApiError;
use crate::judge::Submission;
use crate::metrics;
use crate::remarks::{interviewer_prompt, session_summary, RemarksGenerator};
use crate::session::Session;
use crate::store::Subscription;
use crate::AppState;

pub const SESSION_HEADER: HeaderName = HeaderName::from_static("x-session-id");
pub const CLIENT_KEY_HEADER: HeaderName = HeaderName::from_static("x-client-key");

const MAX_RUN_ID_LEN: usize = 128;

#[derive(Debug, Default, Deserialize)]
pub struct SessionQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

fn header_value(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Judge tokens end up in upstream URLs, so keep them to a safe alphabet
fn validate_run_id(run_id: &str) -> Result<(), ApiError> {
    let well_formed = !run_id.is_empty()
        && run_id.len() <= MAX_RUN_ID_LEN
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if well_formed {
        Ok(())
    } else {
        Err(ApiError::BadRequest("invalid runID".to_string()))
    }
}

/// GET /healthz
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /metrics - Prometheus text format
pub async fn metrics() -> Result<impl IntoResponse, ApiError> {
    let body = metrics::render().map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

/// POST /interviews - Create a session, or resume the caller's live one
pub async fn create_interview(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<InterviewResponse> {
    let client_key = header_value(&headers, &CLIENT_KEY_HEADER);
    let (session, resumed) = state
        .store
        .create_or_resume(client_key.as_deref(), Utc::now());

    let outcome = if resumed { "resumed" } else { "created" };
    metrics::SESSIONS_OPENED.with_label_values(&[outcome]).inc();
    info!(
        session_id = %session.id,
        expires_at = %session.expires_at,
        has_client_key = client_key.is_some(),
        outcome,
        "Interview session ready"
    );

    Json(InterviewResponse {
        interview_id: session.id,
        expires_at: session.expires_at,
    })
}

/// POST /interviews/{id}/end
pub async fn end_interview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if !state.store.end_session(&id, Utc::now()) {
        return Err(ApiError::NotFound);
    }
    info!(session_id = %id, "Interview session ended");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /interviews/{id} - Idempotent
pub async fn delete_interview(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> StatusCode {
    let existed = state.store.delete_session(&id);
    info!(session_id = %id, existed, "Interview session deleted");
    StatusCode::NO_CONTENT
}

/// POST /execute - Submit code to the judge and start tracking the run
pub async fn submit_execution(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<SessionQuery>,
    payload: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    // Session gating comes before anything else
    let session_id = header_value(&headers, &SESSION_HEADER)
        .or(query.session_id.filter(|s| !s.trim().is_empty()))
        .ok_or_else(|| {
            metrics::SUBMISSIONS_REJECTED.with_label_values(&["missing_session"]).inc();
            ApiError::MissingSession
        })?;

    if let Err(rejection) = state.store.admit_run(&session_id, Utc::now()) {
        metrics::SUBMISSIONS_REJECTED
            .with_label_values(&[rejection.as_str()])
            .inc();
        info!(session_id = %session_id, reason = rejection.as_str(), "Submission rejected");
        return Err(rejection.into());
    }

    let Json(request) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if request.source_code.trim().is_empty() {
        return Err(ApiError::BadRequest("source_code is required".to_string()));
    }
    if !state.languages.is_enabled(request.language_id) {
        return Err(ApiError::BadRequest(format!(
            "unsupported language_id {}",
            request.language_id
        )));
    }

    let submission = Submission {
        language_id: request.language_id,
        source_code: request.source_code,
        stdin: request.stdin,
    };
    let receipt = state
        .judge
        .submit(&submission)
        .await
        .map_err(|e| ApiError::upstream("judge submission failed", e))?;

    metrics::EXECUTIONS_SUBMITTED.inc();
    info!(
        session_id = %session_id,
        run_id = %receipt.token,
        language_id = submission.language_id,
        language = state.languages.get(submission.language_id).map(|l| l.name.as_str()),
        problem_id = ?request.problem_id,
        mode = ?request.mode,
        source_size = submission.source_code.len(),
        "Execution submitted"
    );

    state
        .orchestrator
        .spawn(session_id, receipt.token.clone());

    Ok(Json(ExecuteResponse {
        run_id: receipt.token,
        status: receipt.status,
        status_code: receipt.status_code,
    }))
}

/// GET /execute/{runID} - Cached terminal result, or the judge's current view
pub async fn get_execution_result(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<JudgeResult>, ApiError> {
    validate_run_id(&run_id)?;

    if let Some(result) = state.store.cached_result(&run_id) {
        return Ok(Json(result));
    }

    let result = state
        .judge
        .poll(&run_id)
        .await
        .map_err(|e| ApiError::upstream("failed to reach judge", e))?;

    if result.is_terminal() {
        return Ok(Json(state.store.cache_result(&run_id, result)));
    }
    Ok(Json(result))
}

/// GET /execute/{runID}/events - One `completed` or `timeout` event, then close
pub async fn execution_events(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    validate_run_id(&run_id)?;

    let subscription = state.store.subscribe(&run_id);
    let timeout = state.event_timeout;

    // the stream owns the waiter, so a disconnect retires it too
    let stream = stream::once(async move {
        let delivered = match subscription {
            Subscription::Ready(result) => Some(result),
            Subscription::Pending(waiter) => match tokio::time::timeout(timeout, waiter).await {
                Ok(Ok(result)) => Some(result),
                Ok(Err(_)) | Err(_) => None,
            },
        };

        let event = match delivered {
            Some(result) => {
                metrics::EVENT_STREAMS.with_label_values(&["completed"]).inc();
                info!(run_id = %run_id, status = %result.status.description, "Pushed completion event");
                completed_event(&result)
            }
            None => {
                metrics::EVENT_STREAMS.with_label_values(&["timeout"]).inc();
                info!(run_id = %run_id, "Event stream timed out");
                Event::default().event("timeout").data("{}")
            }
        };
        Ok::<_, Infallible>(event)
    });

    Ok(Sse::new(stream))
}

fn completed_event(result: &JudgeResult) -> Event {
    match Event::default().event("completed").json_data(result) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "Failed to encode completion payload");
            Event::default().event("completed").data("{}")
        }
    }
}

/// GET /stats/session/{id}
pub async fn session_stats(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SessionStatsResponse>, ApiError> {
    let (session, runs) = state
        .store
        .session_snapshot(&id)
        .ok_or(ApiError::NotFound)?;

    let final_status = runs.last().map(|r| r.status.clone()).unwrap_or_default();

    let remarks = match &state.remarks {
        Some(generator) => {
            generate_remarks(generator.as_ref(), &session, &runs, state.remarks_timeout).await
        }
        None => None,
    };

    Ok(Json(SessionStatsResponse {
        session_id: session.id,
        total_runs: session.run_count,
        final_status,
        per_run: runs,
        remarks,
    }))
}

async fn generate_remarks(
    generator: &dyn RemarksGenerator,
    session: &Session,
    runs: &[RunSummary],
    timeout: Duration,
) -> Option<String> {
    let prompt = interviewer_prompt(&session_summary(session, runs));
    match tokio::time::timeout(timeout, generator.generate(&prompt)).await {
        Ok(Ok(text)) => Some(text),
        Ok(Err(e)) => {
            warn!(session_id = %session.id, error = %e, "Narrative generation failed");
            None
        }
        Err(_) => {
            warn!(session_id = %session.id, "Narrative generation timed out");
            None
        }
    }
}
