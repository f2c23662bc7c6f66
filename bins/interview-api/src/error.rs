use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use interview_common::types::ErrorResponse;
use thiserror::Error;
use tracing::error;

use crate::judge::JudgeError;
use crate::session::Rejection;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("missing sessionId")]
    MissingSession,

    #[error("invalid or expired session")]
    InvalidSession,

    #[error("max_runs_reached")]
    RunLimitReached,

    #[error("not found")]
    NotFound,

    #[error("{context}")]
    Upstream {
        context: &'static str,
        #[source]
        source: JudgeError,
    },

    #[error("internal error")]
    Internal(String),
}

impl ApiError {
    pub fn upstream(context: &'static str, source: JudgeError) -> Self {
        ApiError::Upstream { context, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::MissingSession | ApiError::InvalidSession => StatusCode::UNAUTHORIZED,
            ApiError::RunLimitReached => StatusCode::CONFLICT,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Rejection> for ApiError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::RunLimitReached => ApiError::RunLimitReached,
            Rejection::Unknown | Rejection::Ended | Rejection::Expired => ApiError::InvalidSession,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // upstream and internal details stay in the logs
        match &self {
            ApiError::Upstream { context, source } => {
                error!(error = %source, "{context}");
            }
            ApiError::Internal(detail) => {
                error!(error = %detail, "Internal error");
            }
            _ => {}
        }

        let body = ErrorResponse {
            error: self.to_string(),
            status_code: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}
