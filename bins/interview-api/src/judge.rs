/// Remote judge client
///
/// The orchestrator and handlers only see the `Judge` trait:
/// submit(code, language, stdin) -> token, poll(token) -> current result.
/// `Judge0Client` talks to a Judge0-compatible HTTP API (RapidAPI flavour).

use async_trait::async_trait;
use interview_common::judge::{self as protocol, truncate_for_log};
use interview_common::types::{JudgeResult, JudgeStatus};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::JudgeConfig;

const LOG_BODY_LIMIT: usize = 512;

#[derive(Debug, Clone)]
pub struct Submission {
    pub language_id: u32,
    pub source_code: String,
    pub stdin: String,
}

/// What the judge hands back for a new submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub token: String,
    pub status: Option<String>,
    pub status_code: u16,
}

#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("judge API key is not configured")]
    MissingApiKey,

    #[error("judge request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("judge returned status {status}")]
    UpstreamStatus { status: u16, body: String },

    #[error("malformed judge response: {0}")]
    Malformed(String),

    #[error("judge response carried no token")]
    MissingToken,
}

#[async_trait]
pub trait Judge: Send + Sync {
    async fn submit(&self, submission: &Submission) -> Result<SubmitReceipt, JudgeError>;

    /// Current state of a submission; terminal or not
    async fn poll(&self, token: &str) -> Result<JudgeResult, JudgeError>;
}

#[derive(Serialize)]
struct SubmitPayload {
    language_id: u32,
    source_code: String,
    stdin: String,
}

#[derive(Deserialize)]
struct SubmitBody {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    status: Option<JudgeStatus>,
}

pub struct Judge0Client {
    http: reqwest::Client,
    config: JudgeConfig,
}

impl Judge0Client {
    pub fn new(config: JudgeConfig) -> Result<Self, JudgeError> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    fn api_key(&self) -> Result<&str, JudgeError> {
        self.config.api_key.as_deref().ok_or(JudgeError::MissingApiKey)
    }

    async fn read_body(response: reqwest::Response) -> Result<(StatusCode, String), JudgeError> {
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(
                status = status.as_u16(),
                body = %truncate_for_log(&body, LOG_BODY_LIMIT),
                "Judge returned non-success status"
            );
            return Err(JudgeError::UpstreamStatus {
                status: status.as_u16(),
                body: truncate_for_log(&body, LOG_BODY_LIMIT),
            });
        }
        Ok((status, body))
    }
}

#[async_trait]
impl Judge for Judge0Client {
    async fn submit(&self, submission: &Submission) -> Result<SubmitReceipt, JudgeError> {
        let api_key = self.api_key()?;
        let payload = SubmitPayload {
            language_id: submission.language_id,
            source_code: protocol::encode_field(&submission.source_code),
            stdin: protocol::encode_field(&submission.stdin),
        };

        let url = protocol::submissions_url(&self.config.base_url);
        debug!(url = %url, language_id = submission.language_id, "Submitting to judge");

        let response = self
            .http
            .post(&url)
            .header("X-RapidAPI-Key", api_key)
            .header("X-RapidAPI-Host", &self.config.host)
            .json(&payload)
            .send()
            .await?;

        let (status, body) = Self::read_body(response).await?;
        parse_submit_body(status.as_u16(), &body)
    }

    async fn poll(&self, token: &str) -> Result<JudgeResult, JudgeError> {
        let api_key = self.api_key()?;
        let url = protocol::submission_url(&self.config.base_url, token);

        let response = self
            .http
            .get(&url)
            .header("X-RapidAPI-Key", api_key)
            .header("X-RapidAPI-Host", &self.config.host)
            .send()
            .await?;

        let (_, body) = Self::read_body(response).await?;
        parse_poll_body(&body)
    }
}

fn parse_submit_body(status_code: u16, body: &str) -> Result<SubmitReceipt, JudgeError> {
    let parsed: SubmitBody = serde_json::from_str(body).map_err(|e| {
        warn!(status = status_code, body = %truncate_for_log(body, LOG_BODY_LIMIT), error = %e, "Judge submission decode error");
        JudgeError::Malformed(e.to_string())
    })?;

    let token = parsed
        .token
        .filter(|t| !t.is_empty())
        .ok_or(JudgeError::MissingToken)?;

    Ok(SubmitReceipt {
        token,
        status: parsed.status.map(|s| s.description),
        status_code,
    })
}

fn parse_poll_body(body: &str) -> Result<JudgeResult, JudgeError> {
    let raw: JudgeResult =
        serde_json::from_str(body).map_err(|e| JudgeError::Malformed(e.to_string()))?;
    Ok(protocol::decode_result(raw))
}
