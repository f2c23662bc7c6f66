// Interview narrative generation
//
// Best effort only: callers drop the narrative on any error.

use std::fmt::Write as _;

use async_trait::async_trait;
use interview_common::judge::truncate_for_log;
use interview_common::types::RunSummary;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::session::Session;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Error)]
pub enum RemarksError {
    #[error("text generation request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("text generation returned status {0}")]
    UpstreamStatus(u16),

    #[error("text generation returned no text")]
    Empty,
}

#[async_trait]
pub trait RemarksGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, RemarksError>;
}

/// Gemini `generateContent` over plain HTTPS
pub struct GeminiRemarks {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiRemarks {
    pub fn new(api_key: String, model: String) -> Result<Self, RemarksError> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            api_key,
            model,
        })
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[async_trait]
impl RemarksGenerator for GeminiRemarks {
    async fn generate(&self, prompt: &str) -> Result<String, RemarksError> {
        let url = format!("{}/{}:generateContent", GEMINI_BASE_URL, self.model);
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %truncate_for_log(&text, 512), "Text generation failed");
            return Err(RemarksError::UpstreamStatus(status.as_u16()));
        }

        let parsed: GenerateResponse = response.json().await?;
        collect_text(parsed)
    }
}

fn collect_text(response: GenerateResponse) -> Result<String, RemarksError> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    let text = text.trim();
    if text.is_empty() {
        return Err(RemarksError::Empty);
    }
    Ok(text.to_string())
}

/// Structured session summary handed to the text generator
pub fn session_summary(session: &Session, runs: &[RunSummary]) -> String {
    let mut out = String::from("Interview Session Summary:\n");
    let duration = session.expires_at - session.created_at;
    let final_status = runs
        .last()
        .map(|r| r.status.as_str())
        .unwrap_or("No runs completed");

    let _ = writeln!(out, "- Total Runs: {}", session.run_count);
    let _ = writeln!(out, "- Session Duration: {}s", duration.num_seconds());
    let _ = writeln!(out, "- Final Status: {}\n", final_status);
    out.push_str("Code Execution Results:\n");

    for run in runs {
        let _ = write!(out, "Run {}: Status={}", run.sequence, run.status);
        if let Some(time) = &run.time {
            let _ = write!(out, ", Time={}", time);
        }
        if let Some(memory) = run.memory {
            let _ = write!(out, ", Memory={} KB", memory);
        }
        out.push('\n');
    }
    out
}

pub fn interviewer_prompt(summary: &str) -> String {
    format!(
        "You are an AI Interviewer reviewing a coding interview session.\n\
         Provide a concise, professional assessment (2-3 paragraphs) covering:\n\
         1. Overall performance and approach\n\
         2. Technical strengths and areas for improvement\n\
         3. Final recommendation\n\n\
         Session Summary:\n{summary}\n\
         Provide your assessment:"
    )
}
