// CLI commands for driving interview sessions
use anyhow::{bail, Context, Result};
use interview_common::types::{
    ErrorResponse, ExecuteRequest, ExecuteResponse, InterviewResponse, JudgeResult,
    SessionStatsResponse,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use std::time::Duration;

const SESSION_HEADER: &str = "X-Session-ID";
const CLIENT_KEY_HEADER: &str = "X-Client-Key";

/// Thin HTTP client over the `/api/v1` surface
pub struct ApiClient {
    http: Client,
    base: String,
}

impl ApiClient {
    pub fn new(api_url: &str) -> Result<Self> {
        // no overall timeout: the event stream legitimately stays open for a minute
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base: format!("{}/api/v1", api_url.trim_end_matches('/')),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }
}

/// Turn a non-success response into an error carrying the server's message
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error)
        .unwrap_or(body);
    bail!("{} ({})", describe_error(status, &message), status)
}

fn describe_error(status: StatusCode, message: &str) -> String {
    match status {
        StatusCode::UNAUTHORIZED => format!("Session rejected: {}", message),
        StatusCode::CONFLICT => "Run limit reached for this session".to_string(),
        StatusCode::NOT_FOUND => "Not found".to_string(),
        _ => message.to_string(),
    }
}

async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
    check(response)
        .await?
        .json::<T>()
        .await
        .context("Failed to parse API response")
}

/// Start an interview session
pub async fn start_session(client: &ApiClient, client_key: Option<String>) -> Result<()> {
    let client_key = client_key.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let response = client
        .http
        .post(client.url("/interviews"))
        .header(CLIENT_KEY_HEADER, &client_key)
        .send()
        .await
        .context("Failed to reach the interview API")?;
    let interview: InterviewResponse = json(response).await?;

    println!("🚀 Interview session ready");
    println!("  Session:    {}", interview.interview_id);
    println!("  Expires at: {}", interview.expires_at);
    println!("  Client key: {}", client_key);
    println!("\n📋 Next steps:");
    println!(
        "  interview-cli run --session {} --file main.py --language-id 71",
        interview.interview_id
    );
    Ok(())
}

/// Submit a source file, then wait on the event stream for its result
pub async fn run_file(
    client: &ApiClient,
    session: &str,
    file: &Path,
    language_id: u32,
    stdin: &str,
) -> Result<()> {
    let source_code = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    if source_code.trim().is_empty() {
        bail!("{} is empty", file.display());
    }

    let request = ExecuteRequest {
        language_id,
        source_code,
        stdin: stdin.to_string(),
        problem_id: None,
        mode: None,
    };

    println!("📤 Submitting {}...", file.display());
    let response = client
        .http
        .post(client.url("/execute"))
        .header(SESSION_HEADER, session)
        .json(&request)
        .send()
        .await
        .context("Failed to reach the interview API")?;
    let submitted: ExecuteResponse = json(response).await?;
    println!("⏳ Run {} submitted, waiting for result...", submitted.run_id);

    let response = client
        .http
        .get(client.url(&format!("/execute/{}/events", submitted.run_id)))
        .header(reqwest::header::ACCEPT, "text/event-stream")
        .send()
        .await
        .context("Failed to open event stream")?;
    // the server sends exactly one event and closes
    let body = check(response).await?.text().await?;

    match parse_sse_event(&body) {
        Some((event, data)) if event == "completed" => {
            let result: JudgeResult =
                serde_json::from_str(&data).context("Failed to parse completion event")?;
            print_result(&submitted.run_id, &result);
        }
        Some((event, _)) if event == "timeout" => {
            println!("⚠️  No result yet. Check later with: interview-cli result {}", submitted.run_id);
        }
        _ => bail!("Unexpected event stream payload: {}", body.trim()),
    }
    Ok(())
}

/// Fetch the current result of a run
pub async fn show_result(client: &ApiClient, run_id: &str) -> Result<()> {
    let response = client
        .http
        .get(client.url(&format!("/execute/{}", run_id)))
        .send()
        .await
        .context("Failed to reach the interview API")?;
    let result: JudgeResult = json(response).await?;
    print_result(run_id, &result);
    Ok(())
}

/// Show a session's run history and remarks
pub async fn show_stats(client: &ApiClient, session_id: &str) -> Result<()> {
    let response = client
        .http
        .get(client.url(&format!("/stats/session/{}", session_id)))
        .send()
        .await
        .context("Failed to reach the interview API")?;
    let stats: SessionStatsResponse = json(response).await?;

    println!("📊 Session {}\n", stats.session_id);
    println!("{:<5} {:<24} {:<8} {:<10}", "RUN", "STATUS", "TIME", "MEMORY");
    println!("{}", "─".repeat(50));
    for run in &stats.per_run {
        println!(
            "{:<5} {:<24} {:<8} {:<10}",
            run.sequence,
            run.status,
            run.time.as_deref().unwrap_or("-"),
            run.memory.map(|m| format!("{} KB", m)).unwrap_or_else(|| "-".to_string()),
        );
    }
    let final_status = if stats.final_status.is_empty() {
        "No runs completed"
    } else {
        stats.final_status.as_str()
    };
    println!("\n✅ Total: {} run(s), final status: {}", stats.total_runs, final_status);

    if let Some(remarks) = stats.remarks {
        println!("\n💬 Remarks:\n{}", remarks);
    }
    Ok(())
}

/// End a session
pub async fn end_session(client: &ApiClient, session_id: &str) -> Result<()> {
    let response = client
        .http
        .post(client.url(&format!("/interviews/{}/end", session_id)))
        .send()
        .await
        .context("Failed to reach the interview API")?;
    check(response).await?;
    println!("✅ Session {} ended", session_id);
    Ok(())
}

/// Delete a session and its history
pub async fn delete_session(client: &ApiClient, session_id: &str) -> Result<()> {
    let response = client
        .http
        .delete(client.url(&format!("/interviews/{}", session_id)))
        .send()
        .await
        .context("Failed to reach the interview API")?;
    check(response).await?;
    println!("🗑️  Session {} deleted", session_id);
    Ok(())
}

fn print_result(run_id: &str, result: &JudgeResult) {
    println!("🏁 Run {}: {}", run_id, result.status.description);
    if let Some(time) = &result.time {
        println!("  Time:   {}s", time);
    }
    if let Some(memory) = result.memory {
        println!("  Memory: {} KB", memory);
    }
    for (label, output) in [
        ("stdout", &result.stdout),
        ("stderr", &result.stderr),
        ("compile output", &result.compile_output),
    ] {
        if let Some(text) = output.as_deref().filter(|t| !t.is_empty()) {
            println!("\n── {} ──\n{}", label, text.trim_end());
        }
    }
}

/// Extract the first event name and its data from a server-sent event body.
/// Multi-line data fields are joined with newlines; the event name defaults to "message".
pub fn parse_sse_event(body: &str) -> Option<(String, String)> {
    let mut event: Option<String> = None;
    let mut data: Vec<&str> = Vec::new();

    for line in body.lines() {
        if line.is_empty() {
            if !data.is_empty() || event.is_some() {
                break;
            }
            continue;
        }
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if event.is_none() && data.is_empty() {
        return None;
    }
    Some((
        event.unwrap_or_else(|| "message".to_string()),
        data.join("\n"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_completed_event() {
        let body = "event: completed\ndata: {\"status\":{\"id\":3,\"description\":\"Accepted\"}}\n\n";
        let (event, data) = parse_sse_event(body).unwrap();
        assert_eq!(event, "completed");
        let result: JudgeResult = serde_json::from_str(&data).unwrap();
        assert_eq!(result.status.description, "Accepted");
        assert!(result.is_terminal());
    }

    #[test]
    fn test_parse_timeout_event() {
        let (event, data) = parse_sse_event("event: timeout\ndata: {}\n\n").unwrap();
        assert_eq!(event, "timeout");
        assert_eq!(data, "{}");
    }

    #[test]
    fn test_parse_skips_comments_and_joins_data() {
        let body = ": keep-alive\n\ndata: line one\ndata: line two\n\nevent: later\n";
        let (event, data) = parse_sse_event(body).unwrap();
        assert_eq!(event, "message");
        assert_eq!(data, "line one\nline two");
    }

    #[test]
    fn test_parse_empty_body() {
        assert!(parse_sse_event("").is_none());
        assert!(parse_sse_event(": only a comment\n").is_none());
    }

    #[test]
    fn test_api_client_url() {
        let client = ApiClient::new("http://localhost:8080/").unwrap();
        assert_eq!(
            client.url("/execute/abc"),
            "http://localhost:8080/api/v1/execute/abc"
        );
    }

    #[test]
    fn test_describe_error() {
        assert_eq!(
            describe_error(StatusCode::CONFLICT, "max_runs_reached"),
            "Run limit reached for this session"
        );
        assert!(describe_error(StatusCode::UNAUTHORIZED, "missing sessionId").contains("missing"));
    }
}
