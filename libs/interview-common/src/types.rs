use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Ended => write!(f, "ended"),
        }
    }
}

/// Returned by `POST /interviews`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewResponse {
    pub interview_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Body of `POST /execute`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub language_id: u32,
    pub source_code: String,
    #[serde(default)]
    pub stdin: String,
    #[serde(default)]
    pub problem_id: Option<i64>,
    /// "sample" or "hidden", informational only
    #[serde(default)]
    pub mode: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResponse {
    #[serde(rename = "runID")]
    pub run_id: String,
    pub status: Option<String>,
    pub status_code: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeStatus {
    pub id: u32,
    #[serde(default)]
    pub description: String,
}

/// A judging outcome as reported by the remote judge, with output fields decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JudgeResult {
    #[serde(default)]
    pub stdout: Option<String>,
    #[serde(default)]
    pub stderr: Option<String>,
    #[serde(default)]
    pub compile_output: Option<String>,
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub memory: Option<u64>,
    pub status: JudgeStatus,
}

impl JudgeResult {
    pub fn is_terminal(&self) -> bool {
        crate::judge::is_terminal_status(self.status.id)
    }
}

/// One completed run in a session's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    #[serde(rename = "run")]
    pub sequence: u32,
    pub status: String,
    pub time: Option<String>,
    pub memory: Option<u64>,
    pub stdout: Option<String>,
    pub stderr: Option<String>,
}

impl RunSummary {
    pub fn from_result(sequence: u32, result: &JudgeResult) -> Self {
        Self {
            sequence,
            status: result.status.description.clone(),
            time: result.time.clone(),
            memory: result.memory,
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
        }
    }
}

/// Returned by `GET /stats/session/{id}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatsResponse {
    pub session_id: String,
    pub total_runs: u32,
    pub final_status: String,
    pub per_run: Vec<RunSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remarks: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status_code: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execute_response_field_names() {
        let resp = ExecuteResponse {
            run_id: "abc".to_string(),
            status: None,
            status_code: 201,
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["runID"], "abc");
        assert_eq!(json["statusCode"], 201);
        assert!(json["status"].is_null());
    }

    #[test]
    fn test_execute_request_defaults() {
        let req: ExecuteRequest =
            serde_json::from_str(r#"{"language_id": 71, "source_code": "print(1)"}"#).unwrap();
        assert_eq!(req.language_id, 71);
        assert_eq!(req.stdin, "");
        assert!(req.problem_id.is_none());
    }

    #[test]
    fn test_run_summary_from_result() {
        let result = JudgeResult {
            stdout: Some("42\n".to_string()),
            stderr: None,
            compile_output: None,
            time: Some("0.01".to_string()),
            memory: Some(3200),
            status: JudgeStatus {
                id: 3,
                description: "Accepted".to_string(),
            },
        };
        let summary = RunSummary::from_result(2, &result);
        assert_eq!(summary.status, "Accepted");
        assert_eq!(summary.memory, Some(3200));

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["run"], 2);
        assert_eq!(json["time"], "0.01");
    }

    #[test]
    fn test_stats_response_omits_missing_remarks() {
        let stats = SessionStatsResponse {
            session_id: "s1".to_string(),
            total_runs: 0,
            final_status: String::new(),
            per_run: vec![],
            remarks: None,
        };
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["sessionId"], "s1");
        assert_eq!(json["totalRuns"], 0);
        assert!(json.get("remarks").is_none());
    }

    #[test]
    fn test_session_status_display() {
        assert_eq!(SessionStatus::Active.to_string(), "active");
        assert_eq!(
            serde_json::to_string(&SessionStatus::Ended).unwrap(),
            "\"ended\""
        );
    }
}
