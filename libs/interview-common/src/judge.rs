// Remote judge protocol semantics - URL shapes, status ids and the output codec.
// Shared by the submit path and the poll path.

use base64::{engine::general_purpose, Engine as _};

use crate::types::JudgeResult;

pub const STATUS_IN_QUEUE: u32 = 1;
pub const STATUS_PROCESSING: u32 = 2;

/// Fields requested when polling a submission
pub const RESULT_FIELDS: &str = "stdout,stderr,compile_output,status,time,memory";

/// Statuses above `Processing` never change again
pub fn is_terminal_status(status_id: u32) -> bool {
    status_id > STATUS_PROCESSING
}

/// Submission endpoint (non-blocking, base64 payloads)
pub fn submissions_url(base_url: &str) -> String {
    format!(
        "{}/submissions?base64_encoded=true&wait=false&fields=*",
        base_url.trim_end_matches('/')
    )
}

/// Poll endpoint for one token
pub fn submission_url(base_url: &str, token: &str) -> String {
    format!(
        "{}/submissions/{}?base64_encoded=true&fields={}",
        base_url.trim_end_matches('/'),
        token,
        RESULT_FIELDS
    )
}

pub fn encode_field(raw: &str) -> String {
    general_purpose::STANDARD.encode(raw.as_bytes())
}

/// Decode a base64 output field. Values that are not valid base64 UTF-8 are kept as-is.
pub fn decode_field(field: Option<String>) -> Option<String> {
    let value = field?;
    if value.is_empty() {
        return Some(value);
    }
    // the judge wraps long base64 output at 60 columns
    let compact: String = value.split_whitespace().collect();
    match general_purpose::STANDARD.decode(compact.as_bytes()) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(decoded) => Some(decoded),
            Err(_) => Some(value),
        },
        Err(_) => Some(value),
    }
}

/// Decode every base64 output field of a raw judge response
pub fn decode_result(mut result: JudgeResult) -> JudgeResult {
    result.stdout = decode_field(result.stdout);
    result.stderr = decode_field(result.stderr);
    result.compile_output = decode_field(result.compile_output);
    result
}

/// Cut an upstream body down to something safe to log
pub fn truncate_for_log(body: &str, max_chars: usize) -> String {
    if body.chars().count() <= max_chars {
        return body.to_string();
    }
    let mut out: String = body.chars().take(max_chars).collect();
    out.push('…');
    out
}
