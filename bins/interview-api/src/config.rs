// Service configuration, loaded once at startup from the environment

use std::time::Duration;

use interview_common::config::{env_opt, env_or, env_parse};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub judge: JudgeConfig,
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub languages_path: String,
    pub limits: SessionLimits,
    pub polling: PollSettings,
    pub event_timeout: Duration,
    pub remarks_timeout: Duration,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct JudgeConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub host: String,
    pub timeout: Duration,
}

/// Session lifetime and run-count cap
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub ttl: chrono::Duration,
    pub max_runs: u32,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            ttl: chrono::Duration::hours(1),
            max_runs: 3,
        }
    }
}

/// Cadence and deadline of the background poll loop
#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub window: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            window: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let ttl_secs: i64 = env_parse("SESSION_TTL_SECS", 3600)?;
        let max_runs: u32 = env_parse("MAX_RUNS_PER_SESSION", 3)?;
        let poll_interval_ms: u64 = env_parse("POLL_INTERVAL_MS", 2000)?;
        let poll_window_secs: u64 = env_parse("POLL_WINDOW_SECS", 60)?;
        let judge_timeout_secs: u64 = env_parse("JUDGE_TIMEOUT_SECS", 10)?;
        let event_timeout_secs: u64 = env_parse("EVENT_TIMEOUT_SECS", 60)?;
        let remarks_timeout_secs: u64 = env_parse("REMARKS_TIMEOUT_SECS", 20)?;

        if max_runs == 0 {
            return Err("MAX_RUNS_PER_SESSION must be at least 1".to_string());
        }
        if poll_interval_ms == 0 {
            return Err("POLL_INTERVAL_MS must be positive".to_string());
        }

        Ok(Self {
            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),
            judge: JudgeConfig {
                base_url: env_or("JUDGE0_URL", "https://judge0-ce.p.rapidapi.com"),
                api_key: env_opt("RAPIDAPI_KEY"),
                host: env_or("RAPIDAPI_HOST", "judge0-ce.p.rapidapi.com"),
                timeout: Duration::from_secs(judge_timeout_secs),
            },
            gemini_api_key: env_opt("GEMINI_API_KEY"),
            gemini_model: env_or("GEMINI_MODEL", "gemini-2.5-flash"),
            languages_path: env_or("LANGUAGES_PATH", "config/languages.json"),
            limits: SessionLimits {
                ttl: chrono::Duration::seconds(ttl_secs),
                max_runs,
            },
            polling: PollSettings {
                interval: Duration::from_millis(poll_interval_ms),
                window: Duration::from_secs(poll_window_secs),
            },
            event_timeout: Duration::from_secs(event_timeout_secs),
            remarks_timeout: Duration::from_secs(remarks_timeout_secs),
            cors_origins: parse_origins(&env_or(
                "CORS_ORIGINS",
                "http://localhost:3000,http://127.0.0.1:3000",
            )),
        })
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(str::to_string)
        .collect()
}
