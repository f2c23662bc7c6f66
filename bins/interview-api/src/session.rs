/// Interview session lifecycle rules
///
/// A session accepts new executions only while it is active, unexpired and
/// below the run cap. Ending a session pulls its expiry forward to "now";
/// the run counter only ever moves up and never past the cap.

use chrono::{DateTime, Utc};
use interview_common::types::SessionStatus;
use rand::Rng;

use crate::config::SessionLimits;

const SESSION_ID_LEN: usize = 16;
const SESSION_ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub run_count: u32,
    pub status: SessionStatus,
}

/// Why a session refused a new execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    Unknown,
    Ended,
    Expired,
    RunLimitReached,
}

impl Rejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rejection::Unknown => "unknown_session",
            Rejection::Ended => "session_ended",
            Rejection::Expired => "session_expired",
            Rejection::RunLimitReached => "max_runs_reached",
        }
    }
}

impl Session {
    pub fn new(id: String, now: DateTime<Utc>, limits: &SessionLimits) -> Self {
        Self {
            id,
            created_at: now,
            expires_at: now + limits.ttl,
            run_count: 0,
            status: SessionStatus::Active,
        }
    }

    /// Active and not yet expired, regardless of the run counter
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == SessionStatus::Active && now < self.expires_at
    }

    pub fn admission(&self, now: DateTime<Utc>, limits: &SessionLimits) -> Result<(), Rejection> {
        if self.status != SessionStatus::Active {
            return Err(Rejection::Ended);
        }
        if now >= self.expires_at {
            return Err(Rejection::Expired);
        }
        if self.run_count >= limits.max_runs {
            return Err(Rejection::RunLimitReached);
        }
        Ok(())
    }

    #[cfg(test)]
    pub fn is_accepting_runs(&self, now: DateTime<Utc>, limits: &SessionLimits) -> bool {
        self.admission(now, limits).is_ok()
    }

    /// Count one completed run. Returns false once the cap is reached.
    pub fn record_run(&mut self, limits: &SessionLimits) -> bool {
        if self.run_count < limits.max_runs {
            self.run_count += 1;
            true
        } else {
            false
        }
    }

    pub fn end(&mut self, now: DateTime<Utc>) {
        self.status = SessionStatus::Ended;
        self.expires_at = now;
    }
}

/// Unguessable session identifier (lowercase alphanumerics, uniform)
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    (0..SESSION_ID_LEN)
        .map(|_| SESSION_ID_ALPHABET[rng.gen_range(0..SESSION_ID_ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn limits() -> SessionLimits {
        SessionLimits::default()
    }

    #[test]
    fn test_new_session_expires_after_ttl() {
        let now = Utc::now();
        let session = Session::new("s".to_string(), now, &limits());
        assert_eq!(session.expires_at - session.created_at, chrono::Duration::hours(1));
        assert_eq!(session.run_count, 0);
        assert!(session.is_accepting_runs(now, &limits()));
    }

    #[test]
    fn test_admission_rules() {
        let now = Utc::now();
        let mut session = Session::new("s".to_string(), now, &limits());

        let later = now + chrono::Duration::hours(2);
        assert_eq!(session.admission(later, &limits()), Err(Rejection::Expired));

        session.run_count = 3;
        assert_eq!(
            session.admission(now, &limits()),
            Err(Rejection::RunLimitReached)
        );

        session.end(now);
        assert_eq!(session.admission(now, &limits()), Err(Rejection::Ended));
        assert_eq!(session.expires_at, now);
        assert!(!session.is_live(now));
    }

    #[test]
    fn test_record_run_is_capped() {
        let mut session = Session::new("s".to_string(), Utc::now(), &limits());
        assert!(session.record_run(&limits()));
        assert!(session.record_run(&limits()));
        assert!(session.record_run(&limits()));
        assert!(!session.record_run(&limits()));
        assert_eq!(session.run_count, 3);
    }

    #[test]
    fn test_generated_ids_look_random() {
        let ids: HashSet<String> = (0..200).map(|_| generate_session_id()).collect();
        assert_eq!(ids.len(), 200);
        for id in &ids {
            assert_eq!(id.len(), SESSION_ID_LEN);
            assert!(id.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        }
    }
}
