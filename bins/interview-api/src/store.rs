/// Process-wide interview state
///
/// Holds the four shared registries behind a single mutex:
/// - sessions, plus the client-key -> active-session index
/// - terminal judge results keyed by run token
/// - per-session run history
/// - one-shot waiters per run token
///
/// Critical sections never await. Everything handed back to callers is a copy.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use chrono::{DateTime, Utc};
use interview_common::types::{JudgeResult, RunSummary};
use tokio::sync::oneshot;

use crate::config::SessionLimits;
use crate::session::{generate_session_id, Rejection, Session};

/// Receiving end of a run subscription.
///
/// Dropping it, whether after delivery, a timeout or a disconnect, retires
/// its slot in the registry.
#[derive(Debug)]
pub struct Waiter {
    rx: oneshot::Receiver<JudgeResult>,
    store: Arc<Store>,
    token: String,
}

impl Waiter {
    #[cfg(test)]
    pub fn try_recv(&mut self) -> Result<JudgeResult, oneshot::error::TryRecvError> {
        self.rx.try_recv()
    }
}

impl Future for Waiter {
    type Output = Result<JudgeResult, oneshot::error::RecvError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.get_mut().rx).poll(cx)
    }
}

impl Drop for Waiter {
    fn drop(&mut self) {
        // close first so our sender reads as closed when pruning
        self.rx.close();
        self.store.release_waiters(&self.token);
    }
}

/// Result of registering interest in a run token
#[derive(Debug)]
pub enum Subscription {
    /// The token was already resolved
    Ready(JudgeResult),
    Pending(Waiter),
}

/// Side effects applied by the one caller that finalized a token
#[derive(Debug, Clone)]
pub struct Finalized {
    pub result: JudgeResult,
    pub summary: Option<RunSummary>,
    pub counted: bool,
    pub notified: usize,
}

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    client_active: HashMap<String, String>,
    run_results: HashMap<String, JudgeResult>,
    session_runs: HashMap<String, Vec<RunSummary>>,
    listeners: HashMap<String, Vec<oneshot::Sender<JudgeResult>>>,
    finalized: HashSet<String>,
}

#[derive(Debug)]
pub struct Store {
    limits: SessionLimits,
    inner: Mutex<Inner>,
}

impl Store {
    pub fn new(limits: SessionLimits) -> Self {
        Self {
            limits,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // registries stay consistent per operation, so a poisoned guard is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ---------------------------------------------------------------- sessions

    /// Resume the client's live session, or mint a new one.
    /// Returns the session and whether it was resumed.
    pub fn create_or_resume(&self, client_key: Option<&str>, now: DateTime<Utc>) -> (Session, bool) {
        let mut inner = self.lock();

        if let Some(key) = client_key {
            let live = inner
                .client_active
                .get(key)
                .and_then(|sid| inner.sessions.get(sid))
                .filter(|sess| sess.is_live(now))
                .cloned();
            if let Some(sess) = live {
                return (sess, true);
            }
        }

        let mut id = generate_session_id();
        while inner.sessions.contains_key(&id) {
            id = generate_session_id();
        }
        let sess = Session::new(id, now, &self.limits);
        inner.sessions.insert(sess.id.clone(), sess.clone());
        if let Some(key) = client_key {
            inner.client_active.insert(key.to_string(), sess.id.clone());
        }
        (sess, false)
    }

    pub fn session(&self, id: &str) -> Option<Session> {
        self.lock().sessions.get(id).cloned()
    }

    /// Mark a session ended. Returns false if it does not exist.
    pub fn end_session(&self, id: &str, now: DateTime<Utc>) -> bool {
        match self.lock().sessions.get_mut(id) {
            Some(sess) => {
                sess.end(now);
                true
            }
            None => false,
        }
    }

    /// Remove a session with its run history and client-key entries.
    /// Returns whether anything was removed.
    pub fn delete_session(&self, id: &str) -> bool {
        let mut inner = self.lock();
        let existed = inner.sessions.remove(id).is_some();
        inner.session_runs.remove(id);
        inner.client_active.retain(|_, sid| sid != id);
        existed
    }

    /// Check that a session may start another execution
    pub fn admit_run(&self, id: &str, now: DateTime<Utc>) -> Result<Session, Rejection> {
        let inner = self.lock();
        let sess = inner.sessions.get(id).ok_or(Rejection::Unknown)?;
        sess.admission(now, &self.limits)?;
        Ok(sess.clone())
    }

    // ------------------------------------------------------------ run history

    #[cfg(test)]
    pub fn runs(&self, session_id: &str) -> Vec<RunSummary> {
        self.lock()
            .session_runs
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Session and its run history read under one lock
    pub fn session_snapshot(&self, id: &str) -> Option<(Session, Vec<RunSummary>)> {
        let inner = self.lock();
        let sess = inner.sessions.get(id)?.clone();
        let runs = inner.session_runs.get(id).cloned().unwrap_or_default();
        Some((sess, runs))
    }

    // ----------------------------------------------------------- result cache

    pub fn cached_result(&self, token: &str) -> Option<JudgeResult> {
        self.lock().run_results.get(token).cloned()
    }

    /// Store a terminal result unless one is already present.
    /// Returns the value that ends up cached.
    pub fn cache_result(&self, token: &str, result: JudgeResult) -> JudgeResult {
        self.lock()
            .run_results
            .entry(token.to_string())
            .or_insert(result)
            .clone()
    }

    // ------------------------------------------------------------- waiters

    pub fn subscribe(self: &Arc<Self>, token: &str) -> Subscription {
        let mut inner = self.lock();
        if let Some(result) = inner.run_results.get(token) {
            return Subscription::Ready(result.clone());
        }
        let (tx, rx) = oneshot::channel();
        let waiters = inner.listeners.entry(token.to_string()).or_default();
        // drop waiters whose subscriber already went away
        waiters.retain(|w| !w.is_closed());
        waiters.push(tx);
        Subscription::Pending(Waiter {
            rx,
            store: Arc::clone(self),
            token: token.to_string(),
        })
    }

    /// Prune closed senders for `token`; the key goes once none are left
    fn release_waiters(&self, token: &str) {
        let mut inner = self.lock();
        if let Some(waiters) = inner.listeners.get_mut(token) {
            waiters.retain(|w| !w.is_closed());
            if waiters.is_empty() {
                inner.listeners.remove(token);
            }
        }
    }

    /// Subscribers still waiting on `token`
    #[cfg(test)]
    pub fn waiter_count(&self, token: &str) -> usize {
        self.lock()
            .listeners
            .get(token)
            .map_or(0, |w| w.iter().filter(|tx| !tx.is_closed()).count())
    }

    // ----------------------------------------------------------- finalization

    /// Apply the terminal side effects for `token` exactly once.
    ///
    /// The first caller claims the token: the cache is filled (keeping an
    /// earlier value if present), the session's counter is bumped if below the
    /// cap, a summary is appended to its history and every registered waiter is
    /// woken. Later callers get `None` and change nothing.
    pub fn finalize_run(&self, token: &str, session_id: &str, result: JudgeResult) -> Option<Finalized> {
        let mut guard = self.lock();
        let inner = &mut *guard;
        if !inner.finalized.insert(token.to_string()) {
            return None;
        }

        let result = inner
            .run_results
            .entry(token.to_string())
            .or_insert(result)
            .clone();

        let mut counted = false;
        let mut summary = None;
        if let Some(sess) = inner.sessions.get_mut(session_id) {
            counted = sess.record_run(&self.limits);
            let runs = inner.session_runs.entry(session_id.to_string()).or_default();
            let entry = RunSummary::from_result(runs.len() as u32 + 1, &result);
            runs.push(entry.clone());
            summary = Some(entry);
        }

        let waiters = inner.listeners.remove(token).unwrap_or_default();
        drop(guard);

        let mut notified = 0;
        for waiter in waiters {
            if waiter.send(result.clone()).is_ok() {
                notified += 1;
            }
        }

        Some(Finalized {
            result,
            summary,
            counted,
            notified,
        })
    }

    #[cfg(test)]
    pub fn is_finalized(&self, token: &str) -> bool {
        self.lock().finalized.contains(token)
    }
}
