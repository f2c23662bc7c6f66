/// Execution Orchestrator
///
/// **Responsibility:**
/// Follow one judge token from submission to a terminal result, in the background.
///
/// **Lifecycle per token:**
/// 1. Cached result already present -> finalize straight away, no polling
/// 2. Otherwise poll the judge every `interval` until a terminal status shows up
///    or `window` of wall-clock time has passed
/// 3. Transient poll failures just wait for the next tick
/// 4. Terminal result -> `Store::finalize_run` (cache, run count, history, waiters)
/// 5. Deadline -> stop quietly; waiters run into their own timeout
///
/// Several orchestrations may race on one token. Only the one that wins
/// `finalize_run` applies side effects; the others observe `None` and exit.

use std::sync::Arc;

use interview_common::types::JudgeResult;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, instrument, warn};

use crate::config::PollSettings;
use crate::judge::Judge;
use crate::metrics;
use crate::store::{Finalized, Store};

/// How a single orchestration ended
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// This task applied the terminal side effects
    Finalized(Finalized),
    /// Another path finalized the token first
    AlreadyFinalized,
    /// No terminal result before the deadline
    GaveUp,
}

#[derive(Clone)]
pub struct Orchestrator {
    store: Arc<Store>,
    judge: Arc<dyn Judge>,
    settings: PollSettings,
}

impl Orchestrator {
    pub fn new(store: Arc<Store>, judge: Arc<dyn Judge>, settings: PollSettings) -> Self {
        Self {
            store,
            judge,
            settings,
        }
    }

    /// Start tracking `run_id` for `session_id`. Fire-and-forget for callers.
    pub fn spawn(&self, session_id: String, run_id: String) -> JoinHandle<RunOutcome> {
        let this = self.clone();
        tokio::spawn(async move { this.track(&session_id, &run_id).await })
    }

    #[instrument(skip_all, fields(session_id = %session_id, run_id = %run_id))]
    pub async fn track(&self, session_id: &str, run_id: &str) -> RunOutcome {
        if let Some(cached) = self.store.cached_result(run_id) {
            debug!("Result already cached, skipping poll loop");
            return self.finalize(session_id, run_id, cached);
        }

        let deadline = Instant::now() + self.settings.window;
        let mut polls = 0u32;

        loop {
            if Instant::now() >= deadline {
                info!(polls, "No terminal result before deadline, giving up");
                metrics::EXECUTIONS_ABANDONED.inc();
                return RunOutcome::GaveUp;
            }

            // another request may have resolved the token meanwhile
            if let Some(cached) = self.store.cached_result(run_id) {
                return self.finalize(session_id, run_id, cached);
            }

            polls += 1;
            match self.judge.poll(run_id).await {
                Ok(result) if result.is_terminal() => {
                    debug!(polls, status = %result.status.description, "Terminal status received");
                    return self.finalize(session_id, run_id, result);
                }
                Ok(result) => {
                    debug!(polls, status = %result.status.description, "Run still in flight");
                }
                Err(e) => {
                    metrics::JUDGE_POLL_FAILURES.inc();
                    warn!(polls, error = %e, "Judge poll failed, retrying");
                }
            }

            sleep(self.settings.interval).await;
        }
    }

    fn finalize(&self, session_id: &str, run_id: &str, result: JudgeResult) -> RunOutcome {
        match self.store.finalize_run(run_id, session_id, result) {
            Some(done) => {
                metrics::EXECUTIONS_FINALIZED
                    .with_label_values(&[done.result.status.description.as_str()])
                    .inc();
                info!(
                    status = %done.result.status.description,
                    counted = done.counted,
                    run = done.summary.as_ref().map(|s| s.sequence),
                    notified = done.notified,
                    "Run finalized"
                );
                RunOutcome::Finalized(done)
            }
            None => {
                debug!("Run already finalized elsewhere");
                RunOutcome::AlreadyFinalized
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::SessionLimits;
    use crate::judge::{JudgeError, SubmitReceipt, Submission};
    use crate::store::tests::judge_result;
    use crate::store::Subscription;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Scripted judge: each poll pops the next response, the last one repeats.
    /// Submissions return `token`, or fail with `submit_error` when set.
    pub(crate) struct FakeJudge {
        polls: Mutex<VecDeque<Result<JudgeResult, String>>>,
        pub(crate) poll_calls: AtomicUsize,
        pub(crate) submit_calls: AtomicUsize,
        token: String,
        submit_error: Option<(u16, String)>,
    }

    impl FakeJudge {
        pub(crate) fn new(token: &str, script: Vec<Result<JudgeResult, String>>) -> Self {
            Self {
                polls: Mutex::new(script.into()),
                poll_calls: AtomicUsize::new(0),
                submit_calls: AtomicUsize::new(0),
                token: token.to_string(),
                submit_error: None,
            }
        }

        /// Every submission is refused upstream with `status` and `body`
        pub(crate) fn rejecting_submissions(status: u16, body: &str) -> Self {
            Self {
                submit_error: Some((status, body.to_string())),
                ..Self::never_finishes("unused")
            }
        }

        /// Accepted after `pending` in-flight polls
        pub(crate) fn accepted_after(token: &str, pending: usize) -> Self {
            let mut script: Vec<Result<JudgeResult, String>> =
                (0..pending).map(|_| Ok(judge_result(2, "Processing"))).collect();
            script.push(Ok(judge_result(3, "Accepted")));
            Self::new(token, script)
        }

        pub(crate) fn never_finishes(token: &str) -> Self {
            Self::new(token, vec![Ok(judge_result(1, "In Queue"))])
        }
    }

    #[async_trait]
    impl Judge for FakeJudge {
        async fn submit(&self, _submission: &Submission) -> Result<SubmitReceipt, JudgeError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            if let Some((status, body)) = &self.submit_error {
                return Err(JudgeError::UpstreamStatus {
                    status: *status,
                    body: body.clone(),
                });
            }
            Ok(SubmitReceipt {
                token: self.token.clone(),
                status: None,
                status_code: 201,
            })
        }

        async fn poll(&self, _token: &str) -> Result<JudgeResult, JudgeError> {
            self.poll_calls.fetch_add(1, Ordering::SeqCst);
            let mut polls = self.polls.lock().unwrap();
            let next = if polls.len() > 1 {
                polls.pop_front().unwrap()
            } else {
                polls.front().cloned().unwrap()
            };
            next.map_err(JudgeError::Malformed)
        }
    }

    fn setup(judge: FakeJudge) -> (Arc<Store>, Arc<FakeJudge>, Orchestrator, String) {
        let store = Arc::new(Store::new(SessionLimits::default()));
        let judge = Arc::new(judge);
        let orchestrator = Orchestrator::new(store.clone(), judge.clone(), PollSettings::default());
        let (sess, _) = store.create_or_resume(None, Utc::now());
        (store, judge, orchestrator, sess.id)
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_after_two_polls() {
        let (store, judge, orchestrator, sid) = setup(FakeJudge::accepted_after("tok", 1));

        let outcome = orchestrator.spawn(sid.clone(), "tok".to_string()).await.unwrap();
        assert!(matches!(outcome, RunOutcome::Finalized(_)));
        assert_eq!(judge.poll_calls.load(Ordering::SeqCst), 2);

        assert_eq!(store.cached_result("tok").unwrap().status.description, "Accepted");
        assert_eq!(store.session(&sid).unwrap().run_count, 1);
        let runs = store.runs(&sid);
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, "Accepted");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_cadence() {
        let (_store, _judge, orchestrator, sid) = setup(FakeJudge::accepted_after("tok", 3));
        let started = Instant::now();
        orchestrator.track(&sid, "tok").await;
        // three waits between four polls
        assert_eq!(started.elapsed(), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_at_deadline() {
        let (store, judge, orchestrator, sid) = setup(FakeJudge::never_finishes("tok"));
        let Subscription::Pending(mut waiter) = store.subscribe("tok") else {
            panic!("token should be unresolved");
        };

        let started = Instant::now();
        let outcome = orchestrator.track(&sid, "tok").await;
        assert!(matches!(outcome, RunOutcome::GaveUp));
        assert!(started.elapsed() >= Duration::from_secs(60));
        assert!(started.elapsed() < Duration::from_secs(63));
        assert_eq!(judge.poll_calls.load(Ordering::SeqCst), 30);

        assert!(store.cached_result("tok").is_none());
        assert!(store.runs(&sid).is_empty());
        assert_eq!(store.session(&sid).unwrap().run_count, 0);
        assert!(waiter.try_recv().is_err());
        assert!(!store.is_finalized("tok"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let judge = FakeJudge::new(
            "tok",
            vec![
                Err("connection reset".to_string()),
                Err("bad gateway".to_string()),
                Ok(judge_result(4, "Wrong Answer")),
            ],
        );
        let (store, judge, orchestrator, sid) = setup(judge);

        let outcome = orchestrator.track(&sid, "tok").await;
        assert!(matches!(outcome, RunOutcome::Finalized(_)));
        assert_eq!(judge.poll_calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.runs(&sid)[0].status, "Wrong Answer");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_result_skips_polling() {
        let (store, judge, orchestrator, sid) = setup(FakeJudge::never_finishes("tok"));
        store.cache_result("tok", judge_result(3, "Accepted"));

        let outcome = orchestrator.track(&sid, "tok").await;
        assert!(matches!(outcome, RunOutcome::Finalized(_)));
        assert_eq!(judge.poll_calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.session(&sid).unwrap().run_count, 1);
        assert_eq!(store.runs(&sid).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_result_cached_mid_loop_is_picked_up() {
        let (store, judge, orchestrator, sid) = setup(FakeJudge::never_finishes("tok"));
        let handle = orchestrator.spawn(sid.clone(), "tok".to_string());

        sleep(Duration::from_secs(3)).await;
        store.cache_result("tok", judge_result(5, "Time Limit Exceeded"));

        let outcome = handle.await.unwrap();
        assert!(matches!(outcome, RunOutcome::Finalized(_)));
        assert_eq!(judge.poll_calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.runs(&sid)[0].status, "Time Limit Exceeded");
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_orchestrations_single_effect() {
        let (store, _judge, orchestrator, sid) = setup(FakeJudge::accepted_after("tok", 1));
        let Subscription::Pending(waiter) = store.subscribe("tok") else {
            panic!("token should be unresolved");
        };

        let handles: Vec<_> = (0..4)
            .map(|_| orchestrator.spawn(sid.clone(), "tok".to_string()))
            .collect();
        let mut finalized = 0;
        for handle in handles {
            if let RunOutcome::Finalized(_) = handle.await.unwrap() {
                finalized += 1;
            }
        }

        assert_eq!(finalized, 1);
        assert_eq!(store.session(&sid).unwrap().run_count, 1);
        assert_eq!(store.runs(&sid).len(), 1);
        assert_eq!(waiter.await.unwrap().status.description, "Accepted");
    }
}
