use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::backend::{Backend, ProgressQuery, ProgressReport, RemoteStatus};
use crate::job::status::{JobState, JobStatus};

const DEFAULT_INTERVAL: Duration = Duration::from_millis(2000);
const DEFAULT_MAX_FAILURES: u32 = 5;

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    /// Fixed period between polls. It does not grow with failures.
    pub interval: Duration,
    /// Consecutive transport failures tolerated before giving up.
    pub max_failures: u32,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            max_failures: DEFAULT_MAX_FAILURES,
        }
    }
}

/// Who is writing job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Writer {
    /// A polling cycle started at this generation. Its writes are dropped
    /// once the generation moves on.
    Cycle(u64),
    /// The tracker itself (user actions).
    Owner,
}

/// Applies `f` to the shared state unless `writer` is a stale cycle.
/// Watchers are only woken when the state actually changed.
/// Returns false if the write was refused.
pub(crate) fn write(
    state: &watch::Sender<JobState>,
    writer: Writer,
    f: impl FnOnce(&mut JobState),
) -> bool {
    let mut accepted = true;
    state.send_if_modified(|s| {
        if let Writer::Cycle(generation) = writer {
            if s.generation != generation {
                accepted = false;
                return false;
            }
        }
        let before = s.clone();
        f(s);
        *s != before
    });
    accepted
}

/// What the poller should do after a successful report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    KeepPolling,
    Stop,
}

/// Interprets one successful `/progress` reply. On `completed` this also
/// issues the single model-load request. `debug_line` lands in the same
/// state update as the status change.
pub(crate) async fn apply_report(
    backend: &dyn Backend,
    state: &watch::Sender<JobState>,
    writer: Writer,
    report: &ProgressReport,
    debug_line: String,
) -> Verdict {
    let percent = report.percent();
    let debug_info = Some(debug_line);

    match report.status() {
        RemoteStatus::Completed => {
            info!("Training completed, loading model");
            let accepted = write(state, writer, |s| {
                s.progress = percent;
                s.status = JobStatus::FinetuningSuccess;
                s.error = None;
                s.debug_info = debug_info;
            });
            if !accepted {
                return Verdict::Stop;
            }
            match backend.load_model().await {
                Ok(reply) => debug!("Model load response: {reply}"),
                Err(e) => {
                    error!("Error loading model: {e}");
                    write(state, writer, |s| s.fail(format!("Failed to load model: {e}")));
                }
            }
            Verdict::Stop
        }
        RemoteStatus::Error => {
            let message = report.message.as_deref().unwrap_or("Unknown error");
            error!("Backend reported training error: {message}");
            write(state, writer, |s| {
                s.progress = percent;
                s.debug_info = debug_info;
                s.fail(format!("Training error: {message}"));
            });
            Verdict::Stop
        }
        RemoteStatus::Training => {
            debug!("Training in progress: {percent}%");
            let accepted = write(state, writer, |s| {
                s.progress = percent;
                s.status = JobStatus::Finetuning;
                s.error = None;
                s.debug_info = debug_info;
            });
            if accepted {
                Verdict::KeepPolling
            } else {
                Verdict::Stop
            }
        }
        RemoteStatus::Unknown => {
            let accepted = write(state, writer, |s| {
                s.progress = percent;
                s.debug_info = debug_info;
            });
            if accepted {
                Verdict::KeepPolling
            } else {
                Verdict::Stop
            }
        }
    }
}

async fn run_cycle(
    backend: Arc<dyn Backend>,
    state: Arc<watch::Sender<JobState>>,
    settings: PollSettings,
    generation: u64,
) {
    let writer = Writer::Cycle(generation);
    let max = settings.max_failures;
    let mut ticker = tokio::time::interval(settings.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures: u32 = 0;

    loop {
        // First tick completes immediately.
        ticker.tick().await;
        debug!("Polling progress endpoint...");

        match backend.progress(ProgressQuery::Cycle).await {
            Ok(report) => {
                failures = 0;
                let line = format!(
                    "Latest progress: {} {}%",
                    report.status().as_str(),
                    report.percent()
                );
                let verdict = apply_report(backend.as_ref(), &state, writer, &report, line).await;
                if verdict == Verdict::Stop {
                    break;
                }
            }
            Err(e) => {
                failures += 1;
                if failures >= max {
                    error!("Progress polling failed {failures} times in a row: {e}");
                    write(&state, writer, |s| {
                        s.fail(format!(
                            "Failed to get training progress after {max} attempts: {e}"
                        ))
                    });
                    break;
                }
                if e.is_timeout() {
                    warn!("Progress request timed out ({failures}/{max})");
                } else {
                    warn!("Retry {failures}/{max} for progress polling: {e}");
                }
                if !write(&state, writer, |s| {
                    s.debug_info = Some(format!("Retry {failures}/{max}: {e}"))
                }) {
                    break;
                }
            }
        }
    }
    debug!("Progress polling cycle {generation} ended");
}

/// A running polling cycle. Stopping (or dropping) it guarantees the cycle
/// writes no further state.
pub struct PollerHandle {
    task: JoinHandle<()>,
    state: Arc<watch::Sender<JobState>>,
    generation: u64,
}

impl PollerHandle {
    pub fn start(
        backend: Arc<dyn Backend>,
        state: Arc<watch::Sender<JobState>>,
        settings: PollSettings,
    ) -> Self {
        let mut generation = 0;
        state.send_if_modified(|s| {
            s.generation += 1;
            generation = s.generation;
            false
        });
        let task = tokio::spawn(run_cycle(backend, state.clone(), settings, generation));
        info!(
            "Started progress polling every {}ms",
            settings.interval.as_millis()
        );
        Self {
            task,
            state,
            generation,
        }
    }

    pub fn stop(&self) {
        let generation = self.generation;
        self.state.send_if_modified(|s| {
            if s.generation == generation {
                s.generation += 1;
            }
            false
        });
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{report, report_with_message, unavailable, FakeBackend};

    fn shared(status: JobStatus, progress: u8) -> Arc<watch::Sender<JobState>> {
        let (tx, _) = watch::channel(JobState {
            status,
            progress,
            ..Default::default()
        });
        Arc::new(tx)
    }

    async fn until_terminal(state: &watch::Sender<JobState>) -> JobState {
        let mut rx = state.subscribe();
        let end = rx.wait_for(|s| s.status.is_terminal()).await.unwrap().clone();
        end
    }

    #[tokio::test(start_paused = true)]
    async fn test_five_failures_end_in_error_and_stop_polling() {
        let backend = Arc::new(FakeBackend::new());
        let state = shared(JobStatus::Finetuning, 20);
        let _poller = PollerHandle::start(backend.clone(), state.clone(), PollSettings::default());

        let end = until_terminal(&state).await;
        assert_eq!(end.status, JobStatus::Error);
        assert_eq!(end.progress, 20);
        assert!(end
            .error
            .unwrap()
            .starts_with("Failed to get training progress after 5 attempts"));
        assert_eq!(backend.calls("progress"), 5);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(backend.calls("progress"), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_resets_failure_counter() {
        let backend = Arc::new(FakeBackend::new().script_progress([
            Err(unavailable()),
            Err(unavailable()),
            Err(unavailable()),
            Err(unavailable()),
            Ok(report("training", 10.0)),
            Err(unavailable()),
            Err(unavailable()),
            Err(unavailable()),
            Err(unavailable()),
            Ok(report("completed", 100.0)),
        ]));
        let state = shared(JobStatus::Finetuning, 0);
        let _poller = PollerHandle::start(backend.clone(), state.clone(), PollSettings::default());

        let end = until_terminal(&state).await;
        assert_eq!(end.status, JobStatus::FinetuningSuccess);
        assert_eq!(end.progress, 100);
        assert_eq!(backend.calls("progress"), 10);
        assert_eq!(backend.calls("load_model"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_keeps_previous_progress() {
        let backend = Arc::new(FakeBackend::new().script_progress([
            Ok(report("training", 35.0)),
            Err(unavailable()),
        ]));
        let state = shared(JobStatus::Finetuning, 0);
        let _poller = PollerHandle::start(backend.clone(), state.clone(), PollSettings::default());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        let now = state.borrow().clone();
        assert_eq!(backend.calls("progress"), 2);
        assert_eq!(now.status, JobStatus::Finetuning);
        assert_eq!(now.progress, 35);
        assert_eq!(
            now.debug_info.as_deref(),
            Some("Retry 1/5: Request failed with status code 503: unavailable")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_is_constant() {
        let backend = Arc::new(FakeBackend::new());
        let state = shared(JobStatus::Finetuning, 0);
        let settings = PollSettings {
            interval: Duration::from_secs(2),
            max_failures: 10,
        };
        let _poller = PollerHandle::start(backend.clone(), state.clone(), settings);

        // Polls at t = 0, 2, 4, 6, 8 regardless of failures.
        tokio::time::sleep(Duration::from_millis(8500)).await;
        assert_eq!(backend.calls("progress"), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_loads_model_once() {
        let backend = Arc::new(FakeBackend::new().script_progress([Ok(report("completed", 100.0))]));
        let state = shared(JobStatus::Finetuning, 90);
        let _poller = PollerHandle::start(backend.clone(), state.clone(), PollSettings::default());

        let end = until_terminal(&state).await;
        assert_eq!(end.status, JobStatus::FinetuningSuccess);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.calls("load_model"), 1);
        assert_eq!(backend.calls("progress"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_failure_ends_in_error() {
        let backend = Arc::new(
            FakeBackend::new()
                .script_progress([Ok(report("completed", 100.0))])
                .script_load(Err(unavailable())),
        );
        let state = shared(JobStatus::Finetuning, 90);
        let poller = PollerHandle::start(backend.clone(), state.clone(), PollSettings::default());

        // Wait for the cycle to finish so the load result is in.
        while !poller.is_finished() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let end = state.borrow().clone();
        assert_eq!(end.status, JobStatus::Error);
        assert_eq!(
            end.error.as_deref(),
            Some("Failed to load model: Request failed with status code 503: unavailable")
        );
        assert_eq!(backend.calls("load_model"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_error_uses_backend_message() {
        let backend = Arc::new(
            FakeBackend::new().script_progress([Ok(report_with_message("error", "CUDA OOM"))]),
        );
        let state = shared(JobStatus::Finetuning, 0);
        let _poller = PollerHandle::start(backend.clone(), state.clone(), PollSettings::default());

        let end = until_terminal(&state).await;
        assert_eq!(end.error.as_deref(), Some("Training error: CUDA OOM"));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.calls("progress"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_status_only_updates_progress() {
        let backend = Arc::new(FakeBackend::new().script_progress([Ok(report("queued", 5.0))]));
        let state = shared(JobStatus::Finetuning, 0);
        let _poller = PollerHandle::start(backend.clone(), state.clone(), PollSettings::default());

        tokio::time::sleep(Duration::from_millis(100)).await;
        let now = state.borrow().clone();
        assert_eq!(now.status, JobStatus::Finetuning);
        assert_eq!(now.progress, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_updates_in_order() {
        let backend = Arc::new(FakeBackend::new().script_progress([
            Ok(report("training", 42.0)),
            Ok(report("training", 75.0)),
            Ok(report("completed", 100.0)),
        ]));
        let state = shared(JobStatus::Finetuning, 0);
        let mut rx = state.subscribe();
        let _poller = PollerHandle::start(backend.clone(), state.clone(), PollSettings::default());

        let mut seen = Vec::new();
        loop {
            rx.changed().await.unwrap();
            let s = rx.borrow_and_update().clone();
            if s.status == JobStatus::Finetuning && seen.last() != Some(&s.progress) {
                seen.push(s.progress);
            }
            if s.status.is_terminal() {
                break;
            }
        }
        assert_eq!(seen, vec![42, 75]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_poller_writes_nothing() {
        let backend = Arc::new(FakeBackend::new().script_progress([
            Ok(report("training", 10.0)),
            Ok(report("training", 20.0)),
            Ok(report("training", 30.0)),
        ]));
        let state = shared(JobStatus::Finetuning, 0);
        let poller = PollerHandle::start(backend.clone(), state.clone(), PollSettings::default());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(state.borrow().progress, 10);
        drop(poller);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(backend.calls("progress"), 1);
        assert_eq!(state.borrow().progress, 10);
    }

    #[test]
    fn test_stale_cycle_write_is_refused() {
        let state = shared(JobStatus::Finetuning, 0);
        state.send_modify(|s| s.generation = 3);
        assert!(!write(&state, Writer::Cycle(2), |s| s.progress = 50));
        assert_eq!(state.borrow().progress, 0);
        assert!(write(&state, Writer::Cycle(3), |s| s.progress = 50));
        assert!(write(&state, Writer::Owner, |s| s.progress = 60));
        assert_eq!(state.borrow().progress, 60);
    }
}
