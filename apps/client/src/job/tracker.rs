use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::backend::{Backend, ProgressQuery, RemoteStatus};
use crate::errors::{ClientError, JobError};
use crate::job::poller::{apply_report, write, PollSettings, PollerHandle, Writer};
use crate::job::status::{JobState, JobStatus};
use crate::questionnaire::AnswerRecord;

const UNREACHABLE: &str = "Cannot connect to backend server";

/// Drives one submitted answer record through dataset generation,
/// fine-tuning and model loading.
///
/// State is published on a `watch` channel; call [`JobTracker::subscribe`]
/// to render it. Dropping the tracker stops any polling cycle.
pub struct JobTracker {
    backend: Arc<dyn Backend>,
    record: AnswerRecord,
    settings: PollSettings,
    state: Arc<watch::Sender<JobState>>,
    poller: Option<PollerHandle>,
}

impl JobTracker {
    /// Takes ownership of the completed record. Status starts at `dataset_creation`.
    pub fn new(backend: Arc<dyn Backend>, record: AnswerRecord, settings: PollSettings) -> Self {
        let (state, _) = watch::channel(JobState::default());
        Self {
            backend,
            record,
            settings,
            state: Arc::new(state),
            poller: None,
        }
    }

    /// Tracker for a dataset generated in an earlier session. There is no
    /// record to resubmit, so it starts at `dataset_success`.
    pub fn for_existing_dataset(backend: Arc<dyn Backend>, settings: PollSettings) -> Self {
        let tracker = Self::new(backend, AnswerRecord::new(), settings);
        tracker.update(|s| s.status = JobStatus::DatasetSuccess);
        tracker
    }

    pub fn subscribe(&self) -> watch::Receiver<JobState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> JobState {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> JobStatus {
        self.state.borrow().status
    }

    pub fn is_polling(&self) -> bool {
        self.poller.as_ref().is_some_and(|p| !p.is_finished())
    }

    fn update(&self, f: impl FnOnce(&mut JobState)) {
        write(&self.state, Writer::Owner, f);
    }

    fn fail(&self, message: String) -> JobStatus {
        error!("{message}");
        self.update(|s| s.fail(message));
        JobStatus::Error
    }

    async fn is_reachable(&self) -> bool {
        match self.backend.ping().await {
            Ok(reply) => {
                self.update(|s| s.debug_info = Some(format!("Ping response: {reply}")));
                true
            }
            Err(e) => {
                warn!("Backend ping failed: {e}");
                self.update(|s| s.debug_info = Some(format!("Ping error: {e}")));
                false
            }
        }
    }

    /// Sends the record for dataset generation. Any outcome other than a
    /// `completed` reply lands in `error` with the reason retained.
    pub async fn submit_dataset(&mut self) -> JobStatus {
        self.submit("Dataset creation failed").await
    }

    async fn submit(&mut self, failure: &str) -> JobStatus {
        self.stop_polling();
        self.update(|s| {
            s.status = JobStatus::DatasetCreation;
            s.error = None;
        });

        if !self.is_reachable().await {
            return self.fail(format!("{failure}: {UNREACHABLE}"));
        }

        info!("Submitting {} answers for dataset generation", self.record.len());
        match self.backend.generate_dataset(&self.record).await {
            Ok(reply) if reply.is_completed() => {
                info!("Dataset creation completed");
                self.update(|s| s.status = JobStatus::DatasetSuccess);
                JobStatus::DatasetSuccess
            }
            Ok(reply) => self.fail(format!(
                "{failure}: Dataset creation did not complete: {}",
                reply.message.as_deref().unwrap_or("Unknown error")
            )),
            Err(e) => self.fail(format!("{failure}: {e}")),
        }
    }

    /// Starts remote fine-tuning and, once acknowledged, the polling cycle.
    /// Only allowed once the dataset exists.
    pub async fn start_training(&mut self) -> Result<JobStatus, JobError> {
        let status = self.status();
        if status != JobStatus::DatasetSuccess {
            return Err(JobError::InvalidState {
                action: "start training",
                status,
            });
        }

        if !self.is_reachable().await {
            return Ok(self.fail(format!("Failed to start training: {UNREACHABLE}")));
        }

        self.update(|s| {
            s.status = JobStatus::Finetuning;
            s.progress = 0;
            s.error = None;
        });

        match self.backend.train_model().await {
            Ok(reply) if reply.success => {
                info!("Model fine-tuning initiated");
                self.start_polling();
                Ok(JobStatus::Finetuning)
            }
            Ok(reply) => Ok(self.fail(format!(
                "Failed to start training: Training initialization failed: {}",
                reply.message.as_deref().unwrap_or("Unknown error")
            ))),
            Err(e) => Ok(self.fail(format!("Failed to start training: {e}"))),
        }
    }

    /// One out-of-band progress check, interpreted exactly like a successful
    /// poll. A transport failure leaves the status as it was and is returned.
    pub async fn force_check(&mut self) -> Result<JobStatus, ClientError> {
        let report = match self.backend.progress(ProgressQuery::Manual).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Manual progress check failed: {e}");
                self.update(|s| s.debug_info = Some(format!("Error checking progress: {e}")));
                return Err(e);
            }
        };

        // A terminal answer supersedes whatever the cycle is doing.
        if matches!(
            report.status(),
            RemoteStatus::Completed | RemoteStatus::Error
        ) {
            self.stop_polling();
        }

        let line = format!(
            "Status: {}, Progress: {}%, Timestamp: {}",
            report.status().as_str(),
            report.percent(),
            chrono::Local::now().format("%H:%M:%S")
        );
        apply_report(self.backend.as_ref(), &self.state, Writer::Owner, &report, line).await;

        let status = self.status();
        if status == JobStatus::Finetuning && !self.is_polling() {
            self.start_polling();
        }
        Ok(status)
    }

    /// Recovery from `error`: resume polling if training had already made
    /// progress, otherwise resubmit the original record.
    pub async fn retry(&mut self) -> Result<JobStatus, JobError> {
        let state = self.state();
        if state.status != JobStatus::Error {
            return Err(JobError::InvalidState {
                action: "retry",
                status: state.status,
            });
        }

        if state.progress > 0 {
            info!("Resuming progress polling at {}%", state.progress);
            self.update(|s| {
                s.status = JobStatus::Finetuning;
                s.error = None;
            });
            self.start_polling();
            return Ok(JobStatus::Finetuning);
        }

        info!("Resubmitting answers for dataset generation");
        Ok(self.submit("Retry failed").await)
    }

    fn start_polling(&mut self) {
        self.stop_polling();
        self.poller = Some(PollerHandle::start(
            self.backend.clone(),
            self.state.clone(),
            self.settings,
        ));
    }

    /// Cancels the polling cycle, if any. No state writes from it happen afterwards.
    pub fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.stop();
        }
    }
}

impl Drop for JobTracker {
    fn drop(&mut self) {
        self.stop_polling();
    }
}
