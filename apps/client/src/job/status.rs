use std::fmt;

use serde::Serialize;

/// Coarse stage of the remote dataset / fine-tuning pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    DatasetCreation,
    DatasetSuccess,
    Finetuning,
    FinetuningSuccess,
    Error,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::DatasetCreation => "dataset_creation",
            JobStatus::DatasetSuccess => "dataset_success",
            JobStatus::Finetuning => "finetuning",
            JobStatus::FinetuningSuccess => "finetuning_success",
            JobStatus::Error => "error",
        }
    }

    /// States that end the polling cycle.
    #[cfg(test)]
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::FinetuningSuccess | JobStatus::Error)
    }

    pub fn label(self) -> &'static str {
        match self {
            JobStatus::DatasetCreation => "Creating dataset",
            JobStatus::DatasetSuccess => "Dataset ready",
            JobStatus::Finetuning => "Fine-tuning model",
            JobStatus::FinetuningSuccess => "Model ready",
            JobStatus::Error => "Error",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observable job state, published to watchers on every change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobState {
    pub status: JobStatus,
    /// 0-100, meaningful while fine-tuning.
    pub progress: u8,
    /// Last failure, shown verbatim.
    pub error: Option<String>,
    /// Latest raw poll / ping outcome.
    pub debug_info: Option<String>,
    /// Bumped whenever a polling cycle is started or stopped; a cycle only
    /// writes while the generation it was started with is current.
    #[serde(skip)]
    pub(crate) generation: u64,
}

impl Default for JobState {
    fn default() -> Self {
        Self {
            status: JobStatus::DatasetCreation,
            progress: 0,
            error: None,
            debug_info: None,
            generation: 0,
        }
    }
}

impl JobState {
    pub(crate) fn fail(&mut self, message: impl Into<String>) {
        self.status = JobStatus::Error;
        self.error = Some(message.into());
    }
}
