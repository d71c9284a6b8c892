use serde::{Deserialize, Serialize};

/// Response of POST /generate_dataset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DatasetReply {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl DatasetReply {
    pub fn is_completed(&self) -> bool {
        self.status.as_deref() == Some("completed")
    }
}

/// Response of POST /train_model.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrainReply {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Training,
    Completed,
    Error,
    #[serde(other)]
    Unknown,
}

impl RemoteStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RemoteStatus::Training => "training",
            RemoteStatus::Completed => "completed",
            RemoteStatus::Error => "error",
            RemoteStatus::Unknown => "unknown",
        }
    }
}

/// Response of GET /progress.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressReport {
    #[serde(default)]
    pub status: Option<RemoteStatus>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ProgressReport {
    pub fn status(&self) -> RemoteStatus {
        self.status.unwrap_or(RemoteStatus::Unknown)
    }

    /// Reported progress as a whole percentage; absent means 0.
    pub fn percent(&self) -> u8 {
        self.progress
            .map(|p| p.round().clamp(0.0, 100.0) as u8)
            .unwrap_or(0)
    }
}

/// Who is asking for progress. A manual check uses a shorter timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressQuery {
    Cycle,
    Manual,
}

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub message: &'a str,
}

/// Response of POST /chat.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub response: Option<String>,
}

/// Downloadable build outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Artifact {
    Dataset,
    Model,
}

impl Artifact {
    pub fn path(self) -> &'static str {
        match self {
            Artifact::Dataset => "/download_dataset",
            Artifact::Model => "/download_model",
        }
    }

    pub fn default_file_name(self) -> &'static str {
        match self {
            Artifact::Dataset => "dataset.json",
            Artifact::Model => "lora_model.zip",
        }
    }
}
