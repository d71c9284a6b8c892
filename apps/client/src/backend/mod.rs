// Backend access for the dataset / fine-tuning / chat service.
// Everything that talks to the remote service goes through the `Backend` trait
// so the job tracker and chat session can be driven by a fake in tests.

pub mod http;
pub mod models;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::Value;

use crate::errors::ClientError;
use crate::questionnaire::AnswerRecord;

pub use http::HttpBackend;
pub use models::{
    Artifact, ChatReply, DatasetReply, ProgressQuery, ProgressReport, RemoteStatus, TrainReply,
};

#[async_trait]
pub trait Backend: Send + Sync {
    /// GET /ping. Only used to detect reachability.
    async fn ping(&self) -> Result<Value, ClientError>;

    /// POST /generate_dataset with the flat answer record.
    async fn generate_dataset(&self, record: &AnswerRecord) -> Result<DatasetReply, ClientError>;

    /// POST /train_model.
    async fn train_model(&self) -> Result<TrainReply, ClientError>;

    /// GET /progress.
    async fn progress(&self, query: ProgressQuery) -> Result<ProgressReport, ClientError>;

    /// POST /load_model.
    async fn load_model(&self) -> Result<Value, ClientError>;

    /// POST /chat.
    async fn chat(&self, message: &str) -> Result<ChatReply, ClientError>;

    /// GET /download_dataset or /download_model.
    async fn download(&self, artifact: Artifact) -> Result<Bytes, ClientError>;
}

#[cfg(test)]
pub(crate) mod fake;
