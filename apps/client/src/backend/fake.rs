//! Scripted in-memory `Backend` for tests. Each endpoint pops its next
//! scripted reply; an exhausted script falls back to a healthy default
//! (or a 503 for `/progress`).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};

use crate::backend::models::{
    Artifact, ChatReply, DatasetReply, ProgressQuery, ProgressReport, TrainReply,
};
use crate::backend::Backend;
use crate::errors::ClientError;
use crate::questionnaire::AnswerRecord;

type Script<T> = Mutex<VecDeque<Result<T, ClientError>>>;

#[derive(Default)]
pub(crate) struct FakeBackend {
    pub offline: AtomicBool,
    pub dataset: Script<DatasetReply>,
    pub train: Script<TrainReply>,
    pub progress: Script<ProgressReport>,
    pub load: Script<Value>,
    pub chat: Script<ChatReply>,
    calls: Mutex<Vec<&'static str>>,
    pub chat_messages: Mutex<Vec<String>>,
    pub submitted: Mutex<Vec<AnswerRecord>>,
}

pub(crate) fn unavailable() -> ClientError {
    ClientError::Status {
        status: 503,
        message: "unavailable".to_string(),
    }
}

pub(crate) fn report(status: &str, progress: f64) -> ProgressReport {
    serde_json::from_value(json!({ "status": status, "progress": progress })).unwrap()
}

pub(crate) fn report_with_message(status: &str, message: &str) -> ProgressReport {
    serde_json::from_value(json!({ "status": status, "message": message })).unwrap()
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_progress(
        self,
        replies: impl IntoIterator<Item = Result<ProgressReport, ClientError>>,
    ) -> Self {
        self.progress.lock().unwrap().extend(replies);
        self
    }

    pub fn script_dataset(self, reply: Result<DatasetReply, ClientError>) -> Self {
        self.dataset.lock().unwrap().push_back(reply);
        self
    }

    pub fn script_train(self, reply: Result<TrainReply, ClientError>) -> Self {
        self.train.lock().unwrap().push_back(reply);
        self
    }

    pub fn script_load(self, reply: Result<Value, ClientError>) -> Self {
        self.load.lock().unwrap().push_back(reply);
        self
    }

    pub fn script_chat(self, reply: Result<ChatReply, ClientError>) -> Self {
        self.chat.lock().unwrap().push_back(reply);
        self
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self, endpoint: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| **c == endpoint)
            .count()
    }

    fn hit(&self, endpoint: &'static str) {
        self.calls.lock().unwrap().push(endpoint);
    }

    fn next<T>(script: &Script<T>, default: impl FnOnce() -> Result<T, ClientError>) -> Result<T, ClientError> {
        script.lock().unwrap().pop_front().unwrap_or_else(default)
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn ping(&self) -> Result<Value, ClientError> {
        self.hit("ping");
        if self.offline.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(json!("pong"))
    }

    async fn generate_dataset(&self, record: &AnswerRecord) -> Result<DatasetReply, ClientError> {
        self.hit("generate_dataset");
        self.submitted.lock().unwrap().push(record.clone());
        Self::next(&self.dataset, || {
            Ok(DatasetReply {
                status: Some("completed".to_string()),
                message: None,
            })
        })
    }

    async fn train_model(&self) -> Result<TrainReply, ClientError> {
        self.hit("train_model");
        Self::next(&self.train, || {
            Ok(TrainReply {
                success: true,
                message: None,
            })
        })
    }

    async fn progress(&self, _query: ProgressQuery) -> Result<ProgressReport, ClientError> {
        self.hit("progress");
        Self::next(&self.progress, || Err(unavailable()))
    }

    async fn load_model(&self) -> Result<Value, ClientError> {
        self.hit("load_model");
        Self::next(&self.load, || Ok(json!({ "status": "loaded" })))
    }

    async fn chat(&self, message: &str) -> Result<ChatReply, ClientError> {
        self.hit("chat");
        self.chat_messages.lock().unwrap().push(message.to_string());
        Self::next(&self.chat, || {
            Ok(ChatReply {
                response: Some(format!("echo: {message}")),
            })
        })
    }

    async fn download(&self, artifact: Artifact) -> Result<Bytes, ClientError> {
        self.hit("download");
        match artifact {
            Artifact::Dataset => Ok(Bytes::from_static(b"[{\"instruction\":\"hi\"}]")),
            Artifact::Model => Ok(Bytes::from_static(b"PK\x03\x04")),
        }
    }
}
