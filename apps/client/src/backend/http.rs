use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::backend::models::{
    Artifact, ChatReply, ChatRequest, DatasetReply, ProgressQuery, ProgressReport, TrainReply,
};
use crate::backend::Backend;
use crate::errors::ClientError;
use crate::questionnaire::AnswerRecord;

/// Sent on every request so tunnelling proxies skip their browser interstitial.
pub const PROXY_WARNING_HEADER: &str = "ngrok-skip-browser-warning";

/// Per-endpoint request timeouts. `None` waits indefinitely.
#[derive(Debug, Clone)]
pub struct Timeouts {
    pub ping: Option<Duration>,
    pub dataset: Option<Duration>,
    pub train: Option<Duration>,
    pub progress: Option<Duration>,
    pub manual_progress: Option<Duration>,
    /// Model load, chat and downloads.
    pub other: Option<Duration>,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            ping: Some(Duration::from_secs(5)),
            dataset: Some(Duration::from_secs(30)),
            train: Some(Duration::from_secs(15)),
            progress: Some(Duration::from_secs(10)),
            manual_progress: Some(Duration::from_secs(5)),
            other: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(alias = "error", alias = "detail")]
    message: String,
}

/// `Backend` over HTTP. The base URL is injected so environments and tests can swap it.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
    timeouts: Timeouts,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeouts: Timeouts) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(PROXY_WARNING_HEADER, HeaderValue::from_static("true"));

        Self {
            client: Client::builder()
                .default_headers(headers)
                .build()
                .expect("Failed to build HTTP client"),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeouts,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get(&self, path: &str, timeout: Option<Duration>) -> RequestBuilder {
        with_timeout(self.client.get(self.url(path)), timeout)
    }

    fn post(&self, path: &str, timeout: Option<Duration>) -> RequestBuilder {
        with_timeout(self.client.post(self.url(path)), timeout)
    }

    /// Sends the request and decodes a JSON body, mapping non-2xx to `ClientError::Status`.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let body = checked(request.send().await?).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Like `send_json`, but any 2xx body is accepted; non-JSON comes back as a string.
    async fn send_any(&self, request: RequestBuilder) -> Result<Value, ClientError> {
        let body = checked(request.send().await?).await?.text().await?;
        Ok(serde_json::from_str(&body).unwrap_or(Value::String(body)))
    }
}

fn with_timeout(request: RequestBuilder, timeout: Option<Duration>) -> RequestBuilder {
    match timeout {
        Some(t) => request.timeout(t),
        None => request,
    }
}

async fn checked(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    warn!("Backend returned {}: {}", status, body);
    // Prefer a structured message when the backend sends one
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|e| e.message)
        .unwrap_or(body);
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl Backend for HttpBackend {
    async fn ping(&self) -> Result<Value, ClientError> {
        self.send_any(self.get("/ping", self.timeouts.ping)).await
    }

    async fn generate_dataset(&self, record: &AnswerRecord) -> Result<DatasetReply, ClientError> {
        debug!("Submitting {} answers for dataset generation", record.len());
        let request = self
            .post("/generate_dataset", self.timeouts.dataset)
            .json(record);
        self.send_json(request).await
    }

    async fn train_model(&self) -> Result<TrainReply, ClientError> {
        let request = self
            .post("/train_model", self.timeouts.train)
            .json(&serde_json::json!({}));
        self.send_json(request).await
    }

    async fn progress(&self, query: ProgressQuery) -> Result<ProgressReport, ClientError> {
        let timeout = match query {
            ProgressQuery::Cycle => self.timeouts.progress,
            ProgressQuery::Manual => self.timeouts.manual_progress,
        };
        self.send_json(self.get("/progress", timeout)).await
    }

    async fn load_model(&self) -> Result<Value, ClientError> {
        self.send_any(self.post("/load_model", self.timeouts.other))
            .await
    }

    async fn chat(&self, message: &str) -> Result<ChatReply, ClientError> {
        let request = self
            .post("/chat", self.timeouts.other)
            .json(&ChatRequest { message });
        self.send_json(request).await
    }

    async fn download(&self, artifact: Artifact) -> Result<Bytes, ClientError> {
        let response = self
            .get(artifact.path(), self.timeouts.other)
            .send()
            .await?;
        let bytes = checked(response).await?.bytes().await?;
        debug!("Downloaded {} bytes from {}", bytes.len(), artifact.path());
        Ok(bytes)
    }
}
