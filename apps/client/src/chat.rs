use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error};

use crate::backend::Backend;

pub const GREETING: &str = "Hello! I'm your AI assistant. How can I help you today?";
pub const PENDING_REPLY: &str = "I'm processing your request. Please wait a moment.";
pub const FAILURE_REPLY: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub id: usize,
    pub text: String,
    pub is_user: bool,
    pub is_error: bool,
}

/// A conversation with the fine-tuned model. The backend keeps no history;
/// the transcript lives here only.
pub struct ChatSession {
    backend: Arc<dyn Backend>,
    messages: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        let mut session = Self {
            backend,
            messages: Vec::new(),
        };
        session.push(GREETING.to_string(), false, false);
        session
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    fn push(&mut self, text: String, is_user: bool, is_error: bool) -> &ChatMessage {
        let id = self.messages.len() + 1;
        self.messages.push(ChatMessage {
            id,
            text,
            is_user,
            is_error,
        });
        &self.messages[id - 1]
    }

    /// Sends one message and returns the assistant's reply.
    /// Blank input is ignored and returns `None`.
    pub async fn send(&mut self, text: &str) -> Option<&ChatMessage> {
        if text.trim().is_empty() {
            return None;
        }
        self.push(text.to_string(), true, false);

        let reply = match self.backend.chat(text).await {
            Ok(reply) => {
                debug!("Chat reply received");
                let text = reply
                    .response
                    .filter(|r| !r.is_empty())
                    .unwrap_or_else(|| PENDING_REPLY.to_string());
                (text, false)
            }
            Err(e) => {
                error!("Error communicating with model: {e}");
                (FAILURE_REPLY.to_string(), true)
            }
        };
        Some(self.push(reply.0, false, reply.1))
    }
}
