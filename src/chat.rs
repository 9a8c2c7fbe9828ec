//! Herbal-remedy chat session on top of the backend client.

use anyhow::{anyhow, bail, Result};
use tracing::info;

use crate::client::{first_string, ApiClient, ChatMessage};

/// Messages sent along as history with each request.
pub const HISTORY_WINDOW: usize = 20;
const REPLY_KEYS: &[&str] = &["reply", "response", "message"];

pub struct ChatSession {
    client: ApiClient,
    transcript: Vec<ChatMessage>,
}

impl ChatSession {
    pub fn new(client: ApiClient) -> Self {
        Self {
            client,
            transcript: Vec::new(),
        }
    }

    pub fn transcript(&self) -> &[ChatMessage] {
        &self.transcript
    }

    /// The most recent messages, at most [`HISTORY_WINDOW`] of them.
    pub fn history(&self) -> &[ChatMessage] {
        let start = self.transcript.len().saturating_sub(HISTORY_WINDOW);
        &self.transcript[start..]
    }

    /// Send `message` with the recent history and record both sides.
    /// Nothing is recorded when the request fails.
    pub async fn send(&mut self, message: &str) -> Result<String> {
        let message = message.trim();
        if message.is_empty() {
            bail!("message is empty");
        }
        let value = self.client.herbal_remedy(message, self.history()).await?;
        let reply = first_string(&value, REPLY_KEYS)
            .ok_or_else(|| anyhow!("herbal-remedy response has no reply: {}", value))?;

        self.transcript.push(ChatMessage::user(message));
        self.transcript.push(ChatMessage::assistant(reply.clone()));
        info!(messages = self.transcript.len(), "chat reply received");
        Ok(reply)
    }

    pub fn clear(&mut self) {
        self.transcript.clear();
    }
}
