//! Zulip messaging: the `ChatClient` seam and its HTTP implementation.

mod client;

pub use client::ZulipClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A message ready for `POST /api/v1/messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub message_type: String,
    pub to: String,
    pub subject: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendResponse {
    pub result: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default)]
    pub id: Option<i64>,
}

impl SendResponse {
    pub fn is_success(&self) -> bool {
        self.result == "success"
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send a message. Errors are transport failures only; a rejected
    /// message comes back as a non-success `SendResponse`.
    async fn send_message(&self, message: &Message) -> crate::Result<SendResponse>;
}
