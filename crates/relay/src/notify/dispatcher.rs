use std::sync::Arc;
use tracing::{debug, error};

use crate::{
    zulip::{ChatClient, Message},
    Result,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    /// Zulip answered with a non-success result.
    Rejected(String),
}

/// Sends rendered messages and interprets Zulip's answer.
pub struct Dispatcher {
    client: Arc<dyn ChatClient>,
}

impl Dispatcher {
    pub fn new(client: Arc<dyn ChatClient>) -> Self {
        Self { client }
    }

    /// A rejected message is logged and reported, not raised. Transport
    /// errors propagate.
    pub async fn dispatch(&self, message: &Message) -> Result<DispatchOutcome> {
        debug!("Zulip: message={}", message.content);

        let response = self.client.send_message(message).await?;

        if response.is_success() {
            debug!("Zulip: delivered to {} / {}", message.to, message.subject);
            Ok(DispatchOutcome::Delivered)
        } else {
            error!("Error sending alert message to Zulip: {}", response.msg);
            Ok(DispatchOutcome::Rejected(response.msg))
        }
    }
}
