use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use super::{ChatClient, Message, SendResponse};
use crate::{config::ZulipConfig, Error, Result};

/// Bot client for the Zulip REST API
pub struct ZulipClient {
    messages_url: Url,
    email: String,
    api_key: String,
    client: Client,
}

impl ZulipClient {
    pub fn new(config: &ZulipConfig) -> Result<Self> {
        let api_url = api_base(&config.site)?;
        let messages_url = api_url
            .join("v1/messages")
            .map_err(|e| Error::Config(format!("Invalid Zulip site '{}': {}", config.site, e)))?;

        let mut builder = Client::builder();
        if config.allow_insecure {
            warn!("TLS certificate verification is disabled for Zulip");
            builder = builder.danger_accept_invalid_certs(true);
        }

        info!("Zulip client configured for {} as {}", api_url, config.email);

        Ok(Self {
            messages_url,
            email: config.email.clone(),
            api_key: config.api_key.clone(),
            client: builder.build()?,
        })
    }
}

/// The `/api/` base for a site as users write it: the scheme may be missing
/// (`https`, or `http` for localhost), the site may sit under a path prefix,
/// and may or may not already end in `/api`.
fn api_base(site: &str) -> Result<Url> {
    let mut base = site.trim().trim_end_matches('/').to_string();
    if base.starts_with("localhost") {
        base = format!("http://{}", base);
    } else if !base.starts_with("http") {
        base = format!("https://{}", base);
    }
    if !base.ends_with("/api") {
        base.push_str("/api");
    }
    base.push('/');

    Url::parse(&base).map_err(|e| Error::Config(format!("Invalid Zulip site '{}': {}", site, e)))
}

#[async_trait]
impl ChatClient for ZulipClient {
    async fn send_message(&self, message: &Message) -> Result<SendResponse> {
        let response = self
            .client
            .post(self.messages_url.clone())
            .basic_auth(&self.email, Some(&self.api_key))
            .form(message)
            .send()
            .await
            .map_err(|e| Error::Dispatch(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::Dispatch(e.to_string()))?;
        debug!("Zulip: {} {}", status, body);

        // Zulip answers rejected messages with a JSON error body as well
        serde_json::from_str(&body).map_err(|e| {
            Error::Dispatch(format!("unexpected Zulip response ({}): {}: {}", status, e, body))
        })
    }
}
