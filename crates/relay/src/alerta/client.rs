use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

use super::{
    models::{AlertsResponse, BlackoutCreatedResponse, BlackoutsResponse, ErrorResponse},
    timestamp, Alert, AlertService, Blackout,
};
use crate::{
    store::{AlertaConfiguration, BlackoutDefinition},
    Error, Result,
};

/// HTTP client for the Alerta REST API
pub struct AlertaClient {
    endpoint: Url,
    client: Client,
    api_key: Option<String>,
    debug: bool,
}

impl AlertaClient {
    pub fn new(config: &AlertaConfiguration, api_key: Option<String>) -> Result<Self> {
        let mut endpoint = Url::parse(&config.alerta_endpoint).map_err(|e| {
            Error::Config(format!("Invalid Alerta endpoint '{}': {}", config.alerta_endpoint, e))
        })?;
        // Url::join drops the last path segment unless it ends with '/'
        if !endpoint.path().ends_with('/') {
            let path = format!("{}/", endpoint.path());
            endpoint.set_path(&path);
        }

        let mut builder = Client::builder();
        if config.alerta_timeout > 0 {
            builder = builder.timeout(Duration::from_secs(config.alerta_timeout as u64));
        }

        info!("Alerta client configured for {}", endpoint);

        Ok(Self {
            endpoint,
            client: builder.build()?,
            api_key: api_key.filter(|key| !key.is_empty()),
            debug: config.alerta_debug,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.endpoint
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid Alerta path '{}': {}", path, e)))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("Authorization", format!("Key {}", key)),
            None => request,
        }
    }

    async fn decode<T: DeserializeOwned>(&self, path: &str, response: Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await?;

        if self.debug {
            debug!("Alerta {} -> {}: {}", path, status, body);
        }

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .ok()
                .and_then(|e| e.message)
                .unwrap_or(body);
            return Err(Error::AlertService(format!(
                "{} returned {}: {}",
                path, status, message
            )));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl AlertService for AlertaClient {
    async fn list_alerts(&self, from: DateTime<Utc>) -> Result<Vec<Alert>> {
        let url = self.url("alerts")?;
        let from_date = timestamp::format(&from);
        debug!("Fetching alerts from {} since {}", url, from_date);

        let response = self
            .authorize(self.client.get(url).query(&[("from-date", from_date.as_str())]))
            .send()
            .await?;

        let body: AlertsResponse = self.decode("alerts", response).await?;
        Ok(body.alerts)
    }

    async fn list_blackouts(&self) -> Result<Vec<Blackout>> {
        let url = self.url("blackouts")?;
        debug!("Fetching blackouts from {}", url);

        let response = self.authorize(self.client.get(url)).send().await?;

        let body: BlackoutsResponse = self.decode("blackouts", response).await?;
        Ok(body.blackouts)
    }

    async fn create_blackout(&self, blackout: &BlackoutDefinition) -> Result<Option<String>> {
        let url = self.url("blackout")?;
        debug!(
            "Creating blackout for {} {:?} at {}",
            blackout.environment, blackout.service, url
        );

        let response = self
            .authorize(self.client.post(url).json(blackout))
            .send()
            .await?;

        let body: BlackoutCreatedResponse = self.decode("blackout", response).await?;
        Ok(body.id)
    }
}
