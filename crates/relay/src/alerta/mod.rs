//! Alerta API access: the `AlertService` seam and its HTTP implementation.

mod client;
mod models;
pub mod timestamp;

pub use client::AlertaClient;
pub use models::{Alert, AlertStatus, Blackout};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::store::BlackoutDefinition;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertService: Send + Sync {
    /// Alerts updated since `from`.
    async fn list_alerts(&self, from: DateTime<Utc>) -> crate::Result<Vec<Alert>>;

    /// All blackouts known to the alert service, whatever their status.
    async fn list_blackouts(&self) -> crate::Result<Vec<Blackout>>;

    /// Create a blackout and return its id.
    async fn create_blackout(&self, blackout: &BlackoutDefinition) -> crate::Result<Option<String>>;
}
