pub mod alerta;
pub mod blackout;
pub mod checkpoint;
pub mod config;
pub mod metrics;
pub mod notify;
pub mod poller;
#[cfg(feature = "server")]
pub mod server;
pub mod store;
pub mod template;
pub mod zulip;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("JSON error: {0}")]
    SerdeJson(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Alerta error: {0}")]
    AlertService(String),
    #[error("Zulip dispatch error: {0}")]
    Dispatch(String),
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("Template error: {0}")]
    Template(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, Error>;
