mod config;
mod models;
mod sqlite;
mod postgres;
mod factory;

pub use config::{DatabaseConfig, DatabaseType};
pub use models::*;
pub use sqlite::SqliteStore;
pub use postgres::PostgresStore;
pub use factory::create_store;

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::info;

#[async_trait]
pub trait Store: Send + Sync {
    // Initialize database schema
    async fn init(&self) -> crate::Result<()>;

    // Alerta configuration
    async fn get_configuration(&self, config_name: &str) -> crate::Result<Option<AlertaConfiguration>>;
    async fn save_configuration(&self, config: &AlertaConfiguration) -> crate::Result<()>;

    // Templates, keyed by the name of the topic that references them
    async fn list_templates(&self) -> crate::Result<HashMap<String, String>>;
    async fn save_template(&self, template: &Template) -> crate::Result<()>;

    // Topic routing
    async fn list_topics(&self) -> crate::Result<Vec<Topic>>;
    async fn save_topic(&self, topic: &Topic) -> crate::Result<()>;

    // Desired blackouts
    async fn list_blackouts(&self, config_name: &str) -> crate::Result<Vec<BlackoutDefinition>>;
    async fn save_blackout(&self, config_name: &str, blackout: &BlackoutDefinition) -> crate::Result<()>;
}

/// Read the configuration row, templates, topic routes and blackouts for `config_name`.
pub async fn load_configuration(
    store: &dyn Store,
    config_name: &str,
) -> crate::Result<ConfigurationSnapshot> {
    let alerta = store
        .get_configuration(config_name)
        .await?
        .ok_or_else(|| crate::Error::NotFound(format!("configuration '{}'", config_name)))?;

    let templates = store.list_templates().await?;
    let topics = store
        .list_topics()
        .await?
        .into_iter()
        .map(|topic| (topic.topic_name.clone(), topic.route()))
        .collect::<HashMap<_, _>>();
    let blackouts = store.list_blackouts(config_name).await?;

    info!(
        "Loaded configuration '{}': {} templates, {} topics, {} blackouts",
        config_name,
        templates.len(),
        topics.len(),
        blackouts.len()
    );

    Ok(ConfigurationSnapshot {
        alerta,
        templates,
        topics,
        blackouts,
    })
}
