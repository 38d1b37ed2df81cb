use async_trait::async_trait;
use sqlx::{
    postgres::{PgPoolOptions, PgRow},
    Pool, Postgres, Row,
};
use std::collections::HashMap;
use tracing::{debug, error, info};

use crate::{
    alerta::timestamp,
    store::{
        models::{join_list, split_list},
        AlertaConfiguration, BlackoutDefinition, Store, Template, Topic,
    },
    Error, Result,
};

pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    pub async fn new(connection_string: &str, max_connections: u32) -> Result<Self> {
        info!("Connecting to PostgreSQL database");

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(connection_string)
            .await
            .map_err(|e| {
                error!("Failed to connect to PostgreSQL: {}", e);
                Error::Sqlx(e)
            })?;

        Ok(Self { pool })
    }
}

fn blackout_from_row(row: &PgRow) -> Result<BlackoutDefinition> {
    let start_time = row
        .get::<Option<String>, _>("start_time")
        .map(|s| timestamp::parse(&s))
        .transpose()?;

    Ok(BlackoutDefinition {
        environment: row.get("environment"),
        service: split_list(row.get("service")),
        resource: row.get("resource"),
        event: row.get("event"),
        group: row.get("blackout_group"),
        tags: split_list(row.get("tags")),
        start_time,
        duration: row.get("duration"),
        text: row.get("text"),
    })
}

#[async_trait]
impl Store for PostgresStore {
    async fn init(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to run migrations: {}", e);
                Error::Migrate(e)
            })?;

        Ok(())
    }

    async fn get_configuration(&self, config_name: &str) -> Result<Option<AlertaConfiguration>> {
        debug!("Getting configuration: {}", config_name);

        let row = sqlx::query(
            r#"
            SELECT config_id, config_name, alerta_endpoint, alerta_timeout,
                   alerta_debug, skip_environment
            FROM configuration
            WHERE config_name = $1
            "#,
        )
        .bind(config_name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| AlertaConfiguration {
            config_id: r.get("config_id"),
            config_name: r.get("config_name"),
            alerta_endpoint: r.get("alerta_endpoint"),
            alerta_timeout: r.get("alerta_timeout"),
            alerta_debug: r.get("alerta_debug"),
            skip_environment: r.get("skip_environment"),
        }))
    }

    async fn save_configuration(&self, config: &AlertaConfiguration) -> Result<()> {
        debug!("Saving configuration: {}", config.config_name);

        sqlx::query(
            r#"
            INSERT INTO configuration (
                config_id, config_name, alerta_endpoint, alerta_timeout,
                alerta_debug, skip_environment
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT(config_id) DO UPDATE SET
                config_name = excluded.config_name,
                alerta_endpoint = excluded.alerta_endpoint,
                alerta_timeout = excluded.alerta_timeout,
                alerta_debug = excluded.alerta_debug,
                skip_environment = excluded.skip_environment
            "#,
        )
        .bind(config.config_id)
        .bind(&config.config_name)
        .bind(&config.alerta_endpoint)
        .bind(config.alerta_timeout)
        .bind(config.alerta_debug)
        .bind(&config.skip_environment)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_templates(&self) -> Result<HashMap<String, String>> {
        let rows = sqlx::query(
            r#"
            SELECT topics.topic_name, templates.template_data
            FROM templates
            INNER JOIN topics ON templates.template_id = topics.templ_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| (r.get("topic_name"), r.get("template_data")))
            .collect())
    }

    async fn save_template(&self, template: &Template) -> Result<()> {
        debug!("Saving template: {}", template.template_id);

        sqlx::query(
            r#"
            INSERT INTO templates (template_id, template_data) VALUES ($1, $2)
            ON CONFLICT(template_id) DO UPDATE SET template_data = excluded.template_data
            "#,
        )
        .bind(template.template_id)
        .bind(&template.template_data)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_topics(&self) -> Result<Vec<Topic>> {
        let rows = sqlx::query(
            "SELECT topic_name, templ_id, zulip_to, zulip_subject FROM topics ORDER BY topic_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| Topic {
                topic_name: r.get("topic_name"),
                template_id: r.get("templ_id"),
                zulip_to: r.get("zulip_to"),
                zulip_subject: r.get("zulip_subject"),
            })
            .collect())
    }

    async fn save_topic(&self, topic: &Topic) -> Result<()> {
        debug!("Saving topic: {}", topic.topic_name);

        sqlx::query(
            r#"
            INSERT INTO topics (topic_name, templ_id, zulip_to, zulip_subject)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT(topic_name) DO UPDATE SET
                templ_id = excluded.templ_id,
                zulip_to = excluded.zulip_to,
                zulip_subject = excluded.zulip_subject
            "#,
        )
        .bind(&topic.topic_name)
        .bind(topic.template_id)
        .bind(&topic.zulip_to)
        .bind(&topic.zulip_subject)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_blackouts(&self, config_name: &str) -> Result<Vec<BlackoutDefinition>> {
        let rows = sqlx::query(
            r#"
            SELECT environment, service, resource, event, blackout_group, tags,
                   start_time, duration, text
            FROM blackouts
            WHERE config_name = $1
            ORDER BY environment, service
            "#,
        )
        .bind(config_name)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(blackout_from_row).collect()
    }

    async fn save_blackout(&self, config_name: &str, blackout: &BlackoutDefinition) -> Result<()> {
        debug!("Saving blackout for {}/{}", config_name, blackout.environment);

        sqlx::query(
            r#"
            INSERT INTO blackouts (
                config_name, environment, service, resource, event,
                blackout_group, tags, start_time, duration, text
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            "#,
        )
        .bind(config_name)
        .bind(&blackout.environment)
        .bind(join_list(&blackout.service))
        .bind(&blackout.resource)
        .bind(&blackout.event)
        .bind(&blackout.group)
        .bind(join_list(&blackout.tags))
        .bind(blackout.start_time.map(|t| timestamp::format(&t)))
        .bind(blackout.duration)
        .bind(&blackout.text)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
