use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::alerta::timestamp;

/// Template key used when no service-specific template exists.
pub const DEFAULT_TEMPLATE_KEY: &str = "DEFAULT_TMPL";

/// Template used when the database does not define `DEFAULT_TMPL`.
pub const BUILTIN_DEFAULT_TEMPLATE: &str = r#"
{% if customer %}Customer: `{{customer}}` {% endif %}
*[{{ status.capitalize() }}] {{ environment }} {{ severity.capitalize() }}*
{{ event }} {{ resource.capitalize() }}
```
{{ text }}
```
"#;

// Row of the `configuration` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertaConfiguration {
    pub config_id: i64,
    pub config_name: String,
    pub alerta_endpoint: String,
    /// Request timeout in seconds.
    pub alerta_timeout: i64,
    pub alerta_debug: bool,
    /// Comma-separated environments that never produce notifications.
    pub skip_environment: String,
}

impl AlertaConfiguration {
    pub fn skip_environments(&self) -> Vec<String> {
        self.skip_environment
            .split(',')
            .map(str::trim)
            .filter(|env| !env.is_empty())
            .map(String::from)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicRoute {
    pub to: Option<String>,
    pub subject: Option<String>,
}

// Row of the `templates` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub template_id: i64,
    pub template_data: String,
}

// Row of the `topics` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    pub topic_name: String,
    pub template_id: Option<i64>,
    pub zulip_to: Option<String>,
    pub zulip_subject: Option<String>,
}

impl Topic {
    pub fn route(&self) -> TopicRoute {
        TopicRoute {
            to: self.zulip_to.clone(),
            subject: self.zulip_subject.clone(),
        }
    }
}

/// A blackout window that should exist on the alert service.
///
/// Serializes to the body Alerta expects on `POST /blackout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlackoutDefinition {
    pub environment: String,
    #[serde(default)]
    pub service: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_time: Option<DateTime<Utc>>,
    /// Seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Everything the relay reads from the configuration database for one run.
#[derive(Debug, Clone)]
pub struct ConfigurationSnapshot {
    pub alerta: AlertaConfiguration,
    pub templates: HashMap<String, String>,
    pub topics: HashMap<String, TopicRoute>,
    pub blackouts: Vec<BlackoutDefinition>,
}

impl ConfigurationSnapshot {
    /// The template registered under `DEFAULT_TMPL`, or the built-in one.
    pub fn default_template(&self) -> &str {
        self.templates
            .get(DEFAULT_TEMPLATE_KEY)
            .map(String::as_str)
            .unwrap_or(BUILTIN_DEFAULT_TEMPLATE)
    }
}

// Comma-separated columns (blackout service and tags)
pub(crate) fn split_list(value: Option<String>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(String::from)
        .collect()
}

pub(crate) fn join_list(items: &[String]) -> String {
    items.join(",")
}
