use std::collections::HashMap;

use crate::{
    alerta::Alert,
    config::RoutingDefaults,
    store::{ConfigurationSnapshot, TopicRoute},
    template,
    zulip::Message,
};

/// Picks the template and destination for an alert and renders the message.
#[derive(Debug, Clone)]
pub struct MessageFormatter {
    templates: HashMap<String, String>,
    default_template: String,
    topics: HashMap<String, TopicRoute>,
    defaults: RoutingDefaults,
}

impl MessageFormatter {
    pub fn new(snapshot: &ConfigurationSnapshot, defaults: RoutingDefaults) -> Self {
        Self {
            templates: snapshot.templates.clone(),
            default_template: snapshot.default_template().to_string(),
            topics: snapshot.topics.clone(),
            defaults,
        }
    }

    pub fn template_for(&self, key: &str) -> &str {
        self.templates
            .get(key)
            .map(String::as_str)
            .unwrap_or(self.default_template.as_str())
    }

    /// Rendered message body; never fails.
    pub fn render(&self, alert: &Alert) -> String {
        let key = alert.service_key();
        template::render_or_placeholder(self.template_for(&key), &alert.to_template_value())
    }

    /// `(to, subject)` for a service key. Each part falls back on its own.
    pub fn destination(&self, key: &str) -> (String, String) {
        let route = self.topics.get(key);
        let non_empty = |value: Option<&String>| {
            value
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        let to = non_empty(route.and_then(|r| r.to.as_ref()))
            .unwrap_or_else(|| self.defaults.to.clone());
        let subject = non_empty(route.and_then(|r| r.subject.as_ref()))
            .or_else(|| non_empty(self.defaults.subject.as_ref()))
            .unwrap_or_else(|| key.to_string());

        (to, subject)
    }

    pub fn format(&self, alert: &Alert) -> Message {
        let key = alert.service_key();
        let (to, subject) = self.destination(&key);

        Message {
            message_type: self.defaults.message_type.trim().to_string(),
            to: to.trim().to_string(),
            subject: subject.trim().to_string(),
            content: self.render(alert),
        }
    }
}
