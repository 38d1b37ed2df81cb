use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;

use crate::alerta::{Alert, AlertStatus};
use crate::store::AlertaConfiguration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Status(AlertStatus),
    Environment(String),
    Repeat { elapsed_minutes: i64, interval_minutes: i64 },
}

impl SkipReason {
    /// Metric label for the reason.
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::Status(_) => "status",
            SkipReason::Environment(_) => "environment",
            SkipReason::Repeat { .. } => "repeat",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Status(status) => write!(f, "status is {}", status),
            SkipReason::Environment(env) => write!(f, "environment {} is skipped", env),
            SkipReason::Repeat { elapsed_minutes, interval_minutes } => write!(
                f,
                "last received {} min ago, repeat interval is {} min",
                elapsed_minutes, interval_minutes
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Notify,
    Skip(SkipReason),
}

#[derive(Debug, Clone)]
pub struct NotificationFilter {
    skip_environments: HashSet<String>,
    repeat_interval_minutes: i64,
}

impl NotificationFilter {
    pub fn new<I, S>(skip_environments: I, repeat_interval_minutes: i64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            skip_environments: skip_environments.into_iter().map(Into::into).collect(),
            repeat_interval_minutes,
        }
    }

    pub fn from_configuration(config: &AlertaConfiguration, repeat_interval_minutes: i64) -> Self {
        Self::new(config.skip_environments(), repeat_interval_minutes)
    }

    pub fn evaluate(&self, alert: &Alert, now: DateTime<Utc>) -> Decision {
        if alert.status.is_silenced() {
            return Decision::Skip(SkipReason::Status(alert.status.clone()));
        }

        if self.skip_environments.contains(&alert.environment) {
            return Decision::Skip(SkipReason::Environment(alert.environment.clone()));
        }

        let elapsed_minutes = alert.minutes_since_last_receive(now);
        if elapsed_minutes < self.repeat_interval_minutes {
            return Decision::Skip(SkipReason::Repeat {
                elapsed_minutes,
                interval_minutes: self.repeat_interval_minutes,
            });
        }

        Decision::Notify
    }

    pub fn should_notify(&self, alert: &Alert, now: DateTime<Utc>) -> bool {
        self.evaluate(alert, now) == Decision::Notify
    }
}
