use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AlertStatus {
    Open,
    Assign,
    Ack,
    Shelved,
    Blackout,
    Closed,
    Expired,
    Unknown,
    Other(String),
}

impl AlertStatus {
    /// Statuses that never produce a notification.
    pub fn is_silenced(&self) -> bool {
        matches!(self, AlertStatus::Ack | AlertStatus::Blackout | AlertStatus::Closed)
    }
}

impl From<String> for AlertStatus {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "open" => AlertStatus::Open,
            "assign" => AlertStatus::Assign,
            "ack" => AlertStatus::Ack,
            "shelved" => AlertStatus::Shelved,
            "blackout" => AlertStatus::Blackout,
            "closed" => AlertStatus::Closed,
            "expired" => AlertStatus::Expired,
            "unknown" => AlertStatus::Unknown,
            _ => AlertStatus::Other(s),
        }
    }
}

impl From<&str> for AlertStatus {
    fn from(s: &str) -> Self {
        AlertStatus::from(s.to_string())
    }
}

impl From<AlertStatus> for String {
    fn from(status: AlertStatus) -> Self {
        status.to_string()
    }
}

impl fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertStatus::Open => write!(f, "open"),
            AlertStatus::Assign => write!(f, "assign"),
            AlertStatus::Ack => write!(f, "ack"),
            AlertStatus::Shelved => write!(f, "shelved"),
            AlertStatus::Blackout => write!(f, "blackout"),
            AlertStatus::Closed => write!(f, "closed"),
            AlertStatus::Expired => write!(f, "expired"),
            AlertStatus::Unknown => write!(f, "unknown"),
            AlertStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

// Alert as returned by `GET /alerts`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub resource: String,
    pub event: String,
    pub environment: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub correlate: Vec<String>,
    pub status: AlertStatus,
    #[serde(default)]
    pub service: Vec<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub attributes: HashMap<String, JsonValue>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub repeat: bool,
    #[serde(default)]
    pub duplicate_count: i64,
    #[serde(default)]
    pub previous_severity: Option<String>,
    #[serde(default)]
    pub trend_indication: Option<String>,
    #[serde(default)]
    pub timeout: Option<i64>,
    #[serde(default)]
    pub raw_data: Option<String>,
    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub receive_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_receive_id: Option<String>,
    #[serde(default)]
    pub last_receive_time: Option<DateTime<Utc>>,
}

impl Alert {
    /// Key shared by templates and topic routes: the service list joined with `_`.
    pub fn service_key(&self) -> String {
        self.service.join("_")
    }

    /// Whole minutes since the alert was last received; zero when unknown
    /// or when the timestamp is ahead of `now`.
    pub fn minutes_since_last_receive(&self, now: DateTime<Utc>) -> i64 {
        self.last_receive_time
            .map(|t| (now - t).num_minutes().max(0))
            .unwrap_or(0)
    }

    /// Fields exposed to message templates, by snake_case name.
    pub fn to_template_value(&self) -> JsonValue {
        let attributes: Map<String, JsonValue> = self
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        json!({
            "id": self.id,
            "resource": self.resource,
            "event": self.event,
            "environment": self.environment,
            "severity": self.severity,
            "correlate": self.correlate,
            "status": self.status.to_string(),
            "service": self.service,
            "group": self.group,
            "value": self.value,
            "text": self.text,
            "tags": self.tags,
            "attributes": attributes,
            "origin": self.origin,
            "event_type": self.event_type,
            "customer": self.customer,
            "repeat": self.repeat,
            "duplicate_count": self.duplicate_count,
            "previous_severity": self.previous_severity,
            "trend_indication": self.trend_indication,
            "timeout": self.timeout,
            "raw_data": self.raw_data,
            "create_time": self.create_time.map(|t| t.to_rfc3339()),
            "receive_time": self.receive_time.map(|t| t.to_rfc3339()),
            "last_receive_id": self.last_receive_id,
            "last_receive_time": self.last_receive_time.map(|t| t.to_rfc3339()),
        })
    }
}

// Blackout as returned by `GET /blackouts`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Blackout {
    #[serde(default)]
    pub id: Option<String>,
    pub environment: String,
    #[serde(default)]
    pub service: Vec<String>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub event: Option<String>,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub customer: Option<String>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

impl Blackout {
    pub fn is_active(&self) -> bool {
        self.status.as_deref() == Some("active")
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AlertsResponse {
    #[serde(default)]
    pub alerts: Vec<Alert>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlackoutsResponse {
    #[serde(default)]
    pub blackouts: Vec<Blackout>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BlackoutCreatedResponse {
    #[serde(default)]
    pub id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    #[serde(default)]
    pub message: Option<String>,
}
