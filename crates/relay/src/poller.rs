//! The relay loop: fetch alerts since the checkpoint, notify, persist, sleep.

use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::{
    alerta::{timestamp, Alert, AlertService},
    blackout::BlackoutSynchronizer,
    checkpoint::CheckpointStore,
    config::{PollConfig, RoutingDefaults},
    metrics,
    notify::{Decision, DispatchOutcome, Dispatcher, MessageFormatter, NotificationFilter},
    store::{BlackoutDefinition, ConfigurationSnapshot},
    zulip::ChatClient,
    Error, Result,
};

/// Counts for one poll cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub notified: usize,
    pub skipped: usize,
    pub rejected: usize,
}

pub struct Poller {
    alerta: Arc<dyn AlertService>,
    dispatcher: Dispatcher,
    filter: NotificationFilter,
    formatter: MessageFormatter,
    blackouts: Vec<BlackoutDefinition>,
    checkpoint: CheckpointStore,
    interval: Duration,
}

impl Poller {
    pub fn new(
        alerta: Arc<dyn AlertService>,
        chat: Arc<dyn ChatClient>,
        snapshot: &ConfigurationSnapshot,
        poll: &PollConfig,
        routing: RoutingDefaults,
    ) -> Self {
        Self {
            alerta,
            dispatcher: Dispatcher::new(chat),
            filter: NotificationFilter::from_configuration(
                &snapshot.alerta,
                poll.repeat_interval_minutes,
            ),
            formatter: MessageFormatter::new(snapshot, routing),
            blackouts: snapshot.blackouts.clone(),
            checkpoint: CheckpointStore::new(poll.checkpoint_path.clone()),
            interval: poll.interval,
        }
    }

    /// Run until `shutdown` completes. Blackouts are synchronized once before
    /// the first fetch. Shutdown interrupts any pending request or sleep and
    /// is not an error.
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        metrics::register_metrics();

        let window = chrono::Duration::from_std(self.interval)
            .map_err(|e| Error::Config(format!("Invalid poll interval: {}", e)))?;

        let synchronizer = BlackoutSynchronizer::new(self.alerta.clone());
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Shutdown requested before blackout sync");
                return Ok(());
            }
            created = synchronizer.sync(&self.blackouts) => {
                info!("Blackout sync complete, {} created", created?);
            }
        }

        // A stored checkpoint only seeds the first fetch
        let mut resume_from = self.checkpoint.read().await;
        if let Some(from) = resume_from {
            info!("Resuming from checkpoint {}", timestamp::format(&from));
        }

        loop {
            let from = resume_from.take().unwrap_or_else(|| Utc::now() - window);

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested, abandoning current cycle");
                    return Ok(());
                }
                report = self.run_cycle(from) => {
                    let report = report?;
                    info!(
                        "Poll cycle from {}: {} fetched, {} notified, {} skipped, {} rejected",
                        timestamp::format(&from),
                        report.fetched,
                        report.notified,
                        report.skipped,
                        report.rejected
                    );
                }
            }

            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }

    /// Fetch alerts since `from`, relay the qualifying ones, then store
    /// `from` as the checkpoint.
    pub async fn run_cycle(&self, from: DateTime<Utc>) -> Result<CycleReport> {
        let alerts = self.alerta.list_alerts(from).await?;
        metrics::ALERTS_FETCHED_TOTAL.inc_by(alerts.len() as u64);

        let report = self.process_alerts(&alerts, Utc::now()).await?;

        self.checkpoint.write(from).await?;
        metrics::POLL_CYCLES_TOTAL.inc();
        Ok(report)
    }

    async fn process_alerts(&self, alerts: &[Alert], now: DateTime<Utc>) -> Result<CycleReport> {
        let mut report = CycleReport {
            fetched: alerts.len(),
            ..Default::default()
        };

        for alert in alerts {
            if let Decision::Skip(reason) = self.filter.evaluate(alert, now) {
                debug!("Skipping alert {}: {}", alert.id, reason);
                metrics::ALERTS_SKIPPED_TOTAL
                    .with_label_values(&[reason.label()])
                    .inc();
                report.skipped += 1;
                continue;
            }

            let message = self.formatter.format(alert);
            match self.dispatcher.dispatch(&message).await? {
                DispatchOutcome::Delivered => {
                    metrics::ALERTS_NOTIFIED_TOTAL.inc();
                    report.notified += 1;
                }
                DispatchOutcome::Rejected(_) => {
                    metrics::DISPATCH_FAILURES_TOTAL.inc();
                    report.rejected += 1;
                }
            }
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerta::MockAlertService;
    use crate::store::{AlertaConfiguration, TopicRoute, DEFAULT_TEMPLATE_KEY};
    use crate::zulip::{Message, MockChatClient, SendResponse};
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use tokio::sync::oneshot;

    fn snapshot() -> ConfigurationSnapshot {
        let mut templates = HashMap::new();
        templates.insert(
            "apimon_endpoint_monitor".to_string(),
            "[{{ status.upper() }}] {{ resource }}: {{ text }}".to_string(),
        );
        templates.insert(DEFAULT_TEMPLATE_KEY.to_string(), "{{ event }}".to_string());

        let mut topics = HashMap::new();
        topics.insert(
            "apimon_endpoint_monitor".to_string(),
            TopicRoute {
                to: Some(" apimon ".to_string()),
                subject: Some(" endpoints ".to_string()),
            },
        );

        ConfigurationSnapshot {
            alerta: AlertaConfiguration {
                config_id: 1,
                config_name: "prod".to_string(),
                alerta_endpoint: "http://alerta.local/api".to_string(),
                alerta_timeout: 30,
                alerta_debug: false,
                skip_environment: "dev".to_string(),
            },
            templates,
            topics,
            blackouts: vec![],
        }
    }

    fn poll_config(dir: &TempDir) -> PollConfig {
        PollConfig {
            interval: Duration::from_secs(60),
            repeat_interval_minutes: 5,
            checkpoint_path: dir.path().join("last_poll"),
        }
    }

    fn routing() -> RoutingDefaults {
        RoutingDefaults {
            message_type: "stream ".to_string(),
            to: "alerts".to_string(),
            subject: None,
        }
    }

    fn alert(id: &str, status: &str, environment: &str, minutes_ago: i64) -> Alert {
        let last_receive = Utc::now() - chrono::Duration::minutes(minutes_ago);
        serde_json::from_value(json!({
            "id": id,
            "resource": "web01",
            "event": "HttpError",
            "environment": environment,
            "status": status,
            "service": ["apimon", "endpoint_monitor"],
            "text": "500 on /health",
            "lastReceiveTime": timestamp::format(&last_receive),
        }))
        .unwrap()
    }

    fn success() -> SendResponse {
        SendResponse {
            result: "success".to_string(),
            msg: String::new(),
            id: Some(1),
        }
    }

    #[tokio::test]
    async fn test_open_alert_is_relayed_and_checkpoint_written() {
        let dir = tempfile::tempdir().unwrap();
        let from = timestamp::parse("2020-05-20T11:00:00.000Z").unwrap();

        let mut alerta = MockAlertService::new();
        alerta
            .expect_list_alerts()
            .withf(move |f| *f == from)
            .times(1)
            .returning(|_| Ok(vec![alert("a1", "open", "prod", 10)]));

        let mut chat = MockChatClient::new();
        chat.expect_send_message()
            .withf(|m: &Message| {
                *m == Message {
                    message_type: "stream".to_string(),
                    to: "apimon".to_string(),
                    subject: "endpoints".to_string(),
                    content: "[OPEN] web01: 500 on /health".to_string(),
                }
            })
            .times(1)
            .returning(|_| Ok(success()));

        let poller = Poller::new(
            Arc::new(alerta),
            Arc::new(chat),
            &snapshot(),
            &poll_config(&dir),
            routing(),
        );

        let report = poller.run_cycle(from).await.unwrap();
        assert_eq!(
            report,
            CycleReport { fetched: 1, notified: 1, skipped: 0, rejected: 0 }
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("last_poll")).unwrap(),
            "2020-05-20T11:00:00.000Z"
        );
    }

    #[tokio::test]
    async fn test_filtered_alerts_are_not_sent() {
        let dir = tempfile::tempdir().unwrap();

        let mut alerta = MockAlertService::new();
        alerta.expect_list_alerts().returning(|_| {
            Ok(vec![
                alert("ack", "ack", "prod", 10),
                alert("blackout", "blackout", "prod", 10),
                alert("closed", "closed", "prod", 10),
                alert("dev", "open", "dev", 10),
                alert("recent", "open", "prod", 1),
            ])
        });

        let mut chat = MockChatClient::new();
        chat.expect_send_message().never();

        let poller = Poller::new(
            Arc::new(alerta),
            Arc::new(chat),
            &snapshot(),
            &poll_config(&dir),
            routing(),
        );

        let report = poller.run_cycle(Utc::now()).await.unwrap();
        assert_eq!(report.fetched, 5);
        assert_eq!(report.skipped, 5);
        assert!(dir.path().join("last_poll").exists());
    }

    #[tokio::test]
    async fn test_rejected_message_does_not_stop_cycle() {
        let dir = tempfile::tempdir().unwrap();

        let mut alerta = MockAlertService::new();
        alerta.expect_list_alerts().returning(|_| {
            Ok(vec![
                alert("a1", "open", "prod", 10),
                alert("a2", "open", "prod", 10),
            ])
        });

        let mut chat = MockChatClient::new();
        let mut seq = mockall::Sequence::new();
        chat.expect_send_message()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Ok(SendResponse {
                    result: "error".to_string(),
                    msg: "Stream 'apimon' does not exist".to_string(),
                    id: None,
                })
            });
        chat.expect_send_message()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(success()));

        let poller = Poller::new(
            Arc::new(alerta),
            Arc::new(chat),
            &snapshot(),
            &poll_config(&dir),
            routing(),
        );

        let report = poller.run_cycle(Utc::now()).await.unwrap();
        assert_eq!(
            report,
            CycleReport { fetched: 2, notified: 1, skipped: 0, rejected: 1 }
        );
    }

    #[tokio::test]
    async fn test_transport_error_aborts_cycle_without_checkpoint() {
        let dir = tempfile::tempdir().unwrap();

        let mut alerta = MockAlertService::new();
        alerta
            .expect_list_alerts()
            .returning(|_| Ok(vec![alert("a1", "open", "prod", 10)]));

        let mut chat = MockChatClient::new();
        chat.expect_send_message()
            .returning(|_| Err(Error::Dispatch("connection reset".to_string())));

        let poller = Poller::new(
            Arc::new(alerta),
            Arc::new(chat),
            &snapshot(),
            &poll_config(&dir),
            routing(),
        );

        assert!(matches!(
            poller.run_cycle(Utc::now()).await,
            Err(Error::Dispatch(_))
        ));
        assert!(!dir.path().join("last_poll").exists());
    }

    #[tokio::test]
    async fn test_run_resumes_from_stored_checkpoint_and_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint_path = dir.path().join("last_poll");
        let stored = timestamp::parse("2020-05-20T11:00:00.000Z").unwrap();
        CheckpointStore::new(checkpoint_path.clone())
            .write(stored)
            .await
            .unwrap();

        let (tx, rx) = oneshot::channel::<()>();
        let tx = Mutex::new(Some(tx));

        let mut snapshot = snapshot();
        snapshot.blackouts = vec![BlackoutDefinition {
            environment: "prod".to_string(),
            service: vec!["apimon".to_string()],
            resource: None,
            event: None,
            group: None,
            tags: vec![],
            start_time: None,
            duration: Some(600),
            text: None,
        }];

        let mut alerta = MockAlertService::new();
        alerta.expect_list_blackouts().times(1).returning(|| Ok(vec![]));
        alerta
            .expect_create_blackout()
            .times(1)
            .returning(|_| Ok(Some("b1".to_string())));
        let seeded = checkpoint_path.clone();
        alerta
            .expect_list_alerts()
            .withf(move |f| *f == stored)
            .times(1)
            .returning(move |_| {
                // The file now only comes back if the cycle writes it
                std::fs::remove_file(&seeded).unwrap();
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(());
                }
                Ok(vec![])
            });

        let chat = MockChatClient::new();

        let poller = Poller::new(
            Arc::new(alerta),
            Arc::new(chat),
            &snapshot,
            &poll_config(&dir),
            routing(),
        );

        let written_path = checkpoint_path.clone();
        poller
            .run(async move {
                let _ = rx.await;
                while !written_path.exists() {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            })
            .await
            .unwrap();

        let written = CheckpointStore::new(checkpoint_path).read().await.unwrap();
        assert_eq!(written, stored);
    }

    #[tokio::test]
    async fn test_first_run_uses_poll_window() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let tx = Mutex::new(Some(tx));
        let started = Utc::now();

        let mut alerta = MockAlertService::new();
        alerta
            .expect_list_alerts()
            .withf(move |f| {
                let lower = started - chrono::Duration::seconds(61);
                *f >= lower && *f <= Utc::now() - chrono::Duration::seconds(59)
            })
            .times(1)
            .returning(move |_| {
                if let Some(tx) = tx.lock().unwrap().take() {
                    let _ = tx.send(());
                }
                Ok(vec![])
            });

        let poller = Poller::new(
            Arc::new(alerta),
            Arc::new(MockChatClient::new()),
            &snapshot(),
            &poll_config(&dir),
            routing(),
        );

        poller
            .run(async {
                let _ = rx.await;
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fetch_error_propagates_from_run() {
        let dir = tempfile::tempdir().unwrap();

        let mut alerta = MockAlertService::new();
        alerta
            .expect_list_alerts()
            .returning(|_| Err(Error::AlertService("alerts returned 503".to_string())));

        let poller = Poller::new(
            Arc::new(alerta),
            Arc::new(MockChatClient::new()),
            &snapshot(),
            &poll_config(&dir),
            routing(),
        );

        let result = poller.run(std::future::pending::<()>()).await;
        assert!(matches!(result, Err(Error::AlertService(_))));
    }
}
