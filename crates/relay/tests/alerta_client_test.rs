use alertanio_relay::{
    alerta::{timestamp, AlertService, AlertStatus, AlertaClient},
    store::{AlertaConfiguration, BlackoutDefinition},
    Error,
};
use serde_json::json;
use wiremock::{
    matchers::{body_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

fn configuration(server: &MockServer) -> AlertaConfiguration {
    AlertaConfiguration {
        config_id: 1,
        config_name: "prod".to_string(),
        alerta_endpoint: format!("{}/api", server.uri()),
        alerta_timeout: 5,
        alerta_debug: true,
        skip_environment: String::new(),
    }
}

#[tokio::test]
async fn test_list_alerts_sends_from_date_and_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/alerts"))
        .and(query_param("from-date", "2020-05-20T11:00:00.000Z"))
        .and(header("Authorization", "Key secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "total": 1,
            "alerts": [{
                "id": "6cfbc30f",
                "resource": "web01",
                "event": "HttpError",
                "environment": "prod",
                "severity": "major",
                "status": "open",
                "service": ["apimon", "endpoint_monitor"],
                "group": "Web",
                "value": "500",
                "text": "500 on /health",
                "tags": ["eu-de"],
                "attributes": {"region": "eu-de"},
                "origin": "apimon",
                "type": "exceptionAlert",
                "customer": null,
                "repeat": true,
                "duplicateCount": 3,
                "createTime": "2020-05-20T10:00:00.000Z",
                "receiveTime": "2020-05-20T10:00:00.100Z",
                "lastReceiveId": "abc",
                "lastReceiveTime": "2020-05-20T10:55:00.000Z",
                "history": []
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = AlertaClient::new(&configuration(&server), Some("secret".to_string())).unwrap();
    let from = timestamp::parse("2020-05-20T11:00:00.000Z").unwrap();
    let alerts = client.list_alerts(from).await.unwrap();

    assert_eq!(alerts.len(), 1);
    let alert = &alerts[0];
    assert_eq!(alert.status, AlertStatus::Open);
    assert_eq!(alert.service_key(), "apimon_endpoint_monitor");
    assert!(alert.repeat);
    assert_eq!(alert.duplicate_count, 3);
    assert_eq!(
        alert.last_receive_time,
        Some(timestamp::parse("2020-05-20T10:55:00.000Z").unwrap())
    );
}

#[tokio::test]
async fn test_list_blackouts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/blackouts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "ok",
            "blackouts": [
                {"id": "b1", "environment": "prod", "service": ["apimon"], "status": "active"},
                {"id": "b2", "environment": "prod", "service": [], "status": "expired"}
            ]
        })))
        .mount(&server)
        .await;

    let client = AlertaClient::new(&configuration(&server), None).unwrap();
    let blackouts = client.list_blackouts().await.unwrap();

    assert_eq!(blackouts.len(), 2);
    assert!(blackouts[0].is_active());
    assert!(!blackouts[1].is_active());
}

#[tokio::test]
async fn test_create_blackout_posts_definition() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/blackout"))
        .and(body_json(json!({
            "environment": "prod",
            "service": ["apimon"],
            "resource": "db01",
            "tags": ["maintenance"],
            "startTime": "2020-05-20T11:00:00.000Z",
            "duration": 3600,
            "text": "planned"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "status": "ok",
            "id": "b42"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let blackout = BlackoutDefinition {
        environment: "prod".to_string(),
        service: vec!["apimon".to_string()],
        resource: Some("db01".to_string()),
        event: None,
        group: None,
        tags: vec!["maintenance".to_string()],
        start_time: Some(timestamp::parse("2020-05-20T11:00:00.000Z").unwrap()),
        duration: Some(3600),
        text: Some("planned".to_string()),
    };

    let client = AlertaClient::new(&configuration(&server), None).unwrap();
    let id = client.create_blackout(&blackout).await.unwrap();
    assert_eq!(id.as_deref(), Some("b42"));
}

#[tokio::test]
async fn test_error_status_is_alert_service_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/alerts"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "status": "error",
            "message": "Missing authorization API Key or Bearer Token"
        })))
        .mount(&server)
        .await;

    let client = AlertaClient::new(&configuration(&server), None).unwrap();
    match client.list_alerts(chrono::Utc::now()).await {
        Err(Error::AlertService(message)) => {
            assert!(message.contains("401"));
            assert!(message.contains("Missing authorization"));
        }
        other => panic!("expected AlertService error, got {:?}", other),
    }
}
