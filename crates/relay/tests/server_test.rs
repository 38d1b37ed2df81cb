use axum::http::StatusCode;
use alertanio_relay::{metrics, server::Server};

#[tokio::test]
async fn test_health_endpoint() {
    let app = Server::new("prod").build_router();

    // Use axum's test client
    let client = axum_test::TestServer::new(app).unwrap();

    let response = client.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["environment"], "prod");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    metrics::ALERTS_NOTIFIED_TOTAL.inc();

    let app = Server::new("prod").build_router();
    let client = axum_test::TestServer::new(app).unwrap();

    let response = client.get("/metrics").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.text();
    assert!(body.contains("alertanio_alerts_notified_total"));
}

#[tokio::test]
async fn test_unknown_route() {
    let app = Server::new("prod").build_router();
    let client = axum_test::TestServer::new(app).unwrap();

    let response = client.get("/alerts").expect_failure().await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}
