//! End-to-end check of the HTTP surface: a real
//! `HttpServer` bound to a loopback port, backed by a real
//! `SqliteController`/`SqliteKvStore`, driven with plain `reqwest`
//! calls (the same wire contract `foreman-sdk` speaks).

use foreman_api_http::{HttpServer, HttpServerConfig};
use foreman_core::domain::{JobConfig, JobInfo, Token};
use foreman_infra_sqlite::{create_pool, run_migrations, SqliteController, SqliteKvStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

async fn spawn_server(port: u16) -> String {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let controller = Arc::new(SqliteController::new(
        pool.clone(),
        "http-surface-test",
        Duration::from_secs(30),
    ));
    let kv = Arc::new(SqliteKvStore::new(pool));

    let server = HttpServer::new(
        HttpServerConfig {
            host: "127.0.0.1".to_string(),
            port,
        },
        controller,
        kv,
    );
    tokio::spawn(server.serve());
    // give the listener a moment to bind
    tokio::time::sleep(Duration::from_millis(100)).await;
    format!("http://127.0.0.1:{port}")
}

#[tokio::test]
async fn queue_push_then_get_status_round_trips_over_http() {
    let base_url = spawn_server(19581).await;
    let client = reqwest::Client::new();

    let token = Token::generate();
    let info = JobInfo::new(token.clone(), JobConfig::new("noop", json!({"x": 1})), "http-client");

    let resp = client
        .post(format!("{base_url}/queue/push"))
        .json(&json!({ "info": &info }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let outcome_header = resp
        .headers()
        .get("x-queue-push-outcome")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert_eq!(outcome_header, "created");

    let status_resp = client
        .get(format!("{base_url}/registry/status"))
        .query(&[("token", &token.value)])
        .send()
        .await
        .unwrap();
    assert_eq!(status_resp.status(), 200);
    assert_eq!(status_resp.text().await.unwrap(), "queued");
}

#[tokio::test]
async fn resubmitting_the_same_body_returns_already_exists() {
    let base_url = spawn_server(19582).await;
    let client = reqwest::Client::new();

    let token = Token::generate();
    let info = JobInfo::new(token.clone(), JobConfig::new("noop", json!({"x": 1})), "http-client");

    for _ in 0..2 {
        let resp = client
            .post(format!("{base_url}/queue/push"))
            .json(&json!({ "info": &info }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }
}

#[tokio::test]
async fn resubmitting_a_different_body_returns_409() {
    let base_url = spawn_server(19583).await;
    let client = reqwest::Client::new();

    let token = Token::generate();
    let first = JobInfo::new(token.clone(), JobConfig::new("noop", json!({"x": 1})), "http-client");
    let mut second = first.clone();
    second.config = JobConfig::new("noop", json!({"x": 2}));

    client
        .post(format!("{base_url}/queue/push"))
        .json(&json!({ "info": &first }))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{base_url}/queue/push"))
        .json(&json!({ "info": &second }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
}

#[tokio::test]
async fn unknown_token_status_lookup_returns_404() {
    let base_url = spawn_server(19584).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{base_url}/registry/status"))
        .query(&[("token", "does-not-exist")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn kv_round_trip_over_http() {
    let base_url = spawn_server(19585).await;
    let client = reqwest::Client::new();

    client
        .post(format!("{base_url}/db/greeting"))
        .json(&json!({"hello": "world"}))
        .send()
        .await
        .unwrap();

    let resp = client
        .get(format!("{base_url}/db/greeting"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["value"], json!({"hello": "world"}));
}
