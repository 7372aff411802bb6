//! HTTP API tests against a live server on an ephemeral port.

#![cfg(unix)]

use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::net::TcpListener;

mod common;

use common::{Step, TestEnv, TestServer};

#[tokio::test]
async fn test_create_then_read_back() {
    let env = TestEnv::new();
    let server = TestServer::start(env.config.clone()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/sites"))
        .json(&json!({
            "domain": "example.com",
            "isProxy": false,
            "documentRoot": "/var/www/example",
            "enableSSL": false
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body.get("warning").is_none());
    assert_eq!(body["site"]["domain"], "example.com");
    assert_eq!(body["site"]["kind"], "static");

    let sites: Value = client.get(server.url("/sites")).send().await.unwrap().json().await.unwrap();
    assert_eq!(sites.as_array().unwrap().len(), 1);

    let site: Value = client
        .get(server.url("/sites/example.com"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(site["documentRoot"], "/var/www/example");
    assert_eq!(site["port"], 80);

    server.stop().await;
}

#[tokio::test]
async fn test_error_status_mapping() {
    let env = TestEnv::new();
    let server = TestServer::start(env.config.clone()).await;
    let client = reqwest::Client::new();

    // Missing documentRoot on a static site.
    let res = client
        .post(server.url("/sites"))
        .json(&json!({ "domain": "example.com", "isProxy": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("documentRoot"));

    // Not JSON at all.
    let res = client
        .post(server.url("/sites"))
        .header("content-type", "application/json")
        .body("{ nope")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = client.get(server.url("/sites/ghost.example")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["kind"], "not_found");

    for domain in ["a.example", "b.example"] {
        client
            .post(server.url("/sites"))
            .json(&json!({ "domain": domain, "proxyTarget": "http://localhost:3000" }))
            .send()
            .await
            .unwrap();
    }
    let res = client
        .put(server.url("/sites/a.example"))
        .json(&json!({ "domain": "b.example", "proxyTarget": "http://localhost:4000" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    server.stop().await;
}

#[tokio::test]
async fn test_partial_failure_is_success_with_warning() {
    let env = TestEnv::new().fail(Step::Reload);
    let server = TestServer::start(env.config.clone()).await;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/sites"))
        .json(&json!({
            "domain": "app.example.com",
            "isProxy": true,
            "proxyTarget": "http://localhost:5000"
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert!(body["warning"].as_str().unwrap().contains("permission denied"));
    assert_eq!(body["warnings"][0]["step"], "reload");
    assert_eq!(body["site"]["proxyTarget"], "http://localhost:5000");
    assert!(env.record_file("app.example.com").exists());

    let res = client.delete(server.url("/sites/app.example.com")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert!(body["warning"].is_string());
    assert!(body.get("site").is_none());
    assert!(!env.record_file("app.example.com").exists());

    server.stop().await;
}

#[tokio::test]
async fn test_rename_via_put() {
    let env = TestEnv::new();
    let server = TestServer::start(env.config.clone()).await;
    let client = reqwest::Client::new();

    client
        .post(server.url("/sites"))
        .json(&json!({ "domain": "old.example", "documentRoot": "/srv/site" }))
        .send()
        .await
        .unwrap();
    let res = client
        .put(server.url("/sites/old.example"))
        .json(&json!({ "domain": "new.example", "documentRoot": "/srv/site", "enableSSL": true }))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        client.get(server.url("/sites/old.example")).send().await.unwrap().status(),
        StatusCode::NOT_FOUND
    );
    let status: Value = client
        .get(server.url("/sites/new.example/status"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["artifacts"]["enabled"], true);
    assert_eq!(status["drift"], json!([]));
    assert_eq!(status["site"]["enableSSL"], true);

    server.stop().await;
}

#[tokio::test]
async fn test_apache_endpoints() {
    let env = TestEnv::new();
    let server = TestServer::start(env.config.clone()).await;
    let client = reqwest::Client::new();

    let body: Value = client
        .get(server.url("/apache/test"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["output"].as_str().unwrap().trim(), "Syntax OK");

    let res = client.post(server.url("/apache/reload")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(env.commands(), vec!["reload"]);
    server.stop().await;

    let env = TestEnv::new().fail(Step::Test);
    let server = TestServer::start(env.config.clone()).await;
    let res = client.get(server.url("/apache/test")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert!(body["output"].as_str().unwrap().contains("AH00526"));
    server.stop().await;
}

#[tokio::test]
async fn test_api_key_required_when_configured() {
    let mut env = TestEnv::new();
    env.config.api.api_key = Some("s3cret".to_string());
    let server = TestServer::start(env.config.clone()).await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/sites")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(server.url("/sites"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(server.url("/sites"))
        .bearer_auth("s3cret")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    server.stop().await;
}

#[tokio::test]
async fn test_request_id_and_status() {
    let env = TestEnv::new();
    let server = TestServer::start(env.config.clone()).await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/status")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert!(res.headers().contains_key("x-request-id"));
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "operational");
    assert_eq!(body["sites"], 0);

    let res = client
        .get(server.url("/status"))
        .header("x-request-id", "trace-me")
        .send()
        .await
        .unwrap();
    assert_eq!(res.headers()["x-request-id"], "trace-me");

    server.stop().await;
}

#[tokio::test]
async fn test_active_services_reports_listening_port() {
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = backend.local_addr().unwrap().port();

    let mut env = TestEnv::new();
    env.config.scanner.ports = vec![port];
    let server = TestServer::start(env.config.clone()).await;

    let services: Value = reqwest::get(server.url("/services/active"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(services[0]["port"], port);
    assert_eq!(services[0]["url"], format!("http://localhost:{}", port));

    server.stop().await;
}
