//! `bwapi-authenticate` end to end against a mock API.

#![allow(deprecated)] // Allow deprecated cargo_bin for now

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACCESS_TOKEN: &str = "00000000-0000-0000-0000-000000000000";

fn authenticate(server_uri: &str, store: &std::path::Path, password: &str) -> Command {
    let mut cmd = Command::cargo_bin("bwapi-authenticate").unwrap();
    cmd.env_remove("BWAPI_USERNAME")
        .env_remove("BWAPI_PASSWORD")
        .env_remove("BWAPI_CREDENTIALS")
        .env_remove("BWAPI_URL")
        .env_remove("RUST_LOG")
        .arg("--username")
        .arg("User@Example.com")
        .arg("--password")
        .arg(password)
        .arg("--store")
        .arg(store)
        .arg("--api-url")
        .arg(server_uri)
        .arg("--request-delay-ms")
        .arg("0");
    cmd
}

#[test]
fn test_binary_help() {
    Command::cargo_bin("bwapi-authenticate")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Brandwatch"))
        .stdout(predicate::str::contains("--store"));
}

#[test]
fn test_binary_version() {
    Command::cargo_bin("bwapi-authenticate")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_successful_login_stores_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(query_param("username", "User@Example.com"))
        .and(query_param("grant_type", "api-password"))
        .and(query_param("client_id", "brandwatch-api-client"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"access_token": ACCESS_TOKEN})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = dir.path().join("credentials.txt");
    let uri = server.uri();
    let store_for_cmd = store.clone();

    tokio::task::spawn_blocking(move || {
        authenticate(&uri, &store_for_cmd, "secret")
            .assert()
            .success()
            .stdout(predicate::str::contains("Authenticating user: User@Example.com"))
            .stdout(predicate::str::contains(format!(
                "Success! Access token: {}",
                ACCESS_TOKEN
            )));
    })
    .await
    .unwrap();

    let stored = std::fs::read_to_string(&store).unwrap();
    assert_eq!(stored.trim(), format!("user@example.com\t{}", ACCESS_TOKEN));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failed_login_exits_non_zero() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Bad credentials"
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = dir.path().join("credentials.txt");
    let uri = server.uri();

    tokio::task::spawn_blocking(move || {
        authenticate(&uri, &store, "wrong")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Authentication failed"));
    })
    .await
    .unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rust_log_enables_debug_output() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let store = dir.path().join("credentials.txt");
    let uri = server.uri();

    tokio::task::spawn_blocking(move || {
        authenticate(&uri, &store, "wrong")
            .assert()
            .failure()
            .stderr(predicate::str::contains("bwapi-authenticate v").not());

        authenticate(&uri, &store, "wrong")
            .env("RUST_LOG", "debug")
            .assert()
            .failure()
            .stderr(predicate::str::contains(format!(
                "bwapi-authenticate v{}",
                env!("CARGO_PKG_VERSION")
            )));
    })
    .await
    .unwrap();
}
