//! Shared mock-server setup for integration tests.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bwapi::config::ClientConfig;
use bwapi::project::{AuthOptions, Project, User};

pub const ACCESS_TOKEN: &str = "00000000-0000-0000-0000-000000000000";
pub const USERNAME: &str = "user@example.com";
pub const PROJECT_ID: i64 = 1998;
pub const PROJECT_NAME: &str = "Example project";

/// Client settings pointing at the mock server, without delays or retries.
pub fn client_config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        api_url: server.uri(),
        request_delay_ms: 0,
        max_tries: 1,
        ..ClientConfig::default()
    }
}

pub fn project_path(endpoint: &str) -> String {
    format!("/projects/{}/{}", PROJECT_ID, endpoint)
}

pub async fn mount_me(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/me"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "username": USERNAME})))
        .mount(server)
        .await;
}

pub async fn mount_projects(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/projects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "resultsTotal": 2,
            "results": [
                {"id": PROJECT_ID, "name": PROJECT_NAME, "timezone": "Africa/Abidjan"},
                {"id": 2000, "name": "Other project"}
            ]
        })))
        .mount(server)
        .await;
}

/// Serve `GET projects/<id>/<endpoint>` with a `results` listing.
pub async fn mount_listing(server: &MockServer, endpoint: &str, results: Value) {
    Mock::given(method("GET"))
        .and(path(project_path(endpoint)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": results})))
        .mount(server)
        .await;
}

/// Like [`mount_listing`], but only for the first request; later
/// requests fall through to mocks mounted afterwards.
pub async fn mount_listing_once(server: &MockServer, endpoint: &str, results: Value) {
    Mock::given(method("GET"))
        .and(path(project_path(endpoint)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": results})))
        .up_to_n_times(1)
        .mount(server)
        .await;
}

/// Empty tag and category listings, needed by every manager that
/// translates filter names.
pub async fn mount_empty_labels(server: &MockServer) {
    mount_listing(server, "tags", json!([])).await;
    mount_listing(server, "categories", json!([])).await;
}

/// Token-authenticated project handle on the mock server.
pub async fn connect_project(server: &MockServer) -> Arc<Project> {
    mount_me(server).await;
    mount_projects(server).await;

    let user = User::connect(
        AuthOptions::new()
            .token(ACCESS_TOKEN)
            .without_credentials_store()
            .client_config(client_config(server)),
    )
    .await
    .unwrap();

    Arc::new(Project::connect(user, PROJECT_NAME).await.unwrap())
}
