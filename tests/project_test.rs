//! Authentication and project binding against a mock API.

mod common;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use bwapi::project::{AuthOptions, Project, User};
use bwapi::sdk::CredentialsStore;
use bwapi::Error;

use common::*;

#[tokio::test]
async fn test_connect_project_by_name_and_id() {
    let server = MockServer::start().await;
    let by_name = connect_project(&server).await;

    assert_eq!(by_name.id(), PROJECT_ID);
    assert_eq!(by_name.name(), PROJECT_NAME);
    assert_eq!(by_name.address(), format!("projects/{}/", PROJECT_ID));
    assert_eq!(by_name.info().timezone.as_deref(), Some("Africa/Abidjan"));

    let by_id = Project::connect(by_name.user().clone(), PROJECT_ID).await.unwrap();
    assert_eq!(by_id.name(), PROJECT_NAME);

    let by_numeric_name = Project::connect(by_name.user().clone(), "2000").await.unwrap();
    assert_eq!(by_numeric_name.name(), "Other project");
}

#[tokio::test]
async fn test_unknown_project() {
    let server = MockServer::start().await;
    let project = connect_project(&server).await;

    let err = Project::connect(project.user().clone(), "No such project")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ProjectNotFound(name) if name == "No such project"));
}

#[tokio::test]
async fn test_project_requests_are_scoped_and_authorized() {
    let server = MockServer::start().await;
    let project = connect_project(&server).await;

    Mock::given(method("GET"))
        .and(path(project_path("queries/5")))
        .and(header("authorization", format!("Bearer {}", ACCESS_TOKEN).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5, "name": "Q"})))
        .expect(1)
        .mount(&server)
        .await;

    let response = project
        .get("queries/5", &bwapi::sdk::QueryParams::new())
        .await
        .unwrap();
    assert_eq!(response["name"], "Q");
}

#[tokio::test]
async fn test_username_case_does_not_matter_for_stored_tokens() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_me(&server).await;
    mount_projects(&server).await;

    let store_path = dir.path().join("credentials.txt");
    CredentialsStore::new(&store_path)
        .set("Example@Example.com", ACCESS_TOKEN)
        .await
        .unwrap();

    let options = AuthOptions::new()
        .username("example@EXAMPLE.com")
        .credentials_path(&store_path)
        .client_config(client_config(&server));
    let project = Project::open(options, PROJECT_NAME).await.unwrap();

    assert_eq!(project.user().token(), ACCESS_TOKEN);
    assert_eq!(project.id(), PROJECT_ID);
}

#[tokio::test]
async fn test_token_for_differently_cased_username_is_accepted() {
    let server = MockServer::start().await;
    mount_me(&server).await;

    let user = User::connect(
        AuthOptions::new()
            .username("USER@Example.com")
            .token(ACCESS_TOKEN)
            .without_credentials_store()
            .client_config(client_config(&server)),
    )
    .await
    .unwrap();

    assert_eq!(user.username(), "USER@Example.com");
}

#[tokio::test]
async fn test_missing_stored_token() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    let err = User::connect(
        AuthOptions::new()
            .username("nobody@example.com")
            .credentials_path(dir.path().join("credentials.txt"))
            .client_config(client_config(&server)),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, Error::CredentialsNotFound(_)));
}
