//! User-level access: authentication and account-wide calls.

use reqwest::Method;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::sdk::api_client::{ApiClient, QueryParams};
use crate::sdk::credentials::{default_credentials_path, CredentialsStore};
use crate::sdk::types::{ProjectInfo, UserInfo};

/// How to obtain an access token.
///
/// Resolution order: an explicit token (validated against `me`), then a
/// username and password (exchanged at `oauth/token`), then a username
/// alone (looked up in the credentials store).
#[derive(Debug, Clone)]
pub struct AuthOptions {
    pub username: Option<String>,
    pub password: Option<String>,
    pub token: Option<String>,
    /// Credentials file; `None` disables token persistence
    pub credentials_path: Option<PathBuf>,
    pub client: ClientConfig,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            token: None,
            credentials_path: Some(default_credentials_path()),
            client: ClientConfig::default(),
        }
    }
}

impl AuthOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn credentials_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_path = Some(path.into());
        self
    }

    /// Never read or write the credentials file.
    pub fn without_credentials_store(mut self) -> Self {
        self.credentials_path = None;
        self
    }

    pub fn client_config(mut self, config: ClientConfig) -> Self {
        self.client = config;
        self
    }
}

/// An authenticated Brandwatch user.
///
/// For project-bound work (queries, groups, tags, ...) wrap it in a
/// [`Project`](crate::project::Project).
#[derive(Debug, Clone)]
pub struct User {
    client: ApiClient,
    username: String,
    credentials: Option<CredentialsStore>,
}

impl User {
    /// Authenticate according to `options`.
    pub async fn connect(options: AuthOptions) -> Result<Self> {
        let base = ApiClient::new(&options.client)?;
        let credentials = options.credentials_path.map(CredentialsStore::new);

        let (username, token, persist) = match (options.token, options.username, options.password)
        {
            (Some(token), username, _) => {
                let username = Self::test_auth(&base, username.as_deref(), &token).await?;
                (username, token, true)
            }
            (None, Some(username), Some(password)) => {
                let token = Self::get_auth(&base, &username, &password, &options.client).await?;
                (username, token, true)
            }
            (None, Some(username), None) => {
                let store = credentials.as_ref().ok_or_else(|| {
                    Error::Auth(format!(
                        "No password given for {} and no credentials store configured",
                        username
                    ))
                })?;
                let token = store.get(&username).await?;
                (username, token, false)
            }
            (None, None, _) => {
                return Err(Error::Auth(
                    "Must provide valid token, username and password, or username and path to token file"
                        .to_string(),
                ))
            }
        };

        if persist {
            if let Some(store) = &credentials {
                store.set(&username, &token).await?;
            }
        }

        debug!("Authenticated as {}", username);

        Ok(Self {
            client: base.with_token(token),
            username,
            credentials,
        })
    }

    /// Check a token against `me`, returning the username it belongs to.
    async fn test_auth(client: &ApiClient, username: Option<&str>, token: &str) -> Result<String> {
        let me = client
            .with_token(token)
            .get("me", &QueryParams::new())
            .await
            .map_err(|e| match e {
                Error::Api { message, .. } => {
                    Error::Auth(format!("Could not validate provided token: {}", message))
                }
                other => other,
            })?;

        let Some(found) = me.get("username").and_then(Value::as_str) else {
            return Err(Error::Auth(format!(
                "Could not validate provided token: {}",
                me
            )));
        };

        match username {
            None => Ok(found.to_string()),
            Some(given) if given.to_lowercase() == found.to_lowercase() => Ok(given.to_string()),
            Some(given) => Err(Error::Auth(format!(
                "Username {} does not match provided token",
                given
            ))),
        }
    }

    /// Exchange a username and password for a token.
    async fn get_auth(
        client: &ApiClient,
        username: &str,
        password: &str,
        config: &ClientConfig,
    ) -> Result<String> {
        let response = client
            .request_token(username, password, &config.grant_type, &config.client_id)
            .await
            .map_err(|e| match e {
                Error::Api {
                    status, message, ..
                } if (400..500).contains(&status) => {
                    Error::Auth(format!("Authentication failed: {}", message))
                }
                other => other,
            })?;

        match response.access_token {
            Some(token) => {
                info!("Authenticated user: {}", username);
                Ok(token)
            }
            None => Err(Error::Auth(format!(
                "Authentication failed: {}",
                Value::Object(response.extra)
            ))),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn token(&self) -> &str {
        self.client.token().unwrap_or_default()
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// The credentials store this user persists tokens to, if any.
    pub fn credentials(&self) -> Option<&CredentialsStore> {
        self.credentials.as_ref()
    }

    /// Projects accessible to the user.
    pub async fn projects(&self) -> Result<Vec<ProjectInfo>> {
        let response = self.client.get("projects", &QueryParams::new()).await?;
        let results = match response {
            Value::Object(mut map) if map.contains_key("results") => map
                .remove("results")
                .unwrap_or(Value::Array(Vec::new())),
            other => other,
        };
        Ok(serde_json::from_value(results)?)
    }

    /// The authenticated user's id and username.
    pub async fn me(&self) -> Result<UserInfo> {
        let response = self.client.get("me", &QueryParams::new()).await?;
        Ok(serde_json::from_value(response)?)
    }

    /// Check a query search string for errors, the same way the web app does.
    ///
    /// Languages default to `["en"]` when empty.
    pub async fn validate_query_search(&self, query: &str, languages: &[String]) -> Result<()> {
        self.validate("query-validation", query, languages).await
    }

    /// Check a rule search string for errors.
    pub async fn validate_rule_search(&self, query: &str, languages: &[String]) -> Result<()> {
        self.validate("query-validation/searchwithin", query, languages)
            .await
    }

    async fn validate(&self, endpoint: &str, query: &str, languages: &[String]) -> Result<()> {
        if query.trim().is_empty() {
            return Err(Error::MissingField("query".to_string()));
        }

        let mut params = QueryParams::new().with("query", query);
        if languages.is_empty() {
            params.push("language", "en");
        } else {
            for language in languages {
                params.push("language", language);
            }
        }

        self.client.get(endpoint, &params).await?;
        Ok(())
    }

    /// Make a request relative to the API root.
    pub async fn request(
        &self,
        method: Method,
        address: &str,
        params: &QueryParams,
        body: Option<&Value>,
    ) -> Result<Value> {
        self.client.request(method, address, params, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ACCESS_TOKEN: &str = "00000000-0000-0000-0000-000000000000";

    fn options_for(server: &MockServer, dir: &TempDir) -> AuthOptions {
        AuthOptions::new()
            .credentials_path(dir.path().join("tokens.txt"))
            .client_config(ClientConfig {
                api_url: server.uri(),
                request_delay_ms: 0,
                max_tries: 1,
                ..ClientConfig::default()
            })
    }

    async fn mount_me(server: &MockServer, username: &str) {
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"id": 7, "username": username})),
            )
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_password_login_persists_token() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"access_token": ACCESS_TOKEN})),
            )
            .mount(&server)
            .await;

        let user = User::connect(
            options_for(&server, &dir)
                .username("Example@Example.com")
                .password("secret"),
        )
        .await
        .unwrap();

        assert_eq!(user.token(), ACCESS_TOKEN);
        assert_eq!(user.username(), "Example@Example.com");

        let stored = CredentialsStore::new(dir.path().join("tokens.txt"));
        assert_eq!(stored.get("example@example.com").await.unwrap(), ACCESS_TOKEN);
    }

    #[tokio::test]
    async fn test_failed_password_login() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Bad credentials"
            })))
            .mount(&server)
            .await;

        let err = User::connect(
            options_for(&server, &dir)
                .username("user@example.com")
                .password("wrong"),
        )
        .await
        .unwrap_err();

        match err {
            Error::Auth(msg) => assert!(msg.contains("Authentication failed")),
            other => panic!("Expected Auth error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_token_login_resolves_username() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mount_me(&server, "user@example.com").await;

        let user = User::connect(options_for(&server, &dir).token(ACCESS_TOKEN))
            .await
            .unwrap();

        assert_eq!(user.username(), "user@example.com");
        assert_eq!(
            user.credentials()
                .unwrap()
                .get("user@example.com")
                .await
                .unwrap(),
            ACCESS_TOKEN
        );
    }

    #[tokio::test]
    async fn test_token_username_mismatch() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mount_me(&server, "someone-else@example.com").await;

        let err = User::connect(
            options_for(&server, &dir)
                .token(ACCESS_TOKEN)
                .username("user@example.com"),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("does not match provided token"));
    }

    #[tokio::test]
    async fn test_stored_token_login() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        CredentialsStore::new(dir.path().join("tokens.txt"))
            .set("user@example.com", ACCESS_TOKEN)
            .await
            .unwrap();

        let user = User::connect(options_for(&server, &dir).username("USER@example.com"))
            .await
            .unwrap();

        assert_eq!(user.token(), ACCESS_TOKEN);
    }

    #[tokio::test]
    async fn test_no_credentials_is_an_error() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();

        let err = User::connect(options_for(&server, &dir)).await.unwrap_err();

        assert!(matches!(err, Error::Auth(_)));
    }

    #[tokio::test]
    async fn test_validate_query_search_defaults_language() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mount_me(&server, "user@example.com").await;
        Mock::given(method("GET"))
            .and(path("/query-validation"))
            .and(query_param("query", "brandwatch OR \"brand watch\""))
            .and(query_param("language", "en"))
            .and(header("authorization", format!("Bearer {}", ACCESS_TOKEN).as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"errors": []})))
            .expect(1)
            .mount(&server)
            .await;

        let user = User::connect(options_for(&server, &dir).token(ACCESS_TOKEN))
            .await
            .unwrap();

        user.validate_query_search("brandwatch OR \"brand watch\"", &[])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_projects_unwraps_results() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        mount_me(&server, "user@example.com").await;
        Mock::given(method("GET"))
            .and(path("/projects"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "resultsTotal": 1,
                "results": [{"id": 3, "name": "Example project"}]
            })))
            .mount(&server)
            .await;

        let user = User::connect(options_for(&server, &dir).token(ACCESS_TOKEN))
            .await
            .unwrap();
        let projects = user.projects().await.unwrap();

        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].id, 3);
        assert_eq!(projects[0].name, "Example project");
    }
}
