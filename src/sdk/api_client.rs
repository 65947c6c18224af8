//! HTTP client for the Brandwatch REST API.
//!
//! This module provides the low-level request plumbing: URL building,
//! bearer authentication, the inter-request delay, retries, and turning
//! vendor error payloads into [`Error`] values.

use reqwest::{Client, Method, Response};
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::sdk::retry::{retry_api, BackoffParams};
use crate::sdk::types::TokenResponse;
use crate::VERSION;

/// Path of the token endpoint, relative to the API root.
pub const OAUTH_PATH: &str = "oauth/token";

/// User agent string for API requests.
fn user_agent() -> String {
    format!("bwapi/{} (rust)", VERSION)
}

/// Ordered query string parameters. List values become repeated keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single key/value pair.
    pub fn push(&mut self, key: impl Into<String>, value: impl ToString) {
        self.0.push((key.into(), value.to_string()));
    }

    /// Builder form of [`QueryParams::push`].
    pub fn with(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.push(key, value);
        self
    }

    /// Append a JSON value: arrays repeat the key, nulls are skipped,
    /// objects are sent as their JSON text.
    pub fn push_value(&mut self, key: &str, value: &Value) {
        match value {
            Value::Null => {}
            Value::String(s) => self.push(key, s),
            Value::Array(items) => {
                for item in items {
                    self.push_value(key, item);
                }
            }
            other => self.push(key, other),
        }
    }

    /// Replace every value of `key` with a single value.
    pub fn set(&mut self, key: &str, value: impl ToString) {
        self.remove(key);
        self.push(key, value);
    }

    pub fn remove(&mut self, key: &str) {
        self.0.retain(|(k, _)| k != key);
    }

    /// First value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All values for `key`, in insertion order.
    pub fn get_all(&self, key: &str) -> Vec<&str> {
        self.0
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.iter().any(|(k, _)| k == key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[(String, String)] {
        &self.0
    }
}

/// True when an `errors` member carries at least one error.
fn has_errors(errors: &Value) -> bool {
    match errors {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::String(s) => !s.is_empty(),
        Value::Number(_) => true,
    }
}

/// API client for the Brandwatch backend.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    api_url: String,
    token: Option<String>,
    request_delay: Duration,
    backoff: BackoffParams,
}

impl ApiClient {
    /// Create a new unauthenticated API client.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: config.normalized_api_url(),
            token: None,
            request_delay: config.request_delay(),
            backoff: BackoffParams::with_max_tries(config.max_tries),
        })
    }

    /// Copy of this client that authenticates with `token`.
    pub fn with_token(&self, token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..self.clone()
        }
    }

    /// Get the API URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path.trim_start_matches('/'))
    }

    /// Make an API request with retry logic and return the response JSON.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        params: &QueryParams,
        body: Option<&Value>,
    ) -> Result<Value> {
        retry_api(
            move || self.send(method.clone(), path, params, body),
            &self.backoff,
        )
        .await
    }

    /// Make a single request.
    async fn send(
        &self,
        method: Method,
        path: &str,
        params: &QueryParams,
        body: Option<&Value>,
    ) -> Result<Value> {
        if !self.request_delay.is_zero() {
            sleep(self.request_delay).await;
        }

        let mut request = self
            .client
            .request(method.clone(), self.url(path))
            .query(params.as_slice());

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        debug!("{} {}", method, response.url());

        Self::handle_response(response, body).await
    }

    /// Handle API response, extracting errors.
    async fn handle_response(response: Response, sent: Option<&Value>) -> Result<Value> {
        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or("Unknown").to_string();
        let url = response.url().to_string();
        let text = response.text().await?;

        if text.trim().is_empty() {
            if status.is_success() {
                return Ok(Value::Null);
            }
            return Err(Error::api(status.as_u16(), status_text, text));
        }

        let value: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(_) => {
                error!(
                    "There was an error with this request: {} {:?} {}",
                    url, sent, text
                );
                return Err(Error::api(status.as_u16(), status_text, text));
            }
        };

        if let Some(errors) = value.get("errors").filter(|e| has_errors(e)) {
            error!(
                "There was an error with this request: {} {:?} {}",
                url, sent, errors
            );
            return Err(Error::ApiErrors(errors.to_string()));
        }

        if !status.is_success() {
            return Err(Error::api_json(status.as_u16(), status_text, text));
        }

        Ok(value)
    }

    pub async fn get(&self, path: &str, params: &QueryParams) -> Result<Value> {
        self.request(Method::GET, path, params, None).await
    }

    pub async fn post(&self, path: &str, params: &QueryParams, body: Option<&Value>) -> Result<Value> {
        self.request(Method::POST, path, params, body).await
    }

    pub async fn put(&self, path: &str, params: &QueryParams, body: Option<&Value>) -> Result<Value> {
        self.request(Method::PUT, path, params, body).await
    }

    pub async fn patch(&self, path: &str, params: &QueryParams, body: Option<&Value>) -> Result<Value> {
        self.request(Method::PATCH, path, params, body).await
    }

    pub async fn delete(&self, path: &str, params: &QueryParams) -> Result<Value> {
        self.request(Method::DELETE, path, params, None).await
    }

    // ===== Authentication =====

    /// Exchange a username and password for an access token.
    ///
    /// The password travels in the form body; everything else is sent as
    /// query parameters.
    pub async fn request_token(
        &self,
        username: &str,
        password: &str,
        grant_type: &str,
        client_id: &str,
    ) -> Result<TokenResponse> {
        if !self.request_delay.is_zero() {
            sleep(self.request_delay).await;
        }

        let params = QueryParams::new()
            .with("username", username)
            .with("grant_type", grant_type)
            .with("client_id", client_id);

        let response = self
            .client
            .post(self.url(OAUTH_PATH))
            .query(params.as_slice())
            .form(&[("password", password)])
            .send()
            .await?;

        let value = Self::handle_response(response, None).await?;
        Ok(serde_json::from_value(value)?)
    }
}
