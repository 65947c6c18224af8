//! Configuration for the SDK client and the `bwapi-authenticate` CLI.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::sdk::credentials::default_credentials_path;

/// Default Brandwatch API root. Every request path is appended to it.
pub const DEFAULT_API_URL: &str = "https://api.brandwatch.com/";

/// Default OAuth grant type for password authentication.
pub const DEFAULT_GRANT_TYPE: &str = "api-password";

/// Default OAuth client id.
pub const DEFAULT_CLIENT_ID: &str = "brandwatch-api-client";

/// Command-line arguments for `bwapi-authenticate`.
#[derive(Parser, Debug, Clone)]
#[command(name = "bwapi-authenticate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Log in to Brandwatch and retrieve an access token")]
pub struct Args {
    /// Path to where access tokens are stored
    #[arg(short, long, value_name = "PATH", env = "BWAPI_CREDENTIALS")]
    pub store: Option<PathBuf>,

    /// Brandwatch username (probably your email address)
    #[arg(short, long, env = "BWAPI_USERNAME")]
    pub username: Option<String>,

    /// Brandwatch password
    #[arg(short, long, env = "BWAPI_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Brandwatch API URL
    #[arg(long, default_value = DEFAULT_API_URL, env = "BWAPI_URL")]
    pub api_url: String,

    /// Delay before each API request, in milliseconds
    #[arg(long, default_value = "500", env = "BWAPI_REQUEST_DELAY_MS")]
    pub request_delay_ms: u64,

    /// Enable debug logging
    #[arg(short, long, env = "BWAPI_DEBUG")]
    pub debug: bool,
}

impl Args {
    /// Credentials store path, falling back to `~/.bwapi/credentials.txt`.
    pub fn store_path(&self) -> PathBuf {
        self.store.clone().unwrap_or_else(default_credentials_path)
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API root URL
    pub api_url: String,
    /// OAuth grant type
    pub grant_type: String,
    /// OAuth client id
    pub client_id: String,
    /// Delay before every request (rate limiting)
    pub request_delay_ms: u64,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Maximum attempts for transient failures (1 disables retries)
    pub max_tries: u32,
}

impl ClientConfig {
    /// Root URL normalised to end with a single `/`.
    pub fn normalized_api_url(&self) -> String {
        format!("{}/", self.api_url.trim_end_matches('/'))
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            grant_type: DEFAULT_GRANT_TYPE.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            request_delay_ms: 500,
            timeout_secs: 120,
            max_tries: 3,
        }
    }
}

impl From<&Args> for ClientConfig {
    fn from(args: &Args) -> Self {
        Self {
            api_url: args.api_url.clone(),
            request_delay_ms: args.request_delay_ms,
            ..Self::default()
        }
    }
}
