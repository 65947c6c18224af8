//! Low-level Brandwatch API plumbing.
//!
//! # Architecture
//!
//! - `api_client` - HTTP client for the Brandwatch REST API
//! - `credentials` - Access token persistence
//! - `retry` - Retry logic with exponential backoff
//! - `types` - Wire types shared by the higher layers

pub mod api_client;
pub mod credentials;
pub mod retry;
pub mod types;

pub use api_client::{ApiClient, QueryParams};
pub use credentials::{default_credentials_path, CredentialsStore};
pub use types::*;
