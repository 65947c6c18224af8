//! Brandwatch API SDK - Rust Implementation
//!
//! An async client for the Brandwatch consumer research API: authentication
//! and token storage, project-scoped resource management, and data
//! retrieval for queries and query groups.
//!
//! # Architecture
//!
//! 1. **SDK Layer** (`sdk`) - HTTP client, retries, credentials store, wire types
//! 2. **Project Layer** (`project`) - Authenticated users and project handles
//! 3. **Resource Layer** (`resources`) - Queries, groups, tags, categories,
//!    rules, lists, signals and mention edits
//! 4. **Data Layer** (`data`) - Mentions, counts, charts and other analytics
//!
//! Everything lives under the single `bwapi` namespace; the pre-4.0 module
//! names are gone:
//!
//! ```compile_fail
//! use bwproject::BWProject;
//! use bwresources::BWQueries;
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use bwapi::data::DataSource;
//! use bwapi::filters::MentionFilters;
//! use bwapi::project::{AuthOptions, Project};
//! use bwapi::resources::{Queries, ResourceRef};
//!
//! # async fn run() -> bwapi::Result<()> {
//! let options = AuthOptions::new().username("user@example.com");
//! let project = Arc::new(Project::open(options, "My Project").await?);
//! let queries = Queries::load(project).await?;
//!
//! let filters = MentionFilters::new().with("sentiment", "positive");
//! let count = queries
//!     .mention_count(&ResourceRef::from("My Query"), "2024-01-01", &filters)
//!     .await?;
//! println!("{} positive mentions", count);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod filters;
pub mod project;
pub mod resources;
pub mod sdk;

pub use error::{Error, Result};

/// SDK version, sent in the user agent.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
