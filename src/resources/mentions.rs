//! Bulk edits of already collected mentions.
//!
//! Mentions are fetched through [`crate::data::DataSource`]; this module
//! only changes them.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use super::resolver::NameResolver;
use crate::error::{Error, Result};
use crate::project::Project;
use crate::sdk::api_client::QueryParams;
use crate::sdk::types::Mention;

const MENTIONS_PATCH: &str = "data/mentions";

/// Mention editor with the project's tags and categories.
#[derive(Debug, Clone)]
pub struct Mentions {
    project: Arc<Project>,
    resolver: NameResolver,
}

impl Mentions {
    pub async fn load(project: Arc<Project>) -> Result<Self> {
        let resolver = NameResolver::load(project.clone()).await?;
        Ok(Self { project, resolver })
    }

    pub fn resolver(&self) -> &NameResolver {
        &self.resolver
    }

    /// Apply one action (add a tag, set sentiment, ...) to every mention.
    ///
    /// Missing tags and categories named by the action are created first.
    /// Returns the number of mentions the server reports as updated.
    pub async fn patch_mentions(
        &mut self,
        mentions: &[Mention],
        action: &str,
        setting: Value,
    ) -> Result<usize> {
        if mentions.is_empty() {
            return Ok(0);
        }

        let setting = self.resolver.prepare_action(action, setting).await?;

        let body: Vec<Value> = mentions
            .iter()
            .map(|mention| {
                let mut patch = json!({
                    "queryId": mention.query_id,
                    "resourceId": mention.resource_id,
                });
                patch[action] = setting.clone();
                patch
            })
            .collect();

        let response = self
            .project
            .patch(MENTIONS_PATCH, &QueryParams::new(), Some(&Value::Array(body)))
            .await?;

        let updated = match &response {
            Value::Array(items) => items.len(),
            Value::Null => mentions.len(),
            other => {
                return Err(Error::UnexpectedResponse(format!(
                    "mention patch returned {}",
                    other
                )))
            }
        };
        info!("{} mentions updated", updated);
        Ok(updated)
    }
}
