//! Resource managers for project-level vendor entities.
//!
//! Every manager mirrors one REST collection (queries, query groups, tags,
//! rules, site/author/location lists, signals) and keeps an [`IdNameMap`]
//! of what currently exists in the project, refreshed after each change.
//! Categories carry a parent/child tree and are managed separately.
//!
//! # Architecture
//!
//! - `id_map` - Id to name lookup table
//! - `resolver` - Name to id translation for filters and actions
//! - `queries`, `groups`, `tags`, `categories`, `rules`, `lists`,
//!   `signals` - One manager per resource type
//! - `mentions` - Bulk mention edits

pub mod categories;
pub mod groups;
pub mod id_map;
pub mod lists;
pub mod mentions;
pub mod queries;
pub mod resolver;
pub mod rules;
pub mod signals;
pub mod tags;

pub use categories::{Categories, CategoryDeletion, CategoryEntry, CategorySpec};
pub use groups::{GroupSpec, Groups};
pub use id_map::IdNameMap;
pub use lists::{ListKind, ListResource, ListSpec};
pub use mentions::Mentions;
pub use queries::{MentionLookup, Queries, QuerySpec};
pub use resolver::NameResolver;
pub use rules::{RuleSpec, Rules};
pub use signals::{SignalSpec, Signals, Subscriber};
pub use tags::{TagSpec, Tags};

pub use crate::sdk::types::ResourceRef;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use crate::error::{Error, Result};
use crate::project::Project;
use crate::sdk::api_client::QueryParams;

/// What an upload may do to existing and missing resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// Create missing resources and update existing ones
    #[default]
    Upsert,
    /// Only create; existing resources are left untouched
    CreateOnly,
    /// Only update; missing resources are skipped
    ModifyOnly,
}

impl UploadMode {
    fn allows(self, exists: bool) -> bool {
        match self {
            UploadMode::Upsert => true,
            UploadMode::CreateOnly => !exists,
            UploadMode::ModifyOnly => exists,
        }
    }
}

/// REST paths for one resource type, relative to the project address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    /// Listing used to build the id/name table
    pub list: &'static str,
    /// Collection path; single resources live at `<item>/<id>`
    pub item: &'static str,
    pub resource_type: &'static str,
}

/// Shared state of an id/name managed resource: the project handle, its
/// endpoints and the current id/name table.
#[derive(Debug, Clone)]
pub struct ResourceIndex {
    project: Arc<Project>,
    endpoints: Endpoints,
    names: IdNameMap,
}

impl ResourceIndex {
    /// Create the index and load the current listing.
    pub async fn load(project: Arc<Project>, endpoints: Endpoints) -> Result<Self> {
        let mut index = Self {
            project,
            endpoints,
            names: IdNameMap::new(),
        };
        index.reload().await?;
        Ok(index)
    }

    /// Refresh the id/name table from the server.
    ///
    /// Called after every mutation; call it directly if someone else may
    /// have edited the project concurrently.
    pub async fn reload(&mut self) -> Result<()> {
        let response = self
            .project
            .get(self.endpoints.list, &QueryParams::new())
            .await?;

        let results = response
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::UnexpectedResponse(format!(
                    "Could not retrieve {}: {}",
                    self.endpoints.resource_type, response
                ))
            })?;

        self.names = IdNameMap::from_results(results)?;
        Ok(())
    }

    pub fn project(&self) -> &Arc<Project> {
        &self.project
    }

    pub fn endpoints(&self) -> Endpoints {
        self.endpoints
    }

    pub fn resource_type(&self) -> &'static str {
        self.endpoints.resource_type
    }

    pub fn names(&self) -> &IdNameMap {
        &self.names
    }

    pub fn resolve(&self, reference: &ResourceRef) -> Result<i64> {
        self.names.resolve(reference, self.endpoints.resource_type)
    }

    /// Whether `reference` names an existing resource. Ambiguous names
    /// are still an error.
    pub fn exists(&self, reference: &ResourceRef) -> Result<bool> {
        match self.resolve(reference) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn item_endpoint(&self, id: i64) -> String {
        format!("{}/{}", self.endpoints.item, id)
    }

    /// Full record of one resource, or the whole collection for `None`.
    pub async fn fetch(&self, reference: Option<&ResourceRef>) -> Result<Value> {
        match reference {
            Some(reference) => {
                let id = self.resolve(reference)?;
                self.project
                    .get(&self.item_endpoint(id), &QueryParams::new())
                    .await
            }
            None => {
                self.project
                    .get(self.endpoints.item, &QueryParams::new())
                    .await
            }
        }
    }

    /// PUT `body` when `name` exists, POST it otherwise, as `mode` allows.
    ///
    /// Returns the uploaded `(name, id)`, or `None` when skipped.
    pub async fn put_or_post(
        &self,
        name: &str,
        body: &Value,
        mode: UploadMode,
    ) -> Result<Option<(String, i64)>> {
        let reference = ResourceRef::from(name);
        let exists = self.exists(&reference)?;
        if !mode.allows(exists) {
            return Ok(None);
        }

        let params = QueryParams::new();
        let response = if exists {
            let id = self.resolve(&reference)?;
            self.project
                .put(&self.item_endpoint(id), &params, Some(body))
                .await?
        } else {
            self.project
                .post(self.endpoints.item, &params, Some(body))
                .await?
        };

        let uploaded = uploaded_identity(&response)?;
        info!("Uploading {} {}", self.endpoints.resource_type, uploaded.0);
        Ok(Some(uploaded))
    }

    /// PUT a complete body to an existing resource and reload.
    pub async fn replace(&mut self, id: i64, body: &Value) -> Result<Value> {
        let response = self
            .project
            .put(&self.item_endpoint(id), &QueryParams::new(), Some(body))
            .await?;
        self.reload().await?;
        Ok(response)
    }

    /// Delete resources by reference, then reload.
    pub async fn delete_all(&mut self, references: &[ResourceRef]) -> Result<()> {
        let ids = references
            .iter()
            .map(|r| self.resolve(r))
            .collect::<Result<Vec<_>>>()?;

        for id in ids {
            self.project
                .delete(&self.item_endpoint(id), &QueryParams::new())
                .await?;
            info!(
                "{} {} deleted",
                self.endpoints.resource_type,
                self.names.get(id).unwrap_or_default()
            );
        }

        self.reload().await
    }
}

/// `(name, id)` of an upload response.
fn uploaded_identity(response: &Value) -> Result<(String, i64)> {
    let name = response.get("name").and_then(Value::as_str);
    let id = response.get("id").and_then(Value::as_i64);
    match (name, id) {
        (Some(name), Some(id)) => Ok((name.to_string(), id)),
        _ => Err(Error::UnexpectedResponse(format!(
            "upload response without name and id: {}",
            response
        ))),
    }
}

/// Behaviour shared by id/name managed resources.
///
/// Implementors supply the index and the request body for an upload;
/// lookup, upload, and deletion come for free.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Typed upload input.
    type Spec: Send + Sync;

    fn index(&self) -> &ResourceIndex;

    fn index_mut(&mut self) -> &mut ResourceIndex;

    /// Name a resource is uploaded under, before any rename.
    fn spec_name(spec: &Self::Spec) -> &str;

    /// Request body for uploading `spec`, with defaults filled in.
    async fn fill(&self, spec: &Self::Spec) -> Result<Value>;

    /// Follow-up work once a batch is uploaded and the index reloaded.
    async fn after_upload(
        &mut self,
        _specs: &[Self::Spec],
        _uploaded: &BTreeMap<String, i64>,
    ) -> Result<()> {
        Ok(())
    }

    fn names(&self) -> &IdNameMap {
        self.index().names()
    }

    fn resolve(&self, reference: &ResourceRef) -> Result<i64> {
        self.index().resolve(reference)
    }

    fn exists(&self, reference: &ResourceRef) -> Result<bool> {
        self.index().exists(reference)
    }

    async fn reload(&mut self) -> Result<()> {
        self.index_mut().reload().await
    }

    /// Full record of one resource, or of all of them for `None`.
    async fn get(&self, reference: Option<&ResourceRef>) -> Result<Value> {
        self.index().fetch(reference).await
    }

    /// Upload one resource. Returns `{name: id}` of what was uploaded.
    async fn upload(&mut self, spec: Self::Spec, mode: UploadMode) -> Result<BTreeMap<String, i64>> {
        self.upload_all(std::slice::from_ref(&spec), mode).await
    }

    /// Upload several resources. Returns `{name: id}` of what was uploaded.
    async fn upload_all(
        &mut self,
        specs: &[Self::Spec],
        mode: UploadMode,
    ) -> Result<BTreeMap<String, i64>> {
        let mut uploaded = BTreeMap::new();

        for spec in specs {
            let body = self.fill(spec).await?;
            if let Some((name, id)) = self
                .index()
                .put_or_post(Self::spec_name(spec), &body, mode)
                .await?
            {
                uploaded.insert(name, id);
            }
        }

        self.index_mut().reload().await?;
        self.after_upload(specs, &uploaded).await?;
        Ok(uploaded)
    }

    async fn delete(&mut self, reference: &ResourceRef) -> Result<()> {
        self.delete_all(std::slice::from_ref(reference)).await
    }

    async fn delete_all(&mut self, references: &[ResourceRef]) -> Result<()> {
        self.index_mut().delete_all(references).await
    }
}

/// Fail with [`Error::MissingField`] when a required string is blank.
pub(crate) fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::MissingField(field.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_mode_allows() {
        assert!(UploadMode::Upsert.allows(true));
        assert!(UploadMode::Upsert.allows(false));
        assert!(UploadMode::CreateOnly.allows(false));
        assert!(!UploadMode::CreateOnly.allows(true));
        assert!(UploadMode::ModifyOnly.allows(true));
        assert!(!UploadMode::ModifyOnly.allows(false));
    }

    #[test]
    fn test_uploaded_identity() {
        let ok = uploaded_identity(&serde_json::json!({"id": 5, "name": "Tag"})).unwrap();
        assert_eq!(ok, ("Tag".to_string(), 5));
        assert!(uploaded_identity(&serde_json::json!({"id": 5})).is_err());
    }

    #[test]
    fn test_require() {
        assert!(require("name", "name").is_ok());
        assert!(matches!(require("  ", "name"), Err(Error::MissingField(_))));
    }
}
