//! Query groups.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::queries::{Queries, QuerySpec};
use super::{require, Endpoints, Resource, ResourceIndex, ResourceRef, UploadMode};
use crate::error::{Error, Result};
use crate::project::Project;

pub const GROUP_ENDPOINTS: Endpoints = Endpoints {
    list: "querygroups",
    item: "querygroups",
    resource_type: "querygroups",
};

/// A query group to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupSpec {
    pub name: String,
    /// Member queries, by name or id
    pub queries: Vec<ResourceRef>,
    /// Defaults to `"public"`
    pub shared: Option<String>,
    /// Defaults to the current project
    pub shared_project_ids: Option<Vec<i64>>,
    /// Defaults to the authenticated user
    pub users: Option<Vec<Value>>,
    pub new_name: Option<String>,
}

impl GroupSpec {
    pub fn new<I, R>(name: impl Into<String>, queries: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ResourceRef>,
    {
        Self {
            name: name.into(),
            queries: queries.into_iter().map(Into::into).collect(),
            shared: None,
            shared_project_ids: None,
            users: None,
            new_name: None,
        }
    }

    pub fn shared(mut self, shared: impl Into<String>) -> Self {
        self.shared = Some(shared.into());
        self
    }

    pub fn shared_project_ids(mut self, ids: Vec<i64>) -> Self {
        self.shared_project_ids = Some(ids);
        self
    }

    pub fn users(mut self, users: Vec<Value>) -> Self {
        self.users = Some(users);
        self
    }

    pub fn renamed(mut self, new_name: impl Into<String>) -> Self {
        self.new_name = Some(new_name.into());
        self
    }
}

/// Query groups of a project, with the project's queries.
#[derive(Debug, Clone)]
pub struct Groups {
    index: ResourceIndex,
    queries: Queries,
}

impl Groups {
    pub async fn load(project: Arc<Project>) -> Result<Self> {
        let index = ResourceIndex::load(project.clone(), GROUP_ENDPOINTS).await?;
        let queries = Queries::load(project).await?;
        Ok(Self { index, queries })
    }

    pub fn queries(&self) -> &Queries {
        &self.queries
    }

    pub fn queries_mut(&mut self) -> &mut Queries {
        &mut self.queries
    }

    pub async fn rename(&mut self, name: &str, new_name: &str) -> Result<()> {
        let members = self.group_queries(&ResourceRef::from(name)).await?;
        let spec = GroupSpec::new(name, members.into_values()).renamed(new_name);
        self.upload(spec, UploadMode::ModifyOnly).await?;
        Ok(())
    }

    /// Upload queries, then upload `group` with every one of them that
    /// exists afterwards.
    pub async fn upload_queries_as_group(
        &mut self,
        mut group: GroupSpec,
        query_specs: &[QuerySpec],
        mode: UploadMode,
        backfill_date: Option<&str>,
    ) -> Result<BTreeMap<String, i64>> {
        match backfill_date {
            Some(date) => {
                self.queries
                    .upload_all_with_backfill(query_specs, mode, date)
                    .await?
            }
            None => self.queries.upload_all(query_specs, mode).await?,
        };

        // Queries the mode skipped still belong to the group if they exist.
        let mut members = Vec::new();
        for spec in query_specs {
            let candidates = spec.new_name.iter().chain(std::iter::once(&spec.name));
            for name in candidates {
                let reference = ResourceRef::from(name.as_str());
                if self.queries.exists(&reference)? {
                    members.push(ResourceRef::Id(self.queries.resolve(&reference)?));
                    break;
                }
            }
        }

        group.queries = members;
        self.upload(group, mode).await
    }

    /// Member queries of a group, name to id.
    pub async fn group_queries(&self, group: &ResourceRef) -> Result<BTreeMap<String, i64>> {
        let info = self.get(Some(group)).await?;
        let members = info
            .get("queries")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::UnexpectedResponse(format!("group without queries: {}", info)))?;

        Ok(members
            .iter()
            .filter_map(|query| {
                let name = query.get("name")?.as_str()?;
                let id = query.get("id")?.as_i64()?;
                Some((name.to_string(), id))
            })
            .collect())
    }

    /// Delete a group together with all of its queries.
    pub async fn deep_delete(&mut self, group: &ResourceRef) -> Result<()> {
        let members: Vec<ResourceRef> = self
            .group_queries(group)
            .await?
            .into_values()
            .map(ResourceRef::Id)
            .collect();

        self.delete(group).await?;
        self.queries.delete_all(&members).await
    }
}

#[async_trait]
impl Resource for Groups {
    type Spec = GroupSpec;

    fn index(&self) -> &ResourceIndex {
        &self.index
    }

    fn index_mut(&mut self) -> &mut ResourceIndex {
        &mut self.index
    }

    fn spec_name(spec: &GroupSpec) -> &str {
        &spec.name
    }

    async fn fill(&self, spec: &GroupSpec) -> Result<Value> {
        require(&spec.name, "name")?;

        let queries = spec
            .queries
            .iter()
            .map(|query| {
                let id = self.queries.resolve(query)?;
                Ok(json!({
                    "name": self.queries.names().get(id).unwrap_or_default(),
                    "id": id,
                }))
            })
            .collect::<Result<Vec<_>>>()?;

        let project = self.index.project();
        let users = match &spec.users {
            Some(users) => users.clone(),
            None => vec![json!({"id": project.user().me().await?.id})],
        };

        let mut body = json!({
            "name": spec.new_name.as_ref().unwrap_or(&spec.name),
            "queries": queries,
            "shared": spec.shared.as_deref().unwrap_or("public"),
            "sharedProjectIds": spec
                .shared_project_ids
                .clone()
                .unwrap_or_else(|| vec![project.id()]),
            "users": users,
        });

        let reference = ResourceRef::from(spec.name.as_str());
        if self.exists(&reference)? {
            body["id"] = json!(self.resolve(&reference)?);
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_spec_builder() {
        let spec = GroupSpec::new("Brands", ["Apple", "Pear"]).shared("private");
        assert_eq!(
            spec.queries,
            vec![ResourceRef::from("Apple"), ResourceRef::from("Pear")]
        );
        assert_eq!(spec.shared.as_deref(), Some("private"));
        assert!(spec.users.is_none());
    }
}
