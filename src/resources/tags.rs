//! Project tags.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{require, Endpoints, Resource, ResourceIndex, ResourceRef, UploadMode};
use crate::error::Result;
use crate::project::Project;

pub const TAG_ENDPOINTS: Endpoints = Endpoints {
    list: "tags",
    item: "tags",
    resource_type: "tags",
};

/// A tag to create, or to rename when `new_name` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagSpec {
    pub name: String,
    pub new_name: Option<String>,
}

impl TagSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            new_name: None,
        }
    }

    pub fn renamed(mut self, new_name: impl Into<String>) -> Self {
        self.new_name = Some(new_name.into());
        self
    }
}

/// Tags of a project.
#[derive(Debug, Clone)]
pub struct Tags {
    index: ResourceIndex,
}

impl Tags {
    pub async fn load(project: Arc<Project>) -> Result<Self> {
        Ok(Self {
            index: ResourceIndex::load(project, TAG_ENDPOINTS).await?,
        })
    }

    pub async fn rename(&mut self, name: &str, new_name: &str) -> Result<()> {
        self.resolve(&ResourceRef::from(name))?;
        self.upload(TagSpec::new(name).renamed(new_name), UploadMode::ModifyOnly)
            .await?;
        Ok(())
    }

    /// Delete every tag in the project.
    pub async fn clear_all_in_project(&mut self) -> Result<()> {
        let all: Vec<ResourceRef> = self.names().ids().into_iter().map(ResourceRef::Id).collect();
        self.delete_all(&all).await
    }
}

#[async_trait]
impl Resource for Tags {
    type Spec = TagSpec;

    fn index(&self) -> &ResourceIndex {
        &self.index
    }

    fn index_mut(&mut self) -> &mut ResourceIndex {
        &mut self.index
    }

    fn spec_name(spec: &TagSpec) -> &str {
        &spec.name
    }

    async fn fill(&self, spec: &TagSpec) -> Result<Value> {
        require(&spec.name, "name")?;
        match &spec.new_name {
            Some(new_name) => {
                let id = self.resolve(&ResourceRef::from(spec.name.as_str()))?;
                Ok(json!({"id": id, "name": new_name}))
            }
            None => Ok(json!({"name": spec.name})),
        }
    }
}
