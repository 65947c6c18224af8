//! Site, author and location lists.
//!
//! The three list kinds share one REST shape (`group/<kind>`) and differ
//! only in the field that carries their items.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::{require, Endpoints, Resource, ResourceIndex, ResourceRef, UploadMode};
use crate::error::{Error, Result};
use crate::project::Project;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    /// Domains, e.g. `cnn.com`
    Site,
    /// Author handles
    Author,
    /// Location ids such as `usa.ny`
    Location,
}

impl ListKind {
    pub fn endpoints(self) -> Endpoints {
        match self {
            ListKind::Site => Endpoints {
                list: "group/site/summary",
                item: "group/site",
                resource_type: "sitelists",
            },
            ListKind::Author => Endpoints {
                list: "group/author/summary",
                item: "group/author",
                resource_type: "authorlists",
            },
            ListKind::Location => Endpoints {
                list: "group/location/summary",
                item: "group/location",
                resource_type: "locationlists",
            },
        }
    }

    /// Body field holding the list items.
    pub fn items_field(self) -> &'static str {
        match self {
            ListKind::Site => "domains",
            ListKind::Author => "authors",
            ListKind::Location => "locations",
        }
    }
}

/// A list to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSpec {
    pub name: String,
    /// Domains, author names or location records depending on the kind
    pub items: Vec<Value>,
    pub shared: Option<String>,
    pub shared_project_ids: Option<Vec<i64>>,
    pub new_name: Option<String>,
}

impl ListSpec {
    pub fn new<I, V>(name: impl Into<String>, items: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            name: name.into(),
            items: items.into_iter().map(Into::into).collect(),
            shared: None,
            shared_project_ids: None,
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

    pub fn renamed(mut self, new_name: impl Into<String>) -> Self {
        self.new_name = Some(new_name.into());
        self
    }
}

/// Lists of one kind visible to a project.
#[derive(Debug, Clone)]
pub struct ListResource {
    kind: ListKind,
    index: ResourceIndex,
}

impl ListResource {
    pub async fn load(project: Arc<Project>, kind: ListKind) -> Result<Self> {
        Ok(Self {
            kind,
            index: ResourceIndex::load(project, kind.endpoints()).await?,
        })
    }

    pub async fn sites(project: Arc<Project>) -> Result<Self> {
        Self::load(project, ListKind::Site).await
    }

    pub async fn authors(project: Arc<Project>) -> Result<Self> {
        Self::load(project, ListKind::Author).await
    }

    pub async fn locations(project: Arc<Project>) -> Result<Self> {
        Self::load(project, ListKind::Location).await
    }

    pub fn kind(&self) -> ListKind {
        self.kind
    }

    /// Items currently stored in a list.
    pub async fn items(&self, list: &ResourceRef) -> Result<Vec<Value>> {
        let info = self.get(Some(list)).await?;
        Ok(info
            .get(self.kind.items_field())
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default())
    }

    /// Append items to an existing list, skipping ones already present.
    pub async fn add_items(&mut self, name: &str, items: &[Value]) -> Result<()> {
        let mut merged = self.items(&ResourceRef::from(name)).await?;
        for item in items {
            if !merged.contains(item) {
                merged.push(item.clone());
            }
        }
        self.upload(ListSpec::new(name, merged), UploadMode::ModifyOnly)
            .await?;
        Ok(())
    }

    pub async fn rename(&mut self, name: &str, new_name: &str) -> Result<()> {
        let info = self.get(Some(&ResourceRef::from(name))).await?;
        let items = info
            .get(self.kind.items_field())
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut spec = ListSpec::new(name, items).renamed(new_name);
        spec.shared = info.get("shared").and_then(Value::as_str).map(String::from);
        spec.shared_project_ids = info
            .get("sharedProjectIds")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).collect());

        self.upload(spec, UploadMode::ModifyOnly).await?;
        Ok(())
    }
}

#[async_trait]
impl Resource for ListResource {
    type Spec = ListSpec;

    fn index(&self) -> &ResourceIndex {
        &self.index
    }

    fn index_mut(&mut self) -> &mut ResourceIndex {
        &mut self.index
    }

    fn spec_name(spec: &ListSpec) -> &str {
        &spec.name
    }

    async fn fill(&self, spec: &ListSpec) -> Result<Value> {
        require(&spec.name, "name")?;
        if spec.items.is_empty() {
            return Err(Error::MissingField(self.kind.items_field().to_string()));
        }

        let project = self.index.project();
        let me = project.user().me().await?;

        let mut body = json!({
            "name": spec.new_name.as_ref().unwrap_or(&spec.name),
            "shared": spec.shared.as_deref().unwrap_or("public"),
            "sharedProjectIds": spec
                .shared_project_ids
                .clone()
                .unwrap_or_else(|| vec![project.id()]),
            "userName": project.user().username(),
            "userId": me.id,
        });
        body[self.kind.items_field()] = json!(spec.items);

        let reference = ResourceRef::from(spec.name.as_str());
        if self.exists(&reference)? {
            body["id"] = json!(self.resolve(&reference)?);
        }
        Ok(body)
    }
}
