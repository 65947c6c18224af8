//! User and project handles.
//!
//! A [`User`] owns the authenticated HTTP client. A [`Project`] wraps a
//! user and scopes every request under `projects/<id>/`.

mod user;

pub use user::{AuthOptions, User};

use serde_json::Value;

use crate::error::{Error, Result};
use crate::sdk::api_client::QueryParams;
use crate::sdk::types::{ProjectInfo, ResourceRef};

/// A Brandwatch project, the container that scopes queries, groups,
/// tags, categories and the other resources.
#[derive(Debug, Clone)]
pub struct Project {
    user: User,
    info: ProjectInfo,
    address: String,
}

impl Project {
    /// Bind an authenticated user to a project given by id or name.
    ///
    /// Names that parse as integers are matched against project ids.
    pub async fn connect(user: User, project: impl Into<ResourceRef>) -> Result<Self> {
        let project = project.into();
        let projects = user.projects().await?;

        let numeric = project.as_numeric();
        let info = projects
            .into_iter()
            .find(|p| match (&project, numeric) {
                (_, Some(id)) => p.id == id,
                (ResourceRef::Name(name), None) => &p.name == name,
                (ResourceRef::Id(_), None) => false,
            })
            .ok_or_else(|| Error::ProjectNotFound(project.to_string()))?;

        Ok(Self::from_parts(user, info))
    }

    /// Authenticate and bind to a project in one step.
    pub async fn open(options: AuthOptions, project: impl Into<ResourceRef>) -> Result<Self> {
        let user = User::connect(options).await?;
        Self::connect(user, project).await
    }

    /// Build a project handle from an already known project record.
    pub fn from_parts(user: User, info: ProjectInfo) -> Self {
        let address = format!("projects/{}/", info.id);
        Self {
            user,
            info,
            address,
        }
    }

    pub fn id(&self) -> i64 {
        self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn info(&self) -> &ProjectInfo {
        &self.info
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    /// Path prefix for project-level calls (`projects/<id>/`).
    pub fn address(&self) -> &str {
        &self.address
    }

    fn endpoint(&self, endpoint: &str) -> String {
        format!("{}{}", self.address, endpoint.trim_start_matches('/'))
    }

    /// Project-level GET. `endpoint` is relative to the project address.
    pub async fn get(&self, endpoint: &str, params: &QueryParams) -> Result<Value> {
        self.user.client().get(&self.endpoint(endpoint), params).await
    }

    pub async fn post(&self, endpoint: &str, params: &QueryParams, body: Option<&Value>) -> Result<Value> {
        self.user
            .client()
            .post(&self.endpoint(endpoint), params, body)
            .await
    }

    pub async fn put(&self, endpoint: &str, params: &QueryParams, body: Option<&Value>) -> Result<Value> {
        self.user
            .client()
            .put(&self.endpoint(endpoint), params, body)
            .await
    }

    pub async fn patch(&self, endpoint: &str, params: &QueryParams, body: Option<&Value>) -> Result<Value> {
        self.user
            .client()
            .patch(&self.endpoint(endpoint), params, body)
            .await
    }

    pub async fn delete(&self, endpoint: &str, params: &QueryParams) -> Result<Value> {
        self.user
            .client()
            .delete(&self.endpoint(endpoint), params)
            .await
    }
}
