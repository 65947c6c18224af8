//! Project queries.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::resolver::NameResolver;
use super::tags::Tags;
use super::{require, Categories, Endpoints, Resource, ResourceIndex, ResourceRef, UploadMode};
use crate::error::{Error, Result};
use crate::project::Project;
use crate::sdk::api_client::QueryParams;

pub const QUERY_ENDPOINTS: Endpoints = Endpoints {
    list: "queries",
    item: "queries",
    resource_type: "queries",
};

pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_QUERY_TYPE: &str = "search string";
pub const DEFAULT_INDUSTRY: &str = "general-(recommended)";
pub const DEFAULT_SAMPLE_PERCENT: u32 = 100;

/// A search-string query to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuerySpec {
    pub name: String,
    /// Boolean search string
    pub included_terms: String,
    /// Defaults to `["en"]` when empty
    pub languages: Vec<String>,
    pub query_type: Option<String>,
    pub industry: Option<String>,
    pub sample_percent: Option<u32>,
    pub language_agnostic: Option<bool>,
    pub description: Option<String>,
    pub new_name: Option<String>,
    /// Backfill start date (`YYYY-MM-DD`) applied after upload
    pub backfill_date: Option<String>,
}

impl QuerySpec {
    pub fn new(name: impl Into<String>, included_terms: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            included_terms: included_terms.into(),
            languages: Vec::new(),
            query_type: None,
            industry: None,
            sample_percent: None,
            language_agnostic: None,
            description: None,
            new_name: None,
            backfill_date: None,
        }
    }

    pub fn languages<I, S>(mut self, languages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.languages = languages.into_iter().map(Into::into).collect();
        self
    }

    pub fn query_type(mut self, query_type: impl Into<String>) -> Self {
        self.query_type = Some(query_type.into());
        self
    }

    pub fn industry(mut self, industry: impl Into<String>) -> Self {
        self.industry = Some(industry.into());
        self
    }

    pub fn sample_percent(mut self, percent: u32) -> Self {
        self.sample_percent = Some(percent);
        self
    }

    pub fn language_agnostic(mut self, agnostic: bool) -> Self {
        self.language_agnostic = Some(agnostic);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn renamed(mut self, new_name: impl Into<String>) -> Self {
        self.new_name = Some(new_name.into());
        self
    }

    pub fn backfill_date(mut self, date: impl Into<String>) -> Self {
        self.backfill_date = Some(date.into());
        self
    }

    fn effective_languages(&self) -> Vec<String> {
        if self.languages.is_empty() {
            vec![DEFAULT_LANGUAGE.to_string()]
        } else {
            self.languages.clone()
        }
    }
}

/// How to find a single mention inside a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionLookup {
    Url(String),
    ResourceId(String),
}

/// Queries of a project, with the tags and categories their data
/// filters refer to.
#[derive(Debug, Clone)]
pub struct Queries {
    index: ResourceIndex,
    resolver: NameResolver,
}

impl Queries {
    pub async fn load(project: Arc<Project>) -> Result<Self> {
        let index = ResourceIndex::load(project.clone(), QUERY_ENDPOINTS).await?;
        let resolver = NameResolver::load(project).await?;
        Ok(Self { index, resolver })
    }

    pub fn project(&self) -> &Arc<Project> {
        self.index.project()
    }

    pub fn resolver(&self) -> &NameResolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut NameResolver {
        &mut self.resolver
    }

    pub fn tags(&self) -> &Tags {
        self.resolver.tags()
    }

    pub fn categories(&self) -> &Categories {
        self.resolver.categories()
    }

    /// Upload queries and backfill all of them from `backfill_date`.
    pub async fn upload_all_with_backfill(
        &mut self,
        specs: &[QuerySpec],
        mode: UploadMode,
        backfill_date: &str,
    ) -> Result<BTreeMap<String, i64>> {
        let specs: Vec<QuerySpec> = specs
            .iter()
            .cloned()
            .map(|spec| spec.backfill_date(backfill_date))
            .collect();
        self.upload_all(&specs, mode).await
    }

    /// Re-collect a query's mentions from `min_date` (`YYYY-MM-DD`).
    pub async fn backfill(&self, query_id: i64, min_date: &str) -> Result<Value> {
        let body = json!({"minDate": min_date, "queryId": query_id});
        let response = self
            .project()
            .post(
                &format!("queries/{}/backfill", query_id),
                &QueryParams::new(),
                Some(&body),
            )
            .await?;
        info!("Backfill of query {} from {} requested", query_id, min_date);
        Ok(response)
    }

    /// Rename a search-string query, keeping its definition.
    pub async fn rename(&mut self, name: &str, new_name: &str) -> Result<()> {
        let reference = ResourceRef::from(name);
        let id = self.resolve(&reference)?;
        let info = self.get(Some(&reference)).await?;

        let query_type = info.get("type").and_then(Value::as_str).unwrap_or_default();
        if query_type != DEFAULT_QUERY_TYPE {
            return Err(Error::Unsupported(
                "We cannot support automated renaming of channels at this time.".to_string(),
            ));
        }

        let mut body = json!({"id": id, "name": new_name});
        for field in [
            "includedTerms",
            "languages",
            "type",
            "industry",
            "samplePercent",
            "languageAgnostic",
            "description",
        ] {
            if let Some(value) = info.get(field) {
                body[field] = value.clone();
            }
        }

        self.index.replace(id, &body).await?;
        info!("queries {} renamed to {}", name, new_name);
        Ok(())
    }

    /// A single mention of a query, found by url or resource id.
    pub async fn get_mention(&self, query: &ResourceRef, lookup: &MentionLookup) -> Result<Value> {
        let id = self.resolve(query)?;
        let params = match lookup {
            MentionLookup::Url(url) => QueryParams::new().with("url", url),
            MentionLookup::ResourceId(resource_id) => {
                QueryParams::new().with("resourceId", resource_id)
            }
        };

        let response = self
            .project()
            .get(&format!("query/{}/mentionfind", id), &params)
            .await?;

        response.get("mention").cloned().ok_or_else(|| {
            Error::UnexpectedResponse(format!("mention lookup returned {}", response))
        })
    }
}

#[async_trait]
impl Resource for Queries {
    type Spec = QuerySpec;

    fn index(&self) -> &ResourceIndex {
        &self.index
    }

    fn index_mut(&mut self) -> &mut ResourceIndex {
        &mut self.index
    }

    fn spec_name(spec: &QuerySpec) -> &str {
        &spec.name
    }

    async fn fill(&self, spec: &QuerySpec) -> Result<Value> {
        require(&spec.name, "name")?;
        require(&spec.included_terms, "includedTerms")?;

        let languages = spec.effective_languages();
        self.project()
            .user()
            .validate_query_search(&spec.included_terms, &languages)
            .await?;

        let mut body = json!({
            "name": spec.new_name.as_ref().unwrap_or(&spec.name),
            "includedTerms": spec.included_terms,
            "languages": languages,
            "type": spec.query_type.as_deref().unwrap_or(DEFAULT_QUERY_TYPE),
            "industry": spec.industry.as_deref().unwrap_or(DEFAULT_INDUSTRY),
            "samplePercent": spec.sample_percent.unwrap_or(DEFAULT_SAMPLE_PERCENT),
            "languageAgnostic": spec.language_agnostic.unwrap_or(false),
        });
        if let Some(description) = &spec.description {
            body["description"] = json!(description);
        }

        let reference = ResourceRef::from(spec.name.as_str());
        if self.exists(&reference)? {
            body["id"] = json!(self.resolve(&reference)?);
        }
        Ok(body)
    }

    async fn after_upload(
        &mut self,
        specs: &[QuerySpec],
        uploaded: &BTreeMap<String, i64>,
    ) -> Result<()> {
        for spec in specs {
            let Some(date) = &spec.backfill_date else {
                continue;
            };
            let name = spec.new_name.as_ref().unwrap_or(&spec.name);
            if let Some(id) = uploaded.get(name) {
                self.backfill(*id, date).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_spec_defaults() {
        let spec = QuerySpec::new("Brand", "brandwatch");
        assert_eq!(spec.effective_languages(), vec!["en"]);
        assert!(spec.query_type.is_none());

        let spec = spec.languages(["en", "fr"]).sample_percent(50);
        assert_eq!(spec.effective_languages(), vec!["en", "fr"]);
        assert_eq!(spec.sample_percent, Some(50));
    }
}
