//! Project rules.
//!
//! A rule applies one mutable action (add a tag, set priority, ...) to
//! every mention matching its filter, either across the whole project or
//! for the queries listed in the filter's `queryId`.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::queries::Queries;
use super::{require, Endpoints, Resource, ResourceIndex, ResourceRef};
use crate::error::{Error, Result};
use crate::filters::MentionFilters;
use crate::project::Project;
use crate::sdk::api_client::QueryParams;

pub const RULE_ENDPOINTS: Endpoints = Endpoints {
    list: "rules",
    item: "rules",
    resource_type: "rules",
};

/// Label used in rule summaries for project-wide rules.
pub const WHOLE_PROJECT: &str = "Whole Project";

/// A rule to upload.
///
/// Build `rule_action` with [`Rules::rule_action`] and `filter` with
/// [`Rules::filters`] so names are resolved and settings checked.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleSpec {
    pub name: String,
    pub rule_action: Map<String, Value>,
    pub filter: Map<String, Value>,
    /// Defaults to `true`
    pub enabled: Option<bool>,
    /// `"query"` or `"project"`; derived from the filter when unset
    pub scope: Option<String>,
    /// Apply the rule to already collected mentions after upload
    pub backfill: bool,
    pub project_name: Option<String>,
    pub query_name: Option<Value>,
    pub new_name: Option<String>,
}

impl RuleSpec {
    pub fn new(
        name: impl Into<String>,
        rule_action: Map<String, Value>,
        filter: Map<String, Value>,
    ) -> Self {
        Self {
            name: name.into(),
            rule_action,
            filter,
            enabled: None,
            scope: None,
            backfill: false,
            project_name: None,
            query_name: None,
            new_name: None,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn backfill(mut self, backfill: bool) -> Self {
        self.backfill = backfill;
        self
    }

    pub fn renamed(mut self, new_name: impl Into<String>) -> Self {
        self.new_name = Some(new_name.into());
        self
    }

    fn effective_scope(&self) -> &str {
        match &self.scope {
            Some(scope) => scope,
            None if self.filter.contains_key("queryId") => "query",
            None => "project",
        }
    }
}

/// Rules of a project, with the queries, tags and categories their
/// filters and actions refer to.
#[derive(Debug, Clone)]
pub struct Rules {
    index: ResourceIndex,
    queries: Queries,
}

impl Rules {
    pub async fn load(project: Arc<Project>) -> Result<Self> {
        let index = ResourceIndex::load(project.clone(), RULE_ENDPOINTS).await?;
        let queries = Queries::load(project).await?;
        Ok(Self { index, queries })
    }

    pub fn queries(&self) -> &Queries {
        &self.queries
    }

    /// Checked `{action: setting}` for a rule.
    ///
    /// Tags and categories the action adds are created when missing.
    pub async fn rule_action(&mut self, action: &str, setting: Value) -> Result<Map<String, Value>> {
        let setting = self
            .queries
            .resolver_mut()
            .prepare_action(action, setting)
            .await?;

        let mut rule_action = Map::new();
        rule_action.insert(action.to_string(), setting);
        Ok(rule_action)
    }

    /// Rule filter with names resolved to ids.
    ///
    /// An empty `queries` slice makes a project-wide filter.
    pub async fn filters(
        &self,
        queries: &[ResourceRef],
        filters: &MentionFilters,
    ) -> Result<Map<String, Value>> {
        let mut filter = Map::new();
        if !queries.is_empty() {
            let ids = queries
                .iter()
                .map(|query| self.queries.resolve(query))
                .collect::<Result<Vec<_>>>()?;
            filter.insert("queryId".to_string(), json!(ids));
        }

        for (attribute, setting) in filters.iter() {
            let setting = self.queries.resolver().to_ids(attribute, setting).await?;
            filter.insert(attribute.clone(), setting);
        }
        Ok(filter)
    }

    /// Human-readable rules: query names, filters and the action with
    /// ids replaced by names. `None` summarises every rule.
    pub async fn summaries(&self, rule: Option<&ResourceRef>) -> Result<Vec<Value>> {
        let rules = match rule {
            Some(rule) => vec![self.get(Some(rule)).await?],
            None => {
                let response = self.index.fetch(None).await?;
                response
                    .get("results")
                    .and_then(Value::as_array)
                    .cloned()
                    .ok_or_else(|| {
                        Error::UnexpectedResponse(format!("Could not retrieve rules: {}", response))
                    })?
            }
        };

        let mut summaries = Vec::with_capacity(rules.len());
        for rule in &rules {
            summaries.push(self.summarize(rule).await?);
        }
        Ok(summaries)
    }

    async fn summarize(&self, rule: &Value) -> Result<Value> {
        let resolver = self.queries.resolver();
        let empty = Map::new();
        let filter = rule.get("filter").and_then(Value::as_object).unwrap_or(&empty);

        let query_names = match filter.get("queryId").and_then(Value::as_array) {
            Some(ids) => json!(ids
                .iter()
                .filter_map(Value::as_i64)
                .map(|id| {
                    self.queries
                        .names()
                        .get(id)
                        .map(String::from)
                        .ok_or_else(|| Error::not_found("queries", id))
                })
                .collect::<Result<Vec<_>>>()?),
            None => json!(WHOLE_PROJECT),
        };

        let mut filters = Map::new();
        filters.insert("queryName".to_string(), query_names);
        for (attribute, setting) in filter {
            if attribute == "queryId" || setting.is_null() {
                continue;
            }
            filters.insert(attribute.clone(), resolver.to_names(attribute, setting).await?);
        }

        let mut action = Map::new();
        if let Some(rule_action) = rule.get("ruleAction").and_then(Value::as_object) {
            if let Some((name, setting)) = rule_action.iter().find(|(_, v)| !v.is_null()) {
                action.insert("action".to_string(), json!(name));
                action.insert("setting".to_string(), resolver.to_names(name, setting).await?);
            }
        }

        Ok(json!({
            "name": rule.get("name").cloned().unwrap_or(Value::Null),
            "filter": filters,
            "ruleAction": action,
        }))
    }

    /// Apply a rule to mentions collected before it existed.
    pub async fn backfill(&self, rule_id: i64) -> Result<Value> {
        let response = self
            .index
            .project()
            .post(
                &format!("bulkactions/rule/{}", rule_id),
                &QueryParams::new(),
                None,
            )
            .await?;
        info!("Backfill of rule {} requested", rule_id);
        Ok(response)
    }

    pub async fn rename(&mut self, name: &str, new_name: &str) -> Result<()> {
        let reference = ResourceRef::from(name);
        let id = self.resolve(&reference)?;
        let info = self.get(Some(&reference)).await?;

        let rule_action = info
            .get("ruleAction")
            .and_then(Value::as_object)
            .map(|action| {
                action
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();
        let filter = info
            .get("filter")
            .and_then(Value::as_object)
            .map(|filter| {
                filter
                    .iter()
                    .filter(|(_, v)| !v.is_null())
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default();

        let mut spec = RuleSpec::new(name, rule_action, filter).renamed(new_name);
        spec.enabled = info.get("enabled").and_then(Value::as_bool);
        spec.scope = info.get("scope").and_then(Value::as_str).map(String::from);

        let body = self.fill(&spec).await?;
        self.index.replace(id, &body).await?;
        Ok(())
    }

    /// Delete every rule in the project.
    pub async fn clear_all_in_project(&mut self) -> Result<()> {
        let all: Vec<ResourceRef> = self.names().ids().into_iter().map(ResourceRef::Id).collect();
        self.delete_all(&all).await
    }
}

#[async_trait]
impl Resource for Rules {
    type Spec = RuleSpec;

    fn index(&self) -> &ResourceIndex {
        &self.index
    }

    fn index_mut(&mut self) -> &mut ResourceIndex {
        &mut self.index
    }

    fn spec_name(spec: &RuleSpec) -> &str {
        &spec.name
    }

    async fn fill(&self, spec: &RuleSpec) -> Result<Value> {
        require(&spec.name, "name")?;
        if spec.rule_action.is_empty() {
            return Err(Error::MissingField("ruleAction".to_string()));
        }

        let project = self.index.project();
        let mut filter = spec.filter.clone();
        filter.insert("projectId".to_string(), json!(project.id()));

        if let Some(search) = filter.get("search").and_then(Value::as_str) {
            project
                .user()
                .validate_rule_search(search, &["en".to_string()])
                .await?;
        }

        let mut body = json!({
            "name": spec.new_name.as_ref().unwrap_or(&spec.name),
            "enabled": spec.enabled.unwrap_or(true),
            "filter": filter,
            "ruleAction": spec.rule_action,
            "projectId": project.id(),
            "scope": spec.effective_scope(),
        });

        let reference = ResourceRef::from(spec.name.as_str());
        if self.exists(&reference)? {
            body["id"] = json!(self.resolve(&reference)?);
            body["projectName"] = json!(spec.project_name.as_deref().unwrap_or(project.name()));
            body["queryName"] = spec.query_name.clone().unwrap_or(Value::Null);
        }
        Ok(body)
    }

    async fn after_upload(
        &mut self,
        specs: &[RuleSpec],
        uploaded: &BTreeMap<String, i64>,
    ) -> Result<()> {
        for spec in specs.iter().filter(|spec| spec.backfill) {
            let name = spec.new_name.as_ref().unwrap_or(&spec.name);
            if let Some(id) = uploaded.get(name) {
                self.backfill(*id).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_scope_follows_filter() {
        let mut action = Map::new();
        action.insert("addTag".to_string(), json!(["Urgent"]));

        let project_wide = RuleSpec::new("r", action.clone(), Map::new());
        assert_eq!(project_wide.effective_scope(), "project");

        let mut filter = Map::new();
        filter.insert("queryId".to_string(), json!([1]));
        let per_query = RuleSpec::new("r", action.clone(), filter);
        assert_eq!(per_query.effective_scope(), "query");

        let explicit = RuleSpec::new("r", action, Map::new()).scope("query");
        assert_eq!(explicit.effective_scope(), "query");
    }
}
