//! Signals: alerting on unusual activity in a set of queries.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::queries::Queries;
use super::{require, Endpoints, Resource, ResourceIndex, ResourceRef, UploadMode};
use crate::error::{Error, Result};
use crate::project::Project;

pub const SIGNAL_ENDPOINTS: Endpoints = Endpoints {
    list: "signals/groups",
    item: "signals/groups",
    resource_type: "signals",
};

/// Someone notified when a signal fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub email_address: String,
    /// 1 for all signals, 2 for medium and high priority, 3 for high only
    pub notification_threshold: u8,
}

impl Subscriber {
    pub fn new(email_address: impl Into<String>, notification_threshold: u8) -> Self {
        Self {
            email_address: email_address.into(),
            notification_threshold,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.email_address.trim().is_empty() || !(1..=3).contains(&self.notification_threshold) {
            return Err(Error::InvalidSetting(format!(
                "subscribers need an emailAddress and a notificationThreshold of 1 (all signals), \
                 2 (medium - high priority signals) or 3 (only high priority signals): {:?}",
                self
            )));
        }
        Ok(())
    }
}

/// A signal to upload.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalSpec {
    pub name: String,
    pub queries: Vec<ResourceRef>,
    pub subscribers: Vec<Subscriber>,
    /// Category and tag filters, by name (`category`, `xtag`, ...) or by
    /// id (`includeCategoryIds`, `excludeTagIds`, ...)
    pub filters: BTreeMap<String, Value>,
    pub new_name: Option<String>,
}

impl SignalSpec {
    pub fn new<I, R>(name: impl Into<String>, queries: I, subscribers: Vec<Subscriber>) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<ResourceRef>,
    {
        Self {
            name: name.into(),
            queries: queries.into_iter().map(Into::into).collect(),
            subscribers,
            filters: BTreeMap::new(),
            new_name: None,
        }
    }

    pub fn filter(mut self, attribute: impl Into<String>, setting: impl Into<Value>) -> Self {
        self.filters.insert(attribute.into(), setting.into());
        self
    }

    pub fn renamed(mut self, new_name: impl Into<String>) -> Self {
        self.new_name = Some(new_name.into());
        self
    }
}

/// Signals of a project.
#[derive(Debug, Clone)]
pub struct Signals {
    index: ResourceIndex,
    queries: Queries,
}

impl Signals {
    pub async fn load(project: Arc<Project>) -> Result<Self> {
        let index = ResourceIndex::load(project.clone(), SIGNAL_ENDPOINTS).await?;
        let queries = Queries::load(project).await?;
        Ok(Self { index, queries })
    }

    pub fn queries(&self) -> &Queries {
        &self.queries
    }

    pub async fn rename(&mut self, name: &str, new_name: &str) -> Result<()> {
        let info = self.get(Some(&ResourceRef::from(name))).await?;

        let queries: Vec<ResourceRef> = info
            .get("queryIds")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_i64).map(ResourceRef::Id).collect())
            .unwrap_or_default();
        let subscribers: Vec<Subscriber> = match info.get("subscribers") {
            Some(subscribers) => serde_json::from_value(subscribers.clone())?,
            None => Vec::new(),
        };

        let mut spec = SignalSpec::new(name, queries, subscribers).renamed(new_name);
        for attribute in [
            "includeCategoryIds",
            "excludeCategoryIds",
            "includeTagIds",
            "excludeTagIds",
        ] {
            if let Some(ids) = info.get(attribute).filter(|ids| ids.is_array()) {
                spec.filters.insert(attribute.to_string(), ids.clone());
            }
        }

        self.upload(spec, UploadMode::ModifyOnly).await?;
        Ok(())
    }

    /// Category and tag id fields for one filter. Unknown attributes
    /// contribute nothing.
    fn filter_ids(&self, attribute: &str, setting: &Value) -> Result<Option<(&'static str, Vec<i64>)>> {
        let categories = self.queries.categories();
        let tags = self.queries.tags();

        let field = match attribute {
            "includeCategoryIds" | "category" | "parentCategory" => "includeCategoryIds",
            "excludeCategoryIds" | "xcategory" | "xparentCategory" => "excludeCategoryIds",
            "includeTagIds" | "tag" => "includeTagIds",
            "excludeTagIds" | "xtag" => "excludeTagIds",
            _ => return Ok(None),
        };

        let ids = match attribute {
            "includeCategoryIds" | "excludeCategoryIds" => setting
                .as_array()
                .and_then(|ids| ids.iter().map(Value::as_i64).collect::<Option<Vec<_>>>())
                .ok_or_else(|| {
                    Error::InvalidSetting(format!(
                        "Must pass in ids with {} parameter, or use names and the appropriate \
                         category/xcategory or parentCategory/xparentCategory parameter.",
                        attribute
                    ))
                })?,
            "category" | "xcategory" => match setting {
                Value::Object(parents) => {
                    let mut ids = Vec::new();
                    for (parent, children) in parents {
                        for child in as_items(children) {
                            match child {
                                Value::Number(n) => ids.extend(n.as_i64()),
                                Value::String(child) => ids.push(categories.child_id(parent, child)?),
                                _ => return Err(invalid(attribute, setting)),
                            }
                        }
                    }
                    ids
                }
                _ => ints(attribute, setting)?,
            },
            "parentCategory" | "xparentCategory" => as_items(setting)
                .into_iter()
                .map(|category| match category {
                    Value::Number(n) => n.as_i64().ok_or_else(|| invalid(attribute, setting)),
                    Value::String(name) => categories.parent_id(name),
                    _ => Err(invalid(attribute, setting)),
                })
                .collect::<Result<_>>()?,
            _ => as_items(setting)
                .into_iter()
                .map(|tag| match tag {
                    Value::Number(n) => n.as_i64().ok_or_else(|| invalid(attribute, setting)),
                    Value::String(name) => tags.resolve(&ResourceRef::from(name.as_str())),
                    _ => Err(invalid(attribute, setting)),
                })
                .collect::<Result<_>>()?,
        };

        Ok(Some((field, ids)))
    }
}

fn as_items(setting: &Value) -> Vec<&Value> {
    match setting {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

fn ints(attribute: &str, setting: &Value) -> Result<Vec<i64>> {
    as_items(setting)
        .into_iter()
        .map(|v| v.as_i64().ok_or_else(|| invalid(attribute, setting)))
        .collect()
}

fn invalid(attribute: &str, setting: &Value) -> Error {
    Error::InvalidSetting(format!("invalid setting for {}: {}", attribute, setting))
}

#[async_trait]
impl Resource for Signals {
    type Spec = SignalSpec;

    fn index(&self) -> &ResourceIndex {
        &self.index
    }

    fn index_mut(&mut self) -> &mut ResourceIndex {
        &mut self.index
    }

    fn spec_name(spec: &SignalSpec) -> &str {
        &spec.name
    }

    async fn fill(&self, spec: &SignalSpec) -> Result<Value> {
        require(&spec.name, "name")?;
        if spec.queries.is_empty() {
            return Err(Error::MissingField("queries".to_string()));
        }
        if spec.subscribers.is_empty() {
            return Err(Error::MissingField("subscribers".to_string()));
        }
        for subscriber in &spec.subscribers {
            subscriber.validate()?;
        }

        let query_ids = spec
            .queries
            .iter()
            .map(|query| self.queries.resolve(query))
            .collect::<Result<Vec<_>>>()?;

        let mut body = json!({
            "name": spec.new_name.as_ref().unwrap_or(&spec.name),
            "queryIds": query_ids,
            "subscribers": spec.subscribers,
        });

        let mut id_fields: BTreeMap<&str, Vec<i64>> = BTreeMap::new();
        for (attribute, setting) in &spec.filters {
            if let Some((field, ids)) = self.filter_ids(attribute, setting)? {
                id_fields.entry(field).or_default().extend(ids);
            }
        }
        for (field, ids) in id_fields {
            body[field] = json!(ids);
        }

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
    fn test_subscriber_threshold_range() {
        assert!(Subscriber::new("a@example.com", 1).validate().is_ok());
        assert!(Subscriber::new("a@example.com", 3).validate().is_ok());
        assert!(Subscriber::new("a@example.com", 0).validate().is_err());
        assert!(Subscriber::new("a@example.com", 4).validate().is_err());
        assert!(Subscriber::new(" ", 2).validate().is_err());
    }

    #[test]
    fn test_subscriber_wire_format() {
        let value = serde_json::to_value(Subscriber::new("a@example.com", 2)).unwrap();
        assert_eq!(
            value,
            json!({"emailAddress": "a@example.com", "notificationThreshold": 2})
        );
    }

    #[test]
    fn test_ints() {
        assert_eq!(ints("tag", &json!([1, 2])).unwrap(), vec![1, 2]);
        assert_eq!(ints("tag", &json!(7)).unwrap(), vec![7]);
        assert!(ints("tag", &json!(["x"])).is_err());
    }
}
