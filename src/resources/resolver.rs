//! Translation between resource names and ids inside filters and actions.
//!
//! Callers write `tag=["Urgent"]` or `category={"Brands": ["Apple"]}`;
//! the API wants ids. Values that already are ids pass through.

use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::categories::{Categories, CategorySpec};
use super::lists::{ListKind, ListResource};
use super::tags::{TagSpec, Tags};
use super::{Resource, ResourceRef, UploadMode};
use crate::error::{Error, Result};
use crate::filters;
use crate::project::Project;

/// Tags and categories of a project, used to resolve names to ids.
#[derive(Debug, Clone)]
pub struct NameResolver {
    project: Arc<Project>,
    tags: Tags,
    categories: Categories,
}

impl NameResolver {
    pub async fn load(project: Arc<Project>) -> Result<Self> {
        let tags = Tags::load(project.clone()).await?;
        let categories = Categories::load(project.clone()).await?;
        Ok(Self {
            project,
            tags,
            categories,
        })
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn tags_mut(&mut self) -> &mut Tags {
        &mut self.tags
    }

    pub fn categories(&self) -> &Categories {
        &self.categories
    }

    pub fn categories_mut(&mut self) -> &mut Categories {
        &mut self.categories
    }

    pub async fn reload(&mut self) -> Result<()> {
        self.tags.reload().await?;
        self.categories.reload().await
    }

    /// Replace names in a filter setting with ids.
    ///
    /// Unknown attributes are returned unchanged.
    pub async fn to_ids(&self, attribute: &str, setting: &Value) -> Result<Value> {
        if let Some(ids) = id_list(setting) {
            return Ok(json!(ids));
        }

        let ids: Vec<i64> = match attribute {
            "category" | "xcategory" => self.child_category_ids(setting)?,
            "parentCategory" | "xparentCategory" | "parentCategories" | "categories" => {
                names(attribute, setting)?
                    .into_iter()
                    .map(|name| self.categories.parent_id(name))
                    .collect::<Result<_>>()?
            }
            "tag" | "xtag" | "tags" => names(attribute, setting)?
                .into_iter()
                .map(|name| self.tags.resolve(&ResourceRef::from(name)))
                .collect::<Result<_>>()?,
            "authorGroup" | "xauthorGroup" => {
                self.list_ids(ListKind::Author, attribute, setting).await?
            }
            "siteGroup" | "xsiteGroup" => self.list_ids(ListKind::Site, attribute, setting).await?,
            "locationGroup"
            | "xlocationGroup"
            | "authorLocationGroup"
            | "xauthorLocationGroup" => {
                self.list_ids(ListKind::Location, attribute, setting).await?
            }
            _ => return Ok(setting.clone()),
        };

        Ok(json!(ids))
    }

    /// Replace ids in a setting with names, for human-readable output.
    pub async fn to_names(&self, attribute: &str, setting: &Value) -> Result<Value> {
        let Some(ids) = id_list(setting) else {
            return Ok(setting.clone());
        };

        match attribute {
            "tag" | "xtag" | "addTag" | "removeTag" => {
                let names = ids
                    .iter()
                    .map(|id| {
                        self.tags
                            .names()
                            .get(*id)
                            .map(String::from)
                            .ok_or_else(|| Error::not_found("tags", id))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(json!(names))
            }
            "category" | "xcategory" | "addCategories" | "removeCategories" => {
                let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
                for id in &ids {
                    let (parent, child) = self
                        .categories
                        .child_name(*id)
                        .ok_or_else(|| Error::not_found("categories", id))?;
                    grouped
                        .entry(parent.to_string())
                        .or_default()
                        .push(child.to_string());
                }
                Ok(json!(grouped))
            }
            "parentCategory" | "xparentCategory" | "parentCategories" | "categories" => {
                let names = ids
                    .iter()
                    .map(|id| {
                        self.categories
                            .parent_name(*id)
                            .map(String::from)
                            .ok_or_else(|| Error::not_found("categories", id))
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(json!(names))
            }
            "authorGroup" | "xauthorGroup" => self.list_names(ListKind::Author, &ids).await,
            "siteGroup" | "xsiteGroup" => self.list_names(ListKind::Site, &ids).await,
            "locationGroup"
            | "xlocationGroup"
            | "authorLocationGroup"
            | "xauthorLocationGroup" => self.list_names(ListKind::Location, &ids).await,
            _ => Ok(setting.clone()),
        }
    }

    /// Prepare a mutable action for a mention patch or rule.
    ///
    /// Tags named by `addTag` and categories named by `addCategories` are
    /// created when missing; category settings become child ids.
    pub async fn prepare_action(&mut self, action: &str, setting: Value) -> Result<Value> {
        let setting = match action {
            "addCategories" | "removeCategories" if setting.is_object() => {
                if action == "addCategories" {
                    let specs = category_specs(&setting)?;
                    self.categories
                        .upload_all(&specs, UploadMode::Upsert, false)
                        .await?;
                }
                json!(self.child_category_ids(&setting)?)
            }
            "addTag" => {
                let specs: Vec<TagSpec> = names(action, &setting)?
                    .into_iter()
                    .filter(|name| self.tags.names().ids_named(name).is_empty())
                    .map(TagSpec::new)
                    .collect();
                if !specs.is_empty() {
                    self.tags.upload_all(&specs, UploadMode::CreateOnly).await?;
                }
                setting
            }
            _ => setting,
        };

        filters::validate_action(action, &setting)?;
        Ok(setting)
    }

    /// Child ids for `{parent: [child, ...]}`.
    fn child_category_ids(&self, setting: &Value) -> Result<Vec<i64>> {
        let parents = setting.as_object().ok_or_else(|| {
            Error::InvalidSetting(format!(
                "categories must be given as {{parent: [children]}}, got {}",
                setting
            ))
        })?;

        let mut ids = Vec::new();
        for (parent, children) in parents {
            for child in names(parent, children)? {
                ids.push(self.categories.child_id(parent, child)?);
            }
        }
        Ok(ids)
    }

    async fn list_ids(&self, kind: ListKind, attribute: &str, setting: &Value) -> Result<Vec<i64>> {
        let lists = ListResource::load(self.project.clone(), kind).await?;
        names(attribute, setting)?
            .into_iter()
            .map(|name| lists.resolve(&ResourceRef::from(name)))
            .collect()
    }

    async fn list_names(&self, kind: ListKind, ids: &[i64]) -> Result<Value> {
        let lists = ListResource::load(self.project.clone(), kind).await?;
        let names = ids
            .iter()
            .map(|id| {
                lists
                    .names()
                    .get(*id)
                    .map(String::from)
                    .ok_or_else(|| Error::not_found(kind.endpoints().resource_type, id))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(json!(names))
    }
}

/// Integer ids in a setting: a number, or a list of integers or strings
/// that parse as integers.
fn id_list(setting: &Value) -> Option<Vec<i64>> {
    match setting {
        Value::Number(n) => n.as_i64().map(|id| vec![id]),
        Value::Array(items) if !items.is_empty() => items
            .iter()
            .map(|item| match item {
                Value::Number(n) => n.as_i64(),
                Value::String(s) => s.trim().parse().ok(),
                _ => None,
            })
            .collect(),
        _ => None,
    }
}

/// Names in a setting: a single string or a list of strings.
fn names<'a>(attribute: &str, setting: &'a Value) -> Result<Vec<&'a str>> {
    let invalid = || {
        Error::InvalidSetting(format!(
            "{} expects a name or a list of names, got {}",
            attribute, setting
        ))
    };

    match setting {
        Value::String(name) => Ok(vec![name.as_str()]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().ok_or_else(invalid))
            .collect(),
        _ => Err(invalid()),
    }
}

/// Category uploads for `{parent: [child, ...]}`.
fn category_specs(setting: &Value) -> Result<Vec<CategorySpec>> {
    let parents = setting
        .as_object()
        .ok_or_else(|| Error::InvalidSetting(format!("invalid categories {}", setting)))?;

    parents
        .iter()
        .map(|(parent, children)| {
            Ok(CategorySpec::new(
                parent.clone(),
                names(parent, children)?.into_iter().map(String::from),
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_list() {
        assert_eq!(id_list(&json!(5)), Some(vec![5]));
        assert_eq!(id_list(&json!([1, "2", 3])), Some(vec![1, 2, 3]));
        assert_eq!(id_list(&json!(["Urgent", 2])), None);
        assert_eq!(id_list(&json!("5")), None);
        assert_eq!(id_list(&json!([])), None);
    }

    #[test]
    fn test_names() {
        assert_eq!(names("tag", &json!("Urgent")).unwrap(), vec!["Urgent"]);
        assert_eq!(names("tag", &json!(["a", "b"])).unwrap(), vec!["a", "b"]);
        assert!(matches!(
            names("tag", &json!({"a": 1})),
            Err(Error::InvalidSetting(_))
        ));
    }

    #[test]
    fn test_category_specs() {
        let specs = category_specs(&json!({"Brands": ["Apple", "Pear"], "Tone": "Angry"})).unwrap();
        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "Brands");
        assert_eq!(specs[0].children, vec!["Apple", "Pear"]);
        assert_eq!(specs[1].children, vec!["Angry"]);
    }
}
