//! Project categories.
//!
//! Categories are two-level: a parent category owns child categories, and
//! mentions are tagged with children. The local table is keyed by parent
//! name because filters and actions refer to `{parent: [child, ...]}`.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::{require, UploadMode};
use crate::error::{Error, Result};
use crate::project::Project;
use crate::sdk::api_client::QueryParams;

const CATEGORIES: &str = "categories";

/// One parent category with its children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub id: i64,
    pub multiple: bool,
    /// Child name to child id
    pub children: BTreeMap<String, i64>,
}

/// A category to upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySpec {
    pub name: String,
    pub children: Vec<String>,
    /// Whether a mention may carry several children at once
    pub multiple: Option<bool>,
    pub new_name: Option<String>,
}

impl CategorySpec {
    pub fn new<I, S>(name: impl Into<String>, children: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            children: children.into_iter().map(Into::into).collect(),
            multiple: None,
            new_name: None,
        }
    }

    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = Some(multiple);
        self
    }

    pub fn renamed(mut self, new_name: impl Into<String>) -> Self {
        self.new_name = Some(new_name.into());
        self
    }
}

/// What to delete: a whole parent category, or some of its children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CategoryDeletion {
    Category(String),
    Children { name: String, children: Vec<String> },
}

/// Categories of a project.
#[derive(Debug, Clone)]
pub struct Categories {
    project: Arc<Project>,
    ids: BTreeMap<String, CategoryEntry>,
}

impl Categories {
    pub async fn load(project: Arc<Project>) -> Result<Self> {
        let mut categories = Self {
            project,
            ids: BTreeMap::new(),
        };
        categories.reload().await?;
        Ok(categories)
    }

    /// Refresh the category table from the server.
    pub async fn reload(&mut self) -> Result<()> {
        let response = self.project.get(CATEGORIES, &QueryParams::new()).await?;
        let results = response
            .get("results")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                Error::UnexpectedResponse(format!("Could not retrieve categories: {}", response))
            })?;

        self.ids = results
            .iter()
            .map(parse_category)
            .collect::<Result<BTreeMap<_, _>>>()?;
        Ok(())
    }

    pub fn ids(&self) -> &BTreeMap<String, CategoryEntry> {
        &self.ids
    }

    pub fn get(&self, name: &str) -> Option<&CategoryEntry> {
        self.ids.get(name)
    }

    pub fn parent_id(&self, name: &str) -> Result<i64> {
        self.ids
            .get(name)
            .map(|entry| entry.id)
            .ok_or_else(|| Error::not_found("categories", name))
    }

    pub fn child_id(&self, parent: &str, child: &str) -> Result<i64> {
        self.ids
            .get(parent)
            .and_then(|entry| entry.children.get(child))
            .copied()
            .ok_or_else(|| Error::not_found("categories", format!("{}/{}", parent, child)))
    }

    /// Parent name of a parent category id.
    pub fn parent_name(&self, id: i64) -> Option<&str> {
        self.ids
            .iter()
            .find(|(_, entry)| entry.id == id)
            .map(|(name, _)| name.as_str())
    }

    /// `(parent, child)` names of a child category id.
    pub fn child_name(&self, id: i64) -> Option<(&str, &str)> {
        self.ids.iter().find_map(|(parent, entry)| {
            entry
                .children
                .iter()
                .find(|(_, child_id)| **child_id == id)
                .map(|(child, _)| (parent.as_str(), child.as_str()))
        })
    }

    pub async fn upload(
        &mut self,
        spec: CategorySpec,
        mode: UploadMode,
        overwrite_children: bool,
    ) -> Result<BTreeMap<String, CategoryEntry>> {
        self.upload_all(std::slice::from_ref(&spec), mode, overwrite_children)
            .await
    }

    /// Create or update categories.
    ///
    /// Existing categories gain any new children; with `overwrite_children`
    /// their child list is replaced instead. Returns the uploaded entries
    /// keyed by their final name.
    pub async fn upload_all(
        &mut self,
        specs: &[CategorySpec],
        mode: UploadMode,
        overwrite_children: bool,
    ) -> Result<BTreeMap<String, CategoryEntry>> {
        for spec in specs {
            require(&spec.name, "name")?;
            if spec.children.is_empty() {
                return Err(Error::MissingField("children".to_string()));
            }

            match self.ids.get(&spec.name) {
                Some(existing) if mode != UploadMode::CreateOnly => {
                    let has_new_children = spec
                        .children
                        .iter()
                        .any(|child| !existing.children.contains_key(child));

                    if has_new_children || overwrite_children {
                        let mut children = spec.children.clone();
                        if !overwrite_children {
                            for child in existing.children.keys() {
                                if !children.contains(child) {
                                    children.push(child.clone());
                                }
                            }
                        }
                        let body = self.fill(spec, &children);
                        self.put(existing.id, &body).await?;
                    } else if spec.new_name.is_some() {
                        let body = self.fill(spec, &spec.children);
                        self.put(existing.id, &body).await?;
                    }
                }
                None if mode != UploadMode::ModifyOnly => {
                    let body = self.fill(spec, &spec.children);
                    self.project
                        .post(CATEGORIES, &QueryParams::new(), Some(&body))
                        .await?;
                    info!("Uploading categories {}", spec.name);
                }
                _ => {}
            }
        }

        self.reload().await?;

        Ok(specs
            .iter()
            .filter_map(|spec| {
                let name = spec.new_name.as_ref().unwrap_or(&spec.name);
                self.ids.get(name).map(|entry| (name.clone(), entry.clone()))
            })
            .collect())
    }

    pub async fn rename(&mut self, name: &str, new_name: &str) -> Result<()> {
        let entry = self
            .ids
            .get(name)
            .ok_or_else(|| Error::not_found("categories", name))?;
        let spec = CategorySpec::new(name, entry.children.keys().cloned())
            .multiple(entry.multiple)
            .renamed(new_name);
        self.upload(spec, UploadMode::ModifyOnly, false).await?;
        Ok(())
    }

    pub async fn delete(&mut self, target: CategoryDeletion) -> Result<()> {
        self.delete_all(std::slice::from_ref(&target)).await
    }

    /// Delete categories, or only some children of a category.
    ///
    /// Categories that do not exist are skipped.
    pub async fn delete_all(&mut self, targets: &[CategoryDeletion]) -> Result<()> {
        for target in targets {
            match target {
                CategoryDeletion::Category(name) => {
                    if let Some(entry) = self.ids.get(name) {
                        self.project
                            .delete(&format!("{}/{}", CATEGORIES, entry.id), &QueryParams::new())
                            .await?;
                        info!("categories {} deleted", name);
                    }
                }
                CategoryDeletion::Children { name, children } => {
                    if let Some(entry) = self.ids.get(name) {
                        let remaining: Vec<String> = entry
                            .children
                            .keys()
                            .filter(|child| !children.contains(child))
                            .cloned()
                            .collect();
                        let spec = CategorySpec::new(name.clone(), remaining.clone())
                            .multiple(entry.multiple);
                        let body = self.fill(&spec, &remaining);
                        self.put(entry.id, &body).await?;
                        info!("Children {:?} of categories {} deleted", children, name);
                    }
                }
            }
        }

        self.reload().await
    }

    /// Delete every category in the project.
    pub async fn clear_all_in_project(&mut self) -> Result<()> {
        let all: Vec<CategoryDeletion> = self
            .ids
            .keys()
            .cloned()
            .map(CategoryDeletion::Category)
            .collect();
        self.delete_all(&all).await
    }

    async fn put(&self, id: i64, body: &Value) -> Result<Value> {
        let response = self
            .project
            .put(&format!("{}/{}", CATEGORIES, id), &QueryParams::new(), Some(body))
            .await?;
        let name = body.get("name").and_then(Value::as_str).unwrap_or_default();
        info!("Uploading categories {}", name);
        Ok(response)
    }

    /// Request body for `spec` with the given children; known children
    /// keep their ids.
    fn fill(&self, spec: &CategorySpec, children: &[String]) -> Value {
        let existing = self.ids.get(&spec.name);
        let multiple = spec
            .multiple
            .or_else(|| existing.map(|entry| entry.multiple))
            .unwrap_or(true);

        let children: Vec<Value> = children
            .iter()
            .map(|child| {
                let id = existing.and_then(|entry| entry.children.get(child));
                json!({"name": child, "id": id})
            })
            .collect();

        let mut body = json!({
            "name": spec.new_name.as_ref().unwrap_or(&spec.name),
            "multiple": multiple,
            "children": children,
        });
        if let Some(entry) = existing {
            body["id"] = json!(entry.id);
        }
        body
    }
}

fn parse_category(category: &Value) -> Result<(String, CategoryEntry)> {
    let unexpected = || Error::UnexpectedResponse(format!("malformed category: {}", category));

    let name = category
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(unexpected)?;
    let id = category.get("id").and_then(Value::as_i64).ok_or_else(unexpected)?;
    let multiple = category
        .get("multiple")
        .and_then(Value::as_bool)
        .unwrap_or(true);

    let children = category
        .get("children")
        .and_then(Value::as_array)
        .map(|children| {
            children
                .iter()
                .filter_map(|child| {
                    let name = child.get("name")?.as_str()?;
                    let id = child.get("id")?.as_i64()?;
                    Some((name.to_string(), id))
                })
                .collect()
        })
        .unwrap_or_default();

    Ok((
        name.to_string(),
        CategoryEntry {
            id,
            multiple,
            children,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_category() {
        let (name, entry) = parse_category(&json!({
            "id": 10,
            "name": "Brands",
            "multiple": false,
            "children": [{"id": 11, "name": "Apple"}, {"id": 12, "name": "Pear"}]
        }))
        .unwrap();

        assert_eq!(name, "Brands");
        assert_eq!(entry.id, 10);
        assert!(!entry.multiple);
        assert_eq!(entry.children.get("Pear"), Some(&12));
    }

    #[test]
    fn test_parse_category_requires_id() {
        assert!(parse_category(&json!({"name": "Brands"})).is_err());
    }

    #[test]
    fn test_category_spec_builder() {
        let spec = CategorySpec::new("Brands", ["Apple", "Pear"])
            .multiple(false)
            .renamed("Fruit");
        assert_eq!(spec.children, vec!["Apple", "Pear"]);
        assert_eq!(spec.multiple, Some(false));
        assert_eq!(spec.new_name.as_deref(), Some("Fruit"));
    }
}
