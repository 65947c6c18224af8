//! Mention filter and mutation vocabulary.
//!
//! Data calls accept filters such as `sentiment=positive` or
//! `tag=["Urgent"]`; mention patches and rule actions accept a mutable
//! action with a setting. Both are checked here before anything is sent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Expected JSON shape of a filter value or action setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    Str,
    Int,
    Bool,
    List,
    /// A single value or a list of them
    ScalarOrList,
    /// `{parent: [child, ...]}` or an already resolved id list
    CategoryMap,
}

impl Shape {
    fn accepts(self, value: &Value) -> bool {
        match self {
            Shape::Str => value.is_string(),
            Shape::Int => value.is_i64() || value.is_u64(),
            Shape::Bool => value.is_boolean(),
            Shape::List => value.is_array(),
            Shape::ScalarOrList => {
                value.is_array() || value.is_string() || value.is_number()
            }
            Shape::CategoryMap => value.is_object() || value.is_array() || value.is_number(),
        }
    }
}

/// Filter parameters accepted by the data endpoints.
const PARAMS: &[(&str, Shape)] = &[
    ("search", Shape::Str),
    ("author", Shape::ScalarOrList),
    ("xauthor", Shape::ScalarOrList),
    ("exactAuthor", Shape::ScalarOrList),
    ("xexactAuthor", Shape::ScalarOrList),
    ("authorGroup", Shape::ScalarOrList),
    ("xauthorGroup", Shape::ScalarOrList),
    ("siteGroup", Shape::ScalarOrList),
    ("xsiteGroup", Shape::ScalarOrList),
    ("locationGroup", Shape::ScalarOrList),
    ("xlocationGroup", Shape::ScalarOrList),
    ("authorLocationGroup", Shape::ScalarOrList),
    ("xauthorLocationGroup", Shape::ScalarOrList),
    ("category", Shape::CategoryMap),
    ("xcategory", Shape::CategoryMap),
    ("parentCategory", Shape::ScalarOrList),
    ("xparentCategory", Shape::ScalarOrList),
    ("tag", Shape::ScalarOrList),
    ("xtag", Shape::ScalarOrList),
    ("sentiment", Shape::ScalarOrList),
    ("pageType", Shape::ScalarOrList),
    ("xpageType", Shape::ScalarOrList),
    ("gender", Shape::ScalarOrList),
    ("language", Shape::ScalarOrList),
    ("xlanguage", Shape::ScalarOrList),
    ("location", Shape::ScalarOrList),
    ("xlocation", Shape::ScalarOrList),
    ("domain", Shape::ScalarOrList),
    ("xdomain", Shape::ScalarOrList),
    ("impactMin", Shape::Int),
    ("impactMax", Shape::Int),
    ("twitterFollowersMin", Shape::Int),
    ("twitterFollowersMax", Shape::Int),
    ("twitterVerified", Shape::Bool),
    ("starred", Shape::Bool),
    ("checked", Shape::Bool),
    ("priority", Shape::ScalarOrList),
    ("status", Shape::ScalarOrList),
    ("assigned", Shape::ScalarOrList),
    ("accountType", Shape::ScalarOrList),
    ("profession", Shape::ScalarOrList),
    ("interest", Shape::ScalarOrList),
    ("orderBy", Shape::Str),
    ("orderDirection", Shape::Str),
    ("endDate", Shape::Str),
    ("page", Shape::Int),
    ("pageSize", Shape::Int),
    ("limit", Shape::Int),
    ("dim1Args", Shape::ScalarOrList),
    ("dim2Args", Shape::ScalarOrList),
];

/// Closed value sets for some filter parameters.
const SPECIAL_OPTIONS: &[(&str, &[&str])] = &[
    ("sentiment", &["positive", "negative", "neutral"]),
    (
        "pageType",
        &[
            "blog", "forum", "news", "general", "video", "twitter", "review", "image",
            "instagram", "facebook",
        ],
    ),
    (
        "xpageType",
        &[
            "blog", "forum", "news", "general", "video", "twitter", "review", "image",
            "instagram", "facebook",
        ],
    ),
    ("gender", &["male", "female"]),
    ("orderDirection", &["asc", "desc"]),
    ("priority", &["high", "medium", "low"]),
    ("status", &["open", "pending", "closed"]),
];

/// Actions that can be applied to mentions and used as rule actions.
const MUTABLE: &[(&str, Shape)] = &[
    ("addTag", Shape::List),
    ("removeTag", Shape::List),
    ("addCategories", Shape::List),
    ("removeCategories", Shape::List),
    ("priority", Shape::Str),
    ("removePriority", Shape::Str),
    ("status", Shape::Str),
    ("removeStatus", Shape::Str),
    ("assignment", Shape::Str),
    ("removeAssignment", Shape::Str),
    ("sentiment", Shape::Str),
    ("checked", Shape::Bool),
    ("starred", Shape::Bool),
    ("location", Shape::Str),
];

/// Closed value sets for mutable actions.
const MUTABLE_OPTIONS: &[(&str, &[&str])] = &[
    ("sentiment", &["positive", "negative", "neutral"]),
    ("priority", &["high", "medium", "low"]),
    ("removePriority", &["high", "medium", "low"]),
    ("status", &["open", "pending", "closed"]),
    ("removeStatus", &["open", "pending", "closed"]),
];

fn lookup<T: Copy>(table: &[(&str, T)], key: &str) -> Option<T> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn within_options(value: &Value, options: &[&str]) -> bool {
    match value {
        Value::String(s) => options.contains(&s.as_str()),
        Value::Array(items) => items.iter().all(|item| within_options(item, options)),
        _ => false,
    }
}

/// Check a data filter. Unknown parameters are passed through unchecked.
pub fn validate_param(name: &str, value: &Value) -> Result<()> {
    if let Some(shape) = lookup(PARAMS, name) {
        if !shape.accepts(value) {
            return Err(Error::InvalidSetting(format!(
                "invalid input for given parameter {}: {}",
                name, value
            )));
        }
    }
    if let Some(options) = lookup(SPECIAL_OPTIONS, name) {
        if !within_options(value, options) {
            return Err(Error::InvalidSetting(format!(
                "{} must be one of {:?}, got {}",
                name, options, value
            )));
        }
    }
    Ok(())
}

/// True if `action` can be applied to mentions or used in a rule.
pub fn is_mutable(action: &str) -> bool {
    lookup(MUTABLE, action).is_some()
}

/// Check a mutable action and its setting.
pub fn validate_action(action: &str, setting: &Value) -> Result<()> {
    let shape = lookup(MUTABLE, action)
        .ok_or_else(|| Error::InvalidSetting(format!("invalid action {}", action)))?;

    if !shape.accepts(setting) {
        return Err(Error::InvalidSetting(format!(
            "invalid setting for {}: {}",
            action, setting
        )));
    }
    if let Some(options) = lookup(MUTABLE_OPTIONS, action) {
        if !within_options(setting, options) {
            return Err(Error::InvalidSetting(format!(
                "{} must be one of {:?}, got {}",
                action, options, setting
            )));
        }
    }
    Ok(())
}

/// Filters for a data call, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MentionFilters(BTreeMap<String, Value>);

impl MentionFilters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter, replacing any previous value for `name`.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.0.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Value)> for MentionFilters {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validate_param_shapes() {
        assert!(validate_param("search", &json!("brandwatch")).is_ok());
        assert!(validate_param("search", &json!(["a", "b"])).is_err());
        assert!(validate_param("impactMin", &json!(10)).is_ok());
        assert!(validate_param("impactMin", &json!("10")).is_err());
        assert!(validate_param("starred", &json!(true)).is_ok());
        assert!(validate_param("category", &json!({"Brands": ["Apple"]})).is_ok());
    }

    #[test]
    fn test_validate_param_options() {
        assert!(validate_param("sentiment", &json!("positive")).is_ok());
        assert!(validate_param("sentiment", &json!(["positive", "neutral"])).is_ok());
        assert!(validate_param("sentiment", &json!("ecstatic")).is_err());
        assert!(validate_param("orderDirection", &json!("sideways")).is_err());
    }

    #[test]
    fn test_unknown_params_pass_through() {
        assert!(validate_param("someNewVendorFilter", &json!({"x": 1})).is_ok());
    }

    #[test]
    fn test_validate_action() {
        assert!(validate_action("addTag", &json!(["Urgent"])).is_ok());
        assert!(validate_action("addTag", &json!("Urgent")).is_err());
        assert!(validate_action("priority", &json!("high")).is_ok());
        assert!(validate_action("priority", &json!("urgent")).is_err());
        assert!(validate_action("starred", &json!(true)).is_ok());
        assert!(validate_action("explode", &json!(true)).is_err());

        assert!(is_mutable("removeCategories"));
        assert!(!is_mutable("search"));
    }

    #[test]
    fn test_mention_filters_builder() {
        let filters = MentionFilters::new()
            .with("sentiment", "positive")
            .with("pageSize", 100)
            .with("sentiment", "negative");

        assert_eq!(filters.get("sentiment"), Some(&json!("negative")));
        assert_eq!(filters.iter().count(), 2);
    }
}
