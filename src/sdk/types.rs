//! SDK-specific types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Reference to a vendor resource, by numeric id or by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceRef {
    Id(i64),
    Name(String),
}

impl ResourceRef {
    /// Numeric id when this is an id, or a name that parses as one.
    pub fn as_numeric(&self) -> Option<i64> {
        match self {
            Self::Id(id) => Some(*id),
            Self::Name(name) => name.trim().parse().ok(),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{}", id),
            Self::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<i64> for ResourceRef {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for ResourceRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ResourceRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&String> for ResourceRef {
    fn from(name: &String) -> Self {
        Self::Name(name.clone())
    }
}

/// Project record as returned by `GET projects`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub billable_client_id: Option<i64>,
    #[serde(default)]
    pub billable_client_name: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    /// Fields this SDK does not model
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The authenticated user, as returned by `GET me`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: i64,
    pub username: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response from the `oauth/token` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Paged listing envelope shared by most collection endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse<T> {
    pub results: Vec<T>,
    #[serde(default)]
    pub results_total: Option<i64>,
    #[serde(default)]
    pub results_page: Option<i64>,
    #[serde(default)]
    pub results_page_size: Option<i64>,
}

/// A single mention returned by the data endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mention {
    pub query_id: i64,
    pub resource_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_ref_conversions() {
        assert_eq!(ResourceRef::from(42), ResourceRef::Id(42));
        assert_eq!(
            ResourceRef::from("My Query"),
            ResourceRef::Name("My Query".to_string())
        );
        assert_eq!(ResourceRef::from("1234").as_numeric(), Some(1234));
        assert_eq!(ResourceRef::from("My Query").as_numeric(), None);
        assert_eq!(ResourceRef::Id(7).to_string(), "7");
    }

    #[test]
    fn test_resource_ref_untagged() {
        let id: ResourceRef = serde_json::from_value(json!(12)).unwrap();
        assert_eq!(id, ResourceRef::Id(12));

        let name: ResourceRef = serde_json::from_value(json!("Brand")).unwrap();
        assert_eq!(name, ResourceRef::Name("Brand".to_string()));
    }

    #[test]
    fn test_project_info_keeps_unknown_fields() {
        let project: ProjectInfo = serde_json::from_value(json!({
            "id": 0,
            "name": "Example project",
            "description": "",
            "billableClientId": 0,
            "billableClientName": "My company",
            "timezone": "Africa/Abidjan",
            "billableClientIsPitch": false
        }))
        .unwrap();

        assert_eq!(project.name, "Example project");
        assert_eq!(project.timezone.as_deref(), Some("Africa/Abidjan"));
        assert_eq!(project.extra["billableClientIsPitch"], json!(false));
    }

    #[test]
    fn test_mention_deserialization() {
        let mention: Mention = serde_json::from_value(json!({
            "queryId": 1111111111,
            "resourceId": "abc123",
            "title": "Hello"
        }))
        .unwrap();

        assert_eq!(mention.query_id, 1111111111);
        assert_eq!(mention.resource_id, "abc123");
        assert_eq!(mention.extra["title"], json!("Hello"));
    }
}
