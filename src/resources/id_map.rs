//! Id to name lookup table kept by every resource manager.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::sdk::types::ResourceRef;

/// Resource names keyed by resource id.
///
/// Ids are unique; names are not, so looking a name up can be ambiguous.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdNameMap(BTreeMap<i64, String>);

impl IdNameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the table from a listing's `results` array.
    pub fn from_results(results: &[Value]) -> Result<Self> {
        results
            .iter()
            .map(|resource| {
                let id = resource.get("id").and_then(Value::as_i64).ok_or_else(|| {
                    Error::UnexpectedResponse(format!("resource without an id: {}", resource))
                })?;
                let name = resource
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                Ok((id, name))
            })
            .collect()
    }

    pub fn insert(&mut self, id: i64, name: impl Into<String>) {
        self.0.insert(id, name.into());
    }

    pub fn get(&self, id: i64) -> Option<&str> {
        self.0.get(&id).map(String::as_str)
    }

    pub fn contains_id(&self, id: i64) -> bool {
        self.0.contains_key(&id)
    }

    /// Every id whose name is exactly `name`.
    pub fn ids_named(&self, name: &str) -> Vec<i64> {
        self.0
            .iter()
            .filter(|(_, n)| n.as_str() == name)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.0.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (i64, &str)> {
        self.0.iter().map(|(id, name)| (*id, name.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Resolve a reference to an id.
    ///
    /// A name matching several resources is an ambiguity error. A name
    /// matching nothing is retried as a numeric id before giving up.
    pub fn resolve(&self, reference: &ResourceRef, resource_type: &str) -> Result<i64> {
        let id = match reference {
            ResourceRef::Id(id) => *id,
            ResourceRef::Name(name) => {
                let matches = self.ids_named(name);
                match matches.as_slice() {
                    [id] => return Ok(*id),
                    [] => name
                        .trim()
                        .parse::<i64>()
                        .map_err(|_| Error::not_found(resource_type, name))?,
                    _ => {
                        return Err(Error::AmbiguousResource {
                            name: name.clone(),
                            ids: matches,
                        })
                    }
                }
            }
        };

        if self.contains_id(id) {
            Ok(id)
        } else {
            Err(Error::not_found(resource_type, id))
        }
    }
}

impl FromIterator<(i64, String)> for IdNameMap {
    fn from_iter<I: IntoIterator<Item = (i64, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
