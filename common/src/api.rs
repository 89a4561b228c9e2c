// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Backend objects and the tags attached to them

use serde::Deserialize;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use std::fmt;

/// A provenance marker attached to a backend object
#[derive(
    Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
pub struct Tag {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub tag: String,
}

impl Tag {
    pub fn new(scope: impl Into<String>, tag: impl Into<String>) -> Tag {
        Tag { scope: scope.into(), tag: tag.into() }
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.scope, self.tag)
    }
}

/// Matches a [`Tag`] by scope and, optionally, by value
///
/// The same predicate shape is used to decide whether an object was created
/// by the orchestrator (scope only) and to look up objects scoped to a
/// particular router or load balancer (scope and value).
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct TagPredicate {
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl TagPredicate {
    /// Matches any tag with the given scope.
    pub fn scope(scope: impl Into<String>) -> TagPredicate {
        TagPredicate { scope: scope.into(), tag: None }
    }

    /// Matches only the tag with this exact scope and value.
    pub fn exact(
        scope: impl Into<String>,
        tag: impl Into<String>,
    ) -> TagPredicate {
        TagPredicate { scope: scope.into(), tag: Some(tag.into()) }
    }

    pub fn matches(&self, tag: &Tag) -> bool {
        tag.scope == self.scope
            && self.tag.as_deref().map_or(true, |value| value == tag.tag)
    }
}

impl fmt::Display for TagPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}={}", self.scope, tag),
            None => write!(f, "{}=*", self.scope),
        }
    }
}

/// An object as returned by the backend
///
/// Only the fields the cleanup tooling cares about are broken out.  Everything
/// else is preserved in `extra` so that callers can get at type-specific
/// fields (e.g. `attachment` on logical ports) without a type per resource.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Resource {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<Tag>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Resource {
    pub fn new(id: impl Into<String>) -> Resource {
        Resource {
            id: id.into(),
            resource_type: None,
            display_name: None,
            path: None,
            tags: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn with_tag(mut self, tag: Tag) -> Resource {
        self.tags.push(tag);
        self
    }

    pub fn with_resource_type(mut self, resource_type: &str) -> Resource {
        self.resource_type = Some(resource_type.to_string());
        self
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Resource {
        self.extra.insert(key.to_string(), value);
        self
    }

    /// Returns true if any of this object's tags matches `predicate`.
    pub fn has_tag(&self, predicate: &TagPredicate) -> bool {
        self.tags.iter().any(|tag| predicate.matches(tag))
    }

    /// Returns true if this object's tags satisfy every one of `predicates`.
    pub fn has_all_tags(&self, predicates: &[TagPredicate]) -> bool {
        predicates.iter().all(|p| self.has_tag(p))
    }

    /// Returns the value of the first tag with the given scope.
    pub fn tag_value(&self, scope: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.scope == scope)
            .map(|tag| tag.tag.as_str())
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// The `attachment.attachment_type` of a Manager API logical port.
    pub fn attachment_type(&self) -> Option<&str> {
        self.extra
            .get("attachment")
            .and_then(|a| a.get("attachment_type"))
            .and_then(Value::as_str)
    }

    /// The `attachment.id` of a Manager API logical port.
    pub fn attachment_id(&self) -> Option<&str> {
        self.extra
            .get("attachment")
            .and_then(|a| a.get("id"))
            .and_then(Value::as_str)
    }
}

// The backend reports `"tags": null` for some objects that were never tagged.
fn deserialize_tags<'de, D>(deserializer: D) -> Result<Vec<Tag>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Tag>>::deserialize(deserializer)?.unwrap_or_default())
}

/// The body of a search-by-tags response
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SearchResults {
    #[serde(default)]
    pub results: Vec<Resource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}
