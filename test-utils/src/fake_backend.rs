// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory [`Backend`] for exercising cleanup logic without a manager
//!
//! The fake enforces the two constraints of the real backend that matter to
//! cleanup ordering:
//!
//! * an object cannot be deleted while objects it contains still exist, and
//! * an object cannot be deleted while another object refers to its `path`
//!   (or, for Manager API objects, to its id).
//!
//! Both are reported as [`Error::InUse`].  Individual operations can also be
//! made to fail on purpose with the `fail_*` methods.

use async_trait::async_trait;
use nsx_client::Backend;
use nsx_common::Api;
use nsx_common::Error;
use nsx_common::OS_API_VERSION_SCOPE;
use nsx_common::Resource;
use nsx_common::ResourceType;
use nsx_common::SearchResults;
use nsx_common::Tag;
use nsx_common::TagPredicate;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::MutexGuard;

/// The value of the provenance tag on objects built by [`owned()`]
pub const FAKE_API_VERSION: &str = "2024.1";

/// An object tagged as created by the orchestrator
pub fn owned(id: &str) -> Resource {
    Resource::new(id).with_tag(Tag::new(OS_API_VERSION_SCOPE, FAKE_API_VERSION))
}

/// An object the orchestrator did not create
pub fn foreign(id: &str) -> Resource {
    Resource::new(id).with_tag(Tag::new("created-by", "someone-else"))
}

#[derive(Clone, Debug, Eq, Ord, PartialEq, PartialOrd)]
struct ObjectKey {
    kind: ResourceType,
    parents: Vec<String>,
    id: String,
}

impl ObjectKey {
    fn new(kind: ResourceType, parents: &[&str], id: &str) -> ObjectKey {
        ObjectKey {
            kind,
            parents: parents.iter().map(|p| p.to_string()).collect(),
            id: id.to_string(),
        }
    }

    /// Would `other` be contained in the object named by this key?
    fn contains(&self, other: &ObjectKey) -> bool {
        other.kind.parent() == Some(self.kind)
            && other.parents.len() == self.parents.len() + 1
            && other.parents[..self.parents.len()] == self.parents[..]
            && other.parents[self.parents.len()] == self.id
    }
}

#[derive(Default)]
struct Inner {
    objects: BTreeMap<ObjectKey, Resource>,
    deleted: Vec<(ResourceType, String)>,
    patched: Vec<(ResourceType, String)>,
    delete_failures: BTreeMap<(ResourceType, String), Error>,
    patch_failures: BTreeMap<(ResourceType, String), Error>,
    list_failures: BTreeMap<ResourceType, Error>,
    version_failure: Option<Error>,
}

pub struct FakeBackend {
    allow_passthrough: bool,
    inner: Mutex<Inner>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        FakeBackend::new()
    }
}

impl FakeBackend {
    pub fn new() -> FakeBackend {
        FakeBackend { allow_passthrough: true, inner: Mutex::default() }
    }

    pub fn without_passthrough() -> FakeBackend {
        FakeBackend { allow_passthrough: false, inner: Mutex::default() }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panicking test thread is the only way to poison this.
        self.inner.lock().unwrap()
    }

    /// Store `resource` as an object of type `kind` inside `parents`.
    ///
    /// `resource_type` and (for Policy API types) `path` are filled in when
    /// missing.  Returns the object's path.
    pub fn insert(
        &self,
        kind: ResourceType,
        parents: &[&str],
        mut resource: Resource,
    ) -> String {
        assert_eq!(
            parents.len(),
            kind.parent_count(),
            "wrong number of parents for {kind}"
        );
        let path = resource
            .path
            .clone()
            .unwrap_or_else(|| object_path(kind, parents, &resource.id));
        if kind.api() == Api::Policy && resource.path.is_none() {
            resource.path = Some(path.clone());
        }
        if resource.resource_type.is_none() {
            resource.resource_type = Some(kind.backend_type().to_string());
        }
        let key = ObjectKey::new(kind, parents, &resource.id);
        self.lock().objects.insert(key, resource);
        path
    }

    /// Make every delete of this object fail with `error`.
    pub fn fail_delete(&self, kind: ResourceType, id: &str, error: Error) {
        self.lock().delete_failures.insert((kind, id.to_string()), error);
    }

    /// Make every patch of this object fail with `error`.
    pub fn fail_patch(&self, kind: ResourceType, id: &str, error: Error) {
        self.lock().patch_failures.insert((kind, id.to_string()), error);
    }

    /// Make every list of (and search for) `kind` fail with `error`.
    pub fn fail_list(&self, kind: ResourceType, error: Error) {
        self.lock().list_failures.insert(kind, error);
    }

    pub fn fail_version(&self, error: Error) {
        self.lock().version_failure = Some(error);
    }

    pub fn contains(
        &self,
        kind: ResourceType,
        parents: &[&str],
        id: &str,
    ) -> bool {
        self.lock().objects.contains_key(&ObjectKey::new(kind, parents, id))
    }

    /// Current state of one object
    pub fn object(
        &self,
        kind: ResourceType,
        parents: &[&str],
        id: &str,
    ) -> Option<Resource> {
        self.lock().objects.get(&ObjectKey::new(kind, parents, id)).cloned()
    }

    /// Ids of every stored object of type `kind`, whatever its parents
    pub fn ids(&self, kind: ResourceType) -> Vec<String> {
        self.lock()
            .objects
            .keys()
            .filter(|key| key.kind == kind)
            .map(|key| key.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.lock().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Successful deletes so far, in the order they happened
    pub fn deleted(&self) -> Vec<(ResourceType, String)> {
        self.lock().deleted.clone()
    }

    /// Successful patches so far, in the order they happened
    pub fn patched(&self) -> Vec<(ResourceType, String)> {
        self.lock().patched.clone()
    }

    fn check_access(
        &self,
        kind: ResourceType,
        parents: &[&str],
    ) -> Result<(), Error> {
        if kind.api() == Api::Manager && !self.allow_passthrough {
            return Err(Error::PassthroughDisabled(kind));
        }
        if parents.len() != kind.parent_count() {
            return Err(Error::WrongParentCount {
                kind,
                expected: kind.parent_count(),
                got: parents.len(),
            });
        }
        Ok(())
    }
}

fn object_path(kind: ResourceType, parents: &[&str], id: &str) -> String {
    let mut collection = String::new();
    let mut parents = parents.iter();
    for (i, piece) in kind.collection_template().split("{}").enumerate() {
        if i > 0 {
            collection.push_str(parents.next().copied().unwrap_or_default());
        }
        collection.push_str(piece);
    }
    format!("/{collection}/{id}")
}

fn refers_to(value: &Value, target: &str) -> bool {
    match value {
        Value::String(s) => s == target,
        Value::Array(items) => items.iter().any(|v| refers_to(v, target)),
        Value::Object(map) => map.values().any(|v| refers_to(v, target)),
        _ => false,
    }
}

fn merge_fields(current: &mut Value, changes: &Value) {
    let (Value::Object(current), Value::Object(changes)) = (current, changes)
    else {
        return;
    };
    for (key, value) in changes {
        if value.is_null() {
            current.remove(key);
        } else {
            current.insert(key.clone(), value.clone());
        }
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn allows_passthrough(&self) -> bool {
        self.allow_passthrough
    }

    async fn version(&self) -> Result<String, Error> {
        match &self.lock().version_failure {
            Some(error) => Err(error.clone()),
            None => Ok(String::from("4.1.2.0.0.22589037")),
        }
    }

    async fn list(
        &self,
        kind: ResourceType,
        parents: &[&str],
    ) -> Result<Vec<Resource>, Error> {
        self.check_access(kind, parents)?;
        let inner = self.lock();
        if let Some(error) = inner.list_failures.get(&kind) {
            return Err(error.clone());
        }
        Ok(inner
            .objects
            .iter()
            .filter(|(key, _)| key.kind == kind && key.parents == parents)
            .map(|(_, resource)| resource.clone())
            .collect())
    }

    async fn get(
        &self,
        kind: ResourceType,
        parents: &[&str],
        id: &str,
    ) -> Result<Resource, Error> {
        self.check_access(kind, parents)?;
        self.lock()
            .objects
            .get(&ObjectKey::new(kind, parents, id))
            .cloned()
            .ok_or_else(|| Error::not_found(kind, id))
    }

    async fn delete(
        &self,
        kind: ResourceType,
        parents: &[&str],
        id: &str,
    ) -> Result<(), Error> {
        self.check_access(kind, parents)?;
        let mut inner = self.lock();
        let key = ObjectKey::new(kind, parents, id);
        let Some(resource) = inner.objects.get(&key) else {
            return Err(Error::not_found(kind, id));
        };
        if let Some(error) = inner.delete_failures.get(&(kind, id.to_string()))
        {
            return Err(error.clone());
        }

        if let Some(child) = inner.objects.keys().find(|k| key.contains(k)) {
            return Err(Error::in_use(
                kind,
                id,
                &format!("still contains {} {}", child.kind, child.id),
            ));
        }

        // Manager API objects are referred to by id, Policy ones by path.
        let target = match kind.api() {
            Api::Manager => id.to_string(),
            Api::Policy => resource.path.clone().unwrap_or_default(),
        };
        let referrer = inner.objects.iter().find(|(other, resource)| {
            **other != key
                && resource.extra.values().any(|v| refers_to(v, &target))
        });
        if let Some((other, _)) = referrer {
            return Err(Error::in_use(
                kind,
                id,
                &format!("referenced by {} {}", other.kind, other.id),
            ));
        }

        inner.objects.remove(&key);
        inner.deleted.push((kind, id.to_string()));
        Ok(())
    }

    async fn patch(
        &self,
        kind: ResourceType,
        parents: &[&str],
        id: &str,
        body: &Value,
    ) -> Result<(), Error> {
        self.check_access(kind, parents)?;
        let mut inner = self.lock();
        if let Some(error) = inner.patch_failures.get(&(kind, id.to_string()))
        {
            return Err(error.clone());
        }
        let key = ObjectKey::new(kind, parents, id);
        let Some(resource) = inner.objects.get_mut(&key) else {
            return Err(Error::not_found(kind, id));
        };
        let mut current = serde_json::to_value(&*resource)
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        merge_fields(&mut current, body);
        *resource = serde_json::from_value(current)
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;
        inner.patched.push((kind, id.to_string()));
        Ok(())
    }

    async fn search_by_tags(
        &self,
        kind: ResourceType,
        tags: &[TagPredicate],
    ) -> Result<SearchResults, Error> {
        if kind.api() == Api::Manager && !self.allow_passthrough {
            return Err(Error::PassthroughDisabled(kind));
        }
        let inner = self.lock();
        if let Some(error) = inner.list_failures.get(&kind) {
            return Err(error.clone());
        }
        let results: Vec<Resource> = inner
            .objects
            .iter()
            .filter(|(key, resource)| {
                key.kind == kind && resource.has_all_tags(tags)
            })
            .map(|(_, resource)| resource.clone())
            .collect();
        Ok(SearchResults {
            result_count: Some(results.len() as u64),
            results,
            cursor: None,
        })
    }
}
