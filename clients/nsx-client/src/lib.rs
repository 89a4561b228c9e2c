// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interface for making API requests to an NSX manager
//!
//! [`Backend`] is the narrow set of operations the cleanup tooling needs from
//! the backend.  [`Client`] implements it over HTTP; tests use an in-memory
//! implementation instead.

use async_trait::async_trait;
use nsx_common::Error;
use nsx_common::Resource;
use nsx_common::ResourceType;
use nsx_common::SearchResults;
use nsx_common::TagPredicate;

mod http;
mod search;

pub use http::Client;
pub use http::ClientConfig;
pub use http::DEFAULT_TIMEOUT;
pub use search::search_query;

/// Operations the backend exposes for every resource type
///
/// `parents` holds the ids of the objects enclosing the one being addressed,
/// outermost first, e.g. `[segment_id, port_id]` for a port profile binding
/// or `[domain_id]` for a group.  See
/// [`ResourceType::parent_count()`](nsx_common::ResourceType::parent_count).
#[async_trait]
pub trait Backend: Send + Sync {
    /// Whether Manager API (passthrough) resource types are reachable.
    fn allows_passthrough(&self) -> bool;

    /// Fetch the backend's version string.  Used to check connectivity and
    /// credentials before doing anything else.
    async fn version(&self) -> Result<String, Error>;

    async fn list(
        &self,
        kind: ResourceType,
        parents: &[&str],
    ) -> Result<Vec<Resource>, Error>;

    async fn get(
        &self,
        kind: ResourceType,
        parents: &[&str],
        id: &str,
    ) -> Result<Resource, Error>;

    async fn delete(
        &self,
        kind: ResourceType,
        parents: &[&str],
        id: &str,
    ) -> Result<(), Error>;

    /// Merge `body` into the object's current state.  A `null` value removes
    /// the field.
    async fn patch(
        &self,
        kind: ResourceType,
        parents: &[&str],
        id: &str,
        body: &serde_json::Value,
    ) -> Result<(), Error>;

    /// Find objects of type `kind` carrying every tag in `tags`.
    async fn search_by_tags(
        &self,
        kind: ResourceType,
        tags: &[TagPredicate],
    ) -> Result<SearchResults, Error>;
}
