// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Types shared between the NSX backend client, the cleanup reconciler and
//! the tooling built on top of them.
//!
//! The central type is [`api::Resource`], a backend object together with the
//! tags that record which orchestrator created it.  [`resource_type`]
//! describes every class of backend object the cleanup tooling knows how to
//! find and delete, including where it lives in the backend's REST namespace
//! and which other classes it depends on.

pub mod api;
pub mod error;
pub mod resource_type;

pub use api::Resource;
pub use api::SearchResults;
pub use api::Tag;
pub use api::TagPredicate;
pub use error::Error;
pub use resource_type::Api;
pub use resource_type::ResourceType;

/// Tag scope stamped on every backend object the orchestrator creates.
pub const OS_API_VERSION_SCOPE: &str = "os-api-version";

/// Tag scope linking firewall groups and services to the router they serve.
pub const ROUTER_ID_SCOPE: &str = "os-neutron-router-id";

/// Tag scope linking firewall groups and services to a load balancer.
pub const LB_ID_SCOPE: &str = "os-lbaas-lb-id";

/// Tag scope linking passthrough logical ports to their network.
pub const NETWORK_ID_SCOPE: &str = "os-neutron-net-id";

/// The policy domain holding orchestrator security resources by default.
pub const DEFAULT_DOMAIN: &str = "default";
