// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Reshaping orchestrator objects so they can be recreated elsewhere
//!
//! A migration driver reads objects (networks, ports, load balancers and so
//! on) from the source deployment and recreates them on the destination.
//! What the source returns is not what the destination accepts: read-only
//! fields must go, some values must be rewritten and some combinations of
//! settings are not allowed.  [`Transformer::prepare()`] turns one source
//! object into a body suitable for a create call.  It does no I/O.
//!
//! Tags cannot be set at creation time; [`replay_tags()`] applies them
//! afterwards.

mod drop_fields;
mod kind;
mod prepare;
mod rules;
mod tags;

pub use drop_fields::DropTable;
pub use kind::ResourceKind;
pub use prepare::DEFAULT_INTERNAL_NETWORK_PREFIX;
pub use prepare::DEFAULT_MAX_ADDRESS_PAIRS;
pub use prepare::PrepareError;
pub use prepare::PrepareOptions;
pub use prepare::Transformer;
pub use tags::TagEndpoint;
pub use tags::TagFailure;
pub use tags::TagReplayError;
pub use tags::TagReplayReport;
pub use tags::replay_tags;
pub use tags::tags_of;
