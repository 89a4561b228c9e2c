// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Removal of backend objects created by the orchestrator
//!
//! The orchestrator tags every object it creates on the backend (see
//! [`nsx_common::OS_API_VERSION_SCOPE`]).  The [`Reconciler`] finds those
//! objects with [`filter_owned()`], optionally narrowed to the ids the
//! orchestrator's own database still knows about, and deletes them category
//! by category in the order given by a [`CleanupPlan`].
//!
//! Deletes are attempted one object at a time.  An object that is already
//! gone counts as success.  Any other failure is recorded in the
//! [`CategoryReport`] and the remaining objects are still attempted, unless
//! the category's [`FailurePolicy`] says otherwise.

use nsx_common::ResourceType;

mod dhcp;
mod firewall;
mod load_balancers;
mod ownership;
mod plan;
mod qos;
mod reconciler;
mod report;
mod security_groups;
mod segments;
mod tier1;

pub use ownership::Narrowing;
pub use ownership::UUID_LEN;
pub use ownership::filter_owned;
pub use plan::Category;
pub use plan::CleanupPlan;
pub use plan::FailurePolicy;
pub use plan::PlanError;
pub use plan::PlanStep;
pub use reconciler::Reconciler;
pub use reconciler::ReconcilerConfig;
pub use report::CategoryReport;
pub use report::CleanupReport;
pub use report::ItemFailure;

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("failed to list {kind}")]
    List {
        kind: ResourceType,
        #[source]
        err: nsx_common::Error,
    },

    #[error("failed to delete {kind} {id}")]
    Delete {
        kind: ResourceType,
        id: String,
        #[source]
        err: nsx_common::Error,
    },

    #[error("invalid cleanup plan")]
    Plan(#[from] PlanError),
}
