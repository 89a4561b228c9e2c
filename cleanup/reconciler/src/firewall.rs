// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Firewall objects created on behalf of routers and load balancers
//!
//! The orchestrator backs router and load balancer firewalling with a
//! gateway policy plus groups and services tagged with the owning router
//! or load balancer.  A group or service may be shared by several gateways,
//! in which case the backend refuses to delete it until the last user is
//! gone.  That is expected here, so "in use" is not treated as a failure.

use crate::ReconcileError;
use crate::reconciler::CategoryRun;
use nsx_common::ResourceType;
use nsx_common::TagPredicate;
use slog::debug;
use slog::warn;

/// Delete every gateway policy, group and service tagged with `scope`
pub(crate) async fn clean_tagged_firewall(
    run: &CategoryRun<'_>,
    scope: &TagPredicate,
) -> Result<(), ReconcileError> {
    let in_domain = [run.domain()];
    for kind in [
        ResourceType::GatewayPolicy,
        ResourceType::Group,
        ResourceType::Service,
    ] {
        let found = run
            .backend()
            .search_by_tags(kind, std::slice::from_ref(scope))
            .await
            .map_err(|err| ReconcileError::List { kind, err })?;
        for resource in found.results {
            // groups and gateway policies live in the domain
            let parents: &[&str] = match kind.parent_count() {
                0 => &[],
                _ => &in_domain,
            };
            delete_shared(run, kind, parents, &resource.id).await;
        }
    }
    Ok(())
}

/// Delete a firewall object that other gateways may still be using
pub(crate) async fn delete_shared(
    run: &CategoryRun<'_>,
    kind: ResourceType,
    parents: &[&str],
    id: &str,
) {
    if run.dry_run() {
        debug!(run.log, "would delete"; "kind" => %kind, "id" => id);
        return;
    }
    match run.backend().delete(kind, parents, id).await {
        Ok(()) => debug!(run.log, "deleted"; "kind" => %kind, "id" => id),
        Err(err) if err.is_not_found() => (),
        Err(err) if err.is_in_use() => {
            debug!(run.log, "still in use by another gateway";
                "kind" => %kind,
                "id" => id,
            );
        }
        Err(err) => {
            warn!(run.log, "failed to delete firewall object";
                "kind" => %kind,
                "id" => id,
                "error" => %err,
            );
        }
    }
}
