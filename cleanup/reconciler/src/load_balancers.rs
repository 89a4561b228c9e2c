// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Load balancer services and everything hanging off them

use crate::ReconcileError;
use crate::firewall::clean_tagged_firewall;
use crate::reconciler::CategoryRun;
use nsx_common::LB_ID_SCOPE;
use nsx_common::ResourceType;
use nsx_common::TagPredicate;
use nsx_common::resource_type::LB_MONITOR_TYPES;
use nsx_common::resource_type::LB_PROFILE_TYPES;

pub(crate) async fn clean_load_balancers(
    run: &mut CategoryRun<'_>,
) -> Result<(), ReconcileError> {
    // Load balancers have no table of their own in the orchestrator
    // database, so these are judged by their tags alone.
    let services = run.owned(ResourceType::LbService, &[], &[]).await?;
    for service in &services {
        let lb_id = service.tag_value(LB_ID_SCOPE).unwrap_or(&service.id);
        clean_tagged_firewall(run, &TagPredicate::exact(LB_ID_SCOPE, lb_id))
            .await?;
    }

    let order = [ResourceType::LbVirtualServer]
        .into_iter()
        .chain(LB_PROFILE_TYPES)
        .chain([ResourceType::LbService, ResourceType::LbPool])
        .chain(LB_MONITOR_TYPES)
        .chain([ResourceType::Certificate]);
    for kind in order {
        for resource in run.owned(kind, &[], &[]).await? {
            run.delete(kind, &[], &resource.id).await?;
        }
    }
    Ok(())
}
