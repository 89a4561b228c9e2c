// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Tier-1 routers
//!
//! Everything a router contains (firewall, NAT rules, static routes, locale
//! services) goes first, then the router itself.

use crate::Narrowing;
use crate::ReconcileError;
use crate::firewall::clean_tagged_firewall;
use crate::firewall::delete_shared;
use crate::reconciler::CategoryRun;
use nsx_cleanup_db::AuthorityModel;
use nsx_common::ROUTER_ID_SCOPE;
use nsx_common::ResourceType;
use nsx_common::TagPredicate;

pub(crate) async fn clean_tier1_routers(
    run: &mut CategoryRun<'_>,
) -> Result<(), ReconcileError> {
    let routers = run
        .owned(
            ResourceType::Tier1,
            &[],
            &[Narrowing::Id(AuthorityModel::Routers)],
        )
        .await?;
    for router in routers {
        let router_id = router.id.as_str();

        // The router's gateway policy is named after the router.
        let in_domain = [run.domain()];
        delete_shared(run, ResourceType::GatewayPolicy, &in_domain, router_id)
            .await;
        clean_tagged_firewall(
            run,
            &TagPredicate::exact(ROUTER_ID_SCOPE, router_id),
        )
        .await?;

        for kind in [
            ResourceType::Tier1NatRule,
            ResourceType::Tier1StaticRoute,
            ResourceType::Tier1LocaleService,
        ] {
            for child in run.list_if_present(kind, &[router_id]).await? {
                run.delete_dependent(kind, &[router_id], &child.id).await;
            }
        }

        run.delete(ResourceType::Tier1, &[], router_id).await?;
    }
    Ok(())
}
