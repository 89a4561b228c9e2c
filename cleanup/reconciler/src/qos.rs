// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::Narrowing;
use crate::ReconcileError;
use crate::reconciler::CategoryRun;
use nsx_cleanup_db::AuthorityModel;
use nsx_common::ResourceType;

/// QoS profiles backing the orchestrator's QoS policies
pub(crate) async fn clean_qos_policies(
    run: &mut CategoryRun<'_>,
) -> Result<(), ReconcileError> {
    let profiles = run
        .owned(
            ResourceType::QosProfile,
            &[],
            &[Narrowing::Id(AuthorityModel::QosPolicies)],
        )
        .await?;
    for profile in profiles {
        run.delete(ResourceType::QosProfile, &[], &profile.id).await?;
    }
    Ok(())
}
