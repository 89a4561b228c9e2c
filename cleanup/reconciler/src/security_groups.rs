// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Security groups: communication maps, then the groups they use

use crate::Narrowing;
use crate::ReconcileError;
use crate::ownership::UUID_LEN;
use crate::reconciler::CategoryRun;
use nsx_cleanup_db::AuthorityModel;
use nsx_common::ResourceType;

pub(crate) async fn clean_security_groups(
    run: &mut CategoryRun<'_>,
) -> Result<(), ReconcileError> {
    let domain = run.domain();

    let maps = run
        .owned(
            ResourceType::CommunicationMap,
            &[domain],
            &[Narrowing::Id(AuthorityModel::SecurityGroups)],
        )
        .await?;
    for map in maps {
        run.delete(ResourceType::CommunicationMap, &[domain], &map.id).await?;
    }

    let groups = run
        .owned(
            ResourceType::Group,
            &[domain],
            &[
                Narrowing::Id(AuthorityModel::SecurityGroups),
                Narrowing::IdPrefix(
                    AuthorityModel::SecurityGroupRules,
                    UUID_LEN,
                ),
            ],
        )
        .await?;
    for group in groups {
        run.delete(ResourceType::Group, &[domain], &group.id).await?;
    }
    Ok(())
}
