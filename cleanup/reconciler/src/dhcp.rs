// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! DHCP servers, which only exist in the passthrough API

use crate::Narrowing;
use crate::ReconcileError;
use crate::reconciler::CategoryRun;
use crate::segments::DHCP_ATTACHMENT;
use nsx_cleanup_db::AuthorityModel;
use nsx_common::ResourceType;
use serde_json::json;
use slog::info;

pub(crate) async fn clean_dhcp(
    run: &mut CategoryRun<'_>,
) -> Result<(), ReconcileError> {
    if !run.backend().allows_passthrough() {
        info!(run.log, "passthrough API disabled, skipping DHCP cleanup");
        run.report.skipped = Some(String::from("passthrough API disabled"));
        return Ok(());
    }

    let ports = run
        .owned(
            ResourceType::LogicalPort,
            &[],
            &[Narrowing::AttachmentId(AuthorityModel::DhcpServiceBindings)],
        )
        .await?;
    for port in ports {
        if port.attachment_type() != Some(DHCP_ATTACHMENT) {
            continue;
        }
        // If this fails the delete below may still manage to detach it.
        run.patch_dependent(
            ResourceType::LogicalPort,
            &[],
            &port.id,
            &json!({ "attachment": null }),
        )
        .await;
        run.delete(ResourceType::LogicalPort, &[], &port.id).await?;
    }

    let servers = run
        .owned(
            ResourceType::DhcpServer,
            &[],
            &[Narrowing::Id(AuthorityModel::DhcpServiceBindings)],
        )
        .await?;
    for server in servers {
        run.delete(ResourceType::DhcpServer, &[], &server.id).await?;
    }
    Ok(())
}
