// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Segments, their ports and the interfaces that attach them to routers

use crate::Narrowing;
use crate::ReconcileError;
use crate::reconciler::CategoryRun;
use nsx_cleanup_db::AuthorityModel;
use nsx_common::Error;
use nsx_common::NETWORK_ID_SCOPE;
use nsx_common::Resource;
use nsx_common::ResourceType;
use nsx_common::TagPredicate;
use nsx_common::resource_type::SEGMENT_PORT_BINDING_TYPES;
use serde_json::json;
use slog::debug;

/// `attachment_type` of the logical port serving a network's DHCP
pub(crate) const DHCP_ATTACHMENT: &str = "DHCP_SERVICE";

async fn owned_segments(
    run: &CategoryRun<'_>,
) -> Result<Vec<Resource>, ReconcileError> {
    run.owned(
        ResourceType::Segment,
        &[],
        &[Narrowing::Id(AuthorityModel::Networks)],
    )
    .await
}

/// Detach segments from DHCP and routers
///
/// For every owned segment: delete its DHCP static bindings and drop its
/// router connectivity.  For every owned tier-1 router: delete the segment
/// interfaces of each of its locale services.
pub(crate) async fn clean_segment_interfaces(
    run: &mut CategoryRun<'_>,
) -> Result<(), ReconcileError> {
    for segment in owned_segments(run).await? {
        let parents = [segment.id.as_str()];
        let bindings = run
            .list_if_present(ResourceType::SegmentDhcpStaticBinding, &parents)
            .await?;
        for binding in bindings {
            run.delete_dependent(
                ResourceType::SegmentDhcpStaticBinding,
                &parents,
                &binding.id,
            )
            .await;
        }

        if segment.field("connectivity_path").is_some() {
            run.patch_dependent(
                ResourceType::Segment,
                &[],
                &segment.id,
                &json!({ "connectivity_path": null, "subnets": null }),
            )
            .await;
        }
    }

    let routers = run
        .owned(
            ResourceType::Tier1,
            &[],
            &[Narrowing::Id(AuthorityModel::Routers)],
        )
        .await?;
    for router in routers {
        let locale_services = run
            .list_if_present(ResourceType::Tier1LocaleService, &[&router.id])
            .await?;
        for locale_service in locale_services {
            let parents = [router.id.as_str(), locale_service.id.as_str()];
            let interfaces = run
                .list_if_present(ResourceType::Tier1SegmentInterface, &parents)
                .await?;
            for interface in interfaces {
                run.delete(
                    ResourceType::Tier1SegmentInterface,
                    &parents,
                    &interface.id,
                )
                .await?;
            }
        }
    }
    Ok(())
}

/// Delete owned segments along with their ports
pub(crate) async fn clean_segments(
    run: &mut CategoryRun<'_>,
) -> Result<(), ReconcileError> {
    for segment in owned_segments(run).await? {
        delete_segment_ports(run, &segment.id).await?;
        if run.backend().allows_passthrough() {
            delete_dhcp_port(run, &segment.id).await?;
        }
        run.delete(ResourceType::Segment, &[], &segment.id).await?;
    }
    Ok(())
}

async fn delete_segment_ports(
    run: &mut CategoryRun<'_>,
    segment_id: &str,
) -> Result<(), ReconcileError> {
    // The segment may have been deleted since it was listed.
    let ports = run
        .owned_if_present(
            ResourceType::SegmentPort,
            &[segment_id],
            &[
                Narrowing::Id(AuthorityModel::Ports),
                Narrowing::Id(AuthorityModel::PortMappings),
            ],
        )
        .await?;
    for port in ports {
        let parents = [segment_id, port.id.as_str()];
        for kind in SEGMENT_PORT_BINDING_TYPES {
            for binding in run.list_if_present(kind, &parents).await? {
                run.delete_dependent(kind, &parents, &binding.id).await;
            }
        }
        run.delete(ResourceType::SegmentPort, &[segment_id], &port.id).await?;
    }
    Ok(())
}

/// Delete the passthrough logical port that served DHCP on a segment
async fn delete_dhcp_port(
    run: &CategoryRun<'_>,
    segment_id: &str,
) -> Result<(), ReconcileError> {
    let kind = ResourceType::LogicalPort;
    let tags = [
        run.config().marker.clone(),
        TagPredicate::exact(NETWORK_ID_SCOPE, segment_id),
    ];
    let found = match run.backend().search_by_tags(kind, &tags).await {
        Ok(found) => found.results,
        Err(err) if err.is_not_found() => Vec::new(),
        Err(err @ Error::PassthroughDisabled(_)) => {
            debug!(run.log, "cannot look up DHCP port";
                "segment" => segment_id,
                "error" => %err,
            );
            Vec::new()
        }
        Err(err) => return Err(ReconcileError::List { kind, err }),
    };
    for port in found {
        if port.attachment_type() == Some(DHCP_ATTACHMENT) {
            run.delete_dependent(kind, &[], &port.id).await;
        }
    }
    Ok(())
}
