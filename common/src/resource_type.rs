// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Classes of backend objects managed by the cleanup tooling
//!
//! Each [`ResourceType`] knows which backend API serves it, where its
//! collection lives, and which other types it holds references to.  The
//! reference relation is what makes deletion order matter: the backend
//! refuses to delete an object while something still points at it, so an
//! object must always be deleted before the objects it references.

use serde::Deserialize;
use serde::Serialize;
use strum::EnumIter;

/// Which backend API serves a resource type
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Api {
    /// The declarative Policy API (`/policy/api/v1`)
    Policy,
    /// The lower-level Manager API (`/api/v1`), reached in passthrough mode
    Manager,
}

impl Api {
    pub fn root(&self) -> &'static str {
        match self {
            Api::Policy => "/policy/api/v1",
            Api::Manager => "/api/v1",
        }
    }
}

#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    EnumIter,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceType {
    // Security
    Group,
    CommunicationMap,
    GatewayPolicy,
    Service,

    // Tier-1 routing
    Tier1,
    Tier1LocaleService,
    Tier1NatRule,
    Tier1StaticRoute,
    Tier1SegmentInterface,

    // Segments
    Segment,
    SegmentDhcpStaticBinding,
    SegmentPort,
    SegmentPortSecurityBinding,
    SegmentPortDiscoveryBinding,
    SegmentPortQosBinding,

    QosProfile,

    // Load balancing
    LbService,
    LbVirtualServer,
    LbPool,
    LbHttpProfile,
    LbFastTcpProfile,
    LbFastUdpProfile,
    LbClientSslProfile,
    LbCookiePersistenceProfile,
    LbSourceIpPersistenceProfile,
    LbHttpMonitor,
    LbHttpsMonitor,
    LbUdpMonitor,
    LbIcmpMonitor,
    LbTcpMonitor,
    Certificate,

    // Manager API (passthrough)
    LogicalPort,
    DhcpServer,
}

/// The six load balancer profile classes, in deletion order
pub const LB_PROFILE_TYPES: [ResourceType; 6] = [
    ResourceType::LbHttpProfile,
    ResourceType::LbFastTcpProfile,
    ResourceType::LbFastUdpProfile,
    ResourceType::LbClientSslProfile,
    ResourceType::LbCookiePersistenceProfile,
    ResourceType::LbSourceIpPersistenceProfile,
];

/// The five load balancer monitor classes, in deletion order
pub const LB_MONITOR_TYPES: [ResourceType; 5] = [
    ResourceType::LbHttpMonitor,
    ResourceType::LbHttpsMonitor,
    ResourceType::LbUdpMonitor,
    ResourceType::LbIcmpMonitor,
    ResourceType::LbTcpMonitor,
];

/// Profile bindings hanging off a segment port, in deletion order
pub const SEGMENT_PORT_BINDING_TYPES: [ResourceType; 3] = [
    ResourceType::SegmentPortSecurityBinding,
    ResourceType::SegmentPortDiscoveryBinding,
    ResourceType::SegmentPortQosBinding,
];

impl ResourceType {
    pub fn api(&self) -> Api {
        match self {
            ResourceType::LogicalPort | ResourceType::DhcpServer => {
                Api::Manager
            }
            _ => Api::Policy,
        }
    }

    /// Path of this type's collection relative to its API root
    ///
    /// Each `{}` is filled in, in order, with the id of an enclosing object
    /// (see [`ResourceType::parent_count()`]).
    pub fn collection_template(&self) -> &'static str {
        match self {
            ResourceType::Group => "infra/domains/{}/groups",
            ResourceType::CommunicationMap => {
                "infra/domains/{}/security-policies"
            }
            ResourceType::GatewayPolicy => "infra/domains/{}/gateway-policies",
            ResourceType::Service => "infra/services",
            ResourceType::Tier1 => "infra/tier-1s",
            ResourceType::Tier1LocaleService => {
                "infra/tier-1s/{}/locale-services"
            }
            ResourceType::Tier1NatRule => "infra/tier-1s/{}/nat/USER/nat-rules",
            ResourceType::Tier1StaticRoute => "infra/tier-1s/{}/static-routes",
            ResourceType::Tier1SegmentInterface => {
                "infra/tier-1s/{}/locale-services/{}/interfaces"
            }
            ResourceType::Segment => "infra/segments",
            ResourceType::SegmentDhcpStaticBinding => {
                "infra/segments/{}/dhcp-static-binding-configs"
            }
            ResourceType::SegmentPort => "infra/segments/{}/ports",
            ResourceType::SegmentPortSecurityBinding => {
                "infra/segments/{}/ports/{}/port-security-profile-binding-maps"
            }
            ResourceType::SegmentPortDiscoveryBinding => {
                "infra/segments/{}/ports/{}/port-discovery-profile-binding-maps"
            }
            ResourceType::SegmentPortQosBinding => {
                "infra/segments/{}/ports/{}/port-qos-profile-binding-maps"
            }
            ResourceType::QosProfile => "infra/qos-profiles",
            ResourceType::LbService => "infra/lb-services",
            ResourceType::LbVirtualServer => "infra/lb-virtual-servers",
            ResourceType::LbPool => "infra/lb-pools",
            ResourceType::LbHttpProfile
            | ResourceType::LbFastTcpProfile
            | ResourceType::LbFastUdpProfile => "infra/lb-app-profiles",
            ResourceType::LbClientSslProfile => "infra/lb-client-ssl-profiles",
            ResourceType::LbCookiePersistenceProfile
            | ResourceType::LbSourceIpPersistenceProfile => {
                "infra/lb-persistence-profiles"
            }
            ResourceType::LbHttpMonitor
            | ResourceType::LbHttpsMonitor
            | ResourceType::LbUdpMonitor
            | ResourceType::LbIcmpMonitor
            | ResourceType::LbTcpMonitor => "infra/lb-monitor-profiles",
            ResourceType::Certificate => "infra/certificates",
            ResourceType::LogicalPort => "logical-ports",
            ResourceType::DhcpServer => "dhcp/servers",
        }
    }

    /// Number of enclosing object ids needed to address this type
    pub fn parent_count(&self) -> usize {
        self.collection_template().matches("{}").count()
    }

    /// The `resource_type` the backend reports for objects of this type
    ///
    /// This is also the type name used in search queries.  Several types
    /// share a collection (e.g. all application profiles) and are told apart
    /// only by this name.
    pub fn backend_type(&self) -> &'static str {
        match self {
            ResourceType::Group => "Group",
            ResourceType::CommunicationMap => "SecurityPolicy",
            ResourceType::GatewayPolicy => "GatewayPolicy",
            ResourceType::Service => "Service",
            ResourceType::Tier1 => "Tier1",
            ResourceType::Tier1LocaleService => "LocaleServices",
            ResourceType::Tier1NatRule => "PolicyNatRule",
            ResourceType::Tier1StaticRoute => "StaticRoutes",
            ResourceType::Tier1SegmentInterface => "Tier1Interface",
            ResourceType::Segment => "Segment",
            ResourceType::SegmentDhcpStaticBinding => {
                "DhcpV4StaticBindingConfig"
            }
            ResourceType::SegmentPort => "SegmentPort",
            ResourceType::SegmentPortSecurityBinding => {
                "PortSecurityProfileBindingMap"
            }
            ResourceType::SegmentPortDiscoveryBinding => {
                "PortDiscoveryProfileBindingMap"
            }
            ResourceType::SegmentPortQosBinding => "PortQoSProfileBindingMap",
            ResourceType::QosProfile => "QoSProfile",
            ResourceType::LbService => "LBService",
            ResourceType::LbVirtualServer => "LBVirtualServer",
            ResourceType::LbPool => "LBPool",
            ResourceType::LbHttpProfile => "LBHttpProfile",
            ResourceType::LbFastTcpProfile => "LBFastTcpProfile",
            ResourceType::LbFastUdpProfile => "LBFastUdpProfile",
            ResourceType::LbClientSslProfile => "LBClientSslProfile",
            ResourceType::LbCookiePersistenceProfile => {
                "LBCookiePersistenceProfile"
            }
            ResourceType::LbSourceIpPersistenceProfile => {
                "LBSourceIpPersistenceProfile"
            }
            ResourceType::LbHttpMonitor => "LBHttpMonitorProfile",
            ResourceType::LbHttpsMonitor => "LBHttpsMonitorProfile",
            ResourceType::LbUdpMonitor => "LBUdpMonitorProfile",
            ResourceType::LbIcmpMonitor => "LBIcmpMonitorProfile",
            ResourceType::LbTcpMonitor => "LBTcpMonitorProfile",
            ResourceType::Certificate => "TlsCertificate",
            ResourceType::LogicalPort => "LogicalPort",
            ResourceType::DhcpServer => "LogicalDhcpServer",
        }
    }

    /// Returns true if this type shares its collection with other types, so
    /// that list results must be filtered by `resource_type`.
    pub fn shares_collection(&self) -> bool {
        let template = self.collection_template();
        <ResourceType as strum::IntoEnumIterator>::iter()
            .filter(|other| other.collection_template() == template)
            .count()
            > 1
    }

    /// The type whose objects contain objects of this type, if any
    pub fn parent(&self) -> Option<ResourceType> {
        match self {
            ResourceType::Tier1LocaleService
            | ResourceType::Tier1NatRule
            | ResourceType::Tier1StaticRoute => Some(ResourceType::Tier1),
            ResourceType::Tier1SegmentInterface => {
                Some(ResourceType::Tier1LocaleService)
            }
            ResourceType::SegmentDhcpStaticBinding
            | ResourceType::SegmentPort => Some(ResourceType::Segment),
            ResourceType::SegmentPortSecurityBinding
            | ResourceType::SegmentPortDiscoveryBinding
            | ResourceType::SegmentPortQosBinding => {
                Some(ResourceType::SegmentPort)
            }
            _ => None,
        }
    }

    /// Types this type holds references to (its container included)
    ///
    /// An object must be deleted before any object it references.
    pub fn dependencies(&self) -> Vec<ResourceType> {
        let references: &[ResourceType] = match self {
            ResourceType::CommunicationMap | ResourceType::GatewayPolicy => {
                &[ResourceType::Group, ResourceType::Service]
            }
            ResourceType::Tier1SegmentInterface => &[ResourceType::Segment],
            ResourceType::Segment => &[ResourceType::Tier1],
            ResourceType::SegmentPortQosBinding => &[ResourceType::QosProfile],
            ResourceType::LbVirtualServer => &[
                ResourceType::LbService,
                ResourceType::LbPool,
                ResourceType::LbHttpProfile,
                ResourceType::LbFastTcpProfile,
                ResourceType::LbFastUdpProfile,
                ResourceType::LbClientSslProfile,
                ResourceType::LbCookiePersistenceProfile,
                ResourceType::LbSourceIpPersistenceProfile,
                ResourceType::Certificate,
            ],
            ResourceType::LbService => &[ResourceType::Tier1],
            ResourceType::LbPool => &LB_MONITOR_TYPES,
            ResourceType::LbHttpsMonitor => &[ResourceType::Certificate],
            ResourceType::LogicalPort => &[ResourceType::DhcpServer],
            _ => &[],
        };
        self.parent().into_iter().chain(references.iter().copied()).collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_parent_counts_match_parents() {
        for kind in ResourceType::iter() {
            let expected = match kind.parent() {
                // domain-scoped, not contained in another resource
                None if matches!(
                    kind,
                    ResourceType::Group
                        | ResourceType::CommunicationMap
                        | ResourceType::GatewayPolicy
                ) =>
                {
                    1
                }
                None => 0,
                Some(parent) => parent.parent_count() + 1,
            };
            assert_eq!(kind.parent_count(), expected, "{kind}");
        }
    }

    #[test]
    fn test_shared_collections() {
        assert!(ResourceType::LbHttpProfile.shares_collection());
        assert!(ResourceType::LbTcpMonitor.shares_collection());
        assert!(!ResourceType::Segment.shares_collection());
        assert!(!ResourceType::LbClientSslProfile.shares_collection());
    }

    #[test]
    fn test_dependencies_include_parent() {
        assert_eq!(
            ResourceType::SegmentPort.dependencies(),
            vec![ResourceType::Segment]
        );
        assert!(
            ResourceType::Tier1SegmentInterface
                .dependencies()
                .contains(&ResourceType::Tier1LocaleService)
        );
        assert!(ResourceType::Certificate.dependencies().is_empty());
    }

    #[test]
    fn test_display() {
        assert_eq!(ResourceType::Tier1NatRule.to_string(), "tier1_nat_rule");
        assert_eq!(Api::Manager.to_string(), "manager");
    }
}
