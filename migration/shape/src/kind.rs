// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use serde::Deserialize;
use serde::Serialize;

/// The kinds of orchestrator object that can be prepared for migration
///
/// Parsed from (and displayed as) the snake_case names used by the
/// migration driver, e.g. `"loadbalancer_listener"`.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
    strum::Display,
    strum::EnumIter,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKind {
    Network,
    Subnet,
    Subnetpool,
    Port,
    Router,
    Floatingip,
    SecurityGroup,
    SecurityGroupRule,
    QosPolicy,
    QosRule,
    Loadbalancer,
    LoadbalancerListener,
    LoadbalancerPool,
    LoadbalancerMember,
    LoadbalancerHealthmonitor,
    LoadbalancerL7policy,
    LoadbalancerL7rule,
    FirewallRule,
    FirewallPolicy,
    FirewallGroup,
    Quota,
}

impl ResourceKind {
    /// Whether objects of this kind are recreated inside a parent load
    /// balancer and so need its body to be prepared
    pub fn needs_parent(&self) -> bool {
        matches!(
            self,
            ResourceKind::LoadbalancerListener
                | ResourceKind::LoadbalancerPool
                | ResourceKind::LoadbalancerMember
        )
    }

    /// The destination API collection whose objects accept tags, if this
    /// kind has one
    pub fn tag_collection(&self) -> Option<&'static str> {
        match self {
            ResourceKind::Network => Some("networks"),
            ResourceKind::Subnet => Some("subnets"),
            ResourceKind::Subnetpool => Some("subnetpools"),
            ResourceKind::Port => Some("ports"),
            ResourceKind::Router => Some("routers"),
            ResourceKind::Floatingip => Some("floatingips"),
            ResourceKind::SecurityGroup => Some("security-groups"),
            ResourceKind::QosPolicy => Some("qos/policies"),
            ResourceKind::SecurityGroupRule
            | ResourceKind::QosRule
            | ResourceKind::Loadbalancer
            | ResourceKind::LoadbalancerListener
            | ResourceKind::LoadbalancerPool
            | ResourceKind::LoadbalancerMember
            | ResourceKind::LoadbalancerHealthmonitor
            | ResourceKind::LoadbalancerL7policy
            | ResourceKind::LoadbalancerL7rule
            | ResourceKind::FirewallRule
            | ResourceKind::FirewallPolicy
            | ResourceKind::FirewallGroup
            | ResourceKind::Quota => None,
        }
    }
}
