// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fields that must not be sent when recreating an object
//!
//! These are read-only on the destination (timestamps, status, revision
//! counters), derived from other objects (a network's `subnets`), or
//! recreated separately (a load balancer's listeners and pools).

use crate::ResourceKind;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use strum::IntoEnumIterator;

const BASE: &[&str] =
    &["updated_at", "created_at", "tags", "revision", "revision_number"];

const LB_BASE: &[&str] = &[
    "created_at",
    "updated_at",
    "operating_status",
    "provisioning_status",
    "tags",
];

fn kind_fields(
    kind: ResourceKind,
) -> (&'static [&'static str], &'static [&'static str]) {
    match kind {
        ResourceKind::Network => (
            BASE,
            &[
                "status",
                "subnets",
                "availability_zones",
                "ipv4_address_scope",
                "ipv6_address_scope",
                "mtu",
            ],
        ),
        ResourceKind::Subnet => {
            (BASE, &["advanced_service_providers", "service_types"])
        }
        ResourceKind::Subnetpool => (BASE, &["id", "ip_version"]),
        ResourceKind::Port => (
            BASE,
            &[
                "status",
                "binding:vif_details",
                "binding:vif_type",
                "binding:host_id",
                "vnic_index",
                "dns_assignment",
            ],
        ),
        ResourceKind::Router => (
            BASE,
            &[
                "status",
                "routes",
                "ha",
                "external_gateway_info",
                "router_type",
                "availability_zones",
                "distributed",
                "flavor_id",
            ],
        ),
        ResourceKind::Floatingip => (BASE, &["status", "router_id", "id"]),
        ResourceKind::SecurityGroup => (BASE, &["policy"]),
        ResourceKind::SecurityGroupRule => (BASE, &[]),
        ResourceKind::QosPolicy => (&["revision"], &["rules"]),
        ResourceKind::QosRule => {
            (&["revision"], &["type", "qos_policy_id", "id"])
        }
        ResourceKind::Loadbalancer => (
            LB_BASE,
            &["listeners", "pools", "vip_port_id", "flavor_id"],
        ),
        ResourceKind::LoadbalancerListener => {
            (LB_BASE, &["loadbalancers", "l7policies", "default_pool_id"])
        }
        ResourceKind::LoadbalancerPool => (
            LB_BASE,
            &["loadbalancers", "healthmonitor_id", "listeners", "members"],
        ),
        ResourceKind::LoadbalancerMember => (LB_BASE, &[]),
        ResourceKind::LoadbalancerHealthmonitor => {
            (LB_BASE, &["max_retries_down", "pools"])
        }
        ResourceKind::LoadbalancerL7policy => (LB_BASE, &["rules"]),
        ResourceKind::LoadbalancerL7rule => (LB_BASE, &[]),
        ResourceKind::FirewallRule => (BASE, &["firewall_policy_id"]),
        ResourceKind::FirewallPolicy => (BASE, &[]),
        ResourceKind::FirewallGroup => (BASE, &["status"]),
        ResourceKind::Quota => (&[], &["id"]),
    }
}

/// Drop-field set of every [`ResourceKind`]
#[derive(Debug)]
pub struct DropTable {
    fields: BTreeMap<ResourceKind, BTreeSet<&'static str>>,
}

static DROP_TABLE: LazyLock<DropTable> = LazyLock::new(DropTable::build);

impl DropTable {
    fn build() -> DropTable {
        let fields = ResourceKind::iter()
            .map(|kind| {
                let (base, specific) = kind_fields(kind);
                let set = base.iter().chain(specific).copied().collect();
                (kind, set)
            })
            .collect();
        DropTable { fields }
    }

    /// The table, built on first use
    pub fn global() -> &'static DropTable {
        &DROP_TABLE
    }

    pub fn fields(&self, kind: ResourceKind) -> &BTreeSet<&'static str> {
        // Every kind is inserted by `build()`.
        &self.fields[&kind]
    }

    /// Remove every field of `kind`'s drop-field set from `object`.
    pub fn apply(
        &self,
        kind: ResourceKind,
        object: &mut serde_json::Map<String, serde_json::Value>,
    ) {
        for field in self.fields(kind) {
            object.remove(*field);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_every_kind_has_fields() {
        let table = DropTable::global();
        for kind in ResourceKind::iter() {
            assert!(!table.fields(kind).is_empty(), "{kind}");
        }
        assert!(table.fields(ResourceKind::Network).contains("tags"));
        assert!(
            table
                .fields(ResourceKind::LoadbalancerPool)
                .contains("provisioning_status")
        );
        assert!(!table.fields(ResourceKind::Subnet).contains("ip_version"));
    }

    #[test]
    fn test_apply() {
        let mut object = json!({
            "id": "r1",
            "name": "router",
            "status": "ACTIVE",
            "revision_number": 4,
            "external_gateway_info": { "network_id": "ext" },
        });
        let map = object.as_object_mut().unwrap();
        DropTable::global().apply(ResourceKind::Router, map);
        assert_eq!(object, json!({ "id": "r1", "name": "router" }));
    }
}
