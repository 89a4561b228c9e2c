// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::DropTable;
use crate::ResourceKind;
use crate::rules::RuleContext;
use crate::rules::rules_for;
use serde_json::Map;
use serde_json::Value;
use slog::Logger;
use slog::o;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

/// Most address pairs a destination port accepts
///
/// The destination allows 128 addresses per port, one of which is the
/// port's own fixed address.
pub const DEFAULT_MAX_ADDRESS_PAIRS: usize = 128 - 1;

/// Name prefix of the source's internal edge network
pub const DEFAULT_INTERNAL_NETWORK_PREFIX: &str = "inter-edge-net";

/// Facts about the destination that some rewrites depend on
#[derive(Clone, Debug)]
pub struct PrepareOptions {
    /// availability zones the destination knows about; `None` leaves hints
    /// untouched
    pub dest_azs: Option<BTreeSet<String>>,
    /// external network id -> destination gateway (tier-0) id
    pub ext_net_map: BTreeMap<String, String>,
    /// gateway for external networks missing from `ext_net_map`
    pub default_tier0: Option<String>,
    /// port id -> destination VIF id
    pub vif_ids: BTreeMap<String, String>,
    /// drop QoS policy references from networks and ports
    pub remove_qos: bool,
    pub max_address_pairs: usize,
    /// networks named with this prefix are renamed; empty disables this
    pub internal_network_prefix: String,
}

impl Default for PrepareOptions {
    fn default() -> Self {
        PrepareOptions {
            dest_azs: None,
            ext_net_map: BTreeMap::new(),
            default_tier0: None,
            vif_ids: BTreeMap::new(),
            remove_qos: false,
            max_address_pairs: DEFAULT_MAX_ADDRESS_PAIRS,
            internal_network_prefix: DEFAULT_INTERNAL_NETWORK_PREFIX
                .to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PrepareError {
    #[error("{kind} must be a JSON object")]
    NotAnObject { kind: ResourceKind },
    #[error("{kind} cannot be prepared without its parent load balancer")]
    MissingParent { kind: ResourceKind },
    #[error("parent load balancer of {kind} has no id")]
    ParentWithoutId { kind: ResourceKind },
}

/// Turns source objects into bodies the destination will accept
pub struct Transformer {
    options: PrepareOptions,
    drop_table: &'static DropTable,
    log: Logger,
}

impl Transformer {
    pub fn new(options: PrepareOptions, log: &Logger) -> Transformer {
        Transformer {
            options,
            drop_table: DropTable::global(),
            log: log.new(o!("component" => "Transformer")),
        }
    }

    pub fn options(&self) -> &PrepareOptions {
        &self.options
    }

    /// Prepare one object of type `kind` for creation on the destination
    ///
    /// `parent` is the already-prepared body of the enclosing load balancer,
    /// required for listeners, pools and members and ignored otherwise.
    /// `raw` itself is left untouched.
    pub fn prepare(
        &self,
        kind: ResourceKind,
        raw: &Value,
        parent: Option<&Value>,
    ) -> Result<Map<String, Value>, PrepareError> {
        let mut object = match raw {
            Value::Object(object) => object.clone(),
            _ => return Err(PrepareError::NotAnObject { kind }),
        };

        if object.get("description").is_some_and(Value::is_null) {
            object.insert(String::from("description"), Value::from(""));
        }

        self.drop_table.apply(kind, &mut object);

        let ctx = RuleContext {
            kind,
            options: &self.options,
            parent,
            log: &self.log,
        };
        for rule in rules_for(kind) {
            rule(&mut object, &ctx)?;
        }
        Ok(object)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use nsx_test_utils::dev::test_setup_log;
    use serde_json::json;

    fn transformer(options: PrepareOptions, name: &str) -> Transformer {
        Transformer::new(options, &test_setup_log(name))
    }

    fn prepare(
        t: &Transformer,
        kind: ResourceKind,
        raw: Value,
    ) -> Map<String, Value> {
        t.prepare(kind, &raw, None).unwrap()
    }

    #[test]
    fn test_common_steps() {
        let t = transformer(PrepareOptions::default(), "test_common_steps");
        let raw = json!({
            "id": "p1",
            "description": null,
            "created_at": "2024-01-01T00:00:00Z",
            "tags": ["blue"],
            "status": "ACTIVE",
            "binding:host_id": "compute-1",
            "name": "port",
        });
        let port = t.prepare(ResourceKind::Port, &raw, None).unwrap();
        assert_eq!(
            Value::Object(port),
            json!({ "id": "p1", "description": "", "name": "port" })
        );
        // the input is not modified
        assert_eq!(raw["status"], "ACTIVE");

        let error = t.prepare(ResourceKind::Port, &json!([1]), None);
        assert_eq!(
            error,
            Err(PrepareError::NotAnObject { kind: ResourceKind::Port })
        );
    }

    #[test]
    fn test_network_provider_fields() {
        let t = transformer(
            PrepareOptions::default(),
            "test_network_provider_fields",
        );

        let vxlan = prepare(&t, ResourceKind::Network, json!({
            "id": "n1",
            "provider:network_type": "vxlan",
            "provider:segmentation_id": 5002,
            "provider:physical_network": "phys1",
        }));
        for field in PROVIDER_FIELDS {
            assert!(!vxlan.contains_key(field), "{field}");
        }

        let flat = prepare(&t, ResourceKind::Network, json!({
            "id": "n2",
            "provider:network_type": "flat",
            "provider:physical_network": "phys1",
        }));
        assert_eq!(Value::Object(flat), json!({ "id": "n2" }));

        let vlan = prepare(&t, ResourceKind::Network, json!({
            "id": "n3",
            "provider:network_type": "vlan",
            "provider:segmentation_id": 100,
            "provider:physical_network": "phys1",
        }));
        assert_eq!(vlan["provider:network_type"], "vlan");
        assert_eq!(vlan["provider:segmentation_id"], 100);
        assert!(!vlan.contains_key("provider:physical_network"));

        let nulls = prepare(&t, ResourceKind::Network, json!({
            "id": "n4",
            "provider:network_type": "portgroup",
            "provider:segmentation_id": null,
            "provider:physical_network": null,
        }));
        assert_eq!(
            Value::Object(nulls),
            json!({ "id": "n4", "provider:network_type": "portgroup" })
        );
    }

    const PROVIDER_FIELDS: [&str; 3] = [
        "provider:network_type",
        "provider:physical_network",
        "provider:segmentation_id",
    ];

    #[test]
    fn test_external_network() {
        let options = PrepareOptions {
            ext_net_map: BTreeMap::from([(
                String::from("ext-1"),
                String::from("tier0-a"),
            )]),
            default_tier0: Some(String::from("tier0-default")),
            ..Default::default()
        };
        let t = transformer(options, "test_external_network");
        let external = |id: &str| {
            json!({
                "id": id,
                "router:external": true,
                "provider:network_type": "vlan",
                "provider:segmentation_id": 7,
                "provider:physical_network": "dvs-1",
            })
        };

        let mapped = prepare(&t, ResourceKind::Network, external("ext-1"));
        assert_eq!(mapped["provider:physical_network"], "tier0-a");
        assert!(!mapped.contains_key("provider:network_type"));
        assert!(!mapped.contains_key("provider:segmentation_id"));

        let fallback = prepare(&t, ResourceKind::Network, external("ext-2"));
        assert_eq!(fallback["provider:physical_network"], "tier0-default");

        let t = transformer(PrepareOptions::default(), "test_external_network");
        let unset = prepare(&t, ResourceKind::Network, external("ext-2"));
        for field in PROVIDER_FIELDS {
            assert!(!unset.contains_key(field), "{field}");
        }
    }

    #[test]
    fn test_availability_zone_hints() {
        let options = PrepareOptions {
            dest_azs: Some(BTreeSet::from([String::from("az-1")])),
            ..Default::default()
        };
        let t = transformer(options, "test_availability_zone_hints");

        let known = prepare(&t, ResourceKind::Router, json!({
            "id": "r1",
            "availability_zone_hints": ["az-1"],
        }));
        assert_eq!(known["availability_zone_hints"], json!(["az-1"]));

        for hints in [json!(["az-2"]), json!(["default"]), json!(["az-1", "x"])]
        {
            let router = prepare(&t, ResourceKind::Router, json!({
                "id": "r2",
                "availability_zone_hints": hints,
            }));
            assert_eq!(router["availability_zone_hints"], json!([]));

            let network = prepare(&t, ResourceKind::Network, json!({
                "id": "n1",
                "availability_zone_hints": hints,
            }));
            assert_eq!(network["availability_zone_hints"], json!([]));
        }

        // Without a known zone list hints are kept as they are.
        let t = transformer(
            PrepareOptions::default(),
            "test_availability_zone_hints",
        );
        let router = prepare(&t, ResourceKind::Router, json!({
            "id": "r3",
            "availability_zone_hints": ["anything"],
        }));
        assert_eq!(router["availability_zone_hints"], json!(["anything"]));
    }

    #[test]
    fn test_internal_network_and_qos() {
        let options = PrepareOptions { remove_qos: true, ..Default::default() };
        let t = transformer(options, "test_internal_network_and_qos");
        let network = prepare(&t, ResourceKind::Network, json!({
            "id": "n1",
            "name": "inter-edge-net-1",
            "qos_policy_id": "q1",
        }));
        assert_eq!(network["name"], "inter-edge-net-1-old");
        assert!(!network.contains_key("qos_policy_id"));

        let network = prepare(&t, ResourceKind::Network, json!({
            "id": "n2",
            "name": "tenant-net",
        }));
        assert_eq!(network["name"], "tenant-net");
    }

    #[test]
    fn test_subnet_ipv6_fields() {
        let t =
            transformer(PrepareOptions::default(), "test_subnet_ipv6_fields");

        let v4 = prepare(&t, ResourceKind::Subnet, json!({
            "id": "s1",
            "ip_version": 4,
            "ipv6_address_mode": "dhcpv6-stateful",
            "ipv6_ra_mode": null,
        }));
        assert!(!v4.contains_key("ipv6_address_mode"));
        assert!(!v4.contains_key("ipv6_ra_mode"));

        let v6_empty = prepare(&t, ResourceKind::Subnet, json!({
            "id": "s2",
            "ip_version": 6,
            "ipv6_address_mode": null,
        }));
        assert!(!v6_empty.contains_key("ipv6_address_mode"));

        let v6_blank = prepare(&t, ResourceKind::Subnet, json!({
            "id": "s4",
            "ip_version": 6,
            "ipv6_address_mode": "",
            "ipv6_ra_mode": "",
        }));
        assert!(!v6_blank.contains_key("ipv6_address_mode"));
        assert!(!v6_blank.contains_key("ipv6_ra_mode"));

        let v6 = prepare(&t, ResourceKind::Subnet, json!({
            "id": "s3",
            "ip_version": 6,
            "ipv6_address_mode": "slaac",
            "ipv6_ra_mode": "slaac",
        }));
        assert_eq!(v6["ipv6_address_mode"], "slaac");
        assert_eq!(v6["ipv6_ra_mode"], "slaac");
    }

    #[test]
    fn test_port_rewrites() {
        let options = PrepareOptions {
            max_address_pairs: 2,
            vif_ids: BTreeMap::from([(
                String::from("p1"),
                String::from("vif-9"),
            )]),
            ..Default::default()
        };
        let t = transformer(options, "test_port_rewrites");

        let port = prepare(&t, ResourceKind::Port, json!({
            "id": "p1",
            "description": null,
            "mac_learning_enabled": true,
            "port_security_enabled": true,
            "security_groups": ["sg1"],
            "allowed_address_pairs": [
                { "ip_address": "10.0.0.1" },
                { "ip_address": "10.0.0.2" },
                { "ip_address": "10.0.0.3" },
            ],
        }));
        assert_eq!(port["description"], "");
        assert_eq!(port["port_security_enabled"], false);
        assert_eq!(port["security_groups"], json!([]));
        assert_eq!(
            port["allowed_address_pairs"],
            json!([{ "ip_address": "10.0.0.1" }, { "ip_address": "10.0.0.2" }])
        );
        assert_eq!(port["vif_id"], "vif-9");

        let port = prepare(&t, ResourceKind::Port, json!({
            "id": "p2",
            "mac_learning_enabled": false,
            "port_security_enabled": true,
            "security_groups": ["sg1"],
            "allowed_address_pairs": [],
        }));
        assert_eq!(port["port_security_enabled"], true);
        assert_eq!(port["security_groups"], json!(["sg1"]));
        assert!(!port.contains_key("allowed_address_pairs"));
        assert!(!port.contains_key("vif_id"));
    }

    #[test]
    fn test_default_address_pair_cap() {
        let t = transformer(
            PrepareOptions::default(),
            "test_default_address_pair_cap",
        );
        let pairs: Vec<Value> = (0..200)
            .map(|i| {
                json!({ "ip_address": format!("10.0.{}.{}", i / 256, i % 256) })
            })
            .collect();
        let port = prepare(&t, ResourceKind::Port, json!({
            "id": "p1",
            "allowed_address_pairs": pairs,
        }));
        assert_eq!(
            port["allowed_address_pairs"].as_array().unwrap().len(),
            DEFAULT_MAX_ADDRESS_PAIRS
        );
    }

    #[test]
    fn test_loadbalancer_children() {
        let t = transformer(
            PrepareOptions::default(),
            "test_loadbalancer_children",
        );
        let lb = Value::Object(prepare(&t, ResourceKind::Loadbalancer, json!({
            "id": "lb-1",
            "name": "web",
            "provisioning_status": "ACTIVE",
            "listeners": [{ "id": "l1" }],
        })));
        // The prepared load balancer no longer lists its listeners at all.
        assert!(lb.get("listeners").is_none());
        let lb_with_listeners = json!({
            "id": "lb-1",
            "listeners": [{ "id": "l1" }],
        });

        for kind in [
            ResourceKind::LoadbalancerListener,
            ResourceKind::LoadbalancerPool,
            ResourceKind::LoadbalancerMember,
        ] {
            let raw = json!({ "id": "child", "operating_status": "ONLINE" });
            let child =
                t.prepare(kind, &raw, Some(&lb_with_listeners)).unwrap();
            assert_eq!(child["loadbalancer_id"], lb_with_listeners["id"]);
            assert_eq!(child["loadbalancer"]["listeners"], json!([]));
            assert_eq!(child["loadbalancer"]["id"], "lb-1");
            assert!(!child.contains_key("operating_status"));

            assert_eq!(
                t.prepare(kind, &raw, None),
                Err(PrepareError::MissingParent { kind })
            );
            assert_matches!(
                t.prepare(kind, &raw, Some(&json!({ "name": "no id" }))),
                Err(PrepareError::ParentWithoutId { .. })
            );
        }

        // Health monitors are created on their own.
        let monitor = t
            .prepare(
                ResourceKind::LoadbalancerHealthmonitor,
                &json!({ "id": "hm", "pools": [{ "id": "pool" }] }),
                None,
            )
            .unwrap();
        assert_eq!(Value::Object(monitor), json!({ "id": "hm" }));
    }

    #[test]
    fn test_missing_fields_are_not_errors() {
        let t = transformer(
            PrepareOptions {
                dest_azs: Some(BTreeSet::new()),
                remove_qos: true,
                ..Default::default()
            },
            "test_missing_fields_are_not_errors",
        );
        for kind in <ResourceKind as strum::IntoEnumIterator>::iter() {
            if kind.needs_parent() {
                continue;
            }
            let prepared = t.prepare(kind, &json!({}), None).unwrap();
            assert!(prepared.is_empty(), "{kind}");
        }
    }
}
