// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-kind rewrites applied after the drop-field set has been removed
//!
//! Each rule looks for the fields it cares about and leaves the object
//! alone when they are missing or have an unexpected shape.

use crate::PrepareError;
use crate::PrepareOptions;
use crate::ResourceKind;
use serde_json::Map;
use serde_json::Value;
use slog::Logger;
use slog::warn;

pub(crate) type Object = Map<String, Value>;

pub(crate) struct RuleContext<'a> {
    pub kind: ResourceKind,
    pub options: &'a PrepareOptions,
    pub parent: Option<&'a Value>,
    pub log: &'a Logger,
}

pub(crate) type Rule =
    fn(&mut Object, &RuleContext<'_>) -> Result<(), PrepareError>;

const NETWORK_TYPE: &str = "provider:network_type";
const PHYSICAL_NETWORK: &str = "provider:physical_network";
const SEGMENTATION_ID: &str = "provider:segmentation_id";
const PROVIDER_FIELDS: [&str; 3] =
    [NETWORK_TYPE, PHYSICAL_NETWORK, SEGMENTATION_ID];

/// The availability zone name that always exists on the destination
const DEFAULT_AZ: &str = "default";

pub(crate) fn rules_for(kind: ResourceKind) -> &'static [Rule] {
    match kind {
        ResourceKind::Network => &[
            remove_qos,
            drop_null_provider_fields,
            translate_provider_network,
            map_external_network,
            clear_unknown_az_hints,
            rename_internal_network,
        ],
        ResourceKind::Subnet => &[drop_ipv6_modes],
        ResourceKind::Port => &[
            remove_qos,
            cap_address_pairs,
            disable_port_security_for_mac_learning,
            remap_vif_id,
        ],
        ResourceKind::Router => &[clear_unknown_az_hints],
        ResourceKind::LoadbalancerListener
        | ResourceKind::LoadbalancerPool
        | ResourceKind::LoadbalancerMember => &[attach_parent_loadbalancer],
        _ => &[],
    }
}

fn object_id(object: &Object) -> String {
    match object.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(other) => other.to_string(),
        None => String::from("<no id>"),
    }
}

fn remove_qos(
    object: &mut Object,
    ctx: &RuleContext<'_>,
) -> Result<(), PrepareError> {
    if ctx.options.remove_qos {
        object.remove("qos_policy_id");
    }
    Ok(())
}

// The destination rejects explicit nulls for these.
fn drop_null_provider_fields(
    object: &mut Object,
    _: &RuleContext<'_>,
) -> Result<(), PrepareError> {
    for field in [PHYSICAL_NETWORK, SEGMENTATION_ID] {
        if object.get(field).is_some_and(Value::is_null) {
            object.remove(field);
        }
    }
    Ok(())
}

/// Overlay and flat networks become plain networks on the destination.
/// VLAN networks keep their VLAN, but not the source's physical network.
fn translate_provider_network(
    object: &mut Object,
    _: &RuleContext<'_>,
) -> Result<(), PrepareError> {
    let network_type =
        object.get(NETWORK_TYPE).and_then(Value::as_str).map(str::to_owned);
    match network_type.as_deref() {
        Some("vxlan" | "geneve" | "flat") => {
            for field in PROVIDER_FIELDS {
                object.remove(field);
            }
        }
        Some("vlan") => {
            object.remove(PHYSICAL_NETWORK);
        }
        _ => (),
    }
    Ok(())
}

/// External networks get the destination's gateway in place of the
/// source's provider settings.
fn map_external_network(
    object: &mut Object,
    ctx: &RuleContext<'_>,
) -> Result<(), PrepareError> {
    if object.get("router:external").and_then(Value::as_bool) != Some(true) {
        return Ok(());
    }

    let mut reset = false;
    for field in PROVIDER_FIELDS {
        if let Some(value) = object.remove(field) {
            reset |= !value.is_null();
        }
    }
    let id = object_id(object);
    if reset {
        warn!(ctx.log, "dropped provider settings of external network";
            "network" => &id,
        );
    }

    let gateway = match ctx.options.ext_net_map.get(&id) {
        Some(gateway) => Some(gateway),
        None => {
            let fallback = ctx.options.default_tier0.as_ref();
            warn!(ctx.log, "external network has no mapped gateway";
                "network" => &id,
                "fallback" => ?fallback,
            );
            fallback
        }
    };
    if let Some(gateway) = gateway {
        object.insert(
            PHYSICAL_NETWORK.to_string(),
            Value::from(gateway.as_str()),
        );
    }
    Ok(())
}

/// Hints naming a zone the destination does not have would fail creation,
/// so they are cleared.
fn clear_unknown_az_hints(
    object: &mut Object,
    ctx: &RuleContext<'_>,
) -> Result<(), PrepareError> {
    let Some(dest_azs) = &ctx.options.dest_azs else {
        return Ok(());
    };
    let Some(Value::Array(hints)) = object.get("availability_zone_hints")
    else {
        return Ok(());
    };

    let unknown: Vec<String> = hints
        .iter()
        .filter_map(Value::as_str)
        .filter(|hint| !dest_azs.contains(*hint))
        .map(str::to_string)
        .collect();
    if unknown.is_empty() {
        return Ok(());
    }
    if unknown.iter().any(|hint| hint != DEFAULT_AZ) {
        warn!(ctx.log, "clearing unknown availability zone hints";
            "kind" => %ctx.kind,
            "id" => object_id(object),
            "hints" => ?unknown,
        );
    }
    object.insert(
        String::from("availability_zone_hints"),
        Value::Array(Vec::new()),
    );
    Ok(())
}

/// The destination creates its own internal network with the same name.
fn rename_internal_network(
    object: &mut Object,
    ctx: &RuleContext<'_>,
) -> Result<(), PrepareError> {
    let prefix = &ctx.options.internal_network_prefix;
    if prefix.is_empty() {
        return Ok(());
    }
    if let Some(Value::String(name)) = object.get_mut("name") {
        if name.starts_with(prefix.as_str()) {
            name.push_str("-old");
        }
    }
    Ok(())
}

fn drop_ipv6_modes(
    object: &mut Object,
    _: &RuleContext<'_>,
) -> Result<(), PrepareError> {
    let ip_version = object.get("ip_version").and_then(Value::as_u64);
    for field in ["ipv6_address_mode", "ipv6_ra_mode"] {
        let drop = match ip_version {
            Some(4) => true,
            Some(6) => object
                .get(field)
                .is_some_and(|v| v.is_null() || v.as_str() == Some("")),
            _ => false,
        };
        if drop {
            object.remove(field);
        }
    }
    Ok(())
}

fn cap_address_pairs(
    object: &mut Object,
    ctx: &RuleContext<'_>,
) -> Result<(), PrepareError> {
    let id = object_id(object);
    let Some(Value::Array(pairs)) = object.get_mut("allowed_address_pairs")
    else {
        return Ok(());
    };
    if pairs.is_empty() {
        object.remove("allowed_address_pairs");
        return Ok(());
    }
    let max = ctx.options.max_address_pairs;
    if pairs.len() > max {
        warn!(ctx.log, "truncating allowed address pairs";
            "port" => &id,
            "count" => pairs.len(),
            "max" => max,
        );
        pairs.truncate(max);
    }
    Ok(())
}

fn disable_port_security_for_mac_learning(
    object: &mut Object,
    ctx: &RuleContext<'_>,
) -> Result<(), PrepareError> {
    let enabled =
        |field: &str| object.get(field).and_then(Value::as_bool) == Some(true);
    if !(enabled("mac_learning_enabled") && enabled("port_security_enabled")) {
        return Ok(());
    }
    warn!(ctx.log, "disabling port security on port with MAC learning";
        "port" => object_id(object),
    );
    object.insert(String::from("port_security_enabled"), Value::Bool(false));
    object.insert(String::from("security_groups"), Value::Array(Vec::new()));
    Ok(())
}

fn remap_vif_id(
    object: &mut Object,
    ctx: &RuleContext<'_>,
) -> Result<(), PrepareError> {
    if let Some(vif_id) = ctx.options.vif_ids.get(&object_id(object)) {
        object.insert(String::from("vif_id"), Value::from(vif_id.as_str()));
    }
    Ok(())
}

/// Listeners, pools and members are created with a copy of their load
/// balancer.  The copy's own listeners are emptied so that each listener is
/// not serialized a second time inside it.
fn attach_parent_loadbalancer(
    object: &mut Object,
    ctx: &RuleContext<'_>,
) -> Result<(), PrepareError> {
    let kind = ctx.kind;
    let parent = ctx.parent.ok_or(PrepareError::MissingParent { kind })?;
    let parent_id = parent
        .get("id")
        .filter(|id| !id.is_null())
        .cloned()
        .ok_or(PrepareError::ParentWithoutId { kind })?;

    let mut loadbalancer = parent.clone();
    if let Value::Object(lb) = &mut loadbalancer {
        lb.insert(String::from("listeners"), Value::Array(Vec::new()));
    }
    object.insert(String::from("loadbalancer"), loadbalancer);
    object.insert(String::from("loadbalancer_id"), parent_id);
    Ok(())
}
