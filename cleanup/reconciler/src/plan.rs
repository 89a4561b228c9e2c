// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The order in which cleanup removes each category of backend object
//!
//! The backend rejects deleting an object while anything still contains or
//! refers to it, so cleanup has to remove objects leaves-first.  Rather than
//! leave that order implicit in the code of each category, [`CleanupPlan`]
//! lists it explicitly and [`CleanupPlan::validate()`] checks it against
//! [`ResourceType::dependencies()`].

use nsx_common::ResourceType;
use nsx_common::resource_type::LB_MONITOR_TYPES;
use nsx_common::resource_type::LB_PROFILE_TYPES;
use nsx_common::resource_type::SEGMENT_PORT_BINDING_TYPES;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeSet;

/// A group of backend objects cleaned up together
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
pub enum Category {
    SecurityGroups,
    SegmentInterfaces,
    Segments,
    QosPolicies,
    LoadBalancers,
    Dhcp,
    Tier1Routers,
}

impl Category {
    /// What happens to the rest of a category when one delete fails, unless
    /// configured otherwise
    pub fn default_policy(&self) -> FailurePolicy {
        match self {
            Category::QosPolicies => FailurePolicy::Propagate,
            Category::SecurityGroups
            | Category::SegmentInterfaces
            | Category::Segments
            | Category::LoadBalancers
            | Category::Dhcp
            | Category::Tier1Routers => FailurePolicy::Isolate,
        }
    }
}

/// What a failed delete does to the rest of its category
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    PartialEq,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and carry on with the next object.
    Isolate,
    /// Stop the category (and the run) with an error.
    Propagate,
}

/// One category of the plan and the kinds it deletes, in order
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlanStep {
    pub category: Category,
    pub kinds: Vec<ResourceType>,
}

impl PlanStep {
    pub fn new(
        category: Category,
        kinds: impl IntoIterator<Item = ResourceType>,
    ) -> PlanStep {
        PlanStep { category, kinds: kinds.into_iter().collect() }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("category {0} appears more than once in the plan")]
    DuplicateCategory(Category),
    #[error(
        "{kind} (in {category}) must be deleted before {dependency}, but \
         nothing after it deletes {dependency}"
    )]
    OutOfOrder {
        category: Category,
        kind: ResourceType,
        dependency: ResourceType,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CleanupPlan {
    steps: Vec<PlanStep>,
}

impl CleanupPlan {
    /// Build a plan from `steps` without checking it.
    pub fn new(steps: Vec<PlanStep>) -> CleanupPlan {
        CleanupPlan { steps }
    }

    /// The order cleanup normally runs in
    pub fn standard() -> CleanupPlan {
        use ResourceType::*;

        let firewall = [GatewayPolicy, Group, Service];
        CleanupPlan::new(vec![
            PlanStep::new(Category::SecurityGroups, [CommunicationMap, Group]),
            PlanStep::new(
                Category::SegmentInterfaces,
                [SegmentDhcpStaticBinding, Tier1SegmentInterface],
            ),
            PlanStep::new(
                Category::Segments,
                SEGMENT_PORT_BINDING_TYPES
                    .into_iter()
                    .chain([SegmentPort, LogicalPort, Segment]),
            ),
            PlanStep::new(Category::QosPolicies, [QosProfile]),
            PlanStep::new(
                Category::LoadBalancers,
                firewall
                    .into_iter()
                    .chain([LbVirtualServer])
                    .chain(LB_PROFILE_TYPES)
                    .chain([LbService, LbPool])
                    .chain(LB_MONITOR_TYPES)
                    .chain([Certificate]),
            ),
            PlanStep::new(Category::Dhcp, [LogicalPort, DhcpServer]),
            PlanStep::new(
                Category::Tier1Routers,
                firewall.into_iter().chain([
                    Tier1NatRule,
                    Tier1StaticRoute,
                    Tier1LocaleService,
                    Tier1,
                ]),
            ),
        ])
    }

    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// Check that the plan deletes objects leaves-first
    ///
    /// Each category may appear only once.  Every time a kind is deleted,
    /// each kind it depends on must still be deleted at some later point in
    /// the plan, if the plan deletes that kind at all.
    pub fn validate(&self) -> Result<(), PlanError> {
        let mut seen = BTreeSet::new();
        for step in &self.steps {
            if !seen.insert(step.category) {
                return Err(PlanError::DuplicateCategory(step.category));
            }
        }

        let order: Vec<(Category, ResourceType)> = self
            .steps
            .iter()
            .flat_map(|step| step.kinds.iter().map(|k| (step.category, *k)))
            .collect();
        for (i, (category, kind)) in order.iter().enumerate() {
            for dependency in kind.dependencies() {
                let in_plan = order.iter().any(|(_, k)| *k == dependency);
                let later =
                    order[i + 1..].iter().any(|(_, k)| *k == dependency);
                if in_plan && !later {
                    return Err(PlanError::OutOfOrder {
                        category: *category,
                        kind: *kind,
                        dependency,
                    });
                }
            }
        }
        Ok(())
    }
}
