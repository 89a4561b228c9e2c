// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Read-only view of the orchestrator's own database, used to narrow backend
//! cleanup to the objects the orchestrator still knows about
//!
//! The backend and the orchestrator database can drift apart: a second
//! deployment may share the same backend, or a database may have been
//! restored from an older backup.  When the cleanup tool is given access to
//! the database, it only deletes tagged backend objects whose ids also
//! appear in the corresponding table.  The ids are read once, up front, into
//! a [`LocalAuthority`], which stays unchanged for the rest of the run.

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use slog::Logger;
use slog::info;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use strum::IntoEnumIterator;

mod mysql;
mod snapshot;

pub use mysql::NeutronDb;
pub use snapshot::SnapshotSource;

/// A table of the orchestrator database whose ids can narrow cleanup
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
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AuthorityModel {
    SecurityGroups,
    SecurityGroupRules,
    Routers,
    Networks,
    Ports,
    DhcpServiceBindings,
    PortMappings,
    QosPolicies,
}

impl AuthorityModel {
    /// The table and id column this model is read from
    pub fn table_and_column(&self) -> (&'static str, &'static str) {
        match self {
            AuthorityModel::SecurityGroups => ("securitygroups", "id"),
            AuthorityModel::SecurityGroupRules => ("securitygrouprules", "id"),
            AuthorityModel::Routers => ("routers", "id"),
            AuthorityModel::Networks => ("networks", "id"),
            AuthorityModel::Ports => ("ports", "id"),
            AuthorityModel::DhcpServiceBindings => {
                ("neutron_nsx_service_bindings", "nsx_service_id")
            }
            AuthorityModel::PortMappings => {
                ("neutron_nsx_port_mappings", "nsx_port_id")
            }
            AuthorityModel::QosPolicies => ("qos_policies", "id"),
        }
    }
}

/// Answers "does the orchestrator know about this id?"
pub trait AuthorityIndex: Send + Sync {
    fn contains(&self, model: AuthorityModel, id: &str) -> bool;
}

/// Somewhere the ids for each [`AuthorityModel`] can be read from
#[async_trait]
pub trait AuthoritySource: Send + Sync {
    async fn get_ids(
        &self,
        model: AuthorityModel,
    ) -> Result<BTreeSet<String>, anyhow::Error>;
}

/// Snapshot of the orchestrator's ids, taken once per cleanup run
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LocalAuthority {
    ids: BTreeMap<AuthorityModel, BTreeSet<String>>,
}

impl LocalAuthority {
    /// Read every model from `source`.
    pub async fn load(
        source: &dyn AuthoritySource,
        log: &Logger,
    ) -> Result<LocalAuthority, anyhow::Error> {
        let mut ids = BTreeMap::new();
        for model in AuthorityModel::iter() {
            let model_ids = source.get_ids(model).await?;
            info!(log, "loaded orchestrator ids";
                "model" => %model,
                "count" => model_ids.len(),
            );
            ids.insert(model, model_ids);
        }
        Ok(LocalAuthority { ids })
    }

    pub fn from_ids<I, S>(ids: I) -> LocalAuthority
    where
        I: IntoIterator<Item = (AuthorityModel, Vec<S>)>,
        S: Into<String>,
    {
        LocalAuthority {
            ids: ids
                .into_iter()
                .map(|(model, ids)| {
                    (model, ids.into_iter().map(Into::into).collect())
                })
                .collect(),
        }
    }

    /// The ids known for `model`; empty if the model was never loaded.
    pub fn ids(&self, model: AuthorityModel) -> &BTreeSet<String> {
        static EMPTY: BTreeSet<String> = BTreeSet::new();
        self.ids.get(&model).unwrap_or(&EMPTY)
    }
}

impl AuthorityIndex for LocalAuthority {
    fn contains(&self, model: AuthorityModel, id: &str) -> bool {
        self.ids(model).contains(id)
    }
}
