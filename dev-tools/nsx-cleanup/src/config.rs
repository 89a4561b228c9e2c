// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration file for `nsx-cleanup`
//!
//! Every section is optional.  Anything given on the command line overrides
//! what is here.
//!
//! ```toml
//! [nsx]
//! host = "nsx.example.com"
//! username = "admin"
//! password = "secret"
//! allow_passthrough = true
//!
//! [database]
//! connection = "mysql://neutron:secret@db/neutron"
//!
//! [cleanup]
//! dry_run = true
//! policies = { qos_policies = "isolate" }
//!
//! [log]
//! mode = "stderr-terminal"
//! level = "debug"
//! ```

use crate::logging::ConfigLogging;
use camino::Utf8Path;
use camino::Utf8PathBuf;
use nsx_client::ClientConfig;
use nsx_common::DEFAULT_DOMAIN;
use nsx_common::OS_API_VERSION_SCOPE;
use nsx_common::TagPredicate;
use nsx_reconciler::Category;
use nsx_reconciler::FailurePolicy;
use nsx_reconciler::ReconcilerConfig;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_USERNAME: &str = "admin";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("read \"{path}\"")]
    Read {
        path: Utf8PathBuf,
        #[source]
        err: std::io::Error,
    },
    #[error("parse \"{path}\"")]
    Parse {
        path: Utf8PathBuf,
        #[source]
        err: toml::de::Error,
    },
    #[error("no NSX manager address given (use --policy-ip or [nsx] host)")]
    MissingHost,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub nsx: NsxConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    #[serde(default)]
    pub log: ConfigLogging,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NsxConfig {
    pub host: Option<String>,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_true")]
    pub allow_passthrough: bool,
    #[serde(default)]
    pub insecure: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for NsxConfig {
    fn default() -> Self {
        NsxConfig {
            host: None,
            username: default_username(),
            password: String::new(),
            allow_passthrough: true,
            insecure: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Where to read the orchestrator's ids from
///
/// With neither set, cleanup relies on tags alone.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub connection: Option<String>,
    pub snapshot: Option<Utf8PathBuf>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CleanupConfig {
    #[serde(default = "default_domain")]
    pub domain: String,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_provenance_scope")]
    pub provenance_scope: String,
    #[serde(default)]
    pub policies: BTreeMap<Category, FailurePolicy>,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        CleanupConfig {
            domain: default_domain(),
            dry_run: false,
            provenance_scope: default_provenance_scope(),
            policies: BTreeMap::new(),
        }
    }
}

fn default_username() -> String {
    DEFAULT_USERNAME.to_string()
}

fn default_true() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    nsx_client::DEFAULT_TIMEOUT.as_secs()
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

fn default_provenance_scope() -> String {
    OS_API_VERSION_SCOPE.to_string()
}

impl Config {
    /// Load a `Config` from the given TOML file
    pub fn from_file(path: &Utf8Path) -> Result<Config, ConfigError> {
        let file_contents = std::fs::read_to_string(path)
            .map_err(|err| ConfigError::Read { path: path.into(), err })?;
        toml::from_str(&file_contents)
            .map_err(|err| ConfigError::Parse { path: path.into(), err })
    }

    pub fn client_config(&self) -> Result<ClientConfig, ConfigError> {
        let host = self.nsx.host.clone().ok_or(ConfigError::MissingHost)?;
        Ok(ClientConfig {
            host,
            username: self.nsx.username.clone(),
            password: self.nsx.password.clone(),
            allow_passthrough: self.nsx.allow_passthrough,
            insecure: self.nsx.insecure,
            timeout: Duration::from_secs(self.nsx.timeout_secs),
        })
    }

    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            domain: self.cleanup.domain.clone(),
            marker: TagPredicate::scope(self.cleanup.provenance_scope.clone()),
            policies: self.cleanup.policies.clone(),
            dry_run: self.cleanup.dry_run,
        }
    }
}
