// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Delete the NSX objects an OpenStack deployment left behind

use anyhow::Context;
use anyhow::bail;
use camino::Utf8PathBuf;
use clap::Parser;
use nsx_cleanup_db::AuthorityIndex;
use nsx_cleanup_db::LocalAuthority;
use nsx_cleanup_db::NeutronDb;
use nsx_cleanup_db::SnapshotSource;
use nsx_client::Backend;
use nsx_client::Client;
use nsx_reconciler::Reconciler;
use slog::Logger;
use slog::info;
use std::sync::Arc;

mod config;
mod logging;

use config::Config;
use logging::ConfigLoggingLevel;

/// Remove the NSX objects created by an OpenStack deployment
#[derive(Clone, Debug, Parser)]
#[clap(version)]
struct Args {
    /// Address of the NSX manager
    #[clap(long, value_name = "HOST")]
    policy_ip: Option<String>,

    /// NSX user name [default: admin]
    #[clap(long)]
    username: Option<String>,

    /// NSX password
    #[clap(long, env = "NSX_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Orchestrator database, e.g. mysql://neutron:secret@db/neutron
    ///
    /// When given, only objects the orchestrator still knows about are
    /// removed.
    #[clap(long, value_name = "URL", conflicts_with = "authority_snapshot")]
    db_connection: Option<String>,

    /// JSON export of the orchestrator's ids, used like --db-connection
    #[clap(long, value_name = "FILE")]
    authority_snapshot: Option<Utf8PathBuf>,

    /// Whether the Manager ("passthrough") API may be used [default: true]
    #[clap(long, value_name = "BOOL")]
    allow_passthrough: Option<bool>,

    /// Policy domain holding groups and gateway policies [default: default]
    #[clap(long)]
    domain: Option<String>,

    /// Report what would be deleted without deleting anything
    #[clap(long, action)]
    dry_run: bool,

    /// Do not verify the manager's TLS certificate
    #[clap(long, action)]
    insecure: bool,

    /// TOML configuration file; flags override its values
    #[clap(long, value_name = "FILE")]
    config: Option<Utf8PathBuf>,

    /// Log level (overrides the configuration file)
    #[clap(long, value_enum)]
    log_level: Option<ConfigLoggingLevel>,
}

impl Args {
    /// Load the configuration file (if any) and apply flags on top of it.
    fn to_config(&self) -> Result<Config, config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };

        if let Some(host) = &self.policy_ip {
            config.nsx.host = Some(host.clone());
        }
        if let Some(username) = &self.username {
            config.nsx.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.nsx.password = password.clone();
        }
        if let Some(allow) = self.allow_passthrough {
            config.nsx.allow_passthrough = allow;
        }
        if self.insecure {
            config.nsx.insecure = true;
        }
        if let Some(connection) = &self.db_connection {
            config.database.connection = Some(connection.clone());
            config.database.snapshot = None;
        }
        if let Some(snapshot) = &self.authority_snapshot {
            config.database.snapshot = Some(snapshot.clone());
            config.database.connection = None;
        }
        if let Some(domain) = &self.domain {
            config.cleanup.domain = domain.clone();
        }
        if self.dry_run {
            config.cleanup.dry_run = true;
        }
        if let Some(level) = self.log_level {
            config.log.set_level(level);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(error) = run(args).await {
        eprintln!("nsx-cleanup: {:#}", error);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), anyhow::Error> {
    let config = args.to_config()?;
    let log = config
        .log
        .to_logger("nsx-cleanup")
        .context("setting up logging")?;

    let client_config = config.client_config()?;
    let client = Client::new(&client_config, &log)
        .context("building NSX client")?;
    let version = match client.version().await {
        Ok(version) => version,
        Err(error) => {
            let hint = startup_hint(&error);
            return Err(anyhow::Error::new(error).context(format!(
                "could not reach the NSX manager at {}; {hint}",
                client_config.base_url()
            )));
        }
    };
    info!(log, "connected to NSX manager";
        "url" => client_config.base_url(),
        "version" => &version,
        "passthrough" => client.allows_passthrough(),
    );

    let authority = load_authority(&config, &log).await?;
    let reconciler = Reconciler::new(
        Arc::new(client),
        authority,
        config.reconciler_config(),
        &log,
    );
    let report = reconciler.cleanup_all().await.context("cleanup failed")?;
    println!("{report}");
    Ok(())
}

/// What the operator should try after the startup check fails
fn startup_hint(error: &nsx_common::Error) -> &'static str {
    if error.retryable() {
        "the manager may be busy or unreachable, retry shortly"
    } else {
        "check the address and credentials, then retry"
    }
}

async fn load_authority(
    config: &Config,
    log: &Logger,
) -> Result<Option<Arc<dyn AuthorityIndex>>, anyhow::Error> {
    let database = &config.database;
    let authority = match (&database.connection, &database.snapshot) {
        (Some(_), Some(_)) => {
            bail!("[database] connection and snapshot are mutually exclusive")
        }
        (Some(url), None) => {
            let db = NeutronDb::connect(url, log).await?;
            LocalAuthority::load(&db, log).await?
        }
        (None, Some(path)) => {
            let snapshot = SnapshotSource::from_file(path)?;
            LocalAuthority::load(&snapshot, log).await?
        }
        (None, None) => {
            info!(log, "no orchestrator database given; matching by tag only");
            return Ok(None);
        }
    };
    let authority: Arc<dyn AuthorityIndex> = Arc::new(authority);
    Ok(Some(authority))
}

#[cfg(test)]
mod test {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use clap::CommandFactory;

    #[test]
    fn test_args_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_flags_without_config() {
        let args = Args::try_parse_from([
            "nsx-cleanup",
            "--policy-ip",
            "10.1.1.1",
            "--allow-passthrough",
            "false",
            "--dry-run",
        ])
        .unwrap();
        let config = args.to_config().unwrap();
        assert_eq!(config.nsx.host.as_deref(), Some("10.1.1.1"));
        assert_eq!(config.nsx.username, "admin");
        assert!(!config.nsx.allow_passthrough);
        assert!(config.cleanup.dry_run);
        assert_eq!(config.cleanup.domain, "default");
    }

    #[test]
    fn test_flags_override_config() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("cleanup.toml");
        std::fs::write(
            &path,
            r#"
            [nsx]
            host = "from-file"
            username = "file-user"
            allow_passthrough = false

            [database]
            connection = "mysql://db/neutron"

            [cleanup]
            domain = "file-domain"
            "#,
        )
        .unwrap();

        let args = Args::try_parse_from([
            "nsx-cleanup",
            "--config",
            path.as_str(),
            "--policy-ip",
            "from-flag",
            "--authority-snapshot",
            "/tmp/ids.json",
            "--log-level",
            "trace",
        ])
        .unwrap();
        let config = args.to_config().unwrap();
        assert_eq!(config.nsx.host.as_deref(), Some("from-flag"));
        assert_eq!(config.nsx.username, "file-user");
        assert!(!config.nsx.allow_passthrough);
        assert_eq!(config.cleanup.domain, "file-domain");
        assert_eq!(config.database.connection, None);
        assert_eq!(
            config.database.snapshot.as_deref().map(|p| p.as_str()),
            Some("/tmp/ids.json")
        );
        assert_eq!(config.log.level(), ConfigLoggingLevel::Trace);
    }

    #[test]
    fn test_conflicting_authority_flags() {
        let error = Args::try_parse_from([
            "nsx-cleanup",
            "--db-connection",
            "mysql://db/neutron",
            "--authority-snapshot",
            "/tmp/ids.json",
        ])
        .unwrap_err();
        assert_eq!(error.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn test_startup_hint() {
        use nsx_common::Error;
        use nsx_common::ResourceType;

        let hint = startup_hint(&Error::Communication(String::from(
            "connection refused",
        )));
        assert!(hint.contains("retry shortly"), "{hint}");

        let hint =
            startup_hint(&Error::Unauthenticated(String::from("bad password")));
        assert!(hint.contains("credentials"), "{hint}");

        let hint = startup_hint(&Error::Manager {
            kind: ResourceType::Segment,
            status: Some(503),
            error_code: None,
            message: String::from("service unavailable"),
        });
        assert!(hint.contains("retry shortly"), "{hint}");
    }

    #[tokio::test]
    async fn test_load_authority_from_snapshot() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("ids.json");
        std::fs::write(&path, r#"{ "routers": ["r1"] }"#).unwrap();

        let mut config = Config::default();
        let log = Logger::root(slog::Discard, slog::o!());
        assert!(load_authority(&config, &log).await.unwrap().is_none());

        config.database.snapshot = Some(path);
        let authority = load_authority(&config, &log).await.unwrap().unwrap();
        assert!(
            authority.contains(nsx_cleanup_db::AuthorityModel::Routers, "r1")
        );

        config.database.connection = Some(String::from("mysql://db/x"));
        let error = load_authority(&config, &log).await.err().unwrap();
        assert!(error.to_string().contains("mutually exclusive"));
    }
}
