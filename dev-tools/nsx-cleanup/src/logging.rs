// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Logging configuration (the `[log]` section of the config file)

use camino::Utf8Path;
use camino::Utf8PathBuf;
use serde::Deserialize;
use slog::Drain;
use slog::Level;
use slog::Logger;
use slog::o;
use std::fs::OpenOptions;

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "mode")]
pub enum ConfigLogging {
    #[serde(rename = "stderr-terminal")]
    StderrTerminal { level: ConfigLoggingLevel },

    #[serde(rename = "file")]
    File {
        level: ConfigLoggingLevel,
        path: Utf8PathBuf,
        if_exists: ConfigLoggingIfExists,
    },
}

impl Default for ConfigLogging {
    fn default() -> Self {
        ConfigLogging::StderrTerminal { level: ConfigLoggingLevel::Info }
    }
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ConfigLoggingIfExists {
    Fail,
    Truncate,
    Append,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ConfigLoggingLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Critical,
}

impl From<ConfigLoggingLevel> for Level {
    fn from(config_level: ConfigLoggingLevel) -> Level {
        match config_level {
            ConfigLoggingLevel::Trace => Level::Trace,
            ConfigLoggingLevel::Debug => Level::Debug,
            ConfigLoggingLevel::Info => Level::Info,
            ConfigLoggingLevel::Warn => Level::Warning,
            ConfigLoggingLevel::Error => Level::Error,
            ConfigLoggingLevel::Critical => Level::Critical,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("open log file \"{path}\"")]
pub struct LogFileError {
    path: Utf8PathBuf,
    #[source]
    err: std::io::Error,
}

impl ConfigLogging {
    pub fn level(&self) -> ConfigLoggingLevel {
        match self {
            ConfigLogging::StderrTerminal { level }
            | ConfigLogging::File { level, .. } => *level,
        }
    }

    pub fn set_level(&mut self, new_level: ConfigLoggingLevel) {
        match self {
            ConfigLogging::StderrTerminal { level }
            | ConfigLogging::File { level, .. } => *level = new_level,
        }
    }

    /// Create the root logger based on the requested configuration.
    pub fn to_logger(&self, name: &str) -> Result<Logger, LogFileError> {
        match self {
            ConfigLogging::StderrTerminal { level } => {
                let decorator =
                    slog_term::TermDecorator::new().stderr().build();
                let drain =
                    slog_term::FullFormat::new(decorator).build().fuse();
                Ok(async_root_logger(*level, name, drain))
            }

            ConfigLogging::File { level, path, if_exists } => {
                let mut open_options = std::fs::OpenOptions::new();
                open_options.write(true);
                open_options.create(true);
                match if_exists {
                    ConfigLoggingIfExists::Fail => {
                        open_options.create_new(true);
                    }
                    ConfigLoggingIfExists::Append => {
                        open_options.append(true);
                    }
                    ConfigLoggingIfExists::Truncate => {
                        open_options.truncate(true);
                    }
                }
                let drain = log_drain_for_file(&open_options, path)?;
                Ok(async_root_logger(*level, name, drain))
            }
        }
    }
}

fn async_root_logger<T>(
    level: ConfigLoggingLevel,
    name: &str,
    drain: T,
) -> Logger
where
    T: Drain + Send + 'static,
    <T as Drain>::Err: std::fmt::Debug,
{
    let level_drain = slog::LevelFilter(drain, Level::from(level)).fuse();
    let async_drain = slog_async::Async::new(level_drain).build().fuse();
    Logger::root(
        async_drain,
        o!("name" => name.to_string(), "pid" => std::process::id()),
    )
}

fn log_drain_for_file(
    open_options: &OpenOptions,
    path: &Utf8Path,
) -> Result<slog::Fuse<slog_json::Json<std::fs::File>>, LogFileError> {
    let error = |err| LogFileError { path: path.to_owned(), err };
    if let Some(parent) = path.parent() {
        if !parent.as_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(error)?;
        }
    }
    let file = open_options.open(path).map_err(error)?;

    // Tell whoever is watching the terminal where the rest of the log went.
    eprintln!("note: configured to log to \"{}\"", path);
    Ok(slog_json::Json::default(file).fuse())
}

#[cfg(test)]
mod test {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use slog::info;

    #[test]
    fn test_file_logger() {
        let dir = Utf8TempDir::new().unwrap();
        let path = dir.path().join("logs").join("cleanup.log");
        let config = ConfigLogging::File {
            level: ConfigLoggingLevel::Debug,
            path: path.clone(),
            if_exists: ConfigLoggingIfExists::Fail,
        };
        let log = config.to_logger("test_file_logger").unwrap();
        info!(log, "hello");
        drop(log);
        assert!(path.exists());

        // The file now exists, so a second logger refuses to clobber it.
        let error = config.to_logger("test_file_logger").unwrap_err();
        assert!(error.to_string().starts_with("open log file"));
    }

    #[test]
    fn test_set_level() {
        let mut config = ConfigLogging::default();
        assert_eq!(config.level(), ConfigLoggingLevel::Info);
        config.set_level(ConfigLoggingLevel::Trace);
        assert_eq!(
            config,
            ConfigLogging::StderrTerminal { level: ConfigLoggingLevel::Trace }
        );
    }
}
