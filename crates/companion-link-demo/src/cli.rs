//! Command-line parsing and configuration lookup.

use std::path::{Path, PathBuf};

use companion_link_core::{ConfigError, LinkConfig};

use crate::error::DemoError;
use crate::scenario::Scenario;
use crate::state::sample_config;

/// Environment variable names
pub mod env_vars {
    pub const CONFIG: &str = "COMPANION_LINK_CONFIG";
    pub const SCENARIO: &str = "COMPANION_LINK_SCENARIO";
    pub const LOG_LEVEL: &str = "COMPANION_LINK_LOG_LEVEL";
    pub const ENV: &str = "COMPANION_LINK_ENV";
}

/// Default configuration values
mod defaults {
    pub const CONFIG_FILE: &str = "config.toml";
    pub const SEND_MESSAGE: &str = "hello from the phone";
}

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Write a sample config file.
    Init,
    /// Report whether a connected device is available.
    Status,
    /// Send a message, then print the delivery report.
    Send(String),
    /// Register a receiver, simulate a reply, then release.
    Listen,
}

impl Command {
    /// Parse the arguments following the program name.
    ///
    /// No arguments means `send` with a default message; `send` joins the
    /// remaining arguments with spaces.
    ///
    /// # Errors
    ///
    /// Returns [`DemoError::UnknownCommand`] or [`DemoError::MissingMessage`].
    pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Self, DemoError> {
        let mut args = args.into_iter();
        let Some(command) = args.next() else {
            return Ok(Self::Send(defaults::SEND_MESSAGE.to_string()));
        };

        match command.as_str() {
            "init" => Ok(Self::Init),
            "status" => Ok(Self::Status),
            "listen" => Ok(Self::Listen),
            "send" => {
                let message = args.collect::<Vec<_>>().join(" ");
                if message.trim().is_empty() {
                    Err(DemoError::MissingMessage)
                } else {
                    Ok(Self::Send(message))
                }
            }
            other => Err(DemoError::UnknownCommand(other.to_string())),
        }
    }
}

/// Scenario selected through the environment, defaulting to [`Scenario::Ok`].
///
/// # Errors
///
/// Returns [`DemoError::UnknownScenario`] for an unrecognized name.
pub fn scenario_from_env() -> Result<Scenario, DemoError> {
    std::env::var(env_vars::SCENARIO)
        .ok()
        .map_or(Ok(Scenario::default()), |s| s.parse())
}

/// Whether production logging was requested.
#[must_use]
pub fn is_production() -> bool {
    std::env::var(env_vars::ENV).is_ok_and(|v| v.eq_ignore_ascii_case("production"))
}

/// Location of the config file.
///
/// # Errors
///
/// Returns [`DemoError::NoConfigDir`] if the platform has no config
/// directory and no override is set.
pub fn config_path() -> Result<PathBuf, DemoError> {
    if let Ok(path) = std::env::var(env_vars::CONFIG) {
        return Ok(PathBuf::from(path));
    }
    directories::ProjectDirs::from("", "", "companion-link")
        .map(|dirs| dirs.config_dir().join(defaults::CONFIG_FILE))
        .ok_or(DemoError::NoConfigDir)
}

/// Where the session's configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// Read from the config file.
    File,
    /// No file existed; the built-in sample is used.
    Sample,
    /// Freshly written by `init`.
    Written,
}

/// Load the config at `path`, falling back to the sample when it is absent.
///
/// Runs before logging is up, so the caller reports the source.
///
/// # Errors
///
/// Returns the load error for anything other than a missing file.
pub fn load_config(path: &Path) -> Result<(LinkConfig, ConfigSource), DemoError> {
    match LinkConfig::load(path) {
        Ok(config) => Ok((config, ConfigSource::File)),
        Err(ConfigError::NotFound(_)) => Ok((sample_config()?, ConfigSource::Sample)),
        Err(e) => Err(e.into()),
    }
}

/// Write the sample config to `path`.
///
/// # Errors
///
/// Returns [`DemoError::ConfigExists`] rather than overwriting a file.
pub fn init_config(path: &Path) -> Result<LinkConfig, DemoError> {
    if path.exists() {
        return Err(DemoError::ConfigExists(path.to_path_buf()));
    }
    let config = sample_config()?;
    config.save(path)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse(args(&["init"])).unwrap(), Command::Init);
        assert_eq!(Command::parse(args(&["status"])).unwrap(), Command::Status);
        assert_eq!(Command::parse(args(&["listen"])).unwrap(), Command::Listen);
        assert_eq!(
            Command::parse(args(&["send", "hello", "watch"])).unwrap(),
            Command::Send("hello watch".into())
        );
    }

    #[test]
    fn test_no_arguments_sends_default_message() {
        assert_eq!(
            Command::parse(Vec::new()).unwrap(),
            Command::Send(defaults::SEND_MESSAGE.into())
        );
    }

    #[test]
    fn test_send_requires_message() {
        assert!(matches!(
            Command::parse(args(&["send", " "])),
            Err(DemoError::MissingMessage)
        ));
        assert!(matches!(
            Command::parse(args(&["reboot"])),
            Err(DemoError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_init_writes_loadable_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let written = init_config(&path).unwrap();
        assert_eq!(load_config(&path).unwrap(), (written, ConfigSource::File));

        assert!(matches!(
            init_config(&path),
            Err(DemoError::ConfigExists(_))
        ));
    }

    #[test]
    fn test_missing_config_falls_back_to_sample() {
        let dir = tempfile::tempdir().unwrap();
        let (config, source) = load_config(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, sample_config().unwrap());
        assert_eq!(source, ConfigSource::Sample);
    }
}
