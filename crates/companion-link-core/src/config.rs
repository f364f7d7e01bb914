//! Link configuration.
//!
//! A [`LinkConfig`] describes which counterpart app on the wearable the
//! coordinator talks to and which permissions it needs. It is built once
//! through [`LinkConfigBuilder`], validated at construction time, and never
//! mutated afterwards.
//!
//! Configuration can also be loaded from a TOML file, overlaid with
//! `COMPANION_LINK__*` environment variables:
//!
//! ```toml
//! package_name = "com.example.watchface"
//! debug_fingerprint = "AB:CD:..."
//! release_fingerprint = "12:34:..."
//! permissions = ["device_manager"]
//! debug = true
//! stage_timeout_ms = 5000
//!
//! [logging]
//! log_tag = "watchface-link"
//! verbose = false
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "COMPANION_LINK";

/// Default tag attached to every log line emitted by the coordinator.
pub const DEFAULT_LOG_TAG: &str = "companion-link";

static PACKAGE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_]*(\.[A-Za-z][A-Za-z0-9_]*)+$").expect("valid regex")
});

static FINGERPRINT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:[0-9A-Fa-f]{2}(?::[0-9A-Fa-f]{2}){31}|[0-9A-Fa-f]{64})$")
        .expect("valid regex")
});

static APP_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("valid regex"));

/// Errors raised while building or loading a [`LinkConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("Configuration file not found at: {}", .0.display())]
    NotFound(PathBuf),

    /// The configuration file could not be written.
    #[error("Failed to write {path}: {source}")]
    WriteError {
        /// Target path.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The configuration sources could not be read or deserialized.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// The configuration could not be rendered as TOML.
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A mandatory field was not supplied.
    #[error("Missing required field '{field}'")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A field was supplied but is malformed.
    #[error("Invalid value for '{field}': {message}")]
    ValidationError {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// More than one field failed validation.
    #[error("Configuration has {} problems: {}", .0.len(), join_errors(.0))]
    MultipleValidationErrors(Vec<ConfigError>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// A capability that must be granted before talking to the wearable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// Access to bonded device information and messaging.
    DeviceManager,
    /// Access to user status on the wearable (worn, sleeping, ...).
    WearUserStatus,
    /// Access to wearable sensors.
    Sensor,
    /// Access to wearable motion sensors.
    MotionSensor,
}

/// Logging preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingPrefs {
    /// Tag attached to every coordinator log line.
    pub log_tag: String,
    /// Emit per-stage debug logs.
    pub verbose: bool,
}

impl Default for LoggingPrefs {
    fn default() -> Self {
        Self {
            log_tag: DEFAULT_LOG_TAG.to_string(),
            verbose: false,
        }
    }
}

/// Identity of the counterpart app, as handed to the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counterpart<'a> {
    /// Legacy package identifier.
    pub package_name: &'a str,
    /// Signing fingerprint matching the current build flavor.
    pub fingerprint: &'a str,
    /// Next-generation package identifier and application id, if configured.
    pub next_gen: Option<(&'a str, &'a str)>,
}

/// Immutable link configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    package_name: String,
    next_gen_package_name: Option<String>,
    next_gen_app_id: Option<String>,
    debug_fingerprint: String,
    release_fingerprint: String,
    permissions: Vec<Permission>,
    debug: bool,
    logging: LoggingPrefs,
    stage_timeout: Option<Duration>,
}

impl LinkConfig {
    /// Start building a configuration.
    #[must_use]
    pub fn builder() -> LinkConfigBuilder {
        LinkConfigBuilder::default()
    }

    /// Counterpart legacy package identifier.
    #[must_use]
    pub fn package_name(&self) -> &str {
        &self.package_name
    }

    /// Counterpart next-generation package identifier.
    #[must_use]
    pub fn next_gen_package_name(&self) -> Option<&str> {
        self.next_gen_package_name.as_deref()
    }

    /// Counterpart next-generation application identifier.
    #[must_use]
    pub fn next_gen_app_id(&self) -> Option<&str> {
        self.next_gen_app_id.as_deref()
    }

    /// Fingerprint used by debug builds of the counterpart.
    #[must_use]
    pub fn debug_fingerprint(&self) -> &str {
        &self.debug_fingerprint
    }

    /// Fingerprint used by release builds of the counterpart.
    #[must_use]
    pub fn release_fingerprint(&self) -> &str {
        &self.release_fingerprint
    }

    /// Fingerprint selected by the debug flag.
    #[must_use]
    pub fn active_fingerprint(&self) -> &str {
        if self.debug {
            &self.debug_fingerprint
        } else {
            &self.release_fingerprint
        }
    }

    /// Permissions requested before any device operation.
    #[must_use]
    pub fn permissions(&self) -> &[Permission] {
        &self.permissions
    }

    /// Whether the debug flavor is active.
    #[must_use]
    pub const fn is_debug(&self) -> bool {
        self.debug
    }

    /// Logging preferences.
    #[must_use]
    pub const fn logging(&self) -> &LoggingPrefs {
        &self.logging
    }

    /// Per-stage deadline. `None` waits for the platform indefinitely.
    #[must_use]
    pub const fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout
    }

    /// Counterpart identity for platform calls.
    #[must_use]
    pub fn counterpart(&self) -> Counterpart<'_> {
        Counterpart {
            package_name: &self.package_name,
            fingerprint: self.active_fingerprint(),
            next_gen: self
                .next_gen_package_name
                .as_deref()
                .zip(self.next_gen_app_id.as_deref()),
        }
    }

    /// Load configuration from a TOML file, overlaid with environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if the file is missing,
    /// [`ConfigError::ParseError`] if it cannot be read, and validation
    /// errors if mandatory fields are absent or malformed.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let settings = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        let file: ConfigFile = settings
            .try_deserialize()
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        file.into_builder().build()
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(&ConfigFile::from(self))?)
    }

    /// Write the configuration to `path` as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let write_error = |source| ConfigError::WriteError {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        std::fs::write(path, self.to_toml()?).map_err(write_error)
    }
}

/// Builder for [`LinkConfig`].
#[derive(Debug, Clone, Default)]
pub struct LinkConfigBuilder {
    package_name: Option<String>,
    next_gen_package_name: Option<String>,
    next_gen_app_id: Option<String>,
    debug_fingerprint: Option<String>,
    release_fingerprint: Option<String>,
    permissions: Option<Vec<Permission>>,
    debug: bool,
    logging: LoggingPrefs,
    stage_timeout: Option<Duration>,
}

impl LinkConfigBuilder {
    /// Counterpart legacy package identifier. Required.
    #[must_use]
    pub fn package_name(mut self, value: impl Into<String>) -> Self {
        self.package_name = Some(value.into());
        self
    }

    /// Counterpart next-generation package identifier.
    #[must_use]
    pub fn next_gen_package_name(mut self, value: impl Into<String>) -> Self {
        self.next_gen_package_name = Some(value.into());
        self
    }

    /// Counterpart next-generation application identifier.
    #[must_use]
    pub fn next_gen_app_id(mut self, value: impl Into<String>) -> Self {
        self.next_gen_app_id = Some(value.into());
        self
    }

    /// Debug signing fingerprint. Required.
    #[must_use]
    pub fn debug_fingerprint(mut self, value: impl Into<String>) -> Self {
        self.debug_fingerprint = Some(value.into());
        self
    }

    /// Release signing fingerprint. Required.
    #[must_use]
    pub fn release_fingerprint(mut self, value: impl Into<String>) -> Self {
        self.release_fingerprint = Some(value.into());
        self
    }

    /// Replace the permission set.
    #[must_use]
    pub fn permissions(mut self, permissions: impl IntoIterator<Item = Permission>) -> Self {
        self.permissions = Some(permissions.into_iter().collect());
        self
    }

    /// Select the debug fingerprint.
    #[must_use]
    pub const fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Tag for coordinator log lines.
    #[must_use]
    pub fn log_tag(mut self, tag: impl Into<String>) -> Self {
        self.logging.log_tag = tag.into();
        self
    }

    /// Enable per-stage debug logging.
    #[must_use]
    pub const fn verbose(mut self, verbose: bool) -> Self {
        self.logging.verbose = verbose;
        self
    }

    /// Deadline applied to every platform stage.
    #[must_use]
    pub const fn stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = Some(timeout);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] or [`ConfigError::ValidationError`]
    /// for a single problem, [`ConfigError::MultipleValidationErrors`] when
    /// several fields are wrong.
    pub fn build(self) -> ConfigResult<LinkConfig> {
        let mut errors = Vec::new();

        let package_name = required("package_name", self.package_name, &mut errors)
            .and_then(|v| check_package_name("package_name", v, &mut errors));
        let debug_fingerprint = required("debug_fingerprint", self.debug_fingerprint, &mut errors)
            .and_then(|v| check_fingerprint("debug_fingerprint", v, &mut errors));
        let release_fingerprint =
            required("release_fingerprint", self.release_fingerprint, &mut errors)
                .and_then(|v| check_fingerprint("release_fingerprint", v, &mut errors));

        let next_gen_package_name = optional(self.next_gen_package_name)
            .and_then(|v| check_package_name("next_gen_package_name", v, &mut errors));
        let next_gen_app_id = optional(self.next_gen_app_id).and_then(|v| {
            checked(
                "next_gen_app_id",
                v,
                &APP_ID_RE,
                "only letters, digits, '.', '_' and '-' are allowed",
                &mut errors,
            )
        });
        match (&next_gen_package_name, &next_gen_app_id) {
            (Some(_), None) => errors.push(ConfigError::ValidationError {
                field: "next_gen_app_id",
                message: "required when next_gen_package_name is set".into(),
            }),
            (None, Some(_)) => errors.push(ConfigError::ValidationError {
                field: "next_gen_package_name",
                message: "required when next_gen_app_id is set".into(),
            }),
            _ => {}
        }

        let permissions =
            dedup(self.permissions.unwrap_or_else(|| vec![Permission::DeviceManager]));
        if permissions.is_empty() {
            errors.push(ConfigError::ValidationError {
                field: "permissions",
                message: "at least one permission is required".into(),
            });
        }

        if self.logging.log_tag.trim().is_empty() {
            errors.push(ConfigError::ValidationError {
                field: "log_tag",
                message: "must not be blank".into(),
            });
        }

        if self.stage_timeout == Some(Duration::ZERO) {
            errors.push(ConfigError::ValidationError {
                field: "stage_timeout",
                message: "must be greater than zero".into(),
            });
        }

        match (package_name, debug_fingerprint, release_fingerprint) {
            (Some(package_name), Some(debug_fingerprint), Some(release_fingerprint))
                if errors.is_empty() =>
            {
                Ok(LinkConfig {
                    package_name,
                    next_gen_package_name,
                    next_gen_app_id,
                    debug_fingerprint,
                    release_fingerprint,
                    permissions,
                    debug: self.debug,
                    logging: self.logging,
                    stage_timeout: self.stage_timeout,
                })
            }
            _ if errors.len() == 1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

/// Trimmed value, with blank strings treated as absent.
fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(
    field: &'static str,
    value: Option<String>,
    errors: &mut Vec<ConfigError>,
) -> Option<String> {
    let value = optional(value);
    if value.is_none() {
        errors.push(ConfigError::MissingField { field });
    }
    value
}

fn checked(
    field: &'static str,
    value: String,
    pattern: &Regex,
    message: &str,
    errors: &mut Vec<ConfigError>,
) -> Option<String> {
    if pattern.is_match(&value) {
        Some(value)
    } else {
        errors.push(ConfigError::ValidationError {
            field,
            message: format!("'{value}': {message}"),
        });
        None
    }
}

fn check_package_name(
    field: &'static str,
    value: String,
    errors: &mut Vec<ConfigError>,
) -> Option<String> {
    checked(field, value, &PACKAGE_NAME_RE, "expected reverse-DNS form", errors)
}

fn check_fingerprint(
    field: &'static str,
    value: String,
    errors: &mut Vec<ConfigError>,
) -> Option<String> {
    checked(field, value, &FINGERPRINT_RE, "expected a SHA-256 fingerprint", errors)
}

fn dedup(permissions: Vec<Permission>) -> Vec<Permission> {
    let mut seen = Vec::with_capacity(permissions.len());
    for permission in permissions {
        if !seen.contains(&permission) {
            seen.push(permission);
        }
    }
    seen
}

/// Returns `true` if `value` is a SHA-256 signing fingerprint.
#[must_use]
pub fn is_valid_fingerprint(value: &str) -> bool {
    FINGERPRINT_RE.is_match(value)
}

/// Returns `true` if `value` is a reverse-DNS package identifier.
#[must_use]
pub fn is_valid_package_name(value: &str) -> bool {
    PACKAGE_NAME_RE.is_match(value)
}

/// On-disk shape of the configuration. Every field is optional so that
/// missing values surface as validation errors rather than parse errors.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConfigFile {
    #[serde(skip_serializing_if = "Option::is_none")]
    package_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_gen_package_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_gen_app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    debug_fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    release_fingerprint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    permissions: Option<Vec<Permission>>,
    debug: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage_timeout_ms: Option<u64>,
    logging: LoggingPrefs,
}

impl ConfigFile {
    fn into_builder(self) -> LinkConfigBuilder {
        LinkConfigBuilder {
            package_name: self.package_name,
            next_gen_package_name: self.next_gen_package_name,
            next_gen_app_id: self.next_gen_app_id,
            debug_fingerprint: self.debug_fingerprint,
            release_fingerprint: self.release_fingerprint,
            permissions: self.permissions,
            debug: self.debug,
            logging: self.logging,
            stage_timeout: self.stage_timeout_ms.map(Duration::from_millis),
        }
    }
}

impl From<&LinkConfig> for ConfigFile {
    fn from(config: &LinkConfig) -> Self {
        Self {
            package_name: Some(config.package_name.clone()),
            next_gen_package_name: config.next_gen_package_name.clone(),
            next_gen_app_id: config.next_gen_app_id.clone(),
            debug_fingerprint: Some(config.debug_fingerprint.clone()),
            release_fingerprint: Some(config.release_fingerprint.clone()),
            permissions: Some(config.permissions.clone()),
            debug: config.debug,
            stage_timeout_ms: config
                .stage_timeout
                .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX)),
            logging: config.logging.clone(),
        }
    }
}
