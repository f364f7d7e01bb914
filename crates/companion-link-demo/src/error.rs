//! Demo error types.

use std::path::PathBuf;

use companion_link_core::{ConfigError, LinkError};

/// Errors surfaced by the demo binary.
#[derive(Debug, thiserror::Error)]
pub enum DemoError {
    #[error("Unknown command: {0} (expected one of: init, status, send, listen)")]
    UnknownCommand(String),

    #[error("Unknown scenario: {0} (expected one of: ok, denied, no-device, not-installed, not-running)")]
    UnknownScenario(String),

    #[error("No message given to send")]
    MissingMessage,

    #[error("Could not determine a configuration directory; set COMPANION_LINK_CONFIG")]
    NoConfigDir,

    #[error("Config file already exists: {0}")]
    ConfigExists(PathBuf),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Link operation failed with code {code}: {0}", code = .0.code())]
    Link(#[from] LinkError),
}

impl DemoError {
    /// Process exit code for this error.
    ///
    /// Link failures exit with `2`, everything else with `1`.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Link(_) => 2,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_error_message_carries_code() {
        let err = DemoError::from(LinkError::CounterpartNotRunning);
        assert!(err.to_string().contains("code 201"));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_usage_errors_exit_with_one() {
        assert_eq!(DemoError::MissingMessage.exit_code(), 1);
        assert_eq!(DemoError::UnknownCommand("x".into()).exit_code(), 1);
    }
}
