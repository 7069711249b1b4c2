//! Error types shared across the library.

use thiserror::Error;

pub type Result<T, E = AutorunError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum AutorunError {
    #[error("no command given to run on change")]
    EmptyCommand,

    #[error("invalid glob pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("quiet duration must be more than 0 and at most 86400 seconds, got {0}")]
    InvalidQuietDuration(f64),

    #[error("invalid substitution marker {0:?}")]
    InvalidMarker(char),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
