use std::fmt;
use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

/// Failure of a single stage or of the job machinery around it.
#[derive(Debug, Error)]
pub enum ShellError {
    /// Wrong arity or malformed argument given to a built-in.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("path not found: {}", .0.display())]
    PathNotFound(PathBuf),
    /// The current directory cannot be resolved (e.g. it was removed).
    #[error("environment error: {0}")]
    Environment(#[source] io::Error),
    #[error("cannot enumerate processes: {0}")]
    Enumeration(String),
    #[error("cannot signal process {pid}: {source}")]
    SignalDelivery {
        pid: i32,
        #[source]
        source: Errno,
    },
    /// External command could not be created, e.g. executable not found.
    #[error("cannot spawn `{name}`: {source}")]
    Spawn {
        name: String,
        #[source]
        source: io::Error,
    },
    /// I/O failure while moving data between stages or into the sink.
    #[error("stream error: {0}")]
    Stream(#[source] io::Error),
    #[error("cannot start background job: {0}")]
    Fork(#[source] Errno),
}

/// Copyable classification of a [`ShellError`], handy for matching in tests
/// and for exit-code decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    PathNotFound,
    Environment,
    Enumeration,
    SignalDelivery,
    Spawn,
    Stream,
    Fork,
}

impl ShellError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShellError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            ShellError::PathNotFound(_) => ErrorKind::PathNotFound,
            ShellError::Environment(_) => ErrorKind::Environment,
            ShellError::Enumeration(_) => ErrorKind::Enumeration,
            ShellError::SignalDelivery { .. } => ErrorKind::SignalDelivery,
            ShellError::Spawn { .. } => ErrorKind::Spawn,
            ShellError::Stream(_) => ErrorKind::Stream,
            ShellError::Fork(_) => ErrorKind::Fork,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::PathNotFound => "PathNotFound",
            ErrorKind::Environment => "EnvironmentError",
            ErrorKind::Enumeration => "EnumerationError",
            ErrorKind::SignalDelivery => "SignalDeliveryError",
            ErrorKind::Spawn => "SpawnError",
            ErrorKind::Stream => "StreamError",
            ErrorKind::Fork => "ForkError",
        };
        f.write_str(s)
    }
}

/// A [`ShellError`] tagged with the operation name of the stage that raised it.
///
/// Its `Display` form is the one-line diagnostic shown to the user.
#[derive(Debug, Error)]
#[error("{stage}: {error}")]
pub struct StageError {
    pub stage: String,
    #[source]
    pub error: ShellError,
}

impl StageError {
    pub fn new(stage: impl Into<String>, error: ShellError) -> Self {
        Self {
            stage: stage.into(),
            error,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_names_stage_and_error() {
        let err = StageError::new("cd", ShellError::PathNotFound(PathBuf::from("/nope")));
        assert_eq!(err.to_string(), "cd: path not found: /nope");
        assert_eq!(err.kind(), ErrorKind::PathNotFound);
    }

    #[test]
    fn test_spawn_error_keeps_io_source() {
        let err = ShellError::Spawn {
            name: "frobnicate".to_string(),
            source: io::Error::new(io::ErrorKind::NotFound, "command not found"),
        };
        assert_eq!(err.kind(), ErrorKind::Spawn);
        assert_eq!(err.to_string(), "cannot spawn `frobnicate`: command not found");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_kind_display_uses_taxonomy_names() {
        assert_eq!(ErrorKind::Environment.to_string(), "EnvironmentError");
        assert_eq!(ErrorKind::SignalDelivery.to_string(), "SignalDeliveryError");
    }
}
