//! Domain-level error types for blastdock-config.
//!
//! All errors are typed with `thiserror`. Resource and race conditions carry a
//! stable, machine-distinguishable reason next to the human-readable message.

use std::path::PathBuf;
use thiserror::Error;

/// Why a resource could not be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    NotFound,
    NotAFile,
    TooLarge,
    NotReadable,
    DecodeError,
    PermissionDenied,
    /// Permission denied while the copy itself was running.
    CopyPermissionDenied,
    WriteFailed,
    CopyFailed,
    DeleteFailed,
}

impl ResourceKind {
    /// Stable reason string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::NotAFile => "not a file",
            Self::TooLarge => "too large",
            Self::NotReadable => "not readable",
            Self::DecodeError => "decode error",
            Self::PermissionDenied => "permission denied",
            Self::CopyPermissionDenied => "permission denied during copy",
            Self::WriteFailed => "write failed",
            Self::CopyFailed => "copy failed",
            Self::DeleteFailed => "delete failed",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A filesystem fact that changed between check and use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceKind {
    DeletedDuringCopy,
    DeletedDuringValidation,
}

impl RaceKind {
    /// Stable reason string.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DeletedDuringCopy => "deleted during copy",
            Self::DeletedDuringValidation => "deleted during validation",
        }
    }
}

impl std::fmt::Display for RaceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application-level errors.
#[derive(Error, Debug)]
pub enum AppError {
    /// Path or input rejected by validation.
    #[error("Validation failed: {reason}")]
    Validation { reason: String },

    /// A file could not be used (missing, too large, unreadable, ...).
    #[error("{message} ({kind})")]
    Resource {
        kind: ResourceKind,
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// The target vanished or changed between check and use.
    #[error("{message} ({kind})")]
    RaceCondition {
        kind: RaceKind,
        path: PathBuf,
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },

    /// Content hash did not match the expected digest.
    #[error("Hash mismatch for {}: expected {expected}, got {actual}", path.display())]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// Corrupt or unloadable configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Profile switch refused before anything changed.
    #[error("Cannot switch profile: failed to save profile '{from}' before switching to '{to}': {source}")]
    SwitchAborted {
        from: String,
        to: String,
        #[source]
        source: Box<AppError>,
    },

    /// Profile switch failed while loading and the previous profile was restored.
    #[error("Failed to load profile '{to}': {source}. Rolled back to profile '{from}'")]
    SwitchRolledBack {
        from: String,
        to: String,
        #[source]
        source: Box<AppError>,
    },

    /// IO operation failed.
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: Option<std::io::Error>,
    },
}

impl AppError {
    /// Create a validation error.
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }

    /// Create a resource error without an underlying IO error.
    pub fn resource(kind: ResourceKind, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Resource {
            kind,
            path: path.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a resource error caused by an IO error.
    pub fn resource_io(
        kind: ResourceKind,
        path: impl Into<PathBuf>,
        message: impl Into<String>,
        err: std::io::Error,
    ) -> Self {
        Self::Resource {
            kind,
            path: path.into(),
            message: message.into(),
            source: Some(err),
        }
    }

    /// Create a race-condition error.
    pub fn race(kind: RaceKind, path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        let path = path.into();
        let message = match kind {
            RaceKind::DeletedDuringCopy => {
                format!("Source file {} was deleted during copy operation", path.display())
            }
            RaceKind::DeletedDuringValidation => {
                format!("Source file {} was deleted during validation", path.display())
            }
        };
        Self::RaceCondition {
            kind,
            path,
            message,
            source: Some(err),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an IO error with context.
    pub fn io(message: impl Into<String>, err: std::io::Error) -> Self {
        Self::Io {
            message: message.into(),
            source: Some(err),
        }
    }

    /// Stable reason for resource and race errors.
    #[must_use]
    pub const fn reason(&self) -> Option<&'static str> {
        match self {
            Self::Resource { kind, .. } => Some(kind.as_str()),
            Self::RaceCondition { kind, .. } => Some(kind.as_str()),
            _ => None,
        }
    }

    /// Whether the error means "the file is not there".
    ///
    /// Races count too: a file that vanished mid-operation is also missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Resource { kind, .. } => *kind == ResourceKind::NotFound,
            Self::RaceCondition { .. } => true,
            Self::Io {
                source: Some(err), ..
            } => err.kind() == std::io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Race conditions are a subtype of resource errors.
    #[must_use]
    pub const fn is_resource(&self) -> bool {
        matches!(self, Self::Resource { .. } | Self::RaceCondition { .. })
    }

    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::SwitchAborted { .. } | Self::SwitchRolledBack { .. }
        )
    }
}

/// Result type alias using `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_race_is_resource_and_not_found() {
        let err = AppError::race(
            RaceKind::DeletedDuringCopy,
            "/tmp/a.yml",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        assert!(err.is_resource());
        assert!(err.is_not_found());
        assert_eq!(err.reason(), Some("deleted during copy"));
        assert!(err.to_string().contains("deleted during copy"));
    }

    #[test]
    fn test_copy_permission_reason_is_distinct() {
        let during = AppError::resource(ResourceKind::CopyPermissionDenied, "/x", "denied");
        let before = AppError::resource(ResourceKind::PermissionDenied, "/x", "denied");
        assert_ne!(during.reason(), before.reason());
    }

    #[test]
    fn test_rollback_message_names_both() {
        let err = AppError::SwitchRolledBack {
            from: "default".into(),
            to: "staging".into(),
            source: Box::new(AppError::config("boom")),
        };
        let msg = err.to_string();
        assert!(msg.contains("staging"));
        assert!(msg.contains("Rolled back"));
        assert!(msg.contains("default"));
        assert!(err.is_configuration());
    }
}
