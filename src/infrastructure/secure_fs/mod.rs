//! Secure file operations.
//!
//! `SecureFileOps` is constructed by the caller and passed to whatever needs
//! it. An instance may be scoped to a base directory, in which case every
//! path it touches must resolve inside that directory.

mod atomic;
mod audit;
mod transfer;
pub mod validator;

use std::path::{Path, PathBuf};

use crate::domain::{FileLimits, Result, ValidationOutcome};

pub use atomic::WriteOptions;

/// Default mode for files written by this layer.
pub const DEFAULT_FILE_MODE: u32 = 0o644;

/// Validating, size-limited file operations.
#[derive(Debug, Clone, Default)]
pub struct SecureFileOps {
    limits: FileLimits,
    base_dir: Option<PathBuf>,
}

impl SecureFileOps {
    #[must_use]
    pub const fn new(limits: FileLimits) -> Self {
        Self {
            limits,
            base_dir: None,
        }
    }

    /// Confine all operations to `base_dir`.
    ///
    /// A relative base is anchored to the working directory now, so relative
    /// paths passed later are always resolved against the same place.
    #[must_use]
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        self.base_dir = Some(std::path::absolute(&base_dir).unwrap_or(base_dir));
        self
    }

    #[must_use]
    pub const fn limits(&self) -> &FileLimits {
        &self.limits
    }

    #[must_use]
    pub fn base_dir(&self) -> Option<&Path> {
        self.base_dir.as_deref()
    }

    /// Validate `path` against this instance's scope.
    #[must_use]
    pub fn validate(&self, path: &Path, allowed_extensions: Option<&[&str]>) -> ValidationOutcome {
        validator::validate(path, self.base_dir(), allowed_extensions)
    }

    /// Resolve a caller-supplied path against the base directory, if any.
    fn scoped(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    fn check_path(&self, path: &Path, allowed_extensions: Option<&[&str]>) -> Result<()> {
        self.validate(path, allowed_extensions).into_result()
    }

    /// Reject paths outside the base directory. Unscoped instances accept all.
    fn check_scope(&self, path: &Path) -> Result<()> {
        match &self.base_dir {
            Some(base) => validator::check_within_base(path, base).into_result(),
            None => Ok(()),
        }
    }
}

/// Apply POSIX permission bits.
#[cfg(unix)]
pub(crate) fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
pub(crate) fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}
