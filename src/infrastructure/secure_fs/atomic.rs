//! Size-limited reads and crash-safe atomic writes.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::Path;

use crate::domain::{backup_path_for, AppError, ResourceKind, Result, TextEncoding};

use super::{set_mode, SecureFileOps, DEFAULT_FILE_MODE};

/// Options for `SecureFileOps::write`.
#[derive(Debug, Clone)]
pub struct WriteOptions<'a> {
    /// Copy an existing target to `<path>.backup` first.
    pub create_backup: bool,
    pub encoding: TextEncoding,
    /// Permission bits applied before the file becomes visible.
    pub mode: u32,
    pub allowed_extensions: Option<&'a [&'a str]>,
}

impl Default for WriteOptions<'_> {
    fn default() -> Self {
        Self {
            create_backup: true,
            encoding: TextEncoding::Utf8,
            mode: DEFAULT_FILE_MODE,
            allowed_extensions: None,
        }
    }
}

impl SecureFileOps {
    /// Read a text file, enforcing existence, type, size and readability.
    ///
    /// `max_size` defaults to the configuration-file ceiling.
    ///
    /// # Errors
    /// Returns a validation error if a scoped instance is asked for a path
    /// outside its base, otherwise a resource error whose reason is one of
    /// "not found", "not a file", "too large", "not readable" or "decode error".
    pub fn read(&self, path: &Path, max_size: Option<u64>, encoding: TextEncoding) -> Result<String> {
        let path = self.scoped(path);
        self.check_scope(&path)?;
        let max = max_size.unwrap_or(self.limits.max_config_bytes);

        let metadata = fs::metadata(&path).map_err(|e| read_error(&path, e))?;
        if !metadata.is_file() {
            return Err(AppError::resource(
                ResourceKind::NotAFile,
                &path,
                format!("{} is not a regular file", path.display()),
            ));
        }
        if metadata.len() > max {
            return Err(too_large(&path, metadata.len(), max));
        }

        let file = File::open(&path).map_err(|e| read_error(&path, e))?;
        let mut bytes = Vec::new();
        // Guard against the file growing after the metadata check.
        file.take(max + 1)
            .read_to_end(&mut bytes)
            .map_err(|e| read_error(&path, e))?;
        let read_len = bytes.len() as u64;
        if read_len > max {
            return Err(too_large(&path, read_len, max));
        }

        encoding.decode(bytes).map_err(|reason| {
            AppError::resource(
                ResourceKind::DecodeError,
                &path,
                format!("Encoding error in {}: {reason}", path.display()),
            )
        })
    }

    /// Encode and atomically write `content` to `path`.
    ///
    /// # Errors
    /// Validation, size and write failures. The target is only ever touched
    /// by the final rename, so on error it is unchanged.
    pub fn write(&self, path: &Path, content: &str, options: &WriteOptions<'_>) -> Result<()> {
        let bytes = options.encoding.encode(content)?;
        self.write_bytes(path, &bytes, options)
    }

    /// Atomically write raw bytes to `path`.
    ///
    /// # Errors
    /// See [`SecureFileOps::write`].
    pub fn write_bytes(&self, path: &Path, bytes: &[u8], options: &WriteOptions<'_>) -> Result<()> {
        self.write_staged(path, bytes, options, |_| Ok(()))
    }

    /// The write pipeline. `before_commit` runs after the temp file is fully
    /// written and chmodded, immediately before the rename.
    pub(crate) fn write_staged<F>(
        &self,
        path: &Path,
        bytes: &[u8],
        options: &WriteOptions<'_>,
        before_commit: F,
    ) -> Result<()>
    where
        F: FnOnce(&Path) -> std::io::Result<()>,
    {
        let path = self.scoped(path);
        self.check_path(&path, options.allowed_extensions)?;

        let max = self.limits.max_config_bytes;
        if bytes.len() as u64 > max {
            return Err(AppError::resource(
                ResourceKind::TooLarge,
                &path,
                format!("Content too large: {} bytes (max: {max})", bytes.len()),
            ));
        }

        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| {
            AppError::io(format!("Failed to create directory {}", parent.display()), e)
        })?;

        if options.create_backup && path.exists() {
            let backup = backup_path_for(&path);
            if let Err(e) = fs::copy(&path, &backup) {
                tracing::warn!(
                    path = %path.display(),
                    backup = %backup.display(),
                    error = %e,
                    "Could not create backup, continuing with write"
                );
            }
        }

        // Same directory as the target so the final rename stays on one filesystem.
        // Dropping the temp file on any error below removes it from disk.
        let mut temp = tempfile::Builder::new()
            .prefix(".blastdock-")
            .suffix(".tmp")
            .tempfile_in(&parent)
            .map_err(|e| write_error(&path, "Failed to create temporary file", e))?;

        fill(&mut temp, bytes)
            .map_err(|e| write_error(&path, "Failed to write temporary file", e))?;

        set_mode(temp.path(), options.mode)
            .map_err(|e| write_error(&path, "Failed to set permissions on temporary file", e))?;

        before_commit(temp.path())
            .map_err(|e| write_error(&path, "Failed to prepare temporary file", e))?;

        temp.persist(&path)
            .map_err(|e| write_error(&path, "Failed to replace target file", e.error))?;

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "File written");
        Ok(())
    }
}

fn fill(temp: &mut tempfile::NamedTempFile, bytes: &[u8]) -> std::io::Result<()> {
    temp.write_all(bytes)?;
    temp.flush()?;
    temp.as_file().sync_all()
}

fn read_error(path: &Path, err: std::io::Error) -> AppError {
    let (kind, message) = match err.kind() {
        ErrorKind::NotFound => (ResourceKind::NotFound, "File does not exist"),
        ErrorKind::PermissionDenied => (ResourceKind::NotReadable, "File is not readable"),
        ErrorKind::InvalidData => (ResourceKind::DecodeError, "Encoding error"),
        _ => (ResourceKind::NotReadable, "Failed to read file"),
    };
    AppError::resource_io(kind, path, format!("{message}: {}", path.display()), err)
}

fn write_error(path: &Path, context: &str, err: std::io::Error) -> AppError {
    AppError::resource_io(
        ResourceKind::WriteFailed,
        path,
        format!("{context} for {}: {err}", path.display()),
        err,
    )
}

fn too_large(path: &Path, size: u64, max: u64) -> AppError {
    AppError::resource(
        ResourceKind::TooLarge,
        path,
        format!("File too large: {size} bytes (max: {max})"),
    )
}
