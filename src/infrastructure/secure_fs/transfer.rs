//! TOCTOU-aware copy and overwrite-then-unlink delete.

use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use rand::RngCore;

use crate::domain::{AppError, RaceKind, ResourceKind, Result};

use super::{set_mode, SecureFileOps, DEFAULT_FILE_MODE};

const SHRED_CHUNK_SIZE: usize = 8192;

/// Content written over a file during secure deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShredPass {
    Zeros,
    Random,
}

impl SecureFileOps {
    /// Copy `src` to `dst`, returning the number of bytes copied.
    ///
    /// The content lands in a temp file next to `dst` which is renamed over
    /// it only once complete, so `dst` is never left half-written. The source
    /// may disappear between the checks and the copy; that is reported as a
    /// race condition rather than a generic failure.
    ///
    /// # Errors
    /// Not found, validation, size, race and copy errors, each distinguishable.
    pub fn copy(&self, src: &Path, dst: &Path, preserve_permissions: bool) -> Result<u64> {
        self.copy_staged(src, dst, preserve_permissions, || {}, |_| Ok(()))
    }

    /// Copy pipeline. `before_copy` runs after every check has passed and
    /// `before_commit` just before the temp file replaces `dst`.
    pub(crate) fn copy_staged<F, G>(
        &self,
        src: &Path,
        dst: &Path,
        preserve_permissions: bool,
        before_copy: F,
        before_commit: G,
    ) -> Result<u64>
    where
        F: FnOnce(),
        G: FnOnce(&Path) -> std::io::Result<()>,
    {
        let src = self.scoped(src);
        let dst = self.scoped(dst);

        if !src.exists() {
            return Err(AppError::resource(
                ResourceKind::NotFound,
                &src,
                format!("Source file does not exist: {}", src.display()),
            ));
        }

        for path in [&src, &dst] {
            let outcome = self.validate(path, None);
            if !outcome.ok {
                return Err(AppError::validation(format!(
                    "Invalid path {}: {}",
                    path.display(),
                    outcome.reason.unwrap_or_default()
                )));
            }
        }

        let metadata = fs::metadata(&src).map_err(|e| match e.kind() {
            ErrorKind::NotFound => AppError::race(RaceKind::DeletedDuringValidation, &src, e),
            ErrorKind::PermissionDenied => AppError::resource_io(
                ResourceKind::PermissionDenied,
                &src,
                format!("Permission denied during validation of {}", src.display()),
                e,
            ),
            _ => AppError::io(format!("Failed to inspect {}", src.display()), e),
        })?;
        if !metadata.is_file() {
            return Err(AppError::resource(
                ResourceKind::NotAFile,
                &src,
                format!("{} is not a regular file", src.display()),
            ));
        }
        let max = self.limits.max_config_bytes;
        if metadata.len() > max {
            return Err(too_large(&src, metadata.len(), max));
        }

        let parent = match dst.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(|e| {
            AppError::io(format!("Failed to create directory {}", parent.display()), e)
        })?;

        before_copy();

        let source = File::open(&src).map_err(|e| copy_error(&src, e))?;
        let mut temp = tempfile::Builder::new()
            .prefix(".blastdock-")
            .suffix(".tmp")
            .tempfile_in(&parent)
            .map_err(|e| copy_error(&dst, e))?;

        // The source may have grown since it was measured.
        let copied = io::copy(&mut source.take(max + 1), &mut temp)
            .map_err(|e| copy_error(&src, e))?;
        if copied > max {
            return Err(too_large(&src, copied, max));
        }

        let chmod = if preserve_permissions {
            fs::set_permissions(temp.path(), metadata.permissions())
        } else {
            set_mode(temp.path(), DEFAULT_FILE_MODE)
        };
        chmod.map_err(|e| copy_error(&dst, e))?;

        temp.flush().map_err(|e| copy_error(&dst, e))?;
        temp.as_file().sync_all().map_err(|e| copy_error(&dst, e))?;
        before_commit(temp.path()).map_err(|e| copy_error(&dst, e))?;
        temp.persist(&dst).map_err(|e| copy_error(&dst, e.error))?;

        tracing::debug!(
            src = %src.display(),
            dst = %dst.display(),
            bytes = copied,
            "File copied"
        );
        Ok(copied)
    }

    /// Delete `path`. A missing path counts as already deleted.
    ///
    /// With `secure`, a regular file is overwritten with zeros and then with
    /// random bytes, each pass flushed and synced, before it is unlinked. A
    /// failed pass aborts the delete and leaves the file in place.
    ///
    /// # Errors
    /// Validation errors and overwrite/unlink failures.
    pub fn delete(&self, path: &Path, secure: bool) -> Result<()> {
        let path = self.scoped(path);

        let metadata = match fs::symlink_metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(delete_error(&path, e)),
        };

        self.check_path(&path, None)?;

        if metadata.is_dir() {
            return Err(AppError::resource(
                ResourceKind::NotAFile,
                &path,
                format!("{} is a directory", path.display()),
            ));
        }

        if secure {
            if metadata.file_type().is_symlink() {
                // Overwriting through the link would destroy its target.
                tracing::warn!(path = %path.display(), "Symlink removed without overwrite");
            } else {
                let mut file = OpenOptions::new()
                    .write(true)
                    .open(&path)
                    .map_err(|e| delete_error(&path, e))?;
                let len = file.metadata().map_err(|e| delete_error(&path, e))?.len();
                shred(&mut file, len, ShredPass::Zeros).map_err(|e| delete_error(&path, e))?;
                shred(&mut file, len, ShredPass::Random).map_err(|e| delete_error(&path, e))?;
            }
        }

        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(delete_error(&path, e)),
        }

        tracing::debug!(path = %path.display(), secure, "File deleted");
        Ok(())
    }
}

/// Overwrite the first `len` bytes of `file` in place, then flush and fsync.
pub(crate) fn shred(file: &mut File, len: u64, pass: ShredPass) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(0))?;

    let mut rng = rand::rng();
    let mut buf = [0u8; SHRED_CHUNK_SIZE];
    let mut remaining = len;
    while remaining > 0 {
        let n = usize::try_from(remaining).map_or(SHRED_CHUNK_SIZE, |r| r.min(SHRED_CHUNK_SIZE));
        match pass {
            ShredPass::Zeros => buf[..n].fill(0),
            ShredPass::Random => rng.fill_bytes(&mut buf[..n]),
        }
        file.write_all(&buf[..n])?;
        remaining -= n as u64;
    }

    file.flush()?;
    file.sync_all()
}

fn copy_error(path: &Path, err: std::io::Error) -> AppError {
    match err.kind() {
        ErrorKind::NotFound => AppError::race(RaceKind::DeletedDuringCopy, path, err),
        ErrorKind::PermissionDenied => AppError::resource_io(
            ResourceKind::CopyPermissionDenied,
            path,
            format!("Permission denied during copy: {err}"),
            err,
        ),
        _ => AppError::resource_io(
            ResourceKind::CopyFailed,
            path,
            format!("OS error during copy: {err}"),
            err,
        ),
    }
}

fn too_large(path: &Path, size: u64, max: u64) -> AppError {
    AppError::resource(
        ResourceKind::TooLarge,
        path,
        format!("Source file too large: {size} bytes (max: {max})"),
    )
}

fn delete_error(path: &Path, err: std::io::Error) -> AppError {
    let kind = if err.kind() == ErrorKind::PermissionDenied {
        ResourceKind::PermissionDenied
    } else {
        ResourceKind::DeleteFailed
    };
    AppError::resource_io(
        kind,
        path,
        format!("Failed to delete file {}: {err}", path.display()),
        err,
    )
}
