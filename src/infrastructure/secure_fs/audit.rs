//! Integrity hashing and permission auditing.

use std::fmt::Write as _;
use std::fs::{self, File, Metadata};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use walkdir::WalkDir;

use crate::domain::{
    AppError, FileRecord, HashAlgorithm, InsecureFile, PermissionFlags, ResourceKind, Result,
    SecurityScanResult,
};

use super::validator::{extension_of, resolve, DANGEROUS_EXTENSIONS};
use super::{set_mode, SecureFileOps};

const HASH_CHUNK_SIZE: usize = 4096;

const SECURE_DIR_MODE: u32 = 0o750;
const SECURE_FILE_MODE: u32 = 0o640;

const TEMP_DIR_PREFIX: &str = "blastdock_";
const TEMP_DIR_MODE: u32 = 0o700;

impl SecureFileOps {
    /// Hex digest of a file, streamed in fixed-size chunks.
    ///
    /// # Errors
    /// Returns a resource error if the file cannot be opened or read.
    pub fn hash(&self, path: &Path, algorithm: HashAlgorithm) -> Result<String> {
        let path = self.scoped(path);
        self.check_scope(&path)?;
        let file = File::open(&path).map_err(|e| stat_error(&path, e))?;

        let digest = match algorithm {
            HashAlgorithm::Md5 => digest_reader::<Md5>(file),
            HashAlgorithm::Sha1 => digest_reader::<Sha1>(file),
            HashAlgorithm::Sha256 => digest_reader::<Sha256>(file),
            HashAlgorithm::Sha512 => digest_reader::<Sha512>(file),
        };

        digest.map_err(|e| {
            AppError::resource_io(
                ResourceKind::NotReadable,
                &path,
                format!("Failed to calculate hash of {}", path.display()),
                e,
            )
        })
    }

    /// Compare a file's digest with `expected`, ignoring hex case.
    ///
    /// # Errors
    /// Returns `AppError::Integrity` on mismatch, or the hashing error.
    pub fn verify(&self, path: &Path, expected: &str, algorithm: HashAlgorithm) -> Result<()> {
        let actual = self.hash(path, algorithm)?;
        let expected = expected.trim();
        if actual.eq_ignore_ascii_case(expected) {
            Ok(())
        } else {
            Err(AppError::Integrity {
                path: self.scoped(path),
                expected: expected.to_string(),
                actual,
            })
        }
    }

    /// Inspect permissions and ownership of `path` as it is on disk right now.
    ///
    /// # Errors
    /// Returns a resource error if the path cannot be stat'ed.
    pub fn audit_permissions(&self, path: &Path) -> Result<FileRecord> {
        let path = self.scoped(path);
        self.check_scope(&path)?;
        let metadata = fs::metadata(&path).map_err(|e| stat_error(&path, e))?;
        Ok(file_record(&path, &metadata))
    }

    /// Recursively audit every directory and file below `path`.
    ///
    /// Symlinks are not followed into directories. Entries that cannot be read
    /// are reported as issues rather than aborting the scan.
    ///
    /// # Errors
    /// Returns error only if `path` exists but cannot be inspected.
    pub fn scan_directory(&self, path: &Path) -> Result<SecurityScanResult> {
        let root = self.scoped(path);
        self.check_scope(&root)?;
        if !root.exists() {
            return Ok(SecurityScanResult::default());
        }

        let mut result = SecurityScanResult {
            exists: true,
            ..SecurityScanResult::default()
        };

        for entry in WalkDir::new(&root).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let location = e
                        .path()
                        .map_or_else(|| root.display().to_string(), |p| p.display().to_string());
                    result
                        .security_issues
                        .push(format!("Unreadable entry {location}: {e}"));
                    continue;
                }
            };
            let entry_path = entry.path();

            if entry.file_type().is_dir() {
                if entry.depth() > 0 {
                    result.directory_count += 1;
                }
                let metadata = match entry.metadata() {
                    Ok(m) => m,
                    Err(e) => {
                        result
                            .security_issues
                            .push(format!("Unreadable entry {}: {e}", entry_path.display()));
                        continue;
                    }
                };
                let record = file_record(entry_path, &metadata);
                result.security_issues.extend(
                    record
                        .security_issues
                        .iter()
                        .map(|issue| format!("Directory {}: {issue}", entry_path.display())),
                );
                continue;
            }

            // Symlinked files are audited through their target.
            let metadata = match fs::metadata(entry_path) {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!(path = %entry_path.display(), error = %e, "Skipping dangling entry");
                    continue;
                }
            };

            result.file_count += 1;
            result.total_size += metadata.len();

            let record = file_record(entry_path, &metadata);
            if !record.is_secure() {
                result.security_issues.extend(
                    record
                        .security_issues
                        .iter()
                        .map(|issue| format!("File {}: {issue}", entry_path.display())),
                );
                result.insecure_files.push(InsecureFile {
                    path: entry_path.to_path_buf(),
                    issues: record.security_issues,
                });
            }

            if DANGEROUS_EXTENSIONS.contains(&extension_of(entry_path).as_str()) {
                result
                    .security_issues
                    .push(format!("Dangerous file: {}", entry_path.display()));
                result.insecure_files.push(InsecureFile {
                    path: entry_path.to_path_buf(),
                    issues: vec!["Dangerous file extension".to_string()],
                });
            }
        }

        tracing::info!(
            path = %root.display(),
            files = result.file_count,
            directories = result.directory_count,
            issues = result.security_issues.len(),
            "Security scan completed"
        );

        Ok(result)
    }

    /// Restrict a file to `0o640` or a directory to `0o750`.
    ///
    /// # Errors
    /// Returns error if the path is missing or cannot be chmodded.
    pub fn set_secure_permissions(&self, path: &Path, is_directory: bool) -> Result<()> {
        let path = self.scoped(path);
        self.check_scope(&path)?;
        if !path.exists() {
            return Err(AppError::resource(
                ResourceKind::NotFound,
                &path,
                format!("File does not exist: {}", path.display()),
            ));
        }
        let mode = if is_directory {
            SECURE_DIR_MODE
        } else {
            SECURE_FILE_MODE
        };
        set_mode(&path, mode).map_err(|e| permission_error(&path, e))
    }

    /// Create a directory tree and set `mode` explicitly so the umask cannot widen it.
    ///
    /// # Errors
    /// Returns a validation error for unsafe paths, or the creation error.
    pub fn create_secure_directory(&self, path: &Path, mode: u32) -> Result<()> {
        let path = self.scoped(path);
        self.check_path(&path, None)?;
        fs::create_dir_all(&path)
            .map_err(|e| AppError::io(format!("Failed to create directory {}", path.display()), e))?;
        set_mode(&path, mode).map_err(|e| permission_error(&path, e))
    }

    /// Create a fresh `blastdock_*` directory under the system temp dir,
    /// readable only by the owner. It persists until `cleanup_temp_dir`.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created or restricted.
    pub fn create_temp_dir() -> Result<PathBuf> {
        let dir = tempfile::Builder::new()
            .prefix(TEMP_DIR_PREFIX)
            .tempdir()
            .map_err(|e| AppError::io("Failed to create temporary directory", e))?
            .keep();
        set_mode(&dir, TEMP_DIR_MODE).map_err(|e| permission_error(&dir, e))?;

        tracing::debug!(path = %dir.display(), "Temporary directory created");
        Ok(dir)
    }

    /// Remove a directory tree below the system temp dir.
    ///
    /// Returns `false` without touching anything if `path` is missing, is not
    /// a directory, or lies outside the temp dir.
    ///
    /// # Errors
    /// Returns error if the removal itself fails.
    pub fn cleanup_temp_dir(path: &Path) -> Result<bool> {
        let temp_root = resolve(&std::env::temp_dir());
        let target = resolve(path);

        if !target.is_dir() {
            return Ok(false);
        }
        if target == temp_root || !target.starts_with(&temp_root) {
            tracing::warn!(path = %path.display(), "Refusing to remove directory outside temp dir");
            return Ok(false);
        }

        fs::remove_dir_all(&target).map_err(|e| {
            AppError::io(format!("Failed to remove temporary directory {}", target.display()), e)
        })?;
        tracing::debug!(path = %target.display(), "Temporary directory removed");
        Ok(true)
    }
}

fn digest_reader<D: Digest>(mut reader: impl Read) -> std::io::Result<String> {
    let mut hasher = D::new();
    let mut buf = [0u8; HASH_CHUNK_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }

    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        let _ = write!(hex, "{byte:02x}");
    }
    Ok(hex)
}

/// Build a record and classify its issues.
fn file_record(path: &Path, metadata: &Metadata) -> FileRecord {
    let (mode, uid, gid) = ownership(metadata);
    let permissions = PermissionFlags::from_mode(mode);
    let is_directory = metadata.is_dir();

    let mut security_issues = Vec::new();
    if permissions.other_write {
        security_issues.push("File is world-writable".to_string());
    }
    if permissions.other_execute && !is_directory {
        security_issues.push("File is world-executable".to_string());
    }
    if permissions.group_write {
        security_issues.push("File is group-writable".to_string());
    }

    FileRecord {
        path: path.to_path_buf(),
        size: metadata.len(),
        mode,
        permissions,
        octal: format!("{:03o}", mode & 0o777),
        is_directory,
        owner_uid: uid,
        group_gid: gid,
        security_issues,
    }
}

#[cfg(unix)]
fn ownership(metadata: &Metadata) -> (u32, u32, u32) {
    use std::os::unix::fs::MetadataExt;
    (metadata.mode(), metadata.uid(), metadata.gid())
}

#[cfg(not(unix))]
fn ownership(metadata: &Metadata) -> (u32, u32, u32) {
    let mode = if metadata.permissions().readonly() { 0o444 } else { 0o644 };
    (mode, 0, 0)
}

fn stat_error(path: &Path, err: std::io::Error) -> AppError {
    let (kind, message) = match err.kind() {
        ErrorKind::NotFound => (ResourceKind::NotFound, "File does not exist"),
        ErrorKind::PermissionDenied => (ResourceKind::PermissionDenied, "Permission denied"),
        _ => (ResourceKind::NotReadable, "Cannot inspect file"),
    };
    AppError::resource_io(kind, path, format!("{message}: {}", path.display()), err)
}

fn permission_error(path: &Path, err: std::io::Error) -> AppError {
    AppError::resource_io(
        ResourceKind::PermissionDenied,
        path,
        format!("Failed to set permissions on {}", path.display()),
        err,
    )
}
