//! `<profile>.toml.backup` snapshots.
//!
//! One backup per profile; each new snapshot replaces the previous one.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::domain::{
    backup_path_for, AppError, BackupEntry, BackupManager, DeploymentConfig, ResourceKind, Result,
    TextEncoding,
};
use crate::infrastructure::profile_store::profile_file;
use crate::infrastructure::secure_fs::{SecureFileOps, WriteOptions};

const BACKUP_FILE_MODE: u32 = 0o600;

/// Writes profile snapshots next to the profile documents.
#[derive(Debug, Clone)]
pub struct FileBackupManager {
    dir: PathBuf,
    ops: SecureFileOps,
}

impl FileBackupManager {
    /// `ops` should be scoped to `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, ops: SecureFileOps) -> Self {
        let dir = dir.into();
        Self {
            dir: std::path::absolute(&dir).unwrap_or(dir),
            ops,
        }
    }

    fn backup_path(&self, profile: &str) -> Result<(PathBuf, PathBuf)> {
        let source = profile_file(&self.dir, profile)?;
        let backup = backup_path_for(&source);
        Ok((source, backup))
    }

    /// The current backup of `profile`, if there is one.
    ///
    /// # Errors
    /// Returns error for invalid names or unreadable metadata.
    pub fn latest_backup(&self, profile: &str) -> Result<Option<BackupEntry>> {
        let (source, backup_path) = self.backup_path(profile)?;
        let metadata = match fs::metadata(&backup_path) {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AppError::io(
                    format!("Failed to read backup metadata {}", backup_path.display()),
                    e,
                ))
            }
        };

        let created_at = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(Some(BackupEntry {
            source,
            backup_path,
            created_at,
        }))
    }

    /// Load the document stored in the backup of `profile`.
    ///
    /// # Errors
    /// Not found if there is no backup; configuration error if it is corrupt.
    pub fn restore_backup(&self, profile: &str) -> Result<DeploymentConfig> {
        let (_, backup_path) = self.backup_path(profile)?;
        let content = self
            .ops
            .read(&backup_path, None, TextEncoding::Utf8)
            .map_err(|e| {
                if e.is_not_found() {
                    AppError::resource(
                        ResourceKind::NotFound,
                        &backup_path,
                        format!("No backup exists for profile '{profile}'"),
                    )
                } else {
                    e
                }
            })?;

        toml::from_str(&content).map_err(|e| {
            AppError::config(format!("Backup of profile '{profile}' is corrupt: {e}"))
        })
    }
}

impl BackupManager for FileBackupManager {
    fn create_backup(&self, profile: &str, document: &DeploymentConfig) -> Result<BackupEntry> {
        let (source, backup_path) = self.backup_path(profile)?;
        let content = toml::to_string_pretty(document)
            .map_err(|e| AppError::config(format!("Failed to serialize backup: {e}")))?;

        let options = WriteOptions {
            create_backup: false,
            mode: BACKUP_FILE_MODE,
            ..WriteOptions::default()
        };
        self.ops.write(&backup_path, &content, &options)?;

        let entry = BackupEntry::new(source);
        tracing::info!(
            profile,
            backup = %entry.backup_path.display(),
            "Profile backup created"
        );
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::tempdir;

    fn manager(dir: &Path) -> FileBackupManager {
        FileBackupManager::new(dir, SecureFileOps::default().with_base_dir(dir))
    }

    #[test]
    fn test_create_and_restore() {
        let dir = tempdir().unwrap();
        let backups = manager(dir.path());
        let mut doc = DeploymentConfig::default();
        doc.log_level = "DEBUG".into();

        let entry = backups.create_backup("default", &doc).unwrap();

        assert_eq!(entry.backup_path, dir.path().join("default.toml.backup"));
        assert!(entry.backup_path.exists());
        assert_eq!(backups.restore_backup("default").unwrap(), doc);
    }

    #[test]
    fn test_new_backup_replaces_previous() {
        let dir = tempdir().unwrap();
        let backups = manager(dir.path());
        let mut first = DeploymentConfig::default();
        first.default_domain = "one.test".into();
        let mut second = DeploymentConfig::default();
        second.default_domain = "two.test".into();

        backups.create_backup("default", &first).unwrap();
        backups.create_backup("default", &second).unwrap();

        assert_eq!(
            backups.restore_backup("default").unwrap().default_domain,
            "two.test"
        );
        let count = fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_missing_backup() {
        let dir = tempdir().unwrap();
        let backups = manager(dir.path());

        assert!(backups.latest_backup("prod").unwrap().is_none());
        assert!(backups.restore_backup("prod").unwrap_err().is_not_found());
    }

    #[test]
    fn test_latest_backup_reports_paths() {
        let dir = tempdir().unwrap();
        let backups = manager(dir.path());
        backups
            .create_backup("prod", &DeploymentConfig::default())
            .unwrap();

        let entry = backups.latest_backup("prod").unwrap().unwrap();
        assert_eq!(entry.source, dir.path().join("prod.toml"));
        assert_eq!(entry.backup_path, dir.path().join("prod.toml.backup"));
    }
}
