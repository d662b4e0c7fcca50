//! TOML profile documents on disk.
//!
//! Each profile lives in `<profiles_dir>/<name>.toml` and is written through
//! the atomic write path, so a failed save never leaves a partial document.

use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::{
    AppError, ConfigPersistence, DeploymentConfig, FileLimits, Result, TextEncoding,
};
use crate::infrastructure::secure_fs::validator::validate_profile_name;
use crate::infrastructure::secure_fs::{SecureFileOps, WriteOptions};

const PROFILE_EXTENSION: &str = "toml";
const PROFILE_EXTENSIONS: &[&str] = &[PROFILE_EXTENSION];
const PROFILE_FILE_MODE: u32 = 0o600;

/// Path of a profile document inside `dir`, after checking the name.
///
/// # Errors
/// Returns a validation error for names that are not safe file stems.
pub fn profile_file(dir: &Path, profile: &str) -> Result<PathBuf> {
    validate_profile_name(profile).into_result()?;
    Ok(dir.join(format!("{profile}.{PROFILE_EXTENSION}")))
}

/// Stores profile documents as TOML files.
#[derive(Debug, Clone)]
pub struct TomlProfileStore {
    dir: PathBuf,
    ops: SecureFileOps,
}

impl TomlProfileStore {
    /// Open (and create if needed) the profile directory.
    ///
    /// # Errors
    /// Returns error if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>, limits: FileLimits) -> Result<Self> {
        let dir = dir.into();
        let created = !dir.exists();
        fs::create_dir_all(&dir)
            .map_err(|e| AppError::io(format!("Failed to create profile directory {}", dir.display()), e))?;
        // Profile paths are built from `dir` and then handed to ops scoped to it.
        let dir = std::path::absolute(&dir)
            .map_err(|e| AppError::io(format!("Failed to resolve profile directory {}", dir.display()), e))?;

        let ops = SecureFileOps::new(limits).with_base_dir(&dir);
        if created {
            ops.set_secure_permissions(&dir, true)?;
        }

        Ok(Self { dir, ops })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File operations scoped to the profile directory.
    #[must_use]
    pub const fn ops(&self) -> &SecureFileOps {
        &self.ops
    }

    /// # Errors
    /// Returns a validation error for unsafe profile names.
    pub fn profile_path(&self, profile: &str) -> Result<PathBuf> {
        profile_file(&self.dir, profile)
    }

    /// Names of all stored profiles, sorted.
    ///
    /// # Errors
    /// Returns error if the directory cannot be listed.
    pub fn list_profiles(&self) -> Result<Vec<String>> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| AppError::io(format!("Failed to read directory {}", self.dir.display()), e))?;

        let mut names: Vec<String> = entries
            .filter_map(std::result::Result::ok)
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().is_some_and(|ext| ext == PROFILE_EXTENSION))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
            .filter(|name| validate_profile_name(name).ok)
            .collect();
        names.sort();

        Ok(names)
    }
}

impl ConfigPersistence for TomlProfileStore {
    fn exists(&self, profile: &str) -> bool {
        self.profile_path(profile).is_ok_and(|path| path.is_file())
    }

    fn load(&self, profile: &str) -> Result<DeploymentConfig> {
        let path = self.profile_path(profile)?;
        let content = self
            .ops
            .read(&path, None, TextEncoding::Utf8)
            .map_err(|e| match e.reason() {
                Some("decode error") => AppError::config(format!(
                    "Profile '{profile}' at {} is not valid UTF-8",
                    path.display()
                )),
                _ => e,
            })?;

        toml::from_str(&content).map_err(|e| {
            AppError::config(format!(
                "Profile '{profile}' at {} is corrupt: {e}",
                path.display()
            ))
        })
    }

    fn save(&self, profile: &str, document: &DeploymentConfig) -> Result<()> {
        let path = self.profile_path(profile)?;
        let content = toml::to_string_pretty(document)
            .map_err(|e| AppError::config(format!("Failed to serialize profile '{profile}': {e}")))?;

        let options = WriteOptions {
            create_backup: false,
            mode: PROFILE_FILE_MODE,
            allowed_extensions: Some(PROFILE_EXTENSIONS),
            ..WriteOptions::default()
        };
        self.ops.write(&path, &content, &options)?;

        tracing::info!(profile, path = %path.display(), "Profile saved");
        Ok(())
    }

    /// The profile's backup is kept.
    fn delete(&self, profile: &str) -> Result<()> {
        let path = self.profile_path(profile)?;
        self.ops.delete(&path, false)?;
        tracing::info!(profile, path = %path.display(), "Profile deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(dir: &Path) -> TomlProfileStore {
        TomlProfileStore::open(dir.join("profiles"), FileLimits::default()).unwrap()
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let mut doc = DeploymentConfig::default();
        doc.default_domain = "shop.test".into();
        doc.set("registry.mirror", toml::Value::String("https://mirror.test".into()))
            .unwrap();

        store.save("staging", &doc).unwrap();

        assert!(store.exists("staging"));
        assert_eq!(store.load("staging").unwrap(), doc);
    }

    #[test]
    fn test_load_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let err = store(dir.path()).load("ghost").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_corrupt_is_config_error() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        fs::write(store.dir().join("broken.toml"), "default_ports = [1, 2").unwrap();

        let err = store.load("broken").unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("corrupt"));
    }

    #[test]
    fn test_rejects_unsafe_profile_names() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        assert!(store.save("../escape", &DeploymentConfig::default()).is_err());
        assert!(!store.exists("../escape"));
    }

    #[test]
    fn test_list_and_delete() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.save("prod", &DeploymentConfig::default()).unwrap();
        store.save("dev", &DeploymentConfig::default()).unwrap();
        fs::write(store.dir().join("notes.txt"), "x").unwrap();

        assert_eq!(store.list_profiles().unwrap(), vec!["dev", "prod"]);

        store.delete("dev").unwrap();
        assert_eq!(store.list_profiles().unwrap(), vec!["prod"]);
    }

    #[test]
    fn test_relative_directory() {
        let parent = tempfile::tempdir_in(".").unwrap();
        let relative = parent.path().join("profiles");
        assert!(relative.is_relative());

        let store = TomlProfileStore::open(relative.clone(), FileLimits::default()).unwrap();
        store.save("default", &DeploymentConfig::default()).unwrap();

        assert!(relative.join("default.toml").is_file());
        assert!(store.exists("default"));
        assert_eq!(store.list_profiles().unwrap(), vec!["default"]);
        assert_eq!(store.load("default").unwrap(), DeploymentConfig::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_profile_files_are_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = store(dir.path());
        store.save("default", &DeploymentConfig::default()).unwrap();

        let mode = fs::metadata(store.profile_path("default").unwrap())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
