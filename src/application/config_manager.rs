//! Profile-scoped configuration manager.
//!
//! Holds at most one active profile. Saving snapshots the previously persisted
//! document first; switching profiles either completes or leaves the manager
//! exactly as it was.

use crate::domain::{
    AppError, BackupManager, ConfigPersistence, ConfigProfile, DeploymentConfig, ProfileState,
    Result,
};
use crate::infrastructure::secure_fs::validator::validate_profile_name;

/// Configuration manager over a persistence layer and a backup manager.
pub struct ConfigManager<P, B> {
    persistence: P,
    backups: B,
    active: Option<ConfigProfile>,
    auto_save: bool,
}

impl<P: ConfigPersistence, B: BackupManager> ConfigManager<P, B> {
    /// Create a manager with no active profile.
    #[must_use]
    pub const fn new(persistence: P, backups: B, auto_save: bool) -> Self {
        Self {
            persistence,
            backups,
            active: None,
            auto_save,
        }
    }

    /// Create a manager and load `profile`.
    ///
    /// # Errors
    /// Returns error if the profile cannot be loaded.
    pub fn open(persistence: P, backups: B, profile: &str, auto_save: bool) -> Result<Self> {
        let mut manager = Self::new(persistence, backups, auto_save);
        manager.load(profile)?;
        Ok(manager)
    }

    /// Make `profile` the active, clean profile.
    ///
    /// A profile with no persisted document starts from the defaults, which
    /// are persisted immediately.
    ///
    /// # Errors
    /// Returns a validation error for unsafe names and a configuration error
    /// for corrupt documents.
    pub fn load(&mut self, profile: &str) -> Result<&DeploymentConfig> {
        validate_profile_name(profile).into_result()?;

        let document = match self.persistence.load(profile) {
            Ok(document) => document,
            Err(e) if e.is_not_found() => {
                tracing::info!(profile, "Profile not found, creating with defaults");
                let document = DeploymentConfig::default();
                self.persistence.save(profile, &document)?;
                document
            }
            Err(e) if e.is_configuration() => return Err(e),
            Err(e) => {
                return Err(AppError::config(format!(
                    "Failed to load profile '{profile}': {e}"
                )))
            }
        };

        tracing::debug!(profile, "Profile loaded");
        let active = self.active.insert(ConfigProfile::clean(profile, document));
        Ok(&active.document)
    }

    /// Persist the active profile, backing up the previous document first.
    ///
    /// A backup that fails because the previous document vanished is logged
    /// and skipped. Any other backup failure aborts the save.
    ///
    /// # Errors
    /// Returns error if no profile is loaded, the backup fails, or the
    /// document cannot be written.
    pub fn save(&mut self) -> Result<()> {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| AppError::config("No configuration profile loaded"))?;

        if self.persistence.exists(&active.name) {
            let backup = self
                .persistence
                .load(&active.name)
                .and_then(|previous| self.backups.create_backup(&active.name, &previous));
            match backup {
                Ok(entry) => {
                    tracing::debug!(
                        profile = %active.name,
                        backup = %entry.backup_path.display(),
                        "Backed up previous document"
                    );
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!(
                        profile = %active.name,
                        error = %e,
                        "Previous document disappeared, saving without backup"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        self.persistence.save(&active.name, &active.document)?;
        active.dirty = false;
        Ok(())
    }

    /// Switch the active profile to `profile`.
    ///
    /// With auto-save on, a dirty profile is saved first; if that fails
    /// nothing changes. If the new profile cannot be loaded the previous one
    /// is restored, including its unsaved edits.
    ///
    /// # Errors
    /// `AppError::SwitchAborted` if the auto-save failed,
    /// `AppError::SwitchRolledBack` if loading the new profile failed.
    pub fn switch_profile(&mut self, profile: &str) -> Result<()> {
        let Some(current) = self.active.as_ref() else {
            self.load(profile)?;
            return Ok(());
        };
        if current.name == profile {
            return Ok(());
        }
        let from = current.name.clone();

        if self.auto_save && current.dirty {
            if let Err(e) = self.save() {
                return Err(AppError::SwitchAborted {
                    from,
                    to: profile.to_string(),
                    source: Box::new(e),
                });
            }
        }

        let previous = self.active.clone();
        match self.load(profile) {
            Ok(_) => {
                tracing::info!(from = %from, to = profile, "Switched profile");
                Ok(())
            }
            Err(e) => {
                self.active = previous;
                tracing::warn!(from = %from, to = profile, error = %e, "Profile switch rolled back");
                Err(AppError::SwitchRolledBack {
                    from,
                    to: profile.to_string(),
                    source: Box::new(e),
                })
            }
        }
    }

    /// Read a setting by dotted key.
    ///
    /// # Errors
    /// Returns error if no profile is loaded.
    pub fn get_setting(&self, key: &str) -> Result<Option<toml::Value>> {
        self.config()?.get(key)
    }

    /// Change a setting by dotted key. Saves immediately when auto-save is on.
    ///
    /// # Errors
    /// Returns error if no profile is loaded, the value is invalid for the
    /// key, or the auto-save fails.
    pub fn set_setting(&mut self, key: &str, value: toml::Value) -> Result<()> {
        self.update(|document| document.set(key, value))
    }

    /// Apply `change` to the active document and mark it dirty.
    ///
    /// The document is left untouched if `change` fails.
    ///
    /// # Errors
    /// Returns error if no profile is loaded, `change` fails, or the
    /// auto-save fails.
    pub fn update<F>(&mut self, change: F) -> Result<()>
    where
        F: FnOnce(&mut DeploymentConfig) -> Result<()>,
    {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| AppError::config("No configuration profile loaded"))?;

        let mut document = active.document.clone();
        change(&mut document)?;
        if document == active.document {
            return Ok(());
        }
        active.document = document;
        active.dirty = true;

        if self.auto_save {
            self.save()?;
        }
        Ok(())
    }

    /// Replace the active document with the defaults.
    ///
    /// # Errors
    /// Returns error if no profile is loaded or the auto-save fails.
    pub fn reset_to_defaults(&mut self) -> Result<()> {
        self.update(|document| {
            *document = DeploymentConfig::default();
            Ok(())
        })
    }

    /// Remove a stored profile other than the active one.
    ///
    /// # Errors
    /// Returns a validation error for the active profile or unsafe names.
    pub fn delete_profile(&self, profile: &str) -> Result<()> {
        validate_profile_name(profile).into_result()?;
        if self.profile_name() == Some(profile) {
            return Err(AppError::validation(format!(
                "Cannot delete the active profile '{profile}'"
            )));
        }
        self.persistence.delete(profile)
    }

    /// Default port for `service`, if configured.
    #[must_use]
    pub fn default_port(&self, service: &str) -> Option<u16> {
        self.active
            .as_ref()
            .and_then(|p| p.document.default_ports.get(service).copied())
    }

    /// Falls back to the default document when no profile is loaded.
    #[must_use]
    pub fn should_auto_generate_passwords(&self) -> bool {
        self.active.as_ref().map_or_else(
            || DeploymentConfig::default().auto_generate_passwords,
            |p| p.document.auto_generate_passwords,
        )
    }

    #[must_use]
    pub fn should_confirm_destructive_operations(&self) -> bool {
        self.active.as_ref().map_or_else(
            || DeploymentConfig::default().confirm_destructive_operations,
            |p| p.document.confirm_destructive_operations,
        )
    }

    #[must_use]
    pub fn state(&self) -> ProfileState {
        match &self.active {
            None => ProfileState::NoProfile,
            Some(p) if p.dirty => ProfileState::Dirty,
            Some(_) => ProfileState::Clean,
        }
    }

    #[must_use]
    pub fn profile_name(&self) -> Option<&str> {
        self.active.as_ref().map(|p| p.name.as_str())
    }

    /// The active document.
    ///
    /// # Errors
    /// Returns error if no profile is loaded.
    pub fn config(&self) -> Result<&DeploymentConfig> {
        self.active
            .as_ref()
            .map(|p| &p.document)
            .ok_or_else(|| AppError::config("No configuration profile loaded"))
    }

    #[must_use]
    pub const fn persistence(&self) -> &P {
        &self.persistence
    }

    #[must_use]
    pub const fn backups(&self) -> &B {
        &self.backups
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BackupEntry, ResourceKind};
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::path::PathBuf;

    #[derive(Default)]
    struct MemoryStore {
        documents: RefCell<HashMap<String, DeploymentConfig>>,
        corrupt: RefCell<Vec<String>>,
        fail_save: Cell<bool>,
        /// `exists` reports true but `load` finds nothing.
        vanishing: Cell<bool>,
        loads: Cell<usize>,
        saves: Cell<usize>,
    }

    impl MemoryStore {
        fn with(profile: &str, document: DeploymentConfig) -> Self {
            let store = Self::default();
            store
                .documents
                .borrow_mut()
                .insert(profile.to_string(), document);
            store
        }

        fn stored(&self, profile: &str) -> Option<DeploymentConfig> {
            self.documents.borrow().get(profile).cloned()
        }

        fn not_found(profile: &str) -> AppError {
            AppError::resource(
                ResourceKind::NotFound,
                PathBuf::from(format!("{profile}.toml")),
                format!("File does not exist: {profile}.toml"),
            )
        }
    }

    impl ConfigPersistence for MemoryStore {
        fn exists(&self, profile: &str) -> bool {
            self.vanishing.get() || self.documents.borrow().contains_key(profile)
        }

        fn load(&self, profile: &str) -> Result<DeploymentConfig> {
            self.loads.set(self.loads.get() + 1);
            if self.corrupt.borrow().iter().any(|p| p == profile) {
                return Err(AppError::config(format!("Profile '{profile}' is corrupt")));
            }
            self.stored(profile).ok_or_else(|| Self::not_found(profile))
        }

        fn save(&self, profile: &str, document: &DeploymentConfig) -> Result<()> {
            self.saves.set(self.saves.get() + 1);
            if self.fail_save.get() {
                return Err(AppError::resource(
                    ResourceKind::WriteFailed,
                    PathBuf::from(format!("{profile}.toml")),
                    "Failed to write file",
                ));
            }
            self.documents
                .borrow_mut()
                .insert(profile.to_string(), document.clone());
            Ok(())
        }

        fn delete(&self, profile: &str) -> Result<()> {
            self.documents.borrow_mut().remove(profile);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryBackups {
        taken: RefCell<Vec<(String, DeploymentConfig)>>,
        fail_not_found: Cell<bool>,
        fail_hard: Cell<bool>,
    }

    impl BackupManager for MemoryBackups {
        fn create_backup(&self, profile: &str, document: &DeploymentConfig) -> Result<BackupEntry> {
            if self.fail_not_found.get() {
                return Err(MemoryStore::not_found(profile));
            }
            if self.fail_hard.get() {
                return Err(AppError::resource(
                    ResourceKind::WriteFailed,
                    PathBuf::from(format!("{profile}.toml.backup")),
                    "Disk full",
                ));
            }
            self.taken
                .borrow_mut()
                .push((profile.to_string(), document.clone()));
            Ok(BackupEntry::new(PathBuf::from(format!("{profile}.toml"))))
        }
    }

    fn domain(name: &str) -> DeploymentConfig {
        DeploymentConfig {
            default_domain: name.to_string(),
            ..DeploymentConfig::default()
        }
    }

    fn manager(store: MemoryStore, auto_save: bool) -> ConfigManager<MemoryStore, MemoryBackups> {
        ConfigManager::new(store, MemoryBackups::default(), auto_save)
    }

    #[test]
    fn test_new_manager_has_no_profile() {
        let manager = manager(MemoryStore::default(), true);
        assert_eq!(manager.state(), ProfileState::NoProfile);
        assert!(manager.config().is_err());
        assert!(manager.should_confirm_destructive_operations());
    }

    #[test]
    fn test_load_missing_profile_persists_defaults() {
        let mut manager = manager(MemoryStore::default(), true);

        let doc = manager.load("fresh").unwrap().clone();

        assert_eq!(doc, DeploymentConfig::default());
        assert_eq!(manager.persistence().stored("fresh"), Some(doc));
        assert_eq!(manager.state(), ProfileState::Clean);
    }

    #[test]
    fn test_load_corrupt_profile_is_config_error() {
        let store = MemoryStore::default();
        store.corrupt.borrow_mut().push("broken".into());
        let mut manager = manager(store, true);

        let err = manager.load("broken").unwrap_err();

        assert!(err.is_configuration());
        assert_eq!(manager.state(), ProfileState::NoProfile);
        assert!(manager.persistence().stored("broken").is_none());
    }

    #[test]
    fn test_load_rejects_unsafe_name() {
        let mut manager = manager(MemoryStore::default(), true);
        let err = manager.load("../etc").unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert_eq!(manager.persistence().loads.get(), 0);
    }

    #[test]
    fn test_save_backs_up_existing_document() {
        let mut manager = manager(MemoryStore::with("default", domain("old.test")), false);
        manager.load("default").unwrap();
        manager
            .update(|doc| {
                doc.default_domain = "new.test".into();
                Ok(())
            })
            .unwrap();
        assert_eq!(manager.state(), ProfileState::Dirty);

        manager.save().unwrap();

        let taken = manager.backups().taken.borrow();
        assert_eq!(taken.len(), 1);
        assert_eq!(taken[0].1.default_domain, "old.test");
        assert_eq!(
            manager.persistence().stored("default").unwrap().default_domain,
            "new.test"
        );
        assert_eq!(manager.state(), ProfileState::Clean);
    }

    #[test]
    fn test_save_without_profile_fails() {
        let mut manager = manager(MemoryStore::default(), true);
        assert!(manager.save().unwrap_err().is_configuration());
    }

    #[test]
    fn test_save_continues_when_previous_document_vanished() {
        let store = MemoryStore::default();
        let mut manager = manager(store, false);
        manager.load("default").unwrap();
        manager.persistence().documents.borrow_mut().clear();
        manager.persistence().vanishing.set(true);

        manager.save().unwrap();

        assert!(manager.backups().taken.borrow().is_empty());
        assert!(manager.persistence().stored("default").is_some());
    }

    #[test]
    fn test_save_continues_when_backup_reports_not_found() {
        let mut manager = manager(MemoryStore::with("default", domain("a.test")), false);
        manager.load("default").unwrap();
        manager.backups().fail_not_found.set(true);
        manager
            .set_setting("log_level", toml::Value::String("DEBUG".into()))
            .unwrap();

        manager.save().unwrap();

        assert_eq!(
            manager.persistence().stored("default").unwrap().log_level,
            "DEBUG"
        );
    }

    #[test]
    fn test_save_aborts_on_other_backup_failure() {
        let mut manager = manager(MemoryStore::with("default", domain("a.test")), false);
        manager.load("default").unwrap();
        manager.backups().fail_hard.set(true);
        manager
            .set_setting("log_level", toml::Value::String("DEBUG".into()))
            .unwrap();

        let err = manager.save().unwrap_err();

        assert!(err.is_resource());
        assert_eq!(
            manager.persistence().stored("default").unwrap().log_level,
            "INFO"
        );
        assert_eq!(manager.state(), ProfileState::Dirty);
    }

    #[test]
    fn test_switch_same_profile_is_noop() {
        let mut manager = manager(MemoryStore::with("default", domain("a.test")), true);
        manager.load("default").unwrap();
        let loads = manager.persistence().loads.get();
        let saves = manager.persistence().saves.get();

        manager.switch_profile("default").unwrap();

        assert_eq!(manager.persistence().loads.get(), loads);
        assert_eq!(manager.persistence().saves.get(), saves);
    }

    #[test]
    fn test_switch_auto_saves_dirty_profile() {
        let store = MemoryStore::with("default", domain("a.test"));
        store
            .documents
            .borrow_mut()
            .insert("prod".into(), domain("prod.test"));
        let mut manager = manager(store, true);
        manager.load("default").unwrap();
        // Make the profile dirty without triggering the per-change save.
        manager.active.as_mut().unwrap().document.log_level = "WARNING".into();
        manager.active.as_mut().unwrap().dirty = true;

        manager.switch_profile("prod").unwrap();

        assert_eq!(manager.profile_name(), Some("prod"));
        assert_eq!(manager.config().unwrap().default_domain, "prod.test");
        assert_eq!(manager.state(), ProfileState::Clean);
        assert_eq!(
            manager.persistence().stored("default").unwrap().log_level,
            "WARNING"
        );
    }

    #[test]
    fn test_switch_aborts_when_auto_save_fails() {
        let mut manager = manager(MemoryStore::with("default", domain("a.test")), true);
        manager.load("default").unwrap();
        manager.active.as_mut().unwrap().document.log_level = "ERROR".into();
        manager.active.as_mut().unwrap().dirty = true;
        manager.persistence().fail_save.set(true);

        let err = manager.switch_profile("prod").unwrap_err();

        let message = err.to_string();
        assert!(message.contains("Cannot switch profile"));
        assert!(message.contains("failed to save"));
        assert!(matches!(err, AppError::SwitchAborted { .. }));
        assert_eq!(manager.profile_name(), Some("default"));
        assert_eq!(manager.config().unwrap().log_level, "ERROR");
        assert_eq!(manager.state(), ProfileState::Dirty);
    }

    #[test]
    fn test_switch_rolls_back_when_load_fails() {
        let store = MemoryStore::with("default", domain("a.test"));
        store.corrupt.borrow_mut().push("broken".into());
        let mut manager = manager(store, false);
        manager.load("default").unwrap();
        manager
            .set_setting("default_domain", toml::Value::String("edited.test".into()))
            .unwrap();

        let err = manager.switch_profile("broken").unwrap_err();

        assert!(matches!(err, AppError::SwitchRolledBack { .. }));
        let message = err.to_string();
        assert!(message.contains("broken"));
        assert!(message.contains("Rolled back to profile 'default'"));
        assert!(err.is_configuration());
        assert_eq!(manager.profile_name(), Some("default"));
        assert_eq!(manager.config().unwrap().default_domain, "edited.test");
        assert_eq!(manager.state(), ProfileState::Dirty);
    }

    #[test]
    fn test_switch_from_no_profile_loads() {
        let mut manager = manager(MemoryStore::with("prod", domain("prod.test")), true);
        manager.switch_profile("prod").unwrap();
        assert_eq!(manager.profile_name(), Some("prod"));
    }

    #[test]
    fn test_set_setting_with_auto_save_persists() {
        let mut manager = manager(MemoryStore::default(), true);
        manager.load("default").unwrap();

        manager
            .set_setting("default_ports.redis", toml::Value::Integer(6379))
            .unwrap();

        assert_eq!(manager.default_port("redis"), Some(6379));
        assert_eq!(
            manager
                .persistence()
                .stored("default")
                .unwrap()
                .default_ports
                .get("redis"),
            Some(&6379)
        );
        assert_eq!(manager.state(), ProfileState::Clean);
        assert_eq!(
            manager.get_setting("default_ports.redis").unwrap(),
            Some(toml::Value::Integer(6379))
        );
    }

    #[test]
    fn test_set_setting_rejects_wrong_type() {
        let mut manager = manager(MemoryStore::default(), false);
        manager.load("default").unwrap();

        assert!(manager
            .set_setting("auto_generate_passwords", toml::Value::Integer(1))
            .is_err());
        assert_eq!(manager.state(), ProfileState::Clean);
        assert!(manager.should_auto_generate_passwords());
    }

    #[test]
    fn test_reset_to_defaults() {
        let mut manager = manager(MemoryStore::with("default", domain("custom.test")), false);
        manager.load("default").unwrap();

        manager.reset_to_defaults().unwrap();

        assert_eq!(manager.config().unwrap(), &DeploymentConfig::default());
        assert_eq!(manager.state(), ProfileState::Dirty);
    }

    #[test]
    fn test_file_backed_save_backs_up_in_relative_directory() {
        use crate::infrastructure::{FileBackupManager, TomlProfileStore};
        use crate::domain::FileLimits;

        let parent = tempfile::tempdir_in(".").unwrap();
        let relative = parent.path().join("profiles");
        let store = TomlProfileStore::open(relative.clone(), FileLimits::default()).unwrap();
        let backups = FileBackupManager::new(store.dir(), store.ops().clone());
        let mut manager = ConfigManager::open(store, backups, "default", true).unwrap();

        manager
            .set_setting("log_level", toml::Value::String("DEBUG".into()))
            .unwrap();

        let backup = relative.join("default.toml.backup");
        assert!(backup.is_file());
        assert_eq!(
            manager.backups().restore_backup("default").unwrap().log_level,
            "INFO"
        );
        assert_eq!(manager.persistence().load("default").unwrap().log_level, "DEBUG");
    }

    #[test]
    fn test_delete_profile_refuses_active() {
        let store = MemoryStore::with("default", domain("a.test"));
        store
            .documents
            .borrow_mut()
            .insert("old".into(), domain("old.test"));
        let mut manager = manager(store, true);
        manager.load("default").unwrap();

        assert!(manager.delete_profile("default").is_err());
        manager.delete_profile("old").unwrap();
        assert!(manager.persistence().stored("old").is_none());
    }
}
