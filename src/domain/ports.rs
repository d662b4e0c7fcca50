//! Collaborator contracts consumed by the configuration manager.

use super::error::Result;
use super::models::BackupEntry;
use super::settings::DeploymentConfig;

/// Loads and stores one configuration document per named profile.
pub trait ConfigPersistence {
    /// Whether a persisted document exists for `profile`.
    fn exists(&self, profile: &str) -> bool;

    /// Load the persisted document.
    ///
    /// # Errors
    /// A missing document must satisfy `AppError::is_not_found`; an
    /// unparseable one is a configuration error.
    fn load(&self, profile: &str) -> Result<DeploymentConfig>;

    /// Persist the document, replacing any previous one atomically.
    ///
    /// # Errors
    /// Returns error if the document could not be written.
    fn save(&self, profile: &str, document: &DeploymentConfig) -> Result<()>;

    /// Remove the persisted document. Removing a missing profile succeeds.
    ///
    /// # Errors
    /// Returns error if the document exists but could not be removed.
    fn delete(&self, profile: &str) -> Result<()>;
}

/// Snapshots a profile's previous document before it is overwritten.
pub trait BackupManager {
    /// # Errors
    /// Returns error if the snapshot could not be written.
    fn create_backup(&self, profile: &str, document: &DeploymentConfig) -> Result<BackupEntry>;
}
