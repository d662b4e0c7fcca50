//! Domain layer - core types, errors and collaborator contracts.
//!
//! This layer contains pure domain models and error types
//! without any I/O of its own.

pub mod error;
pub mod models;
pub mod ports;
pub mod settings;

pub use error::{AppError, RaceKind, ResourceKind, Result};
pub use models::{
    backup_path_for, BackupEntry, FileRecord, HashAlgorithm, InsecureFile, PermissionFlags,
    SecurityScanResult, TextEncoding, ValidationOutcome,
};
pub use ports::{BackupManager, ConfigPersistence};
pub use settings::{AppConfig, ConfigProfile, DeploymentConfig, FileLimits, ProfileState};
