//! Infrastructure layer - filesystem adapters.
//!
//! This layer handles all I/O operations: validated atomic file access,
//! profile documents, backups and the settings file.

pub mod backup_store;
pub mod config;
pub mod profile_store;
pub mod secure_fs;

pub use backup_store::FileBackupManager;
pub use config::{ensure_config_exists, load_config, save_config};
pub use profile_store::TomlProfileStore;
pub use secure_fs::{SecureFileOps, WriteOptions};
