//! Settings file management.
//!
//! Handles loading and saving the tool's own TOML settings file.

use std::path::{Path, PathBuf};

use crate::domain::{AppConfig, AppError, Result, TextEncoding};
use crate::infrastructure::secure_fs::{SecureFileOps, WriteOptions};

/// Default settings file content.
const DEFAULT_CONFIG: &str = r#"# BlastDock Configuration Settings
# Auto-generated - edit as needed

[limits]
# Maximum size of configuration files in bytes (default: 10 MiB)
max_config_bytes = 10485760

# Maximum size of log files in bytes (default: 100 MiB)
max_log_bytes = 104857600

# Maximum size of template files in bytes (default: 5 MiB)
max_template_bytes = 5242880

[profiles]
# Profile used when --profile is not given
default_profile = "default"

# Save a modified profile before switching away from it
auto_save = true

[paths]
# Custom data directory (optional, defaults to ~/.blastdock)
# data_dir = "/custom/path"
"#;

const SETTINGS_FILE: &str = "settings.toml";

/// Load settings from `data_dir` (or the default data directory).
///
/// A missing file yields the defaults. The returned config always points at
/// the directory it was loaded from.
///
/// # Errors
/// Returns error if file exists but cannot be read or parsed.
pub fn load_config(data_dir: Option<&Path>) -> Result<AppConfig> {
    let data_dir = data_dir.map_or_else(AppConfig::default_data_dir, Path::to_path_buf);
    let data_dir = std::path::absolute(&data_dir).map_err(|e| {
        AppError::io(format!("Failed to resolve data directory {}", data_dir.display()), e)
    })?;
    let config_path = data_dir.join(SETTINGS_FILE);

    let mut config = if config_path.exists() {
        load_config_from_file(&config_path)?
    } else {
        AppConfig::default()
    };

    let resolved = match config.paths.data_dir.take() {
        Some(custom) => std::path::absolute(&custom).unwrap_or(custom),
        None => data_dir,
    };
    config.paths.data_dir = Some(resolved);
    Ok(config)
}

/// Load settings from a specific file.
///
/// # Errors
/// Returns error if file cannot be read or parsed.
pub fn load_config_from_file(path: &Path) -> Result<AppConfig> {
    let content = SecureFileOps::default().read(path, None, TextEncoding::Utf8)?;

    toml::from_str(&content).map_err(|e| AppError::Config {
        message: format!("Failed to parse settings file {}: {e}", path.display()),
    })
}

/// Save settings to file.
///
/// # Errors
/// Returns error if file cannot be written.
pub fn save_config(config: &AppConfig) -> Result<()> {
    let config_path = config.settings_file_path();

    let content = toml::to_string_pretty(config).map_err(|e| AppError::Config {
        message: format!("Failed to serialize settings: {e}"),
    })?;

    scoped_ops(config).write(&config_path, &content, &WriteOptions::default())?;

    tracing::info!(path = %config_path.display(), "Settings saved");

    Ok(())
}

/// Create default settings file if it doesn't exist.
///
/// # Errors
/// Returns error if file cannot be created.
pub fn ensure_config_exists(config: &AppConfig) -> Result<PathBuf> {
    let config_path = config.settings_file_path();

    if !config_path.exists() {
        let options = WriteOptions {
            create_backup: false,
            ..WriteOptions::default()
        };
        scoped_ops(config).write(&config_path, DEFAULT_CONFIG, &options)?;

        tracing::info!(path = %config_path.display(), "Created default settings");
    }

    Ok(config_path)
}

fn scoped_ops(config: &AppConfig) -> SecureFileOps {
    let data_dir = config.data_dir();
    // The base directory must exist before paths can be resolved against it.
    if let Err(e) = std::fs::create_dir_all(&data_dir) {
        tracing::warn!(path = %data_dir.display(), error = %e, "Failed to create data directory");
    }
    SecureFileOps::new(config.limits).with_base_dir(data_dir)
}
