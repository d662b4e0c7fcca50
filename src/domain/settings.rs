//! Configuration models.
//!
//! `AppConfig` is the tool's own settings file. `DeploymentConfig` is the
//! per-profile document managed by the configuration manager.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::{AppError, Result};

/// Size ceilings enforced by the file layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileLimits {
    /// Maximum size of configuration files in bytes.
    #[serde(default = "default_max_config_bytes")]
    pub max_config_bytes: u64,

    /// Maximum size of log files in bytes.
    #[serde(default = "default_max_log_bytes")]
    pub max_log_bytes: u64,

    /// Maximum size of template files in bytes.
    #[serde(default = "default_max_template_bytes")]
    pub max_template_bytes: u64,
}

impl Default for FileLimits {
    fn default() -> Self {
        Self {
            max_config_bytes: default_max_config_bytes(),
            max_log_bytes: default_max_log_bytes(),
            max_template_bytes: default_max_template_bytes(),
        }
    }
}

const fn default_max_config_bytes() -> u64 {
    10 * 1024 * 1024
}

const fn default_max_log_bytes() -> u64 {
    100 * 1024 * 1024
}

const fn default_max_template_bytes() -> u64 {
    5 * 1024 * 1024
}

/// Profile handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileSettings {
    /// Profile loaded when none is given on the command line.
    #[serde(default = "default_profile_name")]
    pub default_profile: String,

    /// Save dirty profiles automatically before switching away and on `set`.
    #[serde(default = "default_auto_save")]
    pub auto_save: bool,
}

impl Default for ProfileSettings {
    fn default() -> Self {
        Self {
            default_profile: default_profile_name(),
            auto_save: default_auto_save(),
        }
    }
}

fn default_profile_name() -> String {
    "default".to_string()
}

const fn default_auto_save() -> bool {
    true
}

/// Path configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathConfig {
    /// Base data directory.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub limits: FileLimits,

    #[serde(default)]
    pub profiles: ProfileSettings,
}

impl AppConfig {
    /// Get the data directory, using default if not configured.
    #[must_use]
    pub fn data_dir(&self) -> PathBuf {
        self.paths
            .data_dir
            .clone()
            .unwrap_or_else(Self::default_data_dir)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".blastdock")
    }

    /// Get the settings file path.
    #[must_use]
    pub fn settings_file_path(&self) -> PathBuf {
        self.data_dir().join("settings.toml")
    }

    /// Directory holding one document per profile.
    #[must_use]
    pub fn profiles_dir(&self) -> PathBuf {
        self.data_dir().join("profiles")
    }
}

/// The structured settings document stored for each profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    #[serde(default = "default_domain")]
    pub default_domain: String,

    #[serde(default = "default_deployment_dir")]
    pub deployment_dir: PathBuf,

    #[serde(default = "default_ports")]
    pub default_ports: BTreeMap<String, u16>,

    #[serde(default = "default_true")]
    pub auto_generate_passwords: bool,

    #[serde(default = "default_true")]
    pub confirm_destructive_operations: bool,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_compose_version")]
    pub docker_compose_version: String,

    /// Settings without a dedicated field.
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            default_domain: default_domain(),
            deployment_dir: default_deployment_dir(),
            default_ports: default_ports(),
            auto_generate_passwords: true,
            confirm_destructive_operations: true,
            log_level: default_log_level(),
            docker_compose_version: default_compose_version(),
            extra: toml::Table::new(),
        }
    }
}

fn default_domain() -> String {
    "localhost".to_string()
}

fn default_deployment_dir() -> PathBuf {
    AppConfig::default_data_dir().join("deploys")
}

fn default_ports() -> BTreeMap<String, u16> {
    [("wordpress", 8080), ("mysql", 3306), ("n8n", 5678), ("nginx", 80)]
        .into_iter()
        .map(|(service, port)| (service.to_string(), port))
        .collect()
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "INFO".to_string()
}

fn default_compose_version() -> String {
    "3.8".to_string()
}

impl DeploymentConfig {
    fn to_table(&self) -> Result<toml::Table> {
        match toml::Value::try_from(self) {
            Ok(toml::Value::Table(table)) => Ok(table),
            Ok(_) => Err(AppError::config("Configuration did not serialize to a table")),
            Err(e) => Err(AppError::config(format!(
                "Failed to serialize configuration: {e}"
            ))),
        }
    }

    /// Look up a setting by dotted key, e.g. `default_ports.mysql`.
    ///
    /// # Errors
    /// Returns error if the document cannot be represented as TOML.
    pub fn get(&self, key: &str) -> Result<Option<toml::Value>> {
        let table = self.to_table()?;
        let mut parts = key.split('.');
        let Some(first) = parts.next() else {
            return Ok(None);
        };
        let mut current = table.get(first);
        for part in parts {
            current = current.and_then(|value| value.get(part));
        }
        Ok(current.cloned())
    }

    /// Set a setting by dotted key, creating intermediate tables.
    ///
    /// The whole document is re-validated, so a value of the wrong type for a
    /// known field is rejected and the document is left unchanged.
    ///
    /// # Errors
    /// Returns a validation error for empty keys or mistyped values.
    pub fn set(&mut self, key: &str, value: toml::Value) -> Result<()> {
        let segments: Vec<&str> = key.split('.').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(AppError::validation(format!("Invalid setting key: '{key}'")));
        }

        let mut table = self.to_table()?;
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| AppError::validation("Setting key cannot be empty"))?;

        let mut cursor = &mut table;
        for segment in parents {
            let entry = cursor
                .entry((*segment).to_string())
                .or_insert(toml::Value::Table(toml::Table::new()));
            cursor = entry.as_table_mut().ok_or_else(|| {
                AppError::validation(format!("Setting '{segment}' is not a table"))
            })?;
        }
        cursor.insert((*last).to_string(), value);

        let updated: Self = toml::Value::Table(table)
            .try_into()
            .map_err(|e| AppError::validation(format!("Invalid value for '{key}': {e}")))?;
        *self = updated;
        Ok(())
    }
}

/// A named, independently persisted configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigProfile {
    pub name: String,
    pub document: DeploymentConfig,
    /// In-memory document differs from what was last persisted.
    pub dirty: bool,
}

impl ConfigProfile {
    /// A freshly loaded, clean profile.
    #[must_use]
    pub fn clean(name: impl Into<String>, document: DeploymentConfig) -> Self {
        Self {
            name: name.into(),
            document,
            dirty: false,
        }
    }
}

/// Lifecycle state of a configuration manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileState {
    NoProfile,
    Clean,
    Dirty,
}

impl std::fmt::Display for ProfileState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoProfile => write!(f, "no profile loaded"),
            Self::Clean => write!(f, "clean"),
            Self::Dirty => write!(f, "dirty"),
        }
    }
}
