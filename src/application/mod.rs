//! Application layer - use cases and orchestration.
//!
//! This layer contains the profile-scoped configuration manager and the
//! formatting of audit results for display.

pub mod config_manager;
pub mod formatter;

pub use config_manager::ConfigManager;
pub use formatter::{
    format_bytes, format_file_record, format_json, format_profiles_table, format_scan_result,
    format_value, OutputFormat,
};
