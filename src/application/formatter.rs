//! Output formatting for audit results and profiles.
//!
//! Supports two output formats: a human-readable table view and JSON.

use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Table};
use serde::Serialize;

use crate::domain::{BackupEntry, FileRecord, SecurityScanResult};

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Tables and colored summaries.
    #[default]
    Table,
    /// JSON format for programmatic use.
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "text" => Ok(Self::Table),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {s}. Use: table, json")),
        }
    }
}

/// Pretty JSON for any serializable result.
///
/// # Errors
/// Returns error if serialization fails.
pub fn format_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Formats a single permission audit.
pub fn format_file_record(record: &FileRecord) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Property", "Value"]);

    let flags = &record.permissions;
    let rwx = |r: bool, w: bool, x: bool| {
        format!(
            "{}{}{}",
            if r { 'r' } else { '-' },
            if w { 'w' } else { '-' },
            if x { 'x' } else { '-' }
        )
    };

    table.add_row(vec!["Path".to_string(), record.path.display().to_string()]);
    table.add_row(vec![
        "Type".to_string(),
        if record.is_directory { "directory" } else { "file" }.to_string(),
    ]);
    table.add_row(vec!["Size".to_string(), format_bytes(record.size)]);
    table.add_row(vec!["Mode".to_string(), record.octal.clone()]);
    table.add_row(vec![
        "Owner".to_string(),
        rwx(flags.owner_read, flags.owner_write, flags.owner_execute),
    ]);
    table.add_row(vec![
        "Group".to_string(),
        rwx(flags.group_read, flags.group_write, flags.group_execute),
    ]);
    table.add_row(vec![
        "Other".to_string(),
        rwx(flags.other_read, flags.other_write, flags.other_execute),
    ]);
    table.add_row(vec![
        "UID / GID".to_string(),
        format!("{} / {}", record.owner_uid, record.group_gid),
    ]);

    let mut out = table.to_string();
    out.push('\n');
    out.push_str(&format_issues(&record.security_issues));
    out
}

/// Formats a directory scan summary and its insecure files.
pub fn format_scan_result(result: &SecurityScanResult) -> String {
    if !result.exists {
        return format!("{} Directory does not exist", "✗".red().bold());
    }

    let mut out = format!(
        "{}\n  Files: {}\n  Directories: {}\n  Total size: {}\n  Issues: {}\n",
        "🔒 Security Scan".bold(),
        result.file_count.to_string().cyan(),
        result.directory_count.to_string().cyan(),
        format_bytes(result.total_size).cyan(),
        if result.security_issues.is_empty() {
            "0".green()
        } else {
            result.security_issues.len().to_string().red()
        }
    );

    if !result.insecure_files.is_empty() {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(vec!["File", "Issues"]);
        for file in &result.insecure_files {
            table.add_row(vec![
                file.path.display().to_string(),
                file.issues.join("\n"),
            ]);
        }
        out.push('\n');
        out.push_str(&table.to_string());
        out.push('\n');
    }

    let directory_issues: Vec<String> = result
        .security_issues
        .iter()
        .filter(|issue| issue.starts_with("Directory ") || issue.starts_with("Unreadable "))
        .cloned()
        .collect();
    if !directory_issues.is_empty() {
        out.push('\n');
        out.push_str(&format_issues(&directory_issues));
    }

    out
}

/// Formats the stored profiles, marking the active one.
pub fn format_profiles_table(
    profiles: &[(String, Option<BackupEntry>)],
    active: Option<&str>,
) -> String {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["", "Profile", "Last backup"]);

    for (name, backup) in profiles {
        let marker = if active == Some(name.as_str()) { "*" } else { "" };
        let backup = backup.as_ref().map_or_else(
            || "-".to_string(),
            |entry| entry.created_at.format("%Y-%m-%d %H:%M").to_string(),
        );
        table.add_row(vec![marker, name, &backup]);
    }

    table.to_string()
}

fn format_issues(issues: &[String]) -> String {
    if issues.is_empty() {
        return format!("{} No security issues", "✓".green().bold());
    }
    let mut out = format!("{}\n", "⚠ Security issues".yellow().bold());
    for issue in issues {
        out.push_str(&format!("  - {issue}\n"));
    }
    out
}

/// Human-readable byte count.
#[allow(clippy::cast_precision_loss)]
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Renders a setting for display; strings are shown without quotes.
pub fn format_value(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Table(table) => toml::to_string_pretty(table)
            .unwrap_or_else(|_| value.to_string())
            .trim_end()
            .to_string(),
        other => other.to_string(),
    }
}
