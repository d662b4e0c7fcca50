//! CLI interface using clap.
//!
//! Provides command-line arguments and subcommands for the tool.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::application::OutputFormat;
use crate::domain::{FileLimits, HashAlgorithm, TextEncoding};
use crate::infrastructure::secure_fs::validator::{
    CONFIG_EXTENSIONS, TEMPLATE_EXTENSIONS, TEXT_EXTENSIONS,
};

/// BlastDock Config - validated file operations and profile-scoped settings.
///
/// Quick start: blastdock-config config show | audit <file> | scan <dir>
#[derive(Parser, Debug)]
#[command(name = "blastdock-config")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose logging (use multiple times for more verbosity).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output format: table or json.
    #[arg(short, long, default_value = "table", global = true)]
    pub format: String,

    /// Shorthand for `--format json`.
    #[arg(long, global = true)]
    pub json: bool,

    /// Data directory holding settings.toml and profiles (default: ~/.blastdock).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Confine file operations to this directory.
    #[arg(long, global = true)]
    pub base_dir: Option<PathBuf>,

    /// Configuration profile to use (default: from settings.toml).
    #[arg(short, long, global = true)]
    pub profile: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// File categories with their own extension allow-list and size ceiling.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Config,
    Template,
    Text,
    Log,
}

impl FileKind {
    /// Extensions accepted for this kind; logs accept any name.
    #[must_use]
    pub const fn allowed_extensions(self) -> Option<&'static [&'static str]> {
        match self {
            Self::Config => Some(CONFIG_EXTENSIONS),
            Self::Template => Some(TEMPLATE_EXTENSIONS),
            Self::Text => Some(TEXT_EXTENSIONS),
            Self::Log => None,
        }
    }

    #[must_use]
    pub const fn max_size(self, limits: &FileLimits) -> u64 {
        match self {
            Self::Config | Self::Text => limits.max_config_bytes,
            Self::Template => limits.max_template_bytes,
            Self::Log => limits.max_log_bytes,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check whether a path is safe to use.
    Validate {
        path: PathBuf,

        /// Also require the extension of this file kind.
        #[arg(short, long, value_enum)]
        kind: Option<FileKind>,
    },

    /// Print a file after size and encoding checks.
    Read {
        path: PathBuf,

        /// File kind, selects the size ceiling.
        #[arg(short, long, value_enum, default_value = "config")]
        kind: FileKind,

        #[arg(short, long, default_value = "utf-8")]
        encoding: TextEncoding,
    },

    /// Atomically replace a file's content.
    Write {
        path: PathBuf,

        /// New content (read from stdin if not given).
        #[arg(short, long)]
        content: Option<String>,

        /// Skip the `<file>.backup` copy of the previous content.
        #[arg(long)]
        no_backup: bool,

        /// Octal permission bits for the new file.
        #[arg(short, long, default_value = "644", value_parser = parse_mode)]
        mode: u32,

        #[arg(short, long, default_value = "utf-8")]
        encoding: TextEncoding,
    },

    /// Copy a file after validating both ends.
    Copy {
        source: PathBuf,
        destination: PathBuf,

        /// Keep the source permissions instead of resetting to 644.
        #[arg(long)]
        preserve: bool,
    },

    /// Delete a file.
    Delete {
        path: PathBuf,

        /// Overwrite the content with zeros and random bytes before unlinking.
        #[arg(short, long)]
        secure: bool,
    },

    /// Print a file's hex digest.
    Hash {
        path: PathBuf,

        #[arg(short, long, default_value = "sha256")]
        algorithm: HashAlgorithm,
    },

    /// Check a file against an expected digest.
    Verify {
        path: PathBuf,
        expected: String,

        #[arg(short, long, default_value = "sha256")]
        algorithm: HashAlgorithm,
    },

    /// Report permissions, ownership and issues of one path.
    Audit { path: PathBuf },

    /// Recursively audit a directory.
    Scan { path: PathBuf },

    /// Restrict a file to 640 or a directory to 750.
    SecurePerms { path: PathBuf },

    /// Create a directory with exact permissions.
    Mkdir {
        path: PathBuf,

        #[arg(short, long, default_value = "750", value_parser = parse_mode)]
        mode: u32,
    },

    /// Create a private temporary working directory and print its path.
    TempDir,

    /// Remove a temporary directory created by `temp-dir`.
    CleanTemp { path: PathBuf },

    /// Manage configuration profiles.
    #[command(subcommand)]
    Config(ConfigCommands),
}

impl Cli {
    /// Parse the output format argument; `--json` wins over `--format`.
    ///
    /// # Errors
    /// Returns the parse message for unknown formats.
    pub fn output_format(&self) -> Result<OutputFormat, String> {
        if self.json {
            return Ok(OutputFormat::Json);
        }
        self.format.parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the active profile's document.
    Show,

    /// Print one setting by dotted key, e.g. `default_ports.mysql`.
    Get { key: String },

    /// Change one setting. Values are parsed as TOML, falling back to a string.
    Set { key: String, value: String },

    /// Print the default port of a service.
    Port { service: String },

    /// Make another profile the default.
    Switch { profile: String },

    /// List stored profiles.
    Profiles,

    /// Delete a stored profile (not the active one).
    Delete {
        profile: String,

        /// Skip the confirmation requirement.
        #[arg(short, long)]
        yes: bool,
    },

    /// Snapshot the active profile to its backup file.
    Backup,

    /// Replace the active profile with its backup.
    Restore,

    /// Reset the active profile to defaults.
    Reset {
        /// Skip the confirmation requirement.
        #[arg(short, long)]
        yes: bool,
    },
}

/// Parse octal permission bits such as `640` or `0o750`.
pub fn parse_mode(s: &str) -> Result<u32, String> {
    let digits = s.trim_start_matches("0o");
    let mode = u32::from_str_radix(digits, 8).map_err(|e| format!("Invalid octal mode '{s}': {e}"))?;
    if mode > 0o7777 {
        return Err(format!("Mode out of range: {s}"));
    }
    Ok(mode)
}

/// Parse a command-line setting as a TOML value, or keep it as a string.
#[must_use]
pub fn parse_setting_value(raw: &str) -> toml::Value {
    toml::from_str::<toml::Table>(&format!("value = {raw}"))
        .ok()
        .and_then(|mut table| table.remove("value"))
        .unwrap_or_else(|| toml::Value::String(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("640"), Ok(0o640));
        assert_eq!(parse_mode("0o750"), Ok(0o750));
        assert!(parse_mode("999").is_err());
        assert!(parse_mode("17777").is_err());
    }

    #[test]
    fn test_parse_setting_value() {
        assert_eq!(parse_setting_value("8081"), toml::Value::Integer(8081));
        assert_eq!(parse_setting_value("false"), toml::Value::Boolean(false));
        assert_eq!(
            parse_setting_value("example.test"),
            toml::Value::String("example.test".into())
        );
        assert_eq!(
            parse_setting_value("\"quoted\""),
            toml::Value::String("quoted".into())
        );
    }

    #[test]
    fn test_cli_parses_config_set() {
        let cli = Cli::parse_from([
            "blastdock-config",
            "--profile",
            "staging",
            "config",
            "set",
            "log_level",
            "DEBUG",
        ]);
        assert_eq!(cli.profile.as_deref(), Some("staging"));
        assert!(matches!(
            cli.command,
            Commands::Config(ConfigCommands::Set { .. })
        ));
    }

    #[test]
    fn test_output_format_selection() {
        let table = Cli::parse_from(["blastdock-config", "config", "show"]);
        assert_eq!(table.output_format(), Ok(OutputFormat::Table));

        let json = Cli::parse_from(["blastdock-config", "--format", "JSON", "scan", "."]);
        assert_eq!(json.output_format(), Ok(OutputFormat::Json));

        let flag = Cli::parse_from(["blastdock-config", "-f", "table", "--json", "scan", "."]);
        assert_eq!(flag.output_format(), Ok(OutputFormat::Json));

        let unknown = Cli::parse_from(["blastdock-config", "-f", "xml", "scan", "."]);
        assert!(unknown.output_format().is_err());
    }

    #[test]
    fn test_cli_parses_temp_dir_commands() {
        let cli = Cli::parse_from(["blastdock-config", "temp-dir"]);
        assert!(matches!(cli.command, Commands::TempDir));

        let cli = Cli::parse_from(["blastdock-config", "clean-temp", "/tmp/blastdock_x"]);
        assert!(matches!(cli.command, Commands::CleanTemp { .. }));
    }

    #[test]
    fn test_file_kind_limits() {
        let limits = FileLimits::default();
        assert_eq!(FileKind::Log.max_size(&limits), limits.max_log_bytes);
        assert!(FileKind::Log.allowed_extensions().is_none());
        assert!(FileKind::Template
            .allowed_extensions()
            .is_some_and(|exts| exts.contains(&"j2")));
    }
}
