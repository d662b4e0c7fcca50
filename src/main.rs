//! BlastDock Config - secure file persistence and profile-scoped configuration.
//!
//! Every file this tool touches goes through path validation first. Writes are
//! atomic, copies detect sources that vanish mid-operation, and configuration
//! profiles are backed up before they are overwritten.
//!
//! QUICK START:
//!   blastdock-config config show                 # Active profile
//!   blastdock-config config set log_level DEBUG  # Change a setting
//!   blastdock-config config switch staging       # Use another profile
//!   blastdock-config audit compose.yml           # Permission report
//!   blastdock-config scan ~/.blastdock --json    # Recursive security scan

mod application;
mod cli;
mod domain;
mod infrastructure;

use std::io::Read;
use std::path::Path;

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use application::{
    format_file_record, format_json, format_profiles_table, format_scan_result, format_value,
    ConfigManager, OutputFormat,
};
use cli::{parse_setting_value, Cli, Commands, ConfigCommands};
use domain::{AppConfig, AppError, BackupManager, ProfileState};
use infrastructure::{
    ensure_config_exists, load_config, save_config, FileBackupManager, SecureFileOps,
    TomlProfileStore, WriteOptions,
};

type Manager = ConfigManager<TomlProfileStore, FileBackupManager>;

fn main() {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(exit_code(&e));
    }
}

/// Main application logic.
fn run(cli: Cli) -> domain::Result<()> {
    let config = load_config(cli.data_dir.as_deref())?;
    ensure_config_exists(&config)?;

    let format = cli.output_format().map_err(AppError::validation)?;

    let mut ops = SecureFileOps::new(config.limits);
    if let Some(base) = cli.base_dir {
        ops = ops.with_base_dir(base);
    }

    match cli.command {
        Commands::Validate { path, kind } => {
            cmd_validate(&ops, &path, kind.and_then(cli::FileKind::allowed_extensions), format)?;
        }
        Commands::Read {
            path,
            kind,
            encoding,
        } => {
            let content = ops.read(&path, Some(kind.max_size(ops.limits())), encoding)?;
            print!("{content}");
        }
        Commands::Write {
            path,
            content,
            no_backup,
            mode,
            encoding,
        } => {
            let content = match content {
                Some(content) => content,
                None => read_stdin()?,
            };
            let options = WriteOptions {
                create_backup: !no_backup,
                encoding,
                mode,
                ..WriteOptions::default()
            };
            ops.write(&path, &content, &options)?;
            println!("{} Wrote {}", "✓".green().bold(), path.display());
        }
        Commands::Copy {
            source,
            destination,
            preserve,
        } => {
            let bytes = ops.copy(&source, &destination, preserve)?;
            println!(
                "{} Copied {} → {} ({})",
                "✓".green().bold(),
                source.display(),
                destination.display(),
                application::format_bytes(bytes)
            );
        }
        Commands::Delete { path, secure } => {
            ops.delete(&path, secure)?;
            let how = if secure { "Securely deleted" } else { "Deleted" };
            println!("{} {how} {}", "✓".green().bold(), path.display());
        }
        Commands::Hash { path, algorithm } => {
            let digest = ops.hash(&path, algorithm)?;
            println!("{digest}  {}", path.display());
        }
        Commands::Verify {
            path,
            expected,
            algorithm,
        } => {
            ops.verify(&path, &expected, algorithm)?;
            println!("{} {} ({algorithm})", "✓".green().bold(), path.display());
        }
        Commands::Audit { path } => {
            let record = ops.audit_permissions(&path)?;
            match format {
                OutputFormat::Json => println!("{}", format_json(&record).map_err(json_error)?),
                OutputFormat::Table => println!("{}", format_file_record(&record)),
            }
        }
        Commands::Scan { path } => {
            let result = ops.scan_directory(&path)?;
            match format {
                OutputFormat::Json => println!("{}", format_json(&result).map_err(json_error)?),
                OutputFormat::Table => println!("{}", format_scan_result(&result)),
            }
        }
        Commands::SecurePerms { path } => {
            ops.set_secure_permissions(&path, path.is_dir())?;
            println!("{} Secured {}", "✓".green().bold(), path.display());
        }
        Commands::Mkdir { path, mode } => {
            ops.create_secure_directory(&path, mode)?;
            println!("{} Created {} ({mode:o})", "✓".green().bold(), path.display());
        }
        Commands::TempDir => {
            let dir = SecureFileOps::create_temp_dir()?;
            println!("{}", dir.display());
        }
        Commands::CleanTemp { path } => {
            if SecureFileOps::cleanup_temp_dir(&path)? {
                println!("{} Removed {}", "✓".green().bold(), path.display());
            } else {
                println!("{} Nothing removed at {}", "!".yellow().bold(), path.display());
            }
        }
        Commands::Config(command) => {
            cmd_config(config, cli.profile.as_deref(), command, format)?;
        }
    }

    Ok(())
}

/// Validate a path and report the outcome.
fn cmd_validate(
    ops: &SecureFileOps,
    path: &Path,
    allowed: Option<&[&str]>,
    format: OutputFormat,
) -> domain::Result<()> {
    let outcome = ops.validate(path, allowed);
    if format == OutputFormat::Json {
        println!("{}", format_json(&outcome).map_err(json_error)?);
        return Ok(());
    }
    outcome.into_result()?;
    println!("{} {} is safe", "✓".green().bold(), path.display());
    Ok(())
}

/// Open the manager on the requested (or default) profile.
fn open_manager(config: &AppConfig, profile: Option<&str>) -> domain::Result<Manager> {
    let store = TomlProfileStore::open(config.profiles_dir(), config.limits)?;
    let backups = FileBackupManager::new(store.dir(), store.ops().clone());
    let profile = profile.unwrap_or(&config.profiles.default_profile);
    ConfigManager::open(store, backups, profile, config.profiles.auto_save)
}

/// Persist pending edits when auto-save did not already do it.
fn flush(manager: &mut Manager) -> domain::Result<()> {
    if manager.state() == ProfileState::Dirty {
        manager.save()?;
    }
    Ok(())
}

fn require_confirmation(manager: &Manager, confirmed: bool, action: &str) -> domain::Result<()> {
    if manager.should_confirm_destructive_operations() && !confirmed {
        return Err(AppError::validation(format!(
            "Refusing to {action} without --yes (confirm_destructive_operations is enabled)"
        )));
    }
    Ok(())
}

/// Configuration profile commands.
fn cmd_config(
    mut config: AppConfig,
    profile: Option<&str>,
    command: ConfigCommands,
    format: OutputFormat,
) -> domain::Result<()> {
    let mut manager = open_manager(&config, profile)?;
    let active = manager
        .profile_name()
        .map(str::to_string)
        .unwrap_or_default();

    match command {
        ConfigCommands::Show => {
            let document = manager.config()?;
            match format {
                OutputFormat::Json => println!("{}", format_json(document).map_err(json_error)?),
                OutputFormat::Table => {
                    let body = toml::to_string_pretty(document).map_err(|e| {
                        AppError::config(format!("Failed to serialize profile: {e}"))
                    })?;
                    println!("{} {}", "📄 Profile".bold(), active.cyan());
                    println!(
                        "  Auto-generate passwords: {}",
                        yes_no(manager.should_auto_generate_passwords())
                    );
                    println!(
                        "  Confirm destructive operations: {}",
                        yes_no(manager.should_confirm_destructive_operations())
                    );
                    println!();
                    println!("{body}");
                }
            }
        }
        ConfigCommands::Get { key } => {
            let value = manager
                .get_setting(&key)?
                .ok_or_else(|| AppError::config(format!("Setting '{key}' is not set")))?;
            println!("{}", format_value(&value));
        }
        ConfigCommands::Set { key, value } => {
            manager.set_setting(&key, parse_setting_value(&value))?;
            flush(&mut manager)?;
            println!("{} {key} updated in profile '{active}'", "✓".green().bold());
        }
        ConfigCommands::Port { service } => {
            let port = manager.default_port(&service).ok_or_else(|| {
                AppError::config(format!("No default port configured for '{service}'"))
            })?;
            println!("{port}");
        }
        ConfigCommands::Switch { profile: target } => {
            manager.switch_profile(&target)?;
            config.profiles.default_profile = target.clone();
            save_config(&config)?;
            println!(
                "{} Switched from '{active}' to '{}'",
                "✓".green().bold(),
                target.cyan()
            );
        }
        ConfigCommands::Profiles => {
            let store = manager.persistence();
            let profiles = store
                .list_profiles()?
                .into_iter()
                .map(|name| -> domain::Result<_> {
                    let backup = manager.backups().latest_backup(&name)?;
                    Ok((name, backup))
                })
                .collect::<domain::Result<Vec<_>>>()?;

            match format {
                OutputFormat::Json => {
                    let names: Vec<&String> = profiles.iter().map(|(name, _)| name).collect();
                    println!("{}", format_json(&names).map_err(json_error)?);
                }
                OutputFormat::Table => {
                    println!("{}", format_profiles_table(&profiles, Some(active.as_str())));
                }
            }
        }
        ConfigCommands::Delete { profile: target, yes } => {
            require_confirmation(&manager, yes, "delete a profile")?;
            manager.delete_profile(&target)?;
            println!("{} Deleted profile '{target}'", "✓".green().bold());
        }
        ConfigCommands::Backup => {
            let entry = manager.backups().create_backup(&active, manager.config()?)?;
            println!(
                "{} Backed up '{active}' to {}",
                "✓".green().bold(),
                entry.backup_path.display()
            );
        }
        ConfigCommands::Restore => {
            let restored = manager.backups().restore_backup(&active)?;
            manager.update(|document| {
                *document = restored;
                Ok(())
            })?;
            flush(&mut manager)?;
            println!("{} Restored '{active}' from backup", "✓".green().bold());
        }
        ConfigCommands::Reset { yes } => {
            require_confirmation(&manager, yes, "reset a profile")?;
            manager.reset_to_defaults()?;
            flush(&mut manager)?;
            println!("{} Reset '{active}' to defaults", "✓".green().bold());
        }
    }

    Ok(())
}

fn yes_no(value: bool) -> colored::ColoredString {
    if value {
        "yes".green()
    } else {
        "no".yellow()
    }
}

fn read_stdin() -> domain::Result<String> {
    let mut content = String::new();
    std::io::stdin()
        .read_to_string(&mut content)
        .map_err(|e| AppError::io("Failed to read stdin", e))?;
    Ok(content)
}

/// Filesystem resource failures (including races) exit with 2, everything else with 1.
const fn exit_code(error: &AppError) -> i32 {
    if error.is_resource() {
        2
    } else {
        1
    }
}

fn json_error(e: serde_json::Error) -> AppError {
    AppError::config(format!("Failed to serialize output: {e}"))
}

/// Setup tracing/logging based on verbosity level.
fn setup_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}
