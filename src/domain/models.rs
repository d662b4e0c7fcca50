//! Domain models for secure file operations.
//!
//! These are plain values produced by the file layer. None of them are cached:
//! every audit or scan builds a fresh instance from the current disk state.

use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{AppError, Result};

/// Result of a path validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationOutcome {
    /// Whether the path may be touched.
    pub ok: bool,
    /// Why the path was rejected.
    pub reason: Option<String>,
}

impl ValidationOutcome {
    #[must_use]
    pub const fn accept() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    #[must_use]
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            ok: false,
            reason: Some(reason.into()),
        }
    }

    /// Convert into a `Result`, mapping rejection to a validation error.
    ///
    /// # Errors
    /// Returns `AppError::Validation` with the rejection reason.
    pub fn into_result(self) -> Result<()> {
        if self.ok {
            Ok(())
        } else {
            Err(AppError::validation(
                self.reason.unwrap_or_else(|| "Path rejected".to_string()),
            ))
        }
    }
}

/// Decoded owner/group/other read/write/execute bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct PermissionFlags {
    pub owner_read: bool,
    pub owner_write: bool,
    pub owner_execute: bool,
    pub group_read: bool,
    pub group_write: bool,
    pub group_execute: bool,
    pub other_read: bool,
    pub other_write: bool,
    pub other_execute: bool,
}

impl PermissionFlags {
    /// Decode the permission bits of a POSIX mode.
    #[must_use]
    pub const fn from_mode(mode: u32) -> Self {
        Self {
            owner_read: mode & 0o400 != 0,
            owner_write: mode & 0o200 != 0,
            owner_execute: mode & 0o100 != 0,
            group_read: mode & 0o040 != 0,
            group_write: mode & 0o020 != 0,
            group_execute: mode & 0o010 != 0,
            other_read: mode & 0o004 != 0,
            other_write: mode & 0o002 != 0,
            other_execute: mode & 0o001 != 0,
        }
    }
}

/// Permission and ownership snapshot of a single path.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    pub path: PathBuf,
    pub size: u64,
    /// Full `st_mode` value.
    pub mode: u32,
    pub permissions: PermissionFlags,
    /// Three-digit octal permission string, e.g. `"644"`.
    pub octal: String,
    pub is_directory: bool,
    pub owner_uid: u32,
    pub group_gid: u32,
    /// Issues found, in classification order.
    pub security_issues: Vec<String>,
}

impl FileRecord {
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.security_issues.is_empty()
    }
}

/// A file flagged by a directory scan.
#[derive(Debug, Clone, Serialize)]
pub struct InsecureFile {
    pub path: PathBuf,
    pub issues: Vec<String>,
}

/// Aggregate result of a recursive security scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SecurityScanResult {
    pub exists: bool,
    pub file_count: usize,
    pub directory_count: usize,
    pub total_size: u64,
    pub security_issues: Vec<String>,
    pub insecure_files: Vec<InsecureFile>,
}

impl SecurityScanResult {
    #[must_use]
    pub fn is_secure(&self) -> bool {
        self.exists && self.security_issues.is_empty()
    }
}

/// Snapshot of a profile document taken before it was overwritten.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupEntry {
    /// File that was backed up.
    pub source: PathBuf,
    /// Where the snapshot lives (`<source>.backup`).
    pub backup_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl BackupEntry {
    /// Create a new entry for `source`, stamped now.
    #[must_use]
    pub fn new(source: PathBuf) -> Self {
        let backup_path = backup_path_for(&source);
        Self {
            source,
            backup_path,
            created_at: Utc::now(),
        }
    }
}

/// `<path>.backup` for any path.
#[must_use]
pub fn backup_path_for(path: &std::path::Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".backup");
    PathBuf::from(os)
}

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha1,
    #[default]
    Sha256,
    Sha512,
}

impl FromStr for HashAlgorithm {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(AppError::validation(format!(
                "Unsupported hash algorithm: {other}"
            ))),
        }
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Md5 => write!(f, "md5"),
            Self::Sha1 => write!(f, "sha1"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Sha512 => write!(f, "sha512"),
        }
    }
}

/// Text encodings accepted by read and write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl TextEncoding {
    /// Encode text into bytes.
    ///
    /// # Errors
    /// Returns a validation error if a character is not representable.
    pub fn encode(self, text: &str) -> Result<Vec<u8>> {
        match self {
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Ascii => {
                if let Some(c) = text.chars().find(|c| !c.is_ascii()) {
                    return Err(AppError::validation(format!(
                        "Character {c:?} cannot be encoded as ascii"
                    )));
                }
                Ok(text.as_bytes().to_vec())
            }
            Self::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c)).map_err(|_| {
                        AppError::validation(format!("Character {c:?} cannot be encoded as latin-1"))
                    })
                })
                .collect(),
        }
    }

    /// Decode bytes into text, or describe why they are not valid.
    pub fn decode(self, bytes: Vec<u8>) -> std::result::Result<String, String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes).map_err(|e| e.to_string()),
            Self::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(pos) => Err(format!("non-ascii byte at offset {pos}")),
                None => String::from_utf8(bytes).map_err(|e| e.to_string()),
            },
            Self::Latin1 => Ok(bytes.into_iter().map(char::from).collect()),
        }
    }
}

impl FromStr for TextEncoding {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            other => Err(AppError::validation(format!("Unsupported encoding: {other}"))),
        }
    }
}
