//! Path validation.
//!
//! Decides whether a path is safe to touch. Rejection is reported through
//! `ValidationOutcome`, never through an error.

use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::domain::ValidationOutcome;

/// Extensions that are refused regardless of any allow-list.
pub const DANGEROUS_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "com", "scr", "pif", "vbs", "js", "jar", "msi", "deb", "rpm", "dmg",
    "pkg", "sh", "ps1",
];

/// System directories that unscoped paths may not resolve into.
pub const SYSTEM_DIRS: &[&str] = &["/etc", "/proc", "/sys", "/boot", "/root", "/dev"];

pub const CONFIG_EXTENSIONS: &[&str] = &["yml", "yaml", "json", "toml", "ini", "conf"];
pub const TEMPLATE_EXTENSIONS: &[&str] = &["yml", "yaml", "json", "j2", "jinja"];
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "rst", "log"];

const MAX_PROFILE_NAME_LEN: usize = 64;

/// Validate `path`, optionally confined to `base_dir` and an extension allow-list.
///
/// Relative paths are joined onto `base_dir` when one is given. Allow-list
/// entries may be written with or without a leading dot.
pub fn validate(
    path: &Path,
    base_dir: Option<&Path>,
    allowed_extensions: Option<&[&str]>,
) -> ValidationOutcome {
    if path.as_os_str().is_empty() {
        return ValidationOutcome::reject("File path cannot be empty");
    }

    if path.as_os_str().as_encoded_bytes().contains(&0) {
        return ValidationOutcome::reject("Null byte in path detected");
    }

    let location = match base_dir {
        Some(base) => check_within_base(path, base),
        None => check_unscoped(path),
    };
    if !location.ok {
        return location;
    }

    let extension = extension_of(path);
    if DANGEROUS_EXTENSIONS.contains(&extension.as_str()) {
        return ValidationOutcome::reject(format!("Dangerous file extension: .{extension}"));
    }

    if let Some(allowed) = allowed_extensions {
        let permitted = allowed
            .iter()
            .any(|ext| ext.trim_start_matches('.').eq_ignore_ascii_case(&extension));
        if !permitted {
            return ValidationOutcome::reject(format!(
                "File extension not allowed: {}",
                if extension.is_empty() {
                    "(none)".to_string()
                } else {
                    format!(".{extension}")
                }
            ));
        }
    }

    ValidationOutcome::accept()
}

/// Profile names become file names, so only a conservative alphabet is allowed.
pub fn validate_profile_name(name: &str) -> ValidationOutcome {
    if name.is_empty() {
        return ValidationOutcome::reject("Profile name cannot be empty");
    }
    if name.len() > MAX_PROFILE_NAME_LEN {
        return ValidationOutcome::reject(format!(
            "Profile name longer than {MAX_PROFILE_NAME_LEN} characters"
        ));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
    {
        return ValidationOutcome::reject(format!("Invalid character {c:?} in profile name"));
    }
    ValidationOutcome::accept()
}

/// Location checks only: the path and any symlink on the way must stay inside `base_dir`.
pub(crate) fn check_within_base(path: &Path, base_dir: &Path) -> ValidationOutcome {
    let base = match fs::canonicalize(base_dir) {
        Ok(base) => base,
        Err(e) => {
            return ValidationOutcome::reject(format!(
                "Cannot resolve base directory {}: {e}",
                base_dir.display()
            ))
        }
    };

    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    };

    if !resolve(&joined).starts_with(&base) {
        return ValidationOutcome::reject("Path escapes base directory");
    }

    // Walk back up towards the base, checking every symlink we pass.
    let lexical_base = normalize(base_dir);
    let mut current = normalize(&joined);
    while current != base && current != lexical_base {
        let is_symlink = fs::symlink_metadata(&current)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false);
        if is_symlink && !resolve(&current).starts_with(&base) {
            return ValidationOutcome::reject("Symlink points outside base directory");
        }
        if !current.pop() {
            break;
        }
    }

    ValidationOutcome::accept()
}

fn check_unscoped(path: &Path) -> ValidationOutcome {
    if path.components().any(|c| c == Component::ParentDir) {
        return ValidationOutcome::reject("Path traversal detected");
    }

    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(e) => return ValidationOutcome::reject(format!("Cannot resolve path: {e}")),
        }
    };

    let resolved = resolve(&absolute);
    if let Some(dir) = SYSTEM_DIRS
        .iter()
        .find(|dir| resolved.starts_with(Path::new(dir)))
    {
        return ValidationOutcome::reject(format!("Access to system directory {dir} not allowed"));
    }

    ValidationOutcome::accept()
}

/// Lowercase extension without the dot, or an empty string.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
        .unwrap_or_default()
}

/// Resolve symlinks in the longest existing prefix of `path` and normalize the rest.
///
/// Unlike `fs::canonicalize` this succeeds for paths that do not exist yet.
pub fn resolve(path: &Path) -> PathBuf {
    for ancestor in path.ancestors() {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        if let Ok(real) = fs::canonicalize(ancestor) {
            let tail = path.strip_prefix(ancestor).unwrap_or_else(|_| Path::new(""));
            return normalize(&real.join(tail));
        }
    }
    normalize(path)
}

/// Lexically remove `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_rejects_empty_and_null_byte() {
        assert!(!validate(Path::new(""), None, None).ok);
        let outcome = validate(Path::new("conf\0ig.yml"), None, None);
        assert!(!outcome.ok);
        assert_eq!(outcome.reason.as_deref(), Some("Null byte in path detected"));
    }

    #[test]
    fn test_rejects_parent_segments_without_base() {
        for p in ["../secrets.yml", "a/../../b.toml", "config/../x.json", ".."] {
            let outcome = validate(Path::new(p), None, None);
            assert!(!outcome.ok, "{p} should be rejected");
            assert_eq!(outcome.reason.as_deref(), Some("Path traversal detected"));
        }
    }

    #[test]
    fn test_rejects_system_directories() {
        for p in ["/etc/passwd", "/proc/self/environ", "/sys/kernel", "/boot/grub.cfg",
                  "/root/.bashrc", "/dev/null"] {
            assert!(!validate(Path::new(p), None, None).ok, "{p} should be rejected");
        }
    }

    #[test]
    fn test_system_prefix_is_component_wise() {
        assert!(validate(Path::new("/etcetera/config.yml"), None, None).ok);
    }

    #[test]
    fn test_rejects_dangerous_extensions_case_insensitively() {
        let dir = tempdir().unwrap();
        for name in ["run.sh", "setup.EXE", "payload.Ps1"] {
            let outcome = validate(&dir.path().join(name), None, None);
            assert!(!outcome.ok, "{name} should be rejected");
        }
        // Even when the allow-list names it.
        assert!(!validate(&dir.path().join("x.sh"), None, Some(&["sh"])).ok);
    }

    #[test]
    fn test_allow_list() {
        let dir = tempdir().unwrap();
        let yml = dir.path().join("stack.YML");
        assert!(validate(&yml, None, Some(CONFIG_EXTENSIONS)).ok);
        assert!(validate(&yml, None, Some(&[".yml"])).ok);
        assert!(!validate(&dir.path().join("notes.txt"), None, Some(CONFIG_EXTENSIONS)).ok);
        assert!(!validate(&dir.path().join("Makefile"), None, Some(CONFIG_EXTENSIONS)).ok);
    }

    #[test]
    fn test_base_dir_accepts_descendants() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("profiles")).unwrap();
        assert!(validate(Path::new("profiles/default.toml"), Some(dir.path()), None).ok);
        assert!(validate(&dir.path().join("new/nested/file.yml"), Some(dir.path()), None).ok);
    }

    #[test]
    fn test_base_dir_rejects_escape() {
        let dir = tempdir().unwrap();
        let outcome = validate(Path::new("../outside.yml"), Some(dir.path()), None);
        assert!(!outcome.ok);
        assert_eq!(outcome.reason.as_deref(), Some("Path escapes base directory"));

        let other = tempdir().unwrap();
        assert!(!validate(&other.path().join("x.yml"), Some(dir.path()), None).ok);
    }

    #[cfg(unix)]
    #[test]
    fn test_base_dir_rejects_symlink_escape() {
        let base = tempdir().unwrap();
        let outside = tempdir().unwrap();
        fs::write(outside.path().join("secret.yml"), "x").unwrap();
        std::os::unix::fs::symlink(outside.path(), base.path().join("link")).unwrap();

        let outcome = validate(Path::new("link/secret.yml"), Some(base.path()), None);
        assert!(!outcome.ok);
    }

    #[cfg(unix)]
    #[test]
    fn test_base_dir_allows_internal_symlink() {
        let base = tempdir().unwrap();
        fs::create_dir(base.path().join("real")).unwrap();
        std::os::unix::fs::symlink(base.path().join("real"), base.path().join("alias")).unwrap();

        assert!(validate(Path::new("alias/app.yml"), Some(base.path()), None).ok);
    }

    #[test]
    fn test_profile_names() {
        assert!(validate_profile_name("default").ok);
        assert!(validate_profile_name("staging-2_eu").ok);
        assert!(!validate_profile_name("").ok);
        assert!(!validate_profile_name("../etc").ok);
        assert!(!validate_profile_name("a/b").ok);
        assert!(!validate_profile_name(&"x".repeat(65)).ok);
    }
}
