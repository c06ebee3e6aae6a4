//! Rule identity resolution
//!
//! Rule names are derived from (application path, direction) so that blocking
//! the same application twice in the same direction collides on the same name
//! instead of silently creating a duplicate. The name is the only identity the
//! store and the command surface use.
//!
//! Application paths are checked lexically on every host (Windows drive and
//! UNC paths are absolute even when validated on Unix), and optionally against
//! the filesystem.

use crate::core::error::{Error, Result};
use crate::core::rule::Direction;
use std::path::Path;

/// Prefix marking rules owned by this tool
pub const RULE_PREFIX: &str = "NetBlockerRule_";

/// Maximum application path length accepted (Windows extended path limit)
pub const MAX_PATH_LEN: usize = 32_767;

/// Extensions the Windows loader will execute directly
const WINDOWS_EXECUTABLE_EXTENSIONS: &[&str] = &["exe", "com", "bat", "cmd", "scr"];

/// How thoroughly an application path is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathCheck {
    /// Absolute path that exists and is an executable regular file
    #[default]
    Strict,
    /// Absolute path, no filesystem access
    Lexical,
}

/// Canonical rule name for an application path and direction
pub fn rule_name(app_path: &str, direction: Direction) -> String {
    format!("{RULE_PREFIX}{}_{app_path}", direction.label())
}

/// Splits a canonical rule name back into direction and application path
pub fn parse_rule_name(name: &str) -> Option<(Direction, &str)> {
    let rest = name.strip_prefix(RULE_PREFIX)?;
    if let Some(path) = rest.strip_prefix("Outbound_") {
        Some((Direction::Out, path))
    } else {
        rest.strip_prefix("Inbound_").map(|path| (Direction::In, path))
    }
}

/// Whether a rule name belongs to this tool
pub fn is_owned(name: &str) -> bool {
    name.starts_with(RULE_PREFIX)
}

/// Lexical absolute-path test that understands Windows paths on any host
///
/// Accepts `C:\...`, `C:/...`, `\\server\share\...` and `/...`.
pub fn is_absolute_app_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    let drive_path = bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && matches!(bytes[2], b'\\' | b'/');
    let unc_path = path.starts_with(r"\\") && path.len() > 2;

    drive_path || unc_path || path.starts_with('/')
}

/// Validates an application path before a rule is built for it
///
/// # Errors
///
/// Returns [`Error::InvalidPath`] if the path is empty, contains control
/// characters, is too long, is not absolute, or (with [`PathCheck::Strict`])
/// is not an existing executable file.
pub fn validate_app_path(path: &str, check: PathCheck) -> Result<()> {
    let invalid = |reason: &str| Error::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    if path.trim().is_empty() {
        return Err(invalid("path is empty"));
    }
    if path.len() > MAX_PATH_LEN {
        return Err(invalid("path is too long"));
    }
    if path.chars().any(char::is_control) {
        return Err(invalid("path contains control characters"));
    }
    if !is_absolute_app_path(path) {
        return Err(invalid("path is not absolute"));
    }

    if check == PathCheck::Lexical {
        return Ok(());
    }

    let metadata = std::fs::metadata(Path::new(path)).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            invalid("file does not exist")
        } else {
            invalid(&format!("cannot inspect file: {e}"))
        }
    })?;

    if !metadata.is_file() {
        return Err(invalid("not a regular file"));
    }
    if !is_executable(Path::new(path), &metadata) {
        return Err(invalid("file is not executable"));
    }
    Ok(())
}

#[cfg(unix)]
fn is_executable(_path: &Path, metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(path: &Path, _metadata: &std::fs::Metadata) -> bool {
    path.to_str().is_some_and(has_windows_executable_extension)
}

/// Whether a path names a Windows executable by extension
pub fn has_windows_executable_extension(path: &str) -> bool {
    path.rsplit_once('.').is_some_and(|(_, ext)| {
        WINDOWS_EXECUTABLE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known))
    })
}
