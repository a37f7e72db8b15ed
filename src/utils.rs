//! String, path and directory helpers
//!
//! Everything here is stateless. Path handling is string based on purpose:
//! the block list and the firewall store both identify executables by their
//! literal path text, so helpers never canonicalize.
//!
//! # Directory Structure
//!
//! - Config: `%APPDATA%\fwmfw\config\` (`~/.config/fwmfw/` elsewhere)
//! - State: `~/.local/state/fwmfw/` where the platform has one, otherwise
//!   the local data directory (audit log)

use crate::core::error::{Error, Result};
use directories::ProjectDirs;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// The path separator that is not native on this host
#[cfg(windows)]
pub const FOREIGN_SEPARATOR: char = '/';
#[cfg(not(windows))]
pub const FOREIGN_SEPARATOR: char = '\\';

/// Strips leading and trailing characters matching `pred`
///
/// A string made only of matching characters trims to the empty string.
pub fn trim_chars(s: &str, pred: impl Fn(char) -> bool) -> &str {
    s.trim_matches(|c: char| pred(c))
}

/// Strips trailing characters matching `pred`
pub fn trim_end_chars(s: &str, pred: impl Fn(char) -> bool) -> &str {
    s.trim_end_matches(|c: char| pred(c))
}

pub fn trim_whitespace(s: &str) -> &str {
    trim_chars(s, char::is_whitespace)
}

/// Replaces `find` with `replacement`, either everywhere or only the first hit
pub fn replace_chars(s: &str, find: char, replacement: char, stop_at_first_hit: bool) -> String {
    if stop_at_first_hit {
        s.replacen(find, &replacement.to_string(), 1)
    } else {
        s.replace(find, &replacement.to_string())
    }
}

/// Rewrites every foreign path separator to the native one
pub fn normalize_separators(s: &str) -> String {
    replace_chars(s, FOREIGN_SEPARATOR, MAIN_SEPARATOR, false)
}

pub fn starts_with(s: &str, beginning: &str) -> bool {
    s.starts_with(beginning)
}

pub fn ends_with(s: &str, ending: &str) -> bool {
    s.ends_with(ending)
}

pub fn contains(s: &str, needle: &str) -> bool {
    s.contains(needle)
}

/// Converts an OS path to UTF-8
///
/// # Errors
///
/// Returns [`Error::Encoding`] if the path is not valid Unicode.
pub fn path_to_string(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .ok_or_else(|| Error::Encoding(format!("path is not valid Unicode: {}", path.display())))
}

/// UTF-8 → UTF-16, the form the Windows rule store expects
pub fn to_wide(s: &str) -> Vec<u16> {
    s.encode_utf16().collect()
}

/// UTF-16 → UTF-8
///
/// # Errors
///
/// Returns [`Error::Encoding`] on unpaired surrogates.
pub fn from_wide(wide: &[u16]) -> Result<String> {
    String::from_utf16(wide).map_err(|e| Error::Encoding(e.to_string()))
}

/// Lists files under `dir` whose name ends with `extension`
///
/// `dir` should already end with a separator; returned paths are `dir`
/// followed by the path relative to it. Directories never appear in the
/// output. Order follows filesystem enumeration and is not stable.
/// Entries that cannot be read are skipped with a warning. Symbolic links
/// are followed and listed under the link's own path.
///
/// # Errors
///
/// Returns [`Error::Encoding`] for file names that are not valid Unicode.
pub fn list_files(dir: &str, extension: &str, recursive: bool) -> Result<Vec<String>> {
    let walker = WalkDir::new(dir)
        .follow_links(true)
        .min_depth(1)
        .max_depth(if recursive { usize::MAX } else { 1 });

    let mut files = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {dir}: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            return Err(Error::Encoding(format!(
                "file name is not valid Unicode: {}",
                entry.path().display()
            )));
        };
        if ends_with(name, extension) {
            files.push(path_to_string(entry.path())?);
        }
    }
    Ok(files)
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "fwmfw", "fwmfw")
}

pub fn get_config_dir() -> Option<PathBuf> {
    project_dirs().map(|pd| pd.config_dir().to_path_buf())
}

pub fn get_state_dir() -> Option<PathBuf> {
    project_dirs().map(|pd| {
        pd.state_dir()
            .map_or_else(|| pd.data_local_dir().to_path_buf(), Path::to_path_buf)
    })
}

pub fn ensure_dirs() -> std::io::Result<()> {
    if let Some(dir) = get_config_dir() {
        std::fs::create_dir_all(dir)?;
    }
    if let Some(dir) = get_state_dir() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
