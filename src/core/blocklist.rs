//! Block-list parsing
//!
//! The block list is a line-oriented text file:
//!
//! ```text
//! # comments start with '#'
//! C:\Games\Foo\foo.exe        <- a single executable
//! C:/Tools/Bar                <- every executable below this directory
//! ```
//!
//! Each requested executable is registered with a display key made of its
//! parent-directory-qualified name, which becomes the payload of its rule
//! names. For directory lines the key is taken relative to the directory's
//! parent, so `C:\Tools\Bar\sub\x.exe` listed via `C:\Tools\Bar` gets
//! `Bar\sub\x.exe`.

use crate::core::error::Result;
use crate::utils;
use std::collections::BTreeMap;
use std::path::{MAIN_SEPARATOR, Path};
use tracing::{debug, info, warn};

/// Requested executables: application path → display key
pub type BlockRequest = BTreeMap<String, String>;

/// Byte offset where the parent-directory-qualified part of `path` starts
///
/// That is one past the second-to-last separator, or 0 when there is none.
pub fn display_key_start(path: &str) -> usize {
    let Some(last) = path.rfind(MAIN_SEPARATOR) else {
        return 0;
    };
    path[..last]
        .rfind(MAIN_SEPARATOR)
        .map_or(0, |idx| idx + MAIN_SEPARATOR.len_utf8())
}

/// Display key of a single executable path
pub fn display_key_for(path: &str) -> &str {
    &path[display_key_start(path)..]
}

/// Reads and parses a block-list file
///
/// # Errors
///
/// Returns `Err` if the file cannot be read or a listed directory contains
/// a file name that is not valid Unicode.
pub fn read_block_list(path: &Path, extension: &str) -> Result<BlockRequest> {
    let bytes = std::fs::read(path)?;
    let content = match String::from_utf8(bytes) {
        Ok(content) => content,
        Err(e) => {
            warn!("Block list {:?} is not valid UTF-8, decoding lossily", path);
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    };

    let request = parse_block_list(&content, extension)?;
    info!("Block list {:?} requests {} executable(s)", path, request.len());
    Ok(request)
}

/// Parses block-list text, resolving each entry against the filesystem
///
/// Lines naming neither an existing directory nor an existing file ending
/// with `extension` are skipped.
///
/// # Errors
///
/// Returns `Err` if a listed directory contains a file name that is not
/// valid Unicode.
pub fn parse_block_list(content: &str, extension: &str) -> Result<BlockRequest> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut request = BlockRequest::new();

    for line in content.lines() {
        let item = utils::trim_whitespace(line);
        if item.is_empty() || item.starts_with('#') {
            continue;
        }

        let item = utils::normalize_separators(item);
        let path = Path::new(&item);

        if path.is_dir() {
            register_directory(&mut request, &item, extension)?;
        } else if path.is_file() && utils::ends_with(&item, extension) {
            request.insert(item.clone(), display_key_for(&item).to_string());
        } else {
            debug!("Skipping {item:?}: not a directory or a {extension} file");
        }
    }

    Ok(request)
}

fn register_directory(request: &mut BlockRequest, item: &str, extension: &str) -> Result<()> {
    let mut dir = utils::trim_end_chars(item, |c| c == MAIN_SEPARATOR).to_string();
    dir.push(MAIN_SEPARATOR);

    let start = display_key_start(&dir);
    let files = utils::list_files(&dir, extension, true)?;
    debug!("Directory {dir:?} holds {} {extension} file(s)", files.len());

    for file in files {
        let key = file.get(start..).unwrap_or(&file).to_string();
        request.insert(file, key);
    }
    Ok(())
}
