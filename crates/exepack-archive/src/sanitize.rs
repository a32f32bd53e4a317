use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// Result of sanitizing an archive entry name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SanitizedPath {
    pub original: String,
    /// Normalized path relative to the extraction destination.
    pub relative: PathBuf,
}

/// Validate an entry name read from an archive.
///
/// Backslashes are treated as separators, `.` components are dropped and
/// `..` pops the previous component. Anything that would land outside the
/// destination (absolute names, drive prefixes, `..` past the top) is a
/// [`Error::ZipSlip`]; NUL bytes and names that normalize to nothing are
/// [`Error::InvalidPath`].
pub fn sanitize_entry_path(name: &str) -> Result<SanitizedPath> {
    if name.contains('\0') {
        return Err(Error::InvalidPath(name.replace('\0', "\\0")));
    }

    let unified = name.replace('\\', "/");
    if unified.starts_with('/') || has_drive_prefix(&unified) {
        return Err(Error::ZipSlip {
            entry: name.to_string(),
        });
    }

    let mut parts: Vec<&str> = Vec::new();
    for part in unified.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                if parts.pop().is_none() {
                    return Err(Error::ZipSlip {
                        entry: name.to_string(),
                    });
                }
            }
            normal => parts.push(normal),
        }
    }

    if parts.is_empty() {
        return Err(Error::InvalidPath(name.to_string()));
    }

    Ok(SanitizedPath {
        original: name.to_string(),
        relative: parts.iter().collect(),
    })
}

fn has_drive_prefix(name: &str) -> bool {
    let bytes = name.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Convert a relative path into a `/`-separated archive entry name.
pub fn entry_name(path: &Path) -> Result<String> {
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(
                part.to_str()
                    .ok_or_else(|| Error::InvalidPath(path.to_string_lossy().into_owned()))?,
            ),
            Component::CurDir => {}
            _ => return Err(Error::InvalidPath(path.to_string_lossy().into_owned())),
        }
    }
    if parts.is_empty() {
        return Err(Error::InvalidPath(path.to_string_lossy().into_owned()));
    }
    Ok(parts.join("/"))
}
