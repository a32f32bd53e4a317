use std::fs;
use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

/// Copy `reader` into a temp file under `dir`, removed when dropped.
pub fn spool(reader: &mut impl Read, dir: &Path) -> Result<NamedTempFile> {
    fs::create_dir_all(dir).with_context(|| format!("creating '{}'", dir.display()))?;
    let mut file = tempfile::Builder::new()
        .prefix("stdin-")
        .suffix(".elp")
        .tempfile_in(dir)
        .context("creating spool file")?;
    let bytes = io::copy(reader, file.as_file_mut()).context("reading standard input")?;
    tracing::debug!(bytes, path = %file.path().display(), "input spooled");
    Ok(file)
}
