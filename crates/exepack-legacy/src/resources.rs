//! Copying referenced legacy resources into the session resources area.

use std::io::{self, Write};
use std::path::Path;

use exepack_core::Reference;
use exepack_fs::Storage;

use crate::error::Result;
use crate::migrate::MigrationReport;

/// Copy every referenced resource from `raw` into `resources`.
///
/// Legacy archives keep resources either under `resources/` or flat next
/// to the document; both are tried. Files found in neither are recorded in
/// [`MigrationReport::missing`] and the run continues. Returns the number of
/// files staged.
pub fn stage_resources(
    report: &mut MigrationReport,
    raw: &dyn Storage,
    resources: &dyn Storage,
) -> Result<usize> {
    let mut staged = 0;
    let mut missing = Vec::new();

    for reference in &report.referenced {
        let Some(source) = locate(raw, &reference.original) else {
            missing.push(reference.clone());
            continue;
        };
        let target = Path::new(&reference.staged);
        if resources.exists(target) {
            continue;
        }
        let mut reader = raw.open(Path::new(&source))?;
        let mut writer = resources.create(target)?;
        io::copy(&mut reader, &mut writer)
            .and_then(|_| writer.flush())
            .map_err(|e| exepack_fs::Error::Write {
                path: target.to_path_buf(),
                source: e,
            })?;
        tracing::trace!(from = %source, to = %reference.staged, "resource staged");
        staged += 1;
    }

    for reference in missing {
        report.warn(
            reference.owner.to_string(),
            format!("referenced resource '{}' not found in archive", reference.original),
        );
        report.missing.push(reference);
    }
    tracing::debug!(staged, missing = report.missing.len(), "legacy resources staged");
    Ok(staged)
}

fn locate(raw: &dyn Storage, original: &str) -> Option<String> {
    let source = Reference::classify(original).source_path()?;
    let flat = source
        .strip_prefix("resources/")
        .map(str::to_string)
        .unwrap_or_else(|| source.clone());
    [source, flat]
        .into_iter()
        .find(|candidate| raw.exists(Path::new(candidate)) && !raw.is_dir(Path::new(candidate)))
}
