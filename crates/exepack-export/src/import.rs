//! Input stage: extract an archive into a workspace and load its project.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use exepack_archive::{ExtractOptions, extract};
use exepack_core::{IdGenerator, ObjectGraph};
use exepack_fs::{Area, SessionWorkspace, Storage, copy_tree};
use exepack_legacy::{MigrationReport, import_legacy, is_legacy};
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::manifest::{MANIFEST_FILE, Manifest, RESOURCES_DIR};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceFormat {
    /// `contentv3.xml` tree, migrated on import.
    Legacy,
    /// `manifest.json` plus resources.
    Current,
}

#[derive(Debug)]
pub struct Imported {
    pub graph: ObjectGraph,
    pub source: SourceFormat,
    pub warnings: Vec<String>,
    /// Present for legacy input.
    pub migration: Option<MigrationReport>,
}

/// Extract `input` into the raw area of `workspace` and load the project,
/// staging its resources into the resources area.
pub fn import_archive(input: &Path, workspace: &SessionWorkspace, config: &PipelineConfig) -> Result<Imported> {
    let file = File::open(input).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::InputNotFound(input.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;
    let raw = workspace.storage(Area::Raw);
    let options = ExtractOptions::default().buffer_size(config.copy_buffer_size);
    let report = extract(BufReader::new(file), &raw, Path::new(""), &options)?;
    tracing::debug!(entries = report.entries.len(), input = %input.display(), "input extracted");
    import_extracted(workspace, config)
}

/// Load a project already present in the raw area.
pub fn import_extracted(workspace: &SessionWorkspace, config: &PipelineConfig) -> Result<Imported> {
    let raw = workspace.storage(Area::Raw);
    let resources = workspace.storage(Area::Resources);

    if is_legacy(&raw) {
        let migration = import_legacy(
            &raw,
            &resources,
            &config.migration_options(),
            &mut IdGenerator::new(),
        )?;
        let warnings = migration
            .report
            .warnings
            .iter()
            .map(|w| format!("{}: {}", w.context, w.message))
            .collect();
        tracing::info!(units = migration.report.units, "legacy project imported");
        return Ok(Imported {
            graph: migration.graph,
            source: SourceFormat::Legacy,
            warnings,
            migration: Some(migration.report),
        });
    }

    if raw.exists(Path::new(MANIFEST_FILE)) {
        let manifest = Manifest::load(&raw)?;
        if raw.is_dir(Path::new(RESOURCES_DIR)) {
            let copied = copy_tree(&raw, Path::new(RESOURCES_DIR), &resources, Path::new(""))?;
            tracing::debug!(copied, "resources staged");
        }
        let warnings = if config.verify_checksums {
            manifest.verify(&resources)
        } else {
            Vec::new()
        };
        tracing::info!(pages = manifest.project.page_count(), "project imported");
        return Ok(Imported {
            graph: manifest.project,
            source: SourceFormat::Current,
            warnings,
            migration: None,
        });
    }

    Err(Error::InvalidInput(format!(
        "archive holds neither {} nor {MANIFEST_FILE}",
        exepack_legacy::LEGACY_DOCUMENT
    )))
}
