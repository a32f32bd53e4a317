//! Pipeline orchestration.
//!
//! A run owns one session workspace from creation to removal: import into
//! it, render inside it, publish out of it. The workspace is closed on every
//! exit path and a failed close never replaces the run's outcome.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use exepack_core::ObjectGraph;
use exepack_fs::{Area, SessionWorkspace, Storage, copy_dir_all};
use serde::Serialize;

use crate::config::PipelineConfig;
use crate::error::{Error, ErrorKind, ExportFailure, Result};
use crate::format::ExportFormat;
use crate::import::import_archive;
use crate::renderer::{RenderContext, RenderError, Rendered, RendererRegistry};

const DEFAULT_NAME: &str = "export";

#[derive(Clone, Debug, Default)]
pub struct ExportOptions {
    /// Base name of the produced file or directory.
    pub name: Option<String>,
    /// Absolute URL the published site will be served from.
    pub base_url: Option<String>,
    /// Zip the HTML formats, which otherwise produce a directory.
    pub package: bool,
}

impl ExportOptions {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn package(mut self, package: bool) -> Self {
        self.package = package;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Directory,
    Package,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportOutput {
    pub format: ExportFormat,
    pub kind: OutputKind,
    pub path: PathBuf,
    /// Non-fatal findings from import and rendering.
    pub warnings: Vec<String>,
}

/// Business result of an export. Internal faults travel as `Err` instead.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportOutcome {
    Exported(ExportOutput),
    Failed(ExportFailure),
}

impl ExportOutcome {
    fn failed(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Failed(ExportFailure {
            kind,
            message: message.into(),
        })
    }

    pub fn is_exported(&self) -> bool {
        matches!(self, Self::Exported(_))
    }

    pub fn into_result(self) -> std::result::Result<ExportOutput, ExportFailure> {
        match self {
            Self::Exported(output) => Ok(output),
            Self::Failed(failure) => Err(failure),
        }
    }
}

/// Business errors become [`ExportOutcome::Failed`]; internal ones stay `Err`.
fn into_outcome(result: Result<ExportOutcome>) -> Result<ExportOutcome> {
    match result {
        Ok(outcome) => Ok(outcome),
        Err(e) if e.kind() == ErrorKind::Internal => {
            tracing::error!(error = %e, "export aborted");
            Err(e)
        }
        Err(e) => {
            tracing::warn!(kind = ?e.kind(), error = %e, "export failed");
            Ok(ExportOutcome::failed(e.kind(), e.to_string()))
        }
    }
}

/// Import, render and publish project archives.
///
/// Holds no per-run state, so one pipeline can serve concurrent runs.
#[derive(Debug, Default)]
pub struct ExportPipeline {
    config: PipelineConfig,
    registry: RendererRegistry,
}

impl ExportPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            registry: RendererRegistry::builtin(),
        }
    }

    pub fn with_registry(mut self, registry: RendererRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Render `graph` with the resources of `workspace` into its export area.
    ///
    /// An unknown `target` is reported before anything on disk is touched.
    /// A renderer failure removes whatever it left in the export area.
    pub fn export(
        &self,
        graph: &ObjectGraph,
        workspace: &SessionWorkspace,
        target: &str,
        options: &ExportOptions,
    ) -> Result<ExportOutcome> {
        let format = match target.parse::<ExportFormat>() {
            Ok(format) => format,
            Err(e) => return into_outcome(Err(e)),
        };
        let name = match output_name(options, graph_name(graph)) {
            Ok(name) => name,
            Err(e) => return into_outcome(Err(e)),
        };
        self.render(graph, workspace, format, &name, options)
    }

    /// Full run from an input archive to `output_dir`.
    pub fn run(
        &self,
        input: &Path,
        output_dir: &Path,
        target: &str,
        options: &ExportOptions,
    ) -> Result<ExportOutcome> {
        let format = match target.parse::<ExportFormat>() {
            Ok(format) => format,
            Err(e) => return into_outcome(Err(e)),
        };
        let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or(DEFAULT_NAME);
        let name = match output_name(options, stem.to_string()) {
            Ok(name) => name,
            Err(e) => return into_outcome(Err(e)),
        };
        if !input.is_file() {
            return into_outcome(Err(Error::InputNotFound(input.to_path_buf())));
        }

        let workspace = SessionWorkspace::create(&self.config.workspace_root)?;
        let id = workspace.id().to_string();
        tracing::info!(workspace = %id, input = %input.display(), %format, "pipeline started");

        let result = self.run_in_workspace(&workspace, input, output_dir, format, &name, options);

        if let Err(e) = workspace.close() {
            tracing::warn!(workspace = %id, error = %e, "failed to remove workspace");
        }
        into_outcome(result)
    }

    fn run_in_workspace(
        &self,
        workspace: &SessionWorkspace,
        input: &Path,
        output_dir: &Path,
        format: ExportFormat,
        name: &str,
        options: &ExportOptions,
    ) -> Result<ExportOutcome> {
        let imported = import_archive(input, workspace, &self.config)?;

        let outcome = self.render(&imported.graph, workspace, format, name, options)?;
        let ExportOutcome::Exported(mut output) = outcome else {
            return Ok(outcome);
        };

        output.path = publish(&output.path, output.kind, output_dir)?;
        let mut warnings = imported.warnings;
        warnings.append(&mut output.warnings);
        output.warnings = warnings;
        tracing::info!(path = %output.path.display(), warnings = output.warnings.len(), "export published");
        Ok(ExportOutcome::Exported(output))
    }

    fn render(
        &self,
        graph: &ObjectGraph,
        workspace: &SessionWorkspace,
        format: ExportFormat,
        name: &str,
        options: &ExportOptions,
    ) -> Result<ExportOutcome> {
        let renderer = self
            .registry
            .get(format)
            .ok_or_else(|| Error::MissingRenderer(format.to_string()))?;

        let resources = workspace.storage(Area::Resources);
        let scratch = workspace.storage(Area::Scratch);
        let scratch_dir = workspace.resolve(Area::Scratch);
        let output = workspace.storage(Area::Export);
        let before = top_level(&output)?;

        let base_url = options.base_url.as_deref().or(self.config.base_url.as_deref());
        let ctx = RenderContext {
            graph,
            resources: &resources,
            scratch: &scratch,
            scratch_dir: &scratch_dir,
            output: &output,
            format,
            name,
            base_url,
            package: options.package,
            buffer_size: self.config.copy_buffer_size,
        };

        tracing::debug!(%format, name, "rendering");
        match renderer.render(&ctx) {
            Ok(rendered) => {
                let kind = match rendered {
                    Rendered::Directory(_) => OutputKind::Directory,
                    Rendered::Package(_) => OutputKind::Package,
                };
                Ok(ExportOutcome::Exported(ExportOutput {
                    format,
                    kind,
                    path: workspace.resolve(Area::Export).join(rendered.path()),
                    warnings: Vec::new(),
                }))
            }
            Err(e) => {
                discard_new(&output, &before);
                match e {
                    RenderError::Io(e) => Err(Error::Io(e)),
                    other => into_outcome(Err(Error::Render {
                        format: format.to_string(),
                        message: other.to_string(),
                    })),
                }
            }
        }
    }
}

fn graph_name(graph: &ObjectGraph) -> String {
    if graph.meta.title.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        crate::render::site::slugify(&graph.meta.title)
    }
}

/// The requested name, or `fallback`. Must be one plain path component.
fn output_name(options: &ExportOptions, fallback: String) -> Result<String> {
    let name = options.name.clone().unwrap_or(fallback);
    let mut components = Path::new(&name).components();
    match (components.next(), components.next()) {
        (Some(std::path::Component::Normal(_)), None) if !name.contains(['/', '\\']) => Ok(name),
        _ => Err(Error::InvalidInput(format!("invalid output name '{name}'"))),
    }
}

fn top_level(output: &dyn Storage) -> Result<HashSet<PathBuf>> {
    Ok(output
        .list(Path::new(""))?
        .into_iter()
        .map(|entry| entry.path)
        .collect())
}

/// Remove everything a failed renderer added to the export area.
fn discard_new(output: &dyn Storage, before: &HashSet<PathBuf>) {
    let current = match output.list(Path::new("")) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(error = %e, "cannot list export area after failed render");
            return;
        }
    };
    for entry in current.into_iter().filter(|e| !before.contains(&e.path)) {
        if let Err(e) = output.remove(&entry.path) {
            tracing::warn!(path = %entry.path.display(), error = %e, "failed to remove partial output");
        }
    }
}

/// Move a rendered artifact from the export area into `output_dir`.
///
/// The artifact is copied under a temporary name next to its target and
/// renamed into place, so `output_dir` never holds a half-written result.
fn publish(source: &Path, kind: OutputKind, output_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(output_dir)?;
    let file_name = source
        .file_name()
        .ok_or_else(|| Error::InvalidInput(format!("rendered path '{}' has no name", source.display())))?;
    let target = output_dir.join(file_name);

    match kind {
        OutputKind::Package => {
            let mut staged = tempfile::NamedTempFile::new_in(output_dir)?;
            io::copy(&mut File::open(source)?, staged.as_file_mut())?;
            staged.as_file().sync_all()?;
            staged.persist(&target).map_err(|e| Error::Io(e.error))?;
        }
        OutputKind::Directory => {
            let staged = tempfile::Builder::new().prefix(".exepack-").tempdir_in(output_dir)?;
            copy_dir_all(source, staged.path())?;
            if target.exists() {
                fs::remove_dir_all(&target)?;
            }
            fs::rename(staged.path(), &target)?;
        }
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_names() {
        let options = ExportOptions::default();
        assert_eq!(output_name(&options, "course".into()).unwrap(), "course");
        for bad in ["../x", "a/b", "..", "", "/abs"] {
            let options = ExportOptions::default().name(bad);
            assert!(output_name(&options, "x".into()).is_err(), "{bad}");
        }
    }

    #[test]
    fn internal_errors_stay_errors() {
        let io = Error::Io(io::Error::other("disk"));
        assert!(into_outcome(Err(io)).is_err());
        let outcome = into_outcome(Err(Error::UnsupportedFormat("docx".into()))).unwrap();
        assert_eq!(
            outcome.into_result().unwrap_err().kind,
            ErrorKind::Validation
        );
    }
}
