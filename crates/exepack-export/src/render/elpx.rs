use std::path::Path;

use exepack_archive::{Compression, create_archive};

use super::{package_with, write_options};
use crate::format::ExportFormat;
use crate::manifest::{MANIFEST_FILE, Manifest, RESOURCES_DIR};
use crate::renderer::{RenderContext, RenderResult, Rendered, Renderer};

/// Repackage the project in the current format: `manifest.json` plus the
/// resources tree.
pub struct ElpxRenderer;

impl Renderer for ElpxRenderer {
    fn format(&self) -> ExportFormat {
        ExportFormat::Elpx
    }

    fn render(&self, ctx: &RenderContext<'_>) -> RenderResult<Rendered> {
        let manifest = Manifest::build(ctx.graph, ctx.resources)?;
        let json = serde_json::to_vec_pretty(&manifest)?;
        tracing::debug!(resources = manifest.resources.len(), "project manifest built");

        let mut handle = create_archive(ctx.scratch_dir, write_options(ctx))?;
        let stored = package_with(&mut handle, ctx, &format!("{}.elpx", ctx.name), |handle| {
            handle.add_bytes(Path::new(MANIFEST_FILE), &json, Compression::Deflated)?;
            handle.add_directory_at(ctx.resources, Path::new(""), Path::new(RESOURCES_DIR))
        })?;
        Ok(Rendered::Package(stored))
    }
}
