//! Built-in renderers.
//!
//! - `site.rs` - Page planning and HTML shared by the site formats
//! - `html.rs` - Multi-page and single-page HTML5
//! - `scorm.rs` - SCORM 1.2, SCORM 2004 and IMS content packages
//! - `epub.rs` - EPUB 3
//! - `elpx.rs` - Current project format

use std::path::{Path, PathBuf};

use exepack_archive::{ArchiveHandle, WriteOptions, create_archive};
use exepack_fs::Storage;

use crate::format::ExportFormat;
use crate::renderer::{RenderContext, RenderResult, Rendered, Renderer};

mod elpx;
mod epub;
mod html;
mod scorm;
pub(crate) mod site;

pub use elpx::ElpxRenderer;
pub use epub::EpubRenderer;
pub use html::{Html5Renderer, SinglePageRenderer};
pub use scorm::{PackageFlavor, ScormRenderer};

pub(crate) fn builtin() -> Vec<Box<dyn Renderer>> {
    vec![
        Box::new(ElpxRenderer),
        Box::new(Html5Renderer),
        Box::new(SinglePageRenderer),
        Box::new(ScormRenderer::new(PackageFlavor::Scorm12)),
        Box::new(ScormRenderer::new(PackageFlavor::Scorm2004)),
        Box::new(ScormRenderer::new(PackageFlavor::Ims)),
        Box::new(EpubRenderer),
    ]
}

/// Build a site tree with `build`, either straight into the output area or
/// in scratch and then packaged as `archive_name`.
pub(crate) fn emit_tree(
    ctx: &RenderContext<'_>,
    package: bool,
    archive_name: &str,
    build: impl FnOnce(&dyn Storage, &Path) -> RenderResult<()>,
) -> RenderResult<Rendered> {
    if !package {
        let dir = PathBuf::from(ctx.name);
        build(ctx.output, &dir)?;
        return Ok(Rendered::Directory(dir));
    }

    let dir = PathBuf::from(format!("{}-site", ctx.format));
    build(ctx.scratch, &dir)?;
    let mut handle = create_archive(ctx.scratch_dir, write_options(ctx))?;
    let stored = package_with(&mut handle, ctx, archive_name, |handle| {
        handle.add_directory(ctx.scratch, &dir)
    });
    if let Err(e) = ctx.scratch.remove(&dir) {
        tracing::warn!(dir = %dir.display(), error = %e, "failed to remove site build directory");
    }
    Ok(Rendered::Package(stored?))
}

/// Fill `handle` and store it in the output area. The handle is closed on
/// every path.
pub(crate) fn package_with(
    handle: &mut ArchiveHandle,
    ctx: &RenderContext<'_>,
    archive_name: &str,
    fill: impl FnOnce(&mut ArchiveHandle) -> exepack_archive::Result<()>,
) -> RenderResult<PathBuf> {
    let result = fill(handle).and_then(|()| handle.store_archive(ctx.output, Path::new(""), archive_name));
    if result.is_err() {
        if let Err(e) = handle.close() {
            tracing::warn!(error = %e, "failed to close archive after error");
        }
    }
    Ok(result?)
}

pub(crate) fn write_options(ctx: &RenderContext<'_>) -> WriteOptions {
    WriteOptions::default().buffer_size(ctx.buffer_size)
}

/// `<name>_<format>.zip`, the file name of packaged site formats.
pub(crate) fn zip_name(ctx: &RenderContext<'_>) -> String {
    match ctx.format {
        ExportFormat::Html5 | ExportFormat::Html5SinglePage => format!("{}.zip", ctx.name),
        format => format!("{}_{format}.zip", ctx.name),
    }
}
