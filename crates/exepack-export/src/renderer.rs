//! Renderer contract and registry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use exepack_core::ObjectGraph;
use exepack_fs::Storage;

use crate::format::ExportFormat;

/// Everything a renderer may read or write.
///
/// Storage paths are relative to the respective area roots. Packaged
/// renderers build their tree in `scratch` and store only the finished
/// container in `output`.
pub struct RenderContext<'a> {
    pub graph: &'a ObjectGraph,
    pub resources: &'a dyn Storage,
    pub scratch: &'a dyn Storage,
    /// Filesystem path of the scratch area, for archive buffers.
    pub scratch_dir: &'a Path,
    pub output: &'a dyn Storage,
    pub format: ExportFormat,
    /// Base name of the produced directory or file.
    pub name: &'a str,
    pub base_url: Option<&'a str>,
    /// Package formats that default to a plain directory.
    pub package: bool,
    pub buffer_size: usize,
}

/// What a renderer left in the output area.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rendered {
    Directory(PathBuf),
    Package(PathBuf),
}

impl Rendered {
    pub fn path(&self) -> &Path {
        match self {
            Self::Directory(path) | Self::Package(path) => path,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Archive(#[from] exepack_archive::Error),

    #[error(transparent)]
    Storage(#[from] exepack_fs::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// A publishing backend for one [`ExportFormat`].
pub trait Renderer: Send + Sync {
    fn format(&self) -> ExportFormat;

    fn render(&self, ctx: &RenderContext<'_>) -> RenderResult<Rendered>;
}

/// Renderers keyed by format. Registering a format again replaces it.
pub struct RendererRegistry {
    renderers: HashMap<ExportFormat, Box<dyn Renderer>>,
}

impl RendererRegistry {
    pub fn empty() -> Self {
        Self {
            renderers: HashMap::new(),
        }
    }

    /// Registry with one built-in renderer per format.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for renderer in crate::render::builtin() {
            registry.renderers.insert(renderer.format(), renderer);
        }
        registry
    }

    pub fn register<R: Renderer + 'static>(mut self, renderer: R) -> Self {
        self.renderers.insert(renderer.format(), Box::new(renderer));
        self
    }

    pub fn get(&self, format: ExportFormat) -> Option<&dyn Renderer> {
        self.renderers.get(&format).map(|r| r.as_ref())
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl std::fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut formats: Vec<_> = self.renderers.keys().map(|f| f.as_str()).collect();
        formats.sort_unstable();
        f.debug_struct("RendererRegistry").field("formats", &formats).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl Renderer for Noop {
        fn format(&self) -> ExportFormat {
            ExportFormat::Ims
        }

        fn render(&self, _ctx: &RenderContext<'_>) -> RenderResult<Rendered> {
            Err(RenderError::Failed("noop".into()))
        }
    }

    #[test]
    fn builtin_covers_every_format() {
        let registry = RendererRegistry::builtin();
        for format in ExportFormat::ALL {
            let renderer = registry.get(format).unwrap();
            assert_eq!(renderer.format(), format);
        }
    }

    #[test]
    fn register_replaces() {
        let registry = RendererRegistry::empty().register(Noop);
        assert!(registry.get(ExportFormat::Html5).is_none());
        assert!(registry.get(ExportFormat::Ims).is_some());
    }
}
