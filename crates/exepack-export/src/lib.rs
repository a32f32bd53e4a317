//! Export pipeline.
//!
//! Takes a project archive (legacy or current format) through a disposable
//! session workspace and publishes it in one of the whitelisted formats.
//!
//! - `format.rs` - Export format whitelist
//! - `renderer.rs` - Renderer contract and registry
//! - `render/` - Built-in renderers
//! - `manifest.rs` - Current-format project manifest
//! - `import.rs` - Extraction and project loading
//! - `config.rs` - Layered configuration
//! - `pipeline.rs` - Orchestration and publishing

pub mod config;
mod error;
pub mod format;
pub mod import;
pub mod manifest;
pub mod pipeline;
pub mod render;
pub mod renderer;

pub use config::{CONFIG_FILE, PipelineConfig};
pub use error::{Error, ErrorKind, ExportFailure, Result};
pub use format::ExportFormat;
pub use import::{Imported, SourceFormat, import_archive, import_extracted};
pub use manifest::{MANIFEST_FILE, Manifest, ResourceEntry};
pub use pipeline::{ExportOptions, ExportOutcome, ExportOutput, ExportPipeline, OutputKind};
pub use renderer::{RenderContext, RenderError, RenderResult, Rendered, Renderer, RendererRegistry};
