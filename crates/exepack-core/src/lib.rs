//! Project model shared by the migrator and the export pipeline.
//!
//! - `graph.rs` - Flat-arena page/block/unit graph
//! - `id.rs` - Collision-checked id generation
//! - `rewrite.rs` - Resource reference rewriting and HTML scanning
//! - `escape.rs` - XML escaping for re-embedded plain text

pub use error::{Error, Result};
pub use escape::escape_xml;
pub use graph::{BlockNode, ContentUnit, NodeId, ObjectGraph, PageNode, ProjectMeta};
pub use id::{IdGenerator, is_generated_id};
pub use rewrite::{
    DEFAULT_SESSION_BASE, Reference, RewriteMode, RewrittenHtml, map_references, rebase, rewrite,
    rewrite_html, scan_references,
};

mod error;
mod escape;
pub mod graph;
pub mod id;
pub mod rewrite;
