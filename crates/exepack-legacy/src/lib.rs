//! Legacy project migration.
//!
//! Turns a legacy `contentv3.xml` serialized object tree into the current
//! [`ObjectGraph`](exepack_core::ObjectGraph) and stages the resources it
//! references.
//!
//! - `xml.rs` - Arena XML tree over `quick-xml` events
//! - `query.rs` - Field/instance/reference queries on the legacy layout
//! - `encoding.rs` - Transcoding legacy code pages to UTF-8
//! - `idevice.rs` - Per-class payload extraction
//! - `migrate.rs` - Graph construction, rewriting and the migration report
//! - `resources.rs` - Copying referenced files into the resources area

use std::io::Read;
use std::path::Path;

use exepack_core::IdGenerator;
use exepack_fs::Storage;

pub use encoding::{Decoded, decode_document};
pub use error::{Error, Result};
pub use idevice::{CASE_STUDY, Extracted, Handler, IMAGE_GALLERY, Payload, Skip, TEXT};
pub use migrate::{Migration, MigrationOptions, MigrationReport, MigrationWarning, ResourceRef, migrate};
pub use query::{LegacyDocument, Query};
pub use resources::stage_resources;
pub use xml::{NodeRef, XmlNode, XmlTree};

pub mod encoding;
mod error;
pub mod idevice;
pub mod migrate;
pub mod query;
pub mod resources;
pub mod xml;

/// File name of the legacy document at the archive root.
pub const LEGACY_DOCUMENT: &str = "contentv3.xml";

pub fn is_legacy(raw: &dyn Storage) -> bool {
    raw.exists(Path::new(LEGACY_DOCUMENT))
}

/// Migrate the legacy project extracted in `raw`, staging its resources
/// into `resources`.
pub fn import_legacy(
    raw: &dyn Storage,
    resources: &dyn Storage,
    options: &MigrationOptions,
    generator: &mut IdGenerator,
) -> Result<Migration> {
    let mut bytes = Vec::new();
    raw.open(Path::new(LEGACY_DOCUMENT))
        .map_err(|e| {
            if e.is_not_found() {
                Error::MissingDocument(LEGACY_DOCUMENT.to_string())
            } else {
                Error::Storage(e)
            }
        })?
        .read_to_end(&mut bytes)?;

    let mut migration = migrate(&bytes, options, generator)?;
    stage_resources(&mut migration.report, raw, resources)?;
    Ok(migration)
}
