//! `manifest.json` of the current project format.

use std::path::Path;

use chrono::{DateTime, Utc};
use exepack_archive::sha256_hex;
use exepack_core::ObjectGraph;
use exepack_fs::Storage;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const MANIFEST_FILE: &str = "manifest.json";
/// Directory holding the resources tree inside the container.
pub const RESOURCES_DIR: &str = "resources";
pub const MANIFEST_VERSION: u32 = 1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResourceEntry {
    /// `/`-separated path inside the resources tree.
    pub path: String,
    pub size: u64,
    pub sha256: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub generator: String,
    pub created: DateTime<Utc>,
    pub project: ObjectGraph,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

impl Manifest {
    /// Describe `graph` and every file in `resources`.
    pub fn build(graph: &ObjectGraph, resources: &dyn Storage) -> exepack_archive::Result<Self> {
        let mut entries = Vec::new();
        for file in resources.walk_files(Path::new(""))? {
            let sha256 = sha256_hex(&mut resources.open(&file.path)?)?;
            entries.push(ResourceEntry {
                path: storage_path(&file.path),
                size: file.size,
                sha256,
            });
        }
        Ok(Self {
            version: MANIFEST_VERSION,
            generator: concat!("exepack ", env!("CARGO_PKG_VERSION")).to_string(),
            created: Utc::now(),
            project: graph.clone(),
            resources: entries,
        })
    }

    pub fn load(raw: &dyn Storage) -> Result<Self> {
        let json = raw.read_to_string(Path::new(MANIFEST_FILE))?;
        let manifest: Self = serde_json::from_str(&json)?;
        if manifest.version > MANIFEST_VERSION {
            tracing::warn!(version = manifest.version, "manifest is newer than this reader");
        }
        Ok(manifest)
    }

    /// Compare the indexed resources against `resources`. Every missing or
    /// altered file yields one warning.
    pub fn verify(&self, resources: &dyn Storage) -> Vec<String> {
        let mut warnings = Vec::new();
        for entry in &self.resources {
            let path = Path::new(&entry.path);
            let actual = resources
                .open(path)
                .map_err(exepack_archive::Error::from)
                .and_then(|mut reader| sha256_hex(&mut reader));
            match actual {
                Ok(sha256) if sha256 == entry.sha256 => {}
                Ok(_) => warnings.push(format!("checksum mismatch for resource '{}'", entry.path)),
                Err(e) => warnings.push(format!("resource '{}' unreadable: {e}", entry.path)),
            }
        }
        for warning in &warnings {
            tracing::warn!("{warning}");
        }
        warnings
    }
}

fn storage_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
