//! Layered pipeline configuration.

use std::path::{Path, PathBuf};

use exepack_archive::DEFAULT_BUFFER_SIZE;
use exepack_core::{DEFAULT_SESSION_BASE, RewriteMode};
use exepack_legacy::MigrationOptions;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::format::ExportFormat;

/// File looked up in the working directory when no path is given.
pub const CONFIG_FILE: &str = "exepack.toml";
pub const ENV_PREFIX: &str = "EXEPACK_";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Parent directory of session workspaces.
    pub workspace_root: PathBuf,
    /// Prefix for rewritten resource references; empty selects relative paths.
    pub session_base: String,
    pub copy_buffer_size: usize,
    pub default_format: ExportFormat,
    pub base_url: Option<String>,
    pub verify_checksums: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir().join("exepack"),
            session_base: DEFAULT_SESSION_BASE.to_string(),
            copy_buffer_size: DEFAULT_BUFFER_SIZE,
            default_format: ExportFormat::Html5,
            base_url: None,
            verify_checksums: true,
        }
    }
}

impl PipelineConfig {
    /// Defaults, then the TOML file (`path` or [`CONFIG_FILE`]; a missing
    /// file is skipped), then `EXEPACK_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = path.map_or_else(|| PathBuf::from(CONFIG_FILE), Path::to_path_buf);
        let config = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?;
        Ok(config)
    }

    pub fn migration_options(&self) -> MigrationOptions {
        MigrationOptions {
            session_base: self.session_base.clone(),
            mode: if self.session_base.is_empty() {
                RewriteMode::Relative
            } else {
                RewriteMode::Session
            },
        }
    }

    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
