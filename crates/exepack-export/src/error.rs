use std::path::PathBuf;

use serde::Serialize;

/// Outcome taxonomy at the pipeline boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad format argument or malformed input; never retried.
    Validation,
    /// Container open/add/read/extract failure, traversal rejection.
    Archive,
    /// Operation on a handle in the wrong state.
    State,
    /// Missing input file or resource.
    NotFound,
    /// A renderer reported failure.
    Render,
    Internal,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported export format '{0}'")]
    UnsupportedFormat(String),

    #[error("no renderer registered for '{0}'")]
    MissingRenderer(String),

    #[error("input '{0}' not found")]
    InputNotFound(PathBuf),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid project manifest: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("{format} renderer failed: {message}")]
    Render { format: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error(transparent)]
    Archive(#[from] exepack_archive::Error),

    #[error(transparent)]
    Legacy(#[from] exepack_legacy::Error),

    #[error(transparent)]
    Graph(#[from] exepack_core::Error),

    #[error(transparent)]
    Storage(#[from] exepack_fs::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedFormat(_)
            | Self::InvalidInput(_)
            | Self::Manifest(_)
            | Self::Config(_)
            | Self::Graph(_) => ErrorKind::Validation,
            Self::MissingRenderer(_) | Self::Io(_) => ErrorKind::Internal,
            Self::InputNotFound(_) => ErrorKind::NotFound,
            Self::Render { .. } => ErrorKind::Render,
            Self::Archive(e) if e.is_state_error() => ErrorKind::State,
            Self::Archive(e) if e.is_not_found() => ErrorKind::NotFound,
            Self::Archive(exepack_archive::Error::Io(_)) => ErrorKind::Internal,
            Self::Archive(_) => ErrorKind::Archive,
            Self::Legacy(e) if e.is_not_found() => ErrorKind::NotFound,
            Self::Legacy(exepack_legacy::Error::Storage(_) | exepack_legacy::Error::Io(_)) => {
                ErrorKind::Internal
            }
            Self::Legacy(_) => ErrorKind::Validation,
            Self::Storage(e) if e.is_not_found() => ErrorKind::NotFound,
            Self::Storage(_) => ErrorKind::Internal,
        }
    }
}

impl From<figment::Error> for Error {
    fn from(e: figment::Error) -> Self {
        Self::Config(Box::new(e))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// A business failure reported to the caller, as opposed to an internal fault.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportFailure {
    pub kind: ErrorKind,
    pub message: String,
}

impl std::fmt::Display for ExportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}
