use std::io;
use std::path::PathBuf;

use crate::format::ArchiveFormat;
use crate::writer::HandleState;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unsupported archive format{}", .detected.map(|f| format!(" ({f})")).unwrap_or_default())]
    UnsupportedFormat { detected: Option<ArchiveFormat> },

    #[error("zip-slip attack detected: entry '{entry}' escapes the destination")]
    ZipSlip { entry: String },

    #[error("invalid entry path '{0}'")]
    InvalidPath(String),

    #[error("duplicate archive entry '{0}'")]
    DuplicateEntry(String),

    #[error("failed to extract '{path}': {source}")]
    ExtractionFailed { path: PathBuf, source: io::Error },

    #[error("failed to add '{path}' to archive: {source}")]
    AddFailed { path: PathBuf, source: Box<Error> },

    #[error("cannot {operation} on a {state} archive handle")]
    InvalidState {
        operation: &'static str,
        state: HandleState,
    },

    #[error("archive is corrupted: {0}")]
    Corrupted(#[source] zip::result::ZipError),

    #[error(transparent)]
    Storage(#[from] exepack_fs::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    /// Contract violations (operation on an unopened or finished handle).
    pub fn is_state_error(&self) -> bool {
        matches!(self, Self::InvalidState { .. })
    }

    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_not_found(),
            Self::AddFailed { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::Corrupted(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
