use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("failed to write '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("path not found: '{0}'")]
    NotFound(PathBuf),

    #[error("path escapes storage root: '{0}'")]
    OutsideRoot(PathBuf),

    #[error("no free workspace id after {attempts} attempts")]
    IdExhausted { attempts: u32 },
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Read { source, .. } | Self::Write { source, .. } => {
                source.kind() == io::ErrorKind::NotFound
            }
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
