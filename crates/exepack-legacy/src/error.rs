#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed legacy document: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed legacy document: {0}")]
    Malformed(String),

    #[error("legacy document '{0}' not found")]
    MissingDocument(String),

    #[error(transparent)]
    Graph(#[from] exepack_core::Error),

    #[error(transparent)]
    Storage(#[from] exepack_fs::Error),

    #[error("failed to read legacy document: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::MissingDocument(_) => true,
            Self::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
