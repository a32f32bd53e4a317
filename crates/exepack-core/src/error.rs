use crate::graph::NodeId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("duplicate node id '{0}'")]
    DuplicateId(NodeId),

    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: NodeId },

    #[error("{kind} '{id}' references missing parent '{parent}'")]
    MissingParent {
        kind: &'static str,
        id: NodeId,
        parent: NodeId,
    },

    #[error("moving page '{page}' under '{parent}' would create a cycle")]
    Cycle { page: NodeId, parent: NodeId },
}

pub type Result<T> = std::result::Result<T, Error>;
