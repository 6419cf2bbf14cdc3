use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("capacity exhausted: all {capacity} {kind} entries are in use")]
    CapacityExhausted { kind: &'static str, capacity: usize },
    #[error("an entity with uid {0} already exists")]
    DuplicateUid(String),
    #[error("unknown node type: {0}")]
    UnknownType(String),
    #[error("unknown uid: {0}")]
    UnknownUid(String),
    #[error("unknown nodespace: {0}")]
    UnknownNodespace(String),
    #[error("node type {nodetype} has no gate named {gate}")]
    UnknownGate { nodetype: String, gate: String },
    #[error("node type {nodetype} has no slot named {slot}")]
    UnknownSlot { nodetype: String, slot: String },
    #[error("unknown node group: {0}")]
    UnknownGroup(String),
    #[error("the root nodespace cannot be deleted")]
    RootNodespace,
    #[error("shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch { expected: Vec<usize>, found: Vec<usize> },
    #[error("invalid persistence data: {0}")]
    InvalidPersistence(String),
    #[error("node function failed: {0}")]
    Nodefunction(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type NetResult<T> = Result<T, NetError>;
