use thiserror::Error;

use crate::raft::NodeId;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ElectionError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Node already registered: {0}")]
    DuplicateNode(NodeId),

    #[error("Node not found: {0}")]
    UnknownNode(NodeId),

    #[error("Membership registry has been dropped")]
    RegistryClosed,

    #[error("No leader in the cluster")]
    NoLeader,
}

pub type Result<T> = std::result::Result<T, ElectionError>;
