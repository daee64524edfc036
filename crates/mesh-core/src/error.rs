//! Error types returned by external operations.

use mesh_events::{MessageClass, MessageId, NodeId, PacketId, ParseClassError};
use thiserror::Error;

use crate::ledger::LedgerError;

/// Failure of an operation on the simulation. Nothing is mutated when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MeshError {
    #[error("node {0} not found")]
    UnknownNode(NodeId),

    #[error("packet {0} not found in any inventory")]
    UnknownPacket(PacketId),

    #[error("message {0} not found")]
    UnknownMessage(MessageId),

    #[error("invalid request: {0}")]
    Invalid(String),

    #[error(transparent)]
    Class(#[from] ParseClassError),

    #[error("only {expected} messages carry a {what}")]
    WrongClass {
        expected: MessageClass,
        what: &'static str,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("cannot link node {0} to itself")]
    SelfLink(NodeId),

    #[error("link between {0} and {1} not found")]
    UnknownLink(NodeId, NodeId),

    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },

    #[error("node {node} cannot open packet {packet}")]
    NotDecryptable { node: NodeId, packet: PacketId },
}

impl MeshError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        MeshError::Invalid(reason.into())
    }
}
