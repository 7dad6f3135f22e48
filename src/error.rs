//! # Expansion Errors
//!
//! Error type shared by the graph model, the rig collaborator and the
//! expansion pass.

use crate::graph::{NodeId, PinId};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExpansionError>;

#[derive(Debug, Error)]
pub enum ExpansionError {
    #[error("incompatible pin types: {output} ({output_type}) cannot feed {input} ({input_type})")]
    IncompatibleTypes {
        output: String,
        output_type: String,
        input: String,
        input_type: String,
    },

    #[error("invalid link between pins {first} and {second}: {reason}")]
    InvalidLink {
        first: PinId,
        second: PinId,
        reason: String,
    },

    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("pin not found: {0}")]
    PinNotFound(PinId),

    #[error("pin '{name}' not found on node {node}")]
    MissingPin { node: NodeId, name: String },

    #[error("pin '{name}' already exists on node {node}")]
    DuplicatePin { node: NodeId, name: String },

    #[error("rig runtime function not found: {0}")]
    MissingFunction(String),

    #[error("rig runtime function '{function}' has an invalid signature: {reason}")]
    InvalidSignature { function: String, reason: String },

    #[error("rig classes derive from '{classes}' but the rig runtime expects '{capabilities}'")]
    BaseClassMismatch { classes: String, capabilities: String },

    #[error("invalid rig class '{class}': {reason}")]
    InvalidRigClass { class: String, reason: String },

    #[error("field '{field}' cannot be expanded: {reason}")]
    UnsupportedField { field: String, reason: String },

    #[error("sub-rig allocation indices exhausted ({issued} issued from base {base})")]
    AllocationExhausted { base: u32, issued: usize },

    #[error("node {node} is {found}, expected {expected}")]
    UnexpectedNodeKind {
        node: NodeId,
        expected: String,
        found: String,
    },

    #[error("node {0} is not a rig evaluator")]
    NotComposite(NodeId),

    #[error("graph is corrupt: {0}")]
    CorruptGraph(String),

    #[error("expansion of node {node} aborted: {source}")]
    Aborted {
        node: NodeId,
        #[source]
        source: Box<ExpansionError>,
    },

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExpansionError {
    /// Failures that only invalidate the node being expanded. The pass rolls
    /// the node back and keeps going; everything else aborts the pass.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExpansionError::IncompatibleTypes { .. } | ExpansionError::InvalidLink { .. }
        )
    }
}
