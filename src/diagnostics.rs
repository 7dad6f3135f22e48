//! # Compiler Diagnostics
//!
//! Messages collected during a compile pass, attached to the node that
//! caused them where there is one.

use crate::graph::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Note,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<NodeId>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Note => "note",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match self.node {
            Some(node) => write!(f, "{} [{}]: {}", severity, node, self.message),
            None => write!(f, "{}: {}", severity, self.message),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageLog {
    entries: Vec<Diagnostic>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, severity: Severity, node: Option<NodeId>, message: impl Into<String>) {
        self.entries.push(Diagnostic {
            severity,
            node,
            message: message.into(),
        });
    }

    pub fn note(&mut self, node: Option<NodeId>, message: impl Into<String>) {
        self.push(Severity::Note, node, message);
    }

    pub fn warning(&mut self, node: Option<NodeId>, message: impl Into<String>) {
        self.push(Severity::Warning, node, message);
    }

    pub fn error(&mut self, node: Option<NodeId>, message: impl Into<String>) {
        self.push(Severity::Error, node, message);
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count()
    }

    pub fn for_node(&self, node: NodeId) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.node == Some(node))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
