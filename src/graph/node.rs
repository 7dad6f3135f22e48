//! # Nodes and Pins
//!
//! Arena-resident records of the graph IR. Identities are plain indices into
//! the owning [`Graph`](super::Graph).

use super::types::PinType;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PinId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pin#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinDirection {
    Input,
    Output,
}

impl PinDirection {
    pub fn opposite(self) -> Self {
        match self {
            PinDirection::Input => PinDirection::Output,
            PinDirection::Output => PinDirection::Input,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pin {
    pub id: PinId,
    pub owner: NodeId,
    pub name: String,
    pub direction: PinDirection,
    pub pin_type: PinType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_object: Option<String>,
    #[serde(default)]
    pub linked_to: Vec<PinId>,
}

impl Pin {
    pub fn is_linked(&self) -> bool {
        !self.linked_to.is_empty()
    }
}

/// Per-node configuration of a rig evaluator, authored in the editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorSettings {
    /// Rig class evaluated by this node. `None` until the user picks one.
    #[serde(default)]
    pub rig_type: Option<String>,
    #[serde(default)]
    pub disabled_inputs: BTreeSet<String>,
    #[serde(default)]
    pub disabled_outputs: BTreeSet<String>,
    /// Set once the node has been expanded; an inert node is a placeholder.
    #[serde(default)]
    pub inert: bool,
}

impl EvaluatorSettings {
    pub fn new(rig_type: impl Into<String>) -> Self {
        Self {
            rig_type: Some(rig_type.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Composite node lowered by the expansion pass.
    RigEvaluator(EvaluatorSettings),
    CallFunction { function: String, is_pure: bool },
    DynamicCast { target_type: String, is_pure: bool },
    Event { delegate_signature: String, function_name: String },
    VariableGet { owner: String, property: String },
    VariableSet { owner: String, property: String },
    Copy,
    AddDelegate { owner: String, property: String },
    /// Any user-authored primitive (literals, prints, ...).
    Primitive { name: String },
}

impl NodeKind {
    pub fn is_composite(&self) -> bool {
        matches!(self, NodeKind::RigEvaluator(_))
    }

    pub fn label(&self) -> String {
        match self {
            NodeKind::RigEvaluator(settings) => match &settings.rig_type {
                Some(rig) => format!("evaluate {}", rig),
                None => "evaluate <unset>".to_string(),
            },
            NodeKind::CallFunction { function, .. } => format!("call {}", function),
            NodeKind::DynamicCast { target_type, .. } => format!("cast to {}", target_type),
            NodeKind::Event { function_name, .. } => format!("event {}", function_name),
            NodeKind::VariableGet { property, .. } => format!("get {}", property),
            NodeKind::VariableSet { property, .. } => format!("set {}", property),
            NodeKind::Copy => "copy".to_string(),
            NodeKind::AddDelegate { property, .. } => format!("bind {}", property),
            NodeKind::Primitive { name } => name.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    /// Pins in declaration order.
    #[serde(default)]
    pub pins: Vec<PinId>,
    /// Composite node this intermediate node was expanded from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spawned_by: Option<NodeId>,
}

impl Node {
    pub fn evaluator_settings(&self) -> Option<&EvaluatorSettings> {
        match &self.kind {
            NodeKind::RigEvaluator(settings) => Some(settings),
            _ => None,
        }
    }

    pub fn evaluator_settings_mut(&mut self) -> Option<&mut EvaluatorSettings> {
        match &mut self.kind {
            NodeKind::RigEvaluator(settings) => Some(settings),
            _ => None,
        }
    }
}
