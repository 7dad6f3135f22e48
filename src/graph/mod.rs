//! # Graph Model
//!
//! The mutable intermediate representation rewritten by the expansion pass.
//!
//! Nodes and pins live in two arenas owned by [`Graph`]; a [`NodeId`] or
//! [`PinId`] is an index into them. Links are stored symmetrically on both
//! pins, so every mutation goes through the methods here to keep the two
//! sides in agreement.
//!
//! Removed pins leave a tombstone so ids handed out earlier never alias a
//! different pin.
//!
//! [`Graph::checkpoint`] starts recording the prior state of everything the
//! following mutations touch; [`Graph::rollback`] puts it back and drops the
//! nodes and pins created since. The cost of a rollback is proportional to
//! what changed, not to the size of the graph.

pub mod node;
pub mod types;

pub use node::{EvaluatorSettings, Node, NodeId, NodeKind, Pin, PinDirection, PinId};
pub use types::{ClassHierarchy, ContainerType, PinCategory, PinType};

use crate::error::{ExpansionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Graph {
    pub name: String,
    /// Class the Blueprint owning this graph derives from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_class: Option<String>,
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    pins: Vec<Option<Pin>>,
    #[serde(default)]
    hierarchy: ClassHierarchy,
    #[serde(skip)]
    undo: Option<UndoLog>,
}

/// Prior state of the arena entries touched since the last checkpoint.
#[derive(Debug, Clone, Default)]
struct UndoLog {
    node_count: usize,
    pin_count: usize,
    nodes: HashMap<usize, Node>,
    pins: HashMap<usize, Option<Pin>>,
    hierarchy: Option<ClassHierarchy>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_parent_class(mut self, parent: impl Into<String>) -> Self {
        self.parent_class = Some(parent.into());
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn hierarchy(&self) -> &ClassHierarchy {
        &self.hierarchy
    }

    pub fn hierarchy_mut(&mut self) -> &mut ClassHierarchy {
        if let Some(log) = self.undo.as_mut() {
            if log.hierarchy.is_none() {
                log.hierarchy = Some(self.hierarchy.clone());
            }
        }
        &mut self.hierarchy
    }

    // ---------------------------------------------------------------------
    // Checkpoints
    // ---------------------------------------------------------------------

    /// Start recording changes. A checkpoint already open is discarded.
    pub fn checkpoint(&mut self) {
        self.undo = Some(UndoLog {
            node_count: self.nodes.len(),
            pin_count: self.pins.len(),
            ..Default::default()
        });
    }

    /// Keep every change made since the checkpoint.
    pub fn commit(&mut self) {
        self.undo = None;
    }

    /// Undo every change made since the checkpoint. Returns false when no
    /// checkpoint was open.
    pub fn rollback(&mut self) -> bool {
        let Some(log) = self.undo.take() else {
            return false;
        };
        self.nodes.truncate(log.node_count);
        self.pins.truncate(log.pin_count);
        for (index, node) in log.nodes {
            if let Some(slot) = self.nodes.get_mut(index) {
                *slot = node;
            }
        }
        for (index, pin) in log.pins {
            if let Some(slot) = self.pins.get_mut(index) {
                *slot = pin;
            }
        }
        if let Some(hierarchy) = log.hierarchy {
            self.hierarchy = hierarchy;
        }
        true
    }

    fn record_node(&mut self, index: usize) {
        let Some(log) = self.undo.as_mut() else {
            return;
        };
        if index < log.node_count && !log.nodes.contains_key(&index) {
            if let Some(node) = self.nodes.get(index) {
                log.nodes.insert(index, node.clone());
            }
        }
    }

    fn record_pin(&mut self, index: usize) {
        let Some(log) = self.undo.as_mut() else {
            return;
        };
        if index < log.pin_count && !log.pins.contains_key(&index) {
            if let Some(pin) = self.pins.get(index) {
                log.pins.insert(index, pin.clone());
            }
        }
    }

    // ---------------------------------------------------------------------
    // Nodes
    // ---------------------------------------------------------------------

    pub fn create_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            kind,
            pins: Vec::new(),
            spawned_by: None,
        });
        id
    }

    pub fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes.get(id.0).ok_or(ExpansionError::NodeNotFound(id))
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.record_node(id.0);
        self.nodes.get_mut(id.0).ok_or(ExpansionError::NodeNotFound(id))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes spawned while expanding `source`, in creation order.
    pub fn spawned_by(&self, source: NodeId) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|node| node.spawned_by == Some(source))
            .map(|node| node.id)
            .collect()
    }

    // ---------------------------------------------------------------------
    // Pins
    // ---------------------------------------------------------------------

    /// Create a pin on `node`. Names are unique per node and direction.
    pub fn create_pin(
        &mut self,
        node: NodeId,
        direction: PinDirection,
        pin_type: PinType,
        name: &str,
    ) -> Result<PinId> {
        if self.find_pin(node, name, Some(direction))?.is_some() {
            return Err(ExpansionError::DuplicatePin {
                node,
                name: name.to_string(),
            });
        }

        let id = PinId(self.pins.len());
        self.pins.push(Some(Pin {
            id,
            owner: node,
            name: name.to_string(),
            direction,
            pin_type,
            default_value: None,
            default_object: None,
            linked_to: Vec::new(),
        }));
        self.node_mut(node)?.pins.push(id);
        Ok(id)
    }

    /// Break every link of `pin`, detach it from its node and tombstone it.
    pub fn remove_pin(&mut self, pin: PinId) -> Result<()> {
        self.break_pin_links(pin)?;
        let owner = self.pin(pin)?.owner;
        self.node_mut(owner)?.pins.retain(|id| *id != pin);
        self.record_pin(pin.0);
        if let Some(slot) = self.pins.get_mut(pin.0) {
            *slot = None;
        }
        Ok(())
    }

    pub fn pin(&self, id: PinId) -> Result<&Pin> {
        self.pins
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(ExpansionError::PinNotFound(id))
    }

    pub fn pin_mut(&mut self, id: PinId) -> Result<&mut Pin> {
        self.record_pin(id.0);
        self.pins
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(ExpansionError::PinNotFound(id))
    }

    /// Look up a pin by name, optionally restricted to one direction.
    pub fn find_pin(
        &self,
        node: NodeId,
        name: &str,
        direction: Option<PinDirection>,
    ) -> Result<Option<PinId>> {
        for id in &self.node(node)?.pins {
            let pin = self.pin(*id)?;
            if pin.name == name && direction.map_or(true, |d| d == pin.direction) {
                return Ok(Some(*id));
            }
        }
        Ok(None)
    }

    /// Like [`find_pin`](Self::find_pin) but a missing pin is an error.
    pub fn find_pin_checked(
        &self,
        node: NodeId,
        name: &str,
        direction: Option<PinDirection>,
    ) -> Result<PinId> {
        self.find_pin(node, name, direction)?
            .ok_or_else(|| ExpansionError::MissingPin {
                node,
                name: name.to_string(),
            })
    }

    /// Pins of `node` going in `direction`, in declaration order.
    pub fn pins_of(&self, node: NodeId, direction: PinDirection) -> Result<Vec<PinId>> {
        let mut result = Vec::new();
        for id in &self.node(node)?.pins {
            if self.pin(*id)?.direction == direction {
                result.push(*id);
            }
        }
        Ok(result)
    }

    // ---------------------------------------------------------------------
    // Links
    // ---------------------------------------------------------------------

    /// Link two pins. Order does not matter; the output side is worked out
    /// from the pin directions. Linking an already linked pair is a no-op.
    pub fn make_link(&mut self, a: PinId, b: PinId) -> Result<()> {
        let first = self.pin(a)?;
        let second = self.pin(b)?;

        if first.direction == second.direction {
            return Err(ExpansionError::InvalidLink {
                first: a,
                second: b,
                reason: format!("both pins are {:?}", first.direction),
            });
        }
        if first.owner == second.owner {
            return Err(ExpansionError::InvalidLink {
                first: a,
                second: b,
                reason: format!("both pins belong to {}", first.owner),
            });
        }

        let (output, input) = match first.direction {
            PinDirection::Output => (first, second),
            PinDirection::Input => (second, first),
        };
        if !output.pin_type.can_feed(&input.pin_type, &self.hierarchy) {
            return Err(ExpansionError::IncompatibleTypes {
                output: self.describe_pin(output),
                output_type: output.pin_type.to_string(),
                input: self.describe_pin(input),
                input_type: input.pin_type.to_string(),
            });
        }
        if first.linked_to.contains(&b) {
            return Ok(());
        }

        self.pin_mut(a)?.linked_to.push(b);
        self.pin_mut(b)?.linked_to.push(a);
        Ok(())
    }

    pub fn break_link(&mut self, a: PinId, b: PinId) -> Result<()> {
        self.pin_mut(a)?.linked_to.retain(|id| *id != b);
        self.pin_mut(b)?.linked_to.retain(|id| *id != a);
        Ok(())
    }

    pub fn break_pin_links(&mut self, pin: PinId) -> Result<()> {
        let far_ends = std::mem::take(&mut self.pin_mut(pin)?.linked_to);
        for far in far_ends {
            self.pin_mut(far)?.linked_to.retain(|id| *id != pin);
        }
        Ok(())
    }

    pub fn break_all_node_links(&mut self, node: NodeId) -> Result<()> {
        let pins = self.node(node)?.pins.clone();
        for pin in pins {
            self.break_pin_links(pin)?;
        }
        Ok(())
    }

    /// Move every link of `from` onto `to`. The far-end pins stay the same;
    /// only the near end changes. Both pins must share a direction.
    pub fn move_links(&mut self, from: PinId, to: PinId) -> Result<()> {
        if from == to {
            return Ok(());
        }
        let from_pin = self.pin(from)?;
        let to_pin = self.pin(to)?;
        if from_pin.direction != to_pin.direction {
            return Err(ExpansionError::InvalidLink {
                first: from,
                second: to,
                reason: "links can only move between pins of the same direction".to_string(),
            });
        }

        let far_ends = from_pin.linked_to.clone();
        for far in far_ends {
            self.break_link(from, far)?;
            self.make_link(to, far)?;
        }
        Ok(())
    }

    pub fn links(&self, pin: PinId) -> Result<&[PinId]> {
        Ok(&self.pin(pin)?.linked_to)
    }

    pub fn is_linked(&self, pin: PinId) -> Result<bool> {
        Ok(self.pin(pin)?.is_linked())
    }

    /// Total number of links in the graph.
    pub fn link_count(&self) -> usize {
        let ends: usize = self
            .pins
            .iter()
            .flatten()
            .map(|pin| pin.linked_to.len())
            .sum();
        ends / 2
    }

    /// Number of links touching any pin of `node`.
    pub fn node_link_count(&self, node: NodeId) -> Result<usize> {
        let mut count = 0;
        for id in &self.node(node)?.pins {
            count += self.pin(*id)?.linked_to.len();
        }
        Ok(count)
    }

    // ---------------------------------------------------------------------
    // Validation
    // ---------------------------------------------------------------------

    /// Check the structural invariants of the arena: every entry sits at the
    /// index its id names, pins are listed by the node that owns them, links
    /// are symmetric, and every link joins pins of opposite direction on
    /// different nodes.
    pub fn validate(&self) -> Result<()> {
        for (index, node) in self.nodes.iter().enumerate() {
            if node.id.0 != index {
                return Err(ExpansionError::CorruptGraph(format!(
                    "{} is stored at node index {}",
                    node.id, index
                )));
            }
        }
        for (index, pin) in self.pins.iter().enumerate() {
            if let Some(pin) = pin {
                if pin.id.0 != index {
                    return Err(ExpansionError::CorruptGraph(format!(
                        "{} is stored at pin index {}",
                        pin.id, index
                    )));
                }
            }
        }

        for node in &self.nodes {
            for id in &node.pins {
                let pin = self.pin(*id).map_err(|_| {
                    ExpansionError::CorruptGraph(format!("{} lists missing {}", node.id, id))
                })?;
                if pin.owner != node.id {
                    return Err(ExpansionError::CorruptGraph(format!(
                        "{} lists {} owned by {}",
                        node.id, id, pin.owner
                    )));
                }
            }
        }

        for pin in self.pins.iter().flatten() {
            let owner = self.node(pin.owner).map_err(|_| {
                ExpansionError::CorruptGraph(format!("{} owned by unknown {}", pin.id, pin.owner))
            })?;
            if !owner.pins.contains(&pin.id) {
                return Err(ExpansionError::CorruptGraph(format!(
                    "{} is not listed by its owner {}",
                    pin.id, pin.owner
                )));
            }

            for far_id in &pin.linked_to {
                let far = self.pin(*far_id).map_err(|_| {
                    ExpansionError::CorruptGraph(format!("{} links to missing {}", pin.id, far_id))
                })?;
                if !far.linked_to.contains(&pin.id) {
                    return Err(ExpansionError::CorruptGraph(format!(
                        "link {} -> {} is one-sided",
                        pin.id, far_id
                    )));
                }
                if far.direction == pin.direction || far.owner == pin.owner {
                    return Err(ExpansionError::CorruptGraph(format!(
                        "link {} -> {} joins pins of the same direction or node",
                        pin.id, far_id
                    )));
                }
            }
        }
        Ok(())
    }

    fn describe_pin(&self, pin: &Pin) -> String {
        match self.node(pin.owner) {
            Ok(node) => format!("'{}' on {} ({})", pin.name, pin.owner, node.kind.label()),
            Err(_) => format!("'{}' on {}", pin.name, pin.owner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(graph: &mut Graph, pin_type: PinType) -> (NodeId, PinId) {
        let node = graph.create_node(NodeKind::Primitive {
            name: "literal".to_string(),
        });
        let pin = graph
            .create_pin(node, PinDirection::Output, pin_type, "value")
            .unwrap();
        (node, pin)
    }

    fn sink(graph: &mut Graph, pin_type: PinType) -> (NodeId, PinId) {
        let node = graph.create_node(NodeKind::Primitive {
            name: "sink".to_string(),
        });
        let pin = graph
            .create_pin(node, PinDirection::Input, pin_type, "value")
            .unwrap();
        (node, pin)
    }

    #[test]
    fn test_pin_names_unique_per_direction() {
        let mut graph = Graph::new("test");
        let node = graph.create_node(NodeKind::Copy);
        graph
            .create_pin(node, PinDirection::Input, PinType::int(), "x")
            .unwrap();
        graph
            .create_pin(node, PinDirection::Output, PinType::int(), "x")
            .unwrap();
        let err = graph
            .create_pin(node, PinDirection::Input, PinType::int(), "x")
            .unwrap_err();
        assert!(matches!(err, ExpansionError::DuplicatePin { .. }));
    }

    #[test]
    fn test_link_is_symmetric() {
        let mut graph = Graph::new("test");
        let (_, out) = literal(&mut graph, PinType::int());
        let (_, input) = sink(&mut graph, PinType::int());

        graph.make_link(input, out).unwrap();
        graph.make_link(out, input).unwrap();

        assert_eq!(graph.links(out).unwrap(), &[input]);
        assert_eq!(graph.links(input).unwrap(), &[out]);
        assert_eq!(graph.link_count(), 1);
        graph.validate().unwrap();
    }

    #[test]
    fn test_link_rejects_bad_pairs() {
        let mut graph = Graph::new("test");
        let (_, a) = literal(&mut graph, PinType::int());
        let (_, b) = literal(&mut graph, PinType::int());
        let (_, s) = sink(&mut graph, PinType::string());

        let err = graph.make_link(a, b).unwrap_err();
        assert!(matches!(err, ExpansionError::InvalidLink { .. }));
        assert!(err.is_recoverable());

        let err = graph.make_link(a, s).unwrap_err();
        assert!(matches!(err, ExpansionError::IncompatibleTypes { .. }));
        assert!(err.is_recoverable());
        assert_eq!(graph.link_count(), 0);
    }

    #[test]
    fn test_link_rejects_same_node() {
        let mut graph = Graph::new("test");
        let node = graph.create_node(NodeKind::Copy);
        let i = graph
            .create_pin(node, PinDirection::Input, PinType::int(), "Item")
            .unwrap();
        let o = graph
            .create_pin(node, PinDirection::Output, PinType::int(), "ReturnValue")
            .unwrap();
        assert!(graph.make_link(i, o).is_err());
    }

    #[test]
    fn test_move_links_preserves_far_ends() {
        let mut graph = Graph::new("test");
        let (_, from) = literal(&mut graph, PinType::float());
        let (_, to) = literal(&mut graph, PinType::float());
        let (_, s1) = sink(&mut graph, PinType::float());
        let (_, s2) = sink(&mut graph, PinType::float());
        graph.make_link(from, s1).unwrap();
        graph.make_link(from, s2).unwrap();

        graph.move_links(from, to).unwrap();

        assert!(!graph.is_linked(from).unwrap());
        assert_eq!(graph.links(to).unwrap(), &[s1, s2]);
        assert_eq!(graph.links(s1).unwrap(), &[to]);
        assert_eq!(graph.link_count(), 2);
        graph.validate().unwrap();
    }

    #[test]
    fn test_move_links_requires_same_direction() {
        let mut graph = Graph::new("test");
        let (_, out) = literal(&mut graph, PinType::int());
        let (_, input) = sink(&mut graph, PinType::int());
        assert!(graph.move_links(out, input).is_err());
    }

    #[test]
    fn test_break_all_node_links() {
        let mut graph = Graph::new("test");
        let (node, out) = literal(&mut graph, PinType::int());
        let (_, s1) = sink(&mut graph, PinType::int());
        let (_, s2) = sink(&mut graph, PinType::int());
        graph.make_link(out, s1).unwrap();
        graph.make_link(out, s2).unwrap();

        graph.break_all_node_links(node).unwrap();

        assert_eq!(graph.link_count(), 0);
        assert_eq!(graph.node_link_count(node).unwrap(), 0);
        graph.validate().unwrap();
    }

    #[test]
    fn test_remove_pin_tombstones() {
        let mut graph = Graph::new("test");
        let (node, out) = literal(&mut graph, PinType::int());
        let (_, s) = sink(&mut graph, PinType::int());
        graph.make_link(out, s).unwrap();

        graph.remove_pin(out).unwrap();

        assert!(matches!(graph.pin(out), Err(ExpansionError::PinNotFound(_))));
        assert!(graph.node(node).unwrap().pins.is_empty());
        assert!(!graph.is_linked(s).unwrap());
        graph.validate().unwrap();
    }

    #[test]
    fn test_validate_detects_one_sided_link() {
        let mut graph = Graph::new("test");
        let (_, out) = literal(&mut graph, PinType::int());
        let (_, s) = sink(&mut graph, PinType::int());
        graph.pin_mut(out).unwrap().linked_to.push(s);

        assert!(matches!(graph.validate(), Err(ExpansionError::CorruptGraph(_))));
    }

    #[test]
    fn test_json_keeps_links() {
        let mut graph = Graph::new("test").with_parent_class("Rig");
        let (_, out) = literal(&mut graph, PinType::object("ArmRig"));
        let (_, s) = sink(&mut graph, PinType::object("Rig"));
        graph.hierarchy_mut().register("ArmRig", "Rig");
        graph.make_link(out, s).unwrap();

        let restored = Graph::from_json(&graph.to_json().unwrap()).unwrap();

        assert_eq!(restored.parent_class.as_deref(), Some("Rig"));
        assert_eq!(restored.links(out).unwrap(), &[s]);
        assert!(restored.hierarchy().is_child_of("ArmRig", "Rig"));
        restored.validate().unwrap();
    }

    #[test]
    fn test_validate_detects_misplaced_ids() {
        let mut graph = Graph::new("test");
        let (_, out) = literal(&mut graph, PinType::int());
        let (_, s) = sink(&mut graph, PinType::int());
        graph.make_link(out, s).unwrap();

        let mut value: serde_json::Value = serde_json::from_str(&graph.to_json().unwrap()).unwrap();
        value["nodes"][0]["id"] = serde_json::json!(1);
        value["nodes"][1]["id"] = serde_json::json!(0);
        let swapped = Graph::from_json(&value.to_string()).unwrap();
        assert!(matches!(swapped.validate(), Err(ExpansionError::CorruptGraph(_))));

        let mut value: serde_json::Value = serde_json::from_str(&graph.to_json().unwrap()).unwrap();
        value["pins"][0]["id"] = serde_json::json!(7);
        let renumbered = Graph::from_json(&value.to_string()).unwrap();
        assert!(matches!(renumbered.validate(), Err(ExpansionError::CorruptGraph(_))));
    }

    #[test]
    fn test_rollback_restores_checkpoint() {
        let mut graph = Graph::new("test");
        let (producer, out) = literal(&mut graph, PinType::int());
        let (_, s) = sink(&mut graph, PinType::int());
        graph.make_link(out, s).unwrap();
        graph.pin_mut(s).unwrap().default_value = Some("1".to_string());
        let nodes = graph.node_count();

        graph.checkpoint();
        let (_, other) = sink(&mut graph, PinType::int());
        graph.move_links(s, other).unwrap();
        graph.pin_mut(s).unwrap().default_value = Some("2".to_string());
        graph.remove_pin(out).unwrap();
        graph.hierarchy_mut().register("ArmRig", "Rig");
        assert!(graph.rollback());

        assert_eq!(graph.node_count(), nodes);
        assert!(graph.pin(other).is_err());
        assert_eq!(graph.links(out).unwrap(), &[s]);
        assert_eq!(graph.links(s).unwrap(), &[out]);
        assert_eq!(graph.pin(s).unwrap().default_value.as_deref(), Some("1"));
        assert_eq!(graph.node(producer).unwrap().pins, vec![out]);
        assert!(!graph.hierarchy().is_child_of("ArmRig", "Rig"));
        graph.validate().unwrap();

        // Nothing left to undo.
        assert!(!graph.rollback());
    }

    #[test]
    fn test_commit_keeps_changes() {
        let mut graph = Graph::new("test");
        let (_, out) = literal(&mut graph, PinType::int());
        graph.checkpoint();
        let (_, s) = sink(&mut graph, PinType::int());
        graph.make_link(out, s).unwrap();
        graph.commit();

        assert!(!graph.rollback());
        assert_eq!(graph.links(out).unwrap(), &[s]);
    }
}
