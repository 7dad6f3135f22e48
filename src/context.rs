//! # Compiler Context
//!
//! Mutable state of one compile pass: the graph being rewritten, the
//! allocation index registry, the message log and the set of function names
//! already taken by spawned events. Expansion code receives it as `&mut` and
//! never touches the graph any other way.

use crate::allocation::AllocationIndexRegistry;
use crate::compiler::CompileOptions;
use crate::diagnostics::MessageLog;
use crate::error::Result;
use crate::graph::{Graph, NodeId, NodeKind, PinDirection, PinId};
use crate::rig::RigClassRegistry;
use crate::schema::Schema;
use std::collections::HashSet;

pub struct CompilerContext {
    graph: Graph,
    schema: Schema,
    allocations: AllocationIndexRegistry,
    log: MessageLog,
    full_compile: bool,
    function_names: HashSet<String>,
    intermediate_nodes: usize,
    checkpoint_intermediates: usize,
}

impl CompilerContext {
    /// Start a pass over `graph`. The rig class hierarchy is merged into the
    /// graph so object pins of rig subclasses can feed base-class inputs.
    pub fn new(mut graph: Graph, classes: &RigClassRegistry, options: &CompileOptions) -> Self {
        graph.hierarchy_mut().merge(classes.hierarchy());

        let function_names = graph
            .nodes()
            .filter_map(|node| match &node.kind {
                NodeKind::Event { function_name, .. } => Some(function_name.clone()),
                _ => None,
            })
            .collect();

        Self {
            graph,
            schema: Schema::new(),
            allocations: AllocationIndexRegistry::starting_at(options.allocation_base),
            log: MessageLog::new(),
            full_compile: options.full_compile,
            function_names,
            intermediate_nodes: 0,
            checkpoint_intermediates: 0,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn log(&self) -> &MessageLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut MessageLog {
        &mut self.log
    }

    pub fn is_full_compile(&self) -> bool {
        self.full_compile
    }

    /// Next sub-rig allocation index for this pass.
    pub fn new_allocation_index(&mut self) -> Result<u32> {
        self.allocations.next_index()
    }

    pub fn allocations_issued(&self) -> usize {
        self.allocations.issued()
    }

    pub fn intermediate_nodes(&self) -> usize {
        self.intermediate_nodes
    }

    /// Create a primitive node on behalf of `source`. The caller allocates
    /// its pins.
    pub fn spawn_intermediate_node(&mut self, kind: NodeKind, source: NodeId) -> Result<NodeId> {
        self.graph.node(source)?;
        let label = kind.label();
        let node = self.graph.create_node(kind);
        self.graph.node_mut(node)?.spawned_by = Some(source);
        self.intermediate_nodes += 1;
        tracing::debug!("[PBX]   spawned {} ({}) for {}", node, label, source);
        Ok(node)
    }

    /// Create an event node bound to `delegate_signature`, named after
    /// `base_name` (made unique within the pass).
    pub fn spawn_intermediate_event_node(
        &mut self,
        delegate_signature: &str,
        base_name: &str,
        source: NodeId,
    ) -> Result<NodeId> {
        let function_name = self.find_unique_function_name(base_name);
        self.spawn_intermediate_node(
            NodeKind::Event {
                delegate_signature: delegate_signature.to_string(),
                function_name,
            },
            source,
        )
    }

    /// Reserve `base`, or `base_N` with the smallest free `N`.
    pub fn find_unique_function_name(&mut self, base: &str) -> String {
        let mut candidate = base.to_string();
        let mut suffix = 0;
        while self.function_names.contains(&candidate) {
            suffix += 1;
            candidate = format!("{}_{}", base, suffix);
        }
        self.function_names.insert(candidate.clone());
        candidate
    }

    /// Move every link of `from` onto the intermediate pin `to`. Inputs also
    /// hand over their default literals, so an unlinked value still reaches
    /// the primitive.
    pub fn move_pin_links_to_intermediate(&mut self, from: PinId, to: PinId) -> Result<()> {
        self.graph.move_links(from, to)?;

        let source = self.graph.pin(from)?;
        if source.direction == PinDirection::Input {
            let default_value = source.default_value.clone();
            let default_object = source.default_object.clone();
            let target = self.graph.pin_mut(to)?;
            if default_value.is_some() {
                target.default_value = default_value;
            }
            if default_object.is_some() {
                target.default_object = default_object;
            }
        }
        Ok(())
    }

    /// Mark the state a failing expansion is rolled back to.
    pub fn checkpoint(&mut self) {
        self.graph.checkpoint();
        self.checkpoint_intermediates = self.intermediate_nodes;
    }

    pub fn commit(&mut self) {
        self.graph.commit();
    }

    /// Undo the graph changes made since the last checkpoint. Allocation
    /// indices and function names handed out since then stay consumed.
    pub fn rollback(&mut self) {
        if self.graph.rollback() {
            self.intermediate_nodes = self.checkpoint_intermediates;
        }
    }

    pub fn into_parts(self) -> (Graph, MessageLog) {
        (self.graph, self.log)
    }
}
