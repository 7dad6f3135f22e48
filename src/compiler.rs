//! # Blueprint Expansion Pass
//!
//! Main entry points for lowering the composite nodes of a Blueprint graph
//! into primitive nodes.

use crate::context::CompilerContext;
use crate::diagnostics::MessageLog;
use crate::error::{ExpansionError, Result};
use crate::expansion::{ExpansionOutcome, RigEvaluatorExpander};
use crate::graph::{Graph, NodeId};
use crate::rig::{RigCapabilities, RigClassRegistry};
use serde::{Deserialize, Serialize};

/// Settings of one compile pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompileOptions {
    /// Skeleton compiles only need signatures and leave composites alone.
    pub full_compile: bool,
    /// First sub-rig allocation index handed out by the pass.
    pub allocation_base: u32,
    /// Check the structural invariants of the graph before and after the pass.
    pub validate_graph: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            full_compile: true,
            allocation_base: 0,
            validate_graph: true,
        }
    }
}

impl CompileOptions {
    /// Parse options from JSON. Missing keys take their default.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Counters collected over one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionStats {
    /// Rig evaluator nodes found in the graph.
    pub composite_nodes: usize,
    pub expanded: usize,
    /// Nodes left alone: unresolved rig type, already expanded, or a
    /// skeleton compile.
    pub skipped: usize,
    /// Nodes rolled back after a recoverable error.
    pub failed: usize,
    /// Allocation indices consumed, including those of failed nodes.
    pub allocations: usize,
    /// Intermediate nodes present in the expanded graph.
    pub intermediate_nodes: usize,
}

/// Result of a compile pass that ran to completion.
#[derive(Debug, Clone)]
pub struct CompiledGraph {
    pub graph: Graph,
    pub log: MessageLog,
    pub stats: ExpansionStats,
}

impl CompiledGraph {
    /// A pass with error diagnostics still produces a graph, but it must not
    /// be handed to code generation.
    pub fn is_success(&self) -> bool {
        self.stats.failed == 0 && !self.log.has_errors()
    }
}

/// Expand every rig evaluator in a Blueprint graph
///
/// This is the main entry point of the pass. Composite nodes are expanded one
/// at a time in node order. A node whose expansion hits incompatible or
/// invalid links is rolled back and reported in the message log; any other
/// failure aborts the whole pass.
///
/// # Arguments
///
/// * `graph` - The Blueprint graph to expand
/// * `classes` - Rig classes evaluator nodes may be bound to
/// * `capabilities` - Rig runtime functions the expansion calls
/// * `options` - Pass settings
///
/// # Returns
///
/// * `Ok(CompiledGraph)` - The rewritten graph with its log and counters
/// * `Err(ExpansionError)` - A corrupt graph, rig classes and capabilities
///   built for different base classes, or an aborted expansion
///
/// # Examples
///
/// ```rust,no_run
/// use pbx::{compile_graph, CompileOptions, Graph, RigCapabilities, RigClassRegistry};
///
/// let classes = RigClassRegistry::new("Rig");
/// let capabilities = RigCapabilities::standard("Rig");
/// let graph = Graph::new("my_blueprint");
///
/// match compile_graph(graph, &classes, &capabilities, &CompileOptions::default()) {
///     Ok(compiled) => println!("{} nodes expanded", compiled.stats.expanded),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn compile_graph(
    graph: Graph,
    classes: &RigClassRegistry,
    capabilities: &RigCapabilities,
    options: &CompileOptions,
) -> Result<CompiledGraph> {
    tracing::info!("[PBX] Starting expansion pass");
    tracing::info!(
        "[PBX] Graph: {} ({} nodes, {} links)",
        graph.name,
        graph.node_count(),
        graph.link_count()
    );

    // Phase 1: Validate input
    if options.validate_graph {
        tracing::info!("[PBX] Phase 1: Validating graph...");
        graph.validate()?;
    }

    // Phase 2: Prepare context
    tracing::info!("[PBX] Phase 2: Preparing compiler context...");
    let expander = RigEvaluatorExpander::new(classes, capabilities)?;
    let mut ctx = CompilerContext::new(graph, classes, options);
    let composites: Vec<NodeId> = ctx
        .graph()
        .nodes()
        .filter(|node| node.kind.is_composite())
        .map(|node| node.id)
        .collect();
    tracing::info!(
        "[PBX]   - {} rig evaluator nodes, {} rig classes",
        composites.len(),
        classes.classes().count()
    );

    let mut stats = ExpansionStats {
        composite_nodes: composites.len(),
        ..Default::default()
    };

    // Phase 3: Expand composite nodes
    tracing::info!("[PBX] Phase 3: Expanding composite nodes...");
    for node in composites {
        ctx.checkpoint();
        match expander.expand_node(&mut ctx, node) {
            Ok(ExpansionOutcome::Expanded { allocation_index, .. }) => {
                tracing::debug!("[PBX]   {} expanded (sub-rig {})", node, allocation_index);
                ctx.commit();
                stats.expanded += 1;
            }
            Ok(ExpansionOutcome::Skipped(reason)) => {
                tracing::debug!("[PBX]   {} skipped ({:?})", node, reason);
                ctx.commit();
                stats.skipped += 1;
            }
            Err(err) if err.is_recoverable() => {
                tracing::warn!("[PBX]   {} rolled back: {}", node, err);
                ctx.rollback();
                ctx.log_mut().error(Some(node), err.to_string());
                stats.failed += 1;
            }
            Err(err) => {
                tracing::error!("[PBX] Expansion of {} failed: {}", node, err);
                ctx.log_mut().error(Some(node), err.to_string());
                return Err(ExpansionError::Aborted {
                    node,
                    source: Box::new(err),
                });
            }
        }
    }

    stats.allocations = ctx.allocations_issued();
    stats.intermediate_nodes = ctx.intermediate_nodes();
    let (graph, log) = ctx.into_parts();

    // Phase 4: Validate output
    if options.validate_graph {
        tracing::info!("[PBX] Phase 4: Validating expanded graph...");
        graph.validate()?;
    }

    tracing::info!(
        "[PBX] Expansion complete: {} expanded, {} skipped, {} failed, {} intermediate nodes",
        stats.expanded,
        stats.skipped,
        stats.failed,
        stats.intermediate_nodes
    );
    if stats.failed > 0 {
        tracing::warn!("[PBX] {} errors reported", log.error_count());
    }

    Ok(CompiledGraph { graph, log, stats })
}

/// Expand a graph stored as JSON
///
/// Convenience wrapper around [`compile_graph`] for graphs saved by the
/// editor.
pub fn compile_graph_json(
    json: &str,
    classes: &RigClassRegistry,
    capabilities: &RigCapabilities,
    options: &CompileOptions,
) -> Result<CompiledGraph> {
    let graph = Graph::from_json(json)?;
    compile_graph(graph, classes, capabilities, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authoring::spawn_rig_evaluator;
    use crate::expansion::FieldDescriptor;
    use crate::graph::{NodeKind, PinDirection, PinType};
    use crate::rig::RigClass;

    fn classes() -> RigClassRegistry {
        let mut classes = RigClassRegistry::new("Rig");
        classes
            .register(
                RigClass::new("ArmRig", "Rig")
                    .with_field(FieldDescriptor::input("Reach", PinType::float()))
                    .with_field(FieldDescriptor::output("Done", PinType::boolean())),
            )
            .unwrap();
        classes
    }

    #[test]
    fn test_options_from_json() {
        let options = CompileOptions::from_json(r#"{ "allocation_base": 4 }"#).unwrap();
        assert_eq!(options.allocation_base, 4);
        assert!(options.full_compile);
        assert!(options.validate_graph);

        assert!(matches!(
            CompileOptions::from_json("{ nope").unwrap_err(),
            ExpansionError::Json(_)
        ));
    }

    #[test]
    fn test_empty_graph() {
        let compiled = compile_graph(
            Graph::new("empty"),
            &classes(),
            &RigCapabilities::standard("Rig"),
            &CompileOptions::default(),
        )
        .unwrap();
        assert_eq!(compiled.stats, ExpansionStats::default());
        assert!(compiled.is_success());
    }

    #[test]
    fn test_stats_count_each_outcome() {
        let classes = classes();
        let mut graph = Graph::new("stats");
        spawn_rig_evaluator(&mut graph, &classes, Some("ArmRig")).unwrap();
        spawn_rig_evaluator(&mut graph, &classes, None).unwrap();

        let compiled = compile_graph(
            graph,
            &classes,
            &RigCapabilities::standard("Rig"),
            &CompileOptions {
                allocation_base: 3,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(compiled.stats.composite_nodes, 2);
        assert_eq!(compiled.stats.expanded, 1);
        assert_eq!(compiled.stats.skipped, 1);
        assert_eq!(compiled.stats.allocations, 1);
        // allocate + cast + evaluate + cast
        assert_eq!(compiled.stats.intermediate_nodes, 4);
    }

    #[test]
    fn test_skeleton_compile_leaves_graph_alone() {
        let classes = classes();
        let mut graph = Graph::new("skeleton");
        spawn_rig_evaluator(&mut graph, &classes, Some("ArmRig")).unwrap();
        let nodes = graph.node_count();

        let compiled = compile_graph(
            graph,
            &classes,
            &RigCapabilities::standard("Rig"),
            &CompileOptions {
                full_compile: false,
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(compiled.graph.node_count(), nodes);
        assert_eq!(compiled.stats.skipped, 1);
    }

    #[test]
    fn test_fatal_error_aborts() {
        let classes = classes();
        let mut graph = Graph::new("broken");
        let node = graph.create_node(NodeKind::RigEvaluator(
            crate::graph::EvaluatorSettings::new("ArmRig"),
        ));
        graph
            .create_pin(node, PinDirection::Input, PinType::float(), "Reach")
            .unwrap();

        let err = compile_graph(
            graph,
            &classes,
            &RigCapabilities::standard("Rig"),
            &CompileOptions::default(),
        )
        .unwrap_err();

        match err {
            ExpansionError::Aborted { node: failed, source } => {
                assert_eq!(failed, node);
                assert!(matches!(*source, ExpansionError::MissingPin { .. }));
            }
            other => panic!("expected abort, got {:?}", other),
        }
    }

    #[test]
    fn test_base_class_mismatch_fails_before_expansion() {
        let classes = classes();
        let mut graph = Graph::new("mismatch");
        spawn_rig_evaluator(&mut graph, &classes, Some("ArmRig")).unwrap();

        let err = compile_graph(
            graph,
            &classes,
            &RigCapabilities::standard("ControlRig"),
            &CompileOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, ExpansionError::BaseClassMismatch { .. }));
    }

    #[test]
    fn test_exhausted_allocation_indices_abort() {
        let classes = classes();
        let mut graph = Graph::new("exhausted");
        spawn_rig_evaluator(&mut graph, &classes, Some("ArmRig")).unwrap();
        let second = spawn_rig_evaluator(&mut graph, &classes, Some("ArmRig")).unwrap();

        let err = compile_graph(
            graph,
            &classes,
            &RigCapabilities::standard("Rig"),
            &CompileOptions {
                allocation_base: u32::MAX,
                ..Default::default()
            },
        )
        .unwrap_err();

        match err {
            ExpansionError::Aborted { node, source } => {
                assert_eq!(node, second);
                assert!(matches!(*source, ExpansionError::AllocationExhausted { .. }));
            }
            other => panic!("expected abort, got {:?}", other),
        }
    }
}
