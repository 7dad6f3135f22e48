//! # Pulsar Blueprint eXpander (PBX)
//!
//! Expansion pass for Pulsar Blueprint graphs: rewrites composite rig
//! evaluator nodes into the primitive nodes the Blueprint back end knows how
//! to generate code for.
//!
//! A rig evaluator is lowered into:
//! - an allocation of a sub-rig at a pass-unique index
//! - a pre-evaluation event that writes the connected inputs into the sub-rig
//! - an evaluate call, bound to the event when there is one
//! - property reads for the connected outputs
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pbx::{authoring, compile_graph, CompileOptions, FieldDescriptor, Graph, PinType};
//! use pbx::{RigCapabilities, RigClass, RigClassRegistry};
//!
//! let mut classes = RigClassRegistry::new("Rig");
//! classes.register(
//!     RigClass::new("ArmRig", "Rig")
//!         .with_field(FieldDescriptor::input("Reach", PinType::float()))
//!         .with_field(FieldDescriptor::output("Done", PinType::boolean())),
//! )?;
//! let capabilities = RigCapabilities::standard("Rig");
//!
//! let mut graph = Graph::new("my_blueprint");
//! authoring::spawn_rig_evaluator(&mut graph, &classes, Some("ArmRig"))?;
//! // ... connect the evaluator's pins
//!
//! let compiled = compile_graph(graph, &classes, &capabilities, &CompileOptions::default())?;
//! for diagnostic in compiled.log.iter() {
//!     eprintln!("{}", diagnostic);
//! }
//! # Ok::<(), pbx::ExpansionError>(())
//! ```
//!
//! ## Architecture
//!
//! The pass runs in four phases:
//!
//! 1. **Validation** - Check the structural invariants of the input graph
//! 2. **Context Setup** - Merge the rig class hierarchy, reserve event names
//! 3. **Expansion** - Expand each rig evaluator, rolling back nodes with bad links
//! 4. **Validation** - Check the rewritten graph

pub mod allocation;
pub mod authoring;
pub mod compiler;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod expansion;
pub mod graph;
pub mod rig;
pub mod schema;

// Re-export the main compilation API
pub use compiler::{compile_graph, compile_graph_json, CompileOptions, CompiledGraph, ExpansionStats};

pub use context::CompilerContext;
pub use diagnostics::{Diagnostic, MessageLog, Severity};
pub use error::{ExpansionError, Result};
pub use expansion::{
    ExpansionOutcome, FieldDescriptor, FieldKind, RigEvaluatorExpander, SkipReason, RIG_PIN_NAME,
};
pub use graph::{
    ClassHierarchy, ContainerType, EvaluatorSettings, Graph, Node, NodeId, NodeKind, Pin,
    PinCategory, PinDirection, PinId, PinType,
};
pub use rig::{FunctionParam, FunctionSignature, RigCapabilities, RigCapabilityTable, RigClass, RigClassRegistry};
pub use schema::Schema;
