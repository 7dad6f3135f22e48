//! # Composite Node Expansion
//!
//! Rewrites composite nodes into primitive subgraphs.
//!
//! - [`fields`] - per-parameter lowering into property reads and writes
//! - [`primitives`] - spawners for the primitive node kinds
//! - [`evaluator`] - expansion of a whole rig evaluator node

pub mod evaluator;
pub mod fields;
pub mod primitives;

pub use evaluator::{ExpansionOutcome, RigEvaluatorExpander, SkipReason, RIG_PIN_NAME};
pub use fields::{FieldDescriptor, FieldKind, PinExpansion};
