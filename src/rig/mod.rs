//! # Rig Runtime Collaborator
//!
//! What the expansion pass needs to know about the rig runtime it lowers
//! evaluator nodes onto: the operations it can call ([`capabilities`]) and the
//! rig classes users can evaluate ([`classes`]).

pub mod capabilities;
pub mod classes;

pub use capabilities::{FunctionParam, FunctionSignature, RigCapabilities, RigCapabilityTable};
pub use classes::{RigClass, RigClassRegistry};
