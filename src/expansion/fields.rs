//! # Field Descriptors
//!
//! A field is one parameter a rig class exposes to evaluator nodes. Each
//! field knows how to lower the evaluator pin it backs into primitive
//! property reads and writes on the sub-rig handle.
//!
//! | Kind | Input | Output |
//! |---|---|---|
//! | Scalar | set | get |
//! | Struct | set | get → copy |
//! | Array | copy → set | get → copy |
//! | Delegate | bind | - |
//!
//! Input fields are spliced into the execution chain one after another, so
//! the order fields are expanded in is the order their writes run in.

use super::evaluator::RIG_PIN_NAME;
use super::primitives;
use crate::context::CompilerContext;
use crate::error::{ExpansionError, Result};
use crate::graph::{ContainerType, NodeId, PinCategory, PinDirection, PinId, PinType};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Scalar,
    Struct,
    Array,
    Delegate,
}

impl FieldKind {
    /// Kind implied by a pin type.
    pub fn infer(pin_type: &PinType) -> Self {
        if pin_type.container == ContainerType::Array {
            FieldKind::Array
        } else {
            match pin_type.category {
                PinCategory::Struct => FieldKind::Struct,
                PinCategory::Delegate => FieldKind::Delegate,
                _ => FieldKind::Scalar,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub pin_type: PinType,
    pub direction: PinDirection,
    pub kind: FieldKind,
}

/// Arguments of a single [`FieldDescriptor::expand_pin`] call.
#[derive(Debug, Clone, Copy)]
pub struct PinExpansion<'a> {
    /// Rig class owning the property being read or written.
    pub owner_type: &'a str,
    /// Evaluator node being expanded.
    pub source_node: NodeId,
    /// Evaluator pin backed by this field.
    pub external_pin: PinId,
    /// Sub-rig handle the primitives operate on.
    pub target_pin: PinId,
    /// The external pin is an event output carrying the value itself, rather
    /// than an input fed by upstream links.
    pub is_event_output: bool,
    /// Execution output to continue from. Unused by output fields.
    pub exec_pin: Option<PinId>,
}

impl FieldDescriptor {
    pub fn input(name: impl Into<String>, pin_type: PinType) -> Self {
        Self::new(name, pin_type, PinDirection::Input)
    }

    pub fn output(name: impl Into<String>, pin_type: PinType) -> Self {
        Self::new(name, pin_type, PinDirection::Output)
    }

    fn new(name: impl Into<String>, pin_type: PinType, direction: PinDirection) -> Self {
        let kind = FieldKind::infer(&pin_type);
        Self {
            name: name.into(),
            pin_type,
            direction,
            kind,
        }
    }

    pub fn pin_name(&self) -> &str {
        &self.name
    }

    /// Check that the declared kind agrees with the pin type.
    pub fn validate(&self) -> Result<()> {
        let unsupported = |reason: &str| ExpansionError::UnsupportedField {
            field: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.is_empty() {
            return Err(unsupported("field name is empty"));
        }
        if self.name == RIG_PIN_NAME {
            return Err(unsupported("name is reserved for the evaluator's sub-rig output"));
        }
        if self.pin_type.is_exec() || self.pin_type.category == PinCategory::Wildcard {
            return Err(unsupported("exec and wildcard pins cannot be fields"));
        }
        if FieldKind::infer(&self.pin_type) != self.kind {
            return Err(unsupported(&format!(
                "declared {:?} but the pin type {} implies {:?}",
                self.kind,
                self.pin_type,
                FieldKind::infer(&self.pin_type)
            )));
        }
        if self.kind == FieldKind::Delegate && self.direction == PinDirection::Output {
            return Err(unsupported("delegate fields are input-only"));
        }
        if self.pin_type.is_container() && self.pin_type.container != ContainerType::Array {
            return Err(unsupported("only array containers are supported"));
        }
        Ok(())
    }

    /// Lower one evaluator pin into primitives on the sub-rig handle and
    /// return the execution pin the next field should continue from.
    pub fn expand_pin(
        &self,
        ctx: &mut CompilerContext,
        request: PinExpansion<'_>,
    ) -> Result<Option<PinId>> {
        tracing::debug!(
            "[PBX]   expanding {:?} {:?} field '{}'",
            self.direction,
            self.kind,
            self.name
        );

        match (self.direction, self.kind) {
            (PinDirection::Input, FieldKind::Scalar) | (PinDirection::Input, FieldKind::Struct) => {
                let setter = primitives::spawn_variable_set(ctx, request.source_node, request.owner_type, self)?;
                let value = ctx.graph().find_pin_checked(setter, &self.name, Some(PinDirection::Input))?;
                self.route_value_in(ctx, &request, value)?;
                self.attach_target(ctx, &request, setter)?;
                splice_exec(ctx, request.exec_pin, setter)
            }
            (PinDirection::Input, FieldKind::Array) => {
                let copy = primitives::spawn_copy(ctx, request.source_node, &self.pin_type)?;
                let item = ctx.graph().find_pin_checked(copy, Schema::PN_ITEM, Some(PinDirection::Input))?;
                let copied = ctx.graph().find_pin_checked(copy, Schema::PN_RETURN_VALUE, Some(PinDirection::Output))?;
                self.route_value_in(ctx, &request, item)?;

                let setter = primitives::spawn_variable_set(ctx, request.source_node, request.owner_type, self)?;
                let value = ctx.graph().find_pin_checked(setter, &self.name, Some(PinDirection::Input))?;
                ctx.graph_mut().make_link(copied, value)?;
                self.attach_target(ctx, &request, setter)?;
                splice_exec(ctx, request.exec_pin, setter)
            }
            (PinDirection::Input, FieldKind::Delegate) => {
                let bind = primitives::spawn_add_delegate(ctx, request.source_node, request.owner_type, self)?;
                let delegate = ctx.graph().find_pin_checked(bind, Schema::PN_DELEGATE, Some(PinDirection::Input))?;
                self.route_value_in(ctx, &request, delegate)?;
                self.attach_target(ctx, &request, bind)?;
                splice_exec(ctx, request.exec_pin, bind)
            }
            (PinDirection::Output, FieldKind::Scalar) => {
                let getter = primitives::spawn_variable_get(ctx, request.source_node, request.owner_type, self)?;
                let value = ctx.graph().find_pin_checked(getter, &self.name, Some(PinDirection::Output))?;
                self.attach_target(ctx, &request, getter)?;
                ctx.move_pin_links_to_intermediate(request.external_pin, value)?;
                Ok(request.exec_pin)
            }
            (PinDirection::Output, FieldKind::Struct) | (PinDirection::Output, FieldKind::Array) => {
                let getter = primitives::spawn_variable_get(ctx, request.source_node, request.owner_type, self)?;
                let value = ctx.graph().find_pin_checked(getter, &self.name, Some(PinDirection::Output))?;
                self.attach_target(ctx, &request, getter)?;

                let copy = primitives::spawn_copy(ctx, request.source_node, &self.pin_type)?;
                let item = ctx.graph().find_pin_checked(copy, Schema::PN_ITEM, Some(PinDirection::Input))?;
                let copied = ctx.graph().find_pin_checked(copy, Schema::PN_RETURN_VALUE, Some(PinDirection::Output))?;
                ctx.graph_mut().make_link(value, item)?;
                ctx.move_pin_links_to_intermediate(request.external_pin, copied)?;
                Ok(request.exec_pin)
            }
            (PinDirection::Output, FieldKind::Delegate) => Err(ExpansionError::UnsupportedField {
                field: self.name.clone(),
                reason: "delegate fields are input-only".to_string(),
            }),
        }
    }

    /// Feed the field value into `value_pin`.
    fn route_value_in(
        &self,
        ctx: &mut CompilerContext,
        request: &PinExpansion<'_>,
        value_pin: PinId,
    ) -> Result<()> {
        if request.is_event_output {
            ctx.graph_mut().make_link(request.external_pin, value_pin)
        } else {
            ctx.move_pin_links_to_intermediate(request.external_pin, value_pin)
        }
    }

    fn attach_target(
        &self,
        ctx: &mut CompilerContext,
        request: &PinExpansion<'_>,
        node: NodeId,
    ) -> Result<()> {
        let self_pin = ctx
            .graph()
            .find_pin_checked(node, Schema::PN_SELF, Some(PinDirection::Input))?;
        ctx.graph_mut().make_link(request.target_pin, self_pin)
    }
}

/// Insert `node` into the execution chain right after `exec_pin`. Whatever
/// `exec_pin` used to trigger now runs after `node`.
fn splice_exec(
    ctx: &mut CompilerContext,
    exec_pin: Option<PinId>,
    node: NodeId,
) -> Result<Option<PinId>> {
    let execute = ctx
        .graph()
        .find_pin_checked(node, Schema::PN_EXECUTE, Some(PinDirection::Input))?;
    let then = ctx
        .graph()
        .find_pin_checked(node, Schema::PN_THEN, Some(PinDirection::Output))?;

    if let Some(exec) = exec_pin {
        ctx.graph_mut().move_links(exec, then)?;
        ctx.graph_mut().make_link(exec, execute)?;
    }
    Ok(Some(then))
}
