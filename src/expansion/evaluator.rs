//! # Rig Evaluator Expansion
//!
//! Lowers a rig evaluator node into primitives:
//!
//! ```text
//! GetOrAllocateSubRig(index, T) -> cast<T> ──────────────┬─> Target
//! RigPreEvaluateEventN: then -> set a -> set b          │
//!                       OutputDelegate ─────────────────┴─> PreEvaluate
//!                                      EvaluateRigWithInputs -> cast<T> -> get c
//! ```
//!
//! Consumers of the evaluator's `Rig` output end up on the allocated handle,
//! and the evaluator itself is left with no links.

use super::fields::{FieldDescriptor, PinExpansion};
use super::primitives;
use crate::context::CompilerContext;
use crate::error::{ExpansionError, Result};
use crate::graph::{NodeId, PinDirection, PinId};
use crate::rig::capabilities::{PARAM_ALLOCATION_INDEX, PARAM_PRE_EVALUATE, PARAM_RIG_CLASS, PARAM_TARGET};
use crate::rig::{RigCapabilities, RigClassRegistry};
use crate::schema::Schema;
use std::collections::BTreeSet;

/// Object output of an evaluator node carrying the evaluated sub-rig.
pub const RIG_PIN_NAME: &str = "Rig";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotFullCompile,
    NotComposite,
    AlreadyExpanded,
    UnresolvedRigType,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpansionOutcome {
    Expanded {
        /// Index of the sub-rig allocated for this node.
        allocation_index: u32,
        /// Event gathering inputs, absent when no input was connected.
        pre_evaluate_event: Option<NodeId>,
    },
    Skipped(SkipReason),
}

/// Handle produced by the allocate call and its cast.
struct SubRigHandle {
    index: u32,
    pin: PinId,
}

/// Output of the input phase.
struct GatheredInputs {
    handle: SubRigHandle,
    event: NodeId,
    delegate_pin: PinId,
}

pub struct RigEvaluatorExpander<'a> {
    classes: &'a RigClassRegistry,
    capabilities: &'a RigCapabilities,
}

impl<'a> RigEvaluatorExpander<'a> {
    /// Both collaborators must describe the same rig base class, otherwise
    /// no sub-rig handle could feed the runtime functions.
    pub fn new(classes: &'a RigClassRegistry, capabilities: &'a RigCapabilities) -> Result<Self> {
        if classes.base_class() != capabilities.base_class() {
            return Err(ExpansionError::BaseClassMismatch {
                classes: classes.base_class().to_string(),
                capabilities: capabilities.base_class().to_string(),
            });
        }
        Ok(Self {
            classes,
            capabilities,
        })
    }

    /// Expand one evaluator node. On error the graph may be half rewritten;
    /// callers that want to continue must roll back to their own checkpoint.
    pub fn expand_node(&self, ctx: &mut CompilerContext, node: NodeId) -> Result<ExpansionOutcome> {
        if !ctx.is_full_compile() {
            return Ok(ExpansionOutcome::Skipped(SkipReason::NotFullCompile));
        }

        let settings = match ctx.graph().node(node)?.evaluator_settings() {
            Some(settings) => settings.clone(),
            None => return Ok(ExpansionOutcome::Skipped(SkipReason::NotComposite)),
        };
        if settings.inert {
            return Ok(ExpansionOutcome::Skipped(SkipReason::AlreadyExpanded));
        }

        let rig_type = match settings.rig_type.as_deref() {
            Some(name) if self.classes.get(name).is_some() => name.to_string(),
            other => {
                tracing::debug!(
                    "[PBX]   {} has no resolvable rig type ({:?}), leaving it unexpanded",
                    node,
                    other
                );
                return Ok(ExpansionOutcome::Skipped(SkipReason::UnresolvedRigType));
            }
        };

        tracing::debug!("[PBX]   expanding {} as {}", node, rig_type);

        let gathered = self.expand_inputs(ctx, node, &rig_type, &settings.disabled_inputs)?;
        let pre_evaluate_event = gathered.as_ref().map(|g| g.event);
        let allocation_index =
            self.expand_outputs(ctx, node, &rig_type, &settings.disabled_outputs, gathered)?;

        ctx.graph_mut().break_all_node_links(node)?;
        if let Some(settings) = ctx.graph_mut().node_mut(node)?.evaluator_settings_mut() {
            settings.inert = true;
        }

        Ok(ExpansionOutcome::Expanded {
            allocation_index,
            pre_evaluate_event,
        })
    }

    fn expand_inputs(
        &self,
        ctx: &mut CompilerContext,
        node: NodeId,
        rig_type: &str,
        disabled: &BTreeSet<String>,
    ) -> Result<Option<GatheredInputs>> {
        let params = self.parameter_pins(ctx, node, rig_type, PinDirection::Input, disabled)?;
        if params.is_empty() {
            return Ok(None);
        }

        let handle = self.create_allocate_sub_rig_node(ctx, node, rig_type)?;

        let event = primitives::spawn_event(
            ctx,
            node,
            self.capabilities.pre_evaluate_signature(),
            &format!("RigPreEvaluateEvent{}", handle.index),
        )?;
        let mut exec_path = Some(
            ctx.graph()
                .find_pin_checked(event, Schema::PN_THEN, Some(PinDirection::Output))?,
        );

        for (pin, field) in params {
            exec_path = field.expand_pin(
                ctx,
                PinExpansion {
                    owner_type: rig_type,
                    source_node: node,
                    external_pin: pin,
                    target_pin: handle.pin,
                    is_event_output: false,
                    exec_pin: exec_path,
                },
            )?;
        }

        let delegate_pin = ctx.graph().find_pin_checked(
            event,
            Schema::PN_DELEGATE_OUTPUT,
            Some(PinDirection::Output),
        )?;

        Ok(Some(GatheredInputs {
            handle,
            event,
            delegate_pin,
        }))
    }

    /// Spawn the allocate call for a fresh index and cast its result to
    /// `rig_type`.
    fn create_allocate_sub_rig_node(
        &self,
        ctx: &mut CompilerContext,
        node: NodeId,
        rig_type: &str,
    ) -> Result<SubRigHandle> {
        let call = primitives::spawn_call_function(ctx, node, self.capabilities.allocate(), true)?;

        let index = ctx.new_allocation_index()?;
        let index_pin = ctx.graph().find_pin_checked(call, PARAM_ALLOCATION_INDEX, Some(PinDirection::Input))?;
        ctx.graph_mut().pin_mut(index_pin)?.default_value = Some(index.to_string());

        let class_pin = ctx.graph().find_pin_checked(call, PARAM_RIG_CLASS, Some(PinDirection::Input))?;
        ctx.graph_mut().pin_mut(class_pin)?.default_object = Some(rig_type.to_string());

        let allocated = ctx
            .graph()
            .find_pin_checked(call, Schema::PN_RETURN_VALUE, Some(PinDirection::Output))?;
        let pin = self.cast_to_rig_type(ctx, node, rig_type, allocated)?;

        tracing::debug!("[PBX]   {} allocated sub-rig index {}", node, index);
        Ok(SubRigHandle { index, pin })
    }

    fn cast_to_rig_type(
        &self,
        ctx: &mut CompilerContext,
        node: NodeId,
        rig_type: &str,
        object: PinId,
    ) -> Result<PinId> {
        let cast = primitives::spawn_dynamic_cast(ctx, node, rig_type, true)?;
        let source = primitives::cast_source_pin(ctx, cast)?;
        ctx.graph_mut().make_link(object, source)?;
        primitives::cast_result_pin(ctx, cast)
    }

    /// Returns the allocation index of the handle the outputs read from.
    fn expand_outputs(
        &self,
        ctx: &mut CompilerContext,
        node: NodeId,
        rig_type: &str,
        disabled: &BTreeSet<String>,
        gathered: Option<GatheredInputs>,
    ) -> Result<u32> {
        let (handle, delegate_pin) = match gathered {
            Some(g) => (g.handle, Some(g.delegate_pin)),
            None => (self.create_allocate_sub_rig_node(ctx, node, rig_type)?, None),
        };

        let rig_pin = ctx
            .graph()
            .find_pin_checked(node, RIG_PIN_NAME, Some(PinDirection::Output))?;
        ctx.move_pin_links_to_intermediate(rig_pin, handle.pin)?;

        // The runtime has no unbound delegates, so the plain variant is used
        // when nothing gathers inputs.
        let signature = match delegate_pin {
            Some(_) => self.capabilities.evaluate_with_inputs(),
            None => self.capabilities.evaluate(),
        };
        let call = primitives::spawn_call_function(ctx, node, signature, true)?;

        if let Some(delegate_pin) = delegate_pin {
            let param = ctx.graph().find_pin_checked(call, PARAM_PRE_EVALUATE, Some(PinDirection::Input))?;
            ctx.graph_mut().make_link(delegate_pin, param)?;
        }
        let target = ctx.graph().find_pin_checked(call, PARAM_TARGET, Some(PinDirection::Input))?;
        ctx.graph_mut().make_link(handle.pin, target)?;

        let evaluated = ctx
            .graph()
            .find_pin_checked(call, Schema::PN_RETURN_VALUE, Some(PinDirection::Output))?;
        let result = self.cast_to_rig_type(ctx, node, rig_type, evaluated)?;

        let params = self.parameter_pins(ctx, node, rig_type, PinDirection::Output, disabled)?;
        for (pin, field) in params {
            field.expand_pin(
                ctx,
                PinExpansion {
                    owner_type: rig_type,
                    source_node: node,
                    external_pin: pin,
                    target_pin: result,
                    is_event_output: false,
                    exec_pin: None,
                },
            )?;
        }

        Ok(handle.index)
    }

    /// Linked, enabled pins of `node` in `direction` paired with the field
    /// backing each, in pin order.
    fn parameter_pins(
        &self,
        ctx: &mut CompilerContext,
        node: NodeId,
        rig_type: &str,
        direction: PinDirection,
        disabled: &BTreeSet<String>,
    ) -> Result<Vec<(PinId, &'a FieldDescriptor)>> {
        let mut params = Vec::new();
        for pin_id in ctx.graph().pins_of(node, direction)? {
            let pin = ctx.graph().pin(pin_id)?;
            let is_rig_pin = direction == PinDirection::Output && pin.name == RIG_PIN_NAME;
            if is_rig_pin || disabled.contains(&pin.name) || !pin.is_linked() {
                continue;
            }

            match self.classes.find_field(rig_type, &pin.name, direction) {
                Some(field) => params.push((pin_id, field)),
                None => {
                    let message = format!(
                        "pin '{}' does not match any {:?} field of {}",
                        pin.name, direction, rig_type
                    );
                    tracing::warn!("[PBX]   {}: {}", node, message);
                    ctx.log_mut().warning(Some(node), message);
                }
            }
        }
        Ok(params)
    }
}

impl ExpansionOutcome {
    pub fn is_expanded(&self) -> bool {
        matches!(self, ExpansionOutcome::Expanded { .. })
    }
}

impl From<SkipReason> for ExpansionOutcome {
    fn from(reason: SkipReason) -> Self {
        ExpansionOutcome::Skipped(reason)
    }
}
