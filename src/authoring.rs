//! # Evaluator Authoring
//!
//! Editor-side operations on rig evaluator nodes. Pins are always derived
//! from the bound rig class and the node's disabled sets, so every change of
//! configuration goes through [`reconstruct_node`], which re-creates the pins
//! and restores whatever links still fit.

use crate::error::{ExpansionError, Result};
use crate::expansion::RIG_PIN_NAME;
use crate::graph::{EvaluatorSettings, Graph, NodeId, NodeKind, PinDirection, PinId, PinType};
use crate::rig::RigClassRegistry;
use crate::schema::Schema;

/// Add a rig evaluator bound to `rig_type` and give it its pins.
pub fn spawn_rig_evaluator(
    graph: &mut Graph,
    classes: &RigClassRegistry,
    rig_type: Option<&str>,
) -> Result<NodeId> {
    let settings = EvaluatorSettings {
        rig_type: rig_type.map(str::to_string),
        ..Default::default()
    };
    let node = graph.create_node(NodeKind::RigEvaluator(settings));
    allocate_default_pins(graph, classes, node)?;
    Ok(node)
}

/// Create the pins of an evaluator: one input per enabled input field with
/// its schema default, the `Rig` output when the type resolves, then one
/// output per enabled output field.
pub fn allocate_default_pins(graph: &mut Graph, classes: &RigClassRegistry, node: NodeId) -> Result<()> {
    let settings = settings_of(graph, node)?.clone();
    let Some(rig_type) = settings
        .rig_type
        .as_deref()
        .filter(|name| classes.get(name).is_some())
    else {
        return Ok(());
    };

    let schema = Schema::new();
    for field in classes.enabled_fields(rig_type, PinDirection::Input, &settings.disabled_inputs) {
        let pin = graph.create_pin(node, PinDirection::Input, field.pin_type.clone(), &field.name)?;
        schema.set_pin_autogenerated_default_value(graph.pin_mut(pin)?);
    }

    graph.create_pin(node, PinDirection::Output, PinType::object(rig_type), RIG_PIN_NAME)?;

    for field in classes.enabled_fields(rig_type, PinDirection::Output, &settings.disabled_outputs) {
        graph.create_pin(node, PinDirection::Output, field.pin_type.clone(), &field.name)?;
    }
    Ok(())
}

/// Snapshot of a pin taken before reconstruction.
struct OldPin {
    name: String,
    direction: PinDirection,
    pin_type: PinType,
    default_value: Option<String>,
    linked_to: Vec<PinId>,
}

/// Drop and re-create every pin of `node`. Links and literals are restored
/// onto the new pin with the same name and direction; links whose types no
/// longer agree are dropped. Returns how many links were dropped.
pub fn reconstruct_node(graph: &mut Graph, classes: &RigClassRegistry, node: NodeId) -> Result<usize> {
    let mut old_pins = Vec::new();
    for id in graph.node(node)?.pins.clone() {
        let pin = graph.pin(id)?;
        old_pins.push(OldPin {
            name: pin.name.clone(),
            direction: pin.direction,
            pin_type: pin.pin_type.clone(),
            default_value: pin.default_value.clone(),
            linked_to: pin.linked_to.clone(),
        });
        graph.remove_pin(id)?;
    }

    allocate_default_pins(graph, classes, node)?;

    let mut dropped = 0;
    for old in old_pins {
        let Some(new_pin) = graph.find_pin(node, &old.name, Some(old.direction))? else {
            dropped += old.linked_to.len();
            continue;
        };

        if old.direction == PinDirection::Input && graph.pin(new_pin)?.pin_type == old.pin_type {
            if let Some(value) = old.default_value {
                graph.pin_mut(new_pin)?.default_value = Some(value);
            }
        }

        for far in old.linked_to {
            match graph.make_link(new_pin, far) {
                Ok(()) => {}
                Err(err) if err.is_recoverable() => {
                    tracing::debug!("[PBX] {} dropped link on '{}': {}", node, old.name, err);
                    dropped += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    if dropped > 0 {
        tracing::debug!("[PBX] Reconstructed {} ({} links dropped)", node, dropped);
    }
    Ok(dropped)
}

/// Bind `node` to another rig class. The disabled sets only make sense for
/// the old class and are cleared.
pub fn set_rig_type(
    graph: &mut Graph,
    classes: &RigClassRegistry,
    node: NodeId,
    rig_type: Option<&str>,
) -> Result<usize> {
    let settings = settings_of_mut(graph, node)?;
    settings.rig_type = rig_type.map(str::to_string);
    settings.disabled_inputs.clear();
    settings.disabled_outputs.clear();
    reconstruct_node(graph, classes, node)
}

/// Show or hide the pin of one field.
pub fn set_field_enabled(
    graph: &mut Graph,
    classes: &RigClassRegistry,
    node: NodeId,
    field: &str,
    direction: PinDirection,
    enabled: bool,
) -> Result<usize> {
    let settings = settings_of_mut(graph, node)?;
    let disabled = match direction {
        PinDirection::Input => &mut settings.disabled_inputs,
        PinDirection::Output => &mut settings.disabled_outputs,
    };
    let changed = if enabled {
        disabled.remove(field)
    } else {
        disabled.insert(field.to_string())
    };
    if !changed {
        return Ok(0);
    }
    reconstruct_node(graph, classes, node)
}

/// Evaluators may only be placed in graphs of Blueprints deriving from the
/// rig base class.
pub fn is_compatible_with_graph(graph: &Graph, classes: &RigClassRegistry) -> bool {
    let Some(parent) = graph.parent_class.as_deref() else {
        return false;
    };
    let base = classes.base_class();
    parent == base
        || classes.hierarchy().is_child_of(parent, base)
        || graph.hierarchy().is_child_of(parent, base)
}

fn settings_of(graph: &Graph, node: NodeId) -> Result<&EvaluatorSettings> {
    graph
        .node(node)?
        .evaluator_settings()
        .ok_or(ExpansionError::NotComposite(node))
}

fn settings_of_mut(graph: &mut Graph, node: NodeId) -> Result<&mut EvaluatorSettings> {
    graph
        .node_mut(node)?
        .evaluator_settings_mut()
        .ok_or(ExpansionError::NotComposite(node))
}
