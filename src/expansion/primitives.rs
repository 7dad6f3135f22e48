//! # Primitive Node Spawners
//!
//! Each function spawns one intermediate node on behalf of the composite
//! node being expanded and gives it the pins its kind always has.

use super::fields::FieldDescriptor;
use crate::context::CompilerContext;
use crate::error::{ExpansionError, Result};
use crate::graph::{NodeId, NodeKind, PinDirection, PinId, PinType};
use crate::rig::FunctionSignature;
use crate::schema::Schema;

fn add_pin(
    ctx: &mut CompilerContext,
    node: NodeId,
    direction: PinDirection,
    pin_type: PinType,
    name: &str,
) -> Result<PinId> {
    let pin = ctx.graph_mut().create_pin(node, direction, pin_type, name)?;
    let schema = *ctx.schema();
    schema.set_pin_autogenerated_default_value(ctx.graph_mut().pin_mut(pin)?);
    Ok(pin)
}

fn add_exec_pins(ctx: &mut CompilerContext, node: NodeId) -> Result<()> {
    add_pin(ctx, node, PinDirection::Input, PinType::exec(), Schema::PN_EXECUTE)?;
    add_pin(ctx, node, PinDirection::Output, PinType::exec(), Schema::PN_THEN)?;
    Ok(())
}

/// Call to a rig runtime function. Pure calls have no execution pins.
pub fn spawn_call_function(
    ctx: &mut CompilerContext,
    source: NodeId,
    signature: &FunctionSignature,
    is_pure: bool,
) -> Result<NodeId> {
    let node = ctx.spawn_intermediate_node(
        NodeKind::CallFunction {
            function: signature.name.clone(),
            is_pure,
        },
        source,
    )?;

    if !is_pure {
        add_exec_pins(ctx, node)?;
    }
    for param in &signature.params {
        add_pin(ctx, node, PinDirection::Input, param.pin_type.clone(), &param.name)?;
    }
    if let Some(return_type) = &signature.return_type {
        add_pin(ctx, node, PinDirection::Output, return_type.clone(), Schema::PN_RETURN_VALUE)?;
    }
    Ok(node)
}

/// Cast of any object to `target_type`. A pure cast reports failure through
/// its `Success` output instead of a `CastFailed` execution branch.
pub fn spawn_dynamic_cast(
    ctx: &mut CompilerContext,
    source: NodeId,
    target_type: &str,
    is_pure: bool,
) -> Result<NodeId> {
    let node = ctx.spawn_intermediate_node(
        NodeKind::DynamicCast {
            target_type: target_type.to_string(),
            is_pure,
        },
        source,
    )?;

    if is_pure {
        add_pin(ctx, node, PinDirection::Input, PinType::any_object(), Schema::PN_CAST_SOURCE)?;
        let result_name = ctx.schema().cast_result_pin_name(target_type);
        add_pin(ctx, node, PinDirection::Output, PinType::object(target_type), &result_name)?;
        add_pin(ctx, node, PinDirection::Output, PinType::boolean(), Schema::PN_CAST_SUCCESS)?;
    } else {
        add_exec_pins(ctx, node)?;
        add_pin(ctx, node, PinDirection::Output, PinType::exec(), Schema::PN_CAST_FAILED)?;
        add_pin(ctx, node, PinDirection::Input, PinType::any_object(), Schema::PN_CAST_SOURCE)?;
        let result_name = ctx.schema().cast_result_pin_name(target_type);
        add_pin(ctx, node, PinDirection::Output, PinType::object(target_type), &result_name)?;
    }
    Ok(node)
}

pub fn cast_source_pin(ctx: &CompilerContext, cast: NodeId) -> Result<PinId> {
    ctx.graph()
        .find_pin_checked(cast, Schema::PN_CAST_SOURCE, Some(PinDirection::Input))
}

pub fn cast_result_pin(ctx: &CompilerContext, cast: NodeId) -> Result<PinId> {
    let target = match &ctx.graph().node(cast)?.kind {
        NodeKind::DynamicCast { target_type, .. } => target_type.clone(),
        other => {
            return Err(ExpansionError::UnexpectedNodeKind {
                node: cast,
                expected: "a dynamic cast".to_string(),
                found: other.label(),
            })
        }
    };
    let name = ctx.schema().cast_result_pin_name(&target);
    ctx.graph()
        .find_pin_checked(cast, &name, Some(PinDirection::Output))
}

/// Event fired through `delegate_signature`. Its delegate output is what gets
/// handed to the function that will invoke it.
pub fn spawn_event(
    ctx: &mut CompilerContext,
    source: NodeId,
    delegate_signature: &str,
    base_name: &str,
) -> Result<NodeId> {
    let node = ctx.spawn_intermediate_event_node(delegate_signature, base_name, source)?;
    add_pin(ctx, node, PinDirection::Output, PinType::exec(), Schema::PN_THEN)?;
    add_pin(
        ctx,
        node,
        PinDirection::Output,
        PinType::delegate(delegate_signature),
        Schema::PN_DELEGATE_OUTPUT,
    )?;
    Ok(node)
}

pub fn spawn_variable_set(
    ctx: &mut CompilerContext,
    source: NodeId,
    owner: &str,
    field: &FieldDescriptor,
) -> Result<NodeId> {
    let node = ctx.spawn_intermediate_node(
        NodeKind::VariableSet {
            owner: owner.to_string(),
            property: field.name.clone(),
        },
        source,
    )?;
    add_exec_pins(ctx, node)?;
    add_pin(ctx, node, PinDirection::Input, PinType::object(owner), Schema::PN_SELF)?;
    add_pin(ctx, node, PinDirection::Input, field.pin_type.clone(), &field.name)?;
    Ok(node)
}

pub fn spawn_variable_get(
    ctx: &mut CompilerContext,
    source: NodeId,
    owner: &str,
    field: &FieldDescriptor,
) -> Result<NodeId> {
    let node = ctx.spawn_intermediate_node(
        NodeKind::VariableGet {
            owner: owner.to_string(),
            property: field.name.clone(),
        },
        source,
    )?;
    add_pin(ctx, node, PinDirection::Input, PinType::object(owner), Schema::PN_SELF)?;
    add_pin(ctx, node, PinDirection::Output, field.pin_type.clone(), &field.name)?;
    Ok(node)
}

/// Value copy of `pin_type`, so the sub-rig and the caller never share a
/// struct or array.
pub fn spawn_copy(ctx: &mut CompilerContext, source: NodeId, pin_type: &PinType) -> Result<NodeId> {
    let node = ctx.spawn_intermediate_node(NodeKind::Copy, source)?;
    add_pin(ctx, node, PinDirection::Input, pin_type.clone(), Schema::PN_ITEM)?;
    add_pin(ctx, node, PinDirection::Output, pin_type.clone(), Schema::PN_RETURN_VALUE)?;
    Ok(node)
}

pub fn spawn_add_delegate(
    ctx: &mut CompilerContext,
    source: NodeId,
    owner: &str,
    field: &FieldDescriptor,
) -> Result<NodeId> {
    let node = ctx.spawn_intermediate_node(
        NodeKind::AddDelegate {
            owner: owner.to_string(),
            property: field.name.clone(),
        },
        source,
    )?;
    add_exec_pins(ctx, node)?;
    add_pin(ctx, node, PinDirection::Input, PinType::object(owner), Schema::PN_SELF)?;
    add_pin(ctx, node, PinDirection::Input, field.pin_type.clone(), Schema::PN_DELEGATE)?;
    Ok(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::CompileOptions;
    use crate::graph::Graph;
    use crate::rig::{capabilities, RigCapabilities, RigClassRegistry};

    fn context() -> (CompilerContext, NodeId) {
        let mut graph = Graph::new("primitives");
        let host = graph.create_node(NodeKind::Primitive {
            name: "host".to_string(),
        });
        let ctx = CompilerContext::new(graph, &RigClassRegistry::new("Rig"), &CompileOptions::default());
        (ctx, host)
    }

    fn pin_names(ctx: &CompilerContext, node: NodeId) -> Vec<String> {
        ctx.graph()
            .node(node)
            .unwrap()
            .pins
            .iter()
            .map(|p| ctx.graph().pin(*p).unwrap().name.clone())
            .collect()
    }

    #[test]
    fn test_pure_call_has_no_exec_pins() {
        let (mut ctx, host) = context();
        let caps = RigCapabilities::standard("Rig");
        let node = spawn_call_function(&mut ctx, host, caps.allocate(), true).unwrap();

        assert_eq!(
            pin_names(&ctx, node),
            vec![
                capabilities::PARAM_ALLOCATION_INDEX,
                capabilities::PARAM_RIG_CLASS,
                Schema::PN_RETURN_VALUE
            ]
        );
        let index = ctx
            .graph()
            .find_pin_checked(node, capabilities::PARAM_ALLOCATION_INDEX, None)
            .unwrap();
        assert_eq!(ctx.graph().pin(index).unwrap().default_value.as_deref(), Some("0"));
    }

    #[test]
    fn test_impure_call_has_exec_pins() {
        let (mut ctx, host) = context();
        let caps = RigCapabilities::standard("Rig");
        let node = spawn_call_function(&mut ctx, host, caps.evaluate(), false).unwrap();
        let names = pin_names(&ctx, node);
        assert_eq!(&names[..2], &[Schema::PN_EXECUTE, Schema::PN_THEN]);
    }

    #[test]
    fn test_cast_pins() {
        let (mut ctx, host) = context();
        let pure = spawn_dynamic_cast(&mut ctx, host, "ArmRig", true).unwrap();
        assert_eq!(pin_names(&ctx, pure), vec!["Object", "AsArmRig", "Success"]);
        let result = cast_result_pin(&ctx, pure).unwrap();
        assert_eq!(ctx.graph().pin(result).unwrap().pin_type, PinType::object("ArmRig"));
        cast_source_pin(&ctx, pure).unwrap();

        let impure = spawn_dynamic_cast(&mut ctx, host, "ArmRig", false).unwrap();
        assert!(pin_names(&ctx, impure).contains(&Schema::PN_CAST_FAILED.to_string()));
    }

    #[test]
    fn test_cast_result_of_other_node_kind() {
        let (ctx, host) = context();
        let err = cast_result_pin(&ctx, host).unwrap_err();
        assert!(matches!(
            err,
            ExpansionError::UnexpectedNodeKind { node, .. } if node == host
        ));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_event_pins() {
        let (mut ctx, host) = context();
        let event = spawn_event(&mut ctx, host, "Sig", "Gather").unwrap();
        assert_eq!(pin_names(&ctx, event), vec![Schema::PN_THEN, Schema::PN_DELEGATE_OUTPUT]);
        assert!(matches!(
            ctx.graph().node(event).unwrap().kind,
            NodeKind::Event { ref function_name, .. } if function_name == "Gather"
        ));
    }
}
