#![allow(dead_code)]

use pbx::authoring::{set_field_enabled, spawn_rig_evaluator};
use pbx::{
    FieldDescriptor, Graph, NodeId, NodeKind, PinDirection, PinId, PinType, RigCapabilities,
    RigClass, RigClassRegistry, Schema, RIG_PIN_NAME,
};

pub const CAPABILITIES_JSON: &str = include_str!("../fixtures/rig_capabilities.json");

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// `TestRig` with inputs `a: int`, `b: string` and output `c: bool`.
pub fn test_classes() -> RigClassRegistry {
    let mut classes = RigClassRegistry::new("Rig");
    classes
        .register(
            RigClass::new("TestRig", "Rig")
                .with_field(FieldDescriptor::input("a", PinType::int()))
                .with_field(FieldDescriptor::input("b", PinType::string()))
                .with_field(FieldDescriptor::output("c", PinType::boolean())),
        )
        .unwrap();
    classes
}

pub fn capabilities() -> RigCapabilities {
    RigCapabilities::standard("Rig")
}

/// Evaluator wired into a graph: literals feed its inputs, a sink reads its
/// outputs and two consumers hold the sub-rig.
pub struct Scenario {
    pub graph: Graph,
    pub evaluator: NodeId,
    pub sink: NodeId,
    pub rig_consumers: Vec<PinId>,
}

pub fn literal(graph: &mut Graph, pin_type: PinType) -> PinId {
    let node = graph.create_node(NodeKind::Primitive {
        name: format!("literal {}", pin_type),
    });
    graph
        .create_pin(node, PinDirection::Output, pin_type, "Value")
        .unwrap()
}

pub fn scenario(classes: &RigClassRegistry, disabled_inputs: &[&str]) -> Scenario {
    let mut graph = Graph::new("scenario").with_parent_class("Rig");
    graph.hierarchy_mut().merge(classes.hierarchy());

    let evaluator = spawn_rig_evaluator(&mut graph, classes, Some("TestRig")).unwrap();
    for name in disabled_inputs {
        set_field_enabled(&mut graph, classes, evaluator, name, PinDirection::Input, false).unwrap();
    }
    wire_evaluator(graph, evaluator)
}

/// Feed every input of `evaluator` from a literal and consume every output.
pub fn wire_evaluator(mut graph: Graph, evaluator: NodeId) -> Scenario {
    for pin in graph.pins_of(evaluator, PinDirection::Input).unwrap() {
        let pin_type = graph.pin(pin).unwrap().pin_type.clone();
        let source = literal(&mut graph, pin_type);
        graph.make_link(source, pin).unwrap();
    }

    let sink = graph.create_node(NodeKind::Primitive {
        name: "sink".to_string(),
    });
    let mut rig_consumers = Vec::new();
    for pin in graph.pins_of(evaluator, PinDirection::Output).unwrap() {
        let (name, pin_type) = {
            let pin = graph.pin(pin).unwrap();
            (pin.name.clone(), pin.pin_type.clone())
        };
        if name == RIG_PIN_NAME {
            for (i, consumer_type) in [pin_type, PinType::any_object()].into_iter().enumerate() {
                let consumer = graph
                    .create_pin(sink, PinDirection::Input, consumer_type, &format!("Rig{}", i))
                    .unwrap();
                graph.make_link(pin, consumer).unwrap();
                rig_consumers.push(consumer);
            }
        } else {
            let consumer = graph.create_pin(sink, PinDirection::Input, pin_type, &name).unwrap();
            graph.make_link(pin, consumer).unwrap();
        }
    }

    Scenario {
        graph,
        evaluator,
        sink,
        rig_consumers,
    }
}

/// Nodes spawned for `source` whose kind matches `pred`.
pub fn spawned<F>(graph: &Graph, source: NodeId, pred: F) -> Vec<NodeId>
where
    F: Fn(&NodeKind) -> bool,
{
    graph
        .spawned_by(source)
        .into_iter()
        .filter(|node| pred(&graph.node(*node).unwrap().kind))
        .collect()
}

pub fn calls_to(graph: &Graph, source: NodeId, function: &str) -> Vec<NodeId> {
    spawned(graph, source, |kind| {
        matches!(kind, NodeKind::CallFunction { function: f, .. } if f == function)
    })
}

/// Properties written by the setters reachable from `event`, following the
/// execution chain.
pub fn setter_chain(graph: &Graph, event: NodeId) -> Vec<String> {
    let mut chain = Vec::new();
    let mut exec = graph
        .find_pin_checked(event, Schema::PN_THEN, Some(PinDirection::Output))
        .unwrap();
    loop {
        let links = graph.links(exec).unwrap();
        let Some(next) = links.first() else {
            break;
        };
        let node = graph.pin(*next).unwrap().owner;
        match &graph.node(node).unwrap().kind {
            NodeKind::VariableSet { property, .. } => chain.push(property.clone()),
            NodeKind::AddDelegate { property, .. } => chain.push(property.clone()),
            other => panic!("unexpected node in the input chain: {:?}", other),
        }
        exec = graph
            .find_pin_checked(node, Schema::PN_THEN, Some(PinDirection::Output))
            .unwrap();
    }
    chain
}

/// Allocation index written into an allocate call.
pub fn allocation_index_of(graph: &Graph, call: NodeId) -> u32 {
    let pin = graph
        .find_pin_checked(call, "AllocationIndex", Some(PinDirection::Input))
        .unwrap();
    graph
        .pin(pin)
        .unwrap()
        .default_value
        .as_deref()
        .unwrap()
        .parse()
        .unwrap()
}
