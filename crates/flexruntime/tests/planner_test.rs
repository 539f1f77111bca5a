// crates/flexruntime/tests/planner_test.rs

use flexcore::{ExecutionPlan, FlowNode, PlanError, WorkflowDefinition};
use flexruntime::build_plan;

fn request(id: &str) -> FlowNode {
    FlowNode::new(id, "HTTP_REQUEST").with_input("Url", "https://api.example.com/items")
}

fn read_property(id: &str) -> FlowNode {
    FlowNode::new(id, "READ_PROPERTY_FROM_JSON").with_input("Property name", "items")
}

fn deliver(id: &str) -> FlowNode {
    FlowNode::new(id, "DELIVER_VIA_WEBHOOK").with_input("Target URL", "https://hooks.example.com")
}

fn layers(plan: &ExecutionPlan) -> Vec<Vec<String>> {
    plan.phases
        .iter()
        .map(|p| p.nodes.iter().map(|n| n.node.id.clone()).collect())
        .collect()
}

/// Every edge must point from a strictly earlier phase to a later one.
fn assert_layering(definition: &WorkflowDefinition, plan: &ExecutionPlan) {
    assert_eq!(plan.node_count(), definition.nodes.len());
    for edge in &definition.edges {
        let from = plan.phase_of(&edge.source).unwrap();
        let to = plan.phase_of(&edge.target).unwrap();
        assert!(from < to, "{} (phase {}) -> {} (phase {})", edge.source, from, edge.target, to);
    }
    for (i, phase) in plan.phases.iter().enumerate() {
        assert_eq!(phase.phase as usize, i + 1);
    }
}

#[test]
fn chain_gets_one_phase_per_node() {
    let mut definition = WorkflowDefinition::new();
    definition.add_node(request("a"));
    definition.add_node(read_property("b"));
    definition.add_node(deliver("c"));
    definition.connect("a", "Response body", "b", "JSON");
    definition.connect("b", "Property value", "c", "Body");

    let plan = build_plan(&definition).unwrap();
    assert_eq!(layers(&plan), vec![vec!["a"], vec!["b"], vec!["c"]]);
    assert_layering(&definition, &plan);
}

#[test]
fn independent_siblings_share_a_phase() {
    let mut definition = WorkflowDefinition::new();
    definition.add_node(request("a"));
    definition.add_node(read_property("b"));
    definition.add_node(read_property("c"));
    definition.connect("a", "Response body", "b", "JSON");
    definition.connect("a", "Response body", "c", "JSON");

    let plan = build_plan(&definition).unwrap();
    assert_eq!(layers(&plan), vec![vec!["a"], vec!["b", "c"]]);
}

#[test]
fn phase_order_is_stable_by_node_order() {
    let mut definition = WorkflowDefinition::new();
    definition.add_node(read_property("z"));
    definition.add_node(request("a"));
    definition.add_node(read_property("m"));
    definition.connect("a", "Response body", "m", "JSON");
    definition.connect("a", "Response body", "z", "JSON");

    let plan = build_plan(&definition).unwrap();
    assert_eq!(layers(&plan), vec![vec!["a"], vec!["z", "m"]]);
}

#[test]
fn diamond_waits_for_the_longest_branch() {
    let mut definition = WorkflowDefinition::new();
    definition.add_node(request("a"));
    definition.add_node(read_property("short"));
    definition.add_node(read_property("long1"));
    definition.add_node(
        FlowNode::new("long2", "ADD_PROPERTY_TO_JSON")
            .with_input("JSON", "{}")
            .with_input("Property name", "k"),
    );
    definition.add_node(
        FlowNode::new("join", "ADD_PROPERTY_TO_JSON").with_input("Property name", "k"),
    );
    definition.connect("a", "Response body", "short", "JSON");
    definition.connect("a", "Response body", "long1", "JSON");
    definition.connect("long1", "Property value", "long2", "Property value");
    definition.connect("short", "Property value", "join", "JSON");
    definition.connect("long2", "Updated JSON", "join", "Property value");

    let plan = build_plan(&definition).unwrap();
    assert_eq!(plan.phase_of("join"), Some(4));
    assert_layering(&definition, &plan);
}

#[test]
fn mutual_dependency_is_a_cycle() {
    let mut definition = WorkflowDefinition::new();
    definition.add_node(request("a"));
    definition.add_node(
        FlowNode::new("b", "ADD_PROPERTY_TO_JSON").with_input("Property name", "k"),
    );
    definition.add_node(
        FlowNode::new("c", "ADD_PROPERTY_TO_JSON").with_input("Property name", "k"),
    );
    definition.connect("a", "Response body", "b", "Property value");
    definition.connect("c", "Updated JSON", "b", "JSON");
    definition.connect("b", "Updated JSON", "c", "JSON");
    definition.connect("a", "Response body", "c", "Property value");

    assert!(matches!(
        build_plan(&definition),
        Err(PlanError::CyclicDependency { .. })
    ));
}

#[test]
fn cycle_wins_over_other_problems() {
    // No entry point and an unset input, but the cycle is reported.
    let mut definition = WorkflowDefinition::new();
    definition.add_node(FlowNode::new("b", "ADD_PROPERTY_TO_JSON"));
    definition.add_node(FlowNode::new("c", "ADD_PROPERTY_TO_JSON"));
    definition.connect("c", "Updated JSON", "b", "JSON");
    definition.connect("b", "Updated JSON", "c", "JSON");

    assert!(matches!(
        build_plan(&definition),
        Err(PlanError::CyclicDependency { .. })
    ));
}

#[test]
fn self_loop_is_a_cycle() {
    let mut definition = WorkflowDefinition::new();
    definition.add_node(request("a"));
    definition.add_node(
        FlowNode::new("b", "ADD_PROPERTY_TO_JSON")
            .with_input("Property name", "k")
            .with_input("Property value", "v"),
    );
    definition.connect("b", "Updated JSON", "b", "JSON");

    assert!(matches!(
        build_plan(&definition),
        Err(PlanError::CyclicDependency { node }) if node == "b"
    ));
}

#[test]
fn unset_query_is_a_missing_input() {
    let mut definition = WorkflowDefinition::new();
    definition.add_node(
        FlowNode::new("db", "DATABASE_QUERY").with_input("Credentials", "warehouse"),
    );

    assert_eq!(
        build_plan(&definition),
        Err(PlanError::MissingRequiredInput {
            node: "db".to_string(),
            input: "Query".to_string(),
        })
    );
}

#[test]
fn blank_literal_counts_as_missing() {
    let mut definition = WorkflowDefinition::new();
    definition.add_node(
        FlowNode::new("db", "DATABASE_QUERY")
            .with_input("Credentials", "warehouse")
            .with_input("Query", "   "),
    );

    assert!(matches!(
        build_plan(&definition),
        Err(PlanError::MissingRequiredInput { input, .. }) if input == "Query"
    ));
}

#[test]
fn graph_without_entry_task_is_rejected() {
    let mut definition = WorkflowDefinition::new();
    definition.add_node(
        read_property("b").with_input("JSON", r#"{"items": []}"#),
    );
    assert_eq!(build_plan(&definition), Err(PlanError::NoEntryPoint));
    assert_eq!(build_plan(&WorkflowDefinition::new()), Err(PlanError::NoEntryPoint));
}

#[test]
fn unknown_task_type_is_rejected() {
    let mut definition = WorkflowDefinition::new();
    definition.add_node(request("a"));
    definition.add_node(FlowNode::new("x", "SEND_FAX"));

    assert_eq!(
        build_plan(&definition),
        Err(PlanError::UnknownTaskType {
            node: "x".to_string(),
            task_type: "SEND_FAX".to_string(),
        })
    );
}

#[test]
fn dangling_edge_is_rejected() {
    let mut definition = WorkflowDefinition::new();
    definition.add_node(request("a"));
    definition.connect("a", "Response body", "ghost", "JSON");

    assert_eq!(
        build_plan(&definition),
        Err(PlanError::NodeNotFound("ghost".to_string()))
    );
}

#[test]
fn duplicate_node_ids_are_rejected() {
    let mut definition = WorkflowDefinition::new();
    definition.add_node(request("a"));
    definition.add_node(request("a"));

    assert_eq!(
        build_plan(&definition),
        Err(PlanError::DuplicateNode("a".to_string()))
    );
}

#[test]
fn plan_survives_serialization() {
    let mut definition = WorkflowDefinition::new();
    definition.add_node(request("a"));
    definition.add_node(read_property("b"));
    definition.connect("a", "Response body", "b", "JSON");

    let plan = build_plan(&definition).unwrap();
    let stored = serde_json::to_string(&plan).unwrap();
    let restored: ExecutionPlan = serde_json::from_str(&stored).unwrap();
    assert_eq!(restored, plan);
}
