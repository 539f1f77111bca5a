//! Turns an editor graph into an ordered execution plan.
//!
//! Every node lands in the phase right after the latest phase among the
//! nodes feeding it. Validation runs before layering and stops at the first
//! problem: structure, then cycles, then entry points, then required inputs.

use flexcore::{
    ExecutionPlan, ParamType, PlanError, PlanPhase, PlannedNode, TaskType, WorkflowDefinition,
    PLAN_VERSION,
};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeMap, HashMap, HashSet};

pub fn build_plan(definition: &WorkflowDefinition) -> Result<ExecutionPlan, PlanError> {
    if definition.nodes.is_empty() {
        return Err(PlanError::NoEntryPoint);
    }

    let task_types = resolve_task_types(definition)?;
    let (graph, fed_inputs) = build_graph(definition, &task_types)?;

    let order = toposort(&graph, None).map_err(|cycle| PlanError::CyclicDependency {
        node: definition.nodes[graph[cycle.node_id()]].id.clone(),
    })?;

    if !task_types.iter().any(|t| t.definition().is_entry_point) {
        return Err(PlanError::NoEntryPoint);
    }

    check_required_inputs(definition, &task_types, &fed_inputs)?;

    // Topological order guarantees every predecessor already has its phase.
    let mut phase_of = vec![0u32; definition.nodes.len()];
    for idx in order {
        let phase = graph
            .neighbors_directed(idx, Direction::Incoming)
            .map(|dep| phase_of[graph[dep]])
            .max()
            .unwrap_or(0)
            + 1;
        phase_of[graph[idx]] = phase;
    }

    let mut grouped: BTreeMap<u32, Vec<PlannedNode>> = BTreeMap::new();
    for (i, node) in definition.nodes.iter().enumerate() {
        grouped.entry(phase_of[i]).or_default().push(PlannedNode {
            task_type: task_types[i],
            node: node.clone(),
        });
    }

    let phases: Vec<PlanPhase> = grouped
        .into_iter()
        .map(|(phase, nodes)| PlanPhase { phase, nodes })
        .collect();

    tracing::debug!(
        "Built plan with {} phases for {} nodes",
        phases.len(),
        definition.nodes.len()
    );

    Ok(ExecutionPlan {
        version: PLAN_VERSION,
        phases,
        edges: definition.edges.clone(),
    })
}

fn resolve_task_types(definition: &WorkflowDefinition) -> Result<Vec<TaskType>, PlanError> {
    let mut seen = HashSet::new();
    definition
        .nodes
        .iter()
        .map(|node| {
            if !seen.insert(node.id.as_str()) {
                return Err(PlanError::DuplicateNode(node.id.clone()));
            }
            node.task_type
                .parse::<TaskType>()
                .map_err(|task_type| PlanError::UnknownTaskType {
                    node: node.id.clone(),
                    task_type,
                })
        })
        .collect()
}

/// Dependency graph over node positions, plus the `(node, input)` pairs
/// that an edge feeds.
fn build_graph(
    definition: &WorkflowDefinition,
    task_types: &[TaskType],
) -> Result<(DiGraph<usize, ()>, HashSet<(usize, String)>), PlanError> {
    let mut graph = DiGraph::new();
    let mut node_to_index: HashMap<&str, (usize, NodeIndex)> = HashMap::new();

    for (i, node) in definition.nodes.iter().enumerate() {
        let idx = graph.add_node(i);
        node_to_index.insert(node.id.as_str(), (i, idx));
    }

    let mut fed_inputs = HashSet::new();
    for edge in &definition.edges {
        let (source, source_idx) = *node_to_index
            .get(edge.source.as_str())
            .ok_or_else(|| PlanError::NodeNotFound(edge.source.clone()))?;
        let (target, target_idx) = *node_to_index
            .get(edge.target.as_str())
            .ok_or_else(|| PlanError::NodeNotFound(edge.target.clone()))?;

        let source_def = task_types[source].definition();
        let target_def = task_types[target].definition();
        let output = source_def.output(&edge.source_handle).ok_or_else(|| {
            PlanError::InvalidConnection(format!(
                "{} has no output '{}'",
                edge.source, edge.source_handle
            ))
        })?;
        let input = target_def.input(&edge.target_handle).ok_or_else(|| {
            PlanError::InvalidConnection(format!(
                "{} has no input '{}'",
                edge.target, edge.target_handle
            ))
        })?;
        if !compatible(output.param_type, input.param_type) {
            return Err(PlanError::InvalidConnection(format!(
                "{}.{} ({:?}) cannot feed {}.{} ({:?})",
                edge.source,
                edge.source_handle,
                output.param_type,
                edge.target,
                edge.target_handle,
                input.param_type
            )));
        }
        if !fed_inputs.insert((target, edge.target_handle.clone())) {
            return Err(PlanError::InvalidConnection(format!(
                "input '{}' of {} is connected more than once",
                edge.target_handle, edge.target
            )));
        }

        graph.add_edge(source_idx, target_idx, ());
    }

    Ok((graph, fed_inputs))
}

/// Plain data types convert freely; resource-like types only connect to
/// their own kind.
fn compatible(output: ParamType, input: ParamType) -> bool {
    let opaque = |t: ParamType| matches!(t, ParamType::BrowserInstance | ParamType::Credential);
    output == input || !(opaque(output) || opaque(input))
}

fn check_required_inputs(
    definition: &WorkflowDefinition,
    task_types: &[TaskType],
    fed_inputs: &HashSet<(usize, String)>,
) -> Result<(), PlanError> {
    for (i, node) in definition.nodes.iter().enumerate() {
        for input in task_types[i].definition().inputs {
            if !input.required || fed_inputs.contains(&(i, input.name.to_string())) {
                continue;
            }
            let has_literal = input.param_type != ParamType::BrowserInstance
                && node
                    .inputs
                    .get(input.name)
                    .map(|v| !v.is_unset())
                    .unwrap_or(false);
            if !has_literal {
                return Err(PlanError::MissingRequiredInput {
                    node: node.id.clone(),
                    input: input.name.to_string(),
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flexcore::FlowNode;

    fn browse_and_extract() -> WorkflowDefinition {
        let mut definition = WorkflowDefinition::new();
        definition.add_node(
            FlowNode::new("launch", "LAUNCH_BROWSER")
                .with_input("Website Url", "https://example.com"),
        );
        definition.add_node(FlowNode::new("html", "PAGE_TO_HTML"));
        definition.add_node(
            FlowNode::new("text", "EXTRACT_TEXT_FROM_ELEMENT").with_input("Selector", "h1"),
        );
        definition.connect("launch", "Web page", "html", "Web page");
        definition.connect("html", "Html", "text", "Html");
        definition
    }

    #[test]
    fn layers_a_chain() {
        let plan = build_plan(&browse_and_extract()).unwrap();
        let layers: Vec<Vec<&String>> = plan.phases.iter().map(|p| p.node_ids()).collect();
        assert_eq!(layers, vec![vec!["launch"], vec!["html"], vec!["text"]]);
        assert_eq!(plan.version, PLAN_VERSION);
        assert_eq!(plan.credits(), 5 + 2 + 2);
    }

    #[test]
    fn rejects_type_mismatched_connection() {
        let mut definition = browse_and_extract();
        definition.connect("launch", "Web page", "text", "Selector");
        assert!(matches!(
            build_plan(&definition),
            Err(PlanError::InvalidConnection(_))
        ));
    }

    #[test]
    fn rejects_doubly_fed_input() {
        let mut definition = browse_and_extract();
        definition.add_node(
            FlowNode::new("launch2", "LAUNCH_BROWSER")
                .with_input("Website Url", "https://example.org"),
        );
        definition.connect("launch2", "Web page", "html", "Web page");
        assert!(matches!(
            build_plan(&definition),
            Err(PlanError::InvalidConnection(msg)) if msg.contains("more than once")
        ));
    }

    #[test]
    fn browser_inputs_cannot_be_typed_in() {
        let mut definition = WorkflowDefinition::new();
        definition.add_node(
            FlowNode::new("launch", "LAUNCH_BROWSER")
                .with_input("Website Url", "https://example.com"),
        );
        definition.add_node(
            FlowNode::new("html", "PAGE_TO_HTML").with_input("Web page", "browser-1"),
        );
        assert_eq!(
            build_plan(&definition),
            Err(PlanError::MissingRequiredInput {
                node: "html".to_string(),
                input: "Web page".to_string(),
            })
        );
    }
}
