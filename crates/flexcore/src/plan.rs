use crate::{Edge, FlowNode, NodeId, TaskType};
use serde::{Deserialize, Serialize};

/// Schema version written into every plan.
pub const PLAN_VERSION: u32 = 1;

/// Ordered phase layering of a validated graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub version: u32,
    pub phases: Vec<PlanPhase>,
    /// Kept so the orchestrator can route outputs to inputs at run time.
    pub edges: Vec<Edge>,
}

impl ExecutionPlan {
    pub fn node_count(&self) -> usize {
        self.phases.iter().map(|p| p.nodes.len()).sum()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (u32, &PlannedNode)> {
        self.phases
            .iter()
            .flat_map(|p| p.nodes.iter().map(move |n| (p.phase, n)))
    }

    pub fn phase_of(&self, node_id: &str) -> Option<u32> {
        self.nodes()
            .find(|(_, n)| n.node.id == node_id)
            .map(|(phase, _)| phase)
    }

    pub fn credits(&self) -> u32 {
        self.nodes()
            .map(|(_, n)| n.task_type.definition().credits)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanPhase {
    pub phase: u32,
    pub nodes: Vec<PlannedNode>,
}

impl PlanPhase {
    pub fn node_ids(&self) -> Vec<&NodeId> {
        self.nodes.iter().map(|n| &n.node.id).collect()
    }
}

/// A graph node whose task type has been resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedNode {
    pub task_type: TaskType,
    pub node: FlowNode,
}

impl PlannedNode {
    pub fn display_name(&self) -> String {
        self.node
            .name
            .clone()
            .unwrap_or_else(|| self.task_type.definition().label.to_string())
    }
}
