use crate::{ExecutionPlan, ExecutionStatus, Value};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type WorkflowId = Uuid;
/// Node ids are assigned by the visual editor and only unique per graph.
pub type NodeId = String;

/// Raw graph as saved by the editor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub nodes: Vec<FlowNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl WorkflowDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: FlowNode) -> NodeId {
        let id = node.id.clone();
        self.nodes.push(node);
        id
    }

    pub fn connect(
        &mut self,
        source: impl Into<NodeId>,
        source_handle: impl Into<String>,
        target: impl Into<NodeId>,
        target_handle: impl Into<String>,
    ) {
        let edge = Edge {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            source_handle: source_handle.into(),
            target: target.into(),
            target_handle: target_handle.into(),
        };
        self.edges.push(edge);
    }

    pub fn find_node(&self, id: &str) -> Option<&FlowNode> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

/// Graph vertex; `task_type` stays a string until the planner resolves it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowNode {
    pub id: NodeId,
    pub task_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: HashMap<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl FlowNode {
    pub fn new(id: impl Into<NodeId>, task_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            task_type: task_type.into(),
            name: None,
            inputs: HashMap::new(),
            position: None,
        }
    }

    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }
}

/// Data dependency: `target.target_handle` is fed by `source.source_handle`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: NodeId,
    pub source_handle: String,
    pub target: NodeId,
    pub target_handle: String,
}

/// Node position in visual editor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowStatus {
    Draft,
    Published,
}

/// Stored workflow document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: WorkflowId,
    pub user_id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: WorkflowStatus,
    pub definition: WorkflowDefinition,
    /// Present only while published; reused by every triggered run.
    pub execution_plan: Option<ExecutionPlan>,
    pub credits_cost: Option<u32>,
    pub cron: Option<String>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub last_run_id: Option<Uuid>,
    pub last_run_status: Option<ExecutionStatus>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(
        user_id: impl Into<String>,
        name: impl Into<String>,
        definition: WorkflowDefinition,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            name: name.into(),
            description: None,
            status: WorkflowStatus::Draft,
            definition,
            execution_plan: None,
            credits_cost: None,
            cron: None,
            next_run_at: None,
            last_run_id: None,
            last_run_status: None,
            last_run_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == WorkflowStatus::Published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_editor_graph() {
        let raw = json!({
            "nodes": [
                {"id": "n1", "taskType": "LAUNCH_BROWSER",
                 "inputs": {"Website Url": {"type": "String", "value": "https://example.com"}}},
                {"id": "n2", "taskType": "PAGE_TO_HTML"}
            ],
            "edges": [
                {"id": "e1", "source": "n1", "sourceHandle": "Web page",
                 "target": "n2", "targetHandle": "Web page"}
            ]
        });
        let definition: WorkflowDefinition = serde_json::from_value(raw).unwrap();
        assert_eq!(definition.nodes.len(), 2);
        assert_eq!(definition.edges[0].target_handle, "Web page");
        assert_eq!(
            definition.find_node("n1").unwrap().inputs.get("Website Url"),
            Some(&Value::from("https://example.com"))
        );
        assert!(definition.find_node("n2").unwrap().inputs.is_empty());
    }
}
