//! On-disk graph format for the CLI.
//!
//! Node inputs are written as plain JSON (`"Url": "https://..."`) rather
//! than the tagged form used on the wire, so files stay hand-editable.

use flexcore::{Edge, FlowNode, Position, Value, WorkflowDefinition};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphFile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    pub task_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub inputs: HashMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
}

impl GraphFile {
    pub fn into_definition(self) -> WorkflowDefinition {
        let nodes = self
            .nodes
            .into_iter()
            .map(|node| FlowNode {
                id: node.id,
                task_type: node.task_type,
                name: node.name,
                inputs: node
                    .inputs
                    .into_iter()
                    .map(|(k, v)| (k, Value::from_plain_json(v)))
                    .collect(),
                position: node.position,
            })
            .collect();

        WorkflowDefinition {
            nodes,
            edges: self.edges,
        }
    }

    /// Fetch a repository from the GitHub API and read one field of it
    pub fn example() -> Self {
        let node = |id: &str, task_type: &str, name: &str, x: f32| GraphNode {
            id: id.to_string(),
            task_type: task_type.to_string(),
            name: Some(name.to_string()),
            inputs: HashMap::new(),
            position: Some(Position { x, y: 100.0 }),
        };

        let mut fetch = node("fetch", "HTTP_REQUEST", "Fetch repository", 100.0);
        fetch.inputs.insert(
            "Url".to_string(),
            "https://api.github.com/repos/rust-lang/rust".into(),
        );
        fetch.inputs.insert("Method".to_string(), "GET".into());

        let mut read = node("stars", "READ_PROPERTY_FROM_JSON", "Read star count", 350.0);
        read.inputs
            .insert("Property name".to_string(), "stargazers_count".into());

        Self {
            name: "Example HTTP Workflow".to_string(),
            description: Some("Fetches a repository and reads its star count".to_string()),
            nodes: vec![fetch, read],
            edges: vec![Edge {
                id: "fetch-stars".to_string(),
                source: "fetch".to_string(),
                source_handle: "Response body".to_string(),
                target: "stars".to_string(),
                target_handle: "JSON".to_string(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_inputs_become_values() {
        let file: GraphFile = serde_json::from_str(
            r#"{
                "name": "t",
                "nodes": [
                    {
                        "id": "a",
                        "taskType": "HTTP_REQUEST",
                        "inputs": { "Url": "http://x", "Retries": 3 }
                    }
                ]
            }"#,
        )
        .unwrap();

        let definition = file.into_definition();
        let inputs = &definition.nodes[0].inputs;
        assert_eq!(inputs["Url"], Value::from("http://x"));
        assert_eq!(inputs["Retries"], Value::Number(3.0));
        assert!(definition.edges.is_empty());
    }

    #[test]
    fn example_graph_plans() {
        let plan = flexruntime::build_plan(&GraphFile::example().into_definition()).unwrap();
        assert_eq!(plan.phases.len(), 2);
        assert_eq!(plan.credits(), 3);
    }
}
