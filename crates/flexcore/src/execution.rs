use crate::{ExecutionPlan, PlannedNode, Value, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

pub type ExecutionId = Uuid;
pub type PhaseId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PhaseStatus {
    Created,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Manual,
    Cron,
    Webhook,
}

/// One row per run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub user_id: String,
    pub status: ExecutionStatus,
    pub trigger: TriggerKind,
    pub plan: ExecutionPlan,
    pub credits_consumed: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl WorkflowExecution {
    pub fn new(
        workflow_id: WorkflowId,
        user_id: impl Into<String>,
        trigger: TriggerKind,
        plan: ExecutionPlan,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            user_id: user_id.into(),
            status: ExecutionStatus::Pending,
            trigger,
            plan,
            credits_consumed: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Phase rows for every planned node, all in `Created`.
    pub fn create_phases(&self) -> Vec<ExecutionPhase> {
        self.plan
            .nodes()
            .map(|(phase, planned)| ExecutionPhase::new(self.id, phase, planned.clone()))
            .collect()
    }
}

/// One row per node per run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionPhase {
    pub id: PhaseId,
    pub execution_id: ExecutionId,
    pub number: u32,
    pub name: String,
    pub node: PlannedNode,
    pub status: PhaseStatus,
    pub inputs: HashMap<String, Value>,
    pub outputs: HashMap<String, Value>,
    pub credits_consumed: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub logs: Vec<LogLine>,
}

impl ExecutionPhase {
    pub fn new(execution_id: ExecutionId, number: u32, node: PlannedNode) -> Self {
        Self {
            id: Uuid::new_v4(),
            execution_id,
            number,
            name: node.display_name(),
            node,
            status: PhaseStatus::Created,
            inputs: HashMap::new(),
            outputs: HashMap::new(),
            credits_consumed: 0,
            started_at: None,
            completed_at: None,
            logs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
}
