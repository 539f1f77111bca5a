//! Persistence contracts for workflows and runs, and an in-memory store.
//!
//! Every operation touches a single document; nothing here needs a
//! transaction spanning records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flexcore::{
    ExecutionId, ExecutionPhase, ExecutionStatus, StoreError, Workflow, WorkflowExecution,
    WorkflowId,
};
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn insert_workflow(&self, workflow: Workflow) -> Result<(), StoreError>;

    async fn find_workflow(&self, id: WorkflowId) -> Result<Workflow, StoreError>;

    async fn update_workflow(&self, workflow: &Workflow) -> Result<(), StoreError>;

    async fn delete_workflow(&self, id: WorkflowId) -> Result<(), StoreError>;

    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError>;

    /// Workflows with a schedule whose next run time is at or before `now`
    async fn due_workflows(&self, now: DateTime<Utc>) -> Result<Vec<Workflow>, StoreError>;

    /// Stamp the latest run onto the workflow document
    async fn record_run(
        &self,
        id: WorkflowId,
        execution_id: ExecutionId,
        status: ExecutionStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Create the run row together with its phase rows
    async fn create_execution(
        &self,
        execution: WorkflowExecution,
        phases: Vec<ExecutionPhase>,
    ) -> Result<(), StoreError>;

    async fn execution(&self, id: ExecutionId) -> Result<WorkflowExecution, StoreError>;

    async fn update_execution(&self, execution: &WorkflowExecution) -> Result<(), StoreError>;

    /// Phases of a run in plan order
    async fn phases(&self, execution_id: ExecutionId) -> Result<Vec<ExecutionPhase>, StoreError>;

    async fn update_phase(&self, phase: &ExecutionPhase) -> Result<(), StoreError>;

    async fn executions_for(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<WorkflowExecution>, StoreError>;
}

/// Store backed by process memory
#[derive(Default)]
pub struct MemoryStore {
    workflows: RwLock<HashMap<WorkflowId, Workflow>>,
    executions: RwLock<HashMap<ExecutionId, WorkflowExecution>>,
    phases: RwLock<HashMap<ExecutionId, Vec<ExecutionPhase>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for MemoryStore {
    async fn insert_workflow(&self, workflow: Workflow) -> Result<(), StoreError> {
        self.workflows.write().await.insert(workflow.id, workflow);
        Ok(())
    }

    async fn find_workflow(&self, id: WorkflowId) -> Result<Workflow, StoreError> {
        self.workflows
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::WorkflowNotFound(id))
    }

    async fn update_workflow(&self, workflow: &Workflow) -> Result<(), StoreError> {
        let mut workflows = self.workflows.write().await;
        let slot = workflows
            .get_mut(&workflow.id)
            .ok_or(StoreError::WorkflowNotFound(workflow.id))?;
        *slot = workflow.clone();
        Ok(())
    }

    async fn delete_workflow(&self, id: WorkflowId) -> Result<(), StoreError> {
        self.workflows
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::WorkflowNotFound(id))
    }

    async fn list_workflows(&self) -> Result<Vec<Workflow>, StoreError> {
        let mut workflows: Vec<Workflow> = self.workflows.read().await.values().cloned().collect();
        workflows.sort_by_key(|w| w.created_at);
        Ok(workflows)
    }

    async fn due_workflows(&self, now: DateTime<Utc>) -> Result<Vec<Workflow>, StoreError> {
        Ok(self
            .workflows
            .read()
            .await
            .values()
            .filter(|w| w.cron.is_some() && w.next_run_at.map(|t| t <= now).unwrap_or(false))
            .cloned()
            .collect())
    }

    async fn record_run(
        &self,
        id: WorkflowId,
        execution_id: ExecutionId,
        status: ExecutionStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let mut workflows = self.workflows.write().await;
        let workflow = workflows.get_mut(&id).ok_or(StoreError::WorkflowNotFound(id))?;
        workflow.last_run_id = Some(execution_id);
        workflow.last_run_status = Some(status);
        workflow.last_run_at = Some(at);
        Ok(())
    }
}

#[async_trait]
impl ExecutionStore for MemoryStore {
    async fn create_execution(
        &self,
        execution: WorkflowExecution,
        phases: Vec<ExecutionPhase>,
    ) -> Result<(), StoreError> {
        let id = execution.id;
        self.phases.write().await.insert(id, phases);
        self.executions.write().await.insert(id, execution);
        Ok(())
    }

    async fn execution(&self, id: ExecutionId) -> Result<WorkflowExecution, StoreError> {
        self.executions
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(StoreError::ExecutionNotFound(id))
    }

    async fn update_execution(&self, execution: &WorkflowExecution) -> Result<(), StoreError> {
        let mut executions = self.executions.write().await;
        let slot = executions
            .get_mut(&execution.id)
            .ok_or(StoreError::ExecutionNotFound(execution.id))?;
        *slot = execution.clone();
        Ok(())
    }

    async fn phases(&self, execution_id: ExecutionId) -> Result<Vec<ExecutionPhase>, StoreError> {
        self.phases
            .read()
            .await
            .get(&execution_id)
            .cloned()
            .ok_or(StoreError::ExecutionNotFound(execution_id))
    }

    async fn update_phase(&self, phase: &ExecutionPhase) -> Result<(), StoreError> {
        let mut phases = self.phases.write().await;
        let slot = phases
            .get_mut(&phase.execution_id)
            .and_then(|rows| rows.iter_mut().find(|p| p.id == phase.id))
            .ok_or(StoreError::PhaseNotFound(phase.id))?;
        *slot = phase.clone();
        Ok(())
    }

    async fn executions_for(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<WorkflowExecution>, StoreError> {
        let mut runs: Vec<WorkflowExecution> = self
            .executions
            .read()
            .await
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect();
        runs.sort_by_key(|e| e.created_at);
        Ok(runs)
    }
}
