use crate::executor::WorkflowExecutor;
use crate::planner::build_plan;
use crate::registry::TaskRegistry;
use crate::scheduler::next_occurrence;
use crate::store::{ExecutionStore, MemoryStore, WorkflowStore};
use chrono::{DateTime, Utc};
use flexcore::{
    EventBus, ExecutionId, ExecutionPhase, ExecutionPlan, ExecutionStatus, FlowError, StoreError,
    TriggerKind, Workflow, WorkflowDefinition, WorkflowExecution, WorkflowId, WorkflowStatus,
    RunServices,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Main entry point for managing and running workflows
pub struct FlowRuntime {
    registry: Arc<TaskRegistry>,
    workflows: Arc<dyn WorkflowStore>,
    executions: Arc<dyn ExecutionStore>,
    executor: Arc<WorkflowExecutor>,
    event_bus: Arc<EventBus>,
}

impl FlowRuntime {
    /// Runtime over a fresh in-memory store
    pub fn new(registry: TaskRegistry, services: RunServices, config: RuntimeConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::with_stores(registry, services, store.clone(), store, config)
    }

    pub fn with_stores(
        registry: TaskRegistry,
        services: RunServices,
        workflows: Arc<dyn WorkflowStore>,
        executions: Arc<dyn ExecutionStore>,
        config: RuntimeConfig,
    ) -> Self {
        let missing = registry.missing_executors();
        if !missing.is_empty() {
            tracing::warn!("No executor registered for task types: {:?}", missing);
        }

        let registry = Arc::new(registry);
        let event_bus = Arc::new(EventBus::new(config.event_buffer_size));
        let executor = Arc::new(WorkflowExecutor::new(
            registry.clone(),
            executions.clone(),
            workflows.clone(),
            services,
            event_bus.clone(),
        ));

        Self {
            registry,
            workflows,
            executions,
            executor,
            event_bus,
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<flexcore::ExecutionEvent> {
        self.event_bus.subscribe()
    }

    pub async fn create_workflow(
        &self,
        user_id: impl Into<String>,
        name: impl Into<String>,
        definition: WorkflowDefinition,
    ) -> Result<Workflow, FlowError> {
        let workflow = Workflow::new(user_id, name, definition);
        tracing::info!("Creating workflow: {} ({})", workflow.name, workflow.id);
        self.workflows.insert_workflow(workflow.clone()).await?;
        Ok(workflow)
    }

    pub async fn get_workflow(&self, id: WorkflowId) -> Result<Workflow, FlowError> {
        Ok(self.workflows.find_workflow(id).await?)
    }

    pub async fn list_workflows(&self) -> Result<Vec<Workflow>, FlowError> {
        Ok(self.workflows.list_workflows().await?)
    }

    pub async fn delete_workflow(&self, id: WorkflowId) -> Result<(), FlowError> {
        self.workflows.delete_workflow(id).await?;
        tracing::info!("Deleted workflow: {}", id);
        Ok(())
    }

    /// Replace the graph of a draft
    pub async fn update_definition(
        &self,
        id: WorkflowId,
        definition: WorkflowDefinition,
    ) -> Result<Workflow, FlowError> {
        let mut workflow = self.workflows.find_workflow(id).await?;
        if workflow.is_published() {
            return Err(FlowError::InvalidState(format!(
                "workflow {} is published; unpublish it before editing",
                id
            )));
        }
        workflow.definition = definition;
        workflow.updated_at = Utc::now();
        self.workflows.update_workflow(&workflow).await?;
        Ok(workflow)
    }

    /// Freeze the current graph into a plan that every later run reuses
    pub async fn publish_workflow(&self, id: WorkflowId) -> Result<Workflow, FlowError> {
        let mut workflow = self.workflows.find_workflow(id).await?;
        let plan = build_plan(&workflow.definition)?;
        workflow.credits_cost = Some(plan.credits());
        workflow.execution_plan = Some(plan);
        workflow.status = WorkflowStatus::Published;
        workflow.updated_at = Utc::now();
        self.workflows.update_workflow(&workflow).await?;
        tracing::info!("Published workflow {}", id);
        Ok(workflow)
    }

    pub async fn unpublish_workflow(&self, id: WorkflowId) -> Result<Workflow, FlowError> {
        let mut workflow = self.workflows.find_workflow(id).await?;
        workflow.execution_plan = None;
        workflow.credits_cost = None;
        workflow.status = WorkflowStatus::Draft;
        workflow.updated_at = Utc::now();
        self.workflows.update_workflow(&workflow).await?;
        Ok(workflow)
    }

    /// Set or clear the cron expression and compute the next run time
    pub async fn set_schedule(
        &self,
        id: WorkflowId,
        cron: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Workflow, FlowError> {
        let mut workflow = self.workflows.find_workflow(id).await?;
        workflow.next_run_at = match &cron {
            Some(expression) => Some(next_occurrence(expression, now)?),
            None => None,
        };
        workflow.cron = cron;
        workflow.updated_at = Utc::now();
        self.workflows.update_workflow(&workflow).await?;
        Ok(workflow)
    }

    /// Move `next_run_at` past `now`; used by the scheduler before it
    /// triggers a run so a failing workflow is not retried every tick.
    pub async fn advance_schedule(
        &self,
        id: WorkflowId,
        now: DateTime<Utc>,
    ) -> Result<Workflow, FlowError> {
        let mut workflow = self.workflows.find_workflow(id).await?;
        if let Some(expression) = &workflow.cron {
            workflow.next_run_at = Some(next_occurrence(expression, now)?);
            self.workflows.update_workflow(&workflow).await?;
        }
        Ok(workflow)
    }

    /// Create a run and start it in the background.
    ///
    /// Returns as soon as the execution record exists. Plan validation
    /// errors are returned here and no execution is created.
    pub async fn run_workflow(&self, request: RunRequest) -> Result<RunHandle, FlowError> {
        let workflow = self.workflows.find_workflow(request.workflow_id).await?;
        if let Some(user_id) = &request.user_id {
            if *user_id != workflow.user_id {
                return Err(StoreError::WorkflowNotFound(workflow.id).into());
            }
        }

        let plan = self.plan_for(&workflow, request.definition.as_ref())?;
        let execution = WorkflowExecution::new(
            workflow.id,
            workflow.user_id.clone(),
            request.trigger,
            plan,
        );
        let execution_id = execution.id;
        let phases: Vec<ExecutionPhase> = execution.create_phases();

        self.executions.create_execution(execution, phases).await?;
        self.workflows
            .record_run(workflow.id, execution_id, ExecutionStatus::Pending, Utc::now())
            .await?;

        tracing::info!(
            "Created execution {} for workflow {} ({:?})",
            execution_id,
            workflow.id,
            request.trigger
        );

        let executor = self.executor.clone();
        let join = tokio::spawn(async move {
            match executor.execute(execution_id).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::error!("Execution {} failed to run: {}", execution_id, e);
                    ExecutionStatus::Failed
                }
            }
        });

        Ok(RunHandle { execution_id, join })
    }

    fn plan_for(
        &self,
        workflow: &Workflow,
        draft: Option<&WorkflowDefinition>,
    ) -> Result<ExecutionPlan, FlowError> {
        if workflow.is_published() {
            return workflow.execution_plan.clone().ok_or_else(|| {
                FlowError::InvalidState(format!("published workflow {} has no plan", workflow.id))
            });
        }
        Ok(build_plan(draft.unwrap_or(&workflow.definition))?)
    }

    pub async fn execution(&self, id: ExecutionId) -> Result<WorkflowExecution, FlowError> {
        Ok(self.executions.execution(id).await?)
    }

    pub async fn phases(&self, id: ExecutionId) -> Result<Vec<ExecutionPhase>, FlowError> {
        Ok(self.executions.phases(id).await?)
    }

    pub async fn executions_for(
        &self,
        id: WorkflowId,
    ) -> Result<Vec<WorkflowExecution>, FlowError> {
        Ok(self.executions.executions_for(id).await?)
    }

    pub(crate) fn workflow_store(&self) -> &Arc<dyn WorkflowStore> {
        &self.workflows
    }
}

/// What a trigger asks the runtime to run
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub workflow_id: WorkflowId,
    /// Caller identity; runs are refused for workflows the caller does not own
    pub user_id: Option<String>,
    /// Unsaved graph from the editor, only honoured for drafts
    pub definition: Option<WorkflowDefinition>,
    pub trigger: TriggerKind,
}

impl RunRequest {
    pub fn manual(workflow_id: WorkflowId, user_id: impl Into<String>) -> Self {
        Self {
            workflow_id,
            user_id: Some(user_id.into()),
            definition: None,
            trigger: TriggerKind::Manual,
        }
    }

    pub fn cron(workflow_id: WorkflowId) -> Self {
        Self {
            workflow_id,
            user_id: None,
            definition: None,
            trigger: TriggerKind::Cron,
        }
    }

    pub fn webhook(workflow_id: WorkflowId) -> Self {
        Self {
            workflow_id,
            user_id: None,
            definition: None,
            trigger: TriggerKind::Webhook,
        }
    }

    pub fn with_definition(mut self, definition: WorkflowDefinition) -> Self {
        self.definition = Some(definition);
        self
    }
}

/// Handle for a run started in the background
pub struct RunHandle {
    pub execution_id: ExecutionId,
    join: JoinHandle<ExecutionStatus>,
}

impl RunHandle {
    /// Wait for the run to reach a terminal status
    pub async fn wait(self) -> ExecutionStatus {
        self.join.await.unwrap_or_else(|e| {
            tracing::error!("Execution {} task ended abnormally: {}", self.execution_id, e);
            ExecutionStatus::Failed
        })
    }
}

/// Configuration for the runtime
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub event_buffer_size: usize,
}

impl RuntimeConfig {
    /// Read `WORKFLEX_EVENT_BUFFER`, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(size) = std::env::var("WORKFLEX_EVENT_BUFFER")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            config.event_buffer_size = size;
        }
        config
    }
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            event_buffer_size: 1000,
        }
    }
}
