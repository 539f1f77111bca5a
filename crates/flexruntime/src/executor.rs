use crate::registry::TaskRegistry;
use crate::store::{ExecutionStore, WorkflowStore};
use chrono::Utc;
use flexcore::{
    Edge, EventBus, ExecutionEvent, ExecutionId, ExecutionPhase, ExecutionStatus, FlowError,
    LogLevel, NodeId, PhaseLog, PhaseStatus, PlannedNode, RunResources, RunServices,
    TaskEnvironment, Value, WorkflowExecution,
};
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

/// Runs the phases of one persisted execution, in order, failing fast
pub struct WorkflowExecutor {
    registry: Arc<TaskRegistry>,
    executions: Arc<dyn ExecutionStore>,
    workflows: Arc<dyn WorkflowStore>,
    services: RunServices,
    event_bus: Arc<EventBus>,
}

impl WorkflowExecutor {
    pub fn new(
        registry: Arc<TaskRegistry>,
        executions: Arc<dyn ExecutionStore>,
        workflows: Arc<dyn WorkflowStore>,
        services: RunServices,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            registry,
            executions,
            workflows,
            services,
            event_bus,
        }
    }

    /// Drive a `Pending` execution to a terminal status.
    ///
    /// Task failures end in `Ok(ExecutionStatus::Failed)`. `Err` is only
    /// returned when the store cannot be read or written.
    pub async fn execute(&self, execution_id: ExecutionId) -> Result<ExecutionStatus, FlowError> {
        let mut execution = self.executions.execution(execution_id).await?;
        if execution.status != ExecutionStatus::Pending {
            return Err(FlowError::InvalidState(format!(
                "execution {} is {:?}, not pending",
                execution_id, execution.status
            )));
        }
        let mut phases = self.executions.phases(execution_id).await?;
        let start_time = Instant::now();

        execution.status = ExecutionStatus::Running;
        execution.started_at = Some(Utc::now());
        self.executions.update_execution(&execution).await?;
        self.stamp_workflow(&execution).await;

        self.event_bus.emit(ExecutionEvent::WorkflowStarted {
            execution_id,
            workflow_id: execution.workflow_id,
            timestamp: Utc::now(),
        });

        tracing::info!(
            "Starting execution {} of workflow {} ({} phases)",
            execution_id,
            execution.workflow_id,
            phases.len()
        );

        let mut resources = RunResources::new();
        let result = self
            .run_phases(&execution, &mut phases, &mut resources)
            .await;

        // Released on every path, before the terminal status is written.
        resources.release().await;

        let status = match &result {
            Ok(true) => ExecutionStatus::Completed,
            Ok(false) => ExecutionStatus::Failed,
            Err(e) => {
                tracing::error!("Execution {} aborted: {}", execution_id, e);
                ExecutionStatus::Failed
            }
        };

        execution.status = status;
        execution.completed_at = Some(Utc::now());
        execution.credits_consumed = phases.iter().map(|p| p.credits_consumed).sum();
        self.executions.update_execution(&execution).await?;
        self.stamp_workflow(&execution).await;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        self.event_bus.emit(ExecutionEvent::WorkflowCompleted {
            execution_id,
            status,
            credits_consumed: execution.credits_consumed,
            duration_ms,
            timestamp: Utc::now(),
        });

        tracing::info!(
            "Execution {} finished {:?} in {}ms",
            execution_id,
            status,
            duration_ms
        );

        result.map(|_| status)
    }

    /// Returns `Ok(false)` at the first failed phase; later phases stay
    /// `Created`.
    async fn run_phases(
        &self,
        execution: &WorkflowExecution,
        phases: &mut [ExecutionPhase],
        resources: &mut RunResources,
    ) -> Result<bool, FlowError> {
        let mut node_outputs: HashMap<NodeId, HashMap<String, Value>> = HashMap::new();

        for phase in phases.iter_mut() {
            if !self.run_phase(execution, phase, resources, &node_outputs).await? {
                return Ok(false);
            }
            node_outputs.insert(phase.node.node.id.clone(), phase.outputs.clone());
        }

        Ok(true)
    }

    async fn run_phase(
        &self,
        execution: &WorkflowExecution,
        phase: &mut ExecutionPhase,
        resources: &mut RunResources,
        node_outputs: &HashMap<NodeId, HashMap<String, Value>>,
    ) -> Result<bool, FlowError> {
        let task_type = phase.node.task_type;
        phase.status = PhaseStatus::Running;
        phase.started_at = Some(Utc::now());
        self.executions.update_phase(phase).await?;

        self.event_bus.emit(ExecutionEvent::PhaseStarted {
            execution_id: execution.id,
            phase_id: phase.id,
            node_id: phase.node.node.id.clone(),
            task_type,
            timestamp: Utc::now(),
        });

        let start = Instant::now();
        let inputs = resolve_inputs(&execution.plan.edges, &phase.node, node_outputs);
        let log = PhaseLog::new(self.event_bus.create_emitter(execution.id, phase.id));

        let (success, inputs, outputs, logs) = {
            let mut env = TaskEnvironment::new(
                &phase.node,
                &execution.user_id,
                inputs,
                log,
                resources,
                &self.services,
            );

            let success = match self.registry.executor(task_type) {
                Some(executor) => {
                    let outcome = AssertUnwindSafe(executor.execute(&mut env))
                        .catch_unwind()
                        .await;
                    match outcome {
                        Ok(Ok(success)) => success,
                        Ok(Err(e)) => {
                            env.log.error(e.to_string());
                            false
                        }
                        Err(panic) => {
                            // A panic is reported like a thrown error
                            let error = FlowError::Execution(format!(
                                "{} panicked: {}",
                                task_type,
                                panic_message(&*panic)
                            ));
                            env.log.error(error.to_string());
                            false
                        }
                    }
                }
                None => {
                    env.log.error(format!("No executor registered for {}", task_type));
                    false
                }
            };

            if !success && !env.log.lines().iter().any(|l| l.level == LogLevel::Error) {
                env.log.error(format!("{} failed without reporting an error", task_type));
            }

            let (inputs, outputs, logs) = env.finish();
            (success, inputs, outputs, logs)
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        phase.inputs = inputs;
        phase.outputs = outputs;
        phase.logs = logs;
        phase.completed_at = Some(Utc::now());

        if success {
            phase.status = PhaseStatus::Completed;
            phase.credits_consumed = task_type.definition().credits;
            self.executions.update_phase(phase).await?;
            tracing::info!(
                "Phase {} ({}) completed in {}ms",
                phase.number,
                phase.name,
                duration_ms
            );
            self.event_bus.emit(ExecutionEvent::PhaseCompleted {
                execution_id: execution.id,
                phase_id: phase.id,
                outputs: phase.outputs.clone(),
                duration_ms,
                timestamp: Utc::now(),
            });
        } else {
            phase.status = PhaseStatus::Failed;
            self.executions.update_phase(phase).await?;
            let error = phase
                .logs
                .iter()
                .rev()
                .find(|l| l.level == LogLevel::Error)
                .map(|l| l.message.clone())
                .unwrap_or_default();
            tracing::error!("Phase {} ({}) failed: {}", phase.number, phase.name, error);
            self.event_bus.emit(ExecutionEvent::PhaseFailed {
                execution_id: execution.id,
                phase_id: phase.id,
                error,
                timestamp: Utc::now(),
            });
        }

        Ok(success)
    }

    async fn stamp_workflow(&self, execution: &WorkflowExecution) {
        let at = execution.completed_at.or(execution.started_at).unwrap_or_else(Utc::now);
        if let Err(e) = self
            .workflows
            .record_run(execution.workflow_id, execution.id, execution.status, at)
            .await
        {
            tracing::warn!("Could not record run on workflow {}: {}", execution.workflow_id, e);
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

/// Literal values from the node, overridden by whatever upstream phases
/// produced on the edges feeding it.
pub fn resolve_inputs(
    edges: &[Edge],
    node: &PlannedNode,
    node_outputs: &HashMap<NodeId, HashMap<String, Value>>,
) -> HashMap<String, Value> {
    let mut inputs: HashMap<String, Value> = node
        .task_type
        .definition()
        .inputs
        .iter()
        .filter_map(|i| {
            node.node
                .inputs
                .get(i.name)
                .map(|v| (i.name.to_string(), v.clone()))
        })
        .collect();

    for edge in edges.iter().filter(|e| e.target == node.node.id) {
        if let Some(value) = node_outputs
            .get(&edge.source)
            .and_then(|outputs| outputs.get(&edge.source_handle))
        {
            inputs.insert(edge.target_handle.clone(), value.clone());
        }
    }

    inputs
}
