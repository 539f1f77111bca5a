use crate::{ExecutionId, ExecutionStatus, LogLine, NodeId, PhaseId, TaskType, Value, WorkflowId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::broadcast;

/// Events emitted during workflow execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExecutionEvent {
    WorkflowStarted {
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        timestamp: DateTime<Utc>,
    },
    WorkflowCompleted {
        execution_id: ExecutionId,
        status: ExecutionStatus,
        credits_consumed: u32,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    PhaseStarted {
        execution_id: ExecutionId,
        phase_id: PhaseId,
        node_id: NodeId,
        task_type: TaskType,
        timestamp: DateTime<Utc>,
    },
    PhaseCompleted {
        execution_id: ExecutionId,
        phase_id: PhaseId,
        outputs: HashMap<String, Value>,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },
    PhaseFailed {
        execution_id: ExecutionId,
        phase_id: PhaseId,
        error: String,
        timestamp: DateTime<Utc>,
    },
    PhaseLog {
        execution_id: ExecutionId,
        phase_id: PhaseId,
        line: LogLine,
    },
}

impl ExecutionEvent {
    pub fn execution_id(&self) -> ExecutionId {
        match self {
            ExecutionEvent::WorkflowStarted { execution_id, .. }
            | ExecutionEvent::WorkflowCompleted { execution_id, .. }
            | ExecutionEvent::PhaseStarted { execution_id, .. }
            | ExecutionEvent::PhaseCompleted { execution_id, .. }
            | ExecutionEvent::PhaseFailed { execution_id, .. }
            | ExecutionEvent::PhaseLog { execution_id, .. } => *execution_id,
        }
    }
}

/// Per-phase handle used to publish log lines
#[derive(Clone)]
pub struct EventEmitter {
    execution_id: ExecutionId,
    phase_id: PhaseId,
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventEmitter {
    pub fn new(
        execution_id: ExecutionId,
        phase_id: PhaseId,
        sender: broadcast::Sender<ExecutionEvent>,
    ) -> Self {
        Self {
            execution_id,
            phase_id,
            sender,
        }
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn phase_id(&self) -> PhaseId {
        self.phase_id
    }

    /// Publish a log line; having no subscribers is not an error.
    pub fn log(&self, line: LogLine) {
        let _ = self.sender.send(ExecutionEvent::PhaseLog {
            execution_id: self.execution_id,
            phase_id: self.phase_id,
            line,
        });
    }
}

/// Process-wide event bus
pub struct EventBus {
    sender: broadcast::Sender<ExecutionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.sender.subscribe()
    }

    pub fn emit(&self, event: ExecutionEvent) {
        let _ = self.sender.send(event);
    }

    pub fn create_emitter(&self, execution_id: ExecutionId, phase_id: PhaseId) -> EventEmitter {
        EventEmitter::new(execution_id, phase_id, self.sender.clone())
    }
}
