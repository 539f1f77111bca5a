//! Core abstractions for the WorkFlex execution engine
//!
//! This crate provides the types and contracts every other crate depends
//! on: the task catalog, raw graphs and execution plans, persisted run
//! records, the per-phase execution environment and the adapter traits
//! executors reach external systems through. It has no runtime of its own.

mod environment;
mod error;
pub mod events;
mod execution;
mod executor;
mod plan;
mod resources;
mod task;
mod value;
mod workflow;

pub use environment::{PhaseLog, TaskEnvironment};
pub use error::{FlowError, PlanError, StoreError, TaskError};
pub use events::*;
pub use execution::{
    ExecutionId, ExecutionPhase, ExecutionStatus, LogLevel, LogLine, PhaseId, PhaseStatus,
    TriggerKind, WorkflowExecution,
};
pub use executor::TaskExecutor;
pub use plan::{ExecutionPlan, PlanPhase, PlannedNode, PLAN_VERSION};
pub use resources::{
    BrowserLauncher, BrowserSession, CredentialResolver, CredentialValue, DatabaseConnector,
    MemoryCredentials, NoBrowser, RunResources, RunServices,
};
pub use task::{ParamType, TaskDefinition, TaskInput, TaskOutput, TaskType, WEB_PAGE};
pub use value::Value;
pub use workflow::{
    Edge, FlowNode, NodeId, Position, Workflow, WorkflowDefinition, WorkflowId, WorkflowStatus,
};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
