use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum FlowError {
    #[error("plan invalid: {0}")]
    Plan(#[from] PlanError),

    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Execution error: {0}")]
    Execution(String),
}

/// Graph validation failures raised before any run is created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("no entry point found")]
    NoEntryPoint,

    #[error("cyclic dependency detected at node {node}")]
    CyclicDependency { node: String },

    #[error("node {node} is missing required input '{input}'")]
    MissingRequiredInput { node: String, input: String },

    #[error("node {node} has unknown task type '{task_type}'")]
    UnknownTaskType { node: String, task_type: String },

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("duplicate node id: {0}")]
    DuplicateNode(String),

    #[error("invalid connection: {0}")]
    InvalidConnection(String),
}

/// Failures reported by a task executor or its environment.
#[derive(Error, Debug, Clone)]
pub enum TaskError {
    #[error("Unresolved input: {0}")]
    UnresolvedInput(String),

    #[error("Invalid input type for '{field}': expected {expected}, got {actual}")]
    InvalidInputType {
        field: String,
        expected: String,
        actual: String,
    },

    #[error("Credential not found: {0}")]
    CredentialNotFound(String),

    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    #[error("Unsupported action: {0}")]
    Unsupported(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(Uuid),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(Uuid),

    #[error("Phase not found: {0}")]
    PhaseNotFound(Uuid),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
