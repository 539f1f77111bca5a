//! Workflow execution runtime
//!
//! This crate turns editor graphs into execution plans, runs them phase by
//! phase against registered task executors, persists run records and
//! starts runs from manual, cron and webhook triggers.

mod auth;
mod executor;
mod planner;
mod registry;
mod runtime;
mod scheduler;
mod store;

pub use auth::verify_bearer;
pub use executor::{resolve_inputs, WorkflowExecutor};
pub use planner::build_plan;
pub use registry::TaskRegistry;
pub use runtime::{FlowRuntime, RunHandle, RunRequest, RuntimeConfig};
pub use scheduler::{next_occurrence, CronScheduler};
pub use store::{ExecutionStore, MemoryStore, WorkflowStore};
