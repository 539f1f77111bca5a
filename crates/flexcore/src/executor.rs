use crate::{TaskEnvironment, TaskError, TaskType};
use async_trait::async_trait;

/// Core trait every task type's side effect implements
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Task type this executor is registered under
    fn task_type(&self) -> TaskType;

    /// Run one phase. `Ok(false)` and `Err` both fail the phase; either
    /// way the cause should already be in `env.log`.
    ///
    /// Executors must not rely on the order of sibling phases that share a
    /// phase number.
    async fn execute(&self, env: &mut TaskEnvironment<'_>) -> Result<bool, TaskError>;
}
