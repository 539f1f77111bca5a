use crate::runtime::{FlowRuntime, RunRequest};
use chrono::{DateTime, Utc};
use cron::Schedule;
use flexcore::{ExecutionId, FlowError, Workflow};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// Next time `expression` fires strictly after `after`.
///
/// Accepts the five-field form the editor produces as well as the
/// six/seven-field form with seconds.
pub fn next_occurrence(
    expression: &str,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>, FlowError> {
    let normalized = match expression.split_whitespace().count() {
        5 => format!("0 {}", expression.trim()),
        _ => expression.trim().to_string(),
    };
    let schedule = Schedule::from_str(&normalized).map_err(|e| FlowError::InvalidSchedule {
        expression: expression.to_string(),
        reason: e.to_string(),
    })?;
    schedule
        .after(&after)
        .next()
        .ok_or_else(|| FlowError::InvalidSchedule {
            expression: expression.to_string(),
            reason: "no upcoming occurrence".to_string(),
        })
}

/// Starts runs of published workflows whose cron schedule is due
pub struct CronScheduler {
    runtime: Arc<FlowRuntime>,
}

impl CronScheduler {
    pub fn new(runtime: Arc<FlowRuntime>) -> Self {
        Self { runtime }
    }

    /// Trigger every due workflow once and return the started executions
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<Vec<ExecutionId>, FlowError> {
        let due: Vec<Workflow> = self
            .runtime
            .workflow_store()
            .due_workflows(now)
            .await?
            .into_iter()
            .filter(|w| w.is_published())
            .collect();

        if due.is_empty() {
            return Ok(Vec::new());
        }
        tracing::info!("{} scheduled workflows due", due.len());

        let results =
            futures::future::join_all(due.iter().map(|w| self.trigger(w, now))).await;

        let mut started = Vec::new();
        for (workflow, result) in due.iter().zip(results) {
            match result {
                Ok(execution_id) => started.push(execution_id),
                Err(e) => tracing::error!("Scheduled run of {} not started: {}", workflow.id, e),
            }
        }
        Ok(started)
    }

    async fn trigger(
        &self,
        workflow: &Workflow,
        now: DateTime<Utc>,
    ) -> Result<ExecutionId, FlowError> {
        self.runtime.advance_schedule(workflow.id, now).await?;
        let handle = self.runtime.run_workflow(RunRequest::cron(workflow.id)).await?;
        Ok(handle.execution_id)
    }

    /// Tick on a fixed interval until the task is dropped
    pub async fn run_forever(self, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if let Err(e) = self.tick(Utc::now()).await {
                tracing::error!("Scheduler tick failed: {}", e);
            }
        }
    }
}
