use async_trait::async_trait;
use flexcore::{TaskEnvironment, TaskError, TaskExecutor, TaskType, Value};

/// Run a query through the configured database connector
pub struct DatabaseQueryExecutor;

#[async_trait]
impl TaskExecutor for DatabaseQueryExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::DatabaseQuery
    }

    async fn execute(&self, env: &mut TaskEnvironment<'_>) -> Result<bool, TaskError> {
        let Some(database) = env.database() else {
            env.log.error("No database connector is configured");
            return Ok(false);
        };

        let query = env.get_string("Query")?;
        let connection = env.credential("Credentials").await?;

        let rows = database.query(&connection, &query).await?;
        if let Some(count) = rows.as_array().map(Vec::len) {
            env.log.info(format!("Query returned {} rows", count));
        }
        env.set_output("Rows", Value::Json(rows));
        Ok(true)
    }
}
