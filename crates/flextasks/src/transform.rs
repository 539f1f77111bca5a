use crate::html;
use async_trait::async_trait;
use flexcore::{TaskEnvironment, TaskError, TaskExecutor, TaskType};

/// Text content of the first element matching a CSS selector
pub struct ExtractTextFromElementExecutor;

#[async_trait]
impl TaskExecutor for ExtractTextFromElementExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::ExtractTextFromElement
    }

    async fn execute(&self, env: &mut TaskEnvironment<'_>) -> Result<bool, TaskError> {
        let selector = env.get_string("Selector")?;
        let document = env.get_string("Html")?;

        match html::select_text(&document, &selector)? {
            Some(text) if !text.is_empty() => {
                env.set_output("Extracted text", text);
                Ok(true)
            }
            Some(_) => {
                env.log.error(format!("Element {} has no text", selector));
                Ok(false)
            }
            None => {
                env.log.error(format!("Element not found: {}", selector));
                Ok(false)
            }
        }
    }
}

/// Read one top-level property of a JSON object
pub struct ReadPropertyFromJsonExecutor;

#[async_trait]
impl TaskExecutor for ReadPropertyFromJsonExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::ReadPropertyFromJson
    }

    async fn execute(&self, env: &mut TaskEnvironment<'_>) -> Result<bool, TaskError> {
        let json = env.get_string("JSON")?;
        let property = env.get_string("Property name")?;

        let parsed: serde_json::Value = match serde_json::from_str(&json) {
            Ok(parsed) => parsed,
            Err(e) => {
                env.log.error(format!("JSON parse error: {}", e));
                return Ok(false);
            }
        };

        match parsed.get(&property) {
            Some(serde_json::Value::String(s)) => env.set_output("Property value", s.clone()),
            Some(other) => env.set_output("Property value", other.to_string()),
            None => {
                env.log.error(format!("Property not found: {}", property));
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Set one top-level property of a JSON object
pub struct AddPropertyToJsonExecutor;

#[async_trait]
impl TaskExecutor for AddPropertyToJsonExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::AddPropertyToJson
    }

    async fn execute(&self, env: &mut TaskEnvironment<'_>) -> Result<bool, TaskError> {
        let json = env.get_string("JSON")?;
        let property = env.get_string("Property name")?;
        let value = env.get_string("Property value")?;

        let mut object = match serde_json::from_str::<serde_json::Value>(&json) {
            Ok(serde_json::Value::Object(object)) => object,
            Ok(_) => {
                env.log.error("JSON input must be an object");
                return Ok(false);
            }
            Err(e) => {
                env.log.error(format!("JSON parse error: {}", e));
                return Ok(false);
            }
        };

        object.insert(property, serde_json::Value::String(value));
        env.set_output(
            "Updated JSON",
            serde_json::Value::Object(object).to_string(),
        );
        Ok(true)
    }
}
