use crate::{
    BrowserSession, CredentialValue, DatabaseConnector, EventEmitter, ExecutionId, LogLevel,
    LogLine, ParamType, PhaseId, PlannedNode, RunResources, RunServices, TaskDefinition,
    TaskError, TaskType, Value, WEB_PAGE,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;

/// Timestamped log lines of one phase
pub struct PhaseLog {
    lines: Vec<LogLine>,
    emitter: EventEmitter,
}

impl PhaseLog {
    pub fn new(emitter: EventEmitter) -> Self {
        Self {
            lines: Vec::new(),
            emitter,
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Info, message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Warn, message.into());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(LogLevel::Error, message.into());
    }

    pub fn lines(&self) -> &[LogLine] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<LogLine> {
        self.lines
    }

    fn push(&mut self, level: LogLevel, message: String) {
        let execution_id = self.emitter.execution_id();
        let phase_id = self.emitter.phase_id();
        match level {
            LogLevel::Info => tracing::info!(%execution_id, %phase_id, "{}", message),
            LogLevel::Warn => tracing::warn!(%execution_id, %phase_id, "{}", message),
            LogLevel::Error => tracing::error!(%execution_id, %phase_id, "{}", message),
        }
        let line = LogLine {
            timestamp: Utc::now(),
            level,
            message,
        };
        self.emitter.log(line.clone());
        self.lines.push(line);
    }
}

/// Context handed to a task executor for one phase.
///
/// Inputs are resolved by the orchestrator before the executor runs: a
/// value routed over an edge wins over the literal typed into the node.
pub struct TaskEnvironment<'a> {
    node: &'a PlannedNode,
    user_id: &'a str,
    inputs: HashMap<String, Value>,
    outputs: HashMap<String, Value>,
    pub log: PhaseLog,
    resources: &'a mut RunResources,
    services: &'a RunServices,
}

impl<'a> TaskEnvironment<'a> {
    pub fn new(
        node: &'a PlannedNode,
        user_id: &'a str,
        inputs: HashMap<String, Value>,
        log: PhaseLog,
        resources: &'a mut RunResources,
        services: &'a RunServices,
    ) -> Self {
        Self {
            node,
            user_id,
            inputs,
            outputs: HashMap::new(),
            log,
            resources,
            services,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node.node.id
    }

    pub fn task_type(&self) -> TaskType {
        self.node.task_type
    }

    pub fn definition(&self) -> &'static TaskDefinition {
        self.node.task_type.definition()
    }

    pub fn user_id(&self) -> &str {
        self.user_id
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.log.emitter.execution_id()
    }

    pub fn phase_id(&self) -> PhaseId {
        self.log.emitter.phase_id()
    }

    /// Resolved value of an input. Unset optional inputs read as `Null`;
    /// unset required inputs are an error.
    pub fn get_input(&self, name: &str) -> Result<Value, TaskError> {
        match self.inputs.get(name) {
            Some(value) if !value.is_unset() => Ok(value.clone()),
            _ => {
                let required = self
                    .definition()
                    .input(name)
                    .map(|i| i.required)
                    .unwrap_or(false);
                if required {
                    Err(TaskError::UnresolvedInput(name.to_string()))
                } else {
                    Ok(Value::Null)
                }
            }
        }
    }

    /// Read an input as text. JSON and numbers are rendered, not rejected.
    pub fn get_string(&self, name: &str) -> Result<String, TaskError> {
        match self.get_input(name)? {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(b.to_string()),
            Value::Json(j) => Ok(j.to_string()),
            other => Err(TaskError::InvalidInputType {
                field: name.to_string(),
                expected: "string".to_string(),
                actual: other.type_name().to_string(),
            }),
        }
    }

    pub fn optional_string(&self, name: &str) -> Result<Option<String>, TaskError> {
        if self.get_input(name)?.is_unset() {
            return Ok(None);
        }
        self.get_string(name).map(Some)
    }

    pub fn set_output(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        if self.definition().output(&name).is_none() {
            self.log
                .warn(format!("Output '{}' is not declared by {}", name, self.task_type()));
        }
        self.outputs.insert(name, value.into());
    }

    pub fn inputs(&self) -> &HashMap<String, Value> {
        &self.inputs
    }

    pub fn outputs(&self) -> &HashMap<String, Value> {
        &self.outputs
    }

    /// Resolve the credential referenced by a `Credential` input.
    pub async fn credential(&self, input: &str) -> Result<CredentialValue, TaskError> {
        let declared = self.definition().input(input).map(|i| i.param_type);
        if declared != Some(ParamType::Credential) {
            return Err(TaskError::Configuration(format!(
                "'{}' is not a credential input",
                input
            )));
        }
        let credential_id = self.get_string(input)?;
        self.services
            .credentials
            .get_credential_value(&credential_id, self.user_id)
            .await
            .map_err(|e| TaskError::ExecutionFailed(e.to_string()))?
            .ok_or(TaskError::CredentialNotFound(credential_id))
    }

    /// Launch a browser page owned by this run and return its handle.
    pub async fn open_browser(&mut self) -> Result<Value, TaskError> {
        let session = self.services.browser.launch().await?;
        let handle = self.resources.insert_browser(session);
        Ok(Value::Handle(handle))
    }

    /// The browser page referenced by a `BrowserInstance` input.
    pub fn browser(&mut self, input: &str) -> Result<&mut Box<dyn BrowserSession>, TaskError> {
        let value = self.get_input(input)?;
        self.page(&value)
    }

    /// The browser page behind a handle value.
    pub fn page(&mut self, handle: &Value) -> Result<&mut Box<dyn BrowserSession>, TaskError> {
        let handle = handle.as_handle().ok_or_else(|| TaskError::InvalidInputType {
            field: WEB_PAGE.to_string(),
            expected: "handle".to_string(),
            actual: handle.type_name().to_string(),
        })?;
        self.resources
            .browser_mut(handle)
            .ok_or_else(|| TaskError::ResourceNotFound(handle.to_string()))
    }

    pub fn database(&self) -> Option<Arc<dyn DatabaseConnector>> {
        self.services.database.clone()
    }

    /// Hand back what the phase produced.
    pub fn finish(self) -> (HashMap<String, Value>, HashMap<String, Value>, Vec<LogLine>) {
        (self.inputs, self.outputs, self.log.into_lines())
    }
}
