use flexcore::{TaskDefinition, TaskExecutor, TaskType};
use std::collections::HashMap;
use std::sync::Arc;

/// Executors by task type, plus read-only access to the static catalog
pub struct TaskRegistry {
    executors: HashMap<TaskType, Arc<dyn TaskExecutor>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self {
            executors: HashMap::new(),
        }
    }

    /// Register an executor, replacing any previous one for its task type
    pub fn register(&mut self, executor: Arc<dyn TaskExecutor>) {
        let task_type = executor.task_type();
        tracing::info!("Registering task executor: {}", task_type);
        self.executors.insert(task_type, executor);
    }

    pub fn executor(&self, task_type: TaskType) -> Option<Arc<dyn TaskExecutor>> {
        self.executors.get(&task_type).cloned()
    }

    /// Catalog lookup by wire name
    pub fn lookup(&self, task_type: &str) -> Option<&'static TaskDefinition> {
        task_type.parse::<TaskType>().ok().map(|t| t.definition())
    }

    pub fn definitions(&self) -> Vec<&'static TaskDefinition> {
        TaskType::ALL.iter().map(|t| t.definition()).collect()
    }

    /// Task types in the catalog that have no executor registered
    pub fn missing_executors(&self) -> Vec<TaskType> {
        TaskType::ALL
            .iter()
            .copied()
            .filter(|t| !self.executors.contains_key(t))
            .collect()
    }
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_catalog_entries_by_wire_name() {
        let registry = TaskRegistry::new();

        let definition = registry.lookup("LAUNCH_BROWSER").unwrap();
        assert_eq!(definition.task_type, TaskType::LaunchBrowser);
        assert!(definition.is_entry_point);

        let definition = registry.lookup("HTTP_REQUEST").unwrap();
        assert_eq!(definition.task_type, TaskType::HttpRequest);
    }

    #[test]
    fn lookup_rejects_unknown_names() {
        let registry = TaskRegistry::new();
        assert!(registry.lookup("NOPE").is_none());
        assert!(registry.lookup("launch_browser").is_none());
        assert!(registry.lookup("").is_none());
    }

    #[test]
    fn catalog_does_not_depend_on_registered_executors() {
        let registry = TaskRegistry::new();
        assert_eq!(registry.definitions().len(), TaskType::ALL.len());
        assert_eq!(registry.missing_executors().len(), TaskType::ALL.len());
    }
}
