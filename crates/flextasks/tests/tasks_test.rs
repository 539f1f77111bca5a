// crates/flextasks/tests/tasks_test.rs

use async_trait::async_trait;
use flexcore::{
    CredentialValue, DatabaseConnector, EventBus, ExecutionId, FlowNode, LogLevel, LogLine,
    MemoryCredentials, PhaseId, PhaseLog, PlannedNode, RunResources, RunServices,
    TaskEnvironment, TaskError, TaskType, Value,
};
use flexruntime::TaskRegistry;
use flextasks::{executor_for, register_all, standard_services, TaskConfig};
use std::collections::HashMap;
use std::sync::Arc;

struct Outcome {
    result: Result<bool, TaskError>,
    outputs: HashMap<String, Value>,
    logs: Vec<LogLine>,
}

async fn run_task(node: FlowNode, services: RunServices) -> Outcome {
    let task_type = node.task_type.parse::<TaskType>().unwrap();
    let planned = PlannedNode { task_type, node };
    let executor = executor_for(task_type, &TaskConfig::default());

    let bus = EventBus::new(64);
    let log = PhaseLog::new(bus.create_emitter(ExecutionId::new_v4(), PhaseId::new_v4()));
    let mut resources = RunResources::new();
    let mut env = TaskEnvironment::new(
        &planned,
        "user-1",
        planned.node.inputs.clone(),
        log,
        &mut resources,
        &services,
    );

    let result = executor.execute(&mut env).await;
    let (_, outputs, logs) = env.finish();
    resources.release().await;
    Outcome { result, outputs, logs }
}

fn errors(logs: &[LogLine]) -> Vec<&str> {
    logs.iter()
        .filter(|l| l.level == LogLevel::Error)
        .map(|l| l.message.as_str())
        .collect()
}

#[test]
fn every_task_type_has_a_standard_executor() {
    let mut registry = TaskRegistry::new();
    register_all(&mut registry, &TaskConfig::default());

    assert!(registry.missing_executors().is_empty());
    for task_type in TaskType::ALL {
        assert_eq!(registry.executor(task_type).unwrap().task_type(), task_type);
    }
}

#[tokio::test]
async fn reads_json_property() {
    let node = FlowNode::new("read", "READ_PROPERTY_FROM_JSON")
        .with_input("JSON", r#"{"name":"flex","count":3}"#)
        .with_input("Property name", "count");

    let outcome = run_task(node, RunServices::default()).await;

    assert!(outcome.result.unwrap());
    assert_eq!(outcome.outputs["Property value"], Value::from("3"));
}

#[tokio::test]
async fn missing_json_property_fails_the_task() {
    let node = FlowNode::new("read", "READ_PROPERTY_FROM_JSON")
        .with_input("JSON", r#"{"name":"flex"}"#)
        .with_input("Property name", "absent");

    let outcome = run_task(node, RunServices::default()).await;

    assert!(!outcome.result.unwrap());
    assert_eq!(errors(&outcome.logs), vec!["Property not found: absent"]);
}

#[tokio::test]
async fn adds_json_property() {
    let node = FlowNode::new("add", "ADD_PROPERTY_TO_JSON")
        .with_input("JSON", r#"{"a":1}"#)
        .with_input("Property name", "b")
        .with_input("Property value", "two");

    let outcome = run_task(node, RunServices::default()).await;

    assert!(outcome.result.unwrap());
    let updated: serde_json::Value =
        serde_json::from_str(outcome.outputs["Updated JSON"].as_str().unwrap()).unwrap();
    assert_eq!(updated, serde_json::json!({"a": 1, "b": "two"}));
}

#[tokio::test]
async fn add_property_rejects_non_object() {
    let node = FlowNode::new("add", "ADD_PROPERTY_TO_JSON")
        .with_input("JSON", "[1, 2]")
        .with_input("Property name", "b")
        .with_input("Property value", "two");

    let outcome = run_task(node, RunServices::default()).await;

    assert!(!outcome.result.unwrap());
    assert!(outcome.outputs.is_empty());
}

#[tokio::test]
async fn extracts_text_from_element() {
    let node = FlowNode::new("extract", "EXTRACT_TEXT_FROM_ELEMENT")
        .with_input("Html", "<html><body><h1 class=\"title\"> Hello </h1></body></html>")
        .with_input("Selector", "h1.title");

    let outcome = run_task(node, RunServices::default()).await;

    assert!(outcome.result.unwrap());
    assert_eq!(outcome.outputs["Extracted text"], Value::from("Hello"));
}

#[tokio::test]
async fn missing_element_fails_the_task() {
    let node = FlowNode::new("extract", "EXTRACT_TEXT_FROM_ELEMENT")
        .with_input("Html", "<p>nothing here</p>")
        .with_input("Selector", "#price");

    let outcome = run_task(node, RunServices::default()).await;

    assert!(!outcome.result.unwrap());
    assert_eq!(errors(&outcome.logs), vec!["Element not found: #price"]);
}

#[tokio::test]
async fn invalid_selector_is_an_error() {
    let node = FlowNode::new("extract", "EXTRACT_TEXT_FROM_ELEMENT")
        .with_input("Html", "<p>x</p>")
        .with_input("Selector", "<<<");

    let outcome = run_task(node, RunServices::default()).await;

    assert!(outcome.result.is_err());
}

#[tokio::test]
async fn ai_extraction_needs_a_stored_credential() {
    let node = FlowNode::new("ai", "EXTRACT_DATA_WITH_AI")
        .with_input("Content", "<p>42</p>")
        .with_input("Credentials", "openai")
        .with_input("Prompt", "the number");

    let outcome = run_task(node, RunServices::default()).await;

    assert!(matches!(outcome.result, Err(TaskError::CredentialNotFound(id)) if id == "openai"));
}

struct FakeDatabase;

#[async_trait]
impl DatabaseConnector for FakeDatabase {
    async fn query(
        &self,
        connection: &CredentialValue,
        query: &str,
    ) -> Result<serde_json::Value, TaskError> {
        Ok(serde_json::json!([
            { "dsn": connection["dsn"], "query": query }
        ]))
    }
}

#[tokio::test]
async fn database_query_uses_connector_and_credential() {
    let credentials = MemoryCredentials::new();
    credentials
        .insert(
            "user-1",
            "warehouse",
            CredentialValue::from([("dsn".to_string(), "postgres://db".to_string())]),
        )
        .await;
    let services = RunServices::new(Arc::new(credentials), Arc::new(flexcore::NoBrowser))
        .with_database(Arc::new(FakeDatabase));

    let node = FlowNode::new("db", "DATABASE_QUERY")
        .with_input("Credentials", "warehouse")
        .with_input("Query", "select 1");

    let outcome = run_task(node, services).await;

    assert!(outcome.result.unwrap());
    assert_eq!(
        outcome.outputs["Rows"],
        Value::Json(serde_json::json!([{ "dsn": "postgres://db", "query": "select 1" }]))
    );
}

#[tokio::test]
async fn database_query_without_connector_fails() {
    let node = FlowNode::new("db", "DATABASE_QUERY")
        .with_input("Credentials", "warehouse")
        .with_input("Query", "select 1");

    let outcome = run_task(node, RunServices::default()).await;

    assert!(!outcome.result.unwrap());
    assert_eq!(errors(&outcome.logs), vec!["No database connector is configured"]);
}

#[tokio::test]
async fn unreachable_http_target_is_an_error() {
    let node = FlowNode::new("http", "HTTP_REQUEST").with_input("Url", "http://127.0.0.1:1/");

    let outcome = run_task(node, RunServices::default()).await;

    assert!(matches!(outcome.result, Err(TaskError::ExecutionFailed(_))));
}

#[tokio::test]
async fn unsupported_http_method_fails() {
    let node = FlowNode::new("http", "HTTP_REQUEST")
        .with_input("Url", "http://127.0.0.1:1/")
        .with_input("Method", "TRACE");

    let outcome = run_task(node, RunServices::default()).await;

    assert!(!outcome.result.unwrap());
    assert_eq!(errors(&outcome.logs), vec!["Unsupported method: TRACE"]);
}

#[tokio::test]
async fn http_browser_cannot_click() {
    let services = standard_services(&TaskConfig::default(), Arc::new(MemoryCredentials::new()));
    let mut session = services.browser.launch().await.unwrap();

    assert!(matches!(session.click("button").await, Err(TaskError::Unsupported(_))));
    assert!(session.content().await.is_err());
    session.close().await.unwrap();
}
