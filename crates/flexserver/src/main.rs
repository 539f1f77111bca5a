mod config;

use actix_cors::Cors;
use actix_web::{
    get, http::header, post, put, web, App, HttpRequest, HttpResponse, HttpServer, Responder,
    Result as ActixResult,
};
use actix_ws::Message;
use chrono::Utc;
use config::ServerConfig;
use flexcore::{ExecutionId, FlowError, StoreError, WorkflowDefinition, WorkflowId};
use flexruntime::{
    verify_bearer, CronScheduler, FlowRuntime, RunRequest, RuntimeConfig, TaskRegistry,
};
use flextasks::TaskConfig;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
struct AppState {
    runtime: Arc<FlowRuntime>,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateWorkflowRequest {
    user_id: String,
    name: String,
    #[serde(default)]
    definition: WorkflowDefinition,
}

#[derive(Debug, Deserialize)]
struct ScheduleRequest {
    cron: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunWorkflowRequest {
    user_id: String,
    #[serde(default)]
    definition: Option<WorkflowDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookRequest {
    workflow_id: WorkflowId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsQuery {
    execution_id: Option<ExecutionId>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunResponse {
    execution_id: ExecutionId,
}

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(e: FlowError) -> HttpResponse {
    let body = ErrorResponse {
        error: e.to_string(),
    };
    match e {
        FlowError::Plan(_) | FlowError::InvalidSchedule { .. } => {
            HttpResponse::BadRequest().json(body)
        }
        FlowError::Store(StoreError::Unavailable(_)) => {
            error!("Store unavailable: {}", body.error);
            HttpResponse::ServiceUnavailable().json(body)
        }
        FlowError::Store(_) => HttpResponse::NotFound().json(body),
        FlowError::InvalidState(_) => HttpResponse::Conflict().json(body),
        _ => {
            error!("Request failed: {}", body.error);
            HttpResponse::InternalServerError().json(body)
        }
    }
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "workflex"
    }))
}

/// Task catalog with inputs, outputs and credit cost
#[get("/api/tasks")]
async fn list_tasks(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    Ok(HttpResponse::Ok().json(data.runtime.registry().definitions()))
}

#[get("/api/workflows")]
async fn list_workflows(data: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let workflows = match data.runtime.list_workflows().await {
        Ok(workflows) => workflows,
        Err(e) => return Ok(error_response(e)),
    };
    let summaries: Vec<_> = workflows
        .iter()
        .map(|w| {
            serde_json::json!({
                "id": w.id,
                "userId": w.user_id,
                "name": w.name,
                "status": w.status,
                "nodes": w.definition.nodes.len(),
                "edges": w.definition.edges.len(),
                "cron": w.cron,
                "lastRunStatus": w.last_run_status,
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(summaries))
}

#[post("/api/workflows")]
async fn create_workflow(
    data: web::Data<AppState>,
    req: web::Json<CreateWorkflowRequest>,
) -> ActixResult<HttpResponse> {
    let req = req.into_inner();
    match data
        .runtime
        .create_workflow(req.user_id, req.name, req.definition)
        .await
    {
        Ok(workflow) => Ok(HttpResponse::Created().json(workflow)),
        Err(e) => Ok(error_response(e)),
    }
}

/// Run one scheduler tick and report which executions it started
#[get("/api/workflows/cron")]
async fn cron_tick(data: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let scheduler = CronScheduler::new(data.runtime.clone());
    match scheduler.tick(Utc::now()).await {
        Ok(started) => Ok(HttpResponse::Ok().json(serde_json::json!({ "executionIds": started }))),
        Err(e) => Ok(error_response(e)),
    }
}

/// Webhook trigger authenticated with the shared bearer secret
#[post("/api/workflows/execute")]
async fn webhook_execute(
    data: web::Data<AppState>,
    http: HttpRequest,
    req: web::Json<WebhookRequest>,
) -> ActixResult<HttpResponse> {
    let authorization = http
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());

    if !verify_bearer(authorization, &data.api_secret) {
        warn!("Rejected webhook trigger for workflow {}", req.workflow_id);
        return Ok(HttpResponse::Unauthorized().json(ErrorResponse {
            error: "invalid secret".to_string(),
        }));
    }

    match data.runtime.run_workflow(RunRequest::webhook(req.workflow_id)).await {
        Ok(handle) => Ok(HttpResponse::Accepted().json(RunResponse {
            execution_id: handle.execution_id,
        })),
        Err(e) => Ok(error_response(e)),
    }
}

#[get("/api/workflows/{id}")]
async fn get_workflow(
    data: web::Data<AppState>,
    path: web::Path<WorkflowId>,
) -> ActixResult<HttpResponse> {
    match data.runtime.get_workflow(path.into_inner()).await {
        Ok(workflow) => Ok(HttpResponse::Ok().json(workflow)),
        Err(e) => Ok(error_response(e)),
    }
}

#[actix_web::delete("/api/workflows/{id}")]
async fn delete_workflow(
    data: web::Data<AppState>,
    path: web::Path<WorkflowId>,
) -> ActixResult<HttpResponse> {
    match data.runtime.delete_workflow(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::NoContent().finish()),
        Err(e) => Ok(error_response(e)),
    }
}

#[put("/api/workflows/{id}/definition")]
async fn update_definition(
    data: web::Data<AppState>,
    path: web::Path<WorkflowId>,
    definition: web::Json<WorkflowDefinition>,
) -> ActixResult<HttpResponse> {
    match data
        .runtime
        .update_definition(path.into_inner(), definition.into_inner())
        .await
    {
        Ok(workflow) => Ok(HttpResponse::Ok().json(workflow)),
        Err(e) => Ok(error_response(e)),
    }
}

#[post("/api/workflows/{id}/publish")]
async fn publish_workflow(
    data: web::Data<AppState>,
    path: web::Path<WorkflowId>,
) -> ActixResult<HttpResponse> {
    match data.runtime.publish_workflow(path.into_inner()).await {
        Ok(workflow) => Ok(HttpResponse::Ok().json(workflow)),
        Err(e) => Ok(error_response(e)),
    }
}

#[post("/api/workflows/{id}/unpublish")]
async fn unpublish_workflow(
    data: web::Data<AppState>,
    path: web::Path<WorkflowId>,
) -> ActixResult<HttpResponse> {
    match data.runtime.unpublish_workflow(path.into_inner()).await {
        Ok(workflow) => Ok(HttpResponse::Ok().json(workflow)),
        Err(e) => Ok(error_response(e)),
    }
}

#[put("/api/workflows/{id}/schedule")]
async fn set_schedule(
    data: web::Data<AppState>,
    path: web::Path<WorkflowId>,
    req: web::Json<ScheduleRequest>,
) -> ActixResult<HttpResponse> {
    let cron = req.into_inner().cron.filter(|c| !c.trim().is_empty());
    match data
        .runtime
        .set_schedule(path.into_inner(), cron, Utc::now())
        .await
    {
        Ok(workflow) => Ok(HttpResponse::Ok().json(workflow)),
        Err(e) => Ok(error_response(e)),
    }
}

/// Manual run; returns once the execution exists, the run continues in the background
#[post("/api/workflows/{id}/run")]
async fn run_workflow(
    data: web::Data<AppState>,
    path: web::Path<WorkflowId>,
    req: web::Json<RunWorkflowRequest>,
) -> ActixResult<HttpResponse> {
    let workflow_id = path.into_inner();
    let req = req.into_inner();

    let mut request = RunRequest::manual(workflow_id, req.user_id);
    if let Some(definition) = req.definition {
        request = request.with_definition(definition);
    }

    match data.runtime.run_workflow(request).await {
        Ok(handle) => {
            info!("Started execution {} of workflow {}", handle.execution_id, workflow_id);
            Ok(HttpResponse::Accepted().json(RunResponse {
                execution_id: handle.execution_id,
            }))
        }
        Err(e) => Ok(error_response(e)),
    }
}

/// Execution record with its phases and their logs
#[get("/api/executions/{id}")]
async fn get_execution(
    data: web::Data<AppState>,
    path: web::Path<ExecutionId>,
) -> ActixResult<HttpResponse> {
    let execution_id = path.into_inner();
    let execution = match data.runtime.execution(execution_id).await {
        Ok(execution) => execution,
        Err(e) => return Ok(error_response(e)),
    };
    let phases = match data.runtime.phases(execution_id).await {
        Ok(phases) => phases,
        Err(e) => return Ok(error_response(e)),
    };

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "execution": execution,
        "phases": phases,
    })))
}

/// WebSocket endpoint for real-time events
#[get("/api/events")]
async fn websocket_events(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<EventsQuery>,
    data: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;
    let only = query.execution_id;

    info!("WebSocket client connected");

    let mut events = data.runtime.subscribe_events();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            if only.is_some_and(|id| id != event.execution_id()) {
                                continue;
                            }
                            if let Ok(json) = serde_json::to_string(&event) {
                                if session.text(json).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(RecvError::Lagged(skipped)) => {
                            warn!("WebSocket client lagged, {} events dropped", skipped);
                        }
                        Err(RecvError::Closed) => break,
                    }
                }

                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }

                else => break,
            }
        }

        info!("WebSocket client disconnected");
        let _ = session.close(None).await;
    });

    Ok(res)
}

/// Route table; `cron` and `execute` come before `{id}` so they are not
/// captured as workflow ids.
fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(list_tasks)
        .service(list_workflows)
        .service(create_workflow)
        .service(cron_tick)
        .service(webhook_execute)
        .service(get_workflow)
        .service(delete_workflow)
        .service(update_definition)
        .service(publish_workflow)
        .service(unpublish_workflow)
        .service(set_schedule)
        .service(run_workflow)
        .service(get_execution)
        .service(websocket_events);
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🚀 Starting WorkFlex server");

    let config = ServerConfig::from_env()?;
    if config.api_secret.is_empty() {
        warn!("WORKFLEX_API_SECRET is not set; webhook triggers will be rejected");
    }

    let task_config = TaskConfig::from_env();
    let mut registry = TaskRegistry::new();
    flextasks::register_all(&mut registry, &task_config);

    let credentials = config.load_credentials().await?;
    let services = flextasks::standard_services(&task_config, Arc::new(credentials));
    let runtime = Arc::new(FlowRuntime::new(registry, services, RuntimeConfig::from_env()));

    info!("✅ Runtime initialized with {} task types", runtime.registry().definitions().len());

    let scheduler = CronScheduler::new(runtime.clone());
    actix_web::rt::spawn(scheduler.run_forever(config.cron_interval));
    info!("⏰ Cron scheduler ticking every {:?}", config.cron_interval);

    let app_state = web::Data::new(AppState {
        runtime,
        api_secret: config.api_secret.clone(),
    });

    info!("🌐 Server starting on http://{}", config.bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .configure(routes)
    })
    .bind(&config.bind_address)?
    .run()
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test};
    use flexcore::{FlowNode, RunServices, Workflow};

    fn state(secret: &str) -> web::Data<AppState> {
        let mut registry = TaskRegistry::new();
        flextasks::register_all(&mut registry, &TaskConfig::default());
        let runtime = FlowRuntime::new(registry, RunServices::default(), RuntimeConfig::default());
        web::Data::new(AppState {
            runtime: Arc::new(runtime),
            api_secret: secret.to_string(),
        })
    }

    fn json_graph() -> WorkflowDefinition {
        let mut definition = WorkflowDefinition::new();
        definition.add_node(
            FlowNode::new("fetch", "HTTP_REQUEST").with_input("Url", "http://127.0.0.1:1/"),
        );
        definition.add_node(
            FlowNode::new("read", "READ_PROPERTY_FROM_JSON").with_input("Property name", "id"),
        );
        definition.connect("fetch", "Response body", "read", "JSON");
        definition
    }

    async fn create(data: &web::Data<AppState>, definition: WorkflowDefinition) -> Workflow {
        data.runtime
            .create_workflow("alice", "demo", definition)
            .await
            .unwrap()
    }

    #[actix_web::test]
    async fn health_reports_service() {
        let app = test::init_service(App::new().app_data(state("s")).configure(routes)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["service"], "workflex");
    }

    #[actix_web::test]
    async fn task_catalog_lists_every_type() {
        let app = test::init_service(App::new().app_data(state("s")).configure(routes)).await;
        let req = test::TestRequest::get().uri("/api/tasks").to_request();
        let body: Vec<serde_json::Value> = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.len(), flexcore::TaskType::ALL.len());
    }

    #[actix_web::test]
    async fn run_accepts_valid_graph() {
        let data = state("s");
        let workflow = create(&data, json_graph()).await;
        let app = test::init_service(App::new().app_data(data).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/workflows/{}/run", workflow.id))
            .set_json(serde_json::json!({ "userId": "alice" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["executionId"].is_string());
    }

    #[actix_web::test]
    async fn run_rejects_invalid_plan() {
        let data = state("s");
        let mut definition = WorkflowDefinition::new();
        definition.add_node(FlowNode::new("read", "READ_PROPERTY_FROM_JSON"));
        let workflow = create(&data, definition).await;
        let app = test::init_service(App::new().app_data(data).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/workflows/{}/run", workflow.id))
            .set_json(serde_json::json!({ "userId": "alice" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "plan invalid: no entry point found");
    }

    #[actix_web::test]
    async fn run_by_other_user_is_not_found() {
        let data = state("s");
        let workflow = create(&data, json_graph()).await;
        let app = test::init_service(App::new().app_data(data).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/workflows/{}/run", workflow.id))
            .set_json(serde_json::json!({ "userId": "mallory" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn webhook_requires_secret() {
        let data = state("topsecret");
        let workflow = create(&data, json_graph()).await;
        let app = test::init_service(App::new().app_data(data).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri("/api/workflows/execute")
            .insert_header((header::AUTHORIZATION, "Bearer wrong"))
            .set_json(serde_json::json!({ "workflowId": workflow.id }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::post()
            .uri("/api/workflows/execute")
            .insert_header((header::AUTHORIZATION, "Bearer topsecret"))
            .set_json(serde_json::json!({ "workflowId": workflow.id }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::ACCEPTED);
    }

    #[actix_web::test]
    async fn published_workflow_cannot_be_edited() {
        let data = state("s");
        let workflow = create(&data, json_graph()).await;
        let app = test::init_service(App::new().app_data(data).configure(routes)).await;

        let req = test::TestRequest::post()
            .uri(&format!("/api/workflows/{}/publish", workflow.id))
            .to_request();
        let published: Workflow = test::call_and_read_body_json(&app, req).await;
        assert_eq!(published.credits_cost, Some(3));

        let req = test::TestRequest::put()
            .uri(&format!("/api/workflows/{}/definition", workflow.id))
            .set_json(json_graph())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }

    #[actix_web::test]
    async fn invalid_cron_is_rejected() {
        let data = state("s");
        let workflow = create(&data, json_graph()).await;
        let app = test::init_service(App::new().app_data(data).configure(routes)).await;

        let req = test::TestRequest::put()
            .uri(&format!("/api/workflows/{}/schedule", workflow.id))
            .set_json(serde_json::json!({ "cron": "not a cron" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn unknown_execution_is_not_found() {
        let app = test::init_service(App::new().app_data(state("s")).configure(routes)).await;
        let req = test::TestRequest::get()
            .uri(&format!("/api/executions/{}", uuid::Uuid::new_v4()))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
