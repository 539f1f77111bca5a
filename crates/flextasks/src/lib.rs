//! Standard task library
//!
//! One executor per [`TaskType`]. [`register_all`] wires every one of them
//! into a [`TaskRegistry`].

mod ai;
mod browser;
mod database;
mod html;
mod http;
mod transform;

pub use ai::{AiConfig, ExtractDataWithAiExecutor};
pub use browser::{
    ClickElementExecutor, FillInputExecutor, HttpBrowser, LaunchBrowserExecutor,
    NavigateUrlExecutor, PageToHtmlExecutor, StaticPage, WaitForElementExecutor,
};
pub use database::DatabaseQueryExecutor;
pub use http::{DeliverViaWebhookExecutor, HttpRequestExecutor};
pub use transform::{
    AddPropertyToJsonExecutor, ExtractTextFromElementExecutor, ReadPropertyFromJsonExecutor,
};

use flexcore::{CredentialResolver, RunServices, TaskExecutor, TaskType};
use flexruntime::TaskRegistry;
use std::sync::Arc;

/// Settings shared by the network-facing executors
#[derive(Debug, Clone, Default)]
pub struct TaskConfig {
    pub client: reqwest::Client,
    pub ai: AiConfig,
}

impl TaskConfig {
    pub fn from_env() -> Self {
        Self {
            client: reqwest::Client::new(),
            ai: AiConfig::from_env(),
        }
    }
}

/// The standard executor for a task type.
pub fn executor_for(task_type: TaskType, config: &TaskConfig) -> Arc<dyn TaskExecutor> {
    match task_type {
        TaskType::LaunchBrowser => Arc::new(LaunchBrowserExecutor),
        TaskType::NavigateUrl => Arc::new(NavigateUrlExecutor),
        TaskType::PageToHtml => Arc::new(PageToHtmlExecutor),
        TaskType::ExtractTextFromElement => Arc::new(ExtractTextFromElementExecutor),
        TaskType::FillInput => Arc::new(FillInputExecutor),
        TaskType::ClickElement => Arc::new(ClickElementExecutor),
        TaskType::WaitForElement => Arc::new(WaitForElementExecutor),
        TaskType::HttpRequest => Arc::new(HttpRequestExecutor::new(config.client.clone())),
        TaskType::DeliverViaWebhook => {
            Arc::new(DeliverViaWebhookExecutor::new(config.client.clone()))
        }
        TaskType::ReadPropertyFromJson => Arc::new(ReadPropertyFromJsonExecutor),
        TaskType::AddPropertyToJson => Arc::new(AddPropertyToJsonExecutor),
        TaskType::ExtractDataWithAi => Arc::new(ExtractDataWithAiExecutor::new(
            config.client.clone(),
            config.ai.clone(),
        )),
        TaskType::DatabaseQuery => Arc::new(DatabaseQueryExecutor),
    }
}

/// Register all standard executors with a registry
pub fn register_all(registry: &mut TaskRegistry, config: &TaskConfig) {
    for task_type in TaskType::ALL {
        registry.register(executor_for(task_type, config));
    }
}

/// Run services backed by the HTTP browser.
pub fn standard_services(
    config: &TaskConfig,
    credentials: Arc<dyn CredentialResolver>,
) -> RunServices {
    RunServices::new(credentials, Arc::new(HttpBrowser::new(config.client.clone())))
}
