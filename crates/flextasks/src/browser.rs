//! Browser-driven tasks and the default, HTTP-backed browser.
//!
//! [`HttpBrowser`] fetches documents with reqwest and does not run scripts,
//! so it can read pages but cannot type into or click on them. A scripted
//! backend can be plugged in through [`BrowserLauncher`].

use crate::html;
use async_trait::async_trait;
use flexcore::{
    BrowserLauncher, BrowserSession, TaskEnvironment, TaskError, TaskExecutor, TaskType, WEB_PAGE,
};

/// Launches static page sessions
pub struct HttpBrowser {
    client: reqwest::Client,
}

impl HttpBrowser {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BrowserLauncher for HttpBrowser {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, TaskError> {
        Ok(Box::new(StaticPage {
            client: self.client.clone(),
            url: None,
            html: String::new(),
        }))
    }
}

pub struct StaticPage {
    client: reqwest::Client,
    url: Option<String>,
    html: String,
}

#[async_trait]
impl BrowserSession for StaticPage {
    async fn goto(&mut self, url: &str) -> Result<(), TaskError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| TaskError::ExecutionFailed(format!("Failed to load {}: {}", url, e)))?;
        self.html = response
            .text()
            .await
            .map_err(|e| TaskError::ExecutionFailed(format!("Failed to read {}: {}", url, e)))?;
        self.url = Some(url.to_string());
        Ok(())
    }

    async fn content(&mut self) -> Result<String, TaskError> {
        match self.url {
            Some(_) => Ok(self.html.clone()),
            None => Err(TaskError::ExecutionFailed("no page loaded".to_string())),
        }
    }

    async fn fill(&mut self, selector: &str, _value: &str) -> Result<(), TaskError> {
        Err(TaskError::Unsupported(format!(
            "cannot fill '{}' on a static page",
            selector
        )))
    }

    async fn click(&mut self, selector: &str) -> Result<(), TaskError> {
        Err(TaskError::Unsupported(format!(
            "cannot click '{}' on a static page",
            selector
        )))
    }

    async fn wait_for(&mut self, selector: &str, visible: bool) -> Result<(), TaskError> {
        // A static document never changes, so one look is final.
        if html::contains(&self.html, selector)? == visible {
            Ok(())
        } else {
            Err(TaskError::ExecutionFailed(format!(
                "element '{}' never became {}",
                selector,
                if visible { "visible" } else { "hidden" }
            )))
        }
    }

    async fn close(&mut self) -> Result<(), TaskError> {
        self.url = None;
        self.html.clear();
        Ok(())
    }
}

pub struct LaunchBrowserExecutor;

#[async_trait]
impl TaskExecutor for LaunchBrowserExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::LaunchBrowser
    }

    async fn execute(&self, env: &mut TaskEnvironment<'_>) -> Result<bool, TaskError> {
        let url = env.get_string("Website Url")?;
        let page = env.open_browser().await?;
        env.log.info("Browser started successfully");
        // The session is already owned by the run, so a failed load still
        // gets closed with the rest of the run's resources.
        env.page(&page)?.goto(&url).await?;
        env.log.info(format!("Opened page at: {}", url));
        env.set_output(WEB_PAGE, page);
        Ok(true)
    }
}

pub struct NavigateUrlExecutor;

#[async_trait]
impl TaskExecutor for NavigateUrlExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::NavigateUrl
    }

    async fn execute(&self, env: &mut TaskEnvironment<'_>) -> Result<bool, TaskError> {
        let url = env.get_string("URL")?;
        env.browser(WEB_PAGE)?.goto(&url).await?;
        env.log.info(format!("Visited {}", url));
        forward_page(env)?;
        Ok(true)
    }
}

pub struct PageToHtmlExecutor;

#[async_trait]
impl TaskExecutor for PageToHtmlExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::PageToHtml
    }

    async fn execute(&self, env: &mut TaskEnvironment<'_>) -> Result<bool, TaskError> {
        let html = env.browser(WEB_PAGE)?.content().await?;
        env.log.info(format!("Read {} bytes of html", html.len()));
        env.set_output("Html", html);
        forward_page(env)?;
        Ok(true)
    }
}

pub struct FillInputExecutor;

#[async_trait]
impl TaskExecutor for FillInputExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::FillInput
    }

    async fn execute(&self, env: &mut TaskEnvironment<'_>) -> Result<bool, TaskError> {
        let selector = env.get_string("Selector")?;
        let value = env.get_string("Value")?;
        env.browser(WEB_PAGE)?.fill(&selector, &value).await?;
        env.log.info(format!("Filled {}", selector));
        forward_page(env)?;
        Ok(true)
    }
}

pub struct ClickElementExecutor;

#[async_trait]
impl TaskExecutor for ClickElementExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::ClickElement
    }

    async fn execute(&self, env: &mut TaskEnvironment<'_>) -> Result<bool, TaskError> {
        let selector = env.get_string("Selector")?;
        env.browser(WEB_PAGE)?.click(&selector).await?;
        env.log.info(format!("Clicked {}", selector));
        forward_page(env)?;
        Ok(true)
    }
}

pub struct WaitForElementExecutor;

#[async_trait]
impl TaskExecutor for WaitForElementExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::WaitForElement
    }

    async fn execute(&self, env: &mut TaskEnvironment<'_>) -> Result<bool, TaskError> {
        let selector = env.get_string("Selector")?;
        let visible = match env.get_string("Visibility")?.to_lowercase().as_str() {
            "visible" => true,
            "hidden" => false,
            other => {
                env.log.error(format!("Visibility must be 'visible' or 'hidden', got '{}'", other));
                return Ok(false);
            }
        };
        env.browser(WEB_PAGE)?.wait_for(&selector, visible).await?;
        env.log.info(format!(
            "Element {} became {}",
            selector,
            if visible { "visible" } else { "hidden" }
        ));
        forward_page(env)?;
        Ok(true)
    }
}

/// Browser tasks hand the page they worked on to the next phase.
fn forward_page(env: &mut TaskEnvironment<'_>) -> Result<(), TaskError> {
    let page = env.get_input(WEB_PAGE)?;
    env.set_output(WEB_PAGE, page);
    Ok(())
}
