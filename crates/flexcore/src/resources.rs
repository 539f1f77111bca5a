//! Capabilities a run can reach beyond its own inputs.
//!
//! [`RunServices`] holds the process-wide adapters (credentials, browser
//! launcher, database connector) and is shared read-only by every run.
//! [`RunResources`] holds what a single run acquires along the way, such as
//! open browser pages, and is released by the orchestrator when the run
//! reaches a terminal state.

use crate::{StoreError, TaskError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Decrypted key/value pairs of a stored credential.
pub type CredentialValue = HashMap<String, String>;

#[async_trait]
pub trait CredentialResolver: Send + Sync {
    /// `Ok(None)` means the credential does not exist or is not owned by
    /// `user_id`.
    async fn get_credential_value(
        &self,
        credential_id: &str,
        user_id: &str,
    ) -> Result<Option<CredentialValue>, StoreError>;
}

/// One open page of a browser.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn goto(&mut self, url: &str) -> Result<(), TaskError>;

    async fn content(&mut self) -> Result<String, TaskError>;

    async fn fill(&mut self, selector: &str, value: &str) -> Result<(), TaskError>;

    async fn click(&mut self, selector: &str) -> Result<(), TaskError>;

    async fn wait_for(&mut self, selector: &str, visible: bool) -> Result<(), TaskError>;

    async fn close(&mut self) -> Result<(), TaskError>;
}

#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, TaskError>;
}

#[async_trait]
pub trait DatabaseConnector: Send + Sync {
    /// Run `query` with the connection settings of a resolved credential
    /// and return the rows as JSON.
    async fn query(
        &self,
        connection: &CredentialValue,
        query: &str,
    ) -> Result<serde_json::Value, TaskError>;
}

/// Launcher used when no browser backend is configured.
pub struct NoBrowser;

#[async_trait]
impl BrowserLauncher for NoBrowser {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, TaskError> {
        Err(TaskError::Configuration("no browser backend configured".to_string()))
    }
}

/// Credentials kept in memory, keyed by owner and id
#[derive(Default)]
pub struct MemoryCredentials {
    entries: RwLock<HashMap<(String, String), CredentialValue>>,
}

impl MemoryCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(
        &self,
        user_id: impl Into<String>,
        credential_id: impl Into<String>,
        value: CredentialValue,
    ) {
        self.entries
            .write()
            .await
            .insert((user_id.into(), credential_id.into()), value);
    }
}

#[async_trait]
impl CredentialResolver for MemoryCredentials {
    async fn get_credential_value(
        &self,
        credential_id: &str,
        user_id: &str,
    ) -> Result<Option<CredentialValue>, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(user_id.to_string(), credential_id.to_string()))
            .cloned())
    }
}

/// Shared adapters handed to every run
#[derive(Clone)]
pub struct RunServices {
    pub credentials: Arc<dyn CredentialResolver>,
    pub browser: Arc<dyn BrowserLauncher>,
    pub database: Option<Arc<dyn DatabaseConnector>>,
}

impl RunServices {
    pub fn new(
        credentials: Arc<dyn CredentialResolver>,
        browser: Arc<dyn BrowserLauncher>,
    ) -> Self {
        Self {
            credentials,
            browser,
            database: None,
        }
    }

    pub fn with_database(mut self, database: Arc<dyn DatabaseConnector>) -> Self {
        self.database = Some(database);
        self
    }
}

impl Default for RunServices {
    fn default() -> Self {
        Self::new(Arc::new(MemoryCredentials::new()), Arc::new(NoBrowser))
    }
}

/// Resources owned by exactly one run
#[derive(Default)]
pub struct RunResources {
    browsers: HashMap<String, Box<dyn BrowserSession>>,
}

impl RunResources {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a browser page and return the handle other phases refer to it by.
    pub fn insert_browser(&mut self, session: Box<dyn BrowserSession>) -> String {
        let handle = format!("browser-{}", Uuid::new_v4());
        self.browsers.insert(handle.clone(), session);
        handle
    }

    pub fn browser_mut(&mut self, handle: &str) -> Option<&mut Box<dyn BrowserSession>> {
        self.browsers.get_mut(handle)
    }

    /// Close every held resource. Close failures are logged and skipped.
    pub async fn release(&mut self) {
        for (handle, mut session) in self.browsers.drain() {
            if let Err(e) = session.close().await {
                tracing::warn!("Failed to close browser {}: {}", handle, e);
            }
        }
    }
}
