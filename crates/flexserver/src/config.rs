use anyhow::Context;
use flexcore::{CredentialValue, MemoryCredentials};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:3000";
const DEFAULT_CRON_INTERVAL_SECS: u64 = 60;

/// Server settings read from the environment
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
    /// Bearer secret for the webhook trigger; unset rejects every call.
    pub api_secret: String,
    pub cron_interval: Duration,
    /// JSON file of `{userId: {credentialId: {key: value}}}`
    pub credentials_file: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            api_secret: String::new(),
            cron_interval: Duration::from_secs(DEFAULT_CRON_INTERVAL_SECS),
            credentials_file: None,
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let cron_interval = match std::env::var("WORKFLEX_CRON_INTERVAL_SECS") {
            Ok(raw) => Duration::from_secs(
                raw.parse().with_context(|| {
                    format!("WORKFLEX_CRON_INTERVAL_SECS is not a number: {}", raw)
                })?,
            ),
            Err(_) => defaults.cron_interval,
        };

        Ok(Self {
            bind_address: std::env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            api_secret: std::env::var("WORKFLEX_API_SECRET").unwrap_or_default(),
            cron_interval,
            credentials_file: std::env::var_os("WORKFLEX_CREDENTIALS_FILE").map(PathBuf::from),
        })
    }

    /// Credential store seeded from `credentials_file`, if one is set.
    pub async fn load_credentials(&self) -> anyhow::Result<MemoryCredentials> {
        let credentials = MemoryCredentials::new();
        let Some(path) = &self.credentials_file else {
            return Ok(credentials);
        };

        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let users: HashMap<String, HashMap<String, CredentialValue>> =
            serde_json::from_str(&raw)
                .with_context(|| format!("invalid credentials in {}", path.display()))?;

        let mut count = 0;
        for (user_id, entries) in users {
            for (credential_id, value) in entries {
                credentials.insert(user_id.clone(), credential_id, value).await;
                count += 1;
            }
        }
        tracing::info!("Loaded {} credentials from {}", count, path.display());
        Ok(credentials)
    }
}
