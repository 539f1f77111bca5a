use async_trait::async_trait;
use flexcore::{TaskEnvironment, TaskError, TaskExecutor, TaskType, Value};
use serde_json::json;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Chat-completions endpoint used for AI extraction
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl AiConfig {
    /// Reads `WORKFLEX_AI_BASE_URL` and `WORKFLEX_AI_MODEL`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("WORKFLEX_AI_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("WORKFLEX_AI_MODEL").unwrap_or(defaults.model),
        }
    }
}

pub struct ExtractDataWithAiExecutor {
    client: reqwest::Client,
    config: AiConfig,
}

impl ExtractDataWithAiExecutor {
    pub fn new(client: reqwest::Client, config: AiConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl TaskExecutor for ExtractDataWithAiExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::ExtractDataWithAi
    }

    async fn execute(&self, env: &mut TaskEnvironment<'_>) -> Result<bool, TaskError> {
        let content = env.get_string("Content")?;
        let prompt = env.get_string("Prompt")?;
        let credential = env.credential("Credentials").await?;

        let api_key = match credential.get("apiKey").or_else(|| credential.get("api_key")) {
            Some(key) => key.clone(),
            None => {
                env.log.error("Credential has no 'apiKey' entry");
                return Ok(false);
            }
        };

        let body = json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a webscraper helper that extracts data from HTML or text. \
                                Answer with JSON only, without any extra text.",
                },
                { "role": "user", "content": content },
                { "role": "user", "content": prompt },
            ],
            "temperature": 1,
        });

        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| TaskError::ExecutionFailed(format!("AI request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            env.log.error(format!("AI provider returned {}: {}", status, text));
            return Ok(false);
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| TaskError::ExecutionFailed(format!("Invalid AI response: {}", e)))?;

        if let Some(usage) = payload.get("usage") {
            env.log.info(format!("Token usage: {}", usage));
        }

        match payload["choices"][0]["message"]["content"].as_str() {
            Some(answer) => {
                env.set_output("Extracted data", Value::String(answer.to_string()));
                Ok(true)
            }
            None => {
                env.log.error("AI response had no message content");
                Ok(false)
            }
        }
    }
}
