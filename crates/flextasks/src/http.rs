use async_trait::async_trait;
use flexcore::{TaskEnvironment, TaskError, TaskExecutor, TaskType};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

/// Call an HTTP API and expose status and body
pub struct HttpRequestExecutor {
    client: reqwest::Client,
}

impl HttpRequestExecutor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaskExecutor for HttpRequestExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::HttpRequest
    }

    async fn execute(&self, env: &mut TaskEnvironment<'_>) -> Result<bool, TaskError> {
        let url = env.get_string("Url")?;
        let method = env
            .optional_string("Method")?
            .unwrap_or_else(|| "GET".to_string())
            .to_uppercase();
        let body = env.optional_string("Body")?;

        env.log.info(format!("{} {}", method, url));

        let mut request = match method.as_str() {
            "GET" => self.client.get(&url),
            "POST" => self.client.post(&url),
            "PUT" => self.client.put(&url),
            "PATCH" => self.client.patch(&url),
            "DELETE" => self.client.delete(&url),
            _ => {
                env.log.error(format!("Unsupported method: {}", method));
                return Ok(false);
            }
        };

        if let Some(body) = body {
            request = with_body(request, body);
        }

        if env.optional_string("Credentials")?.is_some() {
            let credential = env.credential("Credentials").await?;
            match credential.get("token").or_else(|| credential.get("apiKey")) {
                Some(token) => request = request.header(AUTHORIZATION, format!("Bearer {}", token)),
                None => {
                    env.log.error("Credential has no 'token' or 'apiKey' entry");
                    return Ok(false);
                }
            }
        }

        let response = request
            .send()
            .await
            .map_err(|e| TaskError::ExecutionFailed(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| TaskError::ExecutionFailed(format!("Failed to read response: {}", e)))?;

        env.log.info(format!("Response status: {}", status.as_u16()));
        env.set_output("Status", status.as_u16() as f64);
        env.set_output("Response body", text);

        if !status.is_success() {
            env.log.error(format!("Request to {} failed with {}", url, status));
            return Ok(false);
        }
        Ok(true)
    }
}

/// POST a body to a target URL
pub struct DeliverViaWebhookExecutor {
    client: reqwest::Client,
}

impl DeliverViaWebhookExecutor {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TaskExecutor for DeliverViaWebhookExecutor {
    fn task_type(&self) -> TaskType {
        TaskType::DeliverViaWebhook
    }

    async fn execute(&self, env: &mut TaskEnvironment<'_>) -> Result<bool, TaskError> {
        let target = env.get_string("Target URL")?;
        let body = env.get_string("Body")?;

        let response = with_body(self.client.post(&target), body)
            .send()
            .await
            .map_err(|e| TaskError::ExecutionFailed(format!("Webhook delivery failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            env.log.error(format!("Webhook responded with {}", status));
            return Ok(false);
        }
        env.log.info(format!("Delivered to {} ({})", target, status.as_u16()));
        Ok(true)
    }
}

/// JSON bodies go out as JSON, anything else as plain text.
fn with_body(request: reqwest::RequestBuilder, body: String) -> reqwest::RequestBuilder {
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(json) => request.json(&json),
        Err(_) => request.header(CONTENT_TYPE, "text/plain").body(body),
    }
}
