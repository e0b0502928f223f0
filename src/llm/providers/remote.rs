use crate::config::LlmConfig;
use crate::llm::{LlmError, SqlGenerator};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

pub const OPENAI_CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible chat completions endpoint.
pub struct RemoteLlmProvider {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct PromptRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
    temperature: f32,
    max_tokens: usize,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct PromptResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl RemoteLlmProvider {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let api_url = config
            .api_url
            .clone()
            .unwrap_or_else(|| OPENAI_CHAT_COMPLETIONS_URL.to_string());

        let api_key = config.api_key.clone().ok_or_else(|| {
            LlmError::ConfigError(
                "API key is required for remote LLM provider (set OPENAI_API_KEY)".to_string(),
            )
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl SqlGenerator for RemoteLlmProvider {
    async fn generate_sql(&self, prompt: &str) -> Result<String, LlmError> {
        let request = PromptRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!("Sending chat completion request to {} with model {}", self.api_url, self.model);

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::ConnectionError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("API responded with status code: {} - {}", status, body);
            let message = format!("API responded with status code: {}", status);
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                LlmError::RateLimited(message)
            } else {
                LlmError::ResponseError(message)
            });
        }

        let prompt_response: PromptResponse = response
            .json()
            .await
            .map_err(|e| LlmError::ResponseError(e.to_string()))?;

        prompt_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::ResponseError("No choices in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    async fn completions(headers: HeaderMap, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        let authorized = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer sk-test");
        if !authorized {
            return (StatusCode::UNAUTHORIZED, Json(json!({"error": "bad key"})));
        }

        let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
        if prompt.contains("rate limit me") {
            return (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({"error": {"type": "insufficient_quota"}})),
            );
        }

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 300);
        assert_eq!(body["messages"][0]["role"], "user");
        (
            StatusCode::OK,
            Json(json!({
                "choices": [{"message": {"role": "assistant", "content": "```sql\nSELECT 1\n```"}}]
            })),
        )
    }

    async fn stub_server() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().route("/v1/chat/completions", post(completions));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/v1/chat/completions", addr)
    }

    fn provider(api_url: String, api_key: &str) -> RemoteLlmProvider {
        RemoteLlmProvider::new(&LlmConfig {
            api_url: Some(api_url),
            api_key: Some(api_key.to_string()),
            ..LlmConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn api_key_is_required() {
        let err = RemoteLlmProvider::new(&LlmConfig::default()).err().unwrap();
        assert!(matches!(err, LlmError::ConfigError(_)));
    }

    #[tokio::test]
    async fn returns_first_choice_content() {
        let url = stub_server().await;
        let completion = provider(url, "sk-test").generate_sql("list customers").await.unwrap();
        assert_eq!(completion, "```sql\nSELECT 1\n```");
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limited() {
        let url = stub_server().await;
        let err = provider(url, "sk-test").generate_sql("rate limit me").await.unwrap_err();
        assert!(matches!(err, LlmError::RateLimited(_)));
    }

    #[tokio::test]
    async fn other_failures_are_response_errors() {
        let url = stub_server().await;
        let err = provider(url, "sk-wrong").generate_sql("list customers").await.unwrap_err();
        assert!(matches!(err, LlmError::ResponseError(msg) if msg.contains("401")));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_connection_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = provider(format!("http://{}/v1/chat/completions", addr), "sk-test")
            .generate_sql("list customers")
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ConnectionError(_)));
    }
}
