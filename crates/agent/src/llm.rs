use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use crmpilot_core::config::{LlmConfig, LlmProvider};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const MAX_OUTPUT_TOKENS: u32 = 1024;

/// One instruction/command exchange with the intent service.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub instruction: String,
    pub command: String,
    pub temperature: f32,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ApiFormat {
    Anthropic,
    OpenAiCompatible,
}

/// Chat-completion client speaking either the Anthropic messages API or the
/// OpenAI-compatible chat completions API (OpenAI, Ollama).
pub struct HttpLlmClient {
    client: Client,
    format: ApiFormat,
    endpoint: String,
    model: String,
    api_key: Option<SecretString>,
}

impl HttpLlmClient {
    pub fn from_config(client: Client, config: &LlmConfig) -> Self {
        let base_url = config.effective_base_url();
        let base_url = base_url.trim_end_matches('/');
        let (format, endpoint) = match config.provider {
            LlmProvider::Anthropic => (ApiFormat::Anthropic, format!("{base_url}/v1/messages")),
            LlmProvider::OpenAi | LlmProvider::Ollama => {
                (ApiFormat::OpenAiCompatible, format!("{base_url}/chat/completions"))
            }
        };
        Self { client, format, endpoint, model: config.model.clone(), api_key: config.api_key.clone() }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn complete_anthropic(&self, request: &CompletionRequest) -> Result<String> {
        let body = AnthropicRequest {
            model: &self.model,
            max_tokens: MAX_OUTPUT_TOKENS,
            temperature: request.temperature,
            system: &request.instruction,
            messages: vec![Message { role: "user", content: &request.command }],
        };

        let mut builder = self
            .client
            .post(&self.endpoint)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.header("x-api-key", key.expose_secret());
        }

        let response = builder.send().await.context("intent service request failed")?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("intent service returned HTTP {}: {error_text}", status.as_u16()));
        }

        let completion: AnthropicResponse =
            response.json().await.context("intent service response was not valid JSON")?;
        completion
            .content
            .into_iter()
            .find_map(|block| block.text)
            .ok_or_else(|| anyhow!("intent service returned no text content"))
    }

    async fn complete_openai(&self, request: &CompletionRequest) -> Result<String> {
        let body = OpenAiRequest {
            model: &self.model,
            temperature: request.temperature,
            messages: vec![
                Message { role: "system", content: &request.instruction },
                Message { role: "user", content: &request.command },
            ],
        };

        let mut builder = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder.send().await.context("intent service request failed")?;
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(anyhow!("intent service returned HTTP {}: {error_text}", status.as_u16()));
        }

        let completion: OpenAiResponse =
            response.json().await.context("intent service response was not valid JSON")?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("intent service returned no choices"))
    }
}

#[async_trait]
impl LlmClient for HttpLlmClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        match self.format {
            ApiFormat::Anthropic => self.complete_anthropic(request).await,
            ApiFormat::OpenAiCompatible => self.complete_openai(request).await,
        }
    }
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Serialize)]
struct OpenAiRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::{Json, Router};
    use crmpilot_core::config::{LlmConfig, LlmProvider};
    use secrecy::SecretString;
    use serde_json::{json, Value};

    use super::{CompletionRequest, HttpLlmClient, LlmClient};

    fn request() -> CompletionRequest {
        CompletionRequest {
            instruction: "Return JSON".to_owned(),
            command: "Create account Acme".to_owned(),
            temperature: 0.0,
        }
    }

    async fn openai_handler(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        let authorized = headers.get("authorization").and_then(|value| value.to_str().ok())
            == Some("Bearer sk-test");
        let content = if authorized
            && body["temperature"] == json!(0.0)
            && body["messages"][0]["role"] == "system"
            && body["messages"][1]["content"] == "Create account Acme"
        {
            r#"{"operation":"create_account","data":{"account_name":"Acme"}}"#
        } else {
            "unexpected request"
        };
        Json(json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] }))
    }

    async fn anthropic_handler(headers: HeaderMap, Json(body): Json<Value>) -> Json<Value> {
        let authorized = headers.get("x-api-key").and_then(|value| value.to_str().ok())
            == Some("sk-ant-test")
            && headers.get("anthropic-version").is_some();
        let text = if authorized && body["system"] == "Return JSON" {
            "{\"operation\":\"unknown\",\"data\":{}}"
        } else {
            "unexpected request"
        };
        Json(json!({ "content": [{ "type": "text", "text": text }] }))
    }

    async fn spawn_fake_service() -> String {
        let router = Router::new()
            .route("/v1/chat/completions", post(openai_handler))
            .route("/v1/messages", post(anthropic_handler));
        let listener =
            tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("listener should bind");
        let address = listener.local_addr().expect("listener should have an address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{address}")
    }

    #[tokio::test]
    async fn openai_compatible_request_carries_instruction_and_temperature() {
        let base = spawn_fake_service().await;
        let config = LlmConfig {
            provider: LlmProvider::OpenAi,
            api_key: Some(SecretString::from("sk-test".to_owned())),
            base_url: Some(format!("{base}/v1/")),
            model: "gpt-4o".to_owned(),
        };
        let client = HttpLlmClient::from_config(reqwest::Client::new(), &config);
        assert_eq!(client.endpoint(), format!("{base}/v1/chat/completions"));

        let text = client.complete(&request()).await.expect("completion should succeed");
        assert!(text.contains("create_account"));
    }

    #[tokio::test]
    async fn anthropic_request_uses_messages_api() {
        let base = spawn_fake_service().await;
        let config = LlmConfig {
            provider: LlmProvider::Anthropic,
            api_key: Some(SecretString::from("sk-ant-test".to_owned())),
            base_url: Some(base.clone()),
            model: "claude-3-5-haiku-latest".to_owned(),
        };
        let client = HttpLlmClient::from_config(reqwest::Client::new(), &config);
        assert_eq!(client.endpoint(), format!("{base}/v1/messages"));

        let text = client.complete(&request()).await.expect("completion should succeed");
        assert!(text.contains("\"unknown\""));
    }

    #[tokio::test]
    async fn http_failure_is_reported() {
        let base = spawn_fake_service().await;
        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            api_key: None,
            base_url: Some(format!("{base}/missing")),
            model: "llama3".to_owned(),
        };
        let client = HttpLlmClient::from_config(reqwest::Client::new(), &config);
        let error = client.complete(&request()).await.expect_err("404 should fail");
        assert!(error.to_string().contains("HTTP 404"));
    }
}
