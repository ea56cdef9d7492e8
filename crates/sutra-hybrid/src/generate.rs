use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use sutra_core::config::GenerationConfig;
use sutra_core::error::{Error, Result};
use sutra_core::traits::GenerationService;
use sutra_core::types::Prompt;

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI-compatible `/chat/completions` client asking for a JSON object.
pub struct HttpGenerator {
    client: Client,
    url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl HttpGenerator {
    pub fn from_config(config: &GenerationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| Error::backend("generation", e))?;
        Ok(Self {
            client,
            url: format!("{}/chat/completions", config.endpoint.trim_end_matches('/')),
            model: config.model.clone(),
            api_key: config.api_key_env.as_deref().and_then(|name| std::env::var(name).ok()),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl GenerationService for HttpGenerator {
    async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let messages = [
            ChatMessage { role: "system", content: &prompt.system },
            ChatMessage { role: "user", content: &prompt.user },
        ];
        let body = json!({
            "model": self.model,
            "temperature": self.temperature,
            "response_format": {"type": "json_object"},
            "messages": messages,
        });
        let mut req = self.client.post(&self.url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().await.map_err(|e| Error::backend("generation", format!("request failed: {e}")))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| Error::backend("generation", format!("read body: {e}")))?;
        if !status.is_success() {
            return Err(Error::backend("generation", format!("status {status}: {text}")));
        }
        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| Error::backend("generation", format!("parse response: {e}")))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| Error::backend("generation", "response has no message content"))?;
        debug!(chars = content.chars().count(), model = %self.model, "generation finished");
        Ok(content)
    }
}
