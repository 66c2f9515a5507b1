use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use super::{http_client, status_error, AspectRatio, ImageModel, ModelError, TextModel};

const PROVIDER: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";
const EVENT_TEMPERATURE: f32 = 0.9;
const EVENT_MAX_TOKENS: u32 = 500;

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImagesResponse {
    #[serde(default)]
    data: Vec<ImageDatum>,
}

#[derive(Debug, Deserialize)]
struct ImageDatum {
    b64_json: Option<String>,
}

struct OpenAiClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl OpenAiClient {
    fn new(api_key: String, model: &str) -> Result<Self, ModelError> {
        Ok(Self {
            api_key,
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: http_client(PROVIDER)?,
        })
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ModelError> {
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
            .map_err(|e| ModelError::Request {
                provider: PROVIDER,
                message: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(status_error(PROVIDER, response).await);
        }
        response.json().await.map_err(|e| ModelError::Decode {
            provider: PROVIDER,
            message: e.to_string(),
        })
    }
}

/// Event selection through chat completions in JSON mode.
pub struct OpenAiText {
    client: OpenAiClient,
}

impl OpenAiText {
    pub fn new(api_key: String, model: &str) -> Result<Self, ModelError> {
        Ok(Self {
            client: OpenAiClient::new(api_key, model)?,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.client.base_url = base_url.to_string();
        self
    }
}

#[async_trait]
impl TextModel for OpenAiText {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let body = serde_json::json!({
            "model": self.client.model,
            "messages": [{ "role": "user", "content": prompt }],
            "response_format": { "type": "json_object" },
            "temperature": EVENT_TEMPERATURE,
            "max_tokens": EVENT_MAX_TOKENS
        });
        debug!(model = %self.client.model, "OpenAI event selection request");

        let response: ChatResponse = self.client.post_json("/v1/chat/completions", &body).await?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(ModelError::EmptyResponse(PROVIDER))
    }
}

/// Rendering through the images API (DALL-E 3).
pub struct OpenAiImage {
    client: OpenAiClient,
}

impl OpenAiImage {
    pub fn new(api_key: String, model: &str) -> Result<Self, ModelError> {
        Ok(Self {
            client: OpenAiClient::new(api_key, model)?,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.client.base_url = base_url.to_string();
        self
    }
}

#[async_trait]
impl ImageModel for OpenAiImage {
    async fn generate(&self, prompt: &str, aspect: AspectRatio) -> Result<Vec<u8>, ModelError> {
        let body = serde_json::json!({
            "model": self.client.model,
            "prompt": prompt,
            "n": 1,
            "size": aspect.dalle_size(),
            "quality": "hd",
            "response_format": "b64_json"
        });
        debug!(model = %self.client.model, size = aspect.dalle_size(), "OpenAI image request");

        let response: ImagesResponse = self.client.post_json("/v1/images/generations", &body).await?;
        let encoded = response
            .data
            .into_iter()
            .next()
            .and_then(|d| d.b64_json)
            .ok_or(ModelError::EmptyResponse(PROVIDER))?;
        BASE64.decode(encoded.trim()).map_err(|e| ModelError::Decode {
            provider: PROVIDER,
            message: format!("b64_json: {e}"),
        })
    }
}
