use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use super::{http_client, status_error, AspectRatio, ImageModel, ModelError, TextModel};

const PROVIDER: &str = "gemini";
const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const EVENT_TEMPERATURE: f32 = 0.9;

#[derive(Debug, Default, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    /// Set on reasoning output, which is never part of the answer.
    #[serde(default)]
    thought: bool,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: String,
    data: String,
}

impl GenerateResponse {
    fn answer_parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .iter()
            .take(1)
            .filter_map(|c| c.content.as_ref())
            .flat_map(|c| c.parts.iter())
            .filter(|p| !p.thought)
    }
}

/// Concatenate the answer text of a `streamGenerateContent?alt=sse` body.
fn collect_stream_text(body: &str) -> Result<String, ModelError> {
    let mut text = String::new();
    for line in body.lines() {
        let Some(data) = line.strip_prefix("data:") else {
            continue;
        };
        let data = data.trim();
        if data.is_empty() {
            continue;
        }
        let chunk: GenerateResponse =
            serde_json::from_str(data).map_err(|e| ModelError::Decode {
                provider: PROVIDER,
                message: format!("stream chunk: {e}"),
            })?;
        if let Some(error) = chunk.error {
            return Err(ModelError::Request {
                provider: PROVIDER,
                message: error.message,
            });
        }
        for part in chunk.answer_parts() {
            if let Some(fragment) = &part.text {
                text.push_str(fragment);
            }
        }
    }
    if text.trim().is_empty() {
        return Err(ModelError::EmptyResponse(PROVIDER));
    }
    Ok(text)
}

/// First inline image of a `generateContent` response, decoded.
fn extract_image(response: &GenerateResponse) -> Result<Vec<u8>, ModelError> {
    let inline = response
        .answer_parts()
        .filter_map(|p| p.inline_data.as_ref())
        .find(|d| d.mime_type.is_empty() || d.mime_type.starts_with("image/"))
        .ok_or(ModelError::EmptyResponse(PROVIDER))?;
    BASE64.decode(inline.data.trim()).map_err(|e| ModelError::Decode {
        provider: PROVIDER,
        message: format!("inline image data: {e}"),
    })
}

struct GeminiClient {
    api_key: String,
    model: String,
    base_url: String,
    http: reqwest::Client,
}

impl GeminiClient {
    fn new(api_key: String, model: &str) -> Result<Self, ModelError> {
        Ok(Self {
            api_key,
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: http_client(PROVIDER)?,
        })
    }

    fn url(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{method}",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    async fn post(&self, url: &str, body: &serde_json::Value) -> Result<reqwest::Response, ModelError> {
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
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
        Ok(response)
    }
}

/// Event selection through Gemini's streaming endpoint.
pub struct GeminiText {
    client: GeminiClient,
}

impl GeminiText {
    pub fn new(api_key: String, model: &str) -> Result<Self, ModelError> {
        Ok(Self {
            client: GeminiClient::new(api_key, model)?,
        })
    }

    /// Point at a different API host (proxies, tests).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.client.base_url = base_url.to_string();
        self
    }
}

#[async_trait]
impl TextModel for GeminiText {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": EVENT_TEMPERATURE,
                "responseMimeType": "application/json"
            }
        });
        let url = format!("{}?alt=sse", self.client.url("streamGenerateContent"));
        debug!(model = %self.client.model, "Gemini event selection request");

        let response = self.client.post(&url, &body).await?;
        let raw = response.text().await.map_err(|e| ModelError::Request {
            provider: PROVIDER,
            message: e.to_string(),
        })?;
        collect_stream_text(&raw)
    }
}

/// Image rendering through Gemini's native image output.
pub struct GeminiImage {
    client: GeminiClient,
}

impl GeminiImage {
    pub fn new(api_key: String, model: &str) -> Result<Self, ModelError> {
        Ok(Self {
            client: GeminiClient::new(api_key, model)?,
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.client.base_url = base_url.to_string();
        self
    }
}

#[async_trait]
impl ImageModel for GeminiImage {
    async fn generate(&self, prompt: &str, aspect: AspectRatio) -> Result<Vec<u8>, ModelError> {
        let body = serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": { "aspectRatio": aspect.ratio() }
            }
        });
        debug!(model = %self.client.model, aspect = aspect.ratio(), "Gemini image request");

        let response = self
            .client
            .post(&self.client.url("generateContent"), &body)
            .await?;
        let parsed: GenerateResponse = response.json().await.map_err(|e| ModelError::Decode {
            provider: PROVIDER,
            message: e.to_string(),
        })?;
        extract_image(&parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use axum::routing::post;
    use axum::Router;

    const STREAM: &str = concat!(
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"Considering July 4...\",\"thought\":true}]}}]}\n\n",
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"{\\\"year\\\": 1776,\"}]}}]}\n\n",
        "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\" \\\"title\\\": \\\"Independence\\\"}\"}]}}]}\n\n",
    );

    #[test]
    fn test_stream_drops_thought_parts() {
        let text = collect_stream_text(STREAM).unwrap();
        assert_eq!(text, "{\"year\": 1776, \"title\": \"Independence\"}");
    }

    #[test]
    fn test_stream_with_only_thoughts_is_empty() {
        let body = "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"hmm\",\"thought\":true}]}}]}\n";
        assert!(matches!(
            collect_stream_text(body),
            Err(ModelError::EmptyResponse("gemini"))
        ));
    }

    #[test]
    fn test_stream_error_chunk() {
        let body = "data: {\"error\":{\"code\":429,\"message\":\"quota exceeded\"}}\n";
        let err = collect_stream_text(body).unwrap_err();
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[test]
    fn test_extract_inline_image_skips_text() {
        let response: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {
                    "parts": [
                        { "text": "Here is your image" },
                        { "inlineData": { "mimeType": "image/png", "data": BASE64.encode(b"PNGDATA") } }
                    ]
                }
            }]
        }))
        .unwrap();
        assert_eq!(extract_image(&response).unwrap(), b"PNGDATA");
    }

    #[test]
    fn test_extract_image_missing() {
        let response = GenerateResponse::default();
        assert!(matches!(
            extract_image(&response),
            Err(ModelError::EmptyResponse(_))
        ));
    }

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_text_round_trip_sends_key_header() {
        let app = Router::new().route(
            "/v1beta/models/gemini-2.5-flash:streamGenerateContent",
            post(|headers: HeaderMap| async move {
                if headers.get("x-goog-api-key").and_then(|v| v.to_str().ok()) == Some("test-key") {
                    (axum::http::StatusCode::OK, STREAM)
                } else {
                    (axum::http::StatusCode::FORBIDDEN, "bad key")
                }
            }),
        );
        let base = serve(app).await;

        let model = GeminiText::new("test-key".into(), "gemini-2.5-flash")
            .unwrap()
            .with_base_url(&base);
        let text = model.complete("pick an event").await.unwrap();
        assert!(text.starts_with("{\"year\": 1776"));

        let wrong = GeminiText::new("other".into(), "gemini-2.5-flash")
            .unwrap()
            .with_base_url(&base);
        let err = wrong.complete("pick an event").await.unwrap_err();
        assert!(matches!(err, ModelError::Status { status: 403, .. }));
    }
}
