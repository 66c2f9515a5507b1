//! Hosted model clients behind the two pipeline stages.
//!
//! | Stage | Trait | Implementations |
//! |---|---|---|
//! | Event selection | [`TextModel`] | [`GeminiText`], [`OpenAiText`] |
//! | Rendering | [`ImageModel`] | [`GeminiImage`], [`OpenAiImage`] |
//!
//! The generator only sees the traits; which vendor serves each stage is a
//! configuration choice made once at startup by [`build_text_model`] and
//! [`build_image_model`].

mod gemini;
mod openai;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{AppConfig, ModelEndpoint, Provider};

pub use gemini::{GeminiImage, GeminiText};
pub use openai::{OpenAiImage, OpenAiText};

/// Per-request ceiling for model calls. The generation run has its own,
/// usually tighter, wall-clock bound.
pub const MODEL_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("{provider} request failed: {message}")]
    Request {
        provider: &'static str,
        message: String,
    },
    #[error("{provider} returned HTTP {status}: {body}")]
    Status {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("{0} returned no usable content")]
    EmptyResponse(&'static str),
    #[error("{provider} response could not be decoded: {message}")]
    Decode {
        provider: &'static str,
        message: String,
    },
    #[error("{0} is not set")]
    MissingApiKey(&'static str),
}

/// Requested framing for the rendered image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectRatio {
    /// 16:9, the e-paper panel's shape.
    #[default]
    Landscape,
    Square,
}

impl AspectRatio {
    /// Gemini `imageConfig.aspectRatio` value.
    pub fn ratio(self) -> &'static str {
        match self {
            Self::Landscape => "16:9",
            Self::Square => "1:1",
        }
    }

    /// Closest DALL-E 3 size.
    pub fn dalle_size(self) -> &'static str {
        match self {
            Self::Landscape => "1792x1024",
            Self::Square => "1024x1024",
        }
    }
}

/// Stage one: prompt in, answer text out.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// User-facing answer text. Reasoning output is never included.
    async fn complete(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Stage two: prompt in, encoded image bytes out.
#[async_trait]
pub trait ImageModel: Send + Sync {
    async fn generate(&self, prompt: &str, aspect: AspectRatio) -> Result<Vec<u8>, ModelError>;
}

fn api_key(config: &AppConfig, provider: Provider) -> Result<String, ModelError> {
    config
        .api_key(provider)
        .map(|s| s.expose().to_string())
        .ok_or(ModelError::MissingApiKey(match provider {
            Provider::Gemini => crate::config::ENV_GOOGLE_API_KEY,
            Provider::OpenAi => crate::config::ENV_OPENAI_API_KEY,
        }))
}

fn http_client(provider: &'static str) -> Result<reqwest::Client, ModelError> {
    reqwest::Client::builder()
        .timeout(MODEL_REQUEST_TIMEOUT)
        .build()
        .map_err(|e| ModelError::Request {
            provider,
            message: format!("failed to build HTTP client: {e}"),
        })
}

/// Read the body of a non-2xx response into a [`ModelError::Status`].
async fn status_error(provider: &'static str, response: reqwest::Response) -> ModelError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    ModelError::Status {
        provider,
        status,
        body,
    }
}

pub fn build_text_model(
    endpoint: &ModelEndpoint,
    config: &AppConfig,
) -> Result<Arc<dyn TextModel>, ModelError> {
    let key = api_key(config, endpoint.provider)?;
    Ok(match endpoint.provider {
        Provider::Gemini => Arc::new(GeminiText::new(key, &endpoint.model)?),
        Provider::OpenAi => Arc::new(OpenAiText::new(key, &endpoint.model)?),
    })
}

pub fn build_image_model(
    endpoint: &ModelEndpoint,
    config: &AppConfig,
) -> Result<Arc<dyn ImageModel>, ModelError> {
    let key = api_key(config, endpoint.provider)?;
    Ok(match endpoint.provider {
        Provider::Gemini => Arc::new(GeminiImage::new(key, &endpoint.model)?),
        Provider::OpenAi => Arc::new(OpenAiImage::new(key, &endpoint.model)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(pairs: &[(&str, &str)]) -> AppConfig {
        let pairs: Vec<(String, String)> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| {
            if key == crate::config::ENV_STORE {
                return Some("memory".into());
            }
            pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
        .unwrap()
    }

    #[test]
    fn test_missing_key_names_variable() {
        let cfg = config(&[]);
        let err = build_text_model(&cfg.text, &cfg).err().unwrap();
        assert!(matches!(err, ModelError::MissingApiKey("GOOGLE_API_KEY")));

        let cfg = config(&[(crate::config::ENV_IMAGE_PROVIDER, "openai")]);
        let err = build_image_model(&cfg.image, &cfg).err().unwrap();
        assert_eq!(err.to_string(), "OPENAI_API_KEY is not set");
    }

    #[test]
    fn test_builds_configured_providers() {
        let cfg = config(&[
            (crate::config::ENV_GOOGLE_API_KEY, "g"),
            (crate::config::ENV_OPENAI_API_KEY, "o"),
            (crate::config::ENV_IMAGE_PROVIDER, "openai"),
        ]);
        assert!(build_text_model(&cfg.text, &cfg).is_ok());
        assert!(build_image_model(&cfg.image, &cfg).is_ok());
    }

    #[test]
    fn test_aspect_ratio_mapping() {
        assert_eq!(AspectRatio::default().ratio(), "16:9");
        assert_eq!(AspectRatio::Landscape.dalle_size(), "1792x1024");
        assert_eq!(AspectRatio::Square.dalle_size(), "1024x1024");
    }
}
