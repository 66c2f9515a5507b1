//! Stub models and stores shared by the integration tests.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use content::{ContentStore, MemoryContentStore, PostProcessor, StoreError, VariantSpec};
use daily_picture::config::BannerMode;
use daily_picture::generator::{ContentGenerator, GeneratorSettings};
use daily_picture::providers::{AspectRatio, ImageModel, ModelError, TextModel};
use image::{ImageFormat, Rgb, RgbImage};

pub const DECLARATION_JSON: &str = r#"{
  "year": 1776,
  "title": "Declaration of Independence",
  "description": "The Continental Congress adopts the Declaration in Philadelphia.",
  "imagePrompt": "Delegates gathered around a table in Independence Hall, quills poised"
}"#;

pub fn july_4() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 4).unwrap()
}

/// Small renditions keep the Lanczos resize fast.
pub fn small_variants() -> Vec<VariantSpec> {
    vec![VariantSpec::new(96, 54, 16), VariantSpec::new(64, 64, 256)]
}

pub fn settings(banner: BannerMode) -> GeneratorSettings {
    GeneratorSettings {
        variants: small_variants(),
        banner,
        timeout: Duration::from_secs(10),
    }
}

/// A 16:9 PNG with a horizontal gradient.
pub fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_fn(160, 90, |x, y| {
        let v = ((x * 255) / 159) as u8;
        Rgb([v, (y * 2) as u8, 255 - v])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Text model that always answers with the same text and remembers prompts.
pub struct FixedText {
    answer: String,
    pub prompts: Mutex<Vec<String>>,
}

impl FixedText {
    pub fn new(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl TextModel for FixedText {
    async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok(self.answer.clone())
    }
}

/// Image model that returns fixed bytes, optionally after a delay.
pub struct FixedImage {
    bytes: Vec<u8>,
    delay: Option<Duration>,
    pub prompts: Mutex<Vec<(String, AspectRatio)>>,
}

impl FixedImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            delay: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn slow(bytes: Vec<u8>, delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new(bytes)
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().map(|(p, _)| p.clone())
    }
}

#[async_trait]
impl ImageModel for FixedImage {
    async fn generate(&self, prompt: &str, aspect: AspectRatio) -> Result<Vec<u8>, ModelError> {
        self.prompts.lock().unwrap().push((prompt.to_string(), aspect));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.bytes.clone())
    }
}

pub struct FailingImage;

#[async_trait]
impl ImageModel for FailingImage {
    async fn generate(&self, _prompt: &str, _aspect: AspectRatio) -> Result<Vec<u8>, ModelError> {
        Err(ModelError::Status {
            provider: "gemini",
            status: 503,
            body: "model overloaded".to_string(),
        })
    }
}

/// Memory store that also records the order of writes.
#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryContentStore,
    pub writes: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn write_order(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentStore for RecordingStore {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        self.inner.get(key).await
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), StoreError> {
        self.inner.put(key, body, content_type, cache_control).await?;
        self.writes.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn signed_read_url(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        self.inner.signed_read_url(key, ttl).await
    }
}

pub fn generator(
    text: Arc<dyn TextModel>,
    image: Arc<dyn ImageModel>,
    store: Arc<dyn ContentStore>,
    settings: GeneratorSettings,
) -> ContentGenerator {
    ContentGenerator::new(text, image, store, PostProcessor::new(), settings)
}

/// Memory store whose reads, presigning or existence checks can misbehave.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryContentStore,
    pub fail_gets: bool,
    pub fail_signing: bool,
    pub exists_delay: Option<Duration>,
}

#[async_trait]
impl ContentStore for FlakyStore {
    fn name(&self) -> &'static str {
        "flaky"
    }

    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        if let Some(delay) = self.exists_delay {
            tokio::time::sleep(delay).await;
        }
        self.inner.exists(key).await
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        if self.fail_gets {
            return Err(StoreError::Status {
                key: key.to_string(),
                status: 500,
                body: "InternalError".to_string(),
            });
        }
        self.inner.get(key).await
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
        cache_control: &str,
    ) -> Result<(), StoreError> {
        self.inner.put(key, body, content_type, cache_control).await
    }

    async fn signed_read_url(&self, key: &str, ttl: Duration) -> Result<String, StoreError> {
        if self.fail_signing {
            return Err(StoreError::Config("no credentials to sign with".to_string()));
        }
        self.inner.signed_read_url(key, ttl).await
    }
}
