//! The daily generation run: event selection → rendering → post-processing
//! → persistence, driven through the [`StateMachine`].

use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, NaiveDate, Utc};
use content::imaging::Overlay;
use content::store::{DAY_CACHE_CONTROL, JSON_CONTENT_TYPE};
use content::{
    keys, ArtStyle, ContentStore, DailyRecord, HistoricalEvent, PostProcessor, VariantSpec,
};
use serde::Serialize;
use tracing::{error, info};

use crate::config::{AppConfig, BannerMode};
use crate::errors::GenerationError;
use crate::prompts::{self, Banner, PROMPT_VERSION};
use crate::providers::{AspectRatio, ImageModel, ModelError, TextModel};
use crate::state_machine::{GenerationState, StateMachine, TransitionRecord};

/// Knobs of a generation run that come from configuration.
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub variants: Vec<VariantSpec>,
    pub banner: BannerMode,
    /// Wall-clock bound for the whole run.
    pub timeout: Duration,
}

impl GeneratorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            variants: config.variants.clone(),
            banner: config.banner,
            timeout: config.generate_timeout,
        }
    }
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            variants: VariantSpec::defaults(),
            banner: BannerMode::Overlay,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub date: NaiveDate,
    pub title: String,
    pub year: i32,
    pub style: ArtStyle,
    /// Renditions written, in configured order.
    pub variant_keys: Vec<String>,
    /// Written after every rendition.
    pub metadata_key: String,
    pub transitions: Vec<TransitionRecord>,
}

struct RunOutput {
    event: HistoricalEvent,
    variant_keys: Vec<String>,
    metadata_key: String,
}

/// Produces and stores the picture for one date.
pub struct ContentGenerator {
    text_model: Arc<dyn TextModel>,
    image_model: Arc<dyn ImageModel>,
    store: Arc<dyn ContentStore>,
    processor: PostProcessor,
    settings: GeneratorSettings,
}

impl ContentGenerator {
    pub fn new(
        text_model: Arc<dyn TextModel>,
        image_model: Arc<dyn ImageModel>,
        store: Arc<dyn ContentStore>,
        processor: PostProcessor,
        settings: GeneratorSettings,
    ) -> Self {
        Self {
            text_model,
            image_model,
            store,
            processor,
            settings,
        }
    }

    /// Run once for `date` (today, UTC, when `None`) in the requested style.
    ///
    /// Unknown or missing styles resolve to the default style, and the
    /// resolved style is what gets recorded.
    pub async fn generate(
        &self,
        style: Option<&str>,
        date: Option<NaiveDate>,
    ) -> Result<GenerationReport, GenerationError> {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        let style = ArtStyle::resolve(style);
        let date_key = keys::date_key(date);
        let mut machine = StateMachine::new();

        info!(
            date = %date_key,
            style = %style,
            prompt_version = PROMPT_VERSION,
            "Starting generation run"
        );

        let timeout = self.settings.timeout;
        let outcome = tokio::time::timeout(timeout, self.run(&mut machine, date, style)).await;
        let result = match outcome {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout {
                after: timeout,
                stage: machine.current(),
            }),
        };

        match result {
            Ok(output) => {
                machine.advance(GenerationState::Done, None)?;
                info!(
                    date = %date_key,
                    style = %style,
                    year = output.event.year,
                    title = %output.event.title,
                    variants = output.variant_keys.len(),
                    summary = %machine.summary(),
                    "Generation run complete"
                );
                Ok(GenerationReport {
                    date,
                    title: output.event.title,
                    year: output.event.year,
                    style,
                    variant_keys: output.variant_keys,
                    metadata_key: output.metadata_key,
                    transitions: machine.transitions().to_vec(),
                })
            }
            Err(err) => {
                let stage = err.stage();
                // Already terminal only if the failure came from a bad transition.
                let _ = machine.fail(&err.to_string());
                error!(
                    date = %date_key,
                    style = %style,
                    stage = %stage,
                    summary = %machine.summary(),
                    "Generation run failed: {err}"
                );
                Err(err)
            }
        }
    }

    async fn run(
        &self,
        machine: &mut StateMachine,
        date: NaiveDate,
        style: ArtStyle,
    ) -> Result<RunOutput, GenerationError> {
        let prompt = prompts::event_selection_prompt(date.month(), date.day());
        let answer = self
            .text_model
            .complete(&prompt)
            .await
            .map_err(|e| GenerationError::model(GenerationState::SelectingEvent, e))?;

        machine.advance(GenerationState::ParsingEvent, None)?;
        let event = HistoricalEvent::parse(&answer, date.year())?;
        info!(year = event.year, title = %event.title, "Selected event");

        machine.advance(GenerationState::GeneratingImage, Some(event.title.as_str()))?;
        let date_label = Overlay::for_event(date, event.year);
        let banner = match self.settings.banner {
            BannerMode::Prompt => Some(Banner {
                date_label: date_label.text(),
                title: event.title.clone(),
            }),
            BannerMode::Overlay => None,
        };
        let image_prompt =
            prompts::image_generation_prompt(&event.image_prompt, style, banner.as_ref());
        let source = self
            .image_model
            .generate(&image_prompt, AspectRatio::Landscape)
            .await
            .map_err(|e| GenerationError::model(GenerationState::GeneratingImage, e))?;
        if source.is_empty() {
            return Err(GenerationError::model(
                GenerationState::GeneratingImage,
                ModelError::EmptyResponse("image model"),
            ));
        }

        machine.advance(GenerationState::PostProcessing, None)?;
        let overlay = match self.settings.banner {
            BannerMode::Overlay => Some(date_label),
            BannerMode::Prompt => None,
        };
        let processor = self.processor.clone();
        let variants = self.settings.variants.clone();
        let renditions = tokio::task::spawn_blocking(move || {
            processor.process(&source, date, &variants, overlay.as_ref())
        })
        .await
        .map_err(|e| GenerationError::Internal {
            stage: GenerationState::PostProcessing,
            message: format!("post-processing task failed: {e}"),
        })??;

        machine.advance(GenerationState::Persisting, None)?;
        let mut variant_keys = Vec::with_capacity(renditions.len());
        for rendition in renditions {
            self.store
                .put(
                    &rendition.key,
                    rendition.bytes,
                    rendition.content_type,
                    DAY_CACHE_CONTROL,
                )
                .await
                .map_err(|e| GenerationError::store(&rendition.key, e))?;
            variant_keys.push(rendition.key);
        }

        let record = DailyRecord::from_event(date, &event, style, Utc::now());
        let metadata_key = keys::metadata_key(date);
        let body = record.to_json().map_err(|e| GenerationError::Internal {
            stage: GenerationState::Persisting,
            message: format!("failed to serialise record: {e}"),
        })?;
        self.store
            .put(&metadata_key, body, JSON_CONTENT_TYPE, DAY_CACHE_CONTROL)
            .await
            .map_err(|e| GenerationError::store(&metadata_key, e))?;

        Ok(RunOutput {
            event,
            variant_keys,
            metadata_key,
        })
    }
}
