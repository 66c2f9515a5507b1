//! Content data model: historical events, daily records, styles and device profiles.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::keys;

/// Monochrome art style the image model is asked to render in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtStyle {
    #[default]
    ArtDeco,
    Woodcut,
    InkWash,
    Noir,
    Sketch,
}

impl ArtStyle {
    pub const ALL: [ArtStyle; 5] = [
        Self::ArtDeco,
        Self::Woodcut,
        Self::InkWash,
        Self::Noir,
        Self::Sketch,
    ];

    /// Wire key (`"art_deco"`, `"noir"`, ...).
    pub fn key(self) -> &'static str {
        match self {
            Self::ArtDeco => "art_deco",
            Self::Woodcut => "woodcut",
            Self::InkWash => "ink_wash",
            Self::Noir => "noir",
            Self::Sketch => "sketch",
        }
    }

    /// Look up a style by key. Case and surrounding whitespace are ignored.
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|s| s.key() == key)
    }

    /// Resolve a caller-supplied style, falling back to the default
    /// (`art_deco`) when absent or unrecognised.
    pub fn resolve(requested: Option<&str>) -> Self {
        requested.and_then(Self::from_key).unwrap_or_default()
    }
}

impl fmt::Display for ArtStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Why an event-selection response could not be turned into a [`HistoricalEvent`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventParseError {
    #[error("event response is not valid JSON: {0}")]
    InvalidJson(String),
    #[error("event response field `{0}` is empty")]
    EmptyField(&'static str),
    #[error("event year {0} is not a plausible calendar year")]
    ImplausibleYear(i32),
}

/// Event picked by the selection model. Lives for a single generation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalEvent {
    pub year: i32,
    pub title: String,
    pub description: String,
    /// Scene description for the image model. Older prompt generations
    /// called this `dalle_prompt`.
    #[serde(rename = "imagePrompt", alias = "image_prompt", alias = "dalle_prompt")]
    pub image_prompt: String,
}

impl HistoricalEvent {
    /// Parse and validate the model's answer text.
    ///
    /// A single surrounding Markdown code fence is tolerated; anything else
    /// that is not one JSON object is rejected. `latest_year` is the year of
    /// the generation date: events cannot come from the future.
    pub fn parse(text: &str, latest_year: i32) -> Result<Self, EventParseError> {
        let body = strip_code_fence(text);
        let event: HistoricalEvent =
            serde_json::from_str(body).map_err(|e| EventParseError::InvalidJson(e.to_string()))?;
        event.validate(latest_year)?;
        Ok(event)
    }

    fn validate(&self, latest_year: i32) -> Result<(), EventParseError> {
        if self.year == 0 || self.year > latest_year {
            return Err(EventParseError::ImplausibleYear(self.year));
        }
        for (name, value) in [
            ("title", &self.title),
            ("description", &self.description),
            ("imagePrompt", &self.image_prompt),
        ] {
            if value.trim().is_empty() {
                return Err(EventParseError::EmptyField(name));
            }
        }
        Ok(())
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening fence line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Persisted generation record, one per UTC date (`images/{date}/metadata.json`).
///
/// Reads are lenient: absent fields take their defaults and an unknown
/// style string reads as the default style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRecord {
    pub date: String,
    #[serde(default)]
    pub year: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_style")]
    pub style: ArtStyle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_at: Option<DateTime<Utc>>,
}

impl DailyRecord {
    pub fn from_event(
        date: NaiveDate,
        event: &HistoricalEvent,
        style: ArtStyle,
        generated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            date: keys::date_key(date),
            year: event.year,
            title: event.title.clone(),
            description: event.description.clone(),
            style,
            generated_at: Some(generated_at),
        }
    }

    /// Stand-in used by the read path when a date has an image but no
    /// readable metadata.
    pub fn placeholder(date: NaiveDate) -> Self {
        Self {
            date: keys::date_key(date),
            year: 0,
            title: String::new(),
            description: String::new(),
            style: ArtStyle::default(),
            generated_at: None,
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

fn lenient_style<'de, D>(deserializer: D) -> Result<ArtStyle, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(ArtStyle::resolve(raw.as_deref()))
}

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

/// English month name for a 1-based month number.
pub fn month_name(month: u32) -> Option<&'static str> {
    month
        .checked_sub(1)
        .and_then(|idx| MONTH_NAMES.get(idx as usize))
        .copied()
}

pub const DEFAULT_DEVICE_WIDTH: u32 = 960;
pub const DEFAULT_DEVICE_HEIGHT: u32 = 540;
pub const DEFAULT_GRAYSCALE_LEVELS: u32 = 16;
pub const UNKNOWN_DEVICE_ID: &str = "unknown";

/// Capabilities a display device reports with each request. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceProfile {
    pub width: u32,
    pub height: u32,
    pub grayscale_levels: u32,
    /// Used for logging only.
    pub device_id: String,
    pub battery_voltage: Option<f32>,
    pub firmware_version: Option<String>,
    pub wifi_rssi: Option<i32>,
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self {
            width: DEFAULT_DEVICE_WIDTH,
            height: DEFAULT_DEVICE_HEIGHT,
            grayscale_levels: DEFAULT_GRAYSCALE_LEVELS,
            device_id: UNKNOWN_DEVICE_ID.to_string(),
            battery_voltage: None,
            firmware_version: None,
            wifi_rssi: None,
        }
    }
}
