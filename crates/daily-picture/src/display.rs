//! Read path: which picture a device should show right now.

use std::sync::Arc;
use std::time::Duration;

use axum::http::HeaderMap;
use chrono::{NaiveDate, Utc};
use content::record::{
    DEFAULT_DEVICE_HEIGHT, DEFAULT_DEVICE_WIDTH, DEFAULT_GRAYSCALE_LEVELS, UNKNOWN_DEVICE_ID,
};
use content::{
    keys, ArtStyle, ContentStore, DailyRecord, DateFallbackChain, DeviceProfile, StoreError,
    VariantSpec,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::AppConfig;

pub const HEADER_DEVICE_ID: &str = "x-device-id";
pub const HEADER_DEVICE_WIDTH: &str = "x-device-width";
pub const HEADER_DEVICE_HEIGHT: &str = "x-device-height";
pub const HEADER_DEVICE_GRAYSCALE: &str = "x-device-grayscale";
pub const HEADER_BATTERY_VOLTAGE: &str = "x-battery-voltage";
pub const HEADER_FIRMWARE_VERSION: &str = "x-firmware-version";
pub const HEADER_WIFI_RSSI: &str = "x-wifi-rssi";

/// Seconds a device should wait before asking again.
pub const REFRESH_RATE_SECS: u64 = 86_400;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("no image available")]
    NotFound,
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("display lookup timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

/// What a device receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayPayload {
    pub image_url: String,
    pub event_date: String,
    pub event_year: i32,
    pub event_title: String,
    pub event_description: String,
    pub style: ArtStyle,
    pub refresh_rate: u64,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub variants: Vec<VariantSpec>,
    /// Dates tried, today included.
    pub lookback_days: u32,
    pub signed_url_ttl: Duration,
    pub timeout: Duration,
}

impl DisplaySettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            variants: config.variants.clone(),
            lookback_days: config.lookback_days,
            signed_url_ttl: config.signed_url_ttl,
            timeout: config.display_timeout,
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            variants: VariantSpec::defaults(),
            lookback_days: 2,
            signed_url_ttl: Duration::from_secs(3600),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Device profile from request headers. Missing or unparseable values take
/// the defaults.
pub fn device_profile(headers: &HeaderMap) -> DeviceProfile {
    fn text<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    }
    fn number<T: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Option<T> {
        text(headers, name).and_then(|v| v.parse().ok())
    }

    DeviceProfile {
        width: number::<u32>(headers, HEADER_DEVICE_WIDTH)
            .filter(|w| *w > 0)
            .unwrap_or(DEFAULT_DEVICE_WIDTH),
        height: number::<u32>(headers, HEADER_DEVICE_HEIGHT)
            .filter(|h| *h > 0)
            .unwrap_or(DEFAULT_DEVICE_HEIGHT),
        grayscale_levels: number::<u32>(headers, HEADER_DEVICE_GRAYSCALE)
            .filter(|l| *l > 0)
            .unwrap_or(DEFAULT_GRAYSCALE_LEVELS),
        device_id: text(headers, HEADER_DEVICE_ID)
            .unwrap_or(UNKNOWN_DEVICE_ID)
            .to_string(),
        battery_voltage: number(headers, HEADER_BATTERY_VOLTAGE),
        firmware_version: text(headers, HEADER_FIRMWARE_VERSION).map(String::from),
        wifi_rssi: number(headers, HEADER_WIFI_RSSI),
    }
}

/// Finds the newest stored picture for a device and presigns it.
pub struct DisplayService {
    store: Arc<dyn ContentStore>,
    settings: DisplaySettings,
}

impl DisplayService {
    pub fn new(store: Arc<dyn ContentStore>, settings: DisplaySettings) -> Self {
        Self { store, settings }
    }

    /// Payload for `profile` as of now (UTC).
    pub async fn current(&self, profile: &DeviceProfile) -> Result<DisplayPayload, DisplayError> {
        self.current_on(profile, Utc::now().date_naive()).await
    }

    /// Payload for `profile` as if today were `today`.
    pub async fn current_on(
        &self,
        profile: &DeviceProfile,
        today: NaiveDate,
    ) -> Result<DisplayPayload, DisplayError> {
        let limit = self.settings.timeout;
        tokio::time::timeout(limit, self.lookup(profile, today))
            .await
            .map_err(|_| DisplayError::Timeout(limit))?
    }

    async fn lookup(
        &self,
        profile: &DeviceProfile,
        today: NaiveDate,
    ) -> Result<DisplayPayload, DisplayError> {
        let spec = VariantSpec::select(profile, &self.settings.variants)
            .copied()
            .ok_or(DisplayError::NotFound)?;
        let variant_key = spec.key();
        debug!(
            device_id = %profile.device_id,
            variant = %variant_key,
            battery_voltage = ?profile.battery_voltage,
            firmware_version = ?profile.firmware_version,
            wifi_rssi = ?profile.wifi_rssi,
            "Display request"
        );

        let chain = DateFallbackChain::lookback("display", today, self.settings.lookback_days);
        let store = &self.store;
        let device_id = profile.device_id.as_str();
        let resolved = chain
            .resolve(|date| {
                let key = keys::image_key(date, &variant_key);
                async move {
                    match store.exists(&key).await {
                        Ok(true) => Ok((date, key)),
                        Ok(false) => Err("absent".to_string()),
                        Err(e) => {
                            warn!(device_id, key = %key, "Existence check failed: {e}");
                            Err(format!("existence check failed: {e}"))
                        }
                    }
                }
            })
            .await;

        let degraded = resolved.is_degraded();
        let Some((date, image_key)) = resolved.payload else {
            info!(
                device_id = %profile.device_id,
                variant = %variant_key,
                tried = chain.tier_count(),
                "No image available"
            );
            return Err(DisplayError::NotFound);
        };
        if degraded {
            info!(
                device_id = %profile.device_id,
                date = %keys::date_key(date),
                warnings = ?resolved.warnings,
                "Serving an earlier day's image"
            );
        }

        let record = self.load_record(date, &profile.device_id).await;
        let image_url = self
            .store
            .signed_read_url(&image_key, self.settings.signed_url_ttl)
            .await?;

        Ok(DisplayPayload {
            image_url,
            event_date: keys::date_key(date),
            event_year: record.year,
            event_title: record.title,
            event_description: record.description,
            style: record.style,
            refresh_rate: REFRESH_RATE_SECS,
        })
    }

    /// The record for `date`, or the placeholder when it is missing or unreadable.
    async fn load_record(&self, date: NaiveDate, device_id: &str) -> DailyRecord {
        let key = keys::metadata_key(date);
        match self.store.get(&key).await {
            Ok(bytes) => DailyRecord::from_json(&bytes).unwrap_or_else(|e| {
                warn!(device_id, key = %key, "Unreadable metadata record: {e}");
                DailyRecord::placeholder(date)
            }),
            Err(e) if e.is_not_found() => {
                info!(device_id, key = %key, "Image has no metadata record");
                DailyRecord::placeholder(date)
            }
            Err(e) => {
                warn!(device_id, key = %key, "Failed to read metadata record: {e}");
                DailyRecord::placeholder(date)
            }
        }
    }
}
