//! Environment-driven service configuration.
//!
//! Every setting has a built-in default and an environment override named by
//! one of the `ENV_*` constants. Parsing goes through a lookup function so
//! tests can supply a map instead of the process environment.

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveTime;
use content::store::Credentials;
use content::{S3Config, VariantSpec};

pub const ENV_BIND: &str = "DAILY_PICTURE_BIND";
pub const ENV_TEXT_PROVIDER: &str = "DAILY_PICTURE_TEXT_PROVIDER";
pub const ENV_TEXT_MODEL: &str = "DAILY_PICTURE_TEXT_MODEL";
pub const ENV_IMAGE_PROVIDER: &str = "DAILY_PICTURE_IMAGE_PROVIDER";
pub const ENV_IMAGE_MODEL: &str = "DAILY_PICTURE_IMAGE_MODEL";
pub const ENV_GOOGLE_API_KEY: &str = "GOOGLE_API_KEY";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_STORE: &str = "DAILY_PICTURE_STORE";
pub const ENV_BUCKET: &str = "DAILY_PICTURE_IMAGES_BUCKET_NAME";
pub const ENV_AWS_REGION: &str = "AWS_REGION";
pub const ENV_AWS_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_AWS_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_AWS_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const ENV_S3_ENDPOINT: &str = "DAILY_PICTURE_S3_ENDPOINT";
pub const ENV_VARIANTS: &str = "DAILY_PICTURE_VARIANTS";
pub const ENV_LOOKBACK_DAYS: &str = "DAILY_PICTURE_LOOKBACK_DAYS";
pub const ENV_SIGNED_URL_TTL_SECS: &str = "DAILY_PICTURE_SIGNED_URL_TTL_SECS";
pub const ENV_GENERATE_TIMEOUT_SECS: &str = "DAILY_PICTURE_GENERATE_TIMEOUT_SECS";
pub const ENV_DISPLAY_TIMEOUT_SECS: &str = "DAILY_PICTURE_DISPLAY_TIMEOUT_SECS";
pub const ENV_SCHEDULE_UTC: &str = "DAILY_PICTURE_SCHEDULE_UTC";
pub const ENV_BANNER: &str = "DAILY_PICTURE_BANNER";
pub const ENV_FONT_PATH: &str = "DAILY_PICTURE_FONT_PATH";

const DEFAULT_BIND: &str = "0.0.0.0:8080";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_LOOKBACK_DAYS: u32 = 2;
const DEFAULT_SIGNED_URL_TTL_SECS: u64 = 3600;
const DEFAULT_GENERATE_TIMEOUT_SECS: u64 = 120;
const DEFAULT_DISPLAY_TIMEOUT_SECS: u64 = 30;
const DEFAULT_SCHEDULE_UTC: &str = "10:00";
const S3_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A credential that never shows up in `Debug` output or logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Hosted model vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
    OpenAi,
}

impl Provider {
    pub fn default_text_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.5-flash",
            Self::OpenAi => "gpt-4o",
        }
    }

    pub fn default_image_model(self) -> &'static str {
        match self {
            Self::Gemini => "gemini-2.5-flash-image",
            Self::OpenAi => "dall-e-3",
        }
    }
}

impl FromStr for Provider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            other => bail!("unknown model provider `{other}` (expected gemini or openai)"),
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini => write!(f, "gemini"),
            Self::OpenAi => write!(f, "openai"),
        }
    }
}

/// Which vendor and model serve one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEndpoint {
    pub provider: Provider,
    pub model: String,
}

/// Where the date/title banner comes from. Exactly one source is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BannerMode {
    /// Post-processing burns the date into every rendition.
    #[default]
    Overlay,
    /// The image model is asked to paint the date and title itself.
    Prompt,
}

impl FromStr for BannerMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overlay" => Ok(Self::Overlay),
            "prompt" => Ok(Self::Prompt),
            other => bail!("unknown banner mode `{other}` (expected overlay or prompt)"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StoreSettings {
    /// Process-local store; nothing survives a restart.
    Memory,
    S3(S3Config),
}

/// Top-level service configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind: SocketAddr,
    pub text: ModelEndpoint,
    pub image: ModelEndpoint,
    pub google_api_key: Option<Secret>,
    pub openai_api_key: Option<Secret>,
    pub store: StoreSettings,
    pub variants: Vec<VariantSpec>,
    /// Dates the read path tries, today included.
    pub lookback_days: u32,
    pub signed_url_ttl: Duration,
    pub generate_timeout: Duration,
    pub display_timeout: Duration,
    /// Daily trigger time, UTC.
    pub schedule_utc: NaiveTime,
    pub banner: BannerMode,
    /// Overlay font override; the bundled DejaVu Sans Bold otherwise.
    pub font_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let bind = get(ENV_BIND)
            .unwrap_or_else(|| DEFAULT_BIND.to_string())
            .parse::<SocketAddr>()
            .with_context(|| format!("{ENV_BIND} is not a socket address"))?;

        let text = model_endpoint(
            &get,
            ENV_TEXT_PROVIDER,
            ENV_TEXT_MODEL,
            Provider::default_text_model,
        )?;
        let image = model_endpoint(
            &get,
            ENV_IMAGE_PROVIDER,
            ENV_IMAGE_MODEL,
            Provider::default_image_model,
        )?;

        let store = match get(ENV_STORE).as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("s3") => StoreSettings::S3(s3_config(&get)?),
            Some("memory") => StoreSettings::Memory,
            Some(other) => bail!("{ENV_STORE}: unknown store `{other}` (expected s3 or memory)"),
        };

        let variants = match get(ENV_VARIANTS) {
            Some(list) => VariantSpec::parse_list(&list).context(ENV_VARIANTS)?,
            None => VariantSpec::defaults(),
        };

        let lookback_days: u32 = parse_or(&get, ENV_LOOKBACK_DAYS, DEFAULT_LOOKBACK_DAYS)?;
        if lookback_days == 0 {
            bail!("{ENV_LOOKBACK_DAYS} must be at least 1");
        }

        let signed_url_ttl = secs(&get, ENV_SIGNED_URL_TTL_SECS, DEFAULT_SIGNED_URL_TTL_SECS)?;
        let generate_timeout = secs(&get, ENV_GENERATE_TIMEOUT_SECS, DEFAULT_GENERATE_TIMEOUT_SECS)?;
        let display_timeout = secs(&get, ENV_DISPLAY_TIMEOUT_SECS, DEFAULT_DISPLAY_TIMEOUT_SECS)?;

        let schedule = get(ENV_SCHEDULE_UTC).unwrap_or_else(|| DEFAULT_SCHEDULE_UTC.to_string());
        let schedule_utc = NaiveTime::parse_from_str(&schedule, "%H:%M")
            .with_context(|| format!("{ENV_SCHEDULE_UTC} must be HH:MM, got `{schedule}`"))?;

        let banner = match get(ENV_BANNER) {
            Some(mode) => mode.parse::<BannerMode>().context(ENV_BANNER)?,
            None => BannerMode::default(),
        };

        Ok(Self {
            bind,
            text,
            image,
            google_api_key: get(ENV_GOOGLE_API_KEY).map(Secret::new),
            openai_api_key: get(ENV_OPENAI_API_KEY).map(Secret::new),
            store,
            variants,
            lookback_days,
            signed_url_ttl,
            generate_timeout,
            display_timeout,
            schedule_utc,
            banner,
            font_path: get(ENV_FONT_PATH).map(PathBuf::from),
        })
    }

    /// API key for `provider`, if configured.
    pub fn api_key(&self, provider: Provider) -> Option<&Secret> {
        match provider {
            Provider::Gemini => self.google_api_key.as_ref(),
            Provider::OpenAi => self.openai_api_key.as_ref(),
        }
    }
}

fn model_endpoint<G>(
    get: &G,
    provider_key: &str,
    model_key: &str,
    default_model: fn(Provider) -> &'static str,
) -> Result<ModelEndpoint>
where
    G: Fn(&str) -> Option<String>,
{
    let provider = match get(provider_key) {
        Some(name) => name.parse::<Provider>().context(provider_key.to_string())?,
        None => Provider::Gemini,
    };
    Ok(ModelEndpoint {
        provider,
        model: get(model_key).unwrap_or_else(|| default_model(provider).to_string()),
    })
}

fn s3_config<G>(get: &G) -> Result<S3Config>
where
    G: Fn(&str) -> Option<String>,
{
    let bucket = get(ENV_BUCKET).ok_or_else(|| anyhow!("{ENV_BUCKET} is required for the s3 store"))?;
    let access_key_id = get(ENV_AWS_ACCESS_KEY_ID)
        .ok_or_else(|| anyhow!("{ENV_AWS_ACCESS_KEY_ID} is required for the s3 store"))?;
    let secret_access_key = get(ENV_AWS_SECRET_ACCESS_KEY)
        .ok_or_else(|| anyhow!("{ENV_AWS_SECRET_ACCESS_KEY} is required for the s3 store"))?;
    Ok(S3Config {
        bucket,
        region: get(ENV_AWS_REGION).unwrap_or_else(|| DEFAULT_REGION.to_string()),
        endpoint: get(ENV_S3_ENDPOINT),
        credentials: Credentials {
            access_key_id,
            secret_access_key,
            session_token: get(ENV_AWS_SESSION_TOKEN),
        },
        request_timeout: S3_REQUEST_TIMEOUT,
    })
}

fn parse_or<G, T>(get: &G, key: &str, default: T) -> Result<T>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match get(key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("{key} has invalid value `{raw}`")),
        None => Ok(default),
    }
}

fn secs<G>(get: &G, key: &str, default: u64) -> Result<Duration>
where
    G: Fn(&str) -> Option<String>,
{
    let secs: u64 = parse_or(get, key, default)?;
    if secs == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}
