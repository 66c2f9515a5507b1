use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use content::{ContentStore, MemoryContentStore, PostProcessor, S3ContentStore};
use daily_picture::config::{AppConfig, StoreSettings};
use daily_picture::display::{DisplayService, DisplaySettings};
use daily_picture::generator::{ContentGenerator, GeneratorSettings};
use daily_picture::providers::{build_image_model, build_text_model};
use daily_picture::{scheduler, server};
use tracing::{info, warn};

/// Daily historical-event artwork generator and e-paper display API.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API and run the daily schedule
    Serve {
        /// Do not start the daily generation loop
        #[arg(long, default_value_t = false)]
        no_schedule: bool,
    },
    /// Run one generation and exit
    Generate {
        /// Art style key (unknown keys fall back to the default style)
        #[arg(long)]
        style: Option<String>,
        /// Date to generate for, YYYY-MM-DD (defaults to today, UTC)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

fn build_store(settings: &StoreSettings) -> Result<Arc<dyn ContentStore>> {
    Ok(match settings {
        StoreSettings::Memory => {
            warn!("Using the in-memory store; nothing survives a restart");
            Arc::new(MemoryContentStore::new())
        }
        StoreSettings::S3(s3) => {
            info!(bucket = %s3.bucket, region = %s3.region, "Using S3 store");
            Arc::new(S3ContentStore::new(s3.clone()).context("failed to build S3 store")?)
        }
    })
}

fn build_generator(config: &AppConfig, store: Arc<dyn ContentStore>) -> Result<ContentGenerator> {
    let text = build_text_model(&config.text, config).context("text model")?;
    let image = build_image_model(&config.image, config).context("image model")?;
    let processor = PostProcessor::from_font_path(config.font_path.as_deref())
        .context("failed to load banner font")?;
    Ok(ContentGenerator::new(
        text,
        image,
        store,
        processor,
        GeneratorSettings::from_config(config),
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("invalid configuration")?;
    info!(
        text_provider = %config.text.provider,
        text_model = %config.text.model,
        image_provider = %config.image.provider,
        image_model = %config.image.model,
        variants = config.variants.len(),
        "daily-picture starting"
    );

    let store = build_store(&config.store)?;
    let generator = Arc::new(build_generator(&config, store.clone())?);

    match cli.command {
        Command::Generate { style, date } => {
            let report = generator.generate(style.as_deref(), date).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Serve { no_schedule } => {
            if no_schedule {
                info!("Daily schedule disabled");
            } else {
                scheduler::spawn(generator.clone(), config.schedule_utc);
            }
            let display = Arc::new(DisplayService::new(
                store,
                DisplaySettings::from_config(&config),
            ));
            let listener = tokio::net::TcpListener::bind(config.bind)
                .await
                .with_context(|| format!("failed to bind {}", config.bind))?;
            server::serve(listener, server::AppState { generator, display }).await?;
        }
    }

    Ok(())
}
