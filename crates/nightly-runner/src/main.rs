use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use batch_predictor::ModelServicePredictor;
use clap::Parser;
use event_risk::{CalendarEvent, CalendarRiskAssessor, EventCalendar, JsonEventCalendar};
use market_sentiment::HttpSentimentService;
use model_staleness::FsModelRegistry;
use notification_service::{NotificationConfig, NotificationService};
use pipeline_core::{CollaboratorError, RetryPolicy};
use pipeline_orchestrator::{
    Collaborators, MarkdownReportRenderer, PipelineConfig, PipelineOrchestrator, RunNotifier,
};
use universe_scanner::JsonUniverseSource;

#[derive(Parser)]
#[command(author, version, about = "Nightly equities pipeline", long_about = None)]
struct Cli {
    /// Comma-separated sectors, overrides PIPELINE_SECTORS
    #[arg(long, value_delimiter = ',')]
    sectors: Vec<String>,

    /// Instruments per sector, overrides STOCKS_PER_SECTOR
    #[arg(long)]
    per_sector: Option<usize>,

    /// Overrides PIPELINE_STATE_DIR
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Overrides PIPELINE_REPORT_DIR
    #[arg(long)]
    report_dir: Option<PathBuf>,
}

/// Used when no event calendar is configured.
struct NoScheduledEvents;

#[async_trait]
impl EventCalendar for NoScheduledEvents {
    async fn events_for(
        &self,
        _symbols: &[String],
    ) -> Result<Vec<CalendarEvent>, CollaboratorError> {
        Ok(Vec::new())
    }
}

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt().json().with_env_filter(filter()).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter()).init();
    }

    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));
}

fn build_collaborators(config: &PipelineConfig) -> Result<Collaborators> {
    let sentiment = HttpSentimentService::new(
        config.sentiment_service_url.clone(),
        config.collaborator_timeout,
    )
    .context("Failed to build sentiment client")?
    .with_retry(RetryPolicy::default());

    let predictor =
        ModelServicePredictor::new(config.ml_service_url.clone(), config.collaborator_timeout)
            .context("Failed to build model service client")?;

    let calendar: Arc<dyn EventCalendar> = match &config.event_calendar_path {
        Some(path) => Arc::new(JsonEventCalendar::new(path.clone())),
        None => {
            tracing::warn!("EVENT_CALENDAR_PATH not set, no event risk will be flagged");
            Arc::new(NoScheduledEvents)
        }
    };

    let notifications = NotificationService::new(&NotificationConfig::from_env());
    let notifier: Option<Arc<dyn RunNotifier>> = if notifications.channel_count() > 0 {
        Some(Arc::new(notifications))
    } else {
        tracing::info!("No notification channels configured");
        None
    };

    Ok(Collaborators {
        universe: Arc::new(JsonUniverseSource::new(config.universe_dir.clone())),
        sentiment: Arc::new(sentiment),
        risk: Arc::new(CalendarRiskAssessor::new(calendar)),
        predictor: Arc::new(predictor),
        registry: Arc::new(FsModelRegistry::new(config.model_dir.clone())),
        renderer: Arc::new(MarkdownReportRenderer::new(config.report_dir.clone())),
        notifier,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    let mut config = PipelineConfig::from_env()?;
    if let Some(dir) = cli.state_dir {
        config.state_dir = dir;
    }
    if let Some(dir) = cli.report_dir {
        config.report_dir = dir;
    }
    config.validate()?;

    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Sectors: {}", config.sectors.join(", "));
    tracing::info!("  Prediction workers: {}", config.prediction_workers);
    tracing::info!("  Stale threshold: {} days", config.stale_threshold_days);
    tracing::info!("  Max models per night: {}", config.max_models_per_night);
    if let Some(budget) = config.run_budget {
        tracing::info!("  Run budget: {:?}", budget);
    }

    let collaborators = build_collaborators(&config)?;
    let orchestrator = PipelineOrchestrator::new(config, collaborators);

    let sectors = cli
        .sectors
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();
    let sectors = (!sectors.is_empty()).then_some(sectors);

    let result = orchestrator
        .run(sectors, cli.per_sector)
        .await
        .context("Nightly pipeline failed")?;

    let state_path = orchestrator.state_writer().state_path(result.run_date);
    println!("{}", state_path.display());
    Ok(())
}
