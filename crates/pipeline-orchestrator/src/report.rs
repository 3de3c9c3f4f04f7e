use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use batch_predictor::PredictionStats;
use chrono::{DateTime, NaiveDate, Utc};
use pipeline_core::{Opportunity, SentimentSnapshot, TrainingQueueEntry};
use serde::Serialize;

use crate::error::ReportError;
use crate::run_state::RunSummary;

/// Everything a renderer may show about a finished run.
#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub run_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub opportunities: &'a [Opportunity],
    pub sentiment: &'a SentimentSnapshot,
    pub stats: &'a PredictionStats,
    pub summary: &'a RunSummary,
    pub warnings: &'a [String],
    pub training_queue: &'a [TrainingQueueEntry],
    pub top_n: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedReport {
    pub report_path: PathBuf,
    pub csv_paths: BTreeMap<String, PathBuf>,
}

#[async_trait]
pub trait ReportRenderer: Send + Sync {
    async fn render(&self, ctx: &ReportContext<'_>) -> Result<RenderedReport, ReportError>;
}

/// Writes `nightly_report_<date>.md` and `opportunities_<date>.csv` into the
/// report directory. Same-day runs overwrite both files.
pub struct MarkdownReportRenderer {
    report_dir: PathBuf,
}

#[derive(Debug, Serialize)]
struct OpportunityRow<'a> {
    rank: usize,
    symbol: &'a str,
    name: &'a str,
    sector: &'a str,
    last_price: f64,
    signal: &'a str,
    confidence: f64,
    opportunity_score: f64,
    confidence_component: f64,
    sentiment_component: f64,
    signal_component: f64,
    risk_penalty: f64,
    skip_reason: &'a str,
}

impl MarkdownReportRenderer {
    pub fn new(report_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_dir: report_dir.into(),
        }
    }

    pub fn report_path(&self, run_date: NaiveDate) -> PathBuf {
        self.report_dir
            .join(format!("nightly_report_{}.md", run_date.format("%Y%m%d")))
    }

    pub fn csv_path(&self, run_date: NaiveDate) -> PathBuf {
        self.report_dir
            .join(format!("opportunities_{}.csv", run_date.format("%Y%m%d")))
    }

    fn render_markdown(ctx: &ReportContext<'_>) -> String {
        let mut md = String::new();
        let s = ctx.summary;

        let _ = writeln!(md, "# Nightly Pipeline Report: {}\n", ctx.run_date);
        let _ = writeln!(md, "Generated {} UTC\n", ctx.generated_at.format("%Y-%m-%d %H:%M:%S"));

        md.push_str("## Summary\n\n");
        let _ = writeln!(md, "| Metric | Value |\n|---|---|");
        let _ = writeln!(
            md,
            "| Sectors scanned | {} ({} failed) |",
            s.sectors_requested, s.sectors_failed
        );
        let _ = writeln!(md, "| Instruments | {} |", s.instruments_scanned);
        let _ = writeln!(
            md,
            "| Predictions | {} completed, {} failed |",
            s.predictions_completed, s.predictions_failed
        );
        let _ = writeln!(
            md,
            "| Signals | {} BUY / {} SELL / {} HOLD |",
            ctx.stats.buy_signals, ctx.stats.sell_signals, ctx.stats.hold_signals
        );
        let _ = writeln!(md, "| Mean confidence | {:.1}% |", ctx.stats.mean_confidence);
        let _ = writeln!(
            md,
            "| High confidence (>= {:.0}%) | {} |",
            ctx.stats.high_confidence_threshold, ctx.stats.high_confidence_count
        );
        let _ = writeln!(
            md,
            "| Event risk | {} skipped, {} haircut |",
            s.skipped_for_event_risk, s.haircut_for_event_risk
        );
        let _ = writeln!(
            md,
            "| Models queued | {} of {} stale |\n",
            s.models_queued, s.stale_models
        );

        md.push_str("## Market Sentiment\n\n");
        let _ = writeln!(
            md,
            "Score **{:.1}** ({}): {}\n",
            ctx.sentiment.score,
            ctx.sentiment.bias.as_str(),
            ctx.sentiment.recommendation
        );

        let top = ctx.top_n.min(ctx.opportunities.len());
        let _ = writeln!(md, "## Top {} Opportunities\n", top);
        if top == 0 {
            md.push_str("_No opportunities ranked._\n\n");
        } else {
            md.push_str("| # | Symbol | Sector | Price | Signal | Confidence | Score | Note |\n");
            md.push_str("|---|---|---|---|---|---|---|---|\n");
            for o in &ctx.opportunities[..top] {
                let _ = writeln!(
                    md,
                    "| {} | {} | {} | {:.2} | {} | {:.1}% | {:.1} | {} |",
                    o.rank,
                    o.symbol,
                    o.sector,
                    o.last_price,
                    o.signal,
                    o.confidence,
                    o.opportunity_score,
                    o.skip_reason.as_deref().unwrap_or("")
                );
            }
            md.push('\n');
        }

        md.push_str("## Training Queue\n\n");
        if ctx.training_queue.is_empty() {
            md.push_str("_No stale models._\n\n");
        } else {
            for entry in ctx.training_queue {
                let _ = writeln!(
                    md,
                    "{}. {} (score {:.1})",
                    entry.priority_rank, entry.symbol, entry.opportunity_score
                );
            }
            md.push('\n');
        }

        if !ctx.warnings.is_empty() {
            md.push_str("## Warnings\n\n");
            for w in ctx.warnings {
                let _ = writeln!(md, "- {w}");
            }
            md.push('\n');
        }
        md
    }

    fn render_csv(opportunities: &[Opportunity]) -> Result<Vec<u8>, ReportError> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(true)
            .from_writer(Vec::new());

        for o in opportunities {
            wtr.serialize(OpportunityRow {
                rank: o.rank,
                symbol: &o.symbol,
                name: &o.name,
                sector: &o.sector,
                last_price: o.last_price,
                signal: o.signal.as_str(),
                confidence: o.confidence,
                opportunity_score: o.opportunity_score,
                confidence_component: o.components.confidence,
                sentiment_component: o.components.sentiment,
                signal_component: o.components.signal,
                risk_penalty: o.components.risk_penalty,
                skip_reason: o.skip_reason.as_deref().unwrap_or(""),
            })?;
        }

        wtr.into_inner()
            .map_err(|e| ReportError::Render(format!("Failed to flush CSV: {}", e.error())))
    }
}

async fn write_file(path: &Path, contents: &[u8]) -> Result<(), ReportError> {
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| ReportError::Io {
            path: path.display().to_string(),
            source,
        })
}

#[async_trait]
impl ReportRenderer for MarkdownReportRenderer {
    async fn render(&self, ctx: &ReportContext<'_>) -> Result<RenderedReport, ReportError> {
        tokio::fs::create_dir_all(&self.report_dir)
            .await
            .map_err(|source| ReportError::Io {
                path: self.report_dir.display().to_string(),
                source,
            })?;

        let report_path = self.report_path(ctx.run_date);
        write_file(&report_path, Self::render_markdown(ctx).as_bytes()).await?;

        let csv_path = self.csv_path(ctx.run_date);
        write_file(&csv_path, &Self::render_csv(ctx.opportunities)?).await?;

        tracing::info!("Report written to {}", report_path.display());
        Ok(RenderedReport {
            report_path,
            csv_paths: BTreeMap::from([("opportunities".to_string(), csv_path)]),
        })
    }
}
