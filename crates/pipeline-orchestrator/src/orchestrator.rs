use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Instant;

use batch_predictor::{BatchPredictor, PredictionStats};
use chrono::{DateTime, Utc};
use event_risk::apply_event_risk;
use model_staleness::{ModelStalenessTracker, TrainingQueueBuilder};
use opportunity_scorer::OpportunityScorer;
use pipeline_core::{
    EventRiskAssessor, MarketSentimentService, ModelRegistry, PipelinePhase, Predictor,
    SentimentSnapshot, UniverseSource,
};
use tokio::sync::watch;
use universe_scanner::InstrumentUniverseScanner;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::notifier::RunNotifier;
use crate::report::{ReportContext, ReportRenderer};
use crate::run_state::{PipelineRunState, RunResult, RunStatus, RunSummary};
use crate::state_writer::{ErrorStateDocument, StateWriter};

/// Concrete collaborators the orchestrator drives.
pub struct Collaborators {
    pub universe: Arc<dyn UniverseSource>,
    pub sentiment: Arc<dyn MarketSentimentService>,
    pub risk: Arc<dyn EventRiskAssessor>,
    pub predictor: Arc<dyn Predictor>,
    pub registry: Arc<dyn ModelRegistry>,
    pub renderer: Arc<dyn ReportRenderer>,
    pub notifier: Option<Arc<dyn RunNotifier>>,
}

pub struct PipelineOrchestrator {
    config: PipelineConfig,
    scanner: InstrumentUniverseScanner,
    sentiment: Arc<dyn MarketSentimentService>,
    risk: Arc<dyn EventRiskAssessor>,
    predictor: BatchPredictor,
    scorer: OpportunityScorer,
    staleness: ModelStalenessTracker,
    queue_builder: TrainingQueueBuilder,
    renderer: Arc<dyn ReportRenderer>,
    state_writer: StateWriter,
    notifier: Option<Arc<dyn RunNotifier>>,
    status_tx: watch::Sender<RunStatus>,
}

impl PipelineOrchestrator {
    pub fn new(config: PipelineConfig, collaborators: Collaborators) -> Self {
        let priority = model_staleness::priority_from_name(&config.training_priority)
            .unwrap_or_else(|| {
                tracing::warn!(
                    "Unknown training priority '{}', using highest_score",
                    config.training_priority
                );
                Arc::new(model_staleness::HighestOpportunityScore)
            });
        let (status_tx, _) = watch::channel(RunStatus::new(Utc::now()));

        Self {
            scanner: InstrumentUniverseScanner::new(collaborators.universe),
            sentiment: collaborators.sentiment,
            risk: collaborators.risk,
            predictor: BatchPredictor::new(collaborators.predictor, config.prediction_workers)
                .with_high_confidence_threshold(config.high_confidence_threshold),
            scorer: OpportunityScorer::new(),
            staleness: ModelStalenessTracker::new(
                collaborators.registry,
                config.stale_threshold_days,
            ),
            queue_builder: TrainingQueueBuilder::new(priority),
            renderer: collaborators.renderer,
            state_writer: StateWriter::new(config.state_dir.clone()),
            notifier: collaborators.notifier,
            status_tx,
            config,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state_writer(&self) -> &StateWriter {
        &self.state_writer
    }

    /// Watch the current run's phase and progress.
    pub fn subscribe(&self) -> watch::Receiver<RunStatus> {
        self.status_tx.subscribe()
    }

    fn publish(&self, state: &PipelineRunState) {
        self.status_tx.send_replace(state.status().clone());
    }

    fn enter(&self, state: &mut PipelineRunState, phase: PipelinePhase) {
        if state.enter(phase) {
            tracing::info!(
                phase = phase.as_str(),
                progress = state.status().progress_percent,
                "Pipeline phase started"
            );
            self.publish(state);
        }
    }

    fn warn(&self, state: &mut PipelineRunState, message: String) {
        state.warn(message);
        self.publish(state);
    }

    /// Run the whole pipeline once.
    ///
    /// `sectors` and `stocks_per_sector` override the configured values.
    /// Only critical phase failures are returned as errors; the error state
    /// file has already been written when this returns `Err`.
    pub async fn run(
        &self,
        sectors: Option<Vec<String>>,
        stocks_per_sector: Option<usize>,
    ) -> Result<RunResult, PipelineError> {
        let started = Instant::now();
        let started_at = Utc::now();
        let sectors = sectors
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| self.config.sectors.clone());
        let per_sector = stocks_per_sector.unwrap_or(self.config.stocks_per_sector).max(1);

        let mut state = PipelineRunState::new(started_at);
        self.publish(&state);
        tracing::info!(
            sectors = sectors.len(),
            per_sector,
            workers = self.predictor.workers(),
            "Starting nightly pipeline"
        );

        let outcome = match self.config.run_budget {
            Some(budget) => {
                let timed = tokio::time::timeout(
                    budget,
                    self.run_phases(&mut state, &sectors, per_sector, started_at, started),
                )
                .await;
                match timed {
                    Ok(outcome) => outcome,
                    Err(_) => Err(PipelineError::RunBudgetExceeded {
                        phase: state.phase(),
                        budget,
                    }),
                }
            }
            None => {
                self.run_phases(&mut state, &sectors, per_sector, started_at, started)
                    .await
            }
        };

        match outcome {
            Ok(result) => {
                self.enter(&mut state, PipelinePhase::Complete);
                tracing::info!(
                    instruments = result.summary.instruments_scanned,
                    opportunities = result.summary.opportunities,
                    models_queued = result.summary.models_queued,
                    warnings = result.warnings.len(),
                    seconds = result.execution_time_seconds,
                    "Nightly pipeline complete"
                );
                if let Some(notifier) = &self.notifier {
                    if let Err(e) = notifier
                        .notify_success(&result, &result.top_opportunities)
                        .await
                    {
                        tracing::warn!("Success notification failed: {}", e);
                    }
                }
                Ok(result)
            }
            Err(e) => {
                self.handle_failure(&mut state, &e, started_at).await;
                Err(e)
            }
        }
    }

    async fn run_phases(
        &self,
        state: &mut PipelineRunState,
        sectors: &[String],
        per_sector: usize,
        started_at: DateTime<Utc>,
        started: Instant,
    ) -> Result<RunResult, PipelineError> {
        let run_date = started_at.date_naive();
        let mut summary = RunSummary {
            sectors_requested: sectors.len(),
            ..RunSummary::default()
        };

        // 1. Market sentiment
        self.enter(state, PipelinePhase::MarketSentiment);
        let sentiment = match self.sentiment.get_snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.warn(
                    state,
                    format!("Market sentiment unavailable, using neutral default: {e}"),
                );
                SentimentSnapshot::neutral()
            }
        };

        // 2. Universe scan
        self.enter(state, PipelinePhase::StockScanning);
        let scan = self.scanner.scan(sectors, per_sector).await;
        for failure in &scan.failed_sectors {
            self.warn(
                state,
                format!("Sector {} scan failed: {}", failure.sector, failure.error),
            );
        }
        summary.sectors_failed = scan.failed_sectors.len();
        let instruments = scan.instruments;
        if instruments.is_empty() {
            return Err(PipelineError::NoInstrumentsScanned {
                sectors: sectors.len(),
            });
        }
        summary.instruments_scanned = instruments.len();
        state.set_total(instruments.len());
        self.publish(state);
        let symbols: Vec<String> = instruments.iter().map(|i| i.symbol.clone()).collect();

        // 3. Event risk
        self.enter(state, PipelinePhase::EventRiskAssessment);
        let risks = match self.risk.assess_batch(&symbols).await {
            Ok(risks) => risks,
            Err(e) => {
                self.warn(
                    state,
                    format!("Event risk assessment unavailable, assuming no event risk: {e}"),
                );
                HashMap::new()
            }
        };
        tracing::info!("Event risk flagged {} of {} instruments", risks.len(), symbols.len());

        // 4. Prediction, then event-risk adjustment
        self.enter(state, PipelinePhase::Prediction);
        let batch = self.predictor.predict_batch(&instruments, &sentiment).await;
        state.set_processed(batch.predictions.len());
        self.publish(state);
        let mut predictions = batch.predictions;
        let adjustment = apply_event_risk(&mut predictions, &risks);
        let statistics = PredictionStats::from_predictions(
            predictions.values(),
            self.config.high_confidence_threshold,
        );
        summary.predictions_completed = statistics.completed;
        summary.predictions_failed = statistics.failed;
        summary.skipped_for_event_risk = adjustment.skipped.len();
        summary.haircut_for_event_risk = adjustment.haircut.len();

        // 5. Scoring and retraining queue
        self.enter(state, PipelinePhase::Scoring);
        let opportunities = self
            .scorer
            .score(&instruments, &predictions, &sentiment, &risks);
        summary.opportunities = opportunities.len();

        let staleness = self.staleness.stale_symbols(&symbols, started_at).await;
        if !staleness.registry_failures.is_empty() {
            self.warn(
                state,
                format!(
                    "Model registry lookup failed for {} symbol(s), treated as stale: {}",
                    staleness.registry_failures.len(),
                    staleness.registry_failures.join(", ")
                ),
            );
        }
        let training_queue = self.queue_builder.build_queue(
            &opportunities,
            &staleness.stale,
            self.config.max_models_per_night,
        );
        summary.stale_models = staleness.stale.len();
        summary.models_queued = training_queue.len();

        // 6. Report and state
        self.enter(state, PipelinePhase::ReportGeneration);
        let rendered = self
            .renderer
            .render(&ReportContext {
                run_date,
                generated_at: Utc::now(),
                opportunities: &opportunities,
                sentiment: &sentiment,
                stats: &statistics,
                summary: &summary,
                warnings: &state.status().warnings,
                training_queue: &training_queue,
                top_n: self.config.report_top_n,
            })
            .await
            .map_err(|source| PipelineError::ReportGeneration { source })?;

        let top_n = self.config.report_top_n.min(opportunities.len());
        let result = RunResult {
            status: "success".to_string(),
            run_date,
            timestamp: Utc::now(),
            execution_time_seconds: started.elapsed().as_secs_f64(),
            summary,
            statistics,
            market_sentiment: sentiment,
            top_opportunities: opportunities[..top_n].to_vec(),
            report_path: rendered.report_path.display().to_string(),
            csv_paths: rendered
                .csv_paths
                .iter()
                .map(|(k, v)| (k.clone(), v.display().to_string()))
                .collect::<BTreeMap<_, _>>(),
            errors: state.status().errors.clone(),
            warnings: state.status().warnings.clone(),
            training_queue,
            event_risk: adjustment,
            opportunities,
        };

        self.state_writer.write_state(&result).await?;
        Ok(result)
    }

    async fn handle_failure(
        &self,
        state: &mut PipelineRunState,
        error: &PipelineError,
        started_at: DateTime<Utc>,
    ) {
        let failed_phase = error.phase();
        state.fail(error.to_string(), failed_phase);
        self.publish(state);

        let traceback = error.traceback();
        let document = ErrorStateDocument {
            timestamp: Utc::now(),
            error: error.to_string(),
            traceback: traceback.clone(),
            failed_phase,
            status: state.status().clone(),
        };
        if let Err(e) = self
            .state_writer
            .write_error(started_at.date_naive(), &document)
            .await
        {
            tracing::error!("Failed to persist pipeline error state: {}", e);
        }

        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier
                .notify_error(&error.to_string(), &traceback, failed_phase)
                .await
            {
                tracing::warn!("Failure notification failed: {}", e);
            }
        }
    }
}
