use async_trait::async_trait;
use notification_service::{Alert, AlertType, NotificationError, NotificationService, TopPick};
use pipeline_core::{Opportunity, PipelinePhase};

use crate::run_state::RunResult;

/// Best-effort run notifications. Errors are logged by the caller and
/// never change the run outcome.
#[async_trait]
pub trait RunNotifier: Send + Sync {
    async fn notify_success(
        &self,
        result: &RunResult,
        top_opportunities: &[Opportunity],
    ) -> Result<(), NotificationError>;

    async fn notify_error(
        &self,
        message: &str,
        traceback: &[String],
        phase: PipelinePhase,
    ) -> Result<(), NotificationError>;
}

#[async_trait]
impl RunNotifier for NotificationService {
    async fn notify_success(
        &self,
        result: &RunResult,
        top_opportunities: &[Opportunity],
    ) -> Result<(), NotificationError> {
        let top_picks: Vec<TopPick> = top_opportunities
            .iter()
            .map(|o| TopPick {
                symbol: o.symbol.clone(),
                signal: o.signal.as_str().to_string(),
                confidence: o.confidence,
                opportunity_score: o.opportunity_score,
            })
            .collect();

        let message = match top_opportunities.first() {
            Some(best) => format!(
                "{} opportunities ranked; best {} ({} {:.0}%)",
                result.summary.opportunities, best.symbol, best.signal, best.confidence
            ),
            None => "No opportunities ranked".to_string(),
        };

        let alert = Alert::new(
            AlertType::PipelineCompleted {
                run_date: result.run_date.to_string(),
                instruments_scanned: result.summary.instruments_scanned,
                opportunities: result.summary.opportunities,
                models_queued: result.summary.models_queued,
                warnings: result.warnings.len(),
                execution_time_seconds: result.execution_time_seconds,
                report_path: result.report_path.clone(),
                top_picks,
            },
            format!("Nightly pipeline complete: {}", result.run_date),
            message,
        );
        self.send_alert_async(&alert).await;
        Ok(())
    }

    async fn notify_error(
        &self,
        message: &str,
        traceback: &[String],
        phase: PipelinePhase,
    ) -> Result<(), NotificationError> {
        let alert = Alert::new(
            AlertType::PipelineFailed {
                phase: phase.as_str().to_string(),
                error: message.to_string(),
                traceback: traceback.to_vec(),
            },
            format!("Nightly pipeline FAILED during {}", phase),
            message,
        );
        let delivered = self.send_alert_async(&alert).await;
        if delivered == 0 && self.channel_count() > 0 {
            return Err(NotificationError::Config(
                "no channel accepted the failure alert".into(),
            ));
        }
        Ok(())
    }
}
