use std::time::Duration;

use pipeline_core::PipelinePhase;
use thiserror::Error;

/// Report rendering failure. Always fatal to the run.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Report rendering failed: {0}")]
    Render(String),
}

/// Critical phase failure; the only error that leaves the orchestrator.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No instruments scanned across {sectors} sector(s)")]
    NoInstrumentsScanned { sectors: usize },

    #[error("Report generation failed")]
    ReportGeneration {
        #[source]
        source: ReportError,
    },

    #[error("Failed to persist pipeline state to {path}")]
    StatePersistence {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Run budget of {budget:?} exceeded during {phase}")]
    RunBudgetExceeded {
        phase: PipelinePhase,
        budget: Duration,
    },
}

impl PipelineError {
    /// Phase the run was in when this error occurred.
    pub fn phase(&self) -> PipelinePhase {
        match self {
            PipelineError::NoInstrumentsScanned { .. } => PipelinePhase::StockScanning,
            PipelineError::ReportGeneration { .. } | PipelineError::StatePersistence { .. } => {
                PipelinePhase::ReportGeneration
            }
            PipelineError::RunBudgetExceeded { phase, .. } => *phase,
        }
    }

    /// Messages of this error's source chain, outermost cause first.
    pub fn traceback(&self) -> Vec<String> {
        let mut chain = Vec::new();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            chain.push(cause.to_string());
            source = cause.source();
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traceback_follows_sources() {
        let err = PipelineError::ReportGeneration {
            source: ReportError::Io {
                path: "reports/nightly_report_20261019.md".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
            },
        };

        let trace = err.traceback();
        assert_eq!(trace.len(), 2);
        assert!(trace[0].starts_with("I/O error writing reports/"));
        assert_eq!(trace[1], "denied");
        assert_eq!(err.phase(), PipelinePhase::ReportGeneration);
    }

    #[test]
    fn test_scan_failure_phase() {
        let err = PipelineError::NoInstrumentsScanned { sectors: 3 };
        assert_eq!(err.phase(), PipelinePhase::StockScanning);
        assert!(err.traceback().is_empty());
    }
}
