//! Nightly pipeline orchestration.
//!
//! Drives sentiment, scanning, event risk, prediction, scoring and report
//! generation in a fixed order, tracks coarse progress, and persists a
//! dated state snapshot that downstream consumers read.

mod config;
mod error;
mod notifier;
mod orchestrator;
mod report;
mod run_state;
mod state_writer;


pub use config::PipelineConfig;
pub use error::{PipelineError, ReportError};
pub use notifier::RunNotifier;
pub use orchestrator::{Collaborators, PipelineOrchestrator};
pub use report::{MarkdownReportRenderer, RenderedReport, ReportContext, ReportRenderer};
pub use run_state::{PipelineRunState, RunResult, RunStatus, RunSummary};
pub use state_writer::{ErrorStateDocument, StateWriter};
