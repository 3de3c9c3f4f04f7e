//! Model staleness tracking and nightly retraining queue.

mod queue;
mod registry;
mod tracker;

pub use queue::{
    priority_from_name, HighestOpportunityScore, TrainingPriority, TrainingQueueBuilder,
};
pub use registry::FsModelRegistry;
pub use tracker::{ModelStalenessTracker, StalenessReport};
