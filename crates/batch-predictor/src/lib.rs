mod model_service;
mod pool;
mod stats;

pub use model_service::ModelServicePredictor;
pub use pool::{BatchOutcome, BatchPredictor};
pub use stats::PredictionStats;
