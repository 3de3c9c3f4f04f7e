//! Opportunity Scoring Module
//!
//! Combines adjusted predictions, the run's sentiment snapshot, and event
//! risk into a ranked 0-100 opportunity list.

mod scorer;

pub use scorer::{OpportunityScorer, ScoringWeights};
