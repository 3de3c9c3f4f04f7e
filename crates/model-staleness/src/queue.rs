use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::Arc;

use pipeline_core::{Opportunity, TrainingQueueEntry};

/// Ordering applied to stale candidates before the queue is truncated.
pub trait TrainingPriority: Send + Sync {
    fn name(&self) -> &str;

    /// `Less` means `a` is trained first.
    fn compare(&self, a: &Opportunity, b: &Opportunity) -> Ordering;
}

/// Highest current opportunity score first, ties by symbol.
#[derive(Debug, Clone, Copy, Default)]
pub struct HighestOpportunityScore;

impl TrainingPriority for HighestOpportunityScore {
    fn name(&self) -> &str {
        "highest_score"
    }

    fn compare(&self, a: &Opportunity, b: &Opportunity) -> Ordering {
        b.opportunity_score
            .total_cmp(&a.opportunity_score)
            .then_with(|| a.symbol.cmp(&b.symbol))
    }
}

/// Resolve a configured strategy name. Only built-in strategies are known.
pub fn priority_from_name(name: &str) -> Option<Arc<dyn TrainingPriority>> {
    match name.trim().to_ascii_lowercase().as_str() {
        "highest_score" | "highest_opportunity_score" => Some(Arc::new(HighestOpportunityScore)),
        _ => None,
    }
}

pub struct TrainingQueueBuilder {
    priority: Arc<dyn TrainingPriority>,
}

impl Default for TrainingQueueBuilder {
    fn default() -> Self {
        Self::new(Arc::new(HighestOpportunityScore))
    }
}

impl TrainingQueueBuilder {
    pub fn new(priority: Arc<dyn TrainingPriority>) -> Self {
        Self { priority }
    }

    pub fn priority_name(&self) -> &str {
        self.priority.name()
    }

    /// Stale symbols that appear in this run's opportunities, ordered by the
    /// priority strategy and capped at `max_size`.
    pub fn build_queue(
        &self,
        opportunities: &[Opportunity],
        stale: &BTreeSet<String>,
        max_size: usize,
    ) -> Vec<TrainingQueueEntry> {
        if stale.is_empty() || max_size == 0 {
            return Vec::new();
        }

        let mut candidates: Vec<&Opportunity> = opportunities
            .iter()
            .filter(|o| stale.contains(&o.symbol))
            .collect();
        candidates.sort_by(|a, b| self.priority.compare(a, b));
        candidates.dedup_by(|a, b| a.symbol == b.symbol);
        candidates.truncate(max_size);

        let queue: Vec<TrainingQueueEntry> = candidates
            .into_iter()
            .enumerate()
            .map(|(i, o)| TrainingQueueEntry {
                symbol: o.symbol.clone(),
                opportunity_score: o.opportunity_score,
                priority_rank: i + 1,
            })
            .collect();

        tracing::info!(
            "Training queue: {} of {} stale models ({})",
            queue.len(),
            stale.len(),
            self.priority.name()
        );
        queue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline_core::{ScoreBreakdown, Signal};

    fn opportunity(symbol: &str, score: f64) -> Opportunity {
        Opportunity {
            symbol: symbol.to_string(),
            name: symbol.to_string(),
            sector: "technology".to_string(),
            last_price: 10.0,
            signal: Signal::Buy,
            confidence: score,
            opportunity_score: score,
            rank: 0,
            components: ScoreBreakdown {
                confidence: score,
                sentiment: 50.0,
                signal: 100.0,
                risk_penalty: 0.0,
            },
            skip_reason: None,
        }
    }

    #[test]
    fn test_queue_is_capped_to_highest_scores() {
        let opportunities: Vec<Opportunity> = (0..60)
            .map(|i| opportunity(&format!("S{i:02}"), i as f64))
            .collect();
        let stale: BTreeSet<String> = (10..60).map(|i| format!("S{i:02}")).collect();
        assert_eq!(stale.len(), 50);

        let queue = TrainingQueueBuilder::default().build_queue(&opportunities, &stale, 20);

        assert_eq!(queue.len(), 20);
        assert_eq!(queue[0].symbol, "S59");
        assert_eq!(queue[0].priority_rank, 1);
        assert_eq!(queue[19].symbol, "S40");
        assert_eq!(queue[19].priority_rank, 20);
    }

    #[test]
    fn test_ties_break_by_symbol() {
        let opportunities = vec![opportunity("MSFT", 80.0), opportunity("AAPL", 80.0)];
        let stale: BTreeSet<String> = ["MSFT", "AAPL"].iter().map(|s| s.to_string()).collect();

        let queue = TrainingQueueBuilder::default().build_queue(&opportunities, &stale, 5);

        assert_eq!(queue[0].symbol, "AAPL");
        assert_eq!(queue[1].symbol, "MSFT");
    }

    #[test]
    fn test_empty_stale_set_gives_empty_queue() {
        let opportunities = vec![opportunity("AAPL", 90.0)];
        let queue =
            TrainingQueueBuilder::default().build_queue(&opportunities, &BTreeSet::new(), 20);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_stale_symbols_without_opportunity_are_ignored() {
        let opportunities = vec![opportunity("AAPL", 90.0)];
        let stale: BTreeSet<String> = ["AAPL", "ZZZ"].iter().map(|s| s.to_string()).collect();
        let queue = TrainingQueueBuilder::default().build_queue(&opportunities, &stale, 20);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_priority_lookup() {
        assert!(priority_from_name("highest_score").is_some());
        assert!(priority_from_name("round_robin").is_none());
    }
}
