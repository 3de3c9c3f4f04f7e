//! Instrument universe scanning.
//!
//! Walks the requested sectors through a [`UniverseSource`], skipping any
//! sector whose fetch fails, and returns whatever subset succeeded.

mod json_source;

pub use json_source::JsonUniverseSource;

use std::collections::HashSet;
use std::sync::Arc;

use pipeline_core::{Instrument, UniverseSource};

pub const DEFAULT_SECTORS: &[&str] = &[
    "technology",
    "healthcare",
    "financials",
    "energy",
    "consumer_discretionary",
    "industrials",
    "communications",
    "consumer_staples",
];

/// A sector whose fetch failed during a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct SectorFailure {
    pub sector: String,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct ScanOutcome {
    pub instruments: Vec<Instrument>,
    pub failed_sectors: Vec<SectorFailure>,
}

pub struct InstrumentUniverseScanner {
    source: Arc<dyn UniverseSource>,
}

impl InstrumentUniverseScanner {
    pub fn new(source: Arc<dyn UniverseSource>) -> Self {
        Self { source }
    }

    /// Scan each sector in order. Symbols are unique across the outcome;
    /// a symbol listed by several sectors keeps its first sector.
    pub async fn scan(&self, sectors: &[String], per_sector_limit: usize) -> ScanOutcome {
        let mut outcome = ScanOutcome::default();
        let mut seen: HashSet<String> = HashSet::new();

        tracing::info!(
            "Scanning {} sectors via {} (limit {} per sector)",
            sectors.len(),
            self.source.name(),
            per_sector_limit
        );

        for sector in sectors {
            match self.source.fetch_sector(sector, per_sector_limit).await {
                Ok(mut instruments) => {
                    instruments.truncate(per_sector_limit);
                    let fetched = instruments.len();
                    let mut added = 0usize;
                    for instrument in instruments {
                        if seen.insert(instrument.symbol.clone()) {
                            outcome.instruments.push(instrument);
                            added += 1;
                        } else {
                            tracing::debug!(
                                "Skipping duplicate {} from sector {}",
                                instrument.symbol,
                                sector
                            );
                        }
                    }
                    tracing::info!("Sector {}: {} instruments ({} new)", sector, fetched, added);
                }
                Err(e) => {
                    tracing::warn!("Sector {} scan failed: {}", sector, e);
                    outcome.failed_sectors.push(SectorFailure {
                        sector: sector.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Universe scan: {} instruments, {} failed sectors",
            outcome.instruments.len(),
            outcome.failed_sectors.len()
        );
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use pipeline_core::CollaboratorError;

    struct FakeSource;

    fn instrument(symbol: &str, sector: &str) -> Instrument {
        Instrument {
            symbol: symbol.to_string(),
            name: format!("{} Inc", symbol),
            sector: sector.to_string(),
            last_price: 100.0,
            scanned_at: Utc::now(),
        }
    }

    #[async_trait]
    impl UniverseSource for FakeSource {
        async fn fetch_sector(
            &self,
            sector: &str,
            limit: usize,
        ) -> Result<Vec<Instrument>, CollaboratorError> {
            match sector {
                "broken" => Err(CollaboratorError::ServiceUnavailable("feed down".into())),
                "tech" => Ok(["AAPL", "MSFT", "NVDA", "AMD"]
                    .iter()
                    .take(limit)
                    .map(|s| instrument(s, sector))
                    .collect()),
                "semis" => Ok(vec![instrument("NVDA", sector), instrument("TSM", sector)]),
                _ => Ok(vec![]),
            }
        }

        fn name(&self) -> &str {
            "fake"
        }
    }

    #[tokio::test]
    async fn test_failed_sector_is_skipped() {
        let scanner = InstrumentUniverseScanner::new(Arc::new(FakeSource));
        let sectors = vec!["tech".to_string(), "broken".to_string()];

        let outcome = scanner.scan(&sectors, 10).await;

        assert_eq!(outcome.instruments.len(), 4);
        assert_eq!(outcome.failed_sectors.len(), 1);
        assert_eq!(outcome.failed_sectors[0].sector, "broken");
    }

    #[tokio::test]
    async fn test_duplicates_keep_first_sector() {
        let scanner = InstrumentUniverseScanner::new(Arc::new(FakeSource));
        let sectors = vec!["tech".to_string(), "semis".to_string()];

        let outcome = scanner.scan(&sectors, 10).await;

        let symbols: Vec<&str> = outcome.instruments.iter().map(|i| i.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT", "NVDA", "AMD", "TSM"]);
        let nvda = outcome.instruments.iter().find(|i| i.symbol == "NVDA").unwrap();
        assert_eq!(nvda.sector, "tech");
    }

    #[tokio::test]
    async fn test_per_sector_limit() {
        let scanner = InstrumentUniverseScanner::new(Arc::new(FakeSource));
        let outcome = scanner.scan(&["tech".to_string()], 2).await;
        assert_eq!(outcome.instruments.len(), 2);
    }
}
