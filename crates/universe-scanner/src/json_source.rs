use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use pipeline_core::{CollaboratorError, Instrument, UniverseSource};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct UniverseRow {
    symbol: String,
    #[serde(default)]
    name: Option<String>,
    last_price: f64,
}

/// Reads one `<sector>.json` file per sector from a universe directory.
///
/// Each file holds an array of `{ "symbol", "name", "last_price" }` rows,
/// typically exported by the nightly market-data sync.
pub struct JsonUniverseSource {
    dir: PathBuf,
}

impl JsonUniverseSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn sector_path(&self, sector: &str) -> PathBuf {
        let file = sector
            .trim()
            .to_ascii_lowercase()
            .replace([' ', '-'], "_");
        self.dir.join(format!("{file}.json"))
    }
}

#[async_trait]
impl UniverseSource for JsonUniverseSource {
    async fn fetch_sector(
        &self,
        sector: &str,
        limit: usize,
    ) -> Result<Vec<Instrument>, CollaboratorError> {
        let path = self.sector_path(sector);
        let raw = tokio::fs::read_to_string(&path).await?;
        let rows: Vec<UniverseRow> = serde_json::from_str(&raw)?;

        let scanned_at = Utc::now();
        let instruments: Vec<Instrument> = rows
            .into_iter()
            .filter_map(|row| {
                let symbol = row.symbol.trim().to_ascii_uppercase();
                if symbol.is_empty() || !row.last_price.is_finite() || row.last_price <= 0.0 {
                    tracing::debug!(
                        "Dropping unusable universe row '{}' in {}",
                        row.symbol,
                        sector
                    );
                    return None;
                }
                Some(Instrument {
                    name: row.name.unwrap_or_else(|| symbol.clone()),
                    symbol,
                    sector: sector.to_string(),
                    last_price: row.last_price,
                    scanned_at,
                })
            })
            .take(limit)
            .collect();

        Ok(instruments)
    }

    fn name(&self) -> &str {
        "json-universe"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_sector_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("consumer_staples.json"),
            r#"[
                {"symbol": "ko", "name": "Coca-Cola", "last_price": 61.2},
                {"symbol": "PEP", "last_price": 170.0},
                {"symbol": "", "last_price": 10.0},
                {"symbol": "BAD", "last_price": 0.0}
            ]"#,
        )
        .unwrap();

        let source = JsonUniverseSource::new(dir.path());
        let instruments = source.fetch_sector("Consumer Staples", 10).await.unwrap();

        assert_eq!(instruments.len(), 2);
        assert_eq!(instruments[0].symbol, "KO");
        assert_eq!(instruments[0].sector, "Consumer Staples");
        assert_eq!(instruments[1].name, "PEP");
    }

    #[tokio::test]
    async fn test_missing_sector_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonUniverseSource::new(dir.path());
        let err = source.fetch_sector("energy", 5).await.unwrap_err();
        assert!(matches!(err, CollaboratorError::Io(_)));
    }

    #[tokio::test]
    async fn test_limit_applies() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("energy.json"),
            r#"[{"symbol":"XOM","last_price":110.0},{"symbol":"CVX","last_price":150.0},{"symbol":"COP","last_price":115.0}]"#,
        )
        .unwrap();
        let source = JsonUniverseSource::new(dir.path());
        assert_eq!(source.fetch_sector("energy", 2).await.unwrap().len(), 2);
    }
}
