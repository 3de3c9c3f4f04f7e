use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pipeline_core::{ModelRecord, ModelRegistry, RegistryError};
use tokio::sync::Mutex;

/// Newest modification time per symbol key.
type ModelIndex = HashMap<String, SystemTime>;

/// Model registry backed by a directory of trained artifacts.
///
/// A symbol's model is any `<SYMBOL>.*` file or a `<SYMBOL>/` directory
/// directly under the model dir. `last_trained_at` is the newest
/// modification time found.
///
/// The directory is listed once per run; lookups sharing the same `now`
/// reuse that listing.
pub struct FsModelRegistry {
    model_dir: PathBuf,
    index: Mutex<Option<(DateTime<Utc>, Arc<ModelIndex>)>>,
}

impl FsModelRegistry {
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            index: Mutex::new(None),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    async fn index_for(&self, now: DateTime<Utc>) -> io::Result<Arc<ModelIndex>> {
        let mut cached = self.index.lock().await;
        if let Some((built_for, index)) = cached.as_ref() {
            if *built_for == now {
                return Ok(index.clone());
            }
        }

        let index = Arc::new(self.build_index().await?);
        tracing::debug!(
            "Indexed {} model keys under {}",
            index.len(),
            self.model_dir.display()
        );
        *cached = Some((now, index.clone()));
        Ok(index)
    }

    async fn build_index(&self) -> io::Result<ModelIndex> {
        let mut index = ModelIndex::new();
        let mut entries = match tokio::fs::read_dir(&self.model_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(index),
            Err(e) => return Err(e),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };

            let metadata = entry.metadata().await?;
            let mut modified = metadata.modified()?;
            if metadata.is_dir() {
                if let Some(inner) = newest_in_dir(&entry.path()).await? {
                    modified = modified.max(inner);
                }
            }

            for key in symbol_keys(name) {
                index
                    .entry(key.to_string())
                    .and_modify(|t| *t = (*t).max(modified))
                    .or_insert(modified);
            }
        }
        Ok(index)
    }
}

/// Symbols an entry name can belong to: the full name and every prefix
/// that ends just before a `.`.
fn symbol_keys(name: &str) -> impl Iterator<Item = &str> {
    name.match_indices('.')
        .map(move |(i, _)| &name[..i])
        .chain(std::iter::once(name))
        .filter(|key| !key.is_empty())
}

async fn newest_in_dir(dir: &Path) -> io::Result<Option<SystemTime>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut newest: Option<SystemTime> = None;
    while let Some(entry) = entries.next_entry().await? {
        let modified = entry.metadata().await?.modified()?;
        newest = Some(newest.map_or(modified, |n| n.max(modified)));
    }
    Ok(newest)
}

#[async_trait]
impl ModelRegistry for FsModelRegistry {
    async fn record(
        &self,
        symbol: &str,
        now: DateTime<Utc>,
    ) -> Result<ModelRecord, RegistryError> {
        let index = self
            .index_for(now)
            .await
            .map_err(|source| RegistryError::Io {
                symbol: symbol.to_string(),
                source,
            })?;

        Ok(match index.get(symbol) {
            Some(mtime) => ModelRecord::trained_at(DateTime::<Utc>::from(*mtime), now),
            None => ModelRecord::missing(),
        })
    }
}
