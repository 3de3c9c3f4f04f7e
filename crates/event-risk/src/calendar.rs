use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDate;
use pipeline_core::{CollaboratorError, EventType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub symbol: String,
    pub event_type: EventType,
    pub date: NaiveDate,
}

/// Source of scheduled corporate events.
#[async_trait]
pub trait EventCalendar: Send + Sync {
    async fn events_for(
        &self,
        symbols: &[String],
    ) -> Result<Vec<CalendarEvent>, CollaboratorError>;
}

/// Calendar backed by a JSON array of `{symbol, event_type, date}` rows.
pub struct JsonEventCalendar {
    path: PathBuf,
}

impl JsonEventCalendar {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl EventCalendar for JsonEventCalendar {
    /// Rows match case-insensitively; returned events carry the symbol
    /// exactly as requested.
    async fn events_for(
        &self,
        symbols: &[String],
    ) -> Result<Vec<CalendarEvent>, CollaboratorError> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let events: Vec<CalendarEvent> = serde_json::from_str(&raw)?;
        Ok(events
            .into_iter()
            .filter_map(|mut e| {
                let requested = symbols.iter().find(|s| s.eq_ignore_ascii_case(&e.symbol))?;
                e.symbol = requested.clone();
                Some(e)
            })
            .collect())
    }
}
