use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use pipeline_core::{CollaboratorError, EventRisk, EventRiskAssessor};

use crate::calendar::EventCalendar;
use crate::policy::RiskPolicy;

/// Derives per-symbol event risk from a corporate event calendar.
pub struct CalendarRiskAssessor {
    calendar: Arc<dyn EventCalendar>,
    policy: RiskPolicy,
    reference_date: Option<NaiveDate>,
}

impl CalendarRiskAssessor {
    pub fn new(calendar: Arc<dyn EventCalendar>) -> Self {
        Self {
            calendar,
            policy: RiskPolicy::default(),
            reference_date: None,
        }
    }

    pub fn with_policy(mut self, policy: RiskPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Pin "today" instead of using the current UTC date.
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    fn today(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| Utc::now().date_naive())
    }
}

#[async_trait]
impl EventRiskAssessor for CalendarRiskAssessor {
    async fn assess_batch(
        &self,
        symbols: &[String],
    ) -> Result<HashMap<String, EventRisk>, CollaboratorError> {
        let events = self.calendar.events_for(symbols).await?;
        let today = self.today();

        let mut risks: HashMap<String, EventRisk> = HashMap::new();
        for event in events {
            let days = (event.date - today).num_days();
            let Some(risk) = self.policy.evaluate(event.event_type, days) else {
                continue;
            };
            match risks.get(&event.symbol) {
                Some(existing) if existing.risk_score >= risk.risk_score => {}
                _ => {
                    risks.insert(event.symbol.clone(), risk);
                }
            }
        }

        let skipped = risks.values().filter(|r| r.skip_trading).count();
        tracing::info!(
            "Event risk: {} of {} symbols flagged ({} skip trading)",
            risks.len(),
            symbols.len(),
            skipped
        );
        Ok(risks)
    }
}
