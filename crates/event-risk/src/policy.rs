use pipeline_core::{EventRisk, EventType};

/// Risk applied when an event is at most `within_days` away.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskWindow {
    pub within_days: i64,
    pub risk_score: f64,
    pub skip_trading: bool,
    pub weight_haircut: f64,
}

impl RiskWindow {
    const fn skip(within_days: i64, risk_score: f64) -> Self {
        Self {
            within_days,
            risk_score,
            skip_trading: true,
            weight_haircut: 0.0,
        }
    }

    const fn haircut(within_days: i64, risk_score: f64, weight_haircut: f64) -> Self {
        Self {
            within_days,
            risk_score,
            skip_trading: false,
            weight_haircut,
        }
    }
}

/// Windows per event type, checked tightest first.
#[derive(Debug, Clone)]
pub struct RiskPolicy {
    pub earnings: Vec<RiskWindow>,
    pub regulatory: Vec<RiskWindow>,
    pub dividend: Vec<RiskWindow>,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            earnings: vec![
                RiskWindow::skip(1, 0.9),
                RiskWindow::haircut(3, 0.7, 0.5),
                RiskWindow::haircut(7, 0.4, 0.25),
            ],
            regulatory: vec![
                RiskWindow::skip(3, 0.85),
                RiskWindow::haircut(10, 0.5, 0.3),
            ],
            dividend: vec![RiskWindow::haircut(2, 0.3, 0.1)],
        }
    }
}

impl RiskPolicy {
    fn windows(&self, event_type: EventType) -> &[RiskWindow] {
        match event_type {
            EventType::Earnings => &self.earnings,
            EventType::Regulatory => &self.regulatory,
            EventType::Dividend => &self.dividend,
            EventType::None => &[],
        }
    }

    /// Risk for an event `days_to_event` days away, or `None` when the
    /// event is in the past or outside every window.
    pub fn evaluate(&self, event_type: EventType, days_to_event: i64) -> Option<EventRisk> {
        if days_to_event < 0 {
            return None;
        }

        let mut windows: Vec<&RiskWindow> = self.windows(event_type).iter().collect();
        windows.sort_by_key(|w| w.within_days);
        let window = windows.into_iter().find(|w| days_to_event <= w.within_days)?;

        let label = match event_type {
            EventType::Earnings => "Earnings",
            EventType::Regulatory => "Regulatory event",
            EventType::Dividend => "Ex-dividend",
            EventType::None => "Event",
        };
        let haircut = window.weight_haircut.clamp(0.0, 1.0);
        let warning = if window.skip_trading {
            format!("{label} in {days_to_event} day(s): trading suspended")
        } else {
            format!(
                "{label} in {days_to_event} day(s): confidence reduced {:.0}%",
                haircut * 100.0
            )
        };

        Some(EventRisk {
            risk_score: window.risk_score.clamp(0.0, 1.0),
            event_type,
            days_to_event: Some(days_to_event),
            skip_trading: window.skip_trading,
            weight_haircut: haircut,
            warning_message: Some(warning),
        })
    }
}
