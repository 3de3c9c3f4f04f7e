//! Event-risk assessment and the pre-scoring adjustment step.
//!
//! Instruments close to an earnings, regulatory, or dividend event are
//! either excluded (forced HOLD) or have their prediction confidence
//! haircut, since confidence drives position sizing downstream.

mod adjustment;
mod assessor;
mod calendar;
mod policy;

pub use adjustment::{apply_event_risk, AdjustmentSummary};
pub use assessor::CalendarRiskAssessor;
pub use calendar::{CalendarEvent, EventCalendar, JsonEventCalendar};
pub use policy::{RiskPolicy, RiskWindow};
