use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// One locally-held calendar entry. `time` absent means all-day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub date: NaiveDate,
    pub time: Option<NaiveTime>,
    pub title: String,
}

impl CalendarEvent {
    /// "HH:MM" for timed events, empty string for all-day ones.
    pub fn time_label(&self) -> String {
        self.time
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_default()
    }
}
