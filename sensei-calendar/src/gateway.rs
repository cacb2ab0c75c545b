use crate::error::Result;
use crate::types::CalendarEvent;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

/// Remote calendar operations, behind a trait so orchestration code can run
/// against a recording stub.
#[async_trait::async_trait]
pub trait CalendarGateway: Send + Sync {
    /// Events overlapping `[window_start, window_end)`, ascending by start
    /// time (ordering delegated to the remote API's own contract).
    async fn list_upcoming(
        &self,
        token: Option<&str>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>>;

    /// Creates a one-hour event starting at `time`, or an all-day event when
    /// `time` is absent. Local state is the caller's problem.
    async fn create_event(
        &self,
        token: Option<&str>,
        title: &str,
        date: NaiveDate,
        time: Option<NaiveTime>,
    ) -> Result<()>;
}
