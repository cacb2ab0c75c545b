use crate::error::{CalendarError, Result};
use crate::gateway::CalendarGateway;
use crate::types::CalendarEvent;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

const EVENTS_URL: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";

/// Reference zone for created events. The remote API requires one; the
/// assistant pins it rather than guessing from the host.
const EVENT_TIME_ZONE: &str = "America/Toronto";

/// All-day creations end at this sentinel instead of start + 1h.
const END_OF_DAY: &str = "23:59:00";

#[derive(Clone)]
pub struct GoogleCalendar {
    http: reqwest::Client,
}

impl GoogleCalendar {
    pub fn new() -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(%e, "reqwest client build failed; falling back to default client");
                reqwest::Client::new()
            });
        Self { http }
    }
}

impl Default for GoogleCalendar {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CalendarGateway for GoogleCalendar {
    #[tracing::instrument(level = "info", skip_all)]
    async fn list_upcoming(
        &self,
        token: Option<&str>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    ) -> Result<Vec<CalendarEvent>> {
        let Some(token) = token else {
            return Err(CalendarError::Unauthenticated);
        };

        let response = self
            .http
            .get(EVENTS_URL)
            .bearer_auth(token)
            .query(&[
                ("timeMin", window_start.to_rfc3339()),
                ("timeMax", window_end.to_rfc3339()),
                ("singleEvents", "true".to_string()),
                ("orderBy", "startTime".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(CalendarError::Unauthenticated);
        }
        if !status.is_success() {
            return Err(CalendarError::Network(format!(
                "events list status={status} body={body}"
            )));
        }

        let parsed: EventsListResponse = serde_json::from_str(&body)?;
        let events: Vec<CalendarEvent> = parsed.items.into_iter().filter_map(map_item).collect();
        tracing::debug!(events = events.len(), "calendar window fetched");
        Ok(events)
    }

    #[tracing::instrument(level = "info", skip_all, fields(date = %date))]
    async fn create_event(
        &self,
        token: Option<&str>,
        title: &str,
        date: NaiveDate,
        time: Option<NaiveTime>,
    ) -> Result<()> {
        let Some(token) = token else {
            return Err(CalendarError::Unauthenticated);
        };

        let payload = creation_payload(title, date, time);
        let response = self
            .http
            .post(EVENTS_URL)
            .bearer_auth(token)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(CalendarError::Unauthenticated);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::RemoteRejected(format!(
                "status={status} body={body}"
            )));
        }

        tracing::info!(title_len = title.len(), "calendar event created");
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct EventsListResponse {
    #[serde(default)]
    items: Vec<RemoteEvent>,
}

#[derive(Debug, Deserialize)]
struct RemoteEvent {
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    start: Option<RemoteEventTime>,
}

#[derive(Debug, Deserialize)]
struct RemoteEventTime {
    #[serde(rename = "dateTime", default)]
    date_time: Option<String>,
    #[serde(default)]
    date: Option<String>,
}

#[derive(Debug, Serialize)]
struct EventCreation {
    summary: String,
    start: EventBoundary,
    end: EventBoundary,
}

#[derive(Debug, Serialize)]
struct EventBoundary {
    #[serde(rename = "dateTime")]
    date_time: String,
    #[serde(rename = "timeZone")]
    time_zone: &'static str,
}

/// Remote item to local shape. Entries without a usable start are dropped,
/// entries without a title get a placeholder, date-only starts are all-day.
fn map_item(item: RemoteEvent) -> Option<CalendarEvent> {
    let start = item.start?;
    let (date, time) = if let Some(dt) = start.date_time.as_deref() {
        let parsed = DateTime::parse_from_rfc3339(dt).ok()?;
        (parsed.date_naive(), Some(parsed.time()))
    } else if let Some(d) = start.date.as_deref() {
        (NaiveDate::parse_from_str(d, "%Y-%m-%d").ok()?, None)
    } else {
        return None;
    };

    let title = item
        .summary
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "(Sans titre)".to_string());

    Some(CalendarEvent { date, time, title })
}

fn creation_payload(title: &str, date: NaiveDate, time: Option<NaiveTime>) -> EventCreation {
    let (start, end) = match time {
        Some(t) => {
            let start = date.and_time(t);
            let end = start + Duration::hours(1);
            (
                start.format("%Y-%m-%dT%H:%M:%S").to_string(),
                end.format("%Y-%m-%dT%H:%M:%S").to_string(),
            )
        }
        None => (
            format!("{date}T00:00:00"),
            format!("{date}T{END_OF_DAY}"),
        ),
    };
    EventCreation {
        summary: title.to_string(),
        start: EventBoundary {
            date_time: start,
            time_zone: EVENT_TIME_ZONE,
        },
        end: EventBoundary {
            date_time: end,
            time_zone: EVENT_TIME_ZONE,
        },
    }
}
