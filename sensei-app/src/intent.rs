//! Classification of raw model replies.
//!
//! The model is instructed to answer calendar-creation requests with a single
//! JSON object and everything else as prose. `classify` is the only reader of
//! that contract: a tagged decode that either yields a typed action or falls
//! through to free text, never an error. A malformed structured reply is still
//! valid conversational content to show the user.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelReply {
    FreeText(String),
    CalendarAction {
        title: String,
        date: NaiveDate,
        time: NaiveTime,
    },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action")]
enum TaggedReply {
    #[serde(rename = "add_event")]
    AddEvent {
        title: String,
        date: NaiveDate,
        #[serde(default, deserialize_with = "deserialize_hhmm")]
        time: Option<NaiveTime>,
    },
}

fn deserialize_hhmm<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(raw) => NaiveTime::parse_from_str(&raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Pure and total: any input maps to exactly one reply variant.
pub fn classify(raw: &str) -> ModelReply {
    let trimmed = raw.trim();
    if !trimmed.starts_with('{') {
        return ModelReply::FreeText(raw.to_string());
    }
    match serde_json::from_str::<TaggedReply>(trimmed) {
        Ok(TaggedReply::AddEvent { title, date, time }) => ModelReply::CalendarAction {
            title,
            date,
            time: time.unwrap_or(NaiveTime::MIN),
        },
        Err(e) => {
            tracing::debug!(error = %e, "structured reply did not decode; shown as text");
            ModelReply::FreeText(raw.to_string())
        }
    }
}
