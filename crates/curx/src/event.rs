//! ⏰ The invocation event: the scheduler taps us on the shoulder and says "it's time".
//!
//! The event's `time` field is the authoritative "now" for the whole run. It picks the
//! billing period, it becomes every record's `@timestamp`, and it seeds the `uuid`.
//! The raw string is kept verbatim for the records. Only the calendar date is parsed.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;

/// 📨 What the trigger hands us. Mostly a timestamp, occasionally some AWS keys.
#[derive(Debug, Clone, Deserialize)]
pub struct InvocationEvent {
    /// ⏰ Authoritative invocation time, e.g. `2024-03-15T12:00:00Z`
    pub time: String,
    /// 🔑 Optional explicit credentials for the report bucket. Both or neither.
    #[serde(default)]
    pub aws_access_key_id: Option<String>,
    #[serde(default)]
    pub aws_secret_access_key: Option<String>,
}

impl InvocationEvent {
    /// 🏗️ An event with just a time and the ambient AWS credential chain.
    pub fn at(time: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            aws_access_key_id: None,
            aws_secret_access_key: None,
        }
    }

    /// 📄 Parse a scheduled-event JSON document.
    pub fn from_json(raw: &str) -> Result<Self, EventError> {
        serde_json::from_str(raw).map_err(|source| EventError::Malformed { source })
    }

    /// 🔑 Explicit credentials, only when the event carries the full pair.
    pub(crate) fn explicit_credentials(&self) -> Option<(&str, &str)> {
        match (&self.aws_access_key_id, &self.aws_secret_access_key) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret.as_str())),
            _ => None,
        }
    }

    pub(crate) fn event_time(&self) -> Result<EventTime, EventError> {
        EventTime::parse(&self.time)
    }
}

/// 💀 The event was not the event we were promised.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("invocation event is not valid JSON or has no `time` field")]
    Malformed {
        #[source]
        source: serde_json::Error,
    },
    #[error("event time '{raw}' is not RFC 3339, 'YYYY-MM-DD HH:MM:SS' or 'YYYY-MM-DD'")]
    UnparseableTime { raw: String },
}

/// ⏰ The event time, both as the caller spelled it and as a calendar date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EventTime {
    raw: String,
    date: NaiveDate,
}

impl EventTime {
    pub(crate) fn parse(raw: &str) -> Result<Self, EventError> {
        let trimmed = raw.trim();
        // 🗓️ Try the formats in order of "how likely is a scheduler to send this"
        let date = DateTime::parse_from_rfc3339(trimmed)
            .map(|dt| dt.date_naive())
            .or_else(|_| {
                NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date())
            })
            .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
            .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y-%m-%d"))
            .map_err(|_| EventError::UnparseableTime {
                raw: raw.to_string(),
            })?;

        Ok(Self {
            raw: raw.to_string(),
            date,
        })
    }

    /// 🔤 Verbatim, for `@timestamp` and `uuid`.
    pub(crate) fn as_str(&self) -> &str {
        &self.raw
    }

    pub(crate) fn date(&self) -> NaiveDate {
        self.date
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_every_supported_format_lands_on_the_same_day() {
        for raw in [
            "2024-03-15T12:34:56Z",
            "2024-03-15T12:34:56+02:00",
            "2024-03-15 12:34:56",
            "2024-03-15T12:34:56",
            "2024-03-15",
        ] {
            let the_time = EventTime::parse(raw).unwrap_or_else(|e| panic!("💀 {raw}: {e}"));
            assert_eq!(the_time.date(), NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
            assert_eq!(the_time.as_str(), raw, "the raw spelling must survive untouched");
        }
    }

    #[test]
    fn the_one_where_nonsense_time_is_rejected() {
        let the_result = EventTime::parse("last tuesday-ish");
        assert!(matches!(the_result, Err(EventError::UnparseableTime { .. })));
    }

    #[test]
    fn the_one_where_the_event_json_carries_credentials() {
        let the_event = InvocationEvent::from_json(
            r#"{"time":"2024-03-15T00:00:00Z","aws_access_key_id":"AKIA","aws_secret_access_key":"shh"}"#,
        )
        .expect("💀 event should parse");
        assert_eq!(the_event.explicit_credentials(), Some(("AKIA", "shh")));
    }

    #[test]
    fn the_one_where_half_a_credential_pair_counts_as_none() {
        let the_event =
            InvocationEvent::from_json(r#"{"time":"2024-03-15","aws_access_key_id":"AKIA"}"#)
                .expect("💀 event should parse");
        assert_eq!(the_event.explicit_credentials(), None);
    }

    #[test]
    fn the_one_where_an_event_without_time_is_malformed() {
        let the_result = InvocationEvent::from_json(r#"{"detail-type":"Scheduled Event"}"#);
        assert!(matches!(the_result, Err(EventError::Malformed { .. })));
    }
}
