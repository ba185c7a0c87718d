// src/types/date.rs

use crate::ParseError;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// A timestamp as Parse Server reports it: an ISO 8601 string in UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDate {
    pub iso: String,
}

impl ParseDate {
    pub fn new(iso_string: impl Into<String>) -> Self {
        ParseDate {
            iso: iso_string.into(),
        }
    }

    /// Formats `datetime` with millisecond precision, matching what the server emits.
    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        ParseDate {
            iso: datetime.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn iso(&self) -> &str {
        &self.iso
    }

    pub fn to_datetime(&self) -> Result<DateTime<Utc>, ParseError> {
        DateTime::parse_from_rfc3339(&self.iso)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ParseError::InvalidDate(format!("'{}': {}", self.iso, e)))
    }

    /// Reads a date from either a bare ISO string (`createdAt`/`updatedAt`)
    /// or the `{"__type": "Date", "iso": ...}` encoding used inside fields.
    pub fn from_json(value: &Value) -> Result<Self, ParseError> {
        match value {
            Value::String(iso) => Ok(ParseDate::new(iso.as_str())),
            Value::Object(map)
                if map.get("__type").and_then(Value::as_str) == Some("Date") =>
            {
                map.get("iso")
                    .and_then(Value::as_str)
                    .map(ParseDate::new)
                    .ok_or_else(|| ParseError::InvalidDate("Date object has no 'iso' key".to_string()))
            }
            other => Err(ParseError::InvalidDate(format!(
                "expected an ISO string or Date object, got {}",
                other
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for ParseDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ParseDate { iso: s })
    }
}

impl Serialize for ParseDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.iso)
    }
}
