use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};

use super::ResolveError;
use crate::models::EmailRecord;

/// Logical message fields a condition can test.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    From,
    Subject,
    Message,
    DateReceived,
}

impl FromStr for Field {
    type Err = ResolveError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.to_lowercase().as_str() {
            "from" => Ok(Self::From),
            "subject" => Ok(Self::Subject),
            "message" => Ok(Self::Message),
            "date_received" => Ok(Self::DateReceived),
            _ => Err(ResolveError::UnknownField(name.to_string())),
        }
    }
}

/// A resolved field, borrowed from the record where possible.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Text(&'a str),
    /// Time elapsed since the message was received.
    Age(Duration),
}

impl Field {
    pub fn resolve<'a>(self, record: &'a EmailRecord, now: DateTime<Utc>) -> FieldValue<'a> {
        match self {
            Self::From => FieldValue::Text(&record.from_address),
            Self::Subject => FieldValue::Text(&record.subject),
            Self::Message => FieldValue::Text(&record.body),
            Self::DateReceived => {
                FieldValue::Age(now.signed_duration_since(received_at(record, now)))
            }
        }
    }
}

fn received_at(record: &EmailRecord, now: DateTime<Utc>) -> DateTime<Utc> {
    // Out-of-range timestamps count as just received.
    DateTime::from_timestamp(record.received_at, 0).unwrap_or(now)
}

/// Look up `name` on `record`.
pub fn resolve_field<'a>(
    record: &'a EmailRecord,
    name: &str,
    now: DateTime<Utc>,
) -> Result<FieldValue<'a>, ResolveError> {
    Ok(name.parse::<Field>()?.resolve(record, now))
}
