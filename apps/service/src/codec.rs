//! Wire codec for events travelling through the broker.
//!
//! Events are encoded as UTF-8 JSON with the keys
//! `id, created_at, url, duration, status_code, regexp_found`.
//! Timestamps are written with microsecond precision; older payloads
//! carrying plain second precision still decode.

use chrono::NaiveDateTime;
use thiserror::Error;

use crate::models::Event;

const MICROSECOND_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const FRACTIONAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed event payload: {0}")]
    Malformed(#[from] serde_json::Error),
}

pub fn encode(event: &Event) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec(event)
}

pub fn decode(payload: &[u8]) -> Result<Event, DecodeError> {
    Ok(serde_json::from_slice(payload)?)
}

pub fn format_timestamp(value: &NaiveDateTime) -> String {
    value.format(MICROSECOND_FORMAT).to_string()
}

/// Accepts both fractional and plain second precision so payloads
/// produced by older encoders keep decoding.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(raw, FRACTIONAL_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, SECONDS_FORMAT))
}

pub(crate) mod timestamp {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &NaiveDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_timestamp(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw).map_err(serde::de::Error::custom)
    }
}
