use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A configured availability check for one URL.
///
/// `id` is `None` until the row is persisted by the site registry.
/// The `url` column is unique, so one URL carries at most one pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteCheck {
    pub id: Option<i64>,
    pub url: String,
    /// UTF-8 pattern matched against the raw response bytes.
    pub regexp: Option<String>,
}

/// Outcome of a single fetch attempt.
///
/// Built in memory by the checker, shipped through the broker as a JSON
/// payload and persisted by the transfer pipeline, which is when storage
/// assigns `id`. The URL is copied from the site check on purpose: an
/// event must stay meaningful even after its site is deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: Option<i64>,
    #[serde(with = "crate::codec::timestamp")]
    pub created_at: NaiveDateTime,
    pub url: String,
    /// Wall-clock seconds spent on the fetch, populated for every
    /// outcome including network failures.
    pub duration: f64,
    /// `None` means the request failed at the network level
    /// (timeout, connection refused, protocol error).
    #[serde(default)]
    pub status_code: Option<u16>,
    /// `None` unless a pattern was configured *and* response bytes
    /// were available to match against.
    #[serde(default)]
    pub regexp_found: Option<bool>,
}
