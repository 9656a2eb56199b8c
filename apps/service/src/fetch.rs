//! Availability fetch and response-content matching.
//!
//! `fetch` never fails: a network-level error is a valid outcome and
//! becomes an event with no status code. The hard timeout lives on the
//! `reqwest::Client`, so callers configure it once at startup.

use std::time::Instant;

use chrono::{NaiveDateTime, Timelike, Utc};
use regex::bytes::Regex;

use crate::models::Event;

/// Issue one GET and record the outcome.
///
/// Returns the unpersisted event together with the response body, if
/// one was received. `regexp_found` is left unset; matching is a
/// separate step because the pattern belongs to the site, not the
/// response.
pub async fn fetch(client: &reqwest::Client, url: &str) -> (Event, Option<Vec<u8>>) {
    let created_at = now_micros();
    let start = Instant::now();
    let outcome = request(client, url).await;
    let duration = start.elapsed().as_secs_f64();

    match outcome {
        Ok((status_code, body)) => (
            Event {
                id: None,
                created_at,
                url: url.to_string(),
                duration,
                status_code: Some(status_code),
                regexp_found: None,
            },
            Some(body),
        ),
        Err(err) => {
            tracing::debug!(url, error = %err, "availability fetch failed");
            (
                Event {
                    id: None,
                    created_at,
                    url: url.to_string(),
                    duration,
                    status_code: None,
                    regexp_found: None,
                },
                None,
            )
        }
    }
}

async fn request(client: &reqwest::Client, url: &str) -> Result<(u16, Vec<u8>), reqwest::Error> {
    let response = client.get(url).send().await?;
    let status_code = response.status().as_u16();
    let body = response.bytes().await?;
    Ok((status_code, body.to_vec()))
}

/// Match a site's pattern against response bytes.
///
/// `None` when either side is absent. Patterns come from user-supplied
/// rows, so a pattern that fails to compile counts as "no match"
/// instead of failing the check.
pub fn regexp_check(regexp: Option<&str>, content: Option<&[u8]>) -> Option<bool> {
    let (regexp, content) = (regexp?, content?);
    match Regex::new(regexp) {
        Ok(pattern) => Some(pattern.is_match(content)),
        Err(err) => {
            tracing::warn!(regexp, error = %err, "invalid site pattern treated as no match");
            Some(false)
        }
    }
}

/// Current UTC time truncated to microseconds, the precision the wire
/// codec preserves.
pub(crate) fn now_micros() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(now.nanosecond() / 1000 * 1000).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(timeout: Duration) -> reqwest::Client {
        reqwest::Client::builder().timeout(timeout).build().unwrap()
    }

    #[tokio::test]
    async fn successful_fetch_records_status_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
            .mount(&server)
            .await;

        let (event, content) = fetch(&client(Duration::from_secs(10)), &server.uri()).await;

        assert_eq!(event.status_code, Some(200));
        assert!(event.duration > 0.0);
        assert_eq!(content.as_deref(), Some(b"ok".as_slice()));
        assert_eq!(event.regexp_found, None);
    }

    #[tokio::test]
    async fn timed_out_fetch_is_a_handled_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let (event, content) = fetch(&client(Duration::from_millis(200)), &server.uri()).await;

        assert_eq!(event.status_code, None);
        assert!(event.duration > 0.0);
        assert!(content.is_none());
    }

    #[tokio::test]
    async fn connection_error_is_a_handled_outcome() {
        // Nothing listens on this port.
        let (event, content) =
            fetch(&client(Duration::from_secs(1)), "http://127.0.0.1:9/").await;

        assert_eq!(event.status_code, None);
        assert!(content.is_none());
    }

    #[tokio::test]
    async fn error_statuses_are_still_recorded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let (event, _) = fetch(&client(Duration::from_secs(10)), &server.uri()).await;

        assert_eq!(event.status_code, Some(503));
    }

    #[test]
    fn match_is_absent_without_pattern_or_content() {
        assert_eq!(regexp_check(None, Some(b"body".as_slice())), None);
        assert_eq!(regexp_check(Some("ok"), None), None);
        assert_eq!(regexp_check(None, None), None);
    }

    #[test]
    fn match_reports_presence_of_pattern() {
        assert_eq!(regexp_check(Some("o+k"), Some(b"look ook".as_slice())), Some(true));
        assert_eq!(regexp_check(Some("missing"), Some(b"body".as_slice())), Some(false));
    }

    #[test]
    fn invalid_pattern_counts_as_no_match() {
        assert_eq!(regexp_check(Some("(unclosed"), Some(b"body".as_slice())), Some(false));
    }
}
