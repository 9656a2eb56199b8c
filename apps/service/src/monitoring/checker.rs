use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::broker::EventProducer;
use crate::codec;
use crate::fetch::{fetch, regexp_check};
use crate::models::SiteCheck;

/// Executes one availability check task from the work queue.
///
/// The HTTP client and producer are process-scoped and shared by every
/// worker; the fetch timeout is baked into the client at construction.
pub struct Checker {
    client: reqwest::Client,
    producer: Arc<dyn EventProducer>,
}

impl Checker {
    pub fn new(producer: Arc<dyn EventProducer>, fetch_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(fetch_timeout).build()?;
        Ok(Self { client, producer })
    }

    /// Fetch, match, encode, publish. A failed fetch still publishes a
    /// valid "error" event; only a publish failure propagates, and the
    /// site is naturally re-checked on the next schedule cycle.
    pub async fn run(&self, site: &SiteCheck) -> Result<()> {
        tracing::info!(url = %site.url, "starting availability check");
        let (mut event, content) = fetch(&self.client, &site.url).await;
        event.regexp_found = regexp_check(site.regexp.as_deref(), content.as_deref());

        let payload = codec::encode(&event)?;
        self.producer.publish(payload).await?;
        tracing::info!(url = %site.url, "finished availability check");
        Ok(())
    }
}
