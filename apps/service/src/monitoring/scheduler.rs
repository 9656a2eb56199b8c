use anyhow::{Result, anyhow};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::database::SiteRepository;
use crate::models::SiteCheck;

/// Enqueues one check task per configured site.
///
/// One `run` is one full pass over the registry; the runtime owns the
/// cadence and guarantees at most one pass is active at a time, so
/// there is no concurrency control in here.
pub struct Scheduler {
    sites: Arc<SiteRepository>,
    queue: mpsc::Sender<SiteCheck>,
}

impl Scheduler {
    pub fn new(sites: Arc<SiteRepository>, queue: mpsc::Sender<SiteCheck>) -> Self {
        Self { sites, queue }
    }

    /// Stream the registry and enqueue every site with its current
    /// field values, so the checker needs no extra lookup.
    pub async fn run(&self) -> Result<()> {
        tracing::info!("starting availability check scheduling");
        let mut count = 0u64;
        let mut cursor = self.sites.get_all();
        while let Some(site) = cursor.next().await? {
            let url = site.url.clone();
            self.queue
                .send(site)
                .await
                .map_err(|_| anyhow!("work queue closed"))?;
            tracing::debug!(%url, "scheduled availability check");
            count += 1;
        }
        tracing::info!(count, "finished availability check scheduling");
        Ok(())
    }
}
