/// Durable storage for site checks and their events.
///
/// Both repositories share one pooled libsql database; every logical
/// operation checks a connection out of the pool for its own duration.
pub mod repository;

pub use repository::{EventRepository, EventSink, SiteRepository};

use anyhow::Result;

/// Idempotent schema creation for every table the service uses.
/// Run once at process startup by roles that touch storage.
pub async fn ensure_db_configured(
    sites: &SiteRepository,
    events: &EventRepository,
) -> Result<()> {
    sites.ensure_schema().await?;
    events.ensure_schema().await?;
    Ok(())
}
