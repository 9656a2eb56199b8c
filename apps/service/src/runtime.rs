//! Process wiring: the in-process task runner.
//!
//! Recurring jobs (scheduler, transfer pipeline) each run on their own
//! interval; the loop awaits every run to completion before the next
//! tick, so at most one instance of a named job is ever active. The
//! checker pool drains one shared bounded queue with a fixed number of
//! workers. Job failures are logged and the cycle continues; nothing
//! here retries explicitly.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{MissedTickBehavior, interval};

use crate::broker::PartitionedLog;
use crate::config::Config;
use crate::database::{EventRepository, SiteRepository, ensure_db_configured};
use crate::models::SiteCheck;
use crate::monitoring::{Checker, Scheduler};
use crate::pipeline::TransferPipeline;
use crate::pool;

/// Start every role and run until ctrl-c.
pub async fn run(config: Config) -> Result<()> {
    let db_pool = pool::connect(&config.database_path).await?;
    let sites = Arc::new(SiteRepository::new(db_pool.clone(), config.db_fetch_chunk_size));
    let events = Arc::new(EventRepository::new(db_pool, config.db_fetch_chunk_size));
    ensure_db_configured(&sites, &events).await?;

    let log = Arc::new(PartitionedLog::new(config.broker_partitions));
    let (task_tx, task_rx) = mpsc::channel::<SiteCheck>(config.queue_capacity);

    spawn_checker_pool(&config, log.clone(), task_rx)?;

    let scheduler = Scheduler::new(sites, task_tx);
    tokio::spawn({
        let cadence = config.schedule_interval;
        async move {
            let mut timer = interval(cadence);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                if let Err(err) = scheduler.run().await {
                    tracing::error!(error = %err, "availability check scheduling failed");
                }
            }
        }
    });

    let pipeline = TransferPipeline::new(
        log,
        events,
        config.broker_wait_timeout,
        config.broker_max_records,
    );
    tokio::spawn({
        let cadence = config.transfer_interval;
        async move {
            let mut timer = interval(cadence);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                timer.tick().await;
                if let Err(err) = pipeline.run().await {
                    tracing::error!(error = %err, "event transfer failed");
                }
            }
        }
    });

    tracing::info!("upcheck service started");
    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    Ok(())
}

/// Bounded checker parallelism: N workers draining one shared queue.
/// A failed check is logged and dropped; the scheduler will enqueue
/// the site again next cycle.
fn spawn_checker_pool(
    config: &Config,
    log: Arc<PartitionedLog>,
    task_rx: mpsc::Receiver<SiteCheck>,
) -> Result<()> {
    let task_rx = Arc::new(Mutex::new(task_rx));
    // One client and producer for the whole pool; workers share them.
    let checker = Arc::new(Checker::new(log, config.fetch_timeout)?);
    for worker in 0..config.checker_workers {
        let checker = checker.clone();
        let task_rx = task_rx.clone();
        tokio::spawn(async move {
            loop {
                let task = { task_rx.lock().await.recv().await };
                let Some(site) = task else {
                    break;
                };
                if let Err(err) = checker.run(&site).await {
                    tracing::error!(worker, url = %site.url, error = %err, "availability check failed");
                }
            }
        });
    }
    Ok(())
}
