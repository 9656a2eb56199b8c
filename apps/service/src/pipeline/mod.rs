//! The broker-to-storage transfer pipeline.
//!
//! Drains the event log in bounded batches and persists each
//! partition's batch in its own storage transaction, committing the
//! partition's offset only after that transaction has committed. A
//! crash between the two commits redelivers the batch, so duplicate
//! rows can appear after recovery; lost rows cannot.


use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::broker::EventConsumer;
use crate::codec;
use crate::database::EventSink;
use crate::models::Event;

pub struct TransferPipeline {
    consumer: Arc<dyn EventConsumer>,
    sink: Arc<dyn EventSink>,
    wait_timeout: Duration,
    max_records: usize,
}

impl TransferPipeline {
    pub fn new(
        consumer: Arc<dyn EventConsumer>,
        sink: Arc<dyn EventSink>,
        wait_timeout: Duration,
        max_records: usize,
    ) -> Self {
        Self { consumer, sink, wait_timeout, max_records }
    }

    /// Drain the log until a poll comes back empty, then return the
    /// number of partition batches committed.
    ///
    /// The pipeline holds no state of its own: the broker's committed
    /// offsets and the event table are the only bookkeeping. Any
    /// failure aborts the invocation with the current partition's
    /// offset untouched, so its batch is redelivered on the next
    /// scheduled run; partitions committed earlier in the same
    /// invocation stay committed.
    pub async fn run(&self) -> Result<u64> {
        tracing::info!("starting event transfer");
        let mut batches = 0u64;
        let mut transferred = 0u64;

        loop {
            let polled = self.consumer.poll(self.wait_timeout, self.max_records).await?;
            if polled.is_empty() {
                break;
            }

            for (partition, records) in polled {
                let Some(last) = records.last() else { continue };
                let next_offset = last.offset + 1;

                let mut events = Vec::with_capacity(records.len());
                for record in &records {
                    // A record that fails to decode fails the whole
                    // invocation: nothing from this batch is committed
                    // and the partition is retried as-is.
                    events.push(decode_record(&record.payload)?);
                }

                self.sink.insert_batch(&events).await?;
                self.consumer.commit(partition, next_offset).await?;

                transferred += events.len() as u64;
                batches += 1;
                tracing::debug!(
                    partition,
                    events = events.len(),
                    next_offset,
                    "committed partition batch"
                );
            }
        }

        tracing::info!(batches, events = transferred, "finished event transfer");
        Ok(batches)
    }
}

fn decode_record(payload: &[u8]) -> Result<Event> {
    let mut event = codec::decode(payload)?;
    // Storage assigns the surrogate id on insert; whatever the
    // producer put in the payload is meaningless here.
    event.id = None;
    Ok(event)
}
