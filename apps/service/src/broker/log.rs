//! In-process implementation of the broker boundary.
//!
//! One `PartitionedLog` plays both roles: checkers publish into it and
//! the transfer pipeline drains it. Records are buffered in memory
//! until the consumer commits past them, at which point they are
//! dropped; uncommitted records are redelivered on every poll, which
//! gives the pipeline its at-least-once guarantee.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::{Instant, timeout};

use super::{BrokerError, EventConsumer, EventProducer, Record};

struct Partition {
    /// Offset of `records[0]`. Everything below it has been committed
    /// and dropped.
    base_offset: i64,
    records: Vec<Vec<u8>>,
    committed: i64,
}

impl Partition {
    fn new() -> Self {
        Self { base_offset: 0, records: Vec::new(), committed: 0 }
    }

    fn end_offset(&self) -> i64 {
        self.base_offset + self.records.len() as i64
    }
}

pub struct PartitionedLog {
    partitions: Vec<Mutex<Partition>>,
    notify: Notify,
    next_partition: AtomicUsize,
}

impl PartitionedLog {
    pub fn new(partitions: usize) -> Self {
        Self {
            partitions: (0..partitions.max(1)).map(|_| Mutex::new(Partition::new())).collect(),
            notify: Notify::new(),
            next_partition: AtomicUsize::new(0),
        }
    }

    fn partition(&self, index: u32) -> Result<&Mutex<Partition>, BrokerError> {
        self.partitions.get(index as usize).ok_or(BrokerError::UnknownPartition(index))
    }

    fn collect(&self, max_records: usize) -> BTreeMap<u32, Vec<Record>> {
        let mut batches = BTreeMap::new();
        for (index, slot) in self.partitions.iter().enumerate() {
            let partition = slot.lock().expect("partition lock poisoned");
            let start = (partition.committed - partition.base_offset) as usize;
            let end = partition.records.len().min(start + max_records);
            if start >= end {
                continue;
            }
            let records: Vec<Record> = partition.records[start..end]
                .iter()
                .enumerate()
                .map(|(i, payload)| Record {
                    offset: partition.committed + i as i64,
                    payload: payload.clone(),
                })
                .collect();
            batches.insert(index as u32, records);
        }
        batches
    }
}

#[async_trait]
impl EventProducer for PartitionedLog {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), BrokerError> {
        // Round-robin assignment; per-URL ordering is not a guarantee
        // anyone relies on, only per-partition FIFO is.
        let index = self.next_partition.fetch_add(1, Ordering::Relaxed) % self.partitions.len();
        {
            let mut partition =
                self.partitions[index].lock().expect("partition lock poisoned");
            partition.records.push(payload);
        }
        self.notify.notify_waiters();
        Ok(())
    }
}

#[async_trait]
impl EventConsumer for PartitionedLog {
    async fn poll(
        &self,
        wait: Duration,
        max_records: usize,
    ) -> Result<BTreeMap<u32, Vec<Record>>, BrokerError> {
        let deadline = Instant::now() + wait;
        loop {
            let notified = self.notify.notified();
            let batches = self.collect(max_records);
            if !batches.is_empty() {
                return Ok(batches);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() || timeout(remaining, notified).await.is_err() {
                return Ok(BTreeMap::new());
            }
        }
    }

    async fn commit(&self, partition: u32, next_offset: i64) -> Result<(), BrokerError> {
        let mut slot = self.partition(partition)?.lock().expect("partition lock poisoned");
        if next_offset > slot.end_offset() {
            return Err(BrokerError::OffsetOutOfRange { partition, offset: next_offset });
        }
        if next_offset > slot.committed {
            slot.committed = next_offset;
            let drop_count = (slot.committed - slot.base_offset) as usize;
            slot.records.drain(..drop_count);
            slot.base_offset = slot.committed;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uncommitted_records_are_redelivered() {
        let log = PartitionedLog::new(1);
        log.publish(b"one".to_vec()).await.unwrap();
        log.publish(b"two".to_vec()).await.unwrap();

        let first = log.poll(Duration::from_millis(10), 10).await.unwrap();
        let second = log.poll(Duration::from_millis(10), 10).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first[&0].len(), 2);
    }

    #[tokio::test]
    async fn commit_consumes_records_destructively() {
        let log = PartitionedLog::new(1);
        log.publish(b"one".to_vec()).await.unwrap();
        log.publish(b"two".to_vec()).await.unwrap();

        let batch = &log.poll(Duration::from_millis(10), 10).await.unwrap()[&0];
        let next_offset = batch.last().unwrap().offset + 1;
        log.commit(0, next_offset).await.unwrap();

        assert!(log.poll(Duration::from_millis(10), 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn partial_commit_keeps_the_tail() {
        let log = PartitionedLog::new(1);
        for payload in [b"one".to_vec(), b"two".to_vec(), b"three".to_vec()] {
            log.publish(payload).await.unwrap();
        }

        log.commit(0, 2).await.unwrap();

        let batches = log.poll(Duration::from_millis(10), 10).await.unwrap();
        assert_eq!(batches[&0].len(), 1);
        assert_eq!(batches[&0][0].offset, 2);
        assert_eq!(batches[&0][0].payload, b"three".to_vec());
    }

    #[tokio::test]
    async fn poll_bounds_records_per_partition() {
        let log = PartitionedLog::new(1);
        for i in 0..5u8 {
            log.publish(vec![i]).await.unwrap();
        }

        let batches = log.poll(Duration::from_millis(10), 2).await.unwrap();
        assert_eq!(batches[&0].len(), 2);
        assert_eq!(batches[&0][0].offset, 0);
    }

    #[tokio::test]
    async fn empty_poll_expires_quietly() {
        let log = PartitionedLog::new(2);
        let batches = log.poll(Duration::from_millis(20), 10).await.unwrap();
        assert!(batches.is_empty());
    }

    #[tokio::test]
    async fn publish_spreads_round_robin() {
        let log = PartitionedLog::new(2);
        for i in 0..4u8 {
            log.publish(vec![i]).await.unwrap();
        }

        let batches = log.poll(Duration::from_millis(10), 10).await.unwrap();
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[&0].len(), 2);
        assert_eq!(batches[&1].len(), 2);
    }

    #[tokio::test]
    async fn commit_validates_partition_and_offset() {
        let log = PartitionedLog::new(1);
        assert!(matches!(
            log.commit(7, 0).await,
            Err(BrokerError::UnknownPartition(7))
        ));
        assert!(matches!(
            log.commit(0, 5).await,
            Err(BrokerError::OffsetOutOfRange { .. })
        ));
    }
}
