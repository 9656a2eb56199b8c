//! At-least-once event transport between the checker and the transfer
//! pipeline.
//!
//! The broker boundary is a partitioned, offset-addressable log:
//! records within a partition are FIFO, each partition is committed
//! independently, and commits are manual so consumers decide exactly
//! when a record stops being redeliverable.

pub mod log;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use log::PartitionedLog;

/// One record as seen by a consumer. The payload is opaque to the
/// broker; only the wire codec understands it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub offset: i64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("unknown partition {0}")]
    UnknownPartition(u32),
    #[error("commit offset {offset} beyond end of partition {partition}")]
    OffsetOutOfRange { partition: u32, offset: i64 },
}

/// Producer half: publish one payload and wait for the acknowledgment.
#[async_trait]
pub trait EventProducer: Send + Sync {
    async fn publish(&self, payload: Vec<u8>) -> Result<(), BrokerError>;
}

/// Consumer half with manual offset commit.
#[async_trait]
pub trait EventConsumer: Send + Sync {
    /// Poll for up to `max_records` per partition, waiting up to `wait`
    /// for at least one record. An empty map means the wait expired
    /// with nothing to deliver; partitions without records are omitted.
    async fn poll(
        &self,
        wait: Duration,
        max_records: usize,
    ) -> Result<BTreeMap<u32, Vec<Record>>, BrokerError>;

    /// Advance a partition's committed offset to `next_offset`. Records
    /// below the committed offset are never delivered again; records at
    /// or above it stay eligible for redelivery.
    async fn commit(&self, partition: u32, next_offset: i64) -> Result<(), BrokerError>;
}
