use std::env;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value {value:?} for {name}")]
    Invalid { name: &'static str, value: String },
}

/// Process configuration, read once at startup and passed by value into
/// whatever needs it. Nothing in the service reads the environment
/// after this point.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub fetch_timeout: Duration,
    pub broker_partitions: usize,
    pub broker_wait_timeout: Duration,
    pub broker_max_records: usize,
    pub checker_workers: usize,
    pub queue_capacity: usize,
    pub db_fetch_chunk_size: usize,
    pub schedule_interval: Duration,
    pub transfer_interval: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_path: required("DATABASE_PATH")?,
            fetch_timeout: Duration::from_secs(parsed("FETCH_TIMEOUT_SECS", 10)?),
            broker_partitions: parsed("BROKER_PARTITIONS", 4)?,
            broker_wait_timeout: Duration::from_millis(parsed(
                "BROKER_WAIT_TIMEOUT_MS",
                1000,
            )?),
            broker_max_records: parsed("BROKER_MAX_RECORDS", 1000)?,
            checker_workers: parsed("CHECKER_WORKERS", 10)?,
            queue_capacity: parsed("QUEUE_CAPACITY", 1024)?,
            db_fetch_chunk_size: parsed("DB_FETCH_CHUNK_SIZE", 10_000)?,
            schedule_interval: Duration::from_secs(parsed("SCHEDULE_INTERVAL_SECS", 60)?),
            transfer_interval: Duration::from_secs(parsed("TRANSFER_INTERVAL_SECS", 60)?),
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(default),
    }
}
