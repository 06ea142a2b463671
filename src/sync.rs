use crate::config::Config;
use crate::providers::nextbike::{NextbikeClient, NextbikeError};
use crate::selector::BikeFilter;
use crate::store;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Polls the nextbike feed and appends tracked bikes to the store
pub struct Tracker {
    pool: SqlitePool,
    client: NextbikeClient,
    filter: BikeFilter,
    poll_interval: Duration,
}

impl Tracker {
    pub fn new(pool: SqlitePool, config: &Config) -> Result<Self, SyncError> {
        let client = NextbikeClient::new(config.endpoint.clone(), config.request_timeout())?;

        Ok(Self {
            pool,
            client,
            filter: BikeFilter::from_config(config),
            poll_interval: config.poll_interval(),
        })
    }

    /// Run one cycle now, then one per interval. Only returns on a fatal error.
    pub async fn start(&self) -> Result<(), SyncError> {
        info!(
            endpoint = %self.client.endpoint(),
            interval_secs = self.poll_interval.as_secs(),
            "Starting nextbike tracker"
        );

        let mut interval = tokio::time::interval(self.poll_interval);
        // A slow cycle pushes the next one back instead of bunching ticks up
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // The first tick completes immediately
            interval.tick().await;
            self.run_cycle().await?;
        }
    }

    /// Execute one cycle, logging recoverable failures.
    ///
    /// Returns the number of stored sightings, `Ok(0)` for an abandoned
    /// cycle, and `Err` only when the failure is fatal.
    pub async fn run_cycle(&self) -> Result<u64, SyncError> {
        info!("start");

        match self.poll().await {
            Ok(stored) => {
                info!(sightings = stored, "finished");
                Ok(stored)
            }
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Poll cycle failed fatally");
                Err(e)
            }
            Err(e) => {
                match &e {
                    SyncError::NetworkError(_) => error!(error = %e, "Error fetching feed"),
                    SyncError::IoError(_) => error!(error = %e, "Error reading feed body"),
                    SyncError::DecodeError(_) => error!(error = %e, "Error decoding feed"),
                    _ => error!(error = %e, "Poll cycle failed"),
                }
                Ok(0)
            }
        }
    }

    /// Fetch, decode, filter and store, propagating every failure
    pub async fn poll(&self) -> Result<u64, SyncError> {
        let snapshot = self.client.fetch_snapshot().await?;

        let candidates = self.filter.select(&snapshot);
        debug!(
            countries = snapshot.countries.len(),
            candidates = candidates.len(),
            "Filtered feed"
        );

        store::insert_sightings(&self.pool, &candidates)
            .await
            .map_err(|e| SyncError::PersistenceError(e.to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Setup error: {0}")]
    SetupError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("IO error: {0}")]
    IoError(String),
    #[error("Decode error: {0}")]
    DecodeError(String),
    #[error("Persistence error: {0}")]
    PersistenceError(String),
}

impl SyncError {
    /// Storage problems stop the process; feed problems skip the cycle
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::SetupError(_) | SyncError::PersistenceError(_))
    }
}

impl From<NextbikeError> for SyncError {
    fn from(err: NextbikeError) -> Self {
        match err {
            NextbikeError::ClientError(e) => SyncError::SetupError(e.to_string()),
            NextbikeError::NetworkError(e) => SyncError::NetworkError(e.to_string()),
            NextbikeError::BodyError(e) => SyncError::IoError(e.to_string()),
            NextbikeError::ParseError(e) => SyncError::DecodeError(e.to_string()),
        }
    }
}
