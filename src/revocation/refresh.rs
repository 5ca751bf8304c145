//! Periodic fetch of the revocation feed.
//!
//! Each tick pulls the whole feed, validates it and swaps the result into
//! the [`RevocationStore`]. A failed tick leaves the previous snapshot in
//! place.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::RevocationConfig;
use crate::observability::metrics::{self, MetricsSink};
use crate::revocation::payload::RevocationFeed;
use crate::revocation::store::{ingest, RevocationStore};

/// Why a refresh tick produced no snapshot.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("revocation provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("revocation provider returned {0}")]
    Status(reqwest::StatusCode),
}

/// Counts from one successful tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshOutcome {
    pub accepted: usize,
    pub rejected: usize,
}

pub struct RevocationRefresher {
    client: reqwest::Client,
    provider_url: String,
    interval: Duration,
    store: RevocationStore,
    metrics: Arc<dyn MetricsSink>,
}

impl RevocationRefresher {
    pub fn new(
        config: &RevocationConfig,
        store: RevocationStore,
        metrics: Arc<dyn MetricsSink>,
    ) -> Result<Self, RefreshError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            provider_url: config.provider_url.clone(),
            interval: Duration::from_secs(config.refresh_interval_secs),
            store,
            metrics,
        })
    }

    /// Refresh on every interval tick until shutdown. The first tick fires
    /// immediately.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            url = %self.provider_url,
            interval_secs = self.interval.as_secs(),
            "Revocation refresher starting"
        );

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    // Errors are logged and counted inside.
                    let _ = self.refresh_once().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Revocation refresher received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    /// Fetch, validate and publish one feed.
    pub async fn refresh_once(&self) -> Result<RefreshOutcome, RefreshError> {
        match self.fetch().await {
            Ok(feed) => {
                let (snapshot, rejected) = ingest(feed.meta, &feed.revocations, unix_now());
                let outcome = RefreshOutcome {
                    accepted: snapshot.len(),
                    rejected: rejected.len(),
                };

                for _ in 0..outcome.accepted {
                    self.metrics.increment(metrics::revocation::ACCEPTED);
                }
                for _ in 0..outcome.rejected {
                    self.metrics.increment(metrics::revocation::REJECTED);
                }

                self.store.publish(snapshot);
                tracing::debug!(
                    accepted = outcome.accepted,
                    rejected = outcome.rejected,
                    "Revocation refresh complete"
                );
                Ok(outcome)
            }
            Err(e) => {
                self.metrics.increment(metrics::revocation::FAILURES);
                tracing::error!(url = %self.provider_url, error = %e, "Revocation refresh failed, keeping previous snapshot");
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> Result<RevocationFeed, RefreshError> {
        let response = self.client.get(&self.provider_url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Status(status));
        }
        Ok(response.json::<RevocationFeed>().await?)
    }
}

/// Seconds since the Unix epoch, the time base of the feed.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
