//! Poll coordinator.
//!
//! Owns the refresh cadence and the latest snapshot. Snapshots are published
//! through a `tokio::sync::watch` channel as `Arc<Snapshot>`, so readers always
//! see a complete payload and a failed or cancelled fetch never touches the
//! published value.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{Mutex, watch},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

use crate::{
    api::Snapshot,
    error::{PollenError, UpdateFailed},
    traits::SnapshotFetcher,
};

/// Published coordinator state.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorState {
    /// Latest successfully fetched snapshot, kept across failed refreshes.
    pub snapshot: Option<Arc<Snapshot>>,
    /// Reason of the most recent failure, cleared by the next success.
    pub last_error: Option<UpdateFailed>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

impl CoordinatorState {
    pub fn last_update_success(&self) -> bool {
        self.snapshot.is_some() && self.last_error.is_none()
    }
}

/// Result of a single refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated,
    Failed(UpdateFailed),
    /// Another refresh was already in flight.
    Skipped,
}

pub struct PollCoordinator<F> {
    fetcher: F,
    interval: Duration,
    state: watch::Sender<CoordinatorState>,
    in_flight: Mutex<()>,
}

impl<F: SnapshotFetcher> PollCoordinator<F> {
    pub fn new(fetcher: F, interval: Duration) -> Self {
        let (state, _) = watch::channel(CoordinatorState::default());
        Self {
            fetcher,
            interval,
            state,
            in_flight: Mutex::new(()),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Perform the initial refresh and propagate its failure.
    ///
    /// Sensors should only be built once this has succeeded.
    pub async fn first_refresh(&self) -> Result<Arc<Snapshot>, UpdateFailed> {
        match self.refresh().await {
            RefreshOutcome::Failed(err) => Err(err),
            RefreshOutcome::Updated | RefreshOutcome::Skipped => {
                self.snapshot().map_err(|e| UpdateFailed(e.to_string()))
            }
        }
    }

    /// Fetch once and publish the outcome.
    ///
    /// Never fails: errors are recorded in the published state and the previous
    /// snapshot stays available.
    pub async fn refresh(&self) -> RefreshOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            tracing::debug!("Refresh already in flight, skipping tick");
            return RefreshOutcome::Skipped;
        };

        match self.fetcher.fetch_snapshot().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                tracing::info!(
                    "Fetched pollen data for {} ({} hourly points)",
                    snapshot.current.time,
                    snapshot.hourly.time.len()
                );
                self.state.send_modify(|state| {
                    state.snapshot = Some(snapshot);
                    state.last_error = None;
                    state.last_success_at = Some(Utc::now());
                    state.consecutive_failures = 0;
                });
                RefreshOutcome::Updated
            }
            Err(err) => {
                tracing::warn!("Pollen update failed: {}", err);
                self.state.send_modify(|state| {
                    state.last_error = Some(err.clone());
                    state.consecutive_failures += 1;
                });
                RefreshOutcome::Failed(err)
            }
        }
    }

    /// Latest snapshot, or [`PollenError::NotReady`] before the first success.
    pub fn snapshot(&self) -> Result<Arc<Snapshot>, PollenError> {
        self.state.borrow().snapshot.clone().ok_or(PollenError::NotReady)
    }

    pub fn state(&self) -> CoordinatorState {
        self.state.borrow().clone()
    }

    pub fn last_update_success(&self) -> bool {
        self.state.borrow().last_update_success()
    }

    /// Receiver notified on every published change.
    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }
}

impl<F: SnapshotFetcher + 'static> PollCoordinator<F> {
    /// Start the poll loop. The first tick fires one interval from now.
    pub fn start(self: Arc<Self>) -> PollHandle {
        let period = self.interval;
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            tracing::info!("Starting poll loop with interval: {:?}", period);
            loop {
                interval.tick().await;
                self.refresh().await;
            }
        });
        PollHandle { handle }
    }
}

/// Handle to a running poll loop.
#[derive(Debug)]
pub struct PollHandle {
    handle: JoinHandle<()>,
}

impl PollHandle {
    /// Stop polling, abandoning any in-flight fetch.
    pub async fn stop(mut self) {
        self.handle.abort();
        let _ = (&mut self.handle).await;
        tracing::info!("Poll loop stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
