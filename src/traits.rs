//! Abstractions for time and data acquisition to enable testing.
//!
//! This module provides traits for:
//! - `Clock`: Abstracting time access for deterministic forecast windows
//! - `SnapshotFetcher`: Abstracting the remote API behind the poll coordinator

use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};

use chrono::{DateTime, Utc};

use crate::{api::Snapshot, error::UpdateFailed};

// ==================== Clock Trait ====================

/// Trait for abstracting time access.
///
/// Forecast windows are cut at "now", so tests inject a [`MockClock`] to get
/// reproducible results.
pub trait Clock: Send + Sync {
    /// Get the current time in UTC.
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System clock implementation using real time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for testing with controllable time.
#[derive(Debug, Clone)]
pub struct MockClock {
    utc_time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Create a new mock clock set to the given UTC time.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self {
            utc_time: Arc::new(Mutex::new(time)),
        }
    }

    /// Set the mock clock to a new time.
    pub fn set_time(&self, time: DateTime<Utc>) {
        *self.utc_time.lock().unwrap_or_else(PoisonError::into_inner) = time;
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: chrono::Duration) {
        let mut time = self.utc_time.lock().unwrap_or_else(PoisonError::into_inner);
        *time += duration;
    }
}

impl Clock for MockClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.utc_time.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ==================== SnapshotFetcher Trait ====================

/// Source of fresh snapshots for the poll coordinator.
///
/// Implemented by [`crate::api::PollenApiClient`]; tests substitute scripted
/// fetchers to drive the coordinator through success and failure sequences.
pub trait SnapshotFetcher: Send + Sync {
    fn fetch_snapshot(&self) -> impl Future<Output = Result<Snapshot, UpdateFailed>> + Send;
}
