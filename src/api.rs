use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::{
    config::{LocationConfig, NetworkConfig},
    error::{FetchError, UpdateFailed},
    pollen::PollenKind,
    traits::SnapshotFetcher,
};

/// Default endpoint of the Open-Meteo air quality API.
pub const DEFAULT_BASE_URL: &str = "https://air-quality-api.open-meteo.com/v1/air-quality";

/// Number of forecast days requested from the API.
const FORECAST_DAYS: u32 = 2;

// ==================== Payload Types ====================

/// Concentrations for every pollen kind, `None` where the API has no data.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PollenValues<T> {
    pub alder_pollen: T,
    pub birch_pollen: T,
    pub grass_pollen: T,
    pub mugwort_pollen: T,
    pub olive_pollen: T,
    pub ragweed_pollen: T,
}

impl<T> PollenValues<T> {
    pub fn get(&self, kind: PollenKind) -> &T {
        match kind {
            PollenKind::Alder => &self.alder_pollen,
            PollenKind::Birch => &self.birch_pollen,
            PollenKind::Grass => &self.grass_pollen,
            PollenKind::Mugwort => &self.mugwort_pollen,
            PollenKind::Olive => &self.olive_pollen,
            PollenKind::Ragweed => &self.ragweed_pollen,
        }
    }
}

/// The `current` block of the response.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct CurrentConditions {
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_seconds: Option<i32>,
    #[serde(flatten)]
    pub values: PollenValues<Option<f64>>,
}

/// The `hourly` block of the response, index-aligned with `time`.
///
/// A kind whose column is absent only loses its own forecast.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HourlySeries {
    pub time: Vec<String>,
    #[serde(flatten)]
    pub values: PollenValues<Option<Vec<Option<f64>>>>,
}

impl HourlySeries {
    /// Hourly values for one kind, empty when the column is absent.
    pub fn series(&self, kind: PollenKind) -> &[Option<f64>] {
        self.values.get(kind).as_deref().unwrap_or(&[])
    }
}

/// The most recent successfully fetched payload.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Snapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utc_offset_seconds: Option<i32>,
    pub current: CurrentConditions,
    pub hourly: HourlySeries,
}

impl Snapshot {
    /// Parse and validate a raw JSON body.
    pub fn from_json(body: &str) -> Result<Self, FetchError> {
        let snapshot: Snapshot = serde_json::from_str(body)
            .map_err(|e| FetchError::MalformedPayload(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check that every hourly series present is aligned with `hourly.time`.
    pub fn validate(&self) -> Result<(), FetchError> {
        let expected = self.hourly.time.len();
        for kind in PollenKind::ALL {
            let Some(series) = self.hourly.values.get(kind) else {
                continue;
            };
            let actual = series.len();
            if actual != expected {
                return Err(FetchError::MalformedPayload(format!(
                    "hourly.{} has {} values but hourly.time has {}",
                    kind.api_key(),
                    actual,
                    expected
                )));
            }
        }
        Ok(())
    }

    /// UTC offset of the location, preferring the top-level field.
    pub fn utc_offset_seconds(&self) -> i32 {
        self.utc_offset_seconds
            .or(self.current.utc_offset_seconds)
            .unwrap_or(0)
    }

    pub fn current_value(&self, kind: PollenKind) -> Option<f64> {
        *self.current.values.get(kind)
    }
}

// ==================== API Client ====================

/// API client for fetching pollen forecasts for a fixed location.
#[derive(Clone, Debug)]
pub struct PollenApiClient {
    client: reqwest::Client,
    base_url: String,
    latitude: f64,
    longitude: f64,
}

impl PollenApiClient {
    /// Create a new API client with configurable timeouts.
    pub fn new(
        base_url: String,
        location: &LocationConfig,
        network_config: &NetworkConfig,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(network_config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(network_config.connect_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url,
            latitude: location.latitude,
            longitude: location.longitude,
        })
    }

    /// Query parameters sent with every request.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        let kinds = PollenKind::query_list();
        vec![
            ("latitude", self.latitude.to_string()),
            ("longitude", self.longitude.to_string()),
            ("hourly", kinds.clone()),
            ("current", kinds),
            ("timezone", "auto".to_string()),
            ("forecast_days", FORECAST_DAYS.to_string()),
        ]
    }

    /// Fetch the current conditions and hourly forecast.
    pub async fn fetch(&self) -> Result<Snapshot, UpdateFailed> {
        self.fetch_raw().await.map_err(UpdateFailed::from)
    }

    async fn fetch_raw(&self) -> Result<Snapshot, FetchError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status));
        }

        let body = response.text().await?;
        Snapshot::from_json(&body)
    }
}

impl SnapshotFetcher for PollenApiClient {
    async fn fetch_snapshot(&self) -> Result<Snapshot, UpdateFailed> {
        self.fetch().await
    }
}
