//! Consumer-facing read model: one parameterized sensor per pollen kind.

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::{
    analytics::{ForecastSummary, build_forecast, offset_from_seconds, parse_timestamp},
    api::Snapshot,
    pollen::{PollenKind, SeverityLevel, Thresholds},
};

pub const DEVICE_MANUFACTURER: &str = "open-meteo.com";
pub const DEVICE_MODEL: &str = "Open Meteo Pollen";
pub const DEVICE_NAME: &str = "Pollen";
pub const UNIT: &str = "grains/m³";
pub const ICON: &str = "mdi:flower-pollen";
pub const DISPLAY_PRECISION: u8 = 2;

/// Static metadata of a sensor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SensorDescriptor {
    pub unique_id: String,
    pub name: &'static str,
    pub translation_key: &'static str,
    pub icon: &'static str,
    pub unit: &'static str,
    pub state_class: &'static str,
    pub suggested_display_precision: u8,
}

/// Device all sensors of one location belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub identifier: String,
    pub name: &'static str,
    pub manufacturer: &'static str,
    pub model: &'static str,
}

/// Everything a consumer needs to present one kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    pub kind: PollenKind,
    pub native_value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_risk: Option<SeverityLevel>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_risk_raw: Option<u8>,
    #[serde(flatten)]
    pub forecast: ForecastSummary,
}

#[derive(Debug, Clone)]
pub struct PollenSensor {
    kind: PollenKind,
    entry_id: String,
    thresholds: Thresholds,
}

impl PollenSensor {
    pub fn new(kind: PollenKind, entry_id: impl Into<String>, thresholds: Thresholds) -> Self {
        Self {
            kind,
            entry_id: entry_id.into(),
            thresholds,
        }
    }

    /// One sensor per kind, in API order.
    pub fn all(entry_id: &str, thresholds: &Thresholds) -> Vec<PollenSensor> {
        PollenKind::ALL
            .into_iter()
            .map(|kind| PollenSensor::new(kind, entry_id, thresholds.clone()))
            .collect()
    }

    pub fn kind(&self) -> PollenKind {
        self.kind
    }

    pub fn descriptor(&self) -> SensorDescriptor {
        SensorDescriptor {
            unique_id: format!("{}_{}", self.entry_id, self.kind.slug()),
            name: self.kind.display_name(),
            translation_key: self.kind.api_key(),
            icon: ICON,
            unit: UNIT,
            state_class: "measurement",
            suggested_display_precision: DISPLAY_PRECISION,
        }
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            identifier: self.entry_id.clone(),
            name: DEVICE_NAME,
            manufacturer: DEVICE_MANUFACTURER,
            model: DEVICE_MODEL,
        }
    }

    /// Derive the presentable state from a snapshot at time `now`.
    pub fn state(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> SensorState {
        let offset_seconds = snapshot.utc_offset_seconds();
        let native_value = snapshot.current_value(self.kind);
        let current_risk = native_value.map(|v| self.thresholds.classify(self.kind, v));

        let forecast = build_forecast(
            &self.thresholds,
            self.kind,
            &snapshot.hourly.time,
            snapshot.hourly.series(self.kind),
            now,
            offset_seconds,
        );

        SensorState {
            kind: self.kind,
            native_value,
            updated_at: parse_timestamp(&snapshot.current.time, offset_from_seconds(offset_seconds)),
            current_risk,
            current_risk_raw: current_risk.map(|level| level.rank()),
            forecast,
        }
    }
}
