//! Pollen kinds, severity levels and threshold-based classification.

use std::{collections::HashMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::PollenError;

// ==================== Pollen Kinds ====================

/// The closed set of pollen types tracked by the integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollenKind {
    Alder,
    Birch,
    Grass,
    Mugwort,
    Olive,
    Ragweed,
}

impl PollenKind {
    /// All kinds in the order the remote API expects them.
    pub const ALL: [PollenKind; 6] = [
        PollenKind::Alder,
        PollenKind::Birch,
        PollenKind::Grass,
        PollenKind::Mugwort,
        PollenKind::Olive,
        PollenKind::Ragweed,
    ];

    /// Parameter name used by the API, also used as translation key.
    pub fn api_key(&self) -> &'static str {
        match self {
            PollenKind::Alder => "alder_pollen",
            PollenKind::Birch => "birch_pollen",
            PollenKind::Grass => "grass_pollen",
            PollenKind::Mugwort => "mugwort_pollen",
            PollenKind::Olive => "olive_pollen",
            PollenKind::Ragweed => "ragweed_pollen",
        }
    }

    /// Short identifier used as the unique-id suffix of a sensor.
    pub fn slug(&self) -> &'static str {
        match self {
            PollenKind::Alder => "alder",
            PollenKind::Birch => "birch",
            PollenKind::Grass => "grass",
            PollenKind::Mugwort => "mugwort",
            PollenKind::Olive => "olive",
            PollenKind::Ragweed => "ragweed",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            PollenKind::Alder => "Alder",
            PollenKind::Birch => "Birch",
            PollenKind::Grass => "Grass",
            PollenKind::Mugwort => "Mugwort",
            PollenKind::Olive => "Olive",
            PollenKind::Ragweed => "Ragweed",
        }
    }

    /// Comma-joined list of API parameter names, in API order.
    pub fn query_list() -> String {
        PollenKind::ALL
            .iter()
            .map(|k| k.api_key())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl FromStr for PollenKind {
    type Err = PollenError;

    /// Accepts either the short slug (`grass`) or the API key (`grass_pollen`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PollenKind::ALL
            .into_iter()
            .find(|kind| kind.slug() == s || kind.api_key() == s)
            .ok_or_else(|| PollenError::UnknownKind(s.to_string()))
    }
}

impl fmt::Display for PollenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

// ==================== Severity Levels ====================

/// Qualitative risk band, ordered from lowest to highest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SeverityLevel {
    #[serde(rename = "level_none")]
    None,
    #[serde(rename = "level_low")]
    Low,
    #[serde(rename = "level_moderate")]
    Moderate,
    #[serde(rename = "level_high")]
    High,
    #[serde(rename = "level_very_high")]
    VeryHigh,
}

impl SeverityLevel {
    pub const ALL: [SeverityLevel; 5] = [
        SeverityLevel::None,
        SeverityLevel::Low,
        SeverityLevel::Moderate,
        SeverityLevel::High,
        SeverityLevel::VeryHigh,
    ];

    /// Translation key of the level.
    pub fn label(&self) -> &'static str {
        match self {
            SeverityLevel::None => "level_none",
            SeverityLevel::Low => "level_low",
            SeverityLevel::Moderate => "level_moderate",
            SeverityLevel::High => "level_high",
            SeverityLevel::VeryHigh => "level_very_high",
        }
    }

    /// Integer rank used for sorting and graphing.
    pub fn rank(&self) -> u8 {
        match self {
            SeverityLevel::None => 0,
            SeverityLevel::Low => 1,
            SeverityLevel::Moderate => 2,
            SeverityLevel::High => 3,
            SeverityLevel::VeryHigh => 4,
        }
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for SeverityLevel {
    type Err = PollenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SeverityLevel::ALL
            .into_iter()
            .find(|level| level.label() == s)
            .ok_or_else(|| PollenError::UnknownLevel(s.to_string()))
    }
}

/// Rank of a level given by its label.
///
/// # Errors
/// Returns [`PollenError::UnknownLevel`] for labels outside the level set.
pub fn rank(label: &str) -> Result<u8, PollenError> {
    label.parse::<SeverityLevel>().map(|level| level.rank())
}

// ==================== Threshold Tables ====================

/// Ordered upper bounds for one pollen kind.
///
/// A value belongs to the first band whose upper bound is `>=` the value.
/// Values above every bound are [`SeverityLevel::VeryHigh`].
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    bands: Vec<(f64, SeverityLevel)>,
}

impl ThresholdTable {
    /// Build a table from the upper bounds of none, low, moderate and high.
    ///
    /// # Errors
    /// Returns [`PollenError::ConfigurationInconsistency`] unless exactly four
    /// finite, strictly increasing bounds are given.
    pub fn from_bounds(bounds: &[f64]) -> Result<Self, PollenError> {
        const LEVELS: [SeverityLevel; 4] = [
            SeverityLevel::None,
            SeverityLevel::Low,
            SeverityLevel::Moderate,
            SeverityLevel::High,
        ];

        if bounds.len() != LEVELS.len() {
            return Err(PollenError::ConfigurationInconsistency(format!(
                "expected {} upper bounds, got {}",
                LEVELS.len(),
                bounds.len()
            )));
        }
        if bounds.iter().any(|b| !b.is_finite()) {
            return Err(PollenError::ConfigurationInconsistency(
                "upper bounds must be finite".to_string(),
            ));
        }
        if bounds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PollenError::ConfigurationInconsistency(format!(
                "upper bounds must be strictly increasing: {:?}",
                bounds
            )));
        }

        Ok(Self {
            bands: bounds.iter().copied().zip(LEVELS).collect(),
        })
    }

    /// Built-in table for a kind.
    pub fn builtin(kind: PollenKind) -> Self {
        let moderate_max = match kind {
            // mean threshold in Europe
            PollenKind::Ragweed => 37.0,
            _ => 50.0,
        };
        Self {
            bands: vec![
                (0.0, SeverityLevel::None),
                (10.0, SeverityLevel::Low),
                (moderate_max, SeverityLevel::Moderate),
                (100.0, SeverityLevel::High),
            ],
        }
    }

    pub fn classify(&self, value: f64) -> SeverityLevel {
        self.bands
            .iter()
            .find(|(upper, _)| value <= *upper)
            .map(|(_, level)| *level)
            .unwrap_or(SeverityLevel::VeryHigh)
    }

    pub fn bands(&self) -> &[(f64, SeverityLevel)] {
        &self.bands
    }
}

/// Threshold tables for every kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Thresholds {
    tables: HashMap<PollenKind, ThresholdTable>,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            tables: PollenKind::ALL
                .into_iter()
                .map(|kind| (kind, ThresholdTable::builtin(kind)))
                .collect(),
        }
    }
}

impl Thresholds {
    /// Built-in tables with the given per-kind overrides applied.
    ///
    /// # Errors
    /// Fails with [`PollenError::ConfigurationInconsistency`] if any override
    /// is not a valid table.
    pub fn with_overrides(overrides: &HashMap<PollenKind, Vec<f64>>) -> Result<Self, PollenError> {
        let mut thresholds = Self::default();
        for (kind, bounds) in overrides {
            let table = ThresholdTable::from_bounds(bounds).map_err(|e| match e {
                PollenError::ConfigurationInconsistency(msg) => {
                    PollenError::ConfigurationInconsistency(format!("{}: {}", kind.api_key(), msg))
                }
                other => other,
            })?;
            thresholds.tables.insert(*kind, table);
        }
        Ok(thresholds)
    }

    pub fn table(&self, kind: PollenKind) -> ThresholdTable {
        self.tables
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| ThresholdTable::builtin(kind))
    }

    pub fn classify(&self, kind: PollenKind, value: f64) -> SeverityLevel {
        match self.tables.get(&kind) {
            Some(table) => table.classify(value),
            None => ThresholdTable::builtin(kind).classify(value),
        }
    }
}

/// Classify a concentration using the built-in table of `kind`.
pub fn classify(kind: PollenKind, value: f64) -> SeverityLevel {
    ThresholdTable::builtin(kind).classify(value)
}
