use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use serde::Serialize;

use crate::pollen::{PollenKind, SeverityLevel, Thresholds};

/// Factors the last value is compared against, relative to the first.
const TREND_RISE_FACTOR: f64 = 1.2;
const TREND_FALL_FACTOR: f64 = 0.8;

// ==================== Trend ====================

/// Direction of a forecast trend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TrendDirection {
    #[serde(rename = "trend_increasing")]
    Increasing,
    #[serde(rename = "trend_decreasing")]
    Decreasing,
    #[serde(rename = "trend_stable")]
    Stable,
}

impl TrendDirection {
    /// Translation key of the trend.
    pub fn label(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "trend_increasing",
            TrendDirection::Decreasing => "trend_decreasing",
            TrendDirection::Stable => "trend_stable",
        }
    }

    /// Returns a human-readable description of the trend.
    pub fn description(&self) -> &'static str {
        match self {
            TrendDirection::Increasing => "rising",
            TrendDirection::Decreasing => "falling",
            TrendDirection::Stable => "steady",
        }
    }
}

/// Compare the first and last value of a series.
///
/// Only the endpoints matter: the last value must leave a ±20% band around
/// the first one to count as increasing or decreasing.
pub fn determine_trend(values: &[f64]) -> TrendDirection {
    let (Some(&first), Some(&last)) = (values.first(), values.last()) else {
        return TrendDirection::Stable;
    };
    if values.len() < 2 {
        return TrendDirection::Stable;
    }

    if last > first * TREND_RISE_FACTOR {
        TrendDirection::Increasing
    } else if last < first * TREND_FALL_FACTOR {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

// ==================== Forecast Window ====================

/// A single hourly forecast value at or after "now".
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    #[serde(rename = "datetime")]
    pub timestamp: DateTime<FixedOffset>,
    pub value: f64,
    pub level: SeverityLevel,
    #[serde(rename = "level_raw")]
    pub level_rank: u8,
}

/// Statistics over the future part of an hourly series.
///
/// The statistics are `None` when no point lies in the future.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastSummary {
    #[serde(rename = "forecast")]
    pub points: Vec<ForecastPoint>,
    #[serde(rename = "forecast_peak", skip_serializing_if = "Option::is_none")]
    pub peak: Option<f64>,
    #[serde(rename = "forecast_peak_level", skip_serializing_if = "Option::is_none")]
    pub peak_level: Option<SeverityLevel>,
    #[serde(rename = "forecast_peak_level_raw", skip_serializing_if = "Option::is_none")]
    pub peak_level_rank: Option<u8>,
    #[serde(rename = "forecast_avg", skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    #[serde(rename = "forecast_trend", skip_serializing_if = "Option::is_none")]
    pub trend: Option<TrendDirection>,
}

impl ForecastSummary {
    pub fn empty() -> Self {
        Self {
            points: Vec::new(),
            peak: None,
            peak_level: None,
            peak_level_rank: None,
            average: None,
            trend: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Round half away from zero to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parse an API timestamp, attaching `offset` when it carries no zone.
///
/// Accepts `YYYY-MM-DDTHH:MM`, `YYYY-MM-DDTHH:MM:SS`, RFC 3339 and
/// `YYYY-MM-DDTHH:MM` followed by an offset.
pub fn parse_timestamp(raw: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts);
    }
    if let Ok(ts) = DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M%:z") {
        return Some(ts);
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| offset.from_local_datetime(&naive).single())
}

/// Fixed offset for a number of seconds east of UTC, UTC if out of range.
pub fn offset_from_seconds(seconds: i32) -> FixedOffset {
    FixedOffset::east_opt(seconds).unwrap_or_else(|| Utc.fix())
}

/// Build the forecast window for one kind.
///
/// Points are kept only when their timestamp is at or after `now`. Null values
/// and unparseable timestamps are skipped.
pub fn build_forecast(
    thresholds: &Thresholds,
    kind: PollenKind,
    times: &[String],
    values: &[Option<f64>],
    now: DateTime<Utc>,
    tz_offset_seconds: i32,
) -> ForecastSummary {
    let offset = offset_from_seconds(tz_offset_seconds);
    let now = now.with_timezone(&offset);

    let points: Vec<ForecastPoint> = times
        .iter()
        .zip(values)
        .filter_map(|(raw, value)| {
            let value = (*value)?;
            let Some(timestamp) = parse_timestamp(raw, offset) else {
                tracing::debug!("Ignoring unparseable {} timestamp {:?}", kind, raw);
                return None;
            };
            (timestamp >= now).then(|| {
                let level = thresholds.classify(kind, value);
                ForecastPoint {
                    timestamp,
                    value,
                    level,
                    level_rank: level.rank(),
                }
            })
        })
        .collect();

    if points.is_empty() {
        return ForecastSummary::empty();
    }

    let future_values: Vec<f64> = points.iter().map(|p| p.value).collect();
    let peak = future_values
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    let average = future_values.iter().sum::<f64>() / future_values.len() as f64;
    let peak_level = thresholds.classify(kind, peak);

    ForecastSummary {
        points,
        peak: Some(peak),
        peak_level: Some(peak_level),
        peak_level_rank: Some(peak_level.rank()),
        average: Some(round2(average)),
        trend: Some(determine_trend(&future_values)),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, Timelike};

    use super::*;

    fn hours(start_hour: u32, count: u32) -> Vec<String> {
        (0..count)
            .map(|i| format!("2025-05-01T{:02}:00", start_hour + i))
            .collect()
    }

    fn utc(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 1, hour, minute, 0).unwrap()
    }

    // ==================== determine_trend Tests ====================

    #[test]
    fn test_trend_single_value_is_stable() {
        assert_eq!(determine_trend(&[50.0]), TrendDirection::Stable);
    }

    #[test]
    fn test_trend_empty_is_stable() {
        assert_eq!(determine_trend(&[]), TrendDirection::Stable);
    }

    #[test]
    fn test_trend_deadband_edges() {
        assert_eq!(determine_trend(&[50.0, 61.0]), TrendDirection::Increasing);
        assert_eq!(determine_trend(&[50.0, 60.0]), TrendDirection::Stable);
        assert_eq!(determine_trend(&[50.0, 39.0]), TrendDirection::Decreasing);
        assert_eq!(determine_trend(&[50.0, 40.0]), TrendDirection::Stable);
    }

    #[test]
    fn test_trend_ignores_middle_values() {
        assert_eq!(
            determine_trend(&[10.0, 500.0, 0.0, 10.0]),
            TrendDirection::Stable
        );
        assert_eq!(
            determine_trend(&[10.0, 0.0, 0.0, 13.0]),
            TrendDirection::Increasing
        );
    }

    #[test]
    fn test_trend_from_zero() {
        assert_eq!(determine_trend(&[0.0, 0.0]), TrendDirection::Stable);
        assert_eq!(determine_trend(&[0.0, 0.1]), TrendDirection::Increasing);
    }

    #[test]
    fn test_trend_serializes_as_translation_key() {
        let json = serde_json::to_string(&TrendDirection::Decreasing).unwrap();
        assert_eq!(json, "\"trend_decreasing\"");
        assert_eq!(TrendDirection::Decreasing.label(), "trend_decreasing");
    }

    // ==================== Timestamp Tests ====================

    #[test]
    fn test_parse_naive_timestamp_uses_offset() {
        let offset = offset_from_seconds(7200);
        let ts = parse_timestamp("2025-05-01T14:00", offset).unwrap();
        assert_eq!(ts.offset(), &offset);
        assert_eq!(ts.with_timezone(&Utc).hour(), 12);
    }

    #[test]
    fn test_parse_timestamp_offset_without_seconds() {
        let ts = parse_timestamp("2025-05-01T14:00+02:00", offset_from_seconds(0)).unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 7200);
        assert_eq!(ts.with_timezone(&Utc), Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_with_seconds() {
        let ts = parse_timestamp("2025-05-01T14:00:30", offset_from_seconds(0)).unwrap();
        assert_eq!(ts.second(), 30);
    }

    #[test]
    fn test_parse_rfc3339_keeps_its_own_offset() {
        let ts = parse_timestamp("2025-05-01T14:00:00+01:00", offset_from_seconds(7200)).unwrap();
        assert_eq!(ts.offset().local_minus_utc(), 3600);
        assert_eq!(ts.day(), 1);
    }

    #[test]
    fn test_parse_garbage_timestamp() {
        assert!(parse_timestamp("yesterday", offset_from_seconds(0)).is_none());
    }

    #[test]
    fn test_offset_out_of_range_falls_back_to_utc() {
        assert_eq!(offset_from_seconds(999_999).local_minus_utc(), 0);
    }

    #[test]
    fn test_round2_half_away_from_zero() {
        assert_eq!(round2(1.005_000_1), 1.01);
        assert_eq!(round2(2.344), 2.34);
        assert_eq!(round2(-2.5), -2.5);
        assert_eq!(round2(0.125), 0.13);
    }

    // ==================== build_forecast Tests ====================

    #[test]
    fn test_all_points_in_past_yields_empty_summary() {
        let times = hours(0, 4);
        let values = vec![Some(5.0), Some(20.0), Some(60.0), Some(120.0)];
        let summary = build_forecast(
            &Thresholds::default(),
            PollenKind::Grass,
            &times,
            &values,
            utc(10, 0),
            0,
        );

        assert!(summary.is_empty());
        assert_eq!(summary, ForecastSummary::empty());
    }

    #[test]
    fn test_empty_summary_omits_statistics_when_serialized() {
        let json = serde_json::to_value(ForecastSummary::empty()).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj.len(), 1);
        assert_eq!(obj["forecast"], serde_json::json!([]));
    }

    #[test]
    fn test_past_values_do_not_skew_average() {
        let times = hours(8, 4);
        // 08:00 and 09:00 are in the past
        let values = vec![Some(1000.0), Some(900.0), Some(10.0), Some(20.5)];
        let summary = build_forecast(
            &Thresholds::default(),
            PollenKind::Birch,
            &times,
            &values,
            utc(10, 0),
            0,
        );

        assert_eq!(summary.points.len(), 2);
        assert_eq!(summary.average, Some(15.25));
        assert_eq!(summary.peak, Some(20.5));
        assert_eq!(summary.peak_level, Some(SeverityLevel::Moderate));
        assert_eq!(summary.peak_level_rank, Some(2));
        assert_eq!(summary.trend, Some(TrendDirection::Increasing));
    }

    #[test]
    fn test_point_at_now_is_included() {
        let times = hours(10, 2);
        let values = vec![Some(3.0), Some(3.0)];
        let summary = build_forecast(
            &Thresholds::default(),
            PollenKind::Alder,
            &times,
            &values,
            utc(10, 0),
            0,
        );
        assert_eq!(summary.points.len(), 2);

        let later = build_forecast(
            &Thresholds::default(),
            PollenKind::Alder,
            &times,
            &values,
            utc(10, 1),
            0,
        );
        assert_eq!(later.points.len(), 1);
    }

    #[test]
    fn test_local_times_are_compared_in_offset() {
        // Local 14:00 at +02:00 is 12:00 UTC
        let times = vec!["2025-05-01T13:00".to_string(), "2025-05-01T14:00".to_string()];
        let values = vec![Some(1.0), Some(2.0)];
        let summary = build_forecast(
            &Thresholds::default(),
            PollenKind::Olive,
            &times,
            &values,
            utc(11, 30),
            7200,
        );

        assert_eq!(summary.points.len(), 1);
        assert_eq!(summary.points[0].value, 2.0);
        assert_eq!(summary.points[0].timestamp.hour(), 14);
        assert_eq!(summary.points[0].timestamp.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_null_values_are_skipped() {
        let times = hours(10, 3);
        let values = vec![Some(5.0), None, Some(5.0)];
        let summary = build_forecast(
            &Thresholds::default(),
            PollenKind::Ragweed,
            &times,
            &values,
            utc(9, 0),
            0,
        );
        assert_eq!(summary.points.len(), 2);
        assert_eq!(summary.average, Some(5.0));
    }

    #[test]
    fn test_point_levels_and_ranks() {
        let times = hours(10, 3);
        let values = vec![Some(0.0), Some(37.0), Some(150.0)];
        let summary = build_forecast(
            &Thresholds::default(),
            PollenKind::Ragweed,
            &times,
            &values,
            utc(9, 0),
            0,
        );

        let levels: Vec<_> = summary.points.iter().map(|p| (p.level, p.level_rank)).collect();
        assert_eq!(
            levels,
            vec![
                (SeverityLevel::None, 0),
                (SeverityLevel::Moderate, 2),
                (SeverityLevel::VeryHigh, 4)
            ]
        );
        assert_eq!(summary.peak_level, Some(SeverityLevel::VeryHigh));
        assert_eq!(summary.peak_level_rank, Some(4));
    }

    #[test]
    fn test_point_serializes_with_attribute_names() {
        let times = hours(10, 1);
        let summary = build_forecast(
            &Thresholds::default(),
            PollenKind::Grass,
            &times,
            &[Some(12.0)],
            utc(9, 0),
            3600,
        );
        let json = serde_json::to_value(&summary).unwrap();

        assert_eq!(json["forecast"][0]["datetime"], "2025-05-01T10:00:00+01:00");
        assert_eq!(json["forecast"][0]["level"], "level_moderate");
        assert_eq!(json["forecast"][0]["level_raw"], 2);
        assert_eq!(json["forecast_peak"], 12.0);
        assert_eq!(json["forecast_avg"], 12.0);
        assert_eq!(json["forecast_trend"], "trend_stable");
    }

    // ==================== Property-Based Tests ====================

    mod proptest_tests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn all_points_kept_when_now_precedes_series(
                values in prop::collection::vec(0.0f64..500.0, 1..24)
            ) {
                let times = hours(0, values.len() as u32);
                let series: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
                let now = Utc.with_ymd_and_hms(2025, 4, 30, 0, 0, 0).unwrap();
                let summary = build_forecast(
                    &Thresholds::default(),
                    PollenKind::Grass,
                    &times,
                    &series,
                    now,
                    0,
                );

                prop_assert_eq!(summary.points.len(), values.len());
                for (point, (raw, value)) in summary.points.iter().zip(times.iter().zip(&values)) {
                    prop_assert_eq!(point.value, *value);
                    prop_assert_eq!(point.timestamp, parse_timestamp(raw, offset_from_seconds(0)).unwrap());
                }
            }

            #[test]
            fn peak_and_average_bound_the_window(
                values in prop::collection::vec(0.0f64..500.0, 1..24)
            ) {
                let times = hours(0, values.len() as u32);
                let series: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
                let now = Utc.with_ymd_and_hms(2025, 4, 30, 0, 0, 0).unwrap();
                let summary = build_forecast(
                    &Thresholds::default(),
                    PollenKind::Birch,
                    &times,
                    &series,
                    now,
                    0,
                );

                let peak = summary.peak.unwrap();
                let average = summary.average.unwrap();
                prop_assert!(values.iter().all(|v| *v <= peak));
                prop_assert!(average <= round2(peak) + 0.01);
            }

            #[test]
            fn trend_within_deadband_is_stable(first in 1.0f64..1000.0, ratio in 0.8f64..=1.2) {
                let last = first * ratio;
                // Avoid float noise exactly at the band edges
                prop_assume!(last > first * 0.8 && last < first * 1.2);
                prop_assert_eq!(determine_trend(&[first, last]), TrendDirection::Stable);
            }
        }
    }
}
