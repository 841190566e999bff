//! Long-term consumption statistics
//!
//! Downstream recorders consume hourly cumulative kWh series. These helpers
//! derive them from the per-property usage records of an [`Aggregate`].

use crate::aggregate::{Aggregate, Property};
use crate::api::{UsageDay, UsageRecord};
use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const STATISTIC_SOURCE: &str = "powershop_nz";
pub const ENERGY_UNIT: &str = "kWh";

/// One hourly statistic row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticPoint {
    pub start: DateTime<Utc>,
    /// Cumulative kWh up to and including this hour
    pub sum: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticMetadata {
    pub statistic_id: String,
    pub source: String,
    pub name: String,
    pub unit_of_measurement: String,
    pub has_sum: bool,
    pub has_mean: bool,
}

impl StatisticMetadata {
    pub fn for_property(property: &Property) -> Self {
        Self {
            statistic_id: format!("{}:consumption:{}", STATISTIC_SOURCE, property.consumer_id),
            source: STATISTIC_SOURCE.to_string(),
            name: format!("{} Consumption", property.display_name()),
            unit_of_measurement: ENERGY_UNIT.to_string(),
            has_sum: true,
            has_mean: false,
        }
    }
}

/// Pair half-hour Wh readings into hourly kWh with a running sum
///
/// Days are ordered by date; days without a parseable date are skipped. A
/// pair with a missing half is skipped without resetting the sum. Local
/// hours that do not exist in `tz` (DST gaps) are dropped and ambiguous ones
/// resolve to the earlier instant.
pub fn hourly_statistics(usage: &UsageRecord, tz: Tz) -> Vec<StatisticPoint> {
    let mut days: Vec<(NaiveDate, &UsageDay)> = usage
        .usages
        .iter()
        .filter_map(|d| d.day().map(|day| (day, d)))
        .collect();
    days.sort_by_key(|(day, _)| *day);

    let mut running = 0.0;
    let mut points = Vec::new();
    for (day, record) in days {
        let midnight = day.and_time(chrono::NaiveTime::MIN);
        for (hour, pair) in record.usage.chunks_exact(2).enumerate() {
            let (Some(a), Some(b)) = (pair[0], pair[1]) else {
                continue;
            };
            running += (a + b) / 1000.0;
            let local = midnight + TimeDelta::hours(hour as i64);
            if let Some(start) = tz.from_local_datetime(&local).earliest() {
                points.push(StatisticPoint {
                    start: start.with_timezone(&Utc),
                    sum: running,
                });
            }
        }
    }
    points
}

/// Total kWh for `today`, else for the last listed day
///
/// `None` when the chosen day has no readings or any reading is missing.
pub fn latest_daily_total_kwh(usage: &UsageRecord, today: NaiveDate) -> Option<f64> {
    let chosen = usage
        .usages
        .iter()
        .find(|d| d.is_on(today))
        .or_else(|| usage.usages.last())?;
    if chosen.usage.is_empty() {
        return None;
    }
    let total_wh = chosen.usage.iter().copied().sum::<Option<f64>>()?;
    // kWh to 3 decimals
    Some(total_wh.round() / 1000.0)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyStatistics {
    pub metadata: StatisticMetadata,
    pub points: Vec<StatisticPoint>,
}

/// Statistics for every property whose usage fetch succeeded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatisticsBatch {
    pub entries: Vec<PropertyStatistics>,
}

impl StatisticsBatch {
    /// Properties with no hourly points are left out
    pub fn from_aggregate(aggregate: &Aggregate, tz: Tz) -> Self {
        let entries = aggregate
            .properties
            .iter()
            .filter_map(|property| {
                let record = aggregate.usages.get(&property.consumer_id)?.as_ref().ok()?;
                let points = hourly_statistics(record, tz);
                (!points.is_empty()).then(|| PropertyStatistics {
                    metadata: StatisticMetadata::for_property(property),
                    points,
                })
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(iso: &str, usage: Vec<Option<f64>>) -> UsageDay {
        UsageDay {
            date: None,
            iso8601_date: Some(iso.to_string()),
            usage,
        }
    }

    #[test]
    fn hourly_pairs_accumulate_in_date_order() {
        let record = UsageRecord {
            usages: vec![
                day("2025-08-06", vec![Some(1000.0), Some(1000.0)]),
                day("2025-08-05", vec![Some(500.0), Some(500.0), Some(250.0), Some(250.0)]),
            ],
        };
        let points = hourly_statistics(&record, chrono_tz::Pacific::Auckland);
        let sums: Vec<f64> = points.iter().map(|p| p.sum).collect();
        assert_eq!(sums, vec![1.0, 1.5, 3.5]);
        // NZST is UTC+12 in August
        assert_eq!(points[0].start.to_rfc3339(), "2025-08-04T12:00:00+00:00");
        assert_eq!(points[1].start.to_rfc3339(), "2025-08-04T13:00:00+00:00");
    }

    #[test]
    fn missing_half_skips_pair_but_keeps_sum() {
        let record = UsageRecord {
            usages: vec![day(
                "2025-08-05",
                vec![Some(1000.0), None, Some(2000.0), Some(0.0), Some(7.0)],
            )],
        };
        let points = hourly_statistics(&record, chrono_tz::UTC);
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].sum, 2.0);
        assert_eq!(points[0].start.to_rfc3339(), "2025-08-05T01:00:00+00:00");
    }

    #[test]
    fn daily_total_prefers_today() {
        let today = NaiveDate::from_ymd_opt(2025, 8, 5).unwrap();
        let record = UsageRecord {
            usages: vec![
                day("2025-08-05", vec![Some(1234.5), Some(100.0)]),
                day("2025-08-06", vec![Some(1.0)]),
            ],
        };
        assert_eq!(latest_daily_total_kwh(&record, today), Some(1.335));
        let other = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        assert_eq!(latest_daily_total_kwh(&record, other), Some(0.001));
    }

    #[test]
    fn daily_total_none_when_empty_or_incomplete() {
        let today = NaiveDate::from_ymd_opt(2025, 8, 5).unwrap();
        assert_eq!(latest_daily_total_kwh(&UsageRecord::default(), today), None);
        let record = UsageRecord {
            usages: vec![day("2025-08-05", vec![Some(1.0), None])],
        };
        assert_eq!(latest_daily_total_kwh(&record, today), None);
    }

    #[test]
    fn metadata_names_property() {
        let property = Property {
            consumer_id: "42".into(),
            name: None,
            connection_number: None,
            account_number: None,
            account_name: None,
        };
        let meta = StatisticMetadata::for_property(&property);
        assert_eq!(meta.statistic_id, "powershop_nz:consumption:42");
        assert_eq!(meta.name, "Property 42 Consumption");
        assert!(meta.has_sum && !meta.has_mean);
    }
}
