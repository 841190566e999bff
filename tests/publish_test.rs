use chrono::NaiveDate;
use powershop_nz::aggregate::{
    Aggregate, ElementDay, ElementMap, Property, PropertyFetch, RateSummary, assemble,
};
use powershop_nz::api::{UsageDay, UsageRecord};
use powershop_nz::error::{ErrorKind, FetchFailure};
use powershop_nz::publish::{AggregateSink, JsonSnapshotSink, LogSummarySink};
use powershop_nz::statistics::StatisticsBatch;

fn property(id: &str, name: Option<&str>) -> Property {
    Property {
        consumer_id: id.into(),
        name: name.map(str::to_string),
        connection_number: Some(format!("ICP{}", id)),
        account_number: Some("A1".into()),
        account_name: None,
    }
}

fn sample() -> Aggregate {
    let mut elements = ElementMap::new();
    elements.insert(
        "Controlled".into(),
        vec![ElementDay {
            date: NaiveDate::from_ymd_opt(2025, 8, 5).unwrap(),
            usage: vec![500.0; 48],
        }],
    );
    assemble(vec![
        PropertyFetch {
            property: property("1", Some("Home")),
            usage: Ok(UsageRecord {
                usages: vec![UsageDay {
                    date: Some("2025-08-05".into()),
                    iso8601_date: Some("2025-08-05".into()),
                    usage: vec![Some(400.0), Some(600.0)],
                }],
            }),
            rate: RateSummary {
                month_label: "Aug".into(),
                special_incl_dollars_current_month: Some(0.25),
            },
            elements,
        },
        PropertyFetch {
            property: property("2", None),
            usage: Err(FetchFailure {
                kind: ErrorKind::Communication,
                message: "Timeout error: usage".into(),
            }),
            rate: RateSummary {
                month_label: "Aug".into(),
                special_incl_dollars_current_month: None,
            },
            elements: ElementMap::new(),
        },
    ])
}

#[tokio::test]
async fn snapshot_roundtrips_and_replaces_previous() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonSnapshotSink::new(dir.path().join("nested").join("latest.json"));
    assert!(sink.load().await.unwrap().is_none());

    sink.publish(&Aggregate::default()).await.unwrap();
    let aggregate = sample();
    sink.publish(&aggregate).await.unwrap();

    let snapshot = sink.load().await.unwrap().unwrap();
    assert_eq!(snapshot.aggregate, aggregate);
    // Only the final file remains
    let names: Vec<String> = std::fs::read_dir(sink.path().parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(names, vec!["latest.json".to_string()]);
}

#[tokio::test]
async fn log_summary_handles_failed_properties() {
    let sink = LogSummarySink::new(chrono_tz::Pacific::Auckland);
    sink.publish(&sample()).await.unwrap();
}

#[test]
fn statistics_batch_covers_successful_usage_only() {
    let batch = StatisticsBatch::from_aggregate(&sample(), chrono_tz::Pacific::Auckland);
    assert_eq!(batch.len(), 1);
    let entry = &batch.entries[0];
    assert_eq!(entry.metadata.statistic_id, "powershop_nz:consumption:1");
    assert_eq!(entry.metadata.name, "Home Consumption");
    assert_eq!(entry.metadata.unit_of_measurement, "kWh");
    assert_eq!(entry.points.len(), 1);
    assert_eq!(entry.points[0].sum, 1.0);
}
