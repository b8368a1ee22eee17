// Roll-up math: raw -> 1h and finer -> coarser aggregates

mod common;

use common::{assert_close, hour, minutes, raw};
use rhq_metrics::aggregation::{aggregate_aggregates, aggregate_raw};
use rhq_metrics::models::AggregateNumericMetric;

#[test]
fn aggregate_raw_empty_returns_none() {
    assert!(aggregate_raw(&[], 1, hour(0)).is_none());
}

#[test]
fn aggregate_raw_single_sample() {
    let out = aggregate_raw(&[raw(1, hour(0) + 5, 25.0)], 1, hour(0)).unwrap();
    assert_eq!(out.schedule_id, 1);
    assert_eq!(out.time, hour(0));
    assert_eq!(out.avg, 25.0);
    assert_eq!(out.min, 25.0);
    assert_eq!(out.max, 25.0);
}

#[test]
fn aggregate_raw_computes_mean_min_max() {
    let samples = vec![
        raw(123, hour(8) + minutes(5), 1.1),
        raw(123, hour(8) + minutes(10), 2.2),
        raw(123, hour(8) + minutes(15), 3.3),
    ];
    let out = aggregate_raw(&samples, 123, hour(8)).unwrap();
    assert_close(out.avg, 2.2);
    assert_eq!(out.min, 1.1);
    assert_eq!(out.max, 3.3);
}

#[test]
fn aggregate_aggregates_empty_returns_none() {
    assert!(aggregate_aggregates(&[], 1, hour(0)).is_none());
}

#[test]
fn aggregate_aggregates_six_hours() {
    let one_hour =
        |h: i64, avg: f64| AggregateNumericMetric::new(7, hour(h), avg, avg - 1.0, avg + 1.0);
    let children = vec![
        one_hour(0, 10.0),
        one_hour(1, 20.0),
        one_hour(2, 30.0),
        one_hour(3, 40.0),
        one_hour(4, 50.0),
        one_hour(5, 60.0),
    ];
    let out = aggregate_aggregates(&children, 7, hour(0)).unwrap();
    assert_eq!(out.time, hour(0));
    assert_eq!(out.avg, 35.0);
    assert_eq!(out.min, 9.0);
    assert_eq!(out.max, 61.0);
}

#[test]
fn aggregate_aggregates_mean_is_unweighted() {
    // Child averages 1.0 (from one sample) and 4.0 (from many): result is 2.5 regardless.
    let children = vec![
        AggregateNumericMetric::new(7, hour(0), 1.0, 1.0, 1.0),
        AggregateNumericMetric::new(7, hour(1), 4.0, 3.0, 5.0),
    ];
    let out = aggregate_aggregates(&children, 7, hour(0)).unwrap();
    assert_eq!(out.avg, 2.5);
    assert_eq!(out.min, 1.0);
    assert_eq!(out.max, 5.0);
}

#[test]
fn aggregate_aggregates_skips_missing_statistics() {
    let children = vec![
        AggregateNumericMetric::new(7, hour(0), 2.0, f64::NAN, f64::NAN),
        AggregateNumericMetric::new(7, hour(1), 4.0, 3.0, 5.0),
    ];
    let out = aggregate_aggregates(&children, 7, hour(0)).unwrap();
    assert_eq!(out.avg, 3.0);
    assert_eq!(out.min, 3.0);
    assert_eq!(out.max, 5.0);
}
