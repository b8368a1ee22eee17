// Buckets: partitioning a query window into 60 display slices

mod common;

use common::{hour, minutes};
use rhq_metrics::buckets::{Buckets, NUMBER_OF_BUCKETS};

#[test]
fn partitions_window_into_sixty_equal_buckets() {
    let buckets = Buckets::new(hour(8), hour(12));
    assert_eq!(buckets.len(), NUMBER_OF_BUCKETS);
    assert_eq!(buckets.interval(), minutes(4));

    let first = buckets.get(0).unwrap();
    assert_eq!(first.start_time, hour(8));
    assert_eq!(first.end_time, hour(8) + minutes(4));

    let last = buckets.get(59).unwrap();
    assert_eq!(last.start_time, hour(8) + minutes(4 * 59));
    assert_eq!(last.end_time, hour(12));
}

#[test]
fn last_bucket_absorbs_remainder() {
    let buckets = Buckets::new(0, 6_005);
    assert_eq!(buckets.interval(), 100);
    assert_eq!(buckets.get(59).unwrap().end_time, 6_005);
    assert_eq!(buckets.find(6_004), Some(59));
}

#[test]
fn find_is_half_open() {
    let buckets = Buckets::new(hour(8), hour(12));
    assert_eq!(buckets.find(hour(8)), Some(0));
    assert_eq!(buckets.find(hour(8) + minutes(4)), Some(1));
    assert_eq!(buckets.find(hour(12) - 1), Some(59));
    assert_eq!(buckets.find(hour(12)), None);
    assert_eq!(buckets.find(hour(8) - 1), None);
}

#[test]
fn empty_buckets_are_nan() {
    let buckets = Buckets::new(hour(0), hour(1));
    let points = buckets.to_composites();
    assert_eq!(points.len(), 60);
    assert!(points.iter().all(|p| p.avg.is_nan() && p.min.is_nan() && p.max.is_nan()));
    assert_eq!(points[3].time, hour(0) + minutes(3));
}

#[test]
fn raw_values_fold_into_avg_min_max() {
    let mut buckets = Buckets::new(hour(0), hour(1));
    assert!(buckets.insert_raw(hour(0) + 1_000, 2.0));
    assert!(buckets.insert_raw(hour(0) + 2_000, 4.0));
    assert!(buckets.insert_raw(hour(0) + 3_000, 9.0));
    assert!(!buckets.insert_raw(hour(1), 100.0));

    let p = buckets.to_composites()[0];
    assert_eq!(p.avg, 5.0);
    assert_eq!(p.min, 2.0);
    assert_eq!(p.max, 9.0);
    assert!(p.has_data());
    assert!(!buckets.to_composites()[1].has_data());
}

#[test]
fn aggregates_fold_min_of_mins_max_of_maxes() {
    let mut buckets = Buckets::new(hour(0), hour(60));
    buckets.insert_aggregate(hour(0), 10.0, 1.0, 20.0);
    buckets.insert_aggregate(hour(0) + minutes(30), 30.0, 5.0, 50.0);

    let p = buckets.to_composites()[0];
    assert_eq!(p.avg, 20.0);
    assert_eq!(p.min, 1.0);
    assert_eq!(p.max, 50.0);
}
