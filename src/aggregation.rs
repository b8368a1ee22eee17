// Pure roll-up math. DB access (read dirty buckets, write results) lives in metrics_server.
//
// Coarser tiers average the child averages without weighting by sample count. A 1h bucket with
// 3 samples counts as much as one with 300. Thresholds downstream are calibrated to this.

use crate::models::{AggregateNumericMetric, RawNumericMetric};

/// Folds the raw samples of one bucket into {avg, min, max}. `None` when there are no samples.
pub fn aggregate_raw(
    samples: &[RawNumericMetric],
    schedule_id: i32,
    bucket_start: i64,
) -> Option<AggregateNumericMetric> {
    if samples.is_empty() {
        return None;
    }
    let values = samples.iter().map(|s| s.value);
    Some(AggregateNumericMetric {
        schedule_id,
        time: bucket_start,
        avg: mean(values.clone()),
        min: min_of(values.clone()),
        max: max_of(values),
    })
}

/// Folds finer aggregates into one coarser bucket: min of mins, max of maxes,
/// unweighted mean of averages. NaN statistics in the children are skipped.
pub fn aggregate_aggregates(
    children: &[AggregateNumericMetric],
    schedule_id: i32,
    bucket_start: i64,
) -> Option<AggregateNumericMetric> {
    if children.is_empty() {
        return None;
    }
    Some(AggregateNumericMetric {
        schedule_id,
        time: bucket_start,
        avg: mean(children.iter().map(|a| a.avg)),
        min: min_of(children.iter().map(|a| a.min)),
        max: max_of(children.iter().map(|a| a.max)),
    })
}

/// Arithmetic mean of the non-NaN values; NaN when there are none.
pub fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Minimum of the non-NaN values; NaN when there are none.
pub fn min_of(values: impl Iterator<Item = f64>) -> f64 {
    values
        .filter(|v| !v.is_nan())
        .reduce(f64::min)
        .unwrap_or(f64::NAN)
}

/// Maximum of the non-NaN values; NaN when there are none.
pub fn max_of(values: impl Iterator<Item = f64>) -> f64 {
    values
        .filter(|v| !v.is_nan())
        .reduce(f64::max)
        .unwrap_or(f64::NAN)
}
