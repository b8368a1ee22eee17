// Baselines: long-horizon min/mean/max per schedule for threshold comparison.

use serde::{Deserialize, Serialize};

/// Reference to a measurement schedule whose baseline is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRef {
    pub schedule_id: i32,
}

impl From<i32> for ScheduleRef {
    fn from(schedule_id: i32) -> Self {
        Self { schedule_id }
    }
}

/// Computed baseline. NaN marks a statistic with no source rows in the window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeasurementBaseline {
    pub schedule_id: i32,
    pub min: f64,
    pub mean: f64,
    pub max: f64,
    pub computed_at: i64,
}
