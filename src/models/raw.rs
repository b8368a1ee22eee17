// Raw numeric sample as reported by a monitored resource.

use serde::{Deserialize, Serialize};

/// One measurement. Identified by (schedule_id, timestamp); never mutated, removed only by expiry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawNumericMetric {
    pub schedule_id: i32,
    pub timestamp: i64,
    pub value: f64,
}

impl RawNumericMetric {
    pub fn new(schedule_id: i32, timestamp: i64, value: f64) -> Self {
        Self {
            schedule_id,
            timestamp,
            value,
        }
    }
}
