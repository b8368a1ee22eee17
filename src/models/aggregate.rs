// Aggregate rows: one composite {avg, min, max} per (resolution, schedule, bucket start),
// plus the typed single-value shape used for baseline history scans.

use serde::{Deserialize, Serialize};

use crate::time_slice::MS_PER_MINUTE;

/// Roll-up tier. Each tier has its own bucket width and retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Resolution {
    OneHour,
    SixHour,
    TwentyFourHour,
}

impl Resolution {
    /// Finest first; roll-up runs in this order.
    pub const ALL: [Resolution; 3] = [
        Resolution::OneHour,
        Resolution::SixHour,
        Resolution::TwentyFourHour,
    ];

    pub fn width_minutes(self) -> u32 {
        match self {
            Resolution::OneHour => 60,
            Resolution::SixHour => 6 * 60,
            Resolution::TwentyFourHour => 24 * 60,
        }
    }

    pub fn width_ms(self) -> i64 {
        self.width_minutes() as i64 * MS_PER_MINUTE
    }

    /// Value stored in the `resolution_seconds` column.
    pub fn resolution_seconds(self) -> i32 {
        self.width_minutes() as i32 * 60
    }

    /// The coarser tier this one rolls up into.
    pub fn next(self) -> Option<Self> {
        match self {
            Resolution::OneHour => Some(Resolution::SixHour),
            Resolution::SixHour => Some(Resolution::TwentyFourHour),
            Resolution::TwentyFourHour => None,
        }
    }

    /// The tier this one is computed from (`None`: computed from raw samples).
    pub fn finer(self) -> Option<Self> {
        match self {
            Resolution::OneHour => None,
            Resolution::SixHour => Some(Resolution::OneHour),
            Resolution::TwentyFourHour => Some(Resolution::SixHour),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Resolution::OneHour => "one_hour",
            Resolution::SixHour => "six_hour",
            Resolution::TwentyFourHour => "twenty_four_hour",
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite aggregate for one bucket. A column with no data reads back as NaN.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateNumericMetric {
    pub schedule_id: i32,
    pub time: i64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

impl AggregateNumericMetric {
    pub fn new(schedule_id: i32, time: i64, avg: f64, min: f64, max: f64) -> Self {
        Self {
            schedule_id,
            time,
            avg,
            min,
            max,
        }
    }
}

/// Which statistic a typed aggregate row carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateType {
    Avg,
    Min,
    Max,
}

impl AggregateType {
    pub(crate) fn column(self) -> &'static str {
        match self {
            AggregateType::Avg => "avg",
            AggregateType::Min => "min",
            AggregateType::Max => "max",
        }
    }
}

/// One statistic of one bucket, tagged by type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateSimpleNumericMetric {
    pub schedule_id: i32,
    pub time: i64,
    pub aggregate_type: AggregateType,
    pub value: f64,
}

impl AggregateSimpleNumericMetric {
    pub fn new(schedule_id: i32, time: i64, aggregate_type: AggregateType, value: f64) -> Self {
        Self {
            schedule_id,
            time,
            aggregate_type,
            value,
        }
    }
}

/// "schedule has data in this bucket of `resolution` not yet folded into the next tier".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsIndexEntry {
    pub resolution: Resolution,
    pub time: i64,
    pub schedule_id: i32,
}

impl MetricsIndexEntry {
    pub fn new(resolution: Resolution, time: i64, schedule_id: i32) -> Self {
        Self {
            resolution,
            time,
            schedule_id,
        }
    }
}
