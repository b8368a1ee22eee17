// Display point returned by the query API.

use serde::{Deserialize, Serialize};

/// One chart point. NaN in all three values means "no data" (serialised as null).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumericHighLowComposite {
    pub time: i64,
    pub avg: f64,
    pub max: f64,
    pub min: f64,
}

impl NumericHighLowComposite {
    pub fn new(time: i64, avg: f64, max: f64, min: f64) -> Self {
        Self { time, avg, max, min }
    }

    pub fn empty(time: i64) -> Self {
        Self::new(time, f64::NAN, f64::NAN, f64::NAN)
    }

    pub fn has_data(&self) -> bool {
        !self.avg.is_nan()
    }
}
