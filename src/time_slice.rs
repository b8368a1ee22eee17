// Canonical bucket boundaries (1h / 6h / 24h) in one reference timezone.
// A fixed UTC offset is used for the whole system, so alignment never shifts across DST changes.

use chrono::{FixedOffset, Offset, TimeZone, Utc};

pub const MS_PER_MINUTE: i64 = 60_000;
pub const MS_PER_HOUR: i64 = 60 * MS_PER_MINUTE;
pub const MS_PER_DAY: i64 = 24 * MS_PER_HOUR;
pub const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSlicer {
    offset: FixedOffset,
}

impl Default for TimeSlicer {
    fn default() -> Self {
        Self::utc()
    }
}

impl TimeSlicer {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    /// `None` when the offset is outside ±14 hours.
    pub fn with_offset_minutes(minutes: i32) -> Option<Self> {
        if minutes.abs() > 14 * 60 {
            return None;
        }
        FixedOffset::east_opt(minutes * 60).map(|offset| Self { offset })
    }

    fn offset_ms(&self) -> i64 {
        self.offset.local_minus_utc() as i64 * 1000
    }

    /// Start of the `width_minutes` slice containing `instant_ms`.
    /// `width_minutes` must divide a day so slices line up with local midnight.
    pub fn time_slice_start(&self, instant_ms: i64, width_minutes: u32) -> i64 {
        debug_assert!(width_minutes > 0 && MINUTES_PER_DAY % width_minutes == 0);
        let width_ms = width_minutes as i64 * MS_PER_MINUTE;
        let offset_ms = self.offset_ms();
        (instant_ms + offset_ms).div_euclid(width_ms) * width_ms - offset_ms
    }

    pub fn current_hour(&self, now_ms: i64) -> i64 {
        self.time_slice_start(now_ms, 60)
    }

    /// True when `instant_ms` is itself the start of a `width_minutes` slice.
    pub fn is_boundary(&self, instant_ms: i64, width_minutes: u32) -> bool {
        self.time_slice_start(instant_ms, width_minutes) == instant_ms
    }

    /// RFC 3339 rendering in the reference offset, for logs.
    pub fn format(&self, instant_ms: i64) -> String {
        match self.offset.timestamp_millis_opt(instant_ms).single() {
            Some(dt) => dt.to_rfc3339(),
            None => instant_ms.to_string(),
        }
    }
}
