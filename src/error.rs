// Error taxonomy for the metrics core: validation (rejected before I/O) vs storage.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("invalid time range: begin {begin} must be >= 0 and before end {end}")]
    InvalidTimeRange { begin: i64, end: i64 },

    #[error("invalid schedule id {0}: schedule ids are positive")]
    InvalidScheduleId(i32),

    #[error("invalid value for schedule {schedule_id} at {timestamp}: value must be finite")]
    InvalidValue { schedule_id: i32, timestamp: i64 },

    /// Connection errors, timeouts, busy database. Callers may retry.
    #[error("storage unavailable: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl MetricsError {
    /// True for failures worth retrying (storage/io), false for rejected input.
    pub fn is_transient(&self) -> bool {
        matches!(self, MetricsError::Storage(_) | MetricsError::Io(_))
    }

    pub fn is_validation(&self) -> bool {
        !self.is_transient()
    }
}

pub type Result<T> = std::result::Result<T, MetricsError>;

/// Rejects reversed, empty or negative windows.
pub fn validate_time_range(begin: i64, end: i64) -> Result<()> {
    if begin < 0 || end <= begin {
        return Err(MetricsError::InvalidTimeRange { begin, end });
    }
    Ok(())
}

pub fn validate_schedule_id(schedule_id: i32) -> Result<()> {
    if schedule_id <= 0 {
        return Err(MetricsError::InvalidScheduleId(schedule_id));
    }
    Ok(())
}
