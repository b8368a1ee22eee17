use std::str::FromStr;

use serde::Deserialize;

use crate::models::Resolution;
use crate::time_slice::MS_PER_DAY;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub aggregation: AggregationConfig,
    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    pub max_pool_size: u32,
}

/// Storage-level TTL per tier, in days. Bounds how far back each resolution can answer.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_raw_days")]
    pub raw_days: u32,
    #[serde(default = "default_one_hour_days")]
    pub one_hour_days: u32,
    #[serde(default = "default_six_hour_days")]
    pub six_hour_days: u32,
    #[serde(default = "default_twenty_four_hour_days")]
    pub twenty_four_hour_days: u32,
}

fn default_raw_days() -> u32 {
    7
}

fn default_one_hour_days() -> u32 {
    14
}

fn default_six_hour_days() -> u32 {
    31
}

fn default_twenty_four_hour_days() -> u32 {
    365
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            raw_days: default_raw_days(),
            one_hour_days: default_one_hour_days(),
            six_hour_days: default_six_hour_days(),
            twenty_four_hour_days: default_twenty_four_hour_days(),
        }
    }
}

impl RetentionConfig {
    pub fn raw_ms(&self) -> i64 {
        self.raw_days as i64 * MS_PER_DAY
    }

    pub fn aggregate_ms(&self, resolution: Resolution) -> i64 {
        let days = match resolution {
            Resolution::OneHour => self.one_hour_days,
            Resolution::SixHour => self.six_hour_days,
            Resolution::TwentyFourHour => self.twenty_four_hour_days,
        };
        days as i64 * MS_PER_DAY
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AggregationConfig {
    /// Cron expression (with seconds field) for the roll-up pass. Local time.
    #[serde(default = "default_aggregation_schedule")]
    pub schedule: String,
    /// Max dirty entries rolled up concurrently within one tier.
    #[serde(default = "default_parallelism")]
    pub parallelism: usize,
    /// Run one catch-up pass before the first scheduled tick.
    #[serde(default = "default_run_on_startup")]
    pub run_on_startup: bool,
    /// Offset of the reference timezone used for bucket alignment.
    #[serde(default)]
    pub reference_utc_offset_minutes: i32,
}

fn default_aggregation_schedule() -> String {
    "0 5 * * * *".into()
}

fn default_parallelism() -> usize {
    4
}

fn default_run_on_startup() -> bool {
    true
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            schedule: default_aggregation_schedule(),
            parallelism: default_parallelism(),
            run_on_startup: default_run_on_startup(),
            reference_utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaintenanceConfig {
    /// Cron expression for pruning expired rows followed by VACUUM. Local time.
    #[serde(default = "default_prune_schedule")]
    pub prune_schedule: String,
}

fn default_prune_schedule() -> String {
    "0 30 3 * * *".into()
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            prune_schedule: default_prune_schedule(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var("CONFIG_FILE").unwrap_or_else(|_| "config.toml".into());
        let s = std::fs::read_to_string(&path)?;
        Self::load_from_str(&s)
    }

    /// Parse and validate config from a string (e.g. for tests).
    pub fn load_from_str(s: &str) -> anyhow::Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.server.port > 0,
            "server.port must be between 1 and 65535, got {}",
            self.server.port
        );
        anyhow::ensure!(
            !self.database.path.is_empty(),
            "database.path must be non-empty"
        );
        anyhow::ensure!(
            self.database.max_pool_size > 0,
            "database.max_pool_size must be > 0, got {}",
            self.database.max_pool_size
        );

        let r = &self.retention;
        anyhow::ensure!(
            r.raw_days > 0,
            "retention.raw_days must be > 0, got {}",
            r.raw_days
        );
        anyhow::ensure!(
            r.one_hour_days >= r.raw_days,
            "retention.one_hour_days must be >= retention.raw_days, got {}",
            r.one_hour_days
        );
        anyhow::ensure!(
            r.six_hour_days >= r.one_hour_days,
            "retention.six_hour_days must be >= retention.one_hour_days, got {}",
            r.six_hour_days
        );
        anyhow::ensure!(
            r.twenty_four_hour_days >= r.six_hour_days,
            "retention.twenty_four_hour_days must be >= retention.six_hour_days, got {}",
            r.twenty_four_hour_days
        );

        anyhow::ensure!(
            self.aggregation.parallelism > 0,
            "aggregation.parallelism must be > 0, got {}",
            self.aggregation.parallelism
        );
        anyhow::ensure!(
            self.aggregation.reference_utc_offset_minutes.abs() <= 14 * 60,
            "aggregation.reference_utc_offset_minutes must be within +/-840, got {}",
            self.aggregation.reference_utc_offset_minutes
        );
        anyhow::ensure!(
            cron::Schedule::from_str(&self.aggregation.schedule).is_ok(),
            "aggregation.schedule is not a valid cron expression: {}",
            self.aggregation.schedule
        );
        anyhow::ensure!(
            cron::Schedule::from_str(&self.maintenance.prune_schedule).is_ok(),
            "maintenance.prune_schedule is not a valid cron expression: {}",
            self.maintenance.prune_schedule
        );
        Ok(())
    }
}

