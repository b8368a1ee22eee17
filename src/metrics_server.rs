// Metrics server: ingestion, the hourly roll-up pipeline, bucketed queries and baselines.
//
// Roll-up is index driven: each tier reads its dirty entries, recomputes the bucket from the
// finer data, overwrites the aggregate, marks the next tier dirty and only then clears the entry.
// Tiers run strictly in order (1h, 6h, 24h); entries within a tier run concurrently.

use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::aggregation;
use crate::baseline::BaselineCalculator;
use crate::buckets::{Buckets, NUMBER_OF_BUCKETS};
use crate::clock::Clock;
use crate::config::RetentionConfig;
use crate::error::{MetricsError, Result, validate_schedule_id, validate_time_range};
use crate::models::{
    AggregateNumericMetric, MeasurementBaseline, MetricsIndexEntry, NumericHighLowComposite,
    RawNumericMetric, Resolution, ScheduleRef,
};
use crate::store::MetricsStore;

/// Where a query reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DataSource {
    Raw,
    Aggregate(Resolution),
}

impl DataSource {
    fn width_ms(self) -> i64 {
        match self {
            DataSource::Raw => 0,
            DataSource::Aggregate(r) => r.width_ms(),
        }
    }

    fn retention_ms(self, retention: &RetentionConfig) -> i64 {
        match self {
            DataSource::Raw => retention.raw_ms(),
            DataSource::Aggregate(r) => retention.aggregate_ms(r),
        }
    }

    fn coarser(self) -> Option<Self> {
        match self {
            DataSource::Raw => Some(DataSource::Aggregate(Resolution::OneHour)),
            DataSource::Aggregate(r) => r.next().map(DataSource::Aggregate),
        }
    }
}

/// What one tier did during a pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierRollup {
    /// Aggregates written (created or overwritten).
    pub written: usize,
    /// Dirty entries cleared without a write (no source data left).
    pub empty: usize,
    /// Dirty entries whose bucket has not fully elapsed yet.
    pub pending: usize,
    /// Entries re-marked while being rolled up; left for the next pass.
    pub remarked: usize,
    /// False when the current hour is not a boundary of this tier.
    pub ran: bool,
}

struct EntryOutcome {
    written: bool,
    cleared: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollupReport {
    pub current_hour: i64,
    pub one_hour: TierRollup,
    pub six_hour: TierRollup,
    pub twenty_four_hour: TierRollup,
}

impl RollupReport {
    pub fn tier(&self, resolution: Resolution) -> &TierRollup {
        match resolution {
            Resolution::OneHour => &self.one_hour,
            Resolution::SixHour => &self.six_hour,
            Resolution::TwentyFourHour => &self.twenty_four_hour,
        }
    }

    fn tier_mut(&mut self, resolution: Resolution) -> &mut TierRollup {
        match resolution {
            Resolution::OneHour => &mut self.one_hour,
            Resolution::SixHour => &mut self.six_hour,
            Resolution::TwentyFourHour => &mut self.twenty_four_hour,
        }
    }
}

pub struct MetricsServer {
    store: Arc<MetricsStore>,
    clock: Arc<dyn Clock>,
    baselines: BaselineCalculator,
    parallelism: usize,
}

impl MetricsServer {
    pub fn new(store: Arc<MetricsStore>, clock: Arc<dyn Clock>, parallelism: usize) -> Self {
        let baselines = BaselineCalculator::new(store.clone(), clock.clone());
        Self {
            store,
            clock,
            baselines,
            parallelism: parallelism.max(1),
        }
    }

    pub fn store(&self) -> &Arc<MetricsStore> {
        &self.store
    }

    /// Ingests raw samples. The whole batch is validated before any write; after that,
    /// individual write failures only drop that sample from the returned (durable) set.
    #[instrument(skip(self, samples), fields(operation = "add_numeric_data", samples_count = samples.len()))]
    pub async fn add_numeric_data(
        &self,
        samples: &[RawNumericMetric],
    ) -> Result<Vec<RawNumericMetric>> {
        for s in samples {
            validate_schedule_id(s.schedule_id)?;
            if s.timestamp < 0 {
                return Err(MetricsError::InvalidTimeRange {
                    begin: s.timestamp,
                    end: s.timestamp,
                });
            }
            if !s.value.is_finite() {
                return Err(MetricsError::InvalidValue {
                    schedule_id: s.schedule_id,
                    timestamp: s.timestamp,
                });
            }
        }
        if samples.is_empty() {
            return Ok(Vec::new());
        }

        let written = self.store.insert_raw_data(samples).await?;
        if written.len() < samples.len() {
            info!(
                written = written.len(),
                failed = samples.len() - written.len(),
                "raw ingestion partially failed"
            );
        } else {
            debug!(written = written.len(), "raw ingestion");
        }
        Ok(written)
    }

    /// One roll-up pass against the current hour. Safe to re-run: every write is an overwrite.
    #[instrument(skip(self), fields(operation = "calculate_aggregates"))]
    pub async fn calculate_aggregates(&self) -> Result<RollupReport> {
        let slicer = self.store.slicer();
        let current_hour = slicer.current_hour(self.clock.now_ms());
        let mut report = RollupReport {
            current_hour,
            ..Default::default()
        };

        for resolution in Resolution::ALL {
            if !slicer.is_boundary(current_hour, resolution.width_minutes()) {
                debug!(%resolution, "not a tier boundary, skipping");
                continue;
            }
            *report.tier_mut(resolution) = self.roll_up(resolution, current_hour).await?;
        }

        info!(
            current_hour = %slicer.format(current_hour),
            one_hour = report.one_hour.written,
            six_hour = report.six_hour.written,
            twenty_four_hour = report.twenty_four_hour.written,
            "aggregation pass complete"
        );
        Ok(report)
    }

    async fn roll_up(&self, resolution: Resolution, current_hour: i64) -> Result<TierRollup> {
        let (ready, pending): (Vec<_>, Vec<_>) = self
            .store
            .list_dirty_with_generation(resolution)
            .await?
            .into_iter()
            .partition(|(e, _)| e.time + resolution.width_ms() <= current_hour);

        let outcomes: Vec<EntryOutcome> = stream::iter(ready)
            .map(|(entry, generation)| self.roll_up_entry(entry, generation))
            .buffer_unordered(self.parallelism)
            .try_collect()
            .await?;

        let stats = TierRollup {
            written: outcomes.iter().filter(|o| o.written).count(),
            empty: outcomes.iter().filter(|o| !o.written).count(),
            pending: pending.len(),
            remarked: outcomes.iter().filter(|o| !o.cleared).count(),
            ran: true,
        };
        debug!(
            %resolution,
            written = stats.written,
            empty = stats.empty,
            pending = stats.pending,
            remarked = stats.remarked,
            "tier roll-up"
        );
        Ok(stats)
    }

    /// Recomputes one dirty bucket read at `generation`.
    async fn roll_up_entry(
        &self,
        entry: MetricsIndexEntry,
        generation: i64,
    ) -> Result<EntryOutcome> {
        let MetricsIndexEntry {
            resolution,
            time: start,
            schedule_id,
        } = entry;
        let end = start + resolution.width_ms();

        let metric = match resolution.finer() {
            None => {
                let raw = self.store.find_raw_metrics(schedule_id, start, end).await?;
                aggregation::aggregate_raw(&raw, schedule_id, start)
            }
            Some(finer) => {
                let children = self
                    .store
                    .find_aggregate_metrics(finer, schedule_id, start, end)
                    .await?;
                aggregation::aggregate_aggregates(&children, schedule_id, start)
            }
        };

        // Write, then mark the next tier, then clear: a crash in between leaves the
        // entry in place and the next pass recomputes the same value. The clear is
        // conditional on the generation read above, so data that re-marked the bucket
        // while it was being read keeps the entry for the next pass.
        if let Some(m) = &metric {
            self.store.upsert_aggregates(resolution, &[*m]).await?;
            if let Some(next) = resolution.next() {
                let slice = self
                    .store
                    .slicer()
                    .time_slice_start(start, next.width_minutes());
                self.store.mark_dirty(next, slice, schedule_id).await?;
            }
        } else {
            debug!(%resolution, schedule_id, start, "dirty bucket has no source data");
        }
        let cleared = self.store.clear_dirty_generation(entry, generation).await?;
        if !cleared {
            debug!(%resolution, schedule_id, start, "bucket re-marked during roll-up, kept");
        }
        Ok(EntryOutcome {
            written: metric.is_some(),
            cleared,
        })
    }

    /// Picks the tier for a query window: the coarsest whose native width fits in one display
    /// bucket, moved coarser while `begin` lies beyond that tier's retention.
    pub fn choose_source(&self, begin: i64, end: i64) -> DataSource {
        let interval = (end - begin) / NUMBER_OF_BUCKETS as i64;
        let mut source = DataSource::Raw;
        while let Some(c) = source.coarser() {
            if c.width_ms() > interval {
                break;
            }
            source = c;
        }

        let now = self.clock.now_ms();
        let retention = self.store.retention();
        while begin < now - source.retention_ms(retention) {
            match source.coarser() {
                Some(c) => source = c,
                None => break,
            }
        }
        source
    }

    /// 60 display points for one schedule over [begin, end). Empty buckets are NaN.
    #[instrument(skip(self), fields(operation = "find_data_for_resource"))]
    pub async fn find_data_for_resource(
        &self,
        schedule_id: i32,
        begin: i64,
        end: i64,
    ) -> Result<Vec<NumericHighLowComposite>> {
        self.find_data_for_group(&[schedule_id], begin, end).await
    }

    /// 60 display points folding the data of every listed schedule into shared buckets.
    #[instrument(skip(self, schedule_ids), fields(operation = "find_data_for_group", schedules_count = schedule_ids.len()))]
    pub async fn find_data_for_group(
        &self,
        schedule_ids: &[i32],
        begin: i64,
        end: i64,
    ) -> Result<Vec<NumericHighLowComposite>> {
        validate_time_range(begin, end)?;
        // Every display bucket must be at least 1 ms wide and start inside the window.
        if end - begin < NUMBER_OF_BUCKETS as i64 {
            return Err(MetricsError::InvalidTimeRange { begin, end });
        }
        for &id in schedule_ids {
            validate_schedule_id(id)?;
        }

        let source = self.choose_source(begin, end);
        let mut buckets = Buckets::new(begin, end);
        for &schedule_id in schedule_ids {
            match source {
                DataSource::Raw => {
                    for s in self.store.find_raw_metrics(schedule_id, begin, end).await? {
                        buckets.insert_raw(s.timestamp, s.value);
                    }
                }
                DataSource::Aggregate(r) => {
                    for a in self.find_overlapping(r, schedule_id, begin, end).await? {
                        // A row starting before `begin` still overlaps bucket 0.
                        buckets.insert_aggregate(a.time.max(begin), a.avg, a.min, a.max);
                    }
                }
            }
        }
        debug!(?source, "bucketed query");
        Ok(buckets.to_composites())
    }

    /// One {avg, min, max} over the whole window from the resolution-appropriate tier.
    #[instrument(skip(self), fields(operation = "get_summary_aggregate"))]
    pub async fn get_summary_aggregate(
        &self,
        schedule_id: i32,
        begin: i64,
        end: i64,
    ) -> Result<AggregateNumericMetric> {
        validate_schedule_id(schedule_id)?;
        validate_time_range(begin, end)?;

        let summary = match self.choose_source(begin, end) {
            DataSource::Raw => {
                let raw = self.store.find_raw_metrics(schedule_id, begin, end).await?;
                aggregation::aggregate_raw(&raw, schedule_id, begin)
            }
            DataSource::Aggregate(r) => {
                let rows = self.find_overlapping(r, schedule_id, begin, end).await?;
                aggregation::aggregate_aggregates(&rows, schedule_id, begin)
            }
        };
        Ok(summary.unwrap_or(AggregateNumericMetric::new(
            schedule_id,
            begin,
            f64::NAN,
            f64::NAN,
            f64::NAN,
        )))
    }

    /// Aggregates of tier `r` whose bucket overlaps [begin, end), including the one
    /// that starts before `begin`.
    async fn find_overlapping(
        &self,
        r: Resolution,
        schedule_id: i32,
        begin: i64,
        end: i64,
    ) -> Result<Vec<AggregateNumericMetric>> {
        let first = self.store.slicer().time_slice_start(begin, r.width_minutes());
        self.store
            .find_aggregate_metrics(r, schedule_id, first, end)
            .await
    }

    /// Raw samples in [begin, end), ascending.
    pub async fn find_raw_data(
        &self,
        schedule_id: i32,
        begin: i64,
        end: i64,
    ) -> Result<Vec<RawNumericMetric>> {
        validate_schedule_id(schedule_id)?;
        validate_time_range(begin, end)?;
        self.store.find_raw_metrics(schedule_id, begin, end).await
    }

    pub async fn calculate_baselines(
        &self,
        schedules: &[ScheduleRef],
        start: i64,
        end: i64,
    ) -> Result<Vec<MeasurementBaseline>> {
        self.baselines
            .calculate_baselines(schedules, start, end)
            .await
    }
}
