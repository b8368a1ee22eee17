// Baseline calculator: min/mean/max per schedule over a window of one-hour aggregates.
// Read-only; persisting the result against the schedule is the caller's job.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::aggregation;
use crate::clock::Clock;
use crate::error::{Result, validate_schedule_id, validate_time_range};
use crate::models::{
    AggregateSimpleNumericMetric, AggregateType, MeasurementBaseline, Resolution, ScheduleRef,
};
use crate::store::MetricsStore;

pub struct BaselineCalculator {
    store: Arc<MetricsStore>,
    clock: Arc<dyn Clock>,
}

impl BaselineCalculator {
    pub fn new(store: Arc<MetricsStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// One baseline per input schedule, in input order.
    #[instrument(skip(self, schedules), fields(operation = "calculate_baselines", schedules_count = schedules.len()))]
    pub async fn calculate_baselines(
        &self,
        schedules: &[ScheduleRef],
        start: i64,
        end: i64,
    ) -> Result<Vec<MeasurementBaseline>> {
        validate_time_range(start, end)?;
        for s in schedules {
            validate_schedule_id(s.schedule_id)?;
        }

        let mut out = Vec::with_capacity(schedules.len());
        for s in schedules {
            out.push(self.calculate_baseline(s.schedule_id, start, end).await?);
        }
        Ok(out)
    }

    async fn calculate_baseline(
        &self,
        schedule_id: i32,
        start: i64,
        end: i64,
    ) -> Result<MeasurementBaseline> {
        let rows = self
            .store
            .find_typed_aggregates(Resolution::OneHour, schedule_id, start, end)
            .await?;

        let baseline = MeasurementBaseline {
            schedule_id,
            min: aggregation::min_of(values_of(&rows, AggregateType::Min)),
            mean: aggregation::mean(values_of(&rows, AggregateType::Avg)),
            max: aggregation::max_of(values_of(&rows, AggregateType::Max)),
            computed_at: self.clock.now_ms(),
        };
        debug!(
            schedule_id,
            rows = rows.len(),
            min = baseline.min,
            mean = baseline.mean,
            max = baseline.max,
            "baseline computed"
        );
        Ok(baseline)
    }
}

fn values_of(
    rows: &[AggregateSimpleNumericMetric],
    aggregate_type: AggregateType,
) -> impl Iterator<Item = f64> + '_ {
    rows.iter()
        .filter(move |r| r.aggregate_type == aggregate_type)
        .map(|r| r.value)
}
