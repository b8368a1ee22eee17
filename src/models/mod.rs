// Domain models for the metrics core

mod aggregate;
mod baseline;
mod composite;
mod raw;

pub use aggregate::{
    AggregateNumericMetric, AggregateSimpleNumericMetric, AggregateType, MetricsIndexEntry,
    Resolution,
};
pub use baseline::{MeasurementBaseline, ScheduleRef};
pub use composite::NumericHighLowComposite;
pub use raw::RawNumericMetric;
