// Library for tests to access modules

pub mod aggregation;
pub mod aggregation_worker;
pub mod baseline;
pub mod buckets;
pub mod clock;
pub mod config;
pub mod error;
pub mod metrics_server;
pub mod models;
pub mod routes;
pub mod store;
pub mod time_slice;
pub mod version;
