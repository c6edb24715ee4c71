pub mod metrics;
pub mod pipeline_api;
