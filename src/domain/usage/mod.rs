pub mod model;

pub use model::{minutes_from_duration_seconds, record_usage, sum_minutes, SessionType, UsageRecord};
