pub mod billing;
pub mod plan;
pub mod usage;
