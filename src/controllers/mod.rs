pub mod admin;
pub mod health;
pub mod plans;
pub mod subscription;
pub mod usage;
