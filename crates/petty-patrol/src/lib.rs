pub mod config;
pub mod error;
pub mod patrol;
pub mod telemetry;
