pub mod config;
pub mod family;
pub mod plan;
pub mod segment;
pub mod snapshot;
pub mod task;
