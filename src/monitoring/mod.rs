// monitoring/mod.rs
pub mod crossing_log;
pub mod snapshot;

pub use crossing_log::CrossingLog;
pub use snapshot::{capture, ColorRule, Rgb, TrafficObjectSnapshot};
