// control_system/mod.rs
pub mod light_scheduler;
pub mod phase_channel;

use serde::{Deserialize, Serialize};

pub use light_scheduler::{DwellRange, LightScheduler};
pub use phase_channel::PhaseChannel;

/// Possible states of an intersection's traffic light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Phase {
    /// Fail-safe default for a light that has not cycled yet.
    #[default]
    Red,
    Green,
}

impl Phase {
    pub fn toggled(self) -> Self {
        match self {
            Phase::Red => Phase::Green,
            Phase::Green => Phase::Red,
        }
    }

    pub fn is_green(self) -> bool {
        self == Phase::Green
    }
}
