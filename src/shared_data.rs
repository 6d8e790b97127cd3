// src/shared_data.rs

use crate::ids::{AgentId, IntersectionId};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// One completed pass of a vehicle through an intersection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossingRecord {
    pub timestamp: u64,
    pub vehicle_id: AgentId,
    pub intersection_id: IntersectionId,
    /// Time from the entry request until the vehicle was allowed to cross.
    pub waited_ms: u64,
}
