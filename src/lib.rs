//! Intersection admission control for a multi-vehicle traffic simulation.
//!
//! Each intersection lets waiting vehicles in strictly first-come-first-served,
//! one at a time, and only while its traffic light is green. The light cycles
//! on its own thread; a dispatch thread per intersection hands out entry
//! tickets. Vehicles run on their own threads and block in
//! [`IntersectionCoordinator::request_entry`] until it is safe to cross.

pub mod admission;
pub mod config;
pub mod control_system;
pub mod error;
pub mod global_variables;
pub mod ids;
pub mod monitoring;
pub mod shared_data;
pub mod simulation_engine;

pub use admission::{IntersectionCoordinator, IntersectionStats, TransitState};
pub use config::{City, LightConfig, SimulationConfig};
pub use control_system::{LightScheduler, Phase, PhaseChannel};
pub use error::{AdmissionError, AdmissionResult};
pub use ids::{AgentId, IntersectionId, SegmentId};
