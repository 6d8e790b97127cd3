//! Per-frame view of everything a renderer draws.
//!
//! Each object is a variant carrying its kind, position and colour rule, so a
//! renderer matches on the variant instead of inspecting runtime types.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::admission::TransitState;
use crate::control_system::Phase;
use crate::ids::{AgentId, IntersectionId};
use crate::simulation_engine::network::{Position, RoadNetwork};
use crate::simulation_engine::vehicles::Vehicle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// How an object's colour is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ColorRule {
    /// Green or red with the traffic light.
    LightPhase { phase: Phase },
    /// A fixed colour derived from the object's id.
    SeededById { seed: u64 },
}

impl ColorRule {
    pub fn rgb(&self) -> Rgb {
        match *self {
            ColorRule::LightPhase { phase: Phase::Green } => Rgb { r: 0, g: 255, b: 0 },
            ColorRule::LightPhase { phase: Phase::Red } => Rgb { r: 255, g: 0, b: 0 },
            ColorRule::SeededById { seed } => {
                let mut rng = SmallRng::seed_from_u64(seed);
                let b: u8 = rng.random_range(0..255);
                let g: u8 = rng.random_range(0..255);
                // Keep the colour vector at length 255 where possible.
                let rest = 255.0_f64.powi(2) - f64::from(g).powi(2) - f64::from(b).powi(2);
                let r = rest.max(0.0).sqrt().round() as u8;
                Rgb { r, g, b }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrafficObjectSnapshot {
    Intersection {
        id: IntersectionId,
        position: Position,
        color: ColorRule,
    },
    Vehicle {
        id: AgentId,
        position: Position,
        transit: TransitState,
        color: ColorRule,
    },
}

impl TrafficObjectSnapshot {
    pub fn position(&self) -> Position {
        match self {
            TrafficObjectSnapshot::Intersection { position, .. }
            | TrafficObjectSnapshot::Vehicle { position, .. } => *position,
        }
    }

    pub fn color(&self) -> ColorRule {
        match self {
            TrafficObjectSnapshot::Intersection { color, .. }
            | TrafficObjectSnapshot::Vehicle { color, .. } => *color,
        }
    }
}

/// Captures intersections first, then vehicles, the order they are drawn in.
pub fn capture(network: &RoadNetwork, vehicles: &[impl AsRef<Vehicle>]) -> Vec<TrafficObjectSnapshot> {
    let intersections = network.intersections().map(|node| TrafficObjectSnapshot::Intersection {
        id: node.coordinator.id(),
        position: node.position,
        color: ColorRule::LightPhase {
            phase: node.coordinator.current_phase(),
        },
    });
    let vehicles = vehicles.iter().map(|vehicle| {
        let vehicle = vehicle.as_ref();
        let status = vehicle.status();
        TrafficObjectSnapshot::Vehicle {
            id: vehicle.id,
            position: status.position,
            transit: status.transit,
            color: ColorRule::SeededById { seed: vehicle.id.0 },
        }
    });
    intersections.chain(vehicles).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_system::LightScheduler;
    use crate::ids::SegmentId;
    use std::sync::Arc;

    #[test]
    fn light_colour_follows_phase() {
        assert_eq!(ColorRule::LightPhase { phase: Phase::Green }.rgb(), Rgb { r: 0, g: 255, b: 0 });
        assert_eq!(ColorRule::LightPhase { phase: Phase::Red }.rgb(), Rgb { r: 255, g: 0, b: 0 });
    }

    #[test]
    fn vehicle_colour_is_stable_per_id() {
        let a = ColorRule::SeededById { seed: 4 }.rgb();
        assert_eq!(a, ColorRule::SeededById { seed: 4 }.rgb());
        let length = (f64::from(a.r).powi(2) + f64::from(a.g).powi(2) + f64::from(a.b).powi(2)).sqrt();
        assert!(length <= 256.0);
    }

    #[test]
    fn capture_and_serialize() {
        let mut network = RoadNetwork::new();
        let a = network.add_intersection_with(Position::new(1.0, 2.0), LightScheduler::manual(Phase::Green));
        let b = network.add_intersection_with(Position::new(3.0, 4.0), LightScheduler::manual(Phase::Red));
        network.add_street(a, b).unwrap();
        let vehicle = Arc::new(Vehicle::new(AgentId(1), &network, SegmentId(0), b, 10.0).unwrap());

        let frame = capture(&network, &[vehicle]);
        assert_eq!(frame.len(), 3);
        assert_eq!(frame[0].color(), ColorRule::LightPhase { phase: Phase::Green });
        assert_eq!(frame[2].position(), Position::new(1.0, 2.0));

        let json = serde_json::to_string(&frame[2]).unwrap();
        assert!(json.contains(r#""kind":"vehicle""#));
        assert!(json.contains(r#""rule":"seeded_by_id""#));
        let back: TrafficObjectSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, frame[2]);
    }
}
