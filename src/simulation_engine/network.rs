//! Road topology: an arena of intersections and the streets between them.
//!
//! Streets name their end points by [`IntersectionId`] and intersections
//! record their streets by [`SegmentId`]; all lookups go through
//! [`RoadNetwork`], so nothing holds a reference to anything else.

use serde::{Deserialize, Serialize};

use crate::admission::IntersectionCoordinator;
use crate::config::{City, LightConfig};
use crate::control_system::LightScheduler;
use crate::error::{AdmissionError, AdmissionResult};
use crate::global_variables::DEFAULT_STREET_LENGTH_M;
use crate::ids::{IntersectionId, SegmentId};

/// Pixel coordinates on the city map.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point at `fraction` (0..=1) of the way from `self` to `other`.
    pub fn lerp(self, other: Position, fraction: f64) -> Position {
        let t = fraction.clamp(0.0, 1.0);
        Position {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }
}

/// A street connecting two intersections. Vehicles may drive it either way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Street {
    pub id: SegmentId,
    pub from: IntersectionId,
    pub to: IntersectionId,
    /// Length in metres.
    pub length: f64,
}

impl Street {
    /// The end of the street opposite `end`.
    pub fn other_end(&self, end: IntersectionId) -> IntersectionId {
        if end == self.from {
            self.to
        } else {
            self.from
        }
    }

    pub fn end(&self, end: StreetEnd) -> IntersectionId {
        match end {
            StreetEnd::From => self.from,
            StreetEnd::To => self.to,
        }
    }
}

/// One end of a street.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StreetEnd {
    From,
    #[default]
    To,
}

/// An intersection together with where it is drawn.
pub struct IntersectionNode {
    pub position: Position,
    pub coordinator: IntersectionCoordinator,
}

#[derive(Default)]
pub struct RoadNetwork {
    intersections: Vec<IntersectionNode>,
    streets: Vec<Street>,
    spawn_heading: StreetEnd,
}

impl RoadNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an intersection with a timed traffic light.
    pub fn add_intersection(
        &mut self,
        position: Position,
        light: LightConfig,
    ) -> AdmissionResult<IntersectionId> {
        Ok(self.add_intersection_with(position, LightScheduler::new(light)?))
    }

    pub fn add_intersection_with(&mut self, position: Position, light: LightScheduler) -> IntersectionId {
        let id = IntersectionId(self.intersections.len() as u32);
        self.intersections.push(IntersectionNode {
            position,
            coordinator: IntersectionCoordinator::with_scheduler(id, light),
        });
        id
    }

    /// Adds a street and registers it with both intersections.
    pub fn add_street(&mut self, from: IntersectionId, to: IntersectionId) -> AdmissionResult<SegmentId> {
        self.node(from)?;
        self.node(to)?;
        let id = SegmentId(self.streets.len() as u32);
        self.streets.push(Street {
            id,
            from,
            to,
            length: DEFAULT_STREET_LENGTH_M,
        });
        self.intersections[from.0 as usize].coordinator.connect(id);
        self.intersections[to.0 as usize].coordinator.connect(id);
        Ok(id)
    }

    fn node(&self, id: IntersectionId) -> AdmissionResult<&IntersectionNode> {
        self.intersections
            .get(id.0 as usize)
            .ok_or(AdmissionError::UnknownIntersection(id))
    }

    pub fn intersection(&self, id: IntersectionId) -> AdmissionResult<&IntersectionCoordinator> {
        self.node(id).map(|n| &n.coordinator)
    }

    pub fn position(&self, id: IntersectionId) -> AdmissionResult<Position> {
        self.node(id).map(|n| n.position)
    }

    pub fn street(&self, id: SegmentId) -> AdmissionResult<&Street> {
        self.streets
            .get(id.0 as usize)
            .ok_or(AdmissionError::UnknownSegment(id))
    }

    pub fn intersections(&self) -> impl Iterator<Item = &IntersectionNode> {
        self.intersections.iter()
    }

    pub fn streets(&self) -> &[Street] {
        &self.streets
    }

    /// The end of its street a newly placed vehicle drives towards.
    pub fn spawn_heading(&self) -> StreetEnd {
        self.spawn_heading
    }

    pub fn set_spawn_heading(&mut self, heading: StreetEnd) {
        self.spawn_heading = heading;
    }

    /// Streets a vehicle arriving at `at` over `incoming` may continue on:
    /// every street connected to `at` except the one it came from.
    pub fn outgoing_streets(
        &self,
        at: IntersectionId,
        incoming: SegmentId,
    ) -> AdmissionResult<Vec<SegmentId>> {
        let coordinator = self.intersection(at)?;
        if !coordinator.is_connected(incoming) {
            self.street(incoming)?;
            return Err(AdmissionError::InvalidState(format!(
                "{} does not end at {}",
                incoming, at
            )));
        }
        Ok(coordinator
            .connected_segments()
            .filter(|s| *s != incoming)
            .collect())
    }

    pub fn start_all(&self) -> AdmissionResult<()> {
        for node in &self.intersections {
            node.coordinator.start()?;
        }
        Ok(())
    }

    pub fn shutdown_all(&self) {
        for node in &self.intersections {
            node.coordinator.shutdown();
        }
    }

    pub fn for_city(city: City, light: &LightConfig) -> AdmissionResult<Self> {
        match city {
            City::Paris => Self::paris(light),
            City::Nyc => Self::nyc(light),
        }
    }

    /// Eight outer intersections, each with one street into a central plaza.
    pub fn paris(light: &LightConfig) -> AdmissionResult<Self> {
        let mut network = Self::new();
        let positions = [
            (385.0, 270.0),
            (1240.0, 80.0),
            (1625.0, 75.0),
            (2110.0, 75.0),
            (2840.0, 175.0),
            (3070.0, 680.0),
            (2800.0, 1400.0),
            (400.0, 1100.0),
            (1700.0, 900.0), // central plaza
        ];
        let ids = network.add_all(&positions, light)?;
        let plaza = ids[8];
        for outer in &ids[..8] {
            network.add_street(*outer, plaza)?;
        }
        Ok(network)
    }

    /// Six intersections on a ring with one diagonal. Vehicles start out
    /// against the direction the streets were laid in.
    pub fn nyc(light: &LightConfig) -> AdmissionResult<Self> {
        let mut network = Self::new();
        network.set_spawn_heading(StreetEnd::From);
        let positions = [
            (1430.0, 625.0),
            (2575.0, 1260.0),
            (2200.0, 1950.0),
            (1000.0, 1350.0),
            (400.0, 1000.0),
            (750.0, 250.0),
        ];
        let ids = network.add_all(&positions, light)?;
        for (from, to) in [(0, 1), (1, 2), (2, 3), (3, 4), (4, 5), (5, 0), (0, 3)] {
            network.add_street(ids[from], ids[to])?;
        }
        Ok(network)
    }

    fn add_all(&mut self, positions: &[(f64, f64)], light: &LightConfig) -> AdmissionResult<Vec<IntersectionId>> {
        positions
            .iter()
            .map(|&(x, y)| self.add_intersection(Position::new(x, y), light.clone()))
            .collect()
    }
}
