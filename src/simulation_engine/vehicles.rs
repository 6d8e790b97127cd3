use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;

use crate::admission::TransitState;
use crate::error::{AdmissionError, AdmissionResult};
use crate::global_variables::{DRIVE_TICK_MS, QUEUE_AT_COMPLETION};
use crate::ids::{AgentId, IntersectionId, SegmentId};
use crate::shared_data::{current_timestamp, CrossingRecord};
use crate::simulation_engine::network::{Position, RoadNetwork};

/// What a vehicle looks like from the outside at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleStatus {
    pub street: SegmentId,
    pub destination: IntersectionId,
    pub position: Position,
    pub transit: TransitState,
}

/// A vehicle driving the road network, one intersection after another.
#[derive(Debug)]
pub struct Vehicle {
    pub id: AgentId,
    /// Metres per second.
    pub speed: f64,
    status: Mutex<VehicleStatus>,
}

impl Vehicle {
    /// Places a vehicle at the start of `street`, heading for `destination`.
    pub fn new(
        id: AgentId,
        network: &RoadNetwork,
        street: SegmentId,
        destination: IntersectionId,
        speed: f64,
    ) -> AdmissionResult<Self> {
        let ends = network.street(street)?;
        if ends.from != destination && ends.to != destination {
            return Err(AdmissionError::InvalidState(format!(
                "{} does not end at {}",
                street, destination
            )));
        }
        let position = network.position(ends.other_end(destination))?;
        Ok(Self {
            id,
            speed,
            status: Mutex::new(VehicleStatus {
                street,
                destination,
                position,
                transit: TransitState::Idle,
            }),
        })
    }

    fn lock_status(&self) -> MutexGuard<'_, VehicleStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> VehicleStatus {
        *self.lock_status()
    }

    fn set_transit(&self, transit: TransitState) {
        self.lock_status().transit = transit;
    }

    /// Drives until `stop` is set or the network shuts down. Returns the
    /// number of intersections crossed.
    ///
    /// Each crossing is reported on `crossings`; a closed receiver is ignored.
    /// An intersection the vehicle holds is released however the drive ends.
    pub fn drive(
        &self,
        network: &RoadNetwork,
        stop: &AtomicBool,
        crossings: &UnboundedSender<CrossingRecord>,
    ) -> AdmissionResult<u64> {
        let mut held = None;
        let result = self.drive_until_stopped(network, stop, crossings, &mut held);
        if let Some(intersection) = held {
            self.leave(network, intersection);
        }
        if let Ok(crossed) = &result {
            info!("{} stopped after {} crossings", self.id, crossed);
        }
        result
    }

    fn leave(&self, network: &RoadNetwork, at: IntersectionId) {
        match network
            .intersection(at)
            .and_then(|intersection| intersection.notify_departure(self.id))
        {
            Ok(()) => self.set_transit(TransitState::Departed),
            Err(e) => warn!("{} could not release {}: {}", self.id, at, e),
        }
    }

    fn drive_until_stopped(
        &self,
        network: &RoadNetwork,
        stop: &AtomicBool,
        crossings: &UnboundedSender<CrossingRecord>,
        held: &mut Option<IntersectionId>,
    ) -> AdmissionResult<u64> {
        let mut rng = SmallRng::seed_from_u64(self.id.0);
        let tick = Duration::from_millis(DRIVE_TICK_MS);
        let mut crossed = 0;
        let mut distance = 0.0;
        let mut last_update = Instant::now();

        while !stop.load(Ordering::Relaxed) {
            thread::sleep(tick);
            let elapsed = last_update.elapsed().as_secs_f64();
            last_update = Instant::now();

            let VehicleStatus {
                street: street_id,
                destination,
                ..
            } = self.status();
            let street = network.street(street_id)?;
            let origin = street.other_end(destination);

            distance += self.speed * elapsed;
            let completion = distance / street.length;
            let position = network
                .position(origin)?
                .lerp(network.position(destination)?, completion);
            self.lock_status().position = position;

            if completion >= QUEUE_AT_COMPLETION && held.is_none() {
                let intersection = network.intersection(destination)?;
                let requested = Instant::now();
                match intersection.request_entry_tracked(self.id, |step| self.set_transit(step)) {
                    Ok(()) => {}
                    Err(AdmissionError::Shutdown | AdmissionError::ChannelClosed) => break,
                    Err(err) => return Err(err),
                }
                *held = Some(destination);
                let record = CrossingRecord {
                    timestamp: current_timestamp(),
                    vehicle_id: self.id,
                    intersection_id: destination,
                    waited_ms: requested.elapsed().as_millis() as u64,
                };
                let _ = crossings.send(record);
                // Time spent queueing is not distance driven.
                last_update = Instant::now();
            }

            if completion >= 1.0 && held.is_some() {
                let options = network.outgoing_streets(destination, street_id)?;
                let next_street = if options.is_empty() {
                    // Dead end: turn around.
                    street_id
                } else {
                    options[rng.random_range(0..options.len())]
                };
                let next_destination = network.street(next_street)?.other_end(destination);

                network.intersection(destination)?.notify_departure(self.id)?;
                *held = None;
                crossed += 1;
                debug!("{} left {} towards {}", self.id, destination, next_destination);

                let mut status = self.lock_status();
                status.street = next_street;
                status.destination = next_destination;
                status.transit = TransitState::Departed;
                distance = 0.0;
            }
        }
        Ok(crossed)
    }
}

/// Spreads `count` vehicles over the network's streets, each heading for the
/// end given by [`RoadNetwork::spawn_heading`].
pub fn spawn_vehicles(network: &RoadNetwork, count: usize, speed: f64) -> AdmissionResult<Vec<Vehicle>> {
    let streets = network.streets();
    let heading = network.spawn_heading();
    if streets.is_empty() && count > 0 {
        return Err(AdmissionError::Config(
            "cannot place vehicles on a network without streets".to_string(),
        ));
    }
    (0..count)
        .map(|n| {
            let street = &streets[n % streets.len()];
            Vehicle::new(AgentId(n as u64), network, street.id, street.end(heading), speed)
        })
        .collect()
}
