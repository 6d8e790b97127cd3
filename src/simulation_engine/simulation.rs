// simulation.rs
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Duration, Instant};

use crate::admission::IntersectionStats;
use crate::config::SimulationConfig;
use crate::error::{AdmissionError, AdmissionResult};
use crate::global_variables::SNAPSHOT_INTERVAL_MS;
use crate::ids::IntersectionId;
use crate::monitoring::{capture, CrossingLog, TrafficObjectSnapshot};
use crate::shared_data::CrossingRecord;
use crate::simulation_engine::network::RoadNetwork;
use crate::simulation_engine::vehicles::{spawn_vehicles, Vehicle};

/// Outcome of a finished run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub crossings: u64,
    pub intersections: BTreeMap<IntersectionId, IntersectionStats>,
}

/// A built but not yet running simulation.
pub struct Simulation {
    network: Arc<RoadNetwork>,
    vehicles: Vec<Arc<Vehicle>>,
    stop: Arc<AtomicBool>,
}

impl Simulation {
    pub fn build(config: &SimulationConfig) -> AdmissionResult<Self> {
        config.validate()?;
        let network = RoadNetwork::for_city(config.city, &config.light)?;
        Self::with_network(network, config.vehicles, config.vehicle_speed)
    }

    pub fn with_network(network: RoadNetwork, vehicles: usize, speed: f64) -> AdmissionResult<Self> {
        let vehicles = spawn_vehicles(&network, vehicles, speed)?
            .into_iter()
            .map(Arc::new)
            .collect();
        Ok(Self {
            network: Arc::new(network),
            vehicles,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    pub fn snapshot(&self) -> Vec<TrafficObjectSnapshot> {
        capture(&self.network, &self.vehicles)
    }

    /// Runs every intersection and vehicle for `duration`, then shuts the
    /// network down and waits for all vehicles to stop. Crossings are appended
    /// to `log` when one is given.
    pub async fn run(self, duration: Duration, log: Option<CrossingLog>) -> AdmissionResult<RunSummary> {
        self.network.start_all()?;

        let (tx, mut rx) = mpsc::unbounded_channel::<CrossingRecord>();
        let logger = tokio::task::spawn_blocking(move || -> AdmissionResult<u64> {
            let mut count = 0;
            while let Some(record) = rx.blocking_recv() {
                count += 1;
                if let Some(log) = &log {
                    if let Err(e) = log.append(&record) {
                        error!("Error logging crossing: {}", e);
                    }
                }
            }
            Ok(count)
        });

        let mut drivers = Vec::with_capacity(self.vehicles.len());
        for vehicle in &self.vehicles {
            let vehicle = Arc::clone(vehicle);
            let network = Arc::clone(&self.network);
            let stop = Arc::clone(&self.stop);
            let tx = tx.clone();
            drivers.push(tokio::task::spawn_blocking(move || vehicle.drive(&network, &stop, &tx)));
        }
        drop(tx);
        info!("Simulating {} vehicles for {:?}", self.vehicles.len(), duration);

        let deadline = Instant::now() + duration;
        let mut frames = interval(Duration::from_millis(SNAPSHOT_INTERVAL_MS));
        loop {
            tokio::select! {
                _ = sleep(deadline.saturating_duration_since(Instant::now())) => break,
                _ = frames.tick() => {
                    match serde_json::to_string(&self.snapshot()) {
                        Ok(frame) => debug!("frame {}", frame),
                        Err(e) => warn!("Error serializing frame: {}", e),
                    }
                }
            }
        }

        self.stop.store(true, Ordering::Relaxed);
        // Wakes vehicles blocked in an entry request or a light wait. Joins
        // the light and dispatch threads, so keep it off the async workers.
        let network = Arc::clone(&self.network);
        if let Err(e) = tokio::task::spawn_blocking(move || network.shutdown_all()).await {
            warn!("Network shutdown failed: {}", e);
        }
        for driver in drivers {
            match driver.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Vehicle stopped with error: {}", e),
                Err(e) => warn!("Vehicle task failed: {}", e),
            }
        }

        let crossings = logger
            .await
            .map_err(|e| AdmissionError::InvalidState(format!("crossing logger failed: {}", e)))??;
        let intersections = self
            .network
            .intersections()
            .map(|node| (node.coordinator.id(), node.coordinator.stats()))
            .collect();
        info!("Simulation complete: {} crossings", crossings);
        Ok(RunSummary {
            crossings,
            intersections,
        })
    }
}
