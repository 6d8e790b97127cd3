// Light timing (milliseconds)
pub const DEFAULT_MIN_DWELL_MS: u64 = 4000;
pub const DEFAULT_MAX_DWELL_MS: u64 = 6000;
pub const DEFAULT_LIGHT_TICK_MS: u64 = 1;

// Simulation run
pub const DEFAULT_CITY: &str = "paris";
pub const DEFAULT_VEHICLES: usize = 6;
pub const DEFAULT_DURATION_SECS: u64 = 20;
pub const DEFAULT_CROSSING_LOG: &str = "crossings.csv";

// Vehicles
pub const DEFAULT_STREET_LENGTH_M: f64 = 1000.0;
pub const DEFAULT_VEHICLE_SPEED_MPS: f64 = 400.0;
pub const DRIVE_TICK_MS: u64 = 1;
/// Fraction of the street after which a vehicle queues at the next intersection.
pub const QUEUE_AT_COMPLETION: f64 = 0.9;

// Monitoring
pub const SNAPSHOT_INTERVAL_MS: u64 = 1000;
