//! Run-time configuration: light timing for a single intersection and the
//! settings of a whole simulation run.
//!
//! Both structs deserialize from JSON with every field optional; missing
//! fields fall back to the constants in [`crate::global_variables`].

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{AdmissionError, AdmissionResult};
use crate::global_variables::{
    DEFAULT_CITY, DEFAULT_CROSSING_LOG, DEFAULT_DURATION_SECS, DEFAULT_LIGHT_TICK_MS,
    DEFAULT_MAX_DWELL_MS, DEFAULT_MIN_DWELL_MS, DEFAULT_VEHICLES, DEFAULT_VEHICLE_SPEED_MPS,
};

/// Timing of a traffic light's phase cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightConfig {
    /// Shortest time a phase is held, inclusive.
    pub min_dwell_ms: u64,
    /// Longest time a phase is held, inclusive.
    pub max_dwell_ms: u64,
    /// Sleep between two checks of the dwell timer.
    pub tick_ms: u64,
    /// Fixed RNG seed for reproducible dwell sequences.
    pub seed: Option<u64>,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            min_dwell_ms: DEFAULT_MIN_DWELL_MS,
            max_dwell_ms: DEFAULT_MAX_DWELL_MS,
            tick_ms: DEFAULT_LIGHT_TICK_MS,
            seed: None,
        }
    }
}

impl LightConfig {
    pub fn validate(&self) -> AdmissionResult<()> {
        if self.min_dwell_ms > self.max_dwell_ms {
            return Err(AdmissionError::Config(format!(
                "min_dwell_ms ({}) exceeds max_dwell_ms ({})",
                self.min_dwell_ms, self.max_dwell_ms
            )));
        }
        if self.tick_ms == 0 {
            return Err(AdmissionError::Config("tick_ms must be positive".to_string()));
        }
        Ok(())
    }

    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }
}

/// Built-in road layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum City {
    Paris,
    Nyc,
}

impl City {
    pub fn parse(name: &str) -> AdmissionResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "paris" => Ok(City::Paris),
            "nyc" => Ok(City::Nyc),
            other => Err(AdmissionError::Config(format!("unknown city map '{}'", other))),
        }
    }
}

/// Settings for one simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub city: City,
    pub vehicles: usize,
    pub duration_secs: u64,
    /// CSV file receiving one row per crossing.
    pub output: PathBuf,
    /// Vehicle speed in metres per second.
    pub vehicle_speed: f64,
    pub light: LightConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            // DEFAULT_CITY is always a known map
            city: City::parse(DEFAULT_CITY).unwrap_or(City::Paris),
            vehicles: DEFAULT_VEHICLES,
            duration_secs: DEFAULT_DURATION_SECS,
            output: PathBuf::from(DEFAULT_CROSSING_LOG),
            vehicle_speed: DEFAULT_VEHICLE_SPEED_MPS,
            light: LightConfig::default(),
        }
    }
}

impl SimulationConfig {
    pub fn from_json_str(json: &str) -> AdmissionResult<Self> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> AdmissionResult<Self> {
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> AdmissionResult<()> {
        self.light.validate()?;
        if !(self.vehicle_speed.is_finite() && self.vehicle_speed > 0.0) {
            return Err(AdmissionError::Config(format!(
                "vehicle_speed must be positive, got {}",
                self.vehicle_speed
            )));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }

    /// Applies command-line overrides on top of this configuration.
    ///
    /// Returns `Ok(None)` when `--help` was requested. `--config FILE` replaces
    /// the base configuration before the remaining flags are applied.
    pub fn with_args<I>(mut self, args: I) -> AdmissionResult<Option<Self>>
    where
        I: IntoIterator<Item = String>,
    {
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| AdmissionError::Config(format!("{} expects a value", flag)))
            };
            match arg.as_str() {
                "--config" => self = Self::from_json_file(Path::new(&value("--config")?))?,
                "--city" => self.city = City::parse(&value("--city")?)?,
                "--output" => self.output = PathBuf::from(value("--output")?),
                "--duration" => self.duration_secs = parse_number("--duration", &value("--duration")?)?,
                "--vehicles" => self.vehicles = parse_number("--vehicles", &value("--vehicles")?)?,
                "--help" => return Ok(None),
                other => {
                    return Err(AdmissionError::Config(format!("unknown argument '{}'", other)))
                }
            }
        }
        self.validate()?;
        Ok(Some(self))
    }
}

fn parse_number<T: std::str::FromStr>(flag: &str, raw: &str) -> AdmissionResult<T> {
    raw.parse()
        .map_err(|_| AdmissionError::Config(format!("{} expects a number, got '{}'", flag, raw)))
}

pub const USAGE: &str = "\
Traffic Simulation
Usage: simulation_main [options]
Options:
  --city <name>      City map to use (paris or nyc, default: paris)
  --output <file>    Crossing log CSV (default: crossings.csv)
  --duration <sec>   Simulation duration in seconds (default: 20)
  --vehicles <num>   Number of vehicles (default: 6)
  --config <file>    JSON configuration file
  --help             Show this help message";

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_match_original_light_timing() {
        let light = LightConfig::default();
        assert_eq!((light.min_dwell_ms, light.max_dwell_ms), (4000, 6000));
        assert!(light.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config =
            SimulationConfig::from_json_str(r#"{"city":"nyc","light":{"min_dwell_ms":10,"max_dwell_ms":20}}"#)
                .unwrap();
        assert_eq!(config.city, City::Nyc);
        assert_eq!(config.vehicles, DEFAULT_VEHICLES);
        assert_eq!(config.light.max_dwell_ms, 20);
        assert_eq!(config.light.tick_ms, DEFAULT_LIGHT_TICK_MS);
    }

    #[test]
    fn inverted_dwell_range_is_rejected() {
        let err = SimulationConfig::from_json_str(r#"{"light":{"min_dwell_ms":50,"max_dwell_ms":10}}"#)
            .unwrap_err();
        assert!(matches!(err, AdmissionError::Config(_)));
    }

    #[test]
    fn args_override_fields() {
        let config = SimulationConfig::default()
            .with_args(args(&["--city", "NYC", "--vehicles", "3", "--duration", "5"]))
            .unwrap()
            .unwrap();
        assert_eq!(config.city, City::Nyc);
        assert_eq!(config.vehicles, 3);
        assert_eq!(config.duration(), Duration::from_secs(5));
    }

    #[test]
    fn help_short_circuits() {
        let parsed = SimulationConfig::default().with_args(args(&["--help"])).unwrap();
        assert!(parsed.is_none());
    }

    #[test]
    fn bad_arguments_are_config_errors() {
        let cases: [&[&str]; 4] = [&["--vehicles", "many"], &["--city", "rome"], &["--duration"], &["--fast"]];
        for bad in cases {
            let err = SimulationConfig::default().with_args(args(bad)).unwrap_err();
            assert!(matches!(err, AdmissionError::Config(_)), "{:?}", bad);
        }
    }
}
