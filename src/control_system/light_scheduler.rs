use log::{debug, info, warn};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::LightConfig;
use crate::control_system::{Phase, PhaseChannel};
use crate::error::{AdmissionError, AdmissionResult};

/// Inclusive range a phase dwell is drawn from, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DwellRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DwellRange {
    pub fn from_config(config: &LightConfig) -> Self {
        Self {
            min_ms: config.min_dwell_ms,
            max_ms: config.max_dwell_ms,
        }
    }

    /// Draws a dwell uniformly from the range.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        Duration::from_millis(rng.random_range(self.min_ms..=self.max_ms))
    }

    pub fn contains(&self, dwell: Duration) -> bool {
        let ms = dwell.as_millis();
        ms >= u128::from(self.min_ms) && ms <= u128::from(self.max_ms)
    }
}

#[derive(Debug)]
struct LightState {
    phase: Phase,
    transitions: u64,
    stopped: bool,
}

#[derive(Debug)]
struct LightShared {
    state: Mutex<LightState>,
    stop_signal: Condvar,
    channel: PhaseChannel,
}

impl LightShared {
    fn lock_state(&self) -> MutexGuard<'_, LightState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes while the state lock is held so channel order always matches
    /// transition order, whoever triggered the change.
    fn transition(&self, state: &mut LightState, phase: Phase) {
        state.phase = phase;
        state.transitions += 1;
        self.channel.send(phase);
        debug!("Traffic light switched to {:?} (transition {})", phase, state.transitions);
    }
}

enum Mode {
    Timed { config: LightConfig },
    Manual,
}

/// A two-phase traffic light.
///
/// A timed scheduler toggles on a random dwell from its own thread once
/// [`start`](Self::start) is called. A manual scheduler only changes phase
/// through [`set_phase`](Self::set_phase).
pub struct LightScheduler {
    shared: Arc<LightShared>,
    mode: Mode,
    worker: Mutex<Option<JoinHandle<()>>>,
    started: Mutex<bool>,
}

impl LightScheduler {
    /// Creates a timed scheduler starting at [`Phase::Red`].
    pub fn new(config: LightConfig) -> AdmissionResult<Self> {
        config.validate()?;
        Ok(Self::build(Phase::Red, Mode::Timed { config }))
    }

    /// Creates a scheduler without a timer, holding `initial` until forced.
    pub fn manual(initial: Phase) -> Self {
        Self::build(initial, Mode::Manual)
    }

    fn build(initial: Phase, mode: Mode) -> Self {
        Self {
            shared: Arc::new(LightShared {
                state: Mutex::new(LightState {
                    phase: initial,
                    transitions: 0,
                    stopped: false,
                }),
                stop_signal: Condvar::new(),
                channel: PhaseChannel::new(),
            }),
            mode,
            worker: Mutex::new(None),
            started: Mutex::new(false),
        }
    }

    /// Starts cycling. A manual scheduler just records that it is running.
    pub fn start(&self) -> AdmissionResult<()> {
        {
            let mut started = self.started.lock().unwrap_or_else(PoisonError::into_inner);
            if *started {
                return Err(AdmissionError::InvalidState(
                    "traffic light already started".to_string(),
                ));
            }
            if self.shared.lock_state().stopped {
                return Err(AdmissionError::InvalidState(
                    "traffic light already shut down".to_string(),
                ));
            }
            *started = true;
        }

        if let Mode::Timed { config } = &self.mode {
            let dwell = DwellRange::from_config(config);
            let tick = config.tick();
            let rng = match config.seed {
                Some(seed) => SmallRng::seed_from_u64(seed),
                None => SmallRng::from_rng(&mut rand::rng()),
            };
            let shared = Arc::clone(&self.shared);
            let handle = thread::Builder::new()
                .name("light-scheduler".to_string())
                .spawn(move || cycle_through_phases(shared, dwell, tick, rng))?;
            *self.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
            info!(
                "Traffic light cycling every {}-{} ms",
                dwell.min_ms, dwell.max_ms
            );
        }
        Ok(())
    }

    /// Instantaneous phase snapshot; never touches the channel.
    pub fn current_phase(&self) -> Phase {
        self.shared.lock_state().phase
    }

    /// Number of phase changes so far.
    pub fn transitions(&self) -> u64 {
        self.shared.lock_state().transitions
    }

    /// Forces the light into `phase`, publishing the change if it differs
    /// from the current phase.
    pub fn set_phase(&self, phase: Phase) {
        let mut state = self.shared.lock_state();
        if state.phase != phase && !state.stopped {
            self.shared.transition(&mut state, phase);
        }
    }

    /// Blocks until the light is green.
    ///
    /// Returns at once if the light is already green. Otherwise consumes
    /// phases from the channel until a green one arrives while the live phase
    /// is still green, so values buffered from earlier cycles cannot let a
    /// caller through on red.
    pub fn wait_for_green(&self) -> AdmissionResult<()> {
        self.wait_for_green_until(None)
    }

    pub fn wait_for_green_timeout(&self, timeout: Duration) -> AdmissionResult<()> {
        self.wait_for_green_until(Some(Instant::now() + timeout))
    }

    pub(crate) fn wait_for_green_until(&self, deadline: Option<Instant>) -> AdmissionResult<()> {
        if self.current_phase().is_green() {
            return Ok(());
        }
        loop {
            let phase = match deadline {
                None => self.shared.channel.receive()?,
                Some(deadline) => self
                    .shared
                    .channel
                    .receive_timeout(deadline.saturating_duration_since(Instant::now()))?,
            };
            if phase.is_green() && self.current_phase().is_green() {
                return Ok(());
            }
        }
    }

    /// The channel phase changes are published on.
    pub fn channel(&self) -> &PhaseChannel {
        &self.shared.channel
    }

    /// Stops the timer thread, joins it and closes the phase channel.
    /// Calling it again is a no-op.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.lock_state();
            if state.stopped {
                return;
            }
            state.stopped = true;
        }
        self.shared.stop_signal.notify_all();
        let handle = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("Traffic light thread panicked");
            }
        }
        self.shared.channel.close();
        debug!("Traffic light shut down");
    }
}

impl Drop for LightScheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn cycle_through_phases(shared: Arc<LightShared>, dwell: DwellRange, tick: Duration, mut rng: SmallRng) {
    let mut cycle_duration = dwell.sample(&mut rng);
    let mut last_update = Instant::now();
    let mut state = shared.lock_state();
    loop {
        // Bounded sleep that a shutdown cuts short.
        state = shared
            .stop_signal
            .wait_timeout_while(state, tick, |s| !s.stopped)
            .unwrap_or_else(PoisonError::into_inner)
            .0;
        if state.stopped {
            break;
        }
        if last_update.elapsed() >= cycle_duration {
            let next = state.phase.toggled();
            shared.transition(&mut state, next);
            last_update = Instant::now();
            cycle_duration = dwell.sample(&mut rng);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast_config(seed: u64) -> LightConfig {
        LightConfig {
            min_dwell_ms: 5,
            max_dwell_ms: 10,
            tick_ms: 1,
            seed: Some(seed),
        }
    }

    #[test]
    fn dwell_samples_stay_in_range() {
        let range = DwellRange {
            min_ms: 4000,
            max_ms: 6000,
        };
        let mut rng = SmallRng::seed_from_u64(7);
        let samples: Vec<Duration> = (0..10_000).map(|_| range.sample(&mut rng)).collect();
        assert!(samples.iter().all(|d| range.contains(*d)));
        // Uniform over 2001 values: both halves of the range get hit.
        assert!(samples.iter().any(|d| d.as_millis() < 4500));
        assert!(samples.iter().any(|d| d.as_millis() > 5500));
    }

    #[test]
    fn starts_red() {
        let light = LightScheduler::new(LightConfig::default()).unwrap();
        assert_eq!(light.current_phase(), Phase::Red);
        assert_eq!(light.transitions(), 0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = LightConfig {
            min_dwell_ms: 10,
            max_dwell_ms: 5,
            ..LightConfig::default()
        };
        assert!(matches!(LightScheduler::new(config), Err(AdmissionError::Config(_))));
    }

    #[test]
    fn set_phase_publishes_only_changes() {
        let light = LightScheduler::manual(Phase::Red);
        light.set_phase(Phase::Red);
        assert!(light.channel().is_empty());
        light.set_phase(Phase::Green);
        assert_eq!(light.current_phase(), Phase::Green);
        assert_eq!(light.channel().receive().unwrap(), Phase::Green);
        assert_eq!(light.transitions(), 1);
    }

    #[test]
    fn wait_for_green_returns_immediately_when_green() {
        let light = LightScheduler::manual(Phase::Green);
        light.wait_for_green().unwrap();
        assert!(light.channel().is_empty());
    }

    #[test]
    fn stale_green_does_not_open_a_red_light() {
        let light = LightScheduler::manual(Phase::Red);
        light.set_phase(Phase::Green);
        light.set_phase(Phase::Red);
        // Buffer is [Green, Red] while the light is red.
        let result = light.wait_for_green_timeout(Duration::from_millis(30));
        assert!(matches!(result, Err(AdmissionError::Timeout)));
        assert!(light.channel().is_empty());
    }

    #[test]
    fn timed_light_toggles_and_shuts_down() {
        let light = LightScheduler::new(fast_config(3)).unwrap();
        light.start().unwrap();
        assert_eq!(light.channel().receive().unwrap(), Phase::Green);
        assert_eq!(light.channel().receive().unwrap(), Phase::Red);
        light.shutdown();
        assert!(light.channel().is_closed());
        let frozen = light.transitions();
        thread::sleep(Duration::from_millis(30));
        assert_eq!(light.transitions(), frozen);
    }

    #[test]
    fn start_twice_is_invalid() {
        let light = LightScheduler::new(fast_config(1)).unwrap();
        light.start().unwrap();
        assert!(matches!(light.start(), Err(AdmissionError::InvalidState(_))));
    }

    #[test]
    fn wait_for_green_fails_after_shutdown() {
        let light = LightScheduler::manual(Phase::Red);
        light.shutdown();
        assert!(matches!(light.wait_for_green(), Err(AdmissionError::ChannelClosed)));
    }
}
