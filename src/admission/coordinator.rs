//! Per-intersection admission: a FIFO of waiting vehicles, a dispatch thread
//! that lets them in one at a time, and the traffic light they must also
//! respect.
//!
//! The dispatch thread and every entry/departure call share one gate lock
//! that covers both the admitted-vehicle slot and the queue head, so the
//! dispatcher can never act on a stale view of either. It sleeps on a
//! condition variable and is woken by new requests, departures and shutdown.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::admission::queue::AdmissionQueue;
use crate::admission::ticket::ticket;
use crate::admission::TransitState;
use crate::config::LightConfig;
use crate::control_system::{LightScheduler, Phase};
use crate::error::{AdmissionError, AdmissionResult};
use crate::ids::{AgentId, IntersectionId, SegmentId};

/// Counters describing an intersection's traffic so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IntersectionStats {
    pub granted: u64,
    pub departed: u64,
    /// Admissions handed back because the light wait failed.
    pub released: u64,
    pub waiting: usize,
    pub admitted: Option<AgentId>,
}

#[derive(Debug, Default)]
struct GateState {
    admitted: Option<AgentId>,
    started: bool,
    shutdown: bool,
    granted: u64,
    departed: u64,
    released: u64,
}

struct Shared {
    id: IntersectionId,
    gate: Mutex<GateState>,
    wake: Condvar,
    queue: AdmissionQueue,
    light: LightScheduler,
}

impl Shared {
    fn lock_gate(&self) -> MutexGuard<'_, GateState> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Frees the intersection for an agent that was granted entry but never
    /// crossed.
    fn release(&self, agent: AgentId) {
        let mut gate = self.lock_gate();
        if gate.admitted == Some(agent) {
            gate.admitted = None;
            gate.released += 1;
            self.wake.notify_all();
            warn!("{}: released admission of {} without crossing", self.id, agent);
        }
    }
}

/// Admission control for one intersection.
pub struct IntersectionCoordinator {
    shared: Arc<Shared>,
    segments: BTreeSet<SegmentId>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl IntersectionCoordinator {
    /// Creates an intersection with a timed traffic light.
    pub fn new(id: IntersectionId, light: LightConfig) -> AdmissionResult<Self> {
        Ok(Self::with_scheduler(id, LightScheduler::new(light)?))
    }

    pub fn with_scheduler(id: IntersectionId, light: LightScheduler) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                gate: Mutex::new(GateState::default()),
                wake: Condvar::new(),
                queue: AdmissionQueue::new(),
                light,
            }),
            segments: BTreeSet::new(),
            dispatcher: Mutex::new(None),
        }
    }

    pub fn id(&self) -> IntersectionId {
        self.shared.id
    }

    /// Registers an adjacent street. Setup only, before the simulation runs.
    pub fn connect(&mut self, segment: SegmentId) {
        self.segments.insert(segment);
    }

    pub fn connected_segments(&self) -> impl Iterator<Item = SegmentId> + '_ {
        self.segments.iter().copied()
    }

    pub fn is_connected(&self, segment: SegmentId) -> bool {
        self.segments.contains(&segment)
    }

    /// Starts the traffic light and the dispatch thread.
    pub fn start(&self) -> AdmissionResult<()> {
        {
            let mut gate = self.shared.lock_gate();
            if gate.shutdown {
                return Err(AdmissionError::Shutdown);
            }
            if gate.started {
                return Err(AdmissionError::InvalidState(format!(
                    "{} already started",
                    self.shared.id
                )));
            }
            gate.started = true;
        }
        self.shared.light.start()?;

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name(format!("dispatch-{}", self.shared.id.0))
            .spawn(move || process_vehicle_queue(shared))?;
        *self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
        info!("{} started ({} streets)", self.shared.id, self.segments.len());
        Ok(())
    }

    /// Queues `agent` and blocks until it may cross.
    ///
    /// The vehicle first waits for its turn in the queue and only then for a
    /// green light, so its place in line never depends on the light timing.
    /// While it waits for green it already holds the intersection.
    pub fn request_entry(&self, agent: AgentId) -> AdmissionResult<()> {
        self.request_entry_until(agent, None, &mut |_| {})
    }

    /// [`request_entry`](Self::request_entry) that reports each step of the
    /// passage to `observe`: `Waiting`, `Admitted`, `CheckingLight` (only on
    /// red) and finally `Crossing`.
    pub fn request_entry_tracked(
        &self,
        agent: AgentId,
        mut observe: impl FnMut(TransitState),
    ) -> AdmissionResult<()> {
        self.request_entry_until(agent, None, &mut observe)
    }

    /// [`request_entry`](Self::request_entry) with an overall deadline.
    ///
    /// On [`AdmissionError::Timeout`] the vehicle holds no place in the queue
    /// and no admission.
    pub fn request_entry_timeout(&self, agent: AgentId, timeout: Duration) -> AdmissionResult<()> {
        self.request_entry_until(agent, Some(Instant::now() + timeout), &mut |_| {})
    }

    fn request_entry_until(
        &self,
        agent: AgentId,
        deadline: Option<Instant>,
        observe: &mut dyn FnMut(TransitState),
    ) -> AdmissionResult<()> {
        let id = self.shared.id;
        let (ticket, waiter) = ticket();
        {
            let gate = self.shared.lock_gate();
            if gate.shutdown {
                return Err(AdmissionError::Shutdown);
            }
            if gate.admitted == Some(agent) {
                return Err(AdmissionError::InvalidState(format!(
                    "{} already holds {}",
                    agent, id
                )));
            }
            self.shared.queue.enqueue(agent, ticket)?;
            self.shared.wake.notify_all();
        }
        debug!("{}: {} queued", id, agent);
        observe(TransitState::Waiting);

        match deadline {
            None => waiter.wait()?,
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                match waiter.wait_timeout(remaining) {
                    Ok(()) => {}
                    Err(AdmissionError::Timeout) => {
                        // Grants happen under the gate lock: if the entry is
                        // gone, the ticket was already fulfilled or dropped.
                        let gate = self.shared.lock_gate();
                        if self.shared.queue.withdraw(agent) {
                            debug!("{}: {} gave up waiting", id, agent);
                            return Err(AdmissionError::Timeout);
                        }
                        drop(gate);
                        waiter.wait()?;
                    }
                    Err(err) => return Err(err),
                }
            }
        }
        debug!("{}: {} is granted entry", id, agent);
        observe(TransitState::Admitted);

        if self.shared.light.current_phase() == Phase::Red {
            observe(TransitState::CheckingLight);
            if let Err(err) = self.shared.light.wait_for_green_until(deadline) {
                self.shared.release(agent);
                return Err(err);
            }
        }
        observe(TransitState::Crossing);
        Ok(())
    }

    /// Frees the intersection after `agent` has left it.
    ///
    /// Only the currently admitted vehicle may do this.
    pub fn notify_departure(&self, agent: AgentId) -> AdmissionResult<()> {
        let id = self.shared.id;
        let mut gate = self.shared.lock_gate();
        match gate.admitted {
            Some(current) if current == agent => {
                gate.admitted = None;
                gate.departed += 1;
                self.shared.wake.notify_all();
                debug!("{}: {} has left", id, agent);
                Ok(())
            }
            Some(current) => Err(AdmissionError::InvalidState(format!(
                "{} reported leaving {} while {} holds it",
                agent, id, current
            ))),
            None => Err(AdmissionError::InvalidState(format!(
                "{} reported leaving {} which admitted nobody",
                agent, id
            ))),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.shared.lock_gate().admitted.is_some()
    }

    pub fn admitted_agent(&self) -> Option<AgentId> {
        self.shared.lock_gate().admitted
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.size()
    }

    pub fn waiting_agents(&self) -> Vec<AgentId> {
        self.shared.queue.waiting_agents()
    }

    pub fn current_phase(&self) -> Phase {
        self.shared.light.current_phase()
    }

    pub fn light(&self) -> &LightScheduler {
        &self.shared.light
    }

    pub fn stats(&self) -> IntersectionStats {
        let gate = self.shared.lock_gate();
        IntersectionStats {
            granted: gate.granted,
            departed: gate.departed,
            released: gate.released,
            waiting: self.shared.queue.size(),
            admitted: gate.admitted,
        }
    }

    /// Stops dispatching, wakes every queued vehicle with
    /// [`AdmissionError::Shutdown`], stops the light and joins both threads.
    pub fn shutdown(&self) {
        {
            let mut gate = self.shared.lock_gate();
            if gate.shutdown {
                return;
            }
            gate.shutdown = true;
            let drained = self.shared.queue.drain();
            self.shared.wake.notify_all();
            if drained > 0 {
                info!("{}: {} waiting vehicles turned away", self.shared.id, drained);
            }
        }
        let handle = self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!("{}: dispatch thread panicked", self.shared.id);
            }
        }
        self.shared.light.shutdown();
        info!("{} shut down", self.shared.id);
    }
}

impl Drop for IntersectionCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn process_vehicle_queue(shared: Arc<Shared>) {
    let mut gate = shared.lock_gate();
    loop {
        gate = shared
            .wake
            .wait_while(gate, |g| {
                !g.shutdown && (g.admitted.is_some() || shared.queue.is_empty())
            })
            .unwrap_or_else(PoisonError::into_inner);
        if gate.shutdown {
            break;
        }
        if let Some(agent) = shared.queue.grant_first() {
            gate.admitted = Some(agent);
            gate.granted += 1;
        }
    }
    debug!("{}: dispatcher stopped", shared.id);
}
