use log::debug;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::admission::ticket::AdmissionTicket;
use crate::error::{AdmissionError, AdmissionResult};
use crate::ids::AgentId;

/// A vehicle waiting for entry together with the ticket that will let it in.
#[derive(Debug)]
pub struct WaitingEntry {
    pub agent: AgentId,
    ticket: AdmissionTicket,
}

/// Thread-safe FIFO of vehicles waiting at one intersection.
#[derive(Debug, Default)]
pub struct AdmissionQueue {
    entries: Mutex<VecDeque<WaitingEntry>>,
}

impl AdmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<WaitingEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn size(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Adds a vehicle to the end of the waiting line.
    pub fn enqueue(&self, agent: AgentId, ticket: AdmissionTicket) -> AdmissionResult<()> {
        let mut entries = self.lock();
        if entries.iter().any(|e| e.agent == agent) {
            return Err(AdmissionError::AlreadyQueued(agent));
        }
        entries.push_back(WaitingEntry { agent, ticket });
        Ok(())
    }

    /// Removes the front entry and fulfils its ticket in one critical section.
    ///
    /// Entries whose waiter has gone away are discarded and the next one is
    /// tried. Returns the vehicle that was actually let in.
    pub fn grant_first(&self) -> Option<AgentId> {
        let mut entries = self.lock();
        while let Some(entry) = entries.pop_front() {
            let agent = entry.agent;
            if entry.ticket.fulfill() {
                return Some(agent);
            }
            debug!("{} stopped waiting before being granted entry", agent);
        }
        None
    }

    /// Removes a still-pending entry. Returns `false` if `agent` is not queued.
    pub fn withdraw(&self, agent: AgentId) -> bool {
        let mut entries = self.lock();
        match entries.iter().position(|e| e.agent == agent) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    /// Empties the queue. Every dropped ticket wakes its waiter with
    /// [`AdmissionError::Shutdown`].
    pub fn drain(&self) -> usize {
        let mut entries = self.lock();
        let drained = entries.len();
        entries.clear();
        drained
    }

    /// Queued vehicles, front first.
    pub fn waiting_agents(&self) -> Vec<AgentId> {
        self.lock().iter().map(|e| e.agent).collect()
    }
}
