use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::control_system::Phase;
use crate::error::{AdmissionError, AdmissionResult};

#[derive(Debug, Default)]
struct Buffer {
    phases: VecDeque<Phase>,
    closed: bool,
}

/// Blocking FIFO of light phases with a single logical consumer.
///
/// Each `receive` removes the value it returns, so two consumers would split
/// the stream between them rather than both seeing every phase. This is a
/// hand-off queue, not a broadcast.
#[derive(Debug, Default)]
pub struct PhaseChannel {
    buffer: Mutex<Buffer>,
    available: Condvar,
}

impl PhaseChannel {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Buffer> {
        self.buffer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a phase and wakes one blocked consumer. Phases sent after
    /// [`close`](Self::close) are dropped.
    pub fn send(&self, phase: Phase) {
        let mut buffer = self.lock();
        if buffer.closed {
            return;
        }
        buffer.phases.push_back(phase);
        self.available.notify_one();
    }

    /// Blocks until a phase is available and returns the oldest one.
    ///
    /// Values still buffered when the channel is closed are delivered first;
    /// after that every call fails with [`AdmissionError::ChannelClosed`].
    pub fn receive(&self) -> AdmissionResult<Phase> {
        let mut buffer = self
            .available
            .wait_while(self.lock(), |b| b.phases.is_empty() && !b.closed)
            .unwrap_or_else(PoisonError::into_inner);
        buffer.phases.pop_front().ok_or(AdmissionError::ChannelClosed)
    }

    /// Like [`receive`](Self::receive) but gives up with
    /// [`AdmissionError::Timeout`] once `timeout` has elapsed.
    pub fn receive_timeout(&self, timeout: Duration) -> AdmissionResult<Phase> {
        let deadline = Instant::now() + timeout;
        let mut buffer = self.lock();
        loop {
            if let Some(phase) = buffer.phases.pop_front() {
                return Ok(phase);
            }
            if buffer.closed {
                return Err(AdmissionError::ChannelClosed);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Err(AdmissionError::Timeout);
            }
            buffer = self
                .available
                .wait_timeout(buffer, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Closes the channel and wakes every waiting consumer.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
