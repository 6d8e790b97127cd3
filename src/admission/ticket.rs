use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender};
use std::time::Duration;

use crate::error::{AdmissionError, AdmissionResult};

/// Producer half of a one-shot entry permission.
///
/// `fulfill` takes the ticket by value, so a ticket cannot be granted twice.
#[derive(Debug)]
pub struct AdmissionTicket {
    sender: SyncSender<()>,
}

/// Consumer half, held by the waiting vehicle.
#[derive(Debug)]
pub struct TicketWaiter {
    receiver: Receiver<()>,
}

/// Creates a linked ticket / waiter pair.
pub fn ticket() -> (AdmissionTicket, TicketWaiter) {
    let (sender, receiver) = mpsc::sync_channel(1);
    (AdmissionTicket { sender }, TicketWaiter { receiver })
}

impl AdmissionTicket {
    /// Grants the permission. Returns `false` if the waiter no longer exists.
    pub fn fulfill(self) -> bool {
        self.sender.send(()).is_ok()
    }
}

impl TicketWaiter {
    /// Blocks until the ticket is fulfilled. A ticket dropped without being
    /// fulfilled (intersection shutting down) yields [`AdmissionError::Shutdown`].
    pub fn wait(&self) -> AdmissionResult<()> {
        self.receiver.recv().map_err(|_| AdmissionError::Shutdown)
    }

    pub fn wait_timeout(&self, timeout: Duration) -> AdmissionResult<()> {
        match self.receiver.recv_timeout(timeout) {
            Ok(()) => Ok(()),
            Err(RecvTimeoutError::Timeout) => Err(AdmissionError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(AdmissionError::Shutdown),
        }
    }
}
