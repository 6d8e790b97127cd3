// admission/mod.rs
pub mod coordinator;
pub mod queue;
pub mod ticket;

use serde::{Deserialize, Serialize};

pub use coordinator::{IntersectionCoordinator, IntersectionStats};
pub use queue::{AdmissionQueue, WaitingEntry};
pub use ticket::{ticket, AdmissionTicket, TicketWaiter};

/// Where a vehicle is in its passage through one intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransitState {
    /// Driving along a street, not yet queued.
    #[default]
    Idle,
    /// Queued, ticket pending.
    Waiting,
    /// Ticket granted.
    Admitted,
    /// Granted and waiting for the light.
    CheckingLight,
    /// Inside the intersection on green.
    Crossing,
    /// Left the intersection and released it.
    Departed,
}
