//! Error type shared by the admission core, the topology registry and the
//! simulation surfaces around them.

use thiserror::Error;

use crate::ids::{AgentId, IntersectionId, SegmentId};

#[derive(Debug, Error)]
pub enum AdmissionError {
    /// The caller's view of the intersection does not match its real state,
    /// e.g. a departure notice from an agent that was never admitted.
    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("{0} already has a pending entry request")]
    AlreadyQueued(AgentId),

    #[error("phase channel closed")]
    ChannelClosed,

    #[error("intersection shut down")]
    Shutdown,

    #[error("timed out")]
    Timeout,

    #[error("{0} is not registered")]
    UnknownSegment(SegmentId),

    #[error("{0} is not registered")]
    UnknownIntersection(IntersectionId),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type AdmissionResult<T> = Result<T, AdmissionError>;
