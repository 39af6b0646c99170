//! Engine error types

use thiserror::Error;

use crate::ports::PortError;
use crate::recording::RecordingError;

/// Errors crossing an engine boundary. Orchestrators decide per boundary whether an error is
/// absorbed and the run continues, or absorbed and the run terminates early.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A collaborator (driver, executor, capture, store) failed
    #[error(transparent)]
    Port(#[from] PortError),

    /// Recording session misuse or capture failure
    #[error(transparent)]
    Recording(#[from] RecordingError),

    /// The executor answered with something the engine cannot use
    #[error("unexpected executor response: {0}")]
    UnexpectedResponse(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}
