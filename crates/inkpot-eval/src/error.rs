//! Error types for the inkpot interpreter.

use thiserror::Error;

use crate::suspend::SuspensionId;

/// Errors surfaced to the host, as opposed to exceptions raised by the
/// running cell.
#[derive(Debug, Error)]
pub enum Error {
    /// `resume` named a suspension that is not waiting.
    #[error("no suspension with id {0} is waiting")]
    UnknownSuspension(SuspensionId),

    /// The evaluation waiting on a suspension went away before it was resumed.
    #[error("suspension {0} was abandoned")]
    Abandoned(SuspensionId),

    /// Nobody is listening for suspension events.
    #[error("the host is no longer accepting input requests")]
    HostGone,
}
