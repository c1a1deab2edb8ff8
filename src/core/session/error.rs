use thiserror::Error;

use super::call::CallPhase;
use super::checkin::CheckinPhase;

/// Errors raised by the session state machines.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Cannot {action} a check-in that is {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: CheckinPhase,
    },

    #[error("Invalid call transition: {event} while {from}")]
    InvalidTransition { from: CallPhase, event: &'static str },

    #[error("Check-in duration must be greater than zero")]
    InvalidDuration,
}

pub type SessionResult<T> = Result<T, SessionError>;
