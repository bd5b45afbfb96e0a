//! Error types for remote control.

use benchplan_execution::SessionError;

use crate::protocol::ControlSessionState;

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;

/// Failures of the channel itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Nobody listening
    #[error("connection refused")]
    ConnectionRefused,

    /// Peer went away mid-call
    #[error("connection closed")]
    Eof,

    /// No answer in time
    #[error("timed out")]
    Timeout,

    /// Anything else; never retried
    #[error("transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether waiting and reconnecting may help.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionRefused | TransportError::Eof | TransportError::Timeout
        )
    }
}

/// Errors of remote session control.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Channel failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Controller and target speak different protocol versions
    #[error("protocol version mismatch: controller speaks {controller}, target speaks {target}")]
    VersionMismatch {
        /// Controller version
        controller: u32,
        /// Target version
        target: u32,
    },

    /// Call not allowed in the current phase
    #[error("{call} is not allowed in state {state}")]
    WrongState {
        /// Rejected call
        call: &'static str,
        /// State at the time
        state: ControlSessionState,
    },

    /// The target session failed
    #[error(transparent)]
    Session(#[from] SessionError),

    /// The operator declined to pick a test plan
    #[error("no test plan selected")]
    NoTestPlan,
}

impl RemoteError {
    /// Whether the controller should reconnect rather than give up.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Transport(e) if e.is_transient())
    }
}
