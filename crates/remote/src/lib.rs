//! Remote control of a test session.
//!
//! A target process owns the session ([`RemoteSessionAssistant`]); a
//! controller ([`RemoteController`]) drives it through the calls of
//! [`RemoteSession`], asking an [`Operator`] whenever a person has to decide.

#![warn(missing_docs)]

pub mod channel;
pub mod controller;
mod error;
pub mod local;
pub mod protocol;
pub mod service;

pub use channel::{Connector, RemoteSession};
pub use controller::{ControllerConfig, ControllerExit, InterruptChoice, Operator, RemoteController};
pub use error::{RemoteError, Result, TransportError};
pub use local::LocalConnector;
pub use protocol::{
    ControlSessionState, JobStatus, SessionProgress, StatePayload, TestPlanSummary,
    REMOTE_API_VERSION,
};
pub use service::RemoteSessionAssistant;
