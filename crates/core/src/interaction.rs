//! Interaction events emitted while running a job.

use serde::{Deserialize, Serialize};

/// Kind of interaction the operator is asked for or shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InteractionKind {
    /// Show what the job is for
    Purpose,
    /// Show the job description
    Description,
    /// Show the steps and wait for the operator
    Steps,
    /// Ask the operator for the outcome
    Verification,
    /// Ask for a comment
    Comment,
    /// Ask for the sudo password
    SudoInput,
    /// Offer to skip the job
    Skip,
}

/// One interaction event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// Kind
    pub kind: InteractionKind,
    /// Text shown to the operator
    pub message: String,
}

impl Interaction {
    /// Create an interaction.
    pub fn new(kind: InteractionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
