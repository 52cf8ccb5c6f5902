//! Error taxonomy for status polling.

use thiserror::Error;
use tinklink_core::{CredentialId, SourceError};

/// Polling result type alias
pub type Result<T> = std::result::Result<T, PollError>;

/// Why a polling batch ended without converging
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PollError {
    /// Fetching statuses failed; the batch is not retried
    #[error("failed to fetch credential statuses: {0}")]
    Transport(#[from] SourceError),

    /// The status source broke its contract by omitting a pending credential
    #[error("status source returned no credential with id {id}")]
    MissingCredential { id: CredentialId },

    /// Polling was cancelled through its handle
    #[error("polling cancelled")]
    Cancelled,

    /// The polling task stopped without reporting a result
    #[error("polling task terminated unexpectedly")]
    Terminated,
}

impl PollError {
    /// True when the error reflects a bug in the status source rather than
    /// an ordinary runtime failure.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::MissingCredential { .. })
    }
}
