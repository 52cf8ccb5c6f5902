//! The remote collaborator that reports credential statuses.

use crate::credential::{Credential, CredentialId};
use async_trait::async_trait;
use thiserror::Error;

/// Error while fetching statuses from the remote source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// Network or transport failure
    #[error("network error: {0}")]
    Network(String),

    /// The service answered with an error
    #[error("server error: {0}")]
    Server(String),

    /// The response could not be decoded
    #[error("parse error: {0}")]
    Parse(String),

    /// The session used to query the service is no longer valid
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
}

/// Supplies the current state of a set of credentials.
///
/// Implementations must return a credential for every requested id that
/// still exists. They may return additional, unrelated credentials (e.g. a
/// service that only lists all of the user's credentials). A single source
/// can be shared between pollers, so calls may interleave.
#[async_trait]
pub trait CredentialStatusSource: Send + Sync {
    /// Fetch the current state of the given credentials.
    ///
    /// Reissuing the same call is always allowed.
    async fn fetch_statuses(&self, ids: &[CredentialId]) -> Result<Vec<Credential>, SourceError>;
}
