//! Status-convergence polling for in-flight credentials.
//!
//! After a credential is added or refreshed, the aggregation service moves
//! it through a series of statuses on its own. [`CredentialStatusPoller`]
//! queries a [`CredentialStatusSource`](tinklink_core::CredentialStatusSource)
//! with growing delays until every credential in a batch reaches a terminal
//! status, reporting each observed change along the way.

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod backoff;
pub mod classifier;
pub mod config;
pub mod error;
pub mod poller;

pub use backoff::{BackoffState, BackoffStrategy};
pub use classifier::{Reconciliation, StatusChange};
pub use config::{BackoffConfig, ConfigError, ConfigLoader, PollerConfig};
pub use error::{PollError, Result};
pub use poller::{
    BatchCompletion, CredentialStatusPoller, CredentialUpdates, PollerState, PollingHandle,
    PollingTask,
};
