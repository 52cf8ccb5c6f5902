//! Status classification for pending credentials.
//!
//! A fetched credential is compared against the last snapshot the poller
//! holds for the same id. Only the `(status, status_updated)` pair matters:
//! a re-affirmed status with a newer timestamp is still a change.

use std::collections::HashMap;

use tinklink_core::{Credential, CredentialId};

use crate::error::{PollError, Result};

/// Outcome of comparing a fetched credential with its snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// Same status and timestamp as the snapshot
    Unchanged,
    /// Status moved but the credential is still in flight
    NonTerminalChange,
    /// Status moved to one that needs no further polling
    TerminalChange,
}

impl StatusChange {
    /// Whether the fetched credential goes out on the updates stream.
    pub fn is_reportable(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

pub fn classify(snapshot: &Credential, fetched: &Credential) -> StatusChange {
    if snapshot.status_marker() == fetched.status_marker() {
        StatusChange::Unchanged
    } else if fetched.status.is_terminal() {
        StatusChange::TerminalChange
    } else {
        StatusChange::NonTerminalChange
    }
}

/// Pending credentials repartitioned after one poll cycle.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Still in flight, with snapshots replaced by any newer fetched state
    pub pending: Vec<Credential>,
    /// Credentials to report on the updates stream, in pending order
    pub changed: Vec<Credential>,
    /// Credentials that reached a terminal status this cycle
    pub converged: Vec<Credential>,
}

/// Classify every pending credential against the fetched result.
///
/// Fetched credentials that are not pending are ignored. A pending id that
/// is absent from `fetched` is a contract violation by the status source.
pub fn reconcile(pending: Vec<Credential>, fetched: Vec<Credential>) -> Result<Reconciliation> {
    let mut by_id: HashMap<CredentialId, Credential> = fetched
        .into_iter()
        .map(|credential| (credential.id.clone(), credential))
        .collect();

    let mut out = Reconciliation::default();
    for snapshot in pending {
        let Some(fetched) = by_id.remove(&snapshot.id) else {
            return Err(PollError::MissingCredential { id: snapshot.id });
        };

        let change = classify(&snapshot, &fetched);
        if change.is_reportable() {
            out.changed.push(fetched.clone());
        }
        match change {
            StatusChange::Unchanged => out.pending.push(snapshot),
            StatusChange::NonTerminalChange => out.pending.push(fetched),
            StatusChange::TerminalChange => out.converged.push(fetched),
        }
    }

    Ok(out)
}
