//! Credential model shared by the Tink Link crates.
//!
//! A credential is one in-flight link between a user and a banking provider.
//! Its status is driven server-side; this crate only describes the data and
//! the collaborator that reports it.

pub mod credential;
pub mod source;

pub use credential::{Credential, CredentialId, CredentialKind, CredentialStatus};
pub use source::{CredentialStatusSource, SourceError};
