//! Credential data model.
//!
//! Field names follow the camelCase wire form used by the aggregation API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque credential identifier, stable across status queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(String);

impl CredentialId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CredentialId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CredentialId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CredentialId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// How the user authenticates against the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CredentialKind {
    Password,
    MobileBankId,
    Keyfob,
    Fraud,
    ThirdPartyAuthentication,
    #[serde(other)]
    Unknown,
}

/// Server-side status of a credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CredentialStatus {
    Created,
    Authenticating,
    Updating,
    AwaitingMobileBankIdAuthentication,
    AwaitingSupplementalInformation,
    AwaitingThirdPartyAppAuthentication,
    Updated,
    PermanentError,
    TemporaryError,
    AuthenticationError,
    Disabled,
    SessionExpired,
    #[serde(other)]
    Unknown,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Authenticating => "authenticating",
            Self::Updating => "updating",
            Self::AwaitingMobileBankIdAuthentication => "awaitingMobileBankIdAuthentication",
            Self::AwaitingSupplementalInformation => "awaitingSupplementalInformation",
            Self::AwaitingThirdPartyAppAuthentication => "awaitingThirdPartyAppAuthentication",
            Self::Updated => "updated",
            Self::PermanentError => "permanentError",
            Self::TemporaryError => "temporaryError",
            Self::AuthenticationError => "authenticationError",
            Self::Disabled => "disabled",
            Self::SessionExpired => "sessionExpired",
            Self::Unknown => "unknown",
        }
    }

    /// Whether no further automatic progress is expected from this status
    /// without new user action.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::Updated
            | Self::PermanentError
            | Self::TemporaryError
            | Self::AuthenticationError
            | Self::Unknown
            | Self::Disabled
            | Self::SessionExpired => true,
            Self::Created
            | Self::Authenticating
            | Self::Updating
            | Self::AwaitingMobileBankIdAuthentication
            | Self::AwaitingSupplementalInformation
            | Self::AwaitingThirdPartyAppAuthentication => false,
        }
    }
}

impl std::fmt::Display for CredentialStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single linking operation tracked until its status converges.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: CredentialId,
    #[serde(default)]
    pub provider_name: String,
    pub kind: CredentialKind,
    pub status: CredentialStatus,
    /// Message attached to the last status change
    #[serde(default)]
    pub status_payload: String,
    /// When the status last changed
    #[serde(default)]
    pub status_updated: Option<DateTime<Utc>>,
    /// When the credential last refreshed successfully
    #[serde(default)]
    pub updated: Option<DateTime<Utc>>,
    /// False when the provider only refreshes on its own schedule
    #[serde(default = "default_manually_updatable")]
    pub is_manually_updatable: bool,
}

fn default_manually_updatable() -> bool {
    true
}

impl Credential {
    /// Create a freshly added credential in the `created` state.
    pub fn new(
        id: impl Into<CredentialId>,
        provider_name: impl Into<String>,
        kind: CredentialKind,
    ) -> Self {
        Self {
            id: id.into(),
            provider_name: provider_name.into(),
            kind,
            status: CredentialStatus::Created,
            status_payload: String::new(),
            status_updated: None,
            updated: None,
            is_manually_updatable: true,
        }
    }

    /// Returns a copy with a new status stamped at `at`.
    pub fn with_status(mut self, status: CredentialStatus, at: DateTime<Utc>) -> Self {
        self.status = status;
        self.status_updated = Some(at);
        self
    }

    pub fn with_manually_updatable(mut self, updatable: bool) -> Self {
        self.is_manually_updatable = updatable;
        self
    }

    /// The `(status, status_updated)` pair used to detect changes.
    pub fn status_marker(&self) -> (CredentialStatus, Option<DateTime<Utc>>) {
        (self.status, self.status_updated)
    }
}
