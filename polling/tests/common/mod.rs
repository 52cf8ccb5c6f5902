#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]
//! Test doubles for the credential status source.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tinklink_core::{
    Credential, CredentialId, CredentialKind, CredentialStatus, CredentialStatusSource,
    SourceError,
};
use tokio::sync::Semaphore;
use tokio::time::Instant;

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

pub fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(1_600_000_000 + secs, 0).unwrap()
}

pub fn credential(id: &str, status: CredentialStatus, secs: i64) -> Credential {
    Credential::new(id, "se-demo-bank", CredentialKind::Password).with_status(status, at(secs))
}

pub fn ids(credentials: &[Credential]) -> Vec<String> {
    credentials.iter().map(|c| c.id.to_string()).collect()
}

/// One recorded `fetch_statuses` call.
#[derive(Debug, Clone)]
pub struct Call {
    pub at: Instant,
    pub ids: Vec<CredentialId>,
}

/// Answers each query with the next scripted response.
///
/// When gated, a query waits for [`ScriptedSource::release`] after being
/// recorded, which keeps it in flight.
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<Vec<Credential>, SourceError>>>,
    calls: Mutex<Vec<Call>>,
    gate: Option<Semaphore>,
}

impl ScriptedSource {
    pub fn new(responses: Vec<Result<Vec<Credential>, SourceError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
            gate: None,
        })
    }

    pub fn gated(responses: Vec<Result<Vec<Credential>, SourceError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
            gate: Some(Semaphore::new(0)),
        })
    }

    pub fn release(&self, queries: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(queries);
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Offsets of every call from `start`, in whole seconds.
    pub fn call_offsets(&self, start: Instant) -> Vec<u64> {
        self.calls()
            .iter()
            .map(|call| call.at.duration_since(start).as_secs())
            .collect()
    }
}

#[async_trait]
impl CredentialStatusSource for ScriptedSource {
    async fn fetch_statuses(&self, ids: &[CredentialId]) -> Result<Vec<Credential>, SourceError> {
        self.calls.lock().unwrap().push(Call {
            at: Instant::now(),
            ids: ids.to_vec(),
        });

        if let Some(gate) = &self.gate {
            gate.acquire().await.expect("gate closed").forget();
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::Server("script exhausted".to_string())))
    }
}

/// A live view of the user's credentials, like a service that lists every
/// credential regardless of which ids were asked for.
#[derive(Default)]
pub struct StatusBoard {
    credentials: Mutex<HashMap<CredentialId, Credential>>,
    queries: Mutex<usize>,
}

impl StatusBoard {
    pub fn new(credentials: Vec<Credential>) -> Arc<Self> {
        let board = Self::default();
        board
            .credentials
            .lock()
            .unwrap()
            .extend(credentials.into_iter().map(|c| (c.id.clone(), c)));
        Arc::new(board)
    }

    pub fn set(&self, credential: Credential) {
        self.credentials
            .lock()
            .unwrap()
            .insert(credential.id.clone(), credential);
    }

    pub fn query_count(&self) -> usize {
        *self.queries.lock().unwrap()
    }
}

#[async_trait]
impl CredentialStatusSource for StatusBoard {
    async fn fetch_statuses(&self, _ids: &[CredentialId]) -> Result<Vec<Credential>, SourceError> {
        *self.queries.lock().unwrap() += 1;
        // Simulated round trip so queries from several pollers interleave.
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(self.credentials.lock().unwrap().values().cloned().collect())
    }
}
