//! Convergence poller for in-flight credentials.
//!
//! A single task owns the tracked set and the backoff state. It waits,
//! queries the status source for every pending credential, reports changes
//! and repeats until nothing is pending or a query fails. Control requests
//! from [`PollingHandle`] are applied on that task, including while a query
//! is in flight.
//!
//! ```text
//! start ─► Polling ⇄ Paused
//!             │         │
//!             ▼         ▼
//!   Completed | Failed | Cancelled
//! ```

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tinklink_core::{Credential, CredentialId, CredentialStatusSource};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::backoff::BackoffState;
use crate::classifier;
use crate::config::{ConfigError, PollerConfig};
use crate::error::{PollError, Result};

/// Lifecycle of a started poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Polling,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl PollerState {
    /// True once the batch result has been sent.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy)]
enum Control {
    Pause,
    Resume,
}

/// Tracks a batch of credentials until each reaches a terminal status.
pub struct CredentialStatusPoller {
    source: Arc<dyn CredentialStatusSource>,
    credentials: Vec<Credential>,
    config: PollerConfig,
}

impl CredentialStatusPoller {
    /// Fails with the error from [`PollerConfig::validate`]. Only the first
    /// snapshot of a repeated credential id is tracked.
    pub fn new(
        source: Arc<dyn CredentialStatusSource>,
        credentials: Vec<Credential>,
        config: PollerConfig,
    ) -> std::result::Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            source,
            credentials: first_per_id(credentials),
            config,
        })
    }

    /// Spawn the polling task on the current Tokio runtime.
    ///
    /// Credentials that are not manually updatable are reported on the
    /// updates stream before any query and are not part of the batch result.
    pub fn start(self) -> PollingTask {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (result_tx, result_rx) = oneshot::channel();
        let (state_tx, state_rx) = watch::channel(PollerState::Polling);
        let cancel = CancellationToken::new();

        let span = tracing::info_span!("credential_poller", credentials = self.credentials.len());
        let mut worker = PollWorker {
            source: self.source,
            pending: self.credentials,
            converged: Vec::new(),
            backoff: self.config.backoff.state(),
            paused: false,
            cycle: 0,
            control_rx,
            control_open: true,
            cancel: cancel.clone(),
            updates_tx,
            state_tx,
        };

        tokio::spawn(
            async move {
                let result = worker.run().await;
                worker.finish(&result);
                // Close the updates stream before the batch result is visible.
                drop(worker);
                let _ = result_tx.send(result);
            }
            .instrument(span),
        );

        PollingTask {
            handle: PollingHandle {
                control_tx,
                cancel,
                state_rx,
            },
            updates: CredentialUpdates { rx: updates_rx },
            completion: BatchCompletion { rx: result_rx },
        }
    }
}

/// The three independently usable outputs of a started poller.
pub struct PollingTask {
    pub handle: PollingHandle,
    pub updates: CredentialUpdates,
    pub completion: BatchCompletion,
}

/// Control surface of a running poller. Cloneable; calls after the poller
/// reached a terminal state are no-ops.
#[derive(Debug, Clone)]
pub struct PollingHandle {
    control_tx: mpsc::UnboundedSender<Control>,
    cancel: CancellationToken,
    state_rx: watch::Receiver<PollerState>,
}

impl PollingHandle {
    /// Stop scheduling new queries and reset the interval to its base value.
    ///
    /// A query already scheduled or in flight still runs and its result is
    /// applied.
    pub fn pause(&self) {
        let _ = self.control_tx.send(Control::Pause);
    }

    /// Re-enter polling after [`PollingHandle::pause`]. No-op otherwise.
    pub fn resume(&self) {
        let _ = self.control_tx.send(Control::Resume);
    }

    /// Stop immediately and discard any in-flight query. The batch result
    /// becomes [`PollError::Cancelled`].
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn state(&self) -> PollerState {
        *self.state_rx.borrow()
    }

    pub fn state_changes(&self) -> watch::Receiver<PollerState> {
        self.state_rx.clone()
    }
}

/// Per-credential status reports, at most one per distinct
/// `(status, status_updated)` pair of a credential.
#[derive(Debug)]
pub struct CredentialUpdates {
    rx: mpsc::UnboundedReceiver<Credential>,
}

impl CredentialUpdates {
    /// Next reported credential, or `None` once the poller has finished and
    /// every report was received.
    pub async fn recv(&mut self) -> Option<Credential> {
        self.rx.recv().await
    }
}

/// Resolves exactly once with the credentials that reached a terminal
/// status, or with the error that ended the batch.
#[derive(Debug)]
pub struct BatchCompletion {
    rx: oneshot::Receiver<Result<Vec<Credential>>>,
}

impl Future for BatchCompletion {
    type Output = Result<Vec<Credential>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(PollError::Terminated)))
    }
}

struct PollWorker {
    source: Arc<dyn CredentialStatusSource>,
    pending: Vec<Credential>,
    converged: Vec<Credential>,
    backoff: BackoffState,
    paused: bool,
    cycle: u32,
    control_rx: mpsc::UnboundedReceiver<Control>,
    /// False once every handle is gone
    control_open: bool,
    cancel: CancellationToken,
    updates_tx: mpsc::UnboundedSender<Credential>,
    state_tx: watch::Sender<PollerState>,
}

impl PollWorker {
    async fn run(&mut self) -> Result<Vec<Credential>> {
        let mut delay = self.backoff.current();
        loop {
            self.resolve_non_updatable();
            if self.pending.is_empty() {
                return Ok(std::mem::take(&mut self.converged));
            }

            self.sleep(delay).await?;
            let fetched = self.fetch().await?;
            self.apply(fetched)?;

            if self.pending.is_empty() {
                return Ok(std::mem::take(&mut self.converged));
            }

            if self.paused {
                tracing::debug!(pending = self.pending.len(), "paused, not scheduling a retry");
                self.wait_for_resume().await?;
                delay = self.backoff.current();
            } else {
                delay = self.backoff.schedule_retry();
            }
        }
    }

    /// Report and drop credentials that polling can never move.
    fn resolve_non_updatable(&mut self) {
        let (updatable, fixed): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|credential| credential.is_manually_updatable);
        self.pending = updatable;

        for credential in fixed {
            tracing::debug!(
                id = %credential.id,
                status = %credential.status,
                "credential is not manually updatable"
            );
            self.report(credential);
        }
    }

    async fn sleep(&mut self, delay: Duration) -> Result<()> {
        tracing::debug!(
            cycle = self.cycle + 1,
            pending = self.pending.len(),
            "next status query in {delay:?}"
        );
        let sleep = tokio::time::sleep(delay);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PollError::Cancelled),
                control = self.control_rx.recv(), if self.control_open => self.on_control(control),
                _ = &mut sleep => return Ok(()),
            }
        }
    }

    async fn fetch(&mut self) -> Result<Vec<Credential>> {
        self.cycle += 1;
        let ids: Vec<CredentialId> = self.pending.iter().map(|c| c.id.clone()).collect();
        let source = Arc::clone(&self.source);
        let fetch = source.fetch_statuses(&ids);
        tokio::pin!(fetch);

        loop {
            // Control requests queued before the response are applied first.
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PollError::Cancelled),
                control = self.control_rx.recv(), if self.control_open => self.on_control(control),
                fetched = &mut fetch => {
                    return fetched.map_err(|err| {
                        tracing::warn!(cycle = self.cycle, "status query failed: {err}");
                        PollError::from(err)
                    });
                }
            }
        }
    }

    fn apply(&mut self, fetched: Vec<Credential>) -> Result<()> {
        let pending = std::mem::take(&mut self.pending);
        let reconciled = classifier::reconcile(pending, fetched).inspect_err(|err| {
            tracing::error!(cycle = self.cycle, "{err}");
        })?;

        for credential in reconciled.changed {
            tracing::debug!(
                id = %credential.id,
                status = %credential.status,
                "credential status changed"
            );
            self.report(credential);
        }
        // Already reported above; polling can no longer move these.
        self.pending = reconciled
            .pending
            .into_iter()
            .filter(|credential| credential.is_manually_updatable)
            .collect();
        self.converged.extend(reconciled.converged);

        tracing::debug!(
            cycle = self.cycle,
            pending = self.pending.len(),
            converged = self.converged.len(),
            "applied status query"
        );
        Ok(())
    }

    async fn wait_for_resume(&mut self) -> Result<()> {
        while self.paused {
            if !self.control_open {
                tracing::info!("all polling handles dropped while paused");
                return Err(PollError::Cancelled);
            }
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(PollError::Cancelled),
                control = self.control_rx.recv() => self.on_control(control),
            }
        }
        Ok(())
    }

    fn on_control(&mut self, control: Option<Control>) {
        match control {
            Some(Control::Pause) if !self.paused => {
                self.paused = true;
                self.backoff.reset();
                self.state_tx.send_replace(PollerState::Paused);
                tracing::info!(pending = self.pending.len(), "polling paused");
            }
            Some(Control::Resume) if self.paused => {
                self.paused = false;
                self.state_tx.send_replace(PollerState::Polling);
                tracing::info!(pending = self.pending.len(), "polling resumed");
            }
            Some(control) => tracing::debug!("ignoring redundant {control:?}"),
            None => self.control_open = false,
        }
    }

    fn report(&self, credential: Credential) {
        let _ = self.updates_tx.send(credential);
    }

    fn finish(&self, result: &Result<Vec<Credential>>) {
        let state = match result {
            Ok(converged) => {
                tracing::info!(
                    cycles = self.cycle,
                    converged = converged.len(),
                    "credentials converged"
                );
                PollerState::Completed
            }
            Err(PollError::Cancelled) => {
                tracing::info!(cycles = self.cycle, "polling cancelled");
                PollerState::Cancelled
            }
            Err(err) => {
                tracing::warn!(cycles = self.cycle, "polling failed: {err}");
                PollerState::Failed
            }
        };
        self.state_tx.send_replace(state);
    }
}

fn first_per_id(credentials: Vec<Credential>) -> Vec<Credential> {
    let mut seen = HashSet::new();
    credentials
        .into_iter()
        .filter(|credential| {
            let first = seen.insert(credential.id.clone());
            if !first {
                tracing::warn!(id = %credential.id, "ignoring duplicate credential");
            }
            first
        })
        .collect()
}
