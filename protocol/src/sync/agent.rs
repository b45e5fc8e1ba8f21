//! The sync agent: retries, backoff, cancellation.
//!
//! Confirmation is local and immediate; the ledger push is eventual. The
//! agent owns that gap. Every confirmed record lands in the store's durable
//! sync queue *before* the first push attempt, so a crash mid-retry loses
//! nothing — the queue is drained again on the next run.
//!
//! The retry policy is deliberately boring: probe, push, and on failure
//! sleep an exponentially growing interval (capped) before trying again.
//! After the attempt budget is spent the agent gives up and leaves the
//! record queued; "unreachable" is a status report, not a verdict.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::watch;

use crate::config::{
    LEDGER_PUSH_TIMEOUT, SYNC_INITIAL_BACKOFF, SYNC_MAX_ATTEMPTS, SYNC_MAX_BACKOFF,
};
use crate::crypto::DevicePublicKey;
use crate::record::TransferRecord;
use crate::store::{RecordStore, StoreError};
use crate::sync::ConnectivityProbe;

// ---------------------------------------------------------------------------
// Ledger client
// ---------------------------------------------------------------------------

/// Errors a ledger push can come back with.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The ledger understood the request and said no. Retrying the same
    /// record will not change its mind.
    #[error("ledger rejected record: {0}")]
    Rejected(String),

    /// The request never got a usable answer. Worth retrying.
    #[error("transport failure: {0}")]
    Transport(String),
}

/// The upstream shared ledger, reduced to the one call this protocol needs:
/// deliver a record together with the public key that vouches for it.
///
/// Implementations must be idempotent per record id — the agent will happily
/// re-push a record it already delivered if a crash ate the acknowledgement.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn push(
        &self,
        record: &TransferRecord,
        public_key: &DevicePublicKey,
    ) -> Result<(), LedgerError>;
}

// ---------------------------------------------------------------------------
// Configuration & errors
// ---------------------------------------------------------------------------

/// Retry policy knobs. [`Default`] matches the production constants in
/// [`crate::config`].
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Total push attempts per `sync` call (the first try included).
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles each retry.
    pub initial_backoff: Duration,
    /// Ceiling for the doubled backoff.
    pub max_backoff: Duration,
    /// How long a single push may take before it counts as failed.
    pub push_timeout: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_attempts: SYNC_MAX_ATTEMPTS,
            initial_backoff: SYNC_INITIAL_BACKOFF,
            max_backoff: SYNC_MAX_BACKOFF,
            push_timeout: LEDGER_PUSH_TIMEOUT,
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    /// The attempt budget is spent and the record is still undelivered. It
    /// remains in the sync queue for a later drain.
    #[error("ledger unreachable after {attempts} attempts (last: {last_error})")]
    Unreachable { attempts: u32, last_error: String },

    /// The ledger refused the record outright. The record is removed from
    /// the sync queue — re-sending identical bytes cannot succeed.
    #[error("ledger rejected record {id}: {reason}")]
    Rejected { id: String, reason: String },

    /// The caller pulled the plug mid-retry. The record stays queued.
    #[error("sync cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Outcome summary of a [`SyncAgent::drain_pending`] pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
    /// Records delivered and dequeued this pass.
    pub pushed: usize,
    /// Queue entries with no stored record or signer key. Left queued.
    pub skipped: usize,
    /// Records that exhausted their attempts or were rejected.
    pub failed: usize,
}

// ---------------------------------------------------------------------------
// Agent
// ---------------------------------------------------------------------------

/// Pushes confirmed records to the shared ledger, eventually.
pub struct SyncAgent {
    probe: Arc<dyn ConnectivityProbe>,
    ledger: Arc<dyn LedgerClient>,
    store: RecordStore,
    config: SyncConfig,
}

impl SyncAgent {
    pub fn new(
        probe: Arc<dyn ConnectivityProbe>,
        ledger: Arc<dyn LedgerClient>,
        store: RecordStore,
    ) -> Self {
        Self {
            probe,
            ledger,
            store,
            config: SyncConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Sync a single record without external cancellation.
    pub async fn sync_record(
        &self,
        record: &TransferRecord,
        public_key: &DevicePublicKey,
    ) -> Result<(), SyncError> {
        // Keep the sender alive for the duration so the receiver never
        // observes a closed channel.
        let (tx, rx) = watch::channel(false);
        let result = self.sync_with_cancel(record, public_key, rx).await;
        drop(tx);
        result
    }

    /// Sync a single record, bailing out promptly if `cancel` flips to
    /// `true`. Cancellation leaves the record in the durable queue.
    pub async fn sync_with_cancel(
        &self,
        record: &TransferRecord,
        public_key: &DevicePublicKey,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<(), SyncError> {
        // Durability first: queue before the first attempt so a crash
        // anywhere below is recoverable.
        self.store.enqueue_sync(&record.id)?;
        self.store.put_signer_key(&record.id, public_key)?;

        let mut backoff = self.config.initial_backoff;
        let mut last_error = String::from("no attempt made");

        for attempt in 1..=self.config.max_attempts {
            if *cancel.borrow() {
                return Err(SyncError::Cancelled);
            }
            if attempt > 1 {
                tokio::select! {
                    _ = tokio::time::sleep(backoff) => {}
                    _ = cancelled(&mut cancel) => return Err(SyncError::Cancelled),
                }
                backoff = std::cmp::min(backoff * 2, self.config.max_backoff);
            }

            if !self.probe.is_reachable().await {
                last_error = String::from("endpoint unreachable");
                tracing::debug!(id = %record.id, attempt, "sync: probe says offline");
                continue;
            }

            match tokio::time::timeout(
                self.config.push_timeout,
                self.ledger.push(record, public_key),
            )
            .await
            {
                Ok(Ok(())) => {
                    self.store.dequeue_sync(&record.id)?;
                    tracing::info!(id = %record.id, attempt, "sync: record delivered");
                    return Ok(());
                }
                Ok(Err(LedgerError::Rejected(reason))) => {
                    self.store.dequeue_sync(&record.id)?;
                    tracing::warn!(id = %record.id, %reason, "sync: ledger rejected record");
                    return Err(SyncError::Rejected {
                        id: record.id.clone(),
                        reason,
                    });
                }
                Ok(Err(e @ LedgerError::Transport(_))) => {
                    last_error = e.to_string();
                    tracing::warn!(id = %record.id, attempt, error = %last_error, "sync: push failed");
                }
                Err(_) => {
                    last_error = String::from("push timed out");
                    tracing::warn!(id = %record.id, attempt, "sync: push timed out");
                }
            }
        }

        Err(SyncError::Unreachable {
            attempts: self.config.max_attempts,
            last_error,
        })
    }

    /// Drain everything in the durable sync queue.
    ///
    /// Queue entries whose record or signer key cannot be found are skipped
    /// (and left queued — they may be a symptom worth investigating, not
    /// something to silently discard). An `Unreachable` result aborts the
    /// pass early: if the ledger is down for one record, it is down for all
    /// of them, and the rest will still be queued next time.
    pub async fn drain_pending(
        &self,
        cancel: watch::Receiver<bool>,
    ) -> Result<DrainReport, SyncError> {
        let mut report = DrainReport::default();

        for id in self.store.pending_sync()? {
            let record = match self.store.get(&id)? {
                Some(record) => record,
                None => {
                    tracing::warn!(%id, "drain: queued id has no stored record, skipping");
                    report.skipped += 1;
                    continue;
                }
            };
            let key = match self.store.signer_key(&id)? {
                Some(key) => key,
                None => {
                    tracing::warn!(%id, "drain: queued record has no signer key, skipping");
                    report.skipped += 1;
                    continue;
                }
            };

            match self.sync_with_cancel(&record, &key, cancel.clone()).await {
                Ok(()) => report.pushed += 1,
                Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
                Err(SyncError::Store(e)) => return Err(SyncError::Store(e)),
                Err(SyncError::Rejected { id, reason }) => {
                    tracing::warn!(%id, %reason, "drain: record rejected");
                    report.failed += 1;
                }
                Err(SyncError::Unreachable { .. }) => {
                    report.failed += 1;
                    tracing::info!(
                        pushed = report.pushed,
                        "drain: ledger unreachable, stopping this pass"
                    );
                    break;
                }
            }
        }

        tracing::info!(
            pushed = report.pushed,
            skipped = report.skipped,
            failed = report.failed,
            "drain complete"
        );
        Ok(report)
    }
}

/// Resolves once the watch flag turns `true`; pends forever if the sender
/// goes away (a dropped sender means "nobody will ever cancel you").
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
