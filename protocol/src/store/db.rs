//! # RecordStore — Persistent Local Storage
//!
//! The persistence layer for one device, built on sled's embedded key-value
//! store. All on-disk data flows through this module.
//!
//! ## Tree Layout
//!
//! sled organizes data into named "trees" (analogous to column families in
//! RocksDB or tables in SQL). Each tree is an independent B+ tree with its
//! own keyspace:
//!
//! | Tree          | Key                  | Value                      |
//! |---------------|----------------------|----------------------------|
//! | `records`     | `record.id` (UTF-8)  | `bincode(TransferRecord)`  |
//! | `signer_keys` | `record.id` (UTF-8)  | signer public key (32B)    |
//! | `sync_queue`  | `record.id` (UTF-8)  | enqueue time (8B BE)       |
//!
//! The `signer_keys` tree remembers which public key vouches for a record —
//! the key arrives inside the QR payload and the ledger push wants the pair
//! back, possibly after a restart.
//!
//! The `sync_queue` tree holds ids of locally-confirmed records whose ledger
//! push hasn't succeeded yet. Keeping it on disk means a device restart
//! cannot lose the intent to sync — "confirmed implies persisted" extends
//! to the sync queue.
//!
//! ## Merge Semantics
//!
//! `upsert` never blindly overwrites. When a record with the same id already
//! exists, the signed scalar fields are required to match (they are immutable
//! by invariant — a same-id record with different signed fields is rejected,
//! not merged), the two verification flags combine with logical OR, and
//! `verification_timestamp` keeps the earliest non-null value. This makes
//! `upsert` safe to call redundantly, and makes the store the component
//! enforcing monotonicity even when a caller supplies a stale copy.
//!
//! ## Observation
//!
//! Every merge that changes state is published on a broadcast channel.
//! Display-side observers subscribe instead of polling on a timer; a slow
//! subscriber that overflows the channel re-reads the store.

use sled::{Db, Tree};
use std::path::Path;
use tokio::sync::broadcast;

use crate::config::STORE_EVENT_CAPACITY;
use crate::crypto::DevicePublicKey;
use crate::record::{RecordStatus, TransferRecord};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors from store operations.
///
/// Unlike sync failures, these are hard failures: a write that didn't land
/// must surface immediately, or "confirmed implies persisted" breaks.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    /// An upsert presented a record whose signed fields differ from the
    /// stored record with the same id. Signed fields are immutable; this is
    /// either a bug or a forgery, and silently merging it would be worse
    /// than refusing.
    #[error("record {id}: signed fields differ from the stored record")]
    SignedFieldMismatch { id: String },
}

pub type StoreResult<T> = Result<T, StoreError>;

// ---------------------------------------------------------------------------
// RecordStore
// ---------------------------------------------------------------------------

/// Persistent record storage for one device.
///
/// Wraps a sled `Db` and exposes typed accessors for records and the
/// pending-sync queue. Values are bincode for compactness and speed.
///
/// # Thread Safety
///
/// sled trees support lock-free concurrent reads and serialized writes, so
/// `RecordStore` can be shared via `Arc` or cloned freely. The protocol
/// itself runs a single logical actor per device (spec'd concurrency is
/// *cross*-device), so `upsert`'s read-merge-write needs no further
/// coordination here.
#[derive(Debug, Clone)]
pub struct RecordStore {
    /// The underlying sled database handle.
    db: Db,
    /// Records indexed by id.
    records: Tree,
    /// Signer public keys indexed by record id.
    signer_keys: Tree,
    /// Ids of records awaiting a successful ledger push.
    sync_queue: Tree,
    /// Fan-out of merged records to observers.
    events: broadcast::Sender<TransferRecord>,
}

impl RecordStore {
    /// Open or create a store at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary store that lives in memory and is cleaned up when
    /// dropped. Ideal for tests — no filesystem side effects.
    pub fn open_temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> StoreResult<Self> {
        let records = db.open_tree("records")?;
        let signer_keys = db.open_tree("signer_keys")?;
        let sync_queue = db.open_tree("sync_queue")?;
        let (events, _) = broadcast::channel(STORE_EVENT_CAPACITY);
        Ok(Self {
            db,
            records,
            signer_keys,
            sync_queue,
            events,
        })
    }

    // -- Record operations --------------------------------------------------

    /// Insert or merge a record, enforcing the monotonicity invariant.
    ///
    /// Returns the record as stored after the merge. Publishing to
    /// subscribers happens only when the stored state actually changed, so
    /// redundant upserts are silent as well as harmless.
    pub fn upsert(&self, record: &TransferRecord) -> StoreResult<TransferRecord> {
        let existing = self.get(&record.id)?;
        let merged = match &existing {
            None => record.clone(),
            Some(stored) => {
                if !stored.signed_fields_match(record) {
                    return Err(StoreError::SignedFieldMismatch {
                        id: record.id.clone(),
                    });
                }
                Self::merge(stored, record)
            }
        };

        let changed = existing.as_ref() != Some(&merged);
        if changed {
            let bytes = bincode::serialize(&merged)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            self.records.insert(merged.id.as_bytes(), bytes)?;

            tracing::debug!(
                id = %merged.id,
                status = %merged.status(),
                "record merged"
            );
            // Nobody listening is fine; the store doesn't care.
            let _ = self.events.send(merged.clone());
        }

        Ok(merged)
    }

    /// Retrieve a record by id. Returns `None` if the id has never been seen
    /// on this device.
    pub fn get(&self, id: &str) -> StoreResult<Option<TransferRecord>> {
        match self.records.get(id.as_bytes())? {
            Some(bytes) => {
                let record: TransferRecord = bincode::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Combines two copies of the same logical record.
    ///
    /// Flags OR together (commutative, monotonic — the reason no distributed
    /// lock is needed anywhere in this protocol), and the earliest non-null
    /// verification timestamp wins.
    fn merge(existing: &TransferRecord, incoming: &TransferRecord) -> TransferRecord {
        let mut merged = existing.clone();
        merged.sender_verified = existing.sender_verified || incoming.sender_verified;
        merged.recipient_verified = existing.recipient_verified || incoming.recipient_verified;
        merged.verification_timestamp =
            match (existing.verification_timestamp, incoming.verification_timestamp) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        merged
    }

    /// Subscribe to merged-record events (push-on-write).
    ///
    /// Every upsert that changes stored state is delivered to every
    /// subscriber. A receiver that lags more than the channel capacity gets
    /// a `Lagged` error and should re-read the store — it will observe the
    /// latest monotonic state, which is all any observer is promised.
    pub fn subscribe(&self) -> broadcast::Receiver<TransferRecord> {
        self.events.subscribe()
    }

    // -- Signer key operations ----------------------------------------------

    /// Remember the public key that vouches for a record's signature.
    pub fn put_signer_key(&self, id: &str, key: &DevicePublicKey) -> StoreResult<()> {
        self.signer_keys.insert(id.as_bytes(), key.as_bytes())?;
        Ok(())
    }

    /// The signer public key recorded for a record, if any.
    pub fn signer_key(&self, id: &str) -> StoreResult<Option<DevicePublicKey>> {
        match self.signer_keys.get(id.as_bytes())? {
            Some(bytes) => {
                let key = DevicePublicKey::try_from_slice(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(key))
            }
            None => Ok(None),
        }
    }

    // -- Sync queue operations ----------------------------------------------

    /// Mark a record as awaiting a ledger push.
    pub fn enqueue_sync(&self, id: &str) -> StoreResult<()> {
        let now = chrono::Utc::now().timestamp_millis() as u64;
        self.sync_queue.insert(id.as_bytes(), &now.to_be_bytes())?;
        Ok(())
    }

    /// Clear a record from the pending-sync queue after a successful push.
    /// Clearing an id that isn't queued is a no-op.
    pub fn dequeue_sync(&self, id: &str) -> StoreResult<()> {
        self.sync_queue.remove(id.as_bytes())?;
        Ok(())
    }

    /// Returns `true` if the record still awaits a successful push.
    pub fn is_sync_pending(&self, id: &str) -> StoreResult<bool> {
        Ok(self.sync_queue.contains_key(id.as_bytes())?)
    }

    /// All record ids currently awaiting a ledger push.
    pub fn pending_sync(&self) -> StoreResult<Vec<String>> {
        let mut ids = Vec::new();
        for entry in self.sync_queue.iter() {
            let (key, _) = entry?;
            ids.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(ids)
    }

    // -- Utility operations -------------------------------------------------

    /// Number of records stored on this device.
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// Number of records in a given derived status. Linear scan — fine for
    /// a device-local store, revisit if someone puts a million transfers on
    /// a phone.
    pub fn count_by_status(&self, status: RecordStatus) -> StoreResult<usize> {
        let mut count = 0;
        for entry in self.records.iter() {
            let (_, bytes) = entry?;
            let record: TransferRecord = bincode::deserialize(&bytes)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            if record.status() == status {
                count += 1;
            }
        }
        Ok(count)
    }

    /// Force a flush of all pending writes to disk.
    ///
    /// sled buffers writes in memory; this blocks until data is durable.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
