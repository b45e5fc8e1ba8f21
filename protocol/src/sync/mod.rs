//! Connectivity-aware ledger synchronization.
//!
//! A device spends most of its life offline — that is the whole premise.
//! This module is the bridge back to the online world: a [`ConnectivityProbe`]
//! that answers "can we even try?", and a [`SyncAgent`] that pushes confirmed
//! records to the shared ledger with retries, capped exponential backoff, and
//! cooperative cancellation. Nothing in here ever blocks a confirmation:
//! records are confirmed locally first and synced whenever the network
//! deigns to exist.

mod agent;
mod probe;

pub use agent::{
    DrainReport, LedgerClient, LedgerError, SyncAgent, SyncConfig, SyncError,
};
pub use probe::{ConnectivityProbe, StaticProbe, TcpProbe};
