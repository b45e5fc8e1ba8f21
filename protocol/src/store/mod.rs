//! # Local Record Storage
//!
//! Durable, device-local storage for transfer records, and the one place
//! the monotonicity invariant is enforced against whatever a caller throws
//! at it — including a stale copy of a record scanned off another device.

pub mod db;

pub use db::{RecordStore, StoreError, StoreResult};
