// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # TESSERA Protocol — Core Library
//!
//! TESSERA moves value between two devices that may not share a network at
//! the moment it matters. One device builds and signs a transfer record,
//! hands it to the other inside a scannable payload, and both parties
//! confirm it cryptographically — offline. The remote ledger catches up
//! whenever connectivity does.
//!
//! The name is old: a *tessera hospitalis* was a token broken in two, one
//! half per party, rejoined later as proof of the agreement. Same idea,
//! fewer pottery shards.
//!
//! ## Architecture
//!
//! The library is split into modules that mirror the actual concerns of an
//! offline confirmation protocol:
//!
//! - **crypto** — Ed25519 keypairs and signatures. Don't roll your own.
//! - **record** — Record construction, canonical bytes, signing,
//!   verification, and the dual-flag confirmation state machine.
//! - **store** — Durable local storage with monotonic merge semantics.
//!   The single place where "flags never regress" is enforced.
//! - **codec** — The QR payload boundary: what actually crosses the air gap.
//! - **confirm** — Authorization-gated confirmation of a scanned record.
//! - **sync** — Connectivity probing and the deferred, retrying push to the
//!   remote ledger.
//! - **notify** — Best-effort outcome notification. Never on the hot path.
//! - **config** — Protocol constants and tuning knobs.
//!
//! ## Design Philosophy
//!
//! 1. Local confirmation and ledger durability are independent concerns.
//!    A dead network never rolls back a live confirmation.
//! 2. Verification flags only go one way. Ever.
//! 3. Signing, verification, and state transitions are pure and synchronous;
//!    only the probe and the ledger push are allowed to wait on the world.
//! 4. If it touches money, it has tests. Plural.

pub mod codec;
pub mod config;
pub mod confirm;
pub mod crypto;
pub mod notify;
pub mod record;
pub mod store;
pub mod sync;
