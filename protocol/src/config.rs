//! # Protocol Configuration & Constants
//!
//! Every magic number in TESSERA lives here. If you're hardcoding a constant
//! somewhere else, you're doing it wrong and you owe the team coffee.
//!
//! These values define the envelope a record travels in and the patience of
//! the sync machinery. Changing the wire-facing ones after devices are in
//! the field is somewhere between "difficult" and "career-ending."

use std::time::Duration;

// ---------------------------------------------------------------------------
// Wire Format
// ---------------------------------------------------------------------------

/// Payload format identifier embedded in encoded QR payloads. Lets a scanner
/// reject non-TESSERA codes (Wi-Fi credentials, restaurant menus, rickrolls)
/// before attempting to parse a record out of them.
pub const PAYLOAD_FORMAT: &str = "tessera/1";

/// Wire payload version. Bump on breaking changes to the QR JSON shape.
pub const PAYLOAD_VERSION: u16 = 1;

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 — deterministic signatures, 128-bit security, no k-value footguns.
pub const SIGNING_ALGORITHM: &str = "Ed25519";

/// Ed25519 secret keys are 32 bytes.
pub const SIGNING_KEY_LENGTH: usize = 32;

/// Public (verifying) key length in bytes.
pub const VERIFYING_KEY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes. If yours isn't, something
/// has gone terribly wrong.
pub const SIGNATURE_LENGTH: usize = 64;

// ---------------------------------------------------------------------------
// Record Limits
// ---------------------------------------------------------------------------

/// Maximum description length in bytes. Enough for a short memo, not enough
/// for your novel. Keeps QR payloads scannable — error-correction capacity
/// drops fast as the code gets denser.
pub const MAX_DESCRIPTION_LENGTH: usize = 512;

/// Maximum principal identifier length in bytes. Identity providers hand us
/// opaque strings; this caps how opaque they're allowed to be.
pub const MAX_PRINCIPAL_LENGTH: usize = 256;

/// Number of decimal places in an amount. Two, like the currencies people
/// actually hand each other across a counter.
pub const AMOUNT_DECIMALS: u32 = 2;

/// Largest representable amount in minor units (10^13, a hundred billion
/// major units). The wire carries amounts as JSON decimals, i.e. f64s;
/// every value up to this bound sits comfortably inside f64's 2^53 integer
/// range, so the decimal form round-trips to the exact same minor count on
/// the other side.
pub const MAX_AMOUNT_MINOR: u64 = 10_u64.pow(13);

// ---------------------------------------------------------------------------
// Connectivity & Sync
// ---------------------------------------------------------------------------

/// How long the connectivity probe waits for the ledger endpoint before
/// declaring it unreachable. Fail-closed: a slow answer is a "no".
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// First retry delay after a failed ledger push.
pub const SYNC_INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Ceiling on the exponential backoff between push attempts. Past this,
/// waiting longer doesn't make the network more reachable.
pub const SYNC_MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Default number of push attempts before a sync is surfaced as unreachable.
/// The record stays valid locally either way — this only bounds how long a
/// single sync call will nag the network.
pub const SYNC_MAX_ATTEMPTS: u32 = 5;

/// Per-push timeout. A ledger that takes longer than this to acknowledge a
/// single record is treated as a failed attempt, not waited on forever.
pub const LEDGER_PUSH_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Capacity of the store's broadcast channel for merge events. Large enough
/// to absorb a burst of confirmations without dropping updates for a lagging
/// observer; a display-side subscriber that falls further behind than this
/// re-reads the store instead.
pub const STORE_EVENT_CAPACITY: usize = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crypto_parameter_sizes() {
        assert_eq!(SIGNING_KEY_LENGTH, 32);
        assert_eq!(VERIFYING_KEY_LENGTH, 32);
        assert_eq!(SIGNATURE_LENGTH, 64);
    }

    #[test]
    fn backoff_bounds_are_ordered() {
        // If the ceiling is below the floor, the backoff loop degenerates
        // into a fixed-interval hammer. Stranger things have shipped.
        assert!(SYNC_INITIAL_BACKOFF < SYNC_MAX_BACKOFF);
        assert!(SYNC_MAX_ATTEMPTS > 0);
    }

    #[test]
    fn probe_is_faster_than_push() {
        // The probe exists to avoid a doomed push; it must give up sooner
        // than the push itself would.
        assert!(PROBE_TIMEOUT < LEDGER_PUSH_TIMEOUT);
    }

    #[test]
    fn amount_limits_sane() {
        assert_eq!(AMOUNT_DECIMALS, 2);
        assert!(MAX_AMOUNT_MINOR > 1_000_000_000);
        // Scaled amounts must stay inside f64's exact-integer range or the
        // JSON wire form silently changes the value.
        assert!(MAX_AMOUNT_MINOR < (1_u64 << 53));
    }
}
