//! Reachability probing.
//!
//! The probe answers one question — "is the ledger endpoint reachable right
//! now?" — and answers it fail-closed: any timeout, refusal, or resolution
//! failure means *unreachable*. A false negative costs one backoff cycle; a
//! false positive costs a doomed push attempt against a dead endpoint.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::config::PROBE_TIMEOUT;

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Answers whether the ledger endpoint looks reachable.
///
/// Implementations must never hang: callers treat a probe as a quick gate in
/// front of a much more expensive push, so a probe that takes longer than a
/// few seconds has defeated its own purpose.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// `true` if a sync attempt is worth making right now.
    async fn is_reachable(&self) -> bool;
}

// ---------------------------------------------------------------------------
// TCP probe
// ---------------------------------------------------------------------------

/// Probes reachability by opening (and immediately dropping) a TCP
/// connection to the ledger endpoint.
///
/// A successful handshake within the timeout counts as reachable; everything
/// else — refused, timed out, unresolvable — counts as unreachable.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    addr: String,
    timeout: Duration,
}

impl TcpProbe {
    /// A probe against `addr` (a `host:port` string) with the default
    /// timeout.
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: PROBE_TIMEOUT,
        }
    }

    /// Override the probe timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl ConnectivityProbe for TcpProbe {
    async fn is_reachable(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                tracing::debug!(addr = %self.addr, error = %e, "probe: connect failed");
                false
            }
            Err(_) => {
                tracing::debug!(addr = %self.addr, timeout = ?self.timeout, "probe: timed out");
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Static probe
// ---------------------------------------------------------------------------

/// A probe with a manually controlled answer. Lets tests (and demos) flip a
/// device between "offline" and "online" without touching a real socket.
#[derive(Debug, Default)]
pub struct StaticProbe {
    reachable: AtomicBool,
}

impl StaticProbe {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
        }
    }

    /// Flip the simulated connectivity state.
    pub fn set(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
