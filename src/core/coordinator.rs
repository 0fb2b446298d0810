//! Transaction coordination
//!
//! The `TransactionCoordinator` hands out at most one transaction lease at a
//! time, system-wide. Every money movement (coin in, voucher out, game win,
//! host transfer) runs under a lease, so two movements can never interleave.
//!
//! # Contention
//!
//! There is no queue. A caller that asks while a lease is outstanding gets
//! `CoordinationError::AlreadyActive` straight away and owns its own retry and
//! backoff policy.
//!
//! # Expiry
//!
//! By default a lease lives until its holder releases it. A coordinator built
//! with [`TransactionCoordinator::with_timeout`] instead treats a lease older
//! than the timeout as abandoned and clears it on the next query or request.

use crate::core::traits::TransactionCoordination;
use crate::types::{CoordinationError, LeaseId};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy)]
struct ActiveLease {
    id: LeaseId,
    acquired_at: Instant,
}

/// Single-slot lease coordinator
///
/// The slot is guarded by its own mutex, independent of any ledger lock, so
/// lease traffic never contends with balance queries.
#[derive(Debug, Default)]
pub struct TransactionCoordinator {
    slot: Mutex<Option<ActiveLease>>,
    timeout: Option<Duration>,
}

impl TransactionCoordinator {
    /// Create a coordinator whose leases never expire
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a coordinator that expires leases held longer than `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            slot: Mutex::new(None),
            timeout: Some(timeout),
        }
    }

    /// The outstanding lease, if any
    pub fn current_lease(&self) -> Option<LeaseId> {
        let mut slot = self.slot.lock();
        self.expire_stale(&mut slot);
        slot.map(|lease| lease.id)
    }

    /// Clear an expired lease in place
    fn expire_stale(&self, slot: &mut Option<ActiveLease>) {
        let (Some(timeout), Some(lease)) = (self.timeout, *slot) else {
            return;
        };

        let held = lease.acquired_at.elapsed();
        if held >= timeout {
            tracing::warn!(
                lease = %lease.id,
                held_ms = held.as_millis() as u64,
                "transaction lease expired"
            );
            *slot = None;
        }
    }
}

impl TransactionCoordination for TransactionCoordinator {
    fn is_transaction_active(&self) -> bool {
        self.current_lease().is_some()
    }

    fn request_lease(&self) -> Result<LeaseId, CoordinationError> {
        let mut slot = self.slot.lock();
        self.expire_stale(&mut slot);

        if slot.is_some() {
            tracing::trace!("lease requested while a transaction is active");
            return Err(CoordinationError::AlreadyActive);
        }

        let id = LeaseId::new();
        *slot = Some(ActiveLease {
            id,
            acquired_at: Instant::now(),
        });

        tracing::debug!(lease = %id, "transaction lease acquired");
        Ok(id)
    }

    fn verify_current_transaction(&self, lease: LeaseId) -> bool {
        self.current_lease() == Some(lease)
    }

    fn release_lease(&self, lease: LeaseId) {
        let mut slot = self.slot.lock();

        match *slot {
            Some(active) if active.id == lease => {
                *slot = None;
                tracing::debug!(%lease, "transaction lease released");
            }
            _ => {
                tracing::debug!(%lease, "ignoring release of a lease that is not active");
            }
        }
    }
}
