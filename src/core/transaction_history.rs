//! Transaction history for host acknowledgement tracking
//!
//! This module provides `InMemoryTransactionHistory`, the append-only audit
//! trail protocol layers write to after each committed money movement. Hosts
//! later acknowledge entries ("the host has seen this voucher"), and the
//! protocol layer asks which entries are still outstanding.
//!
//! # Ordering
//!
//! Sequence numbers come from an atomic counter, so they are unique and
//! strictly increasing in append order. Listings are sorted by sequence.
//!
//! # Immutability
//!
//! Records are never modified or removed. The only mutable state per entry is
//! the acknowledgement flag, and it only ever goes from false to true.

use crate::core::traits::TransactionHistory;
use crate::types::{HistoryEntry, HistoryError, SequenceNumber, TransactionRecord};
use dashmap::DashMap;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};

/// Concurrent in-memory audit trail
#[derive(Debug, Default)]
pub struct InMemoryTransactionHistory {
    /// Entries keyed by sequence number
    entries: DashMap<SequenceNumber, HistoryEntry>,

    /// Last sequence number handed out
    last_sequence: AtomicU64,
}

impl InMemoryTransactionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sorted(&self, filter: impl Fn(&HistoryEntry) -> bool) -> Vec<HistoryEntry> {
        let mut entries: Vec<HistoryEntry> = self
            .entries
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by_key(|entry| entry.sequence);
        entries
    }
}

impl TransactionHistory for InMemoryTransactionHistory {
    fn append(&self, record: TransactionRecord) -> SequenceNumber {
        let sequence = self.last_sequence.fetch_add(1, Ordering::SeqCst) + 1;

        tracing::debug!(
            sequence,
            kind = record.kind.as_str(),
            account = %record.account,
            amount = record.amount,
            lease = %record.lease,
            "recorded transaction"
        );

        self.entries.insert(
            sequence,
            HistoryEntry {
                sequence,
                record,
                acknowledged: false,
            },
        );
        sequence
    }

    fn get(&self, sequence: SequenceNumber) -> Option<HistoryEntry> {
        self.entries.get(&sequence).map(|entry| entry.value().clone())
    }

    fn acknowledge(&self, sequence: SequenceNumber) -> Result<(), HistoryError> {
        let mut entry = self
            .entries
            .get_mut(&sequence)
            .ok_or(HistoryError::RecordNotFound { sequence })?;

        if entry.acknowledged {
            return Err(HistoryError::AlreadyAcknowledged { sequence });
        }
        entry.acknowledged = true;
        Ok(())
    }

    fn unacknowledged(&self) -> Vec<HistoryEntry> {
        self.sorted(|entry| !entry.acknowledged)
    }

    fn records(&self) -> Vec<HistoryEntry> {
        self.sorted(|_| true)
    }
}

/// Write history entries as CSV
///
/// Columns: sequence, kind, account, amount, lease, timestamp, acknowledged.
/// Entries are written in the order given.
pub fn write_history_csv(entries: &[HistoryEntry], output: &mut dyn Write) -> Result<(), csv::Error> {
    let mut writer = csv::Writer::from_writer(output);

    writer.write_record([
        "sequence",
        "kind",
        "account",
        "amount",
        "lease",
        "timestamp",
        "acknowledged",
    ])?;

    for entry in entries {
        writer.write_record(&[
            entry.sequence.to_string(),
            entry.record.kind.as_str().to_string(),
            entry.record.account.to_string(),
            entry.record.amount.to_string(),
            entry.record.lease.to_string(),
            entry.record.timestamp.to_rfc3339(),
            entry.acknowledged.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Account, LeaseId, TransactionKind};
    use std::sync::Arc;
    use std::thread;

    fn record(kind: TransactionKind, amount: i64) -> TransactionRecord {
        TransactionRecord::new(kind, Account::Cashable, amount, LeaseId::new())
    }

    #[test]
    fn test_append_assigns_increasing_sequence_numbers() {
        let history = InMemoryTransactionHistory::new();

        let first = history.append(record(TransactionKind::CoinIn, 25));
        let second = history.append(record(TransactionKind::VoucherOut, 25));

        assert_eq!(first, 1);
        assert_eq!(second, 2);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_get_returns_stored_record() {
        let history = InMemoryTransactionHistory::new();
        let stored = record(TransactionKind::BillIn, 2000);

        let sequence = history.append(stored.clone());

        let entry = history.get(sequence).unwrap();
        assert_eq!(entry.sequence, sequence);
        assert_eq!(entry.record, stored);
        assert!(!entry.acknowledged);
        assert!(history.get(99).is_none());
    }

    #[test]
    fn test_acknowledge_marks_entry() {
        let history = InMemoryTransactionHistory::new();
        let sequence = history.append(record(TransactionKind::VoucherOut, 500));

        history.acknowledge(sequence).unwrap();

        assert!(history.get(sequence).unwrap().acknowledged);
    }

    #[test]
    fn test_acknowledge_twice_fails() {
        let history = InMemoryTransactionHistory::new();
        let sequence = history.append(record(TransactionKind::Handpay, 500));
        history.acknowledge(sequence).unwrap();

        assert_eq!(
            history.acknowledge(sequence),
            Err(HistoryError::AlreadyAcknowledged { sequence })
        );
    }

    #[test]
    fn test_acknowledge_unknown_fails() {
        let history = InMemoryTransactionHistory::new();
        assert_eq!(
            history.acknowledge(7),
            Err(HistoryError::RecordNotFound { sequence: 7 })
        );
    }

    #[test]
    fn test_unacknowledged_lists_outstanding_in_order() {
        let history = InMemoryTransactionHistory::new();
        let a = history.append(record(TransactionKind::VoucherOut, 100));
        let b = history.append(record(TransactionKind::VoucherOut, 200));
        let c = history.append(record(TransactionKind::VoucherOut, 300));

        history.acknowledge(b).unwrap();

        let outstanding: Vec<_> = history
            .unacknowledged()
            .iter()
            .map(|entry| entry.sequence)
            .collect();
        assert_eq!(outstanding, vec![a, c]);
        assert_eq!(history.records().len(), 3);
    }

    #[test]
    fn test_concurrent_appends_get_unique_sequences() {
        let history = Arc::new(InMemoryTransactionHistory::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let history = Arc::clone(&history);
                thread::spawn(move || {
                    for _ in 0..50 {
                        history.append(record(TransactionKind::CoinIn, 5));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let sequences: Vec<_> = history.records().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, (1..=400).collect::<Vec<_>>());
    }

    #[test]
    fn test_write_history_csv() {
        let history = InMemoryTransactionHistory::new();
        let sequence = history.append(record(TransactionKind::CoinIn, 25));
        history.acknowledge(sequence).unwrap();

        let mut output = Vec::new();
        write_history_csv(&history.records(), &mut output).unwrap();

        let text = String::from_utf8(output).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("sequence,kind,account,amount,lease,timestamp,acknowledged")
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("1,coin_in,Cashable,25,"));
        assert!(row.ends_with(",true"));
    }
}
