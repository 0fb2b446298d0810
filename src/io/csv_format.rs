//! CSV format handling for command scripts and balance output
//!
//! This module centralizes all CSV format concerns, providing:
//! - CommandCsvRecord structure for deserialization
//! - Conversion from CSV records to ledger commands
//! - Balance output serialization
//!
//! All functions are pure (no I/O beyond the given writer) for easy testing.

use crate::core::AccountBalances;
use crate::types::{Account, LedgerCommand, Operation, TransactionKind};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Write;

/// CSV record structure for deserialization
///
/// Matches the command script format with columns: caller, op, account,
/// amount, kind. Amounts are whole cents.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CommandCsvRecord {
    pub caller: String,
    pub op: String,
    pub account: String,
    pub amount: i64,
    pub kind: String,
}

/// Convert a CommandCsvRecord to a LedgerCommand
///
/// This function:
/// - Parses the operation ("deposit" or "withdraw", case insensitive)
/// - Parses the account name into one of the fixed buckets
/// - Parses the history kind ("coin_in", "voucher_out", ...)
/// - Rejects an empty caller name
///
/// Whether the kind fits the operation is left to the engine.
///
/// # Arguments
///
/// * `record` - The deserialized CSV record
///
/// # Returns
///
/// * `Ok(LedgerCommand)` - Successfully converted command
/// * `Err(String)` - Error message describing the conversion failure
pub fn convert_command_record(record: CommandCsvRecord) -> Result<LedgerCommand, String> {
    let caller = record.caller.trim();
    if caller.is_empty() {
        return Err("Command has an empty caller".to_string());
    }

    let operation = match record.op.trim().to_lowercase().as_str() {
        "deposit" => Operation::Deposit,
        "withdraw" => Operation::Withdraw,
        other => {
            return Err(format!(
                "Invalid operation '{}' for caller {}",
                other, caller
            ))
        }
    };

    let account: Account = record
        .account
        .trim()
        .parse()
        .map_err(|e| format!("{} for caller {}", e, caller))?;

    let kind = parse_kind(record.kind.trim())
        .ok_or_else(|| format!("Invalid kind '{}' for caller {}", record.kind.trim(), caller))?;

    Ok(LedgerCommand {
        caller: caller.to_string(),
        operation,
        account,
        amount: record.amount,
        kind,
    })
}

fn parse_kind(value: &str) -> Option<TransactionKind> {
    let kind = match value.to_lowercase().as_str() {
        "coin_in" => TransactionKind::CoinIn,
        "bill_in" => TransactionKind::BillIn,
        "voucher_in" => TransactionKind::VoucherIn,
        "voucher_out" => TransactionKind::VoucherOut,
        "handpay" => TransactionKind::Handpay,
        "wager" => TransactionKind::Wager,
        "win" => TransactionKind::Win,
        _ => return None,
    };
    Some(kind)
}

/// Render cents as a two-place credit amount
pub fn cents_to_credits(cents: i64) -> Decimal {
    Decimal::new(cents, 2)
}

/// Write account balances to CSV format
///
/// Writes one row per bucket in index order with columns: account, balance,
/// credits; followed by a `Total` row with the aggregate.
///
/// # Arguments
///
/// * `balances` - Balance snapshot to write
/// * `output` - Mutable reference to a writer for outputting CSV
///
/// # Returns
///
/// * `Ok(())` if writing succeeded
/// * `Err(String)` if a write error occurred
pub fn write_balances_csv(balances: &AccountBalances, output: &mut dyn Write) -> Result<(), String> {
    use csv::Writer;

    let mut writer = Writer::from_writer(output);

    writer
        .write_record(["account", "balance", "credits"])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let rows = balances
        .iter()
        .map(|(account, balance)| (account.key(), balance))
        .chain(std::iter::once(("Total", balances.total())));

    for (name, cents) in rows {
        writer
            .write_record(&[
                name.to_string(),
                cents.to_string(),
                format!("{:.2}", cents_to_credits(cents)),
            ])
            .map_err(|e| format!("Failed to write balance record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}
