//! I/O module
//!
//! Handles command script parsing and balance output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, output serialization)
//! - `sync_reader` - Synchronous command reader with iterator interface

pub mod csv_format;
pub mod sync_reader;

pub use csv_format::{cents_to_credits, convert_command_record, write_balances_csv, CommandCsvRecord};
pub use sync_reader::SyncReader;
