//! Synchronous command script reader with iterator interface
//!
//! Provides a streaming iterator over ledger commands from a CSV file.
//! Delegates CSV format concerns to the csv_format module.
//!
//! # Iterator Interface
//!
//! SyncReader implements the Iterator trait, yielding
//! `Result<LedgerCommand, EngineError>` for each CSV row:
//!
//! ```no_run
//! use credit_ledger::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::new(Path::new("commands.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(command) => println!("Executing command: {:?}", command),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, unreadable header) are returned from `new()`
//! - Individual row errors are yielded as `EngineError::ParseError` carrying the
//!   1-based line number of the row
//!
//! Rows are read one at a time; memory use does not grow with the file.

use crate::io::csv_format::{convert_command_record, CommandCsvRecord};
use crate::types::{EngineError, LedgerCommand};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::File;
use std::path::Path;

/// Synchronous command script reader
#[derive(Debug)]
pub struct SyncReader {
    reader: csv::Reader<File>,
    headers: StringRecord,
    row: StringRecord,
}

impl SyncReader {
    /// Create a new SyncReader from a file path
    ///
    /// The CSV reader is configured to:
    /// - Trim whitespace from all fields
    /// - Use an 8KB buffer for efficient I/O
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the command script
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Io` if the file cannot be opened, or
    /// `EngineError::ParseError` if the header row cannot be read.
    pub fn new(path: &Path) -> Result<Self, EngineError> {
        let file = File::open(path).map_err(|e| EngineError::Io {
            message: format!("Failed to open file '{}': {}", path.display(), e),
        })?;

        let mut reader = ReaderBuilder::new()
            .trim(Trim::All)
            .buffer_capacity(8 * 1024)
            .from_reader(file);
        let headers = reader.headers()?.clone();

        Ok(Self {
            reader,
            headers,
            row: StringRecord::new(),
        })
    }
}

impl Iterator for SyncReader {
    type Item = Result<LedgerCommand, EngineError>;

    /// Get the next command from the script
    ///
    /// # Returns
    ///
    /// * `Some(Ok(LedgerCommand))` - Successfully parsed command
    /// * `Some(Err(EngineError))` - Parse or conversion error with line number
    /// * `None` - End of file reached
    fn next(&mut self) -> Option<Self::Item> {
        match self.reader.read_record(&mut self.row) {
            Ok(false) => None,
            Ok(true) => {
                let line = self.row.position().map(|pos| pos.line());
                let command = self
                    .row
                    .deserialize::<CommandCsvRecord>(Some(&self.headers))
                    .map_err(|e| EngineError::parse_error(line, e.to_string()))
                    .and_then(|record| {
                        convert_command_record(record)
                            .map_err(|message| EngineError::parse_error(line, message))
                    });
                Some(command)
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}
