//! Concurrent processing strategy
//!
//! Runs every caller's command stream on its own blocking task so independent
//! callers (coin acceptor, host, game) contend for the transaction lease the
//! way they do on a live cabinet.
//!
//! # Architecture
//!
//! ```text
//! ConcurrentProcessingStrategy
//!     ├── WorkerConfig (max_workers)
//!     ├── SyncReader (script parsing, up front)
//!     ├── partition_by_caller (order kept per caller)
//!     └── tokio multi-thread runtime
//!         └── spawn_blocking per caller -> CreditEngine::execute
//! ```
//!
//! The engine blocks (lease backoff, file commits), so callers run on the
//! runtime's blocking pool rather than on async worker threads.
//!
//! # Ordering
//!
//! Commands of one caller execute in script order. Commands of different
//! callers interleave arbitrarily, serialized only by the lease.

use crate::core::CreditEngine;
use crate::io::sync_reader::SyncReader;
use crate::strategy::{ProcessingReport, ProcessingStrategy};
use crate::types::{EngineError, LedgerCommand};
use std::collections::HashMap;
use std::path::Path;

/// Worker pool sizing for the concurrent strategy
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Maximum number of callers executing at the same time
    pub max_workers: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_workers: num_cpus::get(),
        }
    }
}

impl WorkerConfig {
    /// Create a WorkerConfig, falling back to the default for zero
    pub fn new(max_workers: usize) -> Self {
        if max_workers == 0 {
            let default = Self::default();
            tracing::warn!(
                max_workers,
                fallback = default.max_workers,
                "invalid worker count, using default"
            );
            return default;
        }
        Self { max_workers }
    }
}

/// Concurrent processing strategy
#[derive(Debug, Clone)]
pub struct ConcurrentProcessingStrategy {
    config: WorkerConfig,
}

impl ConcurrentProcessingStrategy {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }
}

/// Partition commands by caller
///
/// # Guarantees
///
/// - Each command appears in exactly one partition
/// - Commands for each caller keep their original order
/// - Partitions are returned in order of each caller's first appearance
pub fn partition_by_caller(commands: Vec<LedgerCommand>) -> Vec<(String, Vec<LedgerCommand>)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut partitions: Vec<(String, Vec<LedgerCommand>)> = Vec::new();

    for command in commands {
        let slot = *index.entry(command.caller.clone()).or_insert_with(|| {
            partitions.push((command.caller.clone(), Vec::new()));
            partitions.len() - 1
        });
        partitions[slot].1.push(command);
    }

    partitions
}

/// Execute one caller's commands in order, stopping at a fatal error
fn run_caller(
    engine: &CreditEngine,
    commands: Vec<LedgerCommand>,
) -> (ProcessingReport, Option<EngineError>) {
    let mut report = ProcessingReport::default();

    for command in commands {
        let outcome = engine.execute(&command);
        report.record(&outcome);
        if let Err(error) = outcome {
            if error.is_fatal() {
                return (report, Some(error));
            }
        }
    }

    (report, None)
}

impl ProcessingStrategy for ConcurrentProcessingStrategy {
    /// Execute the script with one task per caller
    ///
    /// 1. Parses the whole script, logging and counting unreadable rows
    /// 2. Partitions the commands by caller
    /// 3. Runs each partition on the runtime's blocking pool
    /// 4. Waits for every caller, then reports the first fatal error if any
    fn execute(
        &self,
        engine: &CreditEngine,
        input_path: &Path,
    ) -> Result<ProcessingReport, EngineError> {
        let mut report = ProcessingReport::default();
        let mut commands = Vec::new();
        for result in SyncReader::new(input_path)? {
            match result {
                Ok(command) => commands.push(command),
                Err(error) => {
                    tracing::warn!(%error, "skipping unreadable command");
                    report.rejected += 1;
                }
            }
        }

        let partitions = partition_by_caller(commands);
        tracing::debug!(
            callers = partitions.len(),
            max_workers = self.config.max_workers,
            "starting concurrent execution"
        );

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_workers)
            .max_blocking_threads(self.config.max_workers)
            .build()?;

        let mut fatal = None;
        runtime.block_on(async {
            let tasks: Vec<_> = partitions
                .into_iter()
                .map(|(caller, commands)| {
                    let engine = engine.clone();
                    let task = tokio::task::spawn_blocking(move || run_caller(&engine, commands));
                    (caller, task)
                })
                .collect();

            for (caller, task) in tasks {
                match task.await {
                    Ok((caller_report, error)) => {
                        report.merge(caller_report);
                        if fatal.is_none() {
                            fatal = error;
                        }
                    }
                    Err(join_error) => {
                        tracing::error!(caller = %caller, %join_error, "caller task panicked");
                        if fatal.is_none() {
                            fatal = Some(EngineError::Io {
                                message: format!("caller '{}' task failed: {}", caller, join_error),
                            });
                        }
                    }
                }
            }
        });

        match fatal {
            Some(error) => Err(error),
            None => Ok(report),
        }
    }
}
