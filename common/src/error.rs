//! Error handling for the hashpart crates.

use std::collections::TryReserveError;
use std::fmt;

use thiserror::Error;

/// The phase of a partitioning run in which an error was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorStage {
    /// Configuration, buffer allocation and thread creation. Nothing has been
    /// scanned yet.
    Setup,
    /// Workers are running over their input slices.
    Scan,
}

impl fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorStage::Setup => f.write_str("setup"),
            ErrorStage::Scan => f.write_str("scan"),
        }
    }
}

/// Errors raised while configuring or running a partitioner.
#[derive(Error, Debug)]
pub enum PartitionError {
    #[error("setup: invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    #[error("{stage}: failed to allocate {what} ({records} records)")]
    AllocationFailure {
        stage: ErrorStage,
        what: &'static str,
        records: usize,
        #[source]
        source: TryReserveError,
    },

    #[error(
        "scan: partition {partition} overflowed its capacity of {capacity} records in thread {thread}"
    )]
    PartitionOverflow {
        partition: usize,
        thread: usize,
        capacity: usize,
    },

    #[error("setup: could not spawn worker thread {thread}")]
    ThreadCreationFailure {
        thread: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("scan: worker thread {thread} panicked")]
    WorkerPanicked { thread: usize },

    #[error("setup: could not load config from {path}: {message}")]
    ConfigLoad { path: String, message: String },
}

/// Result type alias for partitioning operations.
pub type Result<T> = std::result::Result<T, PartitionError>;

impl PartitionError {
    /// Create an invalid-configuration error with a custom message.
    pub fn invalid_configuration<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create an allocation error for a buffer of `records` tuples.
    pub fn allocation(
        stage: ErrorStage,
        what: &'static str,
        records: usize,
        source: TryReserveError,
    ) -> Self {
        Self::AllocationFailure {
            stage,
            what,
            records,
            source,
        }
    }

    /// Create an overflow error for `partition` as seen by `thread`.
    pub fn overflow(partition: usize, thread: usize, capacity: usize) -> Self {
        Self::PartitionOverflow {
            partition,
            thread,
            capacity,
        }
    }

    /// The phase of the run this error belongs to.
    pub fn stage(&self) -> ErrorStage {
        match self {
            PartitionError::InvalidConfiguration { .. } => ErrorStage::Setup,
            PartitionError::AllocationFailure { stage, .. } => *stage,
            PartitionError::PartitionOverflow { .. } => ErrorStage::Scan,
            PartitionError::ThreadCreationFailure { .. } => ErrorStage::Setup,
            PartitionError::WorkerPanicked { .. } => ErrorStage::Scan,
            PartitionError::ConfigLoad { .. } => ErrorStage::Setup,
        }
    }

    /// Whether re-running with a larger capacity could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PartitionError::PartitionOverflow { .. })
    }
}
