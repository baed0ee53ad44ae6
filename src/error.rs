//! Common error types for the service matcher

use thiserror::Error;

/// Common result type for matcher operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy for the allocation-and-consensus engine.
///
/// Transient backend errors (`SearchUnavailable`, `InventoryUnavailable`) are
/// produced by the backend clients and consumed inside the engine: fetch,
/// rank and count degrade to partial or empty results instead of surfacing
/// them. Integrity errors (`UnknownWizard`, `DuplicateReview`, `RecordClosed`)
/// reject the submission with nothing committed.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Search backend unreachable or returned a non-success status
    #[error("Search backend unavailable: {0}")]
    SearchUnavailable(String),

    /// Remote inventory service unreachable or returned a non-success status
    #[error("Inventory service unavailable: {0}")]
    InventoryUnavailable(String),

    /// Submitted wizard code does not exist in the taxonomy
    #[error("Unknown wizard code: {0}")]
    UnknownWizard(String),

    /// A review outcome already exists for this (reviewer, record) pair
    #[error("Reviewer {reviewer_id} already reviewed record {record_key}")]
    DuplicateReview { reviewer_id: i64, record_key: String },

    /// Submission against a record already in a terminal state
    #[error("Record {0} is already resolved or flagged")]
    RecordClosed(String),

    /// Invalid engine-level input (unknown topic, malformed code, ...)
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// True for errors the engine treats as "no data from this backend"
    /// rather than a caller-visible failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::SearchUnavailable(_) | Error::InventoryUnavailable(_)
        )
    }
}
