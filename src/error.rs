//! Error types for the Facetry library.
//!
//! All errors are represented by the [`FacetryError`] enum. Facet computation
//! never panics on bad input: invalid ranges, unparseable date math and
//! storage faults are all reported through this type, and the engine hands the
//! first one back to the caller next to whatever facets were already computed.
//!
//! # Examples
//!
//! ```
//! use facetry::error::{FacetryError, Result};
//!
//! fn example_operation() -> Result<()> {
//!     Err(FacetryError::invalid_range("end 3 is before start 5"))
//! }
//!
//! match example_operation() {
//!     Ok(_) => println!("Success"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Facetry operations.
#[derive(Error, Debug)]
pub enum FacetryError {
    /// A range facet whose end comes before its start.
    #[error("Invalid range: {0}")]
    InvalidRange(String),

    /// A gap or date-math expression that could not be parsed or applied.
    #[error("Invalid gap math: {0}")]
    InvalidGapMath(String),

    /// Advancing by the gap did not move the bucket boundary forward.
    #[error("Non-progressing range: {0}")]
    NonProgressingRange(String),

    /// The requested counting strategy cannot be used for the field.
    #[error("Strategy unavailable: {0}")]
    StrategyUnavailable(String),

    /// I/O errors raised by the storage layer.
    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),

    /// Faults reported by a dictionary or postings backend.
    #[error("Storage I/O error: {0}")]
    StorageIo(String),

    /// The request was abandoned by its caller.
    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    /// Field-related errors
    #[error("Field error: {0}")]
    Field(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal failures (worker panics, pool construction).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for operations that may fail with FacetryError.
pub type Result<T> = std::result::Result<T, FacetryError>;

impl FacetryError {
    /// Create a new invalid range error.
    pub fn invalid_range<S: Into<String>>(msg: S) -> Self {
        FacetryError::InvalidRange(msg.into())
    }

    /// Create a new invalid gap math error.
    pub fn invalid_gap_math<S: Into<String>>(msg: S) -> Self {
        FacetryError::InvalidGapMath(msg.into())
    }

    /// Create a new non-progressing range error.
    pub fn non_progressing<S: Into<String>>(msg: S) -> Self {
        FacetryError::NonProgressingRange(msg.into())
    }

    /// Create a new strategy unavailable error.
    pub fn strategy_unavailable<S: Into<String>>(msg: S) -> Self {
        FacetryError::StrategyUnavailable(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        FacetryError::StorageIo(msg.into())
    }

    /// Create a new cancelled error.
    pub fn cancelled<S: Into<String>>(msg: S) -> Self {
        FacetryError::Cancelled(msg.into())
    }

    /// Create a new field error.
    pub fn field<S: Into<String>>(msg: S) -> Self {
        FacetryError::Field(msg.into())
    }

    /// Create a new invalid argument error.
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self {
        FacetryError::InvalidArgument(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        FacetryError::Config(msg.into())
    }

    /// Create a new internal error.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        FacetryError::Internal(msg.into())
    }

    /// Whether this error was caused by request-level abandonment.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FacetryError::Cancelled(_))
    }
}
