//! Error types for the curation tools.
//!
//! Each concern has its own enum:
//!
//! - [`InputError`] - reading and validating input files
//! - [`CacheError`] - the vocabulary response cache
//! - [`VocabularyError`] - the AGROVOC search service
//! - [`RestError`] - the DSpace REST API
//! - [`DatabaseError`] - the DSpace PostgreSQL database
//! - [`ToolError`] - top-level, returned by every tool run
//!
//! Only fatal conditions are errors. Problems that affect a single row
//! (a missing local file, an identical replacement pair) are outcome
//! values reported by the tool and never reach this module.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Input Errors
// =============================================================================

/// Errors while reading the input file of a tool.
#[derive(Debug, Error)]
pub enum InputError {
    /// Failed to read the file.
    #[error("Could not open {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV.
    #[error("Invalid CSV format: {0}")]
    Csv(#[from] csv::Error),

    /// A column required by the tool is not in the header.
    #[error("Specified field \"{0}\" does not exist in the CSV")]
    MissingColumn(String),

    /// The file has no header line.
    #[error("No headers found in CSV")]
    NoHeaders,
}

// =============================================================================
// Cache Errors
// =============================================================================

/// Errors from the vocabulary response cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// IO error on the cache index.
    #[error("Cache IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The cache index could not be (de)serialized.
    #[error("Cache JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// Vocabulary Errors
// =============================================================================

/// Fatal errors from the vocabulary service.
#[derive(Debug, Error)]
pub enum VocabularyError {
    /// The service could not be reached.
    #[error("Could not connect to vocabulary service {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

// =============================================================================
// REST Errors
// =============================================================================

/// Fatal errors from the DSpace REST API.
#[derive(Debug, Error)]
pub enum RestError {
    /// The API could not be reached.
    #[error("Could not connect to REST API: {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The login request was rejected.
    #[error("Login failed (HTTP {0})")]
    LoginFailed(u16),

    /// The login succeeded but no session cookie came back.
    #[error("Login failed (HTTP {0}): missing JSESSIONID cookie in response")]
    MissingSessionCookie(u16),

    /// No valid session and no credentials to log in with.
    #[error("No valid session and no email/password given to log in")]
    MissingCredentials,

    /// A response body did not have the expected shape.
    #[error("Unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

// =============================================================================
// Database Errors
// =============================================================================

/// Fatal errors from the metadata database.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Connecting failed.
    #[error("Could not connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// A statement failed.
    #[error("Database error: {0}")]
    Query(#[from] sqlx::Error),
}

// =============================================================================
// Top-level Tool Errors
// =============================================================================

/// Error returned by a tool run.
///
/// Every variant aborts the remaining rows and maps to exit code `1`.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Input file error.
    #[error(transparent)]
    Input(#[from] InputError),

    /// Vocabulary service error.
    #[error(transparent)]
    Vocabulary(#[from] VocabularyError),

    /// REST API error.
    #[error(transparent)]
    Rest(#[from] RestError),

    /// Database error.
    #[error(transparent)]
    Database(#[from] DatabaseError),

    /// Cache error.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Output file could not be written.
    #[error("Could not write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid combination of options.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The user cancelled the run.
    #[error("Interrupted")]
    Interrupted,
}

impl ToolError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        1
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for input operations.
pub type InputResult<T> = Result<T, InputError>;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type for REST operations.
pub type RestResult<T> = Result<T, RestError>;

/// Result type for database operations.
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Result type for tool runs.
pub type ToolResult<T> = Result<T, ToolError>;
