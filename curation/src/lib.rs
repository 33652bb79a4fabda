//! # Curation - batch maintenance tools for DSpace repositories
//!
//! Four independent tools, each reading one input file and making one pass
//! over its rows:
//!
//! ```text
//! agrovoc-lookup    subjects.txt ──▶ AGROVOC search ──▶ matches / rejects
//! fix-metadata      corrections.csv ──▶ PostgreSQL UPDATE (one tx per row)
//! delete-metadata   deletions.csv ──▶ PostgreSQL DELETE (one tx per row)
//! post-bitstreams   bitstreams.csv ──▶ REST: inspect bundle, upload file
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use curation::{config::PostConfig, report::Reporter, bitstreams};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config: PostConfig = /* built from the command line */;
//!     let summary = bitstreams::run(&config, &Reporter::new(false)).await.unwrap();
//!     println!("Uploaded {} files", summary.uploaded);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error types per concern
//! - [`config`] - Explicit configuration for each tool
//! - [`input`] - Subject term files and CSV with auto-detection
//! - [`cache`] - Vocabulary response cache
//! - [`vocabulary`] - AGROVOC client and `agrovoc-lookup`
//! - [`metadata`] - Metadata store and `fix-metadata` / `delete-metadata`
//! - [`rest`] - DSpace REST client
//! - [`bitstreams`] - `post-bitstreams`
//! - [`interrupt`] - Ctrl+C handling around a run

// Core modules
pub mod config;
pub mod error;
pub mod interrupt;
pub mod logging;
pub mod report;

// Input
pub mod input;

// Vocabulary
pub mod cache;
pub mod vocabulary;

// Database
pub mod metadata;

// REST
pub mod bitstreams;
pub mod rest;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CacheError, DatabaseError, InputError, RestError, ToolError, ToolResult, VocabularyError,
};

// =============================================================================
// Re-exports - Configuration
// =============================================================================

pub use config::{DatabaseConfig, DeleteConfig, FixConfig, LookupConfig, PostConfig, RunMode};

// =============================================================================
// Re-exports - Input
// =============================================================================

pub use input::{
    detect_delimiter, detect_encoding, parse_csv, read_csv_file, read_subject_terms, CsvRecord,
    CsvTable,
};

// =============================================================================
// Re-exports - Tools
// =============================================================================

pub use bitstreams::{FilenameSpec, PostSummary, RowOutcome};
pub use cache::ResponseCache;
pub use metadata::{MetadataStore, MetadataSummary, Mutation, PgMetadataStore, SkipReason};
pub use report::Reporter;
pub use rest::{RestClient, Session};
pub use vocabulary::{Classification, LookupSummary, VocabularyClient};
