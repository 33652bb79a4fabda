//! Explicit configuration values for each tool.
//!
//! `main.rs` builds one of these from the parsed command line and passes it
//! by reference into the tool. Nothing here is global.

use sqlx::postgres::PgConnectOptions;
use std::fmt;
use std::path::PathBuf;

use crate::rest::types::BitstreamFormat;

/// Default AGROVOC search endpoint.
pub const DEFAULT_VOCABULARY_ENDPOINT: &str = "http://agrovoc.uniroma2.it/agrovoc/rest/v1/search";

/// Default DSpace 6 REST API base URL.
pub const DEFAULT_REST_URL: &str = "http://localhost:8080/rest";

/// Default directory for the vocabulary response cache.
pub const DEFAULT_CACHE_DIR: &str = ".curation/cache";

/// How long vocabulary responses stay cached.
pub const CACHE_RETENTION_DAYS: i64 = 7;

/// User agent sent with every HTTP request.
pub fn user_agent() -> String {
    format!("dspace-curation/{}", env!("CARGO_PKG_VERSION"))
}

/// Mode switches shared by all tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunMode {
    /// Print debug messages to standard error.
    pub debug: bool,
    /// Only print changes that would be made.
    pub dry_run: bool,
    /// Do not print progress messages.
    pub quiet: bool,
}

/// Connection settings for the DSpace PostgreSQL database.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl DatabaseConfig {
    /// Connection options for sqlx.
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.name)
            .username(&self.user)
            .password(&self.password)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"********")
            .finish()
    }
}

/// Configuration for `agrovoc-lookup`.
#[derive(Debug, Clone)]
pub struct LookupConfig {
    pub input_file: PathBuf,
    pub output_matches_file: PathBuf,
    pub output_rejects_file: PathBuf,
    pub language: String,
    pub suggest_matches: bool,
    /// Write suggestion rows to the rejects file (only with `suggest_matches`).
    pub save_suggestions: bool,
    pub endpoint: String,
    /// `None` keeps the cache in memory for this run only.
    pub cache_dir: Option<PathBuf>,
    pub mode: RunMode,
}

/// Configuration for `fix-metadata`.
#[derive(Debug, Clone)]
pub struct FixConfig {
    pub csv_file: PathBuf,
    pub from_field_name: String,
    pub to_field_name: String,
    pub metadata_field_id: i32,
    pub database: DatabaseConfig,
    pub mode: RunMode,
}

/// Configuration for `delete-metadata`.
#[derive(Debug, Clone)]
pub struct DeleteConfig {
    pub csv_file: PathBuf,
    pub from_field_name: String,
    pub metadata_field_id: i32,
    pub database: DatabaseConfig,
    pub mode: RunMode,
}

/// Configuration for `post-bitstreams`.
#[derive(Debug, Clone)]
pub struct PostConfig {
    pub csv_file: PathBuf,
    pub rest_url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    pub jsessionid: Option<String>,
    pub overwrite_formats: Vec<BitstreamFormat>,
    /// Directory the filenames in the CSV are relative to.
    pub files_dir: PathBuf,
    pub mode: RunMode,
}

impl PostConfig {
    /// Whether any overwrite formats were requested.
    pub fn overwrites(&self) -> bool {
        !self.overwrite_formats.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_debug_hides_password() {
        let db = DatabaseConfig {
            host: "localhost".into(),
            port: 5432,
            name: "dspace".into(),
            user: "dspace".into(),
            password: "hunter2".into(),
        };
        let printed = format!("{:?}", db);
        assert!(!printed.contains("hunter2"));
        assert!(printed.contains("dspace"));
    }

    #[test]
    fn test_user_agent_has_version() {
        assert!(user_agent().starts_with("dspace-curation/"));
    }
}
