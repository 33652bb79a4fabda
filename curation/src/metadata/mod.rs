//! The `fix-metadata` and `delete-metadata` tools.
//!
//! Both read a CSV of values and apply one mutation per row through a
//! [`MetadataStore`]. Each call on the store is one transaction; a dry run
//! counts the matching values and changes nothing.

pub mod postgres;

use async_trait::async_trait;
use std::future::Future;
use tracing::debug;
use uuid::Uuid;

use crate::config::{DeleteConfig, FixConfig};
use crate::error::{DatabaseResult, ToolResult};
use crate::input::{read_csv_file, CsvRecord};
use crate::interrupt::{interruptible, shutdown_signal};
use crate::report::Reporter;

pub use postgres::PgMetadataStore;

/// Separator DSpace uses between multiple values in one cell
const MULTI_VALUE_SEPARATOR: char = '|';

/// Result of one store call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mutation {
    /// Items owning a matching value, one entry per matching value.
    pub items: Vec<Uuid>,
    /// Values changed or deleted; `0` on a dry run.
    pub affected: u64,
    /// Whether the transaction was committed.
    pub applied: bool,
}

impl Mutation {
    /// Number of matching values.
    pub fn matched(&self) -> usize {
        self.items.len()
    }

    /// Affected items, each once, in first-seen order.
    pub fn distinct_items(&self) -> Vec<Uuid> {
        let mut seen = Vec::with_capacity(self.items.len());
        for id in &self.items {
            if !seen.contains(id) {
                seen.push(*id);
            }
        }
        seen
    }
}

/// Why a row was not sent to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Search and replacement are the same.
    Identical,
    /// The replacement contains `|`.
    MultiValueSeparator,
    /// The search value is empty.
    EmptyValue,
}

/// Check a replacement pair before it reaches the store.
pub fn check_replacement(from: &str, to: &str) -> Option<SkipReason> {
    if from.is_empty() {
        Some(SkipReason::EmptyValue)
    } else if from == to {
        Some(SkipReason::Identical)
    } else if to.contains(MULTI_VALUE_SEPARATOR) {
        Some(SkipReason::MultiValueSeparator)
    } else {
        None
    }
}

/// Access to the metadata values of DSpace items.
#[async_trait]
pub trait MetadataStore: Send {
    /// Replace every `from` value of a field with `to`.
    async fn replace_values(
        &mut self,
        field_id: i32,
        from: &str,
        to: &str,
        dry_run: bool,
    ) -> DatabaseResult<Mutation>;

    /// Delete every `value` of a field.
    async fn delete_values(
        &mut self,
        field_id: i32,
        value: &str,
        dry_run: bool,
    ) -> DatabaseResult<Mutation>;

    /// Release the store after the last row.
    async fn close(self) -> DatabaseResult<()>
    where
        Self: Sized;
}

/// Counts for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataSummary {
    /// CSV rows read.
    pub rows: usize,
    /// Rows never sent to the store.
    pub skipped: usize,
    /// Rows that matched at least one value.
    pub matched_rows: usize,
    /// Values changed or deleted.
    pub affected: u64,
}

/// Apply the corrections in `records`.
pub async fn fix_values<S: MetadataStore + ?Sized>(
    store: &mut S,
    records: &[CsvRecord],
    config: &FixConfig,
    reporter: &Reporter,
) -> ToolResult<MetadataSummary> {
    let mut summary = MetadataSummary::default();
    let dry_run = config.mode.dry_run;

    for record in records {
        summary.rows += 1;
        let from = record.get(&config.from_field_name);
        let to = record.get(&config.to_field_name);

        match check_replacement(from, to) {
            Some(SkipReason::Identical) => {
                debug!("Skipping identical search and replace for value: {}", from);
                summary.skipped += 1;
                continue;
            }
            Some(SkipReason::MultiValueSeparator) => {
                debug!("Skipping correction with invalid | character: {}", to);
                summary.skipped += 1;
                continue;
            }
            Some(SkipReason::EmptyValue) => {
                debug!("Skipping row with empty search value");
                summary.skipped += 1;
                continue;
            }
            None => {}
        }

        let mutation = store
            .replace_values(config.metadata_field_id, from, to, dry_run)
            .await?;
        if mutation.matched() == 0 {
            continue;
        }

        summary.matched_rows += 1;
        summary.affected += mutation.affected;
        if dry_run {
            reporter.success(format!("Would fix {} occurences of: {}", mutation.matched(), from));
        } else if mutation.affected > 0 {
            reporter.success(format!("Fixed {} occurences of: {}", mutation.affected, from));
        }
    }

    Ok(summary)
}

/// Delete the values in `records`.
pub async fn delete_values<S: MetadataStore + ?Sized>(
    store: &mut S,
    records: &[CsvRecord],
    config: &DeleteConfig,
    reporter: &Reporter,
) -> ToolResult<MetadataSummary> {
    let mut summary = MetadataSummary::default();
    let dry_run = config.mode.dry_run;

    for record in records {
        summary.rows += 1;
        let value = record.get(&config.from_field_name);
        if value.is_empty() {
            debug!("Skipping row with empty search value");
            summary.skipped += 1;
            continue;
        }

        let mutation = store.delete_values(config.metadata_field_id, value, dry_run).await?;
        if mutation.matched() == 0 {
            continue;
        }

        summary.matched_rows += 1;
        summary.affected += mutation.affected;
        if dry_run {
            reporter.success(format!(
                "Would delete {} occurences of: {}",
                mutation.matched(),
                value
            ));
        } else if mutation.affected > 0 {
            reporter.success(format!("Deleted {} occurences of: {}", mutation.affected, value));
        }
    }

    Ok(summary)
}

fn report_summary(summary: &MetadataSummary, verb: &str, reporter: &Reporter) {
    reporter.info(format!(
        "{} rows, {} skipped, {} matched, {} values {}",
        summary.rows, summary.skipped, summary.matched_rows, summary.affected, verb
    ));
}

/// Apply corrections until done or until `stop` resolves, then close
/// the store on every path.
pub async fn fix_with_store<S, F>(
    mut store: S,
    records: &[CsvRecord],
    config: &FixConfig,
    reporter: &Reporter,
    stop: F,
) -> ToolResult<MetadataSummary>
where
    S: MetadataStore,
    F: Future<Output = ()>,
{
    let result = interruptible(fix_values(&mut store, records, config, reporter), stop).await;
    let closed = store.close().await;

    let summary = result?;
    closed?;
    Ok(summary)
}

/// Delete values until done or until `stop` resolves, then close the
/// store on every path.
pub async fn delete_with_store<S, F>(
    mut store: S,
    records: &[CsvRecord],
    config: &DeleteConfig,
    reporter: &Reporter,
    stop: F,
) -> ToolResult<MetadataSummary>
where
    S: MetadataStore,
    F: Future<Output = ()>,
{
    let result = interruptible(delete_values(&mut store, records, config, reporter), stop).await;
    let closed = store.close().await;

    let summary = result?;
    closed?;
    Ok(summary)
}

/// Run `fix-metadata` end to end.
pub async fn run_fix(config: &FixConfig, reporter: &Reporter) -> ToolResult<MetadataSummary> {
    let table = read_csv_file(&config.csv_file)?;
    table.require_columns(&[config.from_field_name.as_str(), config.to_field_name.as_str()])?;

    let store = PgMetadataStore::connect(&config.database).await?;
    debug!("Connected to database.");

    let summary = fix_with_store(store, &table.records, config, reporter, shutdown_signal()).await?;
    let verb = if config.mode.dry_run { "would change" } else { "fixed" };
    report_summary(&summary, verb, reporter);
    Ok(summary)
}

/// Run `delete-metadata` end to end.
pub async fn run_delete(config: &DeleteConfig, reporter: &Reporter) -> ToolResult<MetadataSummary> {
    let table = read_csv_file(&config.csv_file)?;
    table.require_columns(&[config.from_field_name.as_str()])?;

    let store = PgMetadataStore::connect(&config.database).await?;
    debug!("Connected to database.");

    let summary =
        delete_with_store(store, &table.records, config, reporter, shutdown_signal()).await?;
    let verb = if config.mode.dry_run { "would delete" } else { "deleted" };
    report_summary(&summary, verb, reporter);
    Ok(summary)
}
