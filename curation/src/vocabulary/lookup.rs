//! The `agrovoc-lookup` tool.
//!
//! Reads subject terms, looks each one up and sorts it into the matches or
//! rejects output.

use std::fs::File;
use std::future::Future;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Duration;
use tracing::debug;

use super::{classify, Classification, Lookup, VocabularyClient, VocabularyResult};
use crate::cache::ResponseCache;
use crate::config::{LookupConfig, CACHE_RETENTION_DAYS};
use crate::error::{ToolError, ToolResult};
use crate::input::read_subject_terms;
use crate::interrupt::{interruptible, shutdown_signal};
use crate::report::Reporter;

/// Header of the rejects file when suggestions are saved
const SUGGESTIONS_HEADER: [&str; 2] = ["dc.subject", "suggestions"];

/// Separator between labels in the suggestions column
const LABEL_SEPARATOR: &str = "||";

/// Counts for one lookup run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupSummary {
    pub matched: usize,
    pub rejected: usize,
    pub suggested: usize,
    pub failed: usize,
}

/// One of the two output files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Matches,
    Rejects,
}

/// Destinations for matched and rejected terms
pub struct LookupOutputs<W: Write> {
    matches: W,
    rejects: W,
    save_suggestions: bool,
}

impl<W: Write> LookupOutputs<W> {
    /// Plain outputs: one term per line in each writer.
    pub fn new(matches: W, rejects: W) -> Self {
        Self {
            matches,
            rejects,
            save_suggestions: false,
        }
    }

    /// Rejects become a CSV of terms and their suggested labels.
    pub fn with_suggestions(matches: W, rejects: W) -> std::io::Result<Self> {
        let mut outputs = Self {
            matches,
            rejects,
            save_suggestions: true,
        };
        outputs.write_reject_row(&SUGGESTIONS_HEADER)?;
        Ok(outputs)
    }

    fn write_match(&mut self, term: &str) -> std::io::Result<()> {
        writeln!(self.matches, "{}", term)
    }

    fn write_reject(&mut self, term: &str) -> std::io::Result<()> {
        if self.save_suggestions {
            self.write_reject_row(&[term, ""])
        } else {
            writeln!(self.rejects, "{}", term)
        }
    }

    fn write_suggestions(&mut self, term: &str, labels: &[String]) -> std::io::Result<()> {
        if !self.save_suggestions {
            return Ok(());
        }
        let joined = labels.join(LABEL_SEPARATOR);
        self.write_reject_row(&[term, joined.as_str()])
    }

    fn write_reject_row(&mut self, row: &[&str]) -> std::io::Result<()> {
        let mut writer = csv::Writer::from_writer(&mut self.rejects);
        writer.write_record(row).map_err(std::io::Error::other)?;
        writer.flush()
    }

    /// Flush both writers and hand them back.
    ///
    /// On failure, names the output whose writer failed.
    pub fn finish(mut self) -> Result<(W, W), (Output, std::io::Error)> {
        self.matches.flush().map_err(|e| (Output::Matches, e))?;
        self.rejects.flush().map_err(|e| (Output::Rejects, e))?;
        Ok((self.matches, self.rejects))
    }
}

/// Labels offered by a set of results, preferred before alternative
fn candidate_labels(results: &[VocabularyResult]) -> Vec<String> {
    results
        .iter()
        .flat_map(|r| r.pref_label.iter().chain(r.alt_label.iter()))
        .cloned()
        .collect()
}

/// Look up every subject and write it to the matching output.
pub async fn resolve_subjects<W: Write>(
    client: &VocabularyClient,
    cache: &mut ResponseCache,
    subjects: &[String],
    config: &LookupConfig,
    outputs: &mut LookupOutputs<W>,
    reporter: &Reporter,
) -> ToolResult<LookupSummary> {
    let mut summary = LookupSummary::default();
    let language = config.language.as_str();

    for subject in subjects {
        if config.suggest_matches {
            debug!("Performing wildcard search for {:?} in AGROVOC {}", subject, language);
        } else {
            debug!("Looking up the subject: {} ({})", subject, language);
        }

        let response = match client
            .search(subject, language, config.suggest_matches, cache)
            .await?
        {
            Lookup::Found { response, .. } => response,
            Lookup::Failed(reason) => {
                reporter.warning(format!("Lookup failed for {:?}: {}", subject, reason));
                summary.failed += 1;
                continue;
            }
        };

        let written = match classify(&response, config.suggest_matches) {
            Classification::Matched => {
                reporter.success(format!("Exact match for {:?} in AGROVOC {}", subject, language));
                summary.matched += 1;
                outputs.write_match(subject).map_err(|e| (Output::Matches, e))
            }
            Classification::Suggestions(results) => {
                for result in &results {
                    if let Some(label) = &result.pref_label {
                        let line = format!(
                            "Preferred suggestion for subject term {:?}: {}",
                            subject, label
                        );
                        reporter.info_indent(line, 1);
                    }
                    if let Some(label) = &result.alt_label {
                        let line = format!(
                            "Alternative suggestion for subject term {:?}: {}",
                            subject, label
                        );
                        reporter.info_indent(line, 1);
                    }
                }
                summary.suggested += 1;
                outputs
                    .write_suggestions(subject, &candidate_labels(&results))
                    .map_err(|e| (Output::Rejects, e))
            }
            Classification::Rejected => {
                debug!("No exact match for {:?} in AGROVOC {}", subject, language);
                summary.rejected += 1;
                outputs.write_reject(subject).map_err(|e| (Output::Rejects, e))
            }
        };

        written.map_err(|(output, source)| output_error(config, output, source))?;
    }

    Ok(summary)
}

fn output_error(config: &LookupConfig, output: Output, source: std::io::Error) -> ToolError {
    let path = match output {
        Output::Matches => &config.output_matches_file,
        Output::Rejects => &config.output_rejects_file,
    };
    ToolError::Output {
        path: path.clone(),
        source,
    }
}

fn create_output(path: &Path) -> ToolResult<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| ToolError::Output {
            path: PathBuf::from(path),
            source,
        })
}

/// Run `agrovoc-lookup` end to end, stopping on Ctrl+C or SIGTERM.
pub async fn run(config: &LookupConfig, reporter: &Reporter) -> ToolResult<LookupSummary> {
    run_with_stop(config, reporter, shutdown_signal()).await
}

/// Run `agrovoc-lookup` until done or until `stop` resolves.
///
/// The output files and the cache are released on every exit path:
/// writers flushed, cache index persisted.
pub async fn run_with_stop<S>(
    config: &LookupConfig,
    reporter: &Reporter,
    stop: S,
) -> ToolResult<LookupSummary>
where
    S: Future<Output = ()>,
{
    let subjects = read_subject_terms(&config.input_file)?;
    debug!("Read {} subject terms from {}", subjects.len(), config.input_file.display());

    let matches = create_output(&config.output_matches_file)?;
    let rejects = create_output(&config.output_rejects_file)?;
    let mut outputs = if config.suggest_matches && config.save_suggestions {
        LookupOutputs::with_suggestions(matches, rejects)
            .map_err(|source| output_error(config, Output::Rejects, source))?
    } else {
        LookupOutputs::new(matches, rejects)
    };

    let mut cache = match &config.cache_dir {
        Some(dir) => ResponseCache::with_dir(dir),
        None => ResponseCache::in_memory(Duration::days(CACHE_RETENTION_DAYS)),
    };
    let client = VocabularyClient::new(&config.endpoint);

    let work = resolve_subjects(&client, &mut cache, &subjects, config, &mut outputs, reporter);
    let result = interruptible(work, stop).await;

    let flushed = outputs
        .finish()
        .map_err(|(output, source)| output_error(config, output, source));
    let persisted = cache.persist();

    let summary = result?;
    flushed?;
    persisted?;

    reporter.info(format!(
        "Matched {}, rejected {}, with suggestions {}, failed {}",
        summary.matched, summary.rejected, summary.suggested, summary.failed
    ));
    Ok(summary)
}
