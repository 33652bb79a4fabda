//! Input readers for the curation tools.
//!
//! Two input shapes exist:
//!
//! - **CSV** files with a header line, read into [`CsvTable`]. The encoding
//!   and delimiter are detected so exports from spreadsheet editors work.
//! - **Subject term** text files, one candidate term per line, filtered by
//!   [`is_subject_term`] and de-duplicated.
//!
//! Files are read once, completely, and then closed.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::error::{InputError, InputResult};

/// Lines that look like `SUBJECT` or `ANOTHER SUBJECT`.
static SUBJECT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Z]+?[A-Z ]+$").expect("Invalid subject pattern")
});

/// One CSV row, addressed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvRecord {
    values: HashMap<String, String>,
}

impl CsvRecord {
    /// Value of a column, or `""` when the row is too short.
    pub fn get(&self, column: &str) -> &str {
        self.values.get(column).map(String::as_str).unwrap_or("")
    }
}

/// A parsed CSV file.
#[derive(Debug, Clone)]
pub struct CsvTable {
    /// Column headers, in file order.
    pub headers: Vec<String>,
    /// Data rows.
    pub records: Vec<CsvRecord>,
    /// Detected or used encoding.
    pub encoding: String,
    /// Detected or used delimiter.
    pub delimiter: char,
}

impl CsvTable {
    /// Fail with the first of `columns` that is not in the header.
    pub fn require_columns(&self, columns: &[&str]) -> InputResult<()> {
        require_columns(&self.headers, columns)
    }
}

/// Fail with the first of `columns` that is not in `headers`.
pub fn require_columns(headers: &[String], columns: &[&str]) -> InputResult<()> {
    match columns.iter().find(|c| !headers.iter().any(|h| h == *c)) {
        Some(missing) => Err(InputError::MissingColumn(missing.to_string())),
        None => Ok(()),
    }
}

// =============================================================================
// Encoding & delimiter detection
// =============================================================================

/// Detect the encoding of raw bytes using chardet
///
/// Valid UTF-8 is taken as is; chardet only runs on everything else.
pub fn detect_encoding(bytes: &[u8]) -> String {
    if std::str::from_utf8(bytes).is_ok() {
        return "utf-8".to_string();
    }

    let charset = chardet::detect(bytes).0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" => "windows-1252".to_string(),
        "iso-8859-1" | "iso-8859-15" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset.to_lowercase(),
    }
}

/// Decode bytes to a string using the given encoding.
///
/// Labels encoding_rs does not know decode as Windows-1252. A UTF-8 byte
/// order mark is dropped so it does not end up in the first header name.
pub fn decode_content(bytes: &[u8], encoding: &str) -> String {
    let decoded = match encoding {
        "utf-8" => String::from_utf8_lossy(bytes).into_owned(),
        label => encoding_rs::Encoding::for_label(label.as_bytes())
            .unwrap_or(encoding_rs::WINDOWS_1252)
            .decode(bytes)
            .0
            .into_owned(),
    };

    match decoded.strip_prefix('\u{feff}') {
        Some(rest) => rest.to_string(),
        None => decoded,
    }
}

/// Detect the delimiter by counting occurrences in the first line.
///
/// Single-column files have no separator at all and read as comma separated.
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let mut best_sep = ',';
    let mut best_count = 0;

    for sep in [',', ';', '\t', '|'] {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

// =============================================================================
// CSV
// =============================================================================

/// Parse CSV content with an explicit delimiter.
pub fn parse_csv(content: &str, delimiter: char) -> InputResult<CsvTable> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    if headers.iter().all(|h| h.is_empty()) {
        return Err(InputError::NoHeaders);
    }

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        if row.iter().all(|v| v.is_empty()) {
            continue;
        }

        let values = headers
            .iter()
            .cloned()
            .zip(row.iter().map(str::to_string))
            .collect();
        records.push(CsvRecord { values });
    }

    Ok(CsvTable {
        headers,
        records,
        encoding: "utf-8".to_string(),
        delimiter,
    })
}

/// Parse CSV bytes with auto-detection of encoding and delimiter.
pub fn parse_csv_bytes(bytes: &[u8]) -> InputResult<CsvTable> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding);
    let delimiter = detect_delimiter(&content);

    let mut table = parse_csv(&content, delimiter)?;
    table.encoding = encoding;
    Ok(table)
}

/// Read a CSV file with auto-detection of encoding and delimiter.
pub fn read_csv_file(path: &Path) -> InputResult<CsvTable> {
    parse_csv_bytes(&read_bytes(path)?)
}

// =============================================================================
// Subject terms
// =============================================================================

/// Whether a trimmed line is an uppercase subject term.
pub fn is_subject_term(line: &str) -> bool {
    SUBJECT_PATTERN.is_match(line)
}

/// Extract subject terms from text, one per line.
///
/// Lines are trimmed; lines that are not uppercase terms are skipped
/// silently. Duplicates are dropped, keeping the first occurrence.
pub fn parse_subject_terms(content: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    content
        .lines()
        .map(str::trim)
        .filter(|line| is_subject_term(line))
        .filter(|line| seen.insert(line.to_string()))
        .map(str::to_string)
        .collect()
}

/// Read subject terms from a text file.
pub fn read_subject_terms(path: &Path) -> InputResult<Vec<String>> {
    let bytes = read_bytes(path)?;
    let content = decode_content(&bytes, &detect_encoding(&bytes));
    Ok(parse_subject_terms(&content))
}

fn read_bytes(path: &Path) -> InputResult<Vec<u8>> {
    std::fs::read(path).map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })
}
