//! AGROVOC vocabulary lookups.
//!
//! [`VocabularyClient`] queries the AGROVOC REST search endpoint, going
//! through a [`ResponseCache`] first. [`classify`] turns a search response
//! into a [`Classification`] for one subject term.
//!
//! ```text
//! GET <endpoint>?query=FISH&lang=en          exact lookup
//! GET <endpoint>?query=FISH*&lang=en         suggest mode (wildcard)
//! ```

pub mod lookup;

use serde::Deserialize;
use tracing::debug;

use crate::cache::ResponseCache;
use crate::config::user_agent;
use crate::error::VocabularyError;

pub use lookup::{resolve_subjects, run, LookupOutputs, LookupSummary};

/// Wildcard appended to queries in suggest mode
const WILDCARD: char = '*';

/// Body of a search response
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub results: Vec<VocabularyResult>,
}

/// One concept returned by a search
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyResult {
    #[serde(default)]
    pub pref_label: Option<String>,
    #[serde(default)]
    pub alt_label: Option<String>,
}

/// Result of looking up one term
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// The service answered with a search response.
    Found { response: SearchResponse, cached: bool },
    /// The service answered, but not with something usable.
    Failed(String),
}

/// What to do with a term
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Exactly one exact result.
    Matched,
    /// Candidate labels from a wildcard search.
    Suggestions(Vec<VocabularyResult>),
    /// No usable match.
    Rejected,
}

/// Classify a search response for a term.
///
/// - one result, suggestions disabled: [`Classification::Matched`]
/// - one or more results, suggestions enabled: [`Classification::Suggestions`]
/// - anything else: [`Classification::Rejected`]
pub fn classify(response: &SearchResponse, suggest_matches: bool) -> Classification {
    match (response.results.len(), suggest_matches) {
        (1, false) => Classification::Matched,
        (n, true) if n >= 1 => Classification::Suggestions(response.results.clone()),
        _ => Classification::Rejected,
    }
}

/// The query string sent for a term
pub fn query_for(term: &str, suggest_matches: bool) -> String {
    if suggest_matches {
        format!("{}{}", term, WILDCARD)
    } else {
        term.to_string()
    }
}

/// Client for the AGROVOC search endpoint
#[derive(Debug, Clone)]
pub struct VocabularyClient {
    http: reqwest::Client,
    endpoint: String,
}

impl VocabularyClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(user_agent())
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            http,
            endpoint: endpoint.into(),
        }
    }

    /// Look up a term, using and refreshing the cache.
    ///
    /// Only successful responses are cached. Expired entries are pruned
    /// after every network request. A connection failure is fatal.
    pub async fn search(
        &self,
        term: &str,
        language: &str,
        suggest_matches: bool,
        cache: &mut ResponseCache,
    ) -> Result<Lookup, VocabularyError> {
        let query = query_for(term, suggest_matches);
        let key = ResponseCache::key(language, &query);

        if let Some(hit) = cache.get(&key) {
            debug!("Cache hit for {}", key);
            return Ok(parse_body(&hit.body, true));
        }

        let response = self
            .http
            .get(&self.endpoint)
            .query(&[("query", query.as_str()), ("lang", language)])
            .send()
            .await
            .map_err(|source| VocabularyError::Connect {
                url: self.endpoint.clone(),
                source,
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| VocabularyError::Connect {
                url: self.endpoint.clone(),
                source,
            })?;

        let lookup = if status.is_success() {
            let lookup = parse_body(&body, false);
            if matches!(lookup, Lookup::Found { .. }) {
                cache.insert(key, status.as_u16(), body);
            }
            lookup
        } else {
            Lookup::Failed(format!("HTTP {}", status.as_u16()))
        };

        let pruned = cache.prune_expired();
        if pruned > 0 {
            debug!("Pruned {} expired cache entries", pruned);
        }

        Ok(lookup)
    }
}

fn parse_body(body: &str, cached: bool) -> Lookup {
    match serde_json::from_str::<SearchResponse>(body) {
        Ok(response) => Lookup::Found { response, cached },
        Err(e) => Lookup::Failed(format!("invalid JSON response: {}", e)),
    }
}
