use crate::error::{Error, Result};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// One page of sorted search results.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResults {
    /// Total number of matching documents, not just this page.
    pub matches: u64,
    /// Seconds the service spent on the query.
    pub search_time: f64,
    pub results: Vec<Map<String, Value>>,
    /// category -> value -> count
    pub facets: Option<BTreeMap<String, BTreeMap<String, u64>>>,
}

#[derive(Debug, Deserialize)]
struct RawSearchResults {
    matches: u64,
    search_time: String,
    #[serde(default)]
    results: Vec<Map<String, Value>>,
    #[serde(default)]
    facets: Option<BTreeMap<String, BTreeMap<String, u64>>>,
}

impl SearchResults {
    pub fn from_json(value: Value) -> Result<Self> {
        let raw: RawSearchResults = serde_json::from_value(value)
            .map_err(|e| Error::MalformedResponse(format!("search response: {}", e)))?;

        let search_time = raw.search_time.trim().parse::<f64>().map_err(|_| {
            Error::MalformedResponse(format!("search_time is not a decimal: {:?}", raw.search_time))
        })?;

        Ok(Self {
            matches: raw.matches,
            search_time,
            results: raw.results,
            facets: raw.facets,
        })
    }

    pub fn docids(&self) -> impl Iterator<Item = &str> + '_ {
        self.results
            .iter()
            .filter_map(|result| result.get("docid").and_then(Value::as_str))
    }
}

impl std::fmt::Display for SearchResults {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} matches in {:.3}s ({} on this page)",
            self.matches,
            self.search_time,
            self.results.len()
        )
    }
}
