// Re-export main components
pub mod batch;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod metadata;
pub mod outcome;
pub mod query;
pub mod search;
pub mod transport;

// Re-export commonly used types
pub use batch::{BatchOutcome, BatchResultSet, FailedDocuments};
pub use client::{Client, Index};
pub use config::ClientConfig;
pub use document::Document;
pub use metadata::IndexMetadata;
pub use outcome::Operation;
pub use query::{ParameterMap, Query, Range};
pub use search::SearchResults;
pub use transport::{HttpRequest, HttpResponse, HttpTransport, Method, Transport};

// Re-export error types
pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    /// Accepts every document whose text is not empty.
    struct PickyService;

    impl Transport for PickyService {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
            let docs: Vec<serde_json::Value> =
                serde_json::from_str(request.body.as_deref().unwrap_or("[]")).unwrap();
            let outcomes: Vec<serde_json::Value> = docs
                .iter()
                .map(|doc| {
                    if doc["fields"]["text"].as_str().unwrap_or("").is_empty() {
                        serde_json::json!({"added": false, "error": "empty text"})
                    } else {
                        serde_json::json!({"added": true})
                    }
                })
                .collect();
            Ok(HttpResponse::new(200, serde_json::to_string(&outcomes).unwrap()))
        }
    }

    #[test]
    fn test_basic_workflow() -> Result<()> {
        let client = Client::with_transport("http://localhost:8080/", Arc::new(PickyService))?;
        let index = client.index("articles");

        let docs = ["Rust is fast", "", "Go is simple", ""]
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let fields = BTreeMap::from([("text".to_string(), text.to_string())]);
                Document::new(format!("{}", i), fields)
            })
            .collect::<Result<Vec<_>>>()?;

        let results = index.add_documents(docs)?;

        assert!(results.has_errors());
        let failed: Vec<&str> = results.failed_documents().map(Document::id).collect();
        assert_eq!(failed, vec!["1", "3"]);

        Ok(())
    }
}
