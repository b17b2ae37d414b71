use crate::document::Document;
use crate::error::{Error, Result};
use serde::Deserialize;

/// Outcome of indexing one document of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    succeeded: bool,
    error_message: Option<String>,
}

impl BatchOutcome {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            error_message: Some(message.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    /// Present exactly when the document failed.
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}

/// One element of the batch response array: `{added, error?}`.
#[derive(Debug, Deserialize)]
struct WireOutcome {
    added: bool,
    #[serde(default)]
    error: Option<String>,
}

impl From<WireOutcome> for BatchOutcome {
    fn from(wire: WireOutcome) -> Self {
        if wire.added {
            BatchOutcome::success()
        } else {
            BatchOutcome::failure(wire.error.unwrap_or_default())
        }
    }
}

/// Decode the batch response body into outcomes, in response order.
pub fn parse_outcomes(body: serde_json::Value) -> Result<Vec<BatchOutcome>> {
    let wire: Vec<WireOutcome> = serde_json::from_value(body)
        .map_err(|e| Error::MalformedResponse(format!("batch response: {}", e)))?;
    Ok(wire.into_iter().map(BatchOutcome::from).collect())
}

#[derive(Debug, Clone)]
struct BatchEntry {
    document: Document,
    outcome: BatchOutcome,
}

/// Per-document results of a batch submission, in submission order.
#[derive(Debug, Clone)]
pub struct BatchResultSet {
    entries: Vec<BatchEntry>,
    has_errors: bool,
}

impl BatchResultSet {
    pub fn new(documents: Vec<Document>, outcomes: Vec<BatchOutcome>) -> Result<Self> {
        if documents.len() != outcomes.len() {
            return Err(Error::StructuralMismatch {
                documents: documents.len(),
                outcomes: outcomes.len(),
            });
        }

        let entries: Vec<BatchEntry> = documents
            .into_iter()
            .zip(outcomes)
            .map(|(document, outcome)| BatchEntry { document, outcome })
            .collect();
        let has_errors = entries.iter().any(|e| !e.outcome.succeeded);

        Ok(Self { entries, has_errors })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_result(&self, position: usize) -> Result<bool> {
        Ok(self.entry(position)?.outcome.succeeded)
    }

    /// `None` when the document at `position` was indexed.
    pub fn get_error_message(&self, position: usize) -> Result<Option<&str>> {
        Ok(self.entry(position)?.outcome.error_message())
    }

    pub fn get_document(&self, position: usize) -> Result<&Document> {
        Ok(&self.entry(position)?.document)
    }

    /// True if at least one document failed to be indexed.
    pub fn has_errors(&self) -> bool {
        self.has_errors
    }

    pub fn failure_count(&self) -> usize {
        self.failed_documents().count()
    }

    /// Documents that could not be indexed, in submission order.
    ///
    /// Each call starts a fresh pass. Feed it back to
    /// [`Index::add_documents`](crate::client::Index::add_documents) to retry.
    pub fn failed_documents(&self) -> FailedDocuments<'_> {
        FailedDocuments {
            entries: self.entries.iter(),
        }
    }

    fn entry(&self, position: usize) -> Result<&BatchEntry> {
        self.entries
            .get(position)
            .ok_or_else(|| Error::InvalidArgument(format!("position off bounds ({})", position)))
    }
}

/// Iterator over the failed documents of a [`BatchResultSet`].
#[derive(Debug, Clone)]
pub struct FailedDocuments<'a> {
    entries: std::slice::Iter<'a, BatchEntry>,
}

impl<'a> Iterator for FailedDocuments<'a> {
    type Item = &'a Document;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries
            .by_ref()
            .find(|entry| !entry.outcome.succeeded)
            .map(|entry| &entry.document)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.entries.size_hint().1)
    }
}

impl std::iter::FusedIterator for FailedDocuments<'_> {}
