//! Mapping from HTTP responses to call outcomes.
//!
//! Every call names its [`Operation`]; the operation declares which non-success
//! statuses carry meaning. 200 and 201 are success for every operation and
//! anything else is [`Error::UnexpectedStatus`].

use crate::error::{Error, Result};
use crate::transport::HttpResponse;
use serde_json::Value;

/// Remote operations, as far as status interpretation is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    CreateIndex,
    DeleteIndex,
    IndexMetadata,
    ListIndexes,
    Search,
    AddDocument,
    AddDocuments,
    DeleteDocument,
    UpdateDocument,
    Promote,
    AddFunction,
    DeleteFunction,
    ListFunctions,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::CreateIndex => "create index",
            Operation::DeleteIndex => "delete index",
            Operation::IndexMetadata => "index metadata",
            Operation::ListIndexes => "list indexes",
            Operation::Search => "search",
            Operation::AddDocument => "add document",
            Operation::AddDocuments => "add documents",
            Operation::DeleteDocument => "delete document",
            Operation::UpdateDocument => "update document",
            Operation::Promote => "promote",
            Operation::AddFunction => "add function",
            Operation::DeleteFunction => "delete function",
            Operation::ListFunctions => "list functions",
        }
    }

    /// The failure this operation declares for `status`, if any.
    fn declared_failure(self, status: u16) -> Option<fn(String) -> Error> {
        use Operation::*;

        let failure: fn(String) -> Error = match (self, status) {
            (CreateIndex, 204) => Error::IndexAlreadyExists,
            (CreateIndex, 409) => Error::QuotaExceeded,
            (Search, 400) => Error::InvalidQuerySyntax,
            (AddDocument, 400) => Error::InvalidArgument,
            (AddFunction, 400) => Error::InvalidFunctionSyntax,
            (
                DeleteIndex | IndexMetadata | AddDocument | AddDocuments | DeleteDocument
                | UpdateDocument | Promote | AddFunction | DeleteFunction | ListFunctions,
                404,
            ) => Error::IndexDoesNotExist,
            _ => return None,
        };
        Some(failure)
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Interpret a fully read response for `operation`.
///
/// Success yields the parsed JSON body, or `None` when the body is empty.
pub fn interpret(operation: Operation, response: HttpResponse) -> Result<Option<Value>> {
    let HttpResponse { status, body } = response;

    if status == 200 || status == 201 {
        if body.trim().is_empty() {
            return Ok(None);
        }
        return serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| Error::MalformedResponse(format!("{}: {}", operation, e)));
    }

    match operation.declared_failure(status) {
        Some(failure) => Err(failure(body)),
        None => Err(Error::UnexpectedStatus { status, body }),
    }
}
