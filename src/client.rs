use crate::batch::{parse_outcomes, BatchResultSet};
use crate::config::{ClientConfig, Endpoint};
use crate::document::{validate_docid, Document};
use crate::error::{Error, Result};
use crate::metadata::IndexMetadata;
use crate::outcome::{interpret, Operation};
use crate::query::{ParameterMap, Query};
use crate::search::SearchResults;
use crate::transport::{HttpRequest, HttpTransport, Method, Transport};
use chrono::{DateTime, FixedOffset};
use reqwest::Url;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Entry point to the search service.
#[derive(Clone)]
pub struct Client {
    endpoint: Endpoint,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.endpoint.base.as_str())
            .finish_non_exhaustive()
    }
}

impl Client {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.timeout)?;
        Self::with_transport(&config.api_url, Arc::new(transport))
    }

    pub fn with_transport(api_url: &str, transport: Arc<dyn Transport>) -> Result<Self> {
        Ok(Self {
            endpoint: Endpoint::parse(api_url)?,
            transport,
        })
    }

    /// Handle on an index. Nothing is sent until an operation is called.
    pub fn index(&self, name: impl Into<String>) -> Index {
        Index {
            name: name.into(),
            client: self.clone(),
            metadata: None,
        }
    }

    pub fn create_index(&self, name: impl Into<String>) -> Result<Index> {
        let index = self.index(name);
        index.create()?;
        Ok(index)
    }

    pub fn delete_index(&self, name: impl Into<String>) -> Result<()> {
        self.index(name).delete()
    }

    /// All indexes of the account, with their metadata already loaded.
    pub fn list_indexes(&self) -> Result<Vec<Index>> {
        let url = self.endpoint.indexes_url(&[]);
        let response = self.call(Operation::ListIndexes, Method::Get, url, None, None)?;

        let entries = match response {
            Some(Value::Object(entries)) => entries,
            Some(other) => {
                return Err(Error::MalformedResponse(format!(
                    "index listing must be an object, got {}",
                    other
                )))
            }
            None => return Ok(Vec::new()),
        };

        entries
            .into_iter()
            .map(|(name, metadata)| -> Result<Index> {
                let mut index = self.index(name);
                index.metadata = Some(IndexMetadata::from_json(metadata)?);
                Ok(index)
            })
            .collect()
    }

    fn call(
        &self,
        operation: Operation,
        method: Method,
        url: Url,
        params: Option<ParameterMap>,
        body: Option<String>,
    ) -> Result<Option<Value>> {
        let request = HttpRequest {
            method,
            url,
            params,
            body,
            credentials: self.endpoint.credentials.clone(),
        };

        tracing::debug!(operation = %operation, method = %request.method, url = %request.url, "calling search service");
        let response = self.transport.send(&request)?;
        tracing::debug!(operation = %operation, status = response.status, "search service responded");

        interpret(operation, response)
    }
}

/// Client for one index.
#[derive(Debug, Clone)]
pub struct Index {
    name: String,
    client: Client,
    metadata: Option<IndexMetadata>,
}

impl Index {
    pub fn name(&self) -> &str {
        &self.name
    }

    fn url(&self, path: &[&str]) -> Url {
        let mut segments = vec![self.name.as_str()];
        segments.extend_from_slice(path);
        self.client.endpoint.indexes_url(&segments)
    }

    fn call(
        &self,
        operation: Operation,
        method: Method,
        path: &[&str],
        params: Option<ParameterMap>,
        body: Option<Value>,
    ) -> Result<Option<Value>> {
        let body = body.map(|value| value.to_string());
        self.client.call(operation, method, self.url(path), params, body)
    }

    // ========== Lifecycle ==========

    pub fn create(&self) -> Result<()> {
        self.call(Operation::CreateIndex, Method::Put, &[], None, None)?;
        tracing::info!("Created index {}", self.name);
        Ok(())
    }

    pub fn delete(&self) -> Result<()> {
        self.call(Operation::DeleteIndex, Method::Delete, &[], None, None)?;
        tracing::info!("Deleted index {}", self.name);
        Ok(())
    }

    pub fn exists(&mut self) -> Result<bool> {
        match self.refresh_metadata() {
            Ok(_) => Ok(true),
            Err(Error::IndexDoesNotExist(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn refresh_metadata(&mut self) -> Result<&IndexMetadata> {
        let response = self.call(Operation::IndexMetadata, Method::Get, &[], None, None)?;
        let value = response
            .ok_or_else(|| Error::MalformedResponse("empty index metadata".to_string()))?;
        Ok(&*self.metadata.insert(IndexMetadata::from_json(value)?))
    }

    /// Cached metadata, fetched on first use.
    pub fn metadata(&mut self) -> Result<&IndexMetadata> {
        if self.metadata.is_none() {
            self.refresh_metadata()?;
        }
        self.metadata
            .as_ref()
            .ok_or_else(|| Error::MalformedResponse("index metadata missing".to_string()))
    }

    /// Always asks the service: an index starts asynchronously after creation.
    pub fn has_started(&mut self) -> Result<bool> {
        Ok(self.refresh_metadata()?.started)
    }

    pub fn code(&mut self) -> Result<Option<String>> {
        Ok(self.metadata()?.code.clone())
    }

    pub fn creation_time(&mut self) -> Result<Option<DateTime<FixedOffset>>> {
        Ok(self.metadata()?.creation_time)
    }

    // ========== Search ==========

    pub fn search(&self, query: &Query) -> Result<SearchResults> {
        let params = query.to_parameter_map();
        let response = self.call(Operation::Search, Method::Get, &["search"], Some(params), None)?;
        let value =
            response.ok_or_else(|| Error::MalformedResponse("empty search response".to_string()))?;
        SearchResults::from_json(value)
    }

    pub fn search_str(&self, query: &str) -> Result<SearchResults> {
        self.search(&Query::for_string(query))
    }

    // ========== Documents ==========

    pub fn add_document(&self, document: &Document) -> Result<()> {
        let body = to_json(document)?;
        self.call(Operation::AddDocument, Method::Put, &["docs"], None, Some(body))?;
        Ok(())
    }

    /// Index a batch of documents in one request.
    ///
    /// Per-document failures do not fail the call; inspect the returned set
    /// and feed [`BatchResultSet::failed_documents`] back here to retry them.
    pub fn add_documents<I>(&self, documents: I) -> Result<BatchResultSet>
    where
        I: IntoIterator<Item = Document>,
    {
        let documents: Vec<Document> = documents.into_iter().collect();
        let body = to_json(&documents)?;

        let response = self.call(Operation::AddDocuments, Method::Put, &["docs"], None, Some(body))?;
        let value =
            response.ok_or_else(|| Error::MalformedResponse("empty batch response".to_string()))?;
        let outcomes = parse_outcomes(value)?;

        let results = BatchResultSet::new(documents, outcomes)?;
        if results.has_errors() {
            tracing::warn!(
                "{} of {} documents failed to index in {}",
                results.failure_count(),
                results.len(),
                self.name
            );
        }
        Ok(results)
    }

    pub fn delete_document(&self, docid: &str) -> Result<()> {
        validate_docid(docid)?;
        let params = ParameterMap::from([("docid".to_string(), docid.to_string())]);
        self.call(Operation::DeleteDocument, Method::Delete, &["docs"], Some(params), None)?;
        Ok(())
    }

    pub fn update_variables(&self, docid: &str, variables: &BTreeMap<u32, f32>) -> Result<()> {
        validate_docid(docid)?;
        let body = json!({"docid": docid, "variables": variables});
        self.call(Operation::UpdateDocument, Method::Put, &["docs", "variables"], None, Some(body))?;
        Ok(())
    }

    pub fn update_categories(&self, docid: &str, categories: &BTreeMap<String, String>) -> Result<()> {
        validate_docid(docid)?;
        let body = json!({"docid": docid, "categories": categories});
        self.call(Operation::UpdateDocument, Method::Put, &["docs", "categories"], None, Some(body))?;
        Ok(())
    }

    /// Pin a document to the top of the results for `query`.
    pub fn promote(&self, docid: &str, query: &str) -> Result<()> {
        validate_docid(docid)?;
        let body = json!({"docid": docid, "query": query});
        self.call(Operation::Promote, Method::Put, &["promote"], None, Some(body))?;
        Ok(())
    }

    // ========== Scoring functions ==========

    pub fn add_function(&self, function: u32, definition: &str) -> Result<()> {
        let number = function.to_string();
        let body = json!({"definition": definition});
        self.call(Operation::AddFunction, Method::Put, &["functions", number.as_str()], None, Some(body))?;
        Ok(())
    }

    pub fn delete_function(&self, function: u32) -> Result<()> {
        let number = function.to_string();
        self.call(Operation::DeleteFunction, Method::Delete, &["functions", number.as_str()], None, None)?;
        Ok(())
    }

    pub fn list_functions(&self) -> Result<BTreeMap<u32, String>> {
        let response = self.call(Operation::ListFunctions, Method::Get, &["functions"], None, None)?;
        let entries = match response {
            Some(Value::Object(entries)) => entries,
            None => return Ok(BTreeMap::new()),
            Some(other) => {
                return Err(Error::MalformedResponse(format!(
                    "function listing must be an object, got {}",
                    other
                )))
            }
        };

        entries
            .into_iter()
            .map(|(number, definition)| -> Result<(u32, String)> {
                let number = number.parse::<u32>().map_err(|_| {
                    Error::MalformedResponse(format!("function index {:?} is not a number", number))
                })?;
                let definition = definition.as_str().map(str::to_string).ok_or_else(|| {
                    Error::MalformedResponse(format!("definition of function {} is not a string", number))
                })?;
                Ok((number, definition))
            })
            .collect()
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::InvalidArgument(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::HttpResponse;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records what was sent.
    #[derive(Default)]
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<HttpResponse>>>,
        requests: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedTransport {
        fn respond(&self, status: u16, body: &str) -> &Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Ok(HttpResponse::new(status, body)));
            self
        }

        fn fail(&self, message: &str) -> &Self {
            self.responses
                .lock()
                .unwrap()
                .push_back(Err(Error::Transport(message.into())));
            self
        }

        fn requests(&self) -> Vec<HttpRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(500, "no scripted response")))
        }
    }

    fn setup() -> (Client, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::default());
        let client = Client::with_transport("http://:secret@api.example.com", transport.clone()).unwrap();
        (client, transport)
    }

    fn doc(id: &str) -> Document {
        let fields = BTreeMap::from([("text".to_string(), format!("text of {}", id))]);
        Document::new(id, fields).unwrap()
    }

    fn sent_body(request: &HttpRequest) -> Value {
        serde_json::from_str(request.body.as_deref().unwrap()).unwrap()
    }

    #[test]
    fn test_create_index_conflicts() {
        let (client, transport) = setup();
        transport.respond(204, "").respond(409, "too many indexes");

        assert!(matches!(client.create_index("books"), Err(Error::IndexAlreadyExists(_))));
        assert!(matches!(client.create_index("books"), Err(Error::QuotaExceeded(_))));

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::Put);
        assert_eq!(requests[0].url.as_str(), "http://api.example.com/v1/indexes/books");
        assert_eq!(requests[0].body, None);
        let credentials = requests[0].credentials.as_ref().unwrap();
        assert_eq!(credentials.password.as_deref(), Some("secret"));
    }

    #[test]
    fn test_create_index() -> Result<()> {
        let (client, transport) = setup();
        transport.respond(201, r#"{"started": false, "code": "abc"}"#);

        let index = client.create_index("books")?;
        assert_eq!(index.name(), "books");
        Ok(())
    }

    #[test]
    fn test_search_sends_compiled_parameters() -> Result<()> {
        let (client, transport) = setup();
        transport.respond(
            200,
            r#"{"matches": 1, "search_time": "0.002", "results": [{"docid": "d1"}]}"#,
        );

        let query = Query::for_string("rust")
            .with_length(5)
            .with_fetch_fields(["title"])
            .with_document_variable_filter(0, 1.0, f64::INFINITY);
        let results = client.index("books").search(&query)?;

        assert_eq!(results.matches, 1);
        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.url.path(), "/v1/indexes/books/search");
        let params = request.params.as_ref().unwrap();
        assert_eq!(params["q"], "rust");
        assert_eq!(params["len"], "5");
        assert_eq!(params["fetch"], "title");
        assert_eq!(params["filter_docvar0"], "1.0:*");
        Ok(())
    }

    #[test]
    fn test_search_syntax_error() {
        let (client, transport) = setup();
        transport.respond(400, "Invalid query: 'title:'");

        let err = client.index("books").search_str("title:").unwrap_err();
        assert!(matches!(err, Error::InvalidQuerySyntax(detail) if detail.contains("title:")));
    }

    #[test]
    fn test_batch_and_retry_failed_subset() -> Result<()> {
        let (client, transport) = setup();
        transport
            .respond(
                200,
                r#"[{"added": true}, {"added": false, "error": "e1"}, {"added": true}, {"added": false, "error": "e3"}]"#,
            )
            .respond(200, r#"[{"added": true}, {"added": true}]"#);

        let index = client.index("books");
        let results = index.add_documents(vec![doc("a"), doc("b"), doc("c"), doc("d")])?;

        assert!(results.has_errors());
        assert_eq!(results.get_error_message(1)?, Some("e1"));

        let retried = index.add_documents(results.failed_documents().cloned())?;
        assert!(!retried.has_errors());

        let requests = transport.requests();
        let first = sent_body(&requests[0]);
        assert_eq!(first.as_array().unwrap().len(), 4);
        assert_eq!(first[0]["docid"], "a");

        let second = sent_body(&requests[1]);
        let ids: Vec<&str> = second
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["docid"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["b", "d"]);
        Ok(())
    }

    #[test]
    fn test_batch_length_mismatch() {
        let (client, transport) = setup();
        transport.respond(200, r#"[{"added": true}]"#);

        let err = client
            .index("books")
            .add_documents(vec![doc("a"), doc("b")])
            .unwrap_err();
        assert!(matches!(err, Error::StructuralMismatch { documents: 2, outcomes: 1 }));
    }

    #[test]
    fn test_single_document_statuses() {
        let (client, transport) = setup();
        transport.respond(400, "bad").respond(404, "no index");
        let index = client.index("books");

        assert!(matches!(index.add_document(&doc("a")), Err(Error::InvalidArgument(_))));
        assert!(matches!(index.add_document(&doc("a")), Err(Error::IndexDoesNotExist(_))));
    }

    #[test]
    fn test_oversized_docid_never_sent() {
        let (client, transport) = setup();
        let long_id = "x".repeat(1025);
        let index = client.index("books");

        assert!(matches!(index.delete_document(&long_id), Err(Error::InvalidArgument(_))));
        assert!(matches!(index.promote(&long_id, "q"), Err(Error::InvalidArgument(_))));
        assert!(transport.requests().is_empty());
    }

    #[test]
    fn test_delete_document_uses_query_parameter() -> Result<()> {
        let (client, transport) = setup();
        transport.respond(200, "");

        client.index("books").delete_document("d1")?;

        let request = &transport.requests()[0];
        assert_eq!(request.method, Method::Delete);
        assert_eq!(request.url.path(), "/v1/indexes/books/docs");
        assert_eq!(request.params.as_ref().unwrap()["docid"], "d1");
        Ok(())
    }

    #[test]
    fn test_update_endpoints() -> Result<()> {
        let (client, transport) = setup();
        transport.respond(200, "").respond(200, "").respond(404, "");
        let index = client.index("books");

        index.update_variables("d1", &BTreeMap::from([(0, 2.5)]))?;
        index.update_categories("d1", &BTreeMap::from([("lang".to_string(), "en".to_string())]))?;
        assert!(matches!(index.promote("d1", "rust"), Err(Error::IndexDoesNotExist(_))));

        let requests = transport.requests();
        assert_eq!(requests[0].url.path(), "/v1/indexes/books/docs/variables");
        assert_eq!(sent_body(&requests[0]), json!({"docid": "d1", "variables": {"0": 2.5}}));
        assert_eq!(requests[1].url.path(), "/v1/indexes/books/docs/categories");
        assert_eq!(requests[2].url.path(), "/v1/indexes/books/promote");
        assert_eq!(sent_body(&requests[2]), json!({"docid": "d1", "query": "rust"}));
        Ok(())
    }

    #[test]
    fn test_functions() -> Result<()> {
        let (client, transport) = setup();
        transport
            .respond(400, "bad function")
            .respond(200, "")
            .respond(200, r#"{"0": "-age", "2": "relevance"}"#)
            .respond(404, "");
        let index = client.index("books");

        assert!(matches!(
            index.add_function(1, "log("),
            Err(Error::InvalidFunctionSyntax(_))
        ));
        index.delete_function(1)?;

        let functions = index.list_functions()?;
        assert_eq!(functions[&0], "-age");
        assert_eq!(functions[&2], "relevance");

        assert!(matches!(index.list_functions(), Err(Error::IndexDoesNotExist(_))));

        let requests = transport.requests();
        assert_eq!(requests[0].url.path(), "/v1/indexes/books/functions/1");
        assert_eq!(sent_body(&requests[0]), json!({"definition": "log("}));
        assert_eq!(requests[1].method, Method::Delete);
        Ok(())
    }

    #[test]
    fn test_list_indexes_preloads_metadata() -> Result<()> {
        let (client, transport) = setup();
        transport.respond(
            200,
            r#"{"books": {"started": true, "code": "b1", "creation_time": "2011-03-04T15:20:11-0300", "size": 3},
                "news": {"started": false, "code": "n1", "creation_time": "garbage", "size": 0}}"#,
        );

        let mut indexes = client.list_indexes()?;
        assert_eq!(indexes.len(), 2);
        assert_eq!(transport.requests()[0].url.as_str(), "http://api.example.com/v1/indexes/");

        let books = &mut indexes[0];
        assert_eq!(books.name(), "books");
        assert_eq!(books.code()?.as_deref(), Some("b1"));
        assert!(books.creation_time()?.is_some());

        let news = &mut indexes[1];
        assert_eq!(news.creation_time()?, None);

        // everything above came from the listing
        assert_eq!(transport.requests().len(), 1);
        Ok(())
    }

    #[test]
    fn test_exists_and_started() -> Result<()> {
        let (client, transport) = setup();
        transport
            .respond(404, "")
            .respond(200, r#"{"started": false}"#)
            .respond(200, r#"{"started": true}"#)
            .respond(500, "boom");
        let mut index = client.index("books");

        assert!(!index.exists()?);
        assert!(index.exists()?);
        assert!(index.has_started()?);
        assert!(matches!(
            index.exists(),
            Err(Error::UnexpectedStatus { status: 500, .. })
        ));
        Ok(())
    }

    #[test]
    fn test_transport_failure_passes_through() {
        let (client, transport) = setup();
        transport.fail("connection refused");

        let err = client.index("books").delete().unwrap_err();
        match err {
            Error::Transport(source) => assert_eq!(source.to_string(), "connection refused"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
