use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use searchtank::{Client, ClientConfig, Document, Query};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// CLI Arguments
#[derive(Parser, Debug)]
#[command(author, version, about = "Command-line client for the searchtank search service", long_about = None)]
struct Args {
    /// API url, credentials included (falls back to SEARCHTANK_API_URL)
    #[arg(short, long)]
    api_url: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List indexes
    Indexes,
    /// Create an index
    Create { index: String },
    /// Delete an index
    Delete { index: String },
    /// Search an index
    Search {
        index: String,
        query: String,
        #[arg(long)]
        start: Option<u32>,
        #[arg(long)]
        len: Option<u32>,
        /// Scoring function number
        #[arg(long)]
        function: Option<u32>,
        /// Fields to fetch, comma separated
        #[arg(long, value_delimiter = ',')]
        fetch: Vec<String>,
        /// Fields to snippet, comma separated
        #[arg(long, value_delimiter = ',')]
        snippet: Vec<String>,
        /// Document variable filter as id:floor:ceil (`*` for unbounded)
        #[arg(long = "docvar-filter")]
        docvar_filters: Vec<String>,
        /// Function filter as id:floor:ceil (`*` for unbounded)
        #[arg(long = "function-filter")]
        function_filters: Vec<String>,
        /// Query variable as id=value
        #[arg(long = "var")]
        variables: Vec<String>,
    },
    /// Add documents from a JSON file holding an array of documents
    Add {
        index: String,
        file: PathBuf,
        /// Resubmit the documents that failed, once
        #[arg(long)]
        retry: bool,
    },
    /// Delete a document
    DeleteDoc { index: String, docid: String },
    /// List scoring functions
    Functions { index: String },
    /// Define a scoring function
    AddFunction {
        index: String,
        number: u32,
        definition: String,
    },
    /// Remove a scoring function
    DeleteFunction { index: String, number: u32 },
}

// Document as read from the input file
#[derive(Debug, Deserialize)]
struct DocumentInput {
    docid: String,
    fields: BTreeMap<String, String>,
    #[serde(default)]
    variables: Option<BTreeMap<u32, f32>>,
    #[serde(default)]
    categories: Option<BTreeMap<String, String>>,
}

impl DocumentInput {
    fn into_document(self) -> searchtank::Result<Document> {
        let mut doc = Document::new(self.docid, self.fields)?;
        if let Some(variables) = self.variables {
            doc = doc.with_variables(variables);
        }
        if let Some(categories) = self.categories {
            doc = doc.with_categories(categories);
        }
        Ok(doc)
    }
}

fn load_documents(path: &PathBuf) -> Result<Vec<Document>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let inputs: Vec<DocumentInput> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse documents in {}", path.display()))?;

    inputs
        .into_iter()
        .map(|input| input.into_document().map_err(anyhow::Error::from))
        .collect()
}

// Parse `id:floor:ceil`
fn parse_range(text: &str) -> Result<(u32, f64, f64)> {
    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() != 3 {
        bail!("Range filter must look like id:floor:ceil, got {:?}", text);
    }

    let id = parts[0].parse::<u32>().with_context(|| format!("Bad filter id in {:?}", text))?;
    let floor = match parts[1] {
        "*" => f64::NEG_INFINITY,
        value => value.parse::<f64>().with_context(|| format!("Bad floor in {:?}", text))?,
    };
    let ceil = match parts[2] {
        "*" => f64::INFINITY,
        value => value.parse::<f64>().with_context(|| format!("Bad ceil in {:?}", text))?,
    };
    Ok((id, floor, ceil))
}

// Parse `id=value`
fn parse_variable(text: &str) -> Result<(u32, f32)> {
    let (id, value) = text
        .split_once('=')
        .with_context(|| format!("Query variable must look like id=value, got {:?}", text))?;
    Ok((
        id.trim().parse::<u32>().with_context(|| format!("Bad variable id in {:?}", text))?,
        value.trim().parse::<f32>().with_context(|| format!("Bad variable value in {:?}", text))?,
    ))
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("searchtank=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let mut config = match args.api_url {
        Some(url) => ClientConfig::new(url),
        None => ClientConfig::from_env()
            .context("No API url given: pass --api-url or set SEARCHTANK_API_URL")?,
    };
    if let Some(ms) = args.timeout_ms {
        config = config.with_timeout(Duration::from_millis(ms));
    }
    let client = Client::new(&config).context("Failed to build client")?;

    match args.command {
        Command::Indexes => {
            for mut index in client.list_indexes()? {
                let name = index.name().to_string();
                let metadata = index.metadata()?;
                println!(
                    "{}\tcode={}\tstarted={}\tsize={}",
                    name,
                    metadata.code.as_deref().unwrap_or("-"),
                    metadata.started,
                    metadata.size.map_or_else(|| "-".to_string(), |s| s.to_string()),
                );
            }
        }
        Command::Create { index } => {
            client.create_index(&index)?;
            println!("Created index {}", index);
        }
        Command::Delete { index } => {
            client.delete_index(&index)?;
            println!("Deleted index {}", index);
        }
        Command::Search {
            index,
            query,
            start,
            len,
            function,
            fetch,
            snippet,
            docvar_filters,
            function_filters,
            variables,
        } => {
            let mut q = Query::for_string(query).with_fetch_fields(fetch).with_snippet_fields(snippet);
            if let Some(start) = start {
                q = q.with_start(start);
            }
            if let Some(len) = len {
                q = q.with_length(len);
            }
            if let Some(function) = function {
                q = q.with_scoring_function(function);
            }
            for filter in &docvar_filters {
                let (id, floor, ceil) = parse_range(filter)?;
                q = q.with_document_variable_filter(id, floor, ceil);
            }
            for filter in &function_filters {
                let (id, floor, ceil) = parse_range(filter)?;
                q = q.with_function_filter(id, floor, ceil);
            }
            let variables = variables
                .iter()
                .map(|v| parse_variable(v))
                .collect::<Result<Vec<_>>>()?;
            q = q.with_query_variables(variables);

            let results = client.index(index).search(&q)?;
            eprintln!("{}", results);
            print_json(&results.results)?;
            if let Some(facets) = &results.facets {
                print_json(facets)?;
            }
        }
        Command::Add { index, file, retry } => {
            let docs = load_documents(&file)?;
            let total = docs.len();
            let index = client.index(index);

            let start = Instant::now();
            let mut results = index.add_documents(docs)?;
            if retry && results.has_errors() {
                tracing::info!("Retrying {} failed documents", results.failure_count());
                let failed: Vec<Document> = results.failed_documents().cloned().collect();
                results = index.add_documents(failed)?;
            }
            let duration = start.elapsed();

            for position in 0..results.len() {
                if let Some(message) = results.get_error_message(position)? {
                    println!("{}\tfailed: {}", results.get_document(position)?.id(), message);
                }
            }
            println!(
                "Submitted {} documents in {:?}, {} failed",
                total,
                duration,
                results.failure_count()
            );
            if results.has_errors() {
                bail!("{} documents could not be indexed", results.failure_count());
            }
        }
        Command::DeleteDoc { index, docid } => {
            client.index(index).delete_document(&docid)?;
            println!("Deleted document {}", docid);
        }
        Command::Functions { index } => {
            for (number, definition) in client.index(index).list_functions()? {
                println!("{}\t{}", number, definition);
            }
        }
        Command::AddFunction {
            index,
            number,
            definition,
        } => {
            client.index(index).add_function(number, &definition)?;
            println!("Defined function {}", number);
        }
        Command::DeleteFunction { index, number } => {
            client.index(index).delete_function(number)?;
            println!("Removed function {}", number);
        }
    }

    Ok(())
}
