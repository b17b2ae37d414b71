use std::collections::BTreeMap;
use std::fmt::Debug;

/// Flat wire parameters for a search request.
pub type ParameterMap = BTreeMap<String, String>;

/// Numeric range filter over a document variable or a scoring function.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub id: u32,
    pub floor: f64,
    pub ceil: f64,
}

impl Range {
    pub fn new(id: u32, floor: f64, ceil: f64) -> Self {
        Self { id, floor, ceil }
    }

    /// Renders as `<floor>:<ceil>`, with `*` for a floor of -inf or a ceil of +inf.
    pub fn value(&self) -> String {
        format!(
            "{}:{}",
            render_bound(self.floor, f64::NEG_INFINITY),
            render_bound(self.ceil, f64::INFINITY)
        )
    }
}

// Only the open end of each side is a wildcard; an inverted infinity is an
// empty range and goes out as written.
fn render_bound(bound: f64, open: f64) -> String {
    if bound == open {
        "*".to_string()
    } else {
        render_number(bound)
    }
}

// Integral values keep their decimal point ("1.0"), which is what the
// service has always been sent.
fn render_number<T: Debug>(value: T) -> String {
    format!("{:?}", value)
}

/// Search query builder.
///
/// Every `with_*` call consumes and returns the query. Scalars overwrite,
/// list-valued parameters accumulate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    query: String,
    start: Option<u32>,
    length: Option<u32>,
    scoring_function: Option<u32>,
    snippet_fields: Option<Vec<String>>,
    fetch_fields: Option<Vec<String>>,
    category_filters: Option<BTreeMap<String, Vec<String>>>,
    document_variable_filters: Option<Vec<Range>>,
    function_filters: Option<Vec<Range>>,
    query_variables: Option<BTreeMap<u32, f32>>,
}

impl Query {
    /// New query for the given query string; nothing is validated.
    pub fn for_string(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn query_string(&self) -> &str {
        &self.query
    }

    /// Offset of the first result.
    pub fn with_start(mut self, start: u32) -> Self {
        self.start = Some(start);
        self
    }

    /// Number of results to return.
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Rank with the given scoring function.
    pub fn with_scoring_function(mut self, function: u32) -> Self {
        self.scoring_function = Some(function);
        self
    }

    /// Fields to return snippets for.
    pub fn with_snippet_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        append(&mut self.snippet_fields, fields);
        self
    }

    /// Fields to return with each result.
    pub fn with_fetch_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        append(&mut self.fetch_fields, fields);
        self
    }

    /// Restrict results to documents whose category takes one of the given
    /// values. A category given again replaces its earlier value list.
    pub fn with_category_filters<I, K, V>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: IntoIterator,
        V::Item: Into<String>,
    {
        let mut filters = filters
            .into_iter()
            .map(|(name, values)| -> (String, Vec<String>) {
                (name.into(), values.into_iter().map(Into::into).collect())
            })
            .peekable();
        if filters.peek().is_some() {
            self.category_filters.get_or_insert_with(BTreeMap::new).extend(filters);
        }
        self
    }

    /// Keep documents whose variable lies in `[floor, ceil]`.
    pub fn with_document_variable_filter(mut self, variable: u32, floor: f64, ceil: f64) -> Self {
        self.document_variable_filters
            .get_or_insert_with(Vec::new)
            .push(Range::new(variable, floor, ceil));
        self
    }

    /// Keep documents whose function score lies in `[floor, ceil]`.
    pub fn with_function_filter(mut self, function: u32, floor: f64, ceil: f64) -> Self {
        self.function_filters
            .get_or_insert_with(Vec::new)
            .push(Range::new(function, floor, ceil));
        self
    }

    /// Set several query variables; later values win.
    pub fn with_query_variables<I>(mut self, variables: I) -> Self
    where
        I: IntoIterator<Item = (u32, f32)>,
    {
        let mut variables = variables.into_iter().peekable();
        if variables.peek().is_some() {
            self.query_variables.get_or_insert_with(BTreeMap::new).extend(variables);
        }
        self
    }

    /// Set one query variable.
    pub fn with_query_variable(mut self, variable: u32, value: f32) -> Self {
        self.query_variables
            .get_or_insert_with(BTreeMap::new)
            .insert(variable, value);
        self
    }

    /// Compile into the flat parameter map sent with a search request.
    pub fn to_parameter_map(&self) -> ParameterMap {
        let mut params = ParameterMap::new();

        params.insert("q".to_string(), self.query.clone());

        if let Some(start) = self.start {
            params.insert("start".to_string(), start.to_string());
        }
        if let Some(length) = self.length {
            params.insert("len".to_string(), length.to_string());
        }
        if let Some(function) = self.scoring_function {
            params.insert("function".to_string(), function.to_string());
        }
        if let Some(fields) = &self.snippet_fields {
            params.insert("snippet".to_string(), fields.join(","));
        }
        if let Some(fields) = &self.fetch_fields {
            params.insert("fetch".to_string(), fields.join(","));
        }
        if let Some(filters) = &self.category_filters {
            // A map of strings to string lists always serializes
            let encoded = serde_json::to_string(filters).unwrap_or_default();
            params.insert("category_filters".to_string(), encoded);
        }

        if let Some(ranges) = &self.document_variable_filters {
            add_ranges(&mut params, "filter_docvar", ranges);
        }
        if let Some(ranges) = &self.function_filters {
            add_ranges(&mut params, "filter_function", ranges);
        }

        if let Some(variables) = &self.query_variables {
            for (variable, value) in variables {
                params.insert(format!("var{}", variable), render_number(*value));
            }
        }

        params
    }
}

fn append<I, S>(target: &mut Option<Vec<String>>, values: I)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut values = values.into_iter().map(|value| -> String { value.into() }).peekable();
    if values.peek().is_some() {
        target.get_or_insert_with(Vec::new).extend(values);
    }
}

/// Ranges sharing an id are OR-ed by the service: join them under one key.
fn add_ranges(params: &mut ParameterMap, prefix: &str, ranges: &[Range]) {
    for range in ranges {
        let value = range.value();
        params
            .entry(format!("{}{}", prefix, range.id))
            .and_modify(|existing| {
                existing.push(',');
                existing.push_str(&value);
            })
            .or_insert(value);
    }
}
