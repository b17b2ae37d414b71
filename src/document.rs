use crate::error::{Error, Result};
use serde::Serialize;
use std::collections::BTreeMap;

/// Longest accepted document id, in UTF-8 bytes.
pub const MAX_DOCID_BYTES: usize = 1024;

/// Document to be added to an index.
///
/// Serializes to the submission shape `{docid, fields, variables?, categories?}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Document {
    #[serde(rename = "docid")]
    id: String,
    fields: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    variables: Option<BTreeMap<u32, f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    categories: Option<BTreeMap<String, String>>,
}

impl Document {
    pub fn new(id: impl Into<String>, fields: BTreeMap<String, String>) -> Result<Self> {
        let id = id.into();
        validate_docid(&id)?;

        Ok(Self {
            id,
            fields,
            variables: None,
            categories: None,
        })
    }

    /// Attach scoring variables.
    pub fn with_variables(mut self, variables: BTreeMap<u32, f32>) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Attach faceting categories.
    pub fn with_categories(mut self, categories: BTreeMap<String, String>) -> Self {
        self.categories = Some(categories);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn variables(&self) -> Option<&BTreeMap<u32, f32>> {
        self.variables.as_ref()
    }

    pub fn categories(&self) -> Option<&BTreeMap<String, String>> {
        self.categories.as_ref()
    }
}

pub(crate) fn validate_docid(id: &str) -> Result<()> {
    if id.len() > MAX_DOCID_BYTES {
        return Err(Error::InvalidArgument(format!(
            "document id can not be longer than {} bytes when UTF-8 encoded (got {})",
            MAX_DOCID_BYTES,
            id.len()
        )));
    }
    Ok(())
}
