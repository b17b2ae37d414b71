use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde_json::{Map, Value};

/// Index description as returned by the service.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexMetadata {
    pub started: bool,
    pub code: Option<String>,
    /// `None` when the service sent no timestamp or one we could not read.
    pub creation_time: Option<DateTime<FixedOffset>>,
    pub size: Option<u64>,
    pub raw: Map<String, Value>,
}

impl IndexMetadata {
    pub fn from_json(value: Value) -> Result<Self> {
        let raw = match value {
            Value::Object(map) => map,
            other => {
                return Err(Error::MalformedResponse(format!(
                    "index metadata must be an object, got {}",
                    other
                )))
            }
        };

        let creation_time = match raw.get("creation_time").and_then(Value::as_str) {
            Some(text) => {
                let parsed = parse_timestamp(text);
                if parsed.is_none() {
                    tracing::warn!("Unparsable index creation time: {}", text);
                }
                parsed
            }
            None => None,
        };

        Ok(Self {
            started: raw.get("started").and_then(Value::as_bool).unwrap_or(false),
            code: raw.get("code").and_then(Value::as_str).map(str::to_string),
            creation_time,
            size: raw.get("size").and_then(Value::as_u64),
            raw,
        })
    }
}

/// Parse `yyyy-MM-ddTHH:mm:ss` followed by a zone. Zoneless input is UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%z", "%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%dT%H:%M:%S %z"] {
        if let Ok(parsed) = DateTime::parse_from_str(text, format) {
            return Some(parsed);
        }
    }

    let naive = text.strip_suffix("UTC").or_else(|| text.strip_suffix("GMT")).unwrap_or(text);
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive.trim_end(), format).ok())
        .map(|dt| dt.and_utc().fixed_offset())
}
