use crate::error::{Error, Result};
use crate::transport::Credentials;
use reqwest::Url;
use std::time::Duration;

pub const API_URL_ENV: &str = "SEARCHTANK_API_URL";
pub const TIMEOUT_ENV: &str = "SEARCHTANK_TIMEOUT_MS";

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Client settings.
///
/// `api_url` may carry credentials in its userinfo part, e.g.
/// `http://:secret@example.api.searchtank.com/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read the configuration from the environment. `None` without an API url.
    pub fn from_env() -> Option<Self> {
        let api_url = std::env::var(API_URL_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())?;
        let timeout = parse_timeout(std::env::var(TIMEOUT_ENV).ok().as_deref());

        Some(Self::new(api_url).with_timeout(timeout))
    }
}

fn parse_timeout(value: Option<&str>) -> Duration {
    let millis = match value.map(str::trim) {
        None | Some("") => DEFAULT_TIMEOUT_MS,
        Some(text) => text.parse::<u64>().unwrap_or_else(|e| {
            tracing::warn!(
                "Ignoring {}={:?} ({}), using {} ms",
                TIMEOUT_ENV,
                text,
                e,
                DEFAULT_TIMEOUT_MS
            );
            DEFAULT_TIMEOUT_MS
        }),
    };
    Duration::from_millis(millis)
}

/// Base url (credentials removed, trailing slash guaranteed) and credentials.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Endpoint {
    pub base: Url,
    pub credentials: Option<Credentials>,
}

impl Endpoint {
    pub fn parse(api_url: &str) -> Result<Self> {
        let mut base = Url::parse(api_url.trim())
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", api_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(Error::InvalidUrl(format!("{} can not be used as a base", api_url)));
        }

        let credentials = if base.username().is_empty() && base.password().is_none() {
            None
        } else {
            Some(Credentials {
                username: base.username().to_string(),
                password: base.password().map(str::to_string),
            })
        };
        // Host-less urls reject these, but then there was no userinfo to strip
        let _ = base.set_username("");
        let _ = base.set_password(None);

        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Ok(Self { base, credentials })
    }

    /// `<base>v1/indexes/<segments...>`, each segment percent-encoded.
    pub fn indexes_url(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["v1", "indexes"]).extend(segments);
            if segments.is_empty() {
                path.push("");
            }
        }
        url
    }
}
