//! Upstream URL composition.
//!
//! `{base}/{path}?{param}={credential}` followed by `&{query}` when the client
//! sent one. Path and query are passed through untouched; rejecting malformed
//! values is the upstream's job.

use crate::config::{Credential, UpstreamConfig};

/// Fixed upstream base plus the injected credential.
#[derive(Debug, Clone)]
pub struct UpstreamTarget {
    base_url: String,
    param: String,
    credential: Credential,
}

impl UpstreamTarget {
    pub fn new(base_url: impl Into<String>, param: impl Into<String>, credential: Credential) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            param: param.into(),
            credential,
        }
    }

    /// Build from validated config. `None` only when the credential is absent.
    pub fn from_config(config: &UpstreamConfig) -> Option<Self> {
        let credential = config.api_key.clone().filter(|key| !key.is_empty())?;
        Some(Self::new(
            config.base_url.clone(),
            config.credential_param.clone(),
            credential,
        ))
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Full target URL including the credential.
    pub fn url_for(&self, path: &str, query: Option<&str>) -> String {
        self.compose(path, &self.credential.encoded(), query)
    }

    /// Same URL with the credential masked, for logs.
    pub fn display_for(&self, path: &str, query: Option<&str>) -> String {
        let masked = self.compose(path, crate::config::secret::REDACTED, query);
        self.credential.redact(&masked)
    }

    fn compose(&self, path: &str, key: &str, query: Option<&str>) -> String {
        let path = path.strip_prefix('/').unwrap_or(path);
        let mut url = format!("{}/{}?{}={}", self.base_url, path, self.param, key);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('&');
            url.push_str(query);
        }
        url
    }
}
