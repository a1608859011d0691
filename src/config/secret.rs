//! Server-side upstream credential.
//!
//! The credential is injected into every upstream URL and must never reach a
//! log line, an error body, or a forwarded header. `Credential` only renders
//! as `***`; the raw value is reachable through [`Credential::expose`].

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Placeholder rendered in place of the secret.
pub const REDACTED: &str = "***";

/// Secret API key appended to upstream requests.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Raw secret value. Only the URL builder should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Percent-encoded form, as it appears in a query string.
    pub fn encoded(&self) -> String {
        url::form_urlencoded::byte_serialize(self.0.as_bytes()).collect()
    }

    /// Replace every occurrence of the secret (raw or percent-encoded) in `text`.
    pub fn redact(&self, text: &str) -> String {
        if self.is_empty() {
            return text.to_string();
        }
        let redacted = text.replace(&self.0, REDACTED);
        let encoded = self.encoded();
        if encoded != self.0 {
            redacted.replace(&encoded, REDACTED)
        } else {
            redacted
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&REDACTED).finish()
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl Serialize for Credential {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(REDACTED)
    }
}

impl<'de> Deserialize<'de> for Credential {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Credential)
    }
}
