//! Email types shared by the extractor, resolver and pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw email bytes together with where they were read from.
#[derive(Debug, Clone)]
pub struct RawEmailObject {
    pub container: String,
    pub locator: String,
    pub bytes: Vec<u8>,
}

/// The parts of an email the pipeline cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedEmail {
    /// Never empty; see [`crate::email::parser::NO_SUBJECT`].
    pub subject: String,
    /// Raw `To` header value, unfolded and trimmed.
    pub to_header: Option<String>,
    /// Best-effort body: HTML part, else first plain-text part. May be empty.
    pub body: String,
}

/// Bare, lowercase recipient address.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CanonicalAddress(String);

impl CanonicalAddress {
    /// Wrap an address that has already been validated and lowercased.
    pub(crate) fn new_unchecked(address: String) -> Self {
        Self(address)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CanonicalAddress {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
