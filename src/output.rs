//! Structured view of CLI output.
//!
//! The CLI prints credentials as aligned `Key:   value` lines. Parsing them
//! into fields lets tests compare values directly; the regex helpers in
//! [`crate::assertions`] remain for checks that are about the text format
//! itself.

use crate::process::ProcessResult;
use regex::Regex;
use serde_enum_str::{Deserialize_enum_str, Serialize_enum_str};
use std::sync::LazyLock;

static FIELD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z][A-Za-z ]*?):\s+(\S.*?)\s*$").expect("field pattern is valid")
});

/// Credential types understood by the service.
#[derive(Serialize_enum_str, Deserialize_enum_str, Debug, Clone, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CredentialType {
    Value,
    Json,
    Password,
    User,
    Certificate,
    Ssh,
    Rsa,
    /// CA type reported by `ca-generate`.
    Root,
    #[serde(other)]
    Unknown(String),
}

/// Ordered key/value pairs parsed from CLI output.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CliFields {
    entries: Vec<(String, String)>,
}

impl CliFields {
    /// Parses every `Key: value` line. Lines without that shape, such as PEM
    /// bodies, are skipped.
    pub fn parse(text: &str) -> Self {
        let entries = text
            .lines()
            .filter_map(|line| {
                FIELD_LINE
                    .captures(line)
                    .map(|caps| (caps[1].to_string(), caps[2].to_string()))
            })
            .collect();
        Self { entries }
    }

    /// First value recorded for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[must_use]
    pub fn credential_type(&self) -> Option<CredentialType> {
        self.get("Type").and_then(|t| t.parse().ok())
    }

    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.get("Value")
    }

    /// The `Updated` timestamp, as printed.
    #[must_use]
    pub fn updated(&self) -> Option<&str> {
        self.get("Updated")
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ProcessResult {
    /// Fields printed on stdout.
    #[must_use]
    pub fn fields(&self) -> CliFields {
        CliFields::parse(&self.stdout_str())
    }
}
