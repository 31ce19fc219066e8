//! Assertions over subprocess output and API responses.
//!
//! Text assertions always name the stream they inspect: success output is
//! checked on stdout, user-facing errors on stderr. A failing assertion
//! panics with the expectation and the full stream it was checked against.

use crate::errors::Result;
use crate::output::CliFields;
use crate::process::ProcessResult;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt::Debug;
use std::time::Duration;

/// Resolution of timestamps stored by the service.
pub const TIMESTAMP_GRANULARITY: Duration = Duration::from_secs(1);

fn compile(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(re) => re,
        Err(e) => panic!("invalid assertion pattern {pattern:?}: {e}"),
    }
}

/// Regex matching `Key:<whitespace>value` with both parts taken literally.
pub fn field_pattern(key: &str, value: &str) -> String {
    format!(r"{}:\s+{}", regex::escape(key), regex::escape(value))
}

impl ProcessResult {
    #[track_caller]
    pub fn assert_exit_code(&self, expected: i32) -> &Self {
        assert!(
            self.exit_code == expected,
            "expected exit code {}, got {}\n--- stdout ---\n{}\n--- stderr ---\n{}",
            expected,
            self.exit_code,
            self.stdout_str(),
            self.stderr_str()
        );
        self
    }

    #[track_caller]
    pub fn assert_success(&self) -> &Self {
        self.assert_exit_code(0)
    }

    #[track_caller]
    pub fn assert_stdout_matches(&self, pattern: &str) -> &Self {
        let stdout = self.stdout_str();
        assert!(
            compile(pattern).is_match(&stdout),
            "expected stdout to match /{pattern}/\n--- stdout ---\n{stdout}"
        );
        self
    }

    #[track_caller]
    pub fn assert_stdout_not_matches(&self, pattern: &str) -> &Self {
        let stdout = self.stdout_str();
        assert!(
            !compile(pattern).is_match(&stdout),
            "expected stdout not to match /{pattern}/\n--- stdout ---\n{stdout}"
        );
        self
    }

    #[track_caller]
    pub fn assert_stderr_matches(&self, pattern: &str) -> &Self {
        let stderr = self.stderr_str();
        assert!(
            compile(pattern).is_match(&stderr),
            "expected stderr to match /{pattern}/\n--- stderr ---\n{stderr}"
        );
        self
    }

    /// Asserts a parsed stdout field has exactly `expected` as its value.
    #[track_caller]
    pub fn assert_field(&self, key: &str, expected: &str) -> &Self {
        assert_field(&self.fields(), key, expected);
        self
    }

    /// First capture group of `pattern` on stdout.
    #[must_use]
    pub fn stdout_capture(&self, pattern: &str) -> Option<String> {
        compile(pattern)
            .captures(&self.stdout_str())
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

#[track_caller]
pub fn assert_field(fields: &CliFields, key: &str, expected: &str) {
    match fields.get(key) {
        Some(actual) => assert!(
            actual == expected,
            "field {key:?}\n  expected: {expected:?}\n    actual: {actual:?}"
        ),
        None => panic!(
            "field {key:?} missing; present fields: {:?}",
            fields.keys().collect::<Vec<_>>()
        ),
    }
}

/// Decodes a JSON object of named record collections, e.g. `{"certificates": [...]}`.
pub fn decode_collections<T: DeserializeOwned>(body: &[u8]) -> Result<HashMap<String, Vec<T>>> {
    Ok(serde_json::from_slice(body)?)
}

/// The named collection, or an empty slice when the response lacks it.
pub fn collection<'a, T>(collections: &'a HashMap<String, Vec<T>>, name: &str) -> &'a [T] {
    collections.get(name).map(Vec::as_slice).unwrap_or(&[])
}

/// Asserts `expected` appears somewhere in `actual`, in any position.
#[track_caller]
pub fn assert_contains_record<T: PartialEq + Debug>(actual: &[T], expected: &T) {
    assert!(
        actual.iter().any(|record| record == expected),
        "expected collection of {} records to contain\n{:#?}\n--- actual ---\n{:#?}",
        actual.len(),
        expected,
        actual
    );
}

/// Sleeps long enough that the next write lands on a later stored timestamp.
pub fn wait_for_timestamp_tick() {
    std::thread::sleep(TIMESTAMP_GRANULARITY);
}

fn parse_timestamp(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value.trim()).ok()
}

#[track_caller]
pub fn assert_timestamp_unchanged(before: &str, after: &str) {
    assert!(
        before.trim() == after.trim(),
        "expected timestamp to stay {before:?}, got {after:?}"
    );
}

/// Asserts `after` is at least one granularity step past `before`. Values that
/// are not RFC 3339 are only required to differ.
#[track_caller]
pub fn assert_timestamp_advanced(before: &str, after: &str) {
    match (parse_timestamp(before), parse_timestamp(after)) {
        (Some(b), Some(a)) => {
            let step = chrono::Duration::from_std(TIMESTAMP_GRANULARITY)
                .unwrap_or_else(|_| chrono::Duration::seconds(1));
            assert!(
                a - b >= step,
                "expected timestamp to advance by at least {:?}: {before} -> {after}",
                TIMESTAMP_GRANULARITY
            );
        }
        _ => assert!(
            before.trim() != after.trim(),
            "expected timestamp to change from {before:?}"
        ),
    }
}
