//! Error types for the acceptance harness.
//!
//! Harness errors are split the same way the suites treat failures: fatal
//! setup problems (config, build, fixtures, certificate files) abort a test
//! immediately, while expected negatives such as a non-zero CLI exit code or
//! a rejected TLS handshake are ordinary values the tests assert on.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for harness operations.
#[derive(Debug, Error)]
pub enum HarnessError {
    /// The config file does not exist at the expected location
    #[error("Config file not found: {}", .0.display())]
    ConfigMissing(PathBuf),

    /// The config file exists but could not be parsed or validated
    #[error("Malformed config: {0}")]
    ConfigMalformed(String),

    /// Building or resolving the binary under test failed
    #[error("Build failed: {0}")]
    Build(String),

    /// Creating or removing a fixture environment failed
    #[error("Fixture error: {0}")]
    Fixture(String),

    /// The binary under test could not be spawned
    #[error("Failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// A certificate or key fixture file is missing
    #[error("Fixture file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// A client certificate and key do not form a usable identity
    #[error("Invalid client key pair: {0}")]
    KeyPairInvalid(String),

    /// The trusted CA bundle contains no parseable certificate
    #[error("Failed to parse CA certificate: {0}")]
    CaParseFailed(String),

    /// Ephemeral certificate generation failed
    #[error("Certificate generation failed: {0}")]
    Certificate(#[from] rcgen::Error),

    /// Transport-level HTTP failure, including TLS handshake rejection
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with an error status
    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    /// A response body could not be decoded
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// File I/O operation failures
    #[error("I/O operation failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A type alias for Results that use HarnessError.
pub type Result<T> = std::result::Result<T, HarnessError>;

impl HarnessError {
    /// Creates a new Build error with context.
    pub fn build<S1, S2>(target: S1, details: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        HarnessError::Build(format!("{}: {}", target.into(), details.into()))
    }

    /// Creates a new Fixture error with context.
    pub fn fixture<S1, S2>(path: S1, details: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        HarnessError::Fixture(format!("{}: {}", path.into(), details.into()))
    }

    /// Returns true for errors that abort a suite or test instead of being asserted on.
    pub fn is_harness_fatal(&self) -> bool {
        !matches!(self, HarnessError::Request(_) | HarnessError::Api { .. })
    }

    /// Returns true if the API reported that the requested entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HarnessError::Api { status: 404, .. })
    }

    /// Returns the error category as a string for logging.
    pub fn category(&self) -> &'static str {
        match self {
            HarnessError::ConfigMissing(_) => "config_missing",
            HarnessError::ConfigMalformed(_) => "config_malformed",
            HarnessError::Build(_) => "build",
            HarnessError::Fixture(_) => "fixture",
            HarnessError::Spawn { .. } => "spawn",
            HarnessError::FileNotFound(_) => "file_not_found",
            HarnessError::KeyPairInvalid(_) => "key_pair_invalid",
            HarnessError::CaParseFailed(_) => "ca_parse_failed",
            HarnessError::Certificate(_) => "certificate",
            HarnessError::Request(_) => "request",
            HarnessError::Api { .. } => "api",
            HarnessError::Decode(_) => "decode",
            HarnessError::Io(_) => "io",
        }
    }
}

impl From<config::ConfigError> for HarnessError {
    fn from(err: config::ConfigError) -> Self {
        HarnessError::ConfigMalformed(err.to_string())
    }
}

impl From<validator::ValidationErrors> for HarnessError {
    fn from(err: validator::ValidationErrors) -> Self {
        HarnessError::ConfigMalformed(err.to_string())
    }
}
