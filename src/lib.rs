//! credhub-acceptance - black-box acceptance harness for a CredHub-style
//! credential service
//!
//! The service is exercised through three surfaces, each driven by its own
//! test binary: the JSON API (`api_client_test`), the mutual TLS endpoint
//! (`api_integration_test`) and the packaged CLI (`integration`). This
//! library holds everything those suites share.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use credhub_acceptance::{
//!     names, FixtureEnvironment, SharedBuild, SuiteContext, TestConfig,
//! };
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TestConfig::load()?;
//! let build = SharedBuild::new(config.build_target());
//! let context = SuiteContext::new(config, build.get()?);
//!
//! let fixture = FixtureEnvironment::acquire()?;
//! let cli = context.session(&fixture);
//! cli.establish(&context.config)?;
//!
//! let name = names::unique_credential_name();
//! cli.get(name.as_str())?
//!     .assert_exit_code(1)
//!     .assert_stderr_matches("Secret not found");
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! - [`TestConfig`]: `config.json` from the working directory, with
//!   `CREDHUB_ACCEPTANCE_*` environment overrides
//! - [`FixtureEnvironment`]: a throwaway home directory per test
//! - [`SharedBuild`] and [`ProcessRunner`]: the CLI binary, built once and
//!   run once per step
//! - [`MtlsClientBuilder`]: HTTP clients that present a client certificate
//! - [`assertions`], [`output`] and [`metadata`]: checks over CLI text and
//!   API JSON
//! - [`GeneratedPki`]: per-run certificates for the mutual TLS suites
//!
//! # Error Handling
//!
//! Setup problems are [`HarnessError`]s and abort the test. Outcomes a test
//! asserts on are values instead: a non-zero exit code is an ordinary
//! [`ProcessResult`], a rejected handshake is an [`MtlsProbe`] with `error`
//! set, and a 404 from the API is `HarnessError::Api` with
//! [`HarnessError::is_not_found`].

pub mod api;
pub mod assertions;
pub mod commands;
pub mod configuration;
pub mod errors;
pub mod fixture;
pub mod logging;
pub mod metadata;
pub mod names;
pub mod output;
pub mod pki;
pub mod process;
pub mod session;
pub mod tls;
pub mod traits;

// Re-export commonly used types
pub use api::{ApiClient, OverwriteMode};
pub use configuration::{ConfigLoader, TestConfig, TestConfigBuilder};
pub use errors::{HarnessError, Result};
pub use fixture::FixtureEnvironment;
pub use metadata::{CertificateMetadata, CertificateVersion};
pub use output::{CliFields, CredentialType};
pub use pki::GeneratedPki;
pub use process::{BinaryBuilder, BuildTarget, BuiltBinary, ProcessResult, ProcessRunner, SharedBuild};
pub use session::{CliSession, SuiteContext};
pub use tls::{build_client, MtlsClientBuilder, MtlsProbe};
pub use traits::CommandRunner;
