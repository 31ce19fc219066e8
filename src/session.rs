//! CLI invocations used by the CLI suite.
//!
//! [`CliSession`] only assembles argument vectors; it never interprets the
//! CLI's output. Each call returns the raw [`ProcessResult`] so tests decide
//! what a pass looks like.

use crate::configuration::TestConfig;
use crate::errors::{HarnessError, Result};
use crate::fixture::FixtureEnvironment;
use crate::output::CredentialType;
use crate::process::{BuiltBinary, ProcessResult, ProcessRunner};
use crate::traits::CommandRunner;
use std::sync::Arc;
use tracing::debug;

/// Everything a CLI test needs from suite setup, passed explicitly.
#[derive(Clone, Debug)]
pub struct SuiteContext {
    pub config: TestConfig,
    pub binary: Arc<BuiltBinary>,
}

impl SuiteContext {
    pub fn new(config: TestConfig, binary: Arc<BuiltBinary>) -> Self {
        Self { config, binary }
    }

    /// A session that runs the suite binary inside `fixture`.
    pub fn session(&self, fixture: &FixtureEnvironment) -> CliSession<ProcessRunner> {
        CliSession::new(ProcessRunner::for_binary(&self.binary).with_fixture(fixture))
    }
}

pub struct CliSession<R> {
    runner: R,
}

impl<R: CommandRunner> CliSession<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    /// Runs the CLI with `args` exactly as given.
    pub fn run(&self, args: &[&str]) -> Result<ProcessResult> {
        self.runner
            .run_command(args.iter().map(|a| a.to_string()).collect())
    }

    /// `api <url>`
    pub fn target(&self, api_url: &str) -> Result<ProcessResult> {
        self.run(&["api", api_url])
    }

    /// `login -u <user> -p <password>`
    pub fn login(&self, username: &str, password: &str) -> Result<ProcessResult> {
        self.run(&["login", "-u", username, "-p", password])
    }

    /// Targets the configured API and logs in. Either step exiting non-zero
    /// is a setup failure.
    pub fn establish(&self, config: &TestConfig) -> Result<()> {
        ensure_success("api", &self.target(&config.api_url)?)?;
        ensure_success("login", &self.login(&config.username, &config.password)?)?;
        debug!("CLI session established against {}", config.api_url);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<ProcessResult> {
        self.run(&["get", "-n", name])
    }

    pub fn delete(&self, name: &str) -> Result<ProcessResult> {
        self.run(&["delete", "-n", name])
    }

    /// `set -n <name> -t <type>` followed by type-specific flags.
    pub fn set(
        &self,
        name: &str,
        credential_type: &CredentialType,
        extra: &[&str],
    ) -> Result<ProcessResult> {
        let credential_type = credential_type.to_string();
        let mut args = vec!["set", "-n", name, "-t", credential_type.as_str()];
        args.extend_from_slice(extra);
        self.run(&args)
    }

    /// Sets a value credential; `no_overwrite` adds `--no-overwrite`.
    pub fn set_value(&self, name: &str, value: &str, no_overwrite: bool) -> Result<ProcessResult> {
        let mut extra = vec!["-v", value];
        if no_overwrite {
            extra.push("--no-overwrite");
        }
        self.set(name, &CredentialType::Value, &extra)
    }

    pub fn set_certificate_string(&self, name: &str, certificate: &str) -> Result<ProcessResult> {
        self.set(
            name,
            &CredentialType::Certificate,
            &["--certificate-string", certificate],
        )
    }

    /// Sets an `ssh` or `rsa` key pair with `-U` and `-P`.
    pub fn set_key_pair(
        &self,
        name: &str,
        credential_type: &CredentialType,
        public_key: &str,
        private_key: &str,
    ) -> Result<ProcessResult> {
        self.set(name, credential_type, &["-U", public_key, "-P", private_key])
    }

    /// `generate -n <name> -t <type>` followed by type-specific flags.
    pub fn generate(
        &self,
        name: &str,
        credential_type: &CredentialType,
        extra: &[&str],
    ) -> Result<ProcessResult> {
        let credential_type = credential_type.to_string();
        let mut args = vec!["generate", "-n", name, "-t", credential_type.as_str()];
        args.extend_from_slice(extra);
        self.run(&args)
    }

    /// Generates a certificate with `common_name` signed by the CA `ca`.
    pub fn generate_certificate(&self, name: &str, common_name: &str, ca: &str) -> Result<ProcessResult> {
        self.generate(
            name,
            &CredentialType::Certificate,
            &["--common-name", common_name, "--ca", ca],
        )
    }

    pub fn ca_get(&self, name: &str) -> Result<ProcessResult> {
        self.run(&["ca-get", "-n", name])
    }

    pub fn ca_generate(&self, name: &str, common_name: &str) -> Result<ProcessResult> {
        self.run(&["ca-generate", "-n", name, "--common-name", common_name])
    }
}

fn ensure_success(step: &str, result: &ProcessResult) -> Result<()> {
    if result.success() {
        return Ok(());
    }
    Err(HarnessError::fixture(
        step,
        format!(
            "exited with {}: {}",
            result.exit_code,
            result.stderr_str().trim()
        ),
    ))
}
