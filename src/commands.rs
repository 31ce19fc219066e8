//! Operator command implementations.
//!
//! These back the `credhub-acceptance` binary, which prepares and checks a
//! test environment without running a suite:
//!
//! - [`config_command`]: show the effective suite configuration
//! - [`certs_command`]: write an ephemeral PKI fixture set
//! - [`probe_command`]: send one mutual TLS request
//! - [`name_command`]: mint a unique credential name or path
//!
//! Commands write to the supplied writer so they can be tested without
//! capturing the process's stdout.

use crate::configuration::TestConfig;
use crate::errors::Result;
use crate::names::{unique_credential_name, unique_credential_path, CredentialName};
use crate::pki::{self, GeneratedPki};
use crate::tls::{probe, FixturePaths, MtlsClientBuilder, MtlsProbe, ProbeRequest, PROBE_PATH};
use colored::Colorize;
use std::io::Write;
use std::path::{Path, PathBuf};
use tabular::{Row, Table};
use tracing::debug;

fn display_path(path: Option<&Path>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn display_opt(value: Option<&str>) -> String {
    value.unwrap_or("-").to_string()
}

/// Two-column table of the effective configuration. Secrets are masked.
#[must_use]
pub fn config_table(config: &TestConfig) -> Table {
    let mut table = Table::new("{:<}  {:<}");
    let secret = config.client_secret.as_deref().map(|_| "********");
    let rows = [
        ("api_url", config.api_url.clone()),
        (
            "credential_root",
            display_path(config.credential_root.as_deref()),
        ),
        ("username", config.username.clone()),
        ("client_name", display_opt(config.client_name.as_deref())),
        ("client_secret", display_opt(secret)),
        ("cli", config.build_target().to_string()),
        ("certs_dir", display_path(config.certs_dir.as_deref())),
    ];
    for (key, value) in rows {
        table.add_row(Row::new().with_cell(key).with_cell(value));
    }
    table
}

/// Prints the configuration table.
///
/// # Arguments
///
/// * `config` - The loaded suite configuration
/// * `out` - Destination for the table
pub fn config_command(config: &TestConfig, out: &mut impl Write) -> Result<()> {
    write!(out, "{}", config_table(config))?;
    Ok(())
}

/// Generates a fresh PKI and writes it to `out_dir`.
///
/// Existing files with the standard names are overwritten. Returns the paths
/// that were written.
pub fn certs_command(out_dir: &Path, out: &mut impl Write) -> Result<Vec<PathBuf>> {
    let written = GeneratedPki::generate()?.write_to(out_dir)?;
    for path in &written {
        writeln!(out, "{} {}", "wrote".green(), path.display())?;
    }
    Ok(written)
}

/// Inputs to [`probe_command`].
#[derive(Clone, Debug, Default)]
pub struct ProbeOptions {
    pub cert: PathBuf,
    pub key: PathBuf,
    /// CA bundle; defaults to `ca.pem` under the configured credential root.
    pub ca: Option<PathBuf>,
    /// Base URL; defaults to the configured `api_url`.
    pub url: Option<String>,
}

/// Sends the standard probe body over mutual TLS.
///
/// A configuration is required only for the values `options` leaves unset.
pub async fn probe_command(config: Option<&TestConfig>, options: &ProbeOptions) -> Result<MtlsProbe> {
    let missing = |what: &str| {
        crate::errors::HarnessError::ConfigMalformed(format!(
            "{what} not given and no config loaded"
        ))
    };

    let ca = match (&options.ca, config) {
        (Some(ca), _) => ca.clone(),
        (None, Some(config)) => FixturePaths::from_config(config)?.server_ca(pki::CA_FILE),
        (None, None) => return Err(missing("--ca")),
    };
    let base = match (&options.url, config) {
        (Some(url), _) => url.trim_end_matches('/').to_string(),
        (None, Some(config)) => config.api_url.trim_end_matches('/').to_string(),
        (None, None) => return Err(missing("--url")),
    };
    let url = format!("{base}{PROBE_PATH}");

    debug!("Probing {} with {}", url, options.cert.display());
    let builder = MtlsClientBuilder::new(ca, &options.cert, &options.key);
    probe(&builder, &url, &ProbeRequest::default()).await
}

/// A unique CLI credential name, or an API path ending in `path_suffix`.
#[must_use]
pub fn name_command(path_suffix: Option<&str>) -> CredentialName {
    match path_suffix {
        Some(suffix) => unique_credential_path(suffix),
        None => unique_credential_name(),
    }
}
