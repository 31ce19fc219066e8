//! HTTP clients that authenticate with a client certificate.
//!
//! A client built here trusts exactly the CA bundle it was given: the
//! platform root store is disabled, so a server certificate from any other
//! issuer fails the handshake.

use crate::configuration::TestConfig;
use crate::errors::{HarnessError, Result};
use reqwest::{Certificate, Client, Identity};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Endpoint the mutual TLS probe posts to.
pub const PROBE_PATH: &str = "/api/v1/data";

fn read_fixture(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(HarnessError::FileNotFound(path.to_path_buf()));
    }
    Ok(std::fs::read(path)?)
}

fn contains_block(pem: &[u8], marker: &str) -> bool {
    String::from_utf8_lossy(pem).contains(marker)
}

/// Builds a [`reqwest::Client`] from a CA bundle and a client key pair on disk.
#[derive(Clone, Debug)]
pub struct MtlsClientBuilder {
    ca: PathBuf,
    cert: PathBuf,
    key: PathBuf,
}

impl MtlsClientBuilder {
    pub fn new(ca: impl Into<PathBuf>, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        Self {
            ca: ca.into(),
            cert: cert.into(),
            key: key.into(),
        }
    }

    fn identity(&self) -> Result<Identity> {
        let cert = read_fixture(&self.cert)?;
        let key = read_fixture(&self.key)?;

        if !contains_block(&cert, "-----BEGIN CERTIFICATE-----") {
            return Err(HarnessError::KeyPairInvalid(format!(
                "{} contains no certificate",
                self.cert.display()
            )));
        }
        if !contains_block(&key, "PRIVATE KEY-----") {
            return Err(HarnessError::KeyPairInvalid(format!(
                "{} contains no private key",
                self.key.display()
            )));
        }

        let mut bundle = cert;
        bundle.push(b'\n');
        bundle.extend_from_slice(&key);
        Identity::from_pem(&bundle).map_err(|e| {
            HarnessError::KeyPairInvalid(format!(
                "{} / {}: {}",
                self.cert.display(),
                self.key.display(),
                e
            ))
        })
    }

    fn trusted_roots(&self) -> Result<Vec<Certificate>> {
        let pem = read_fixture(&self.ca)?;
        let roots = Certificate::from_pem_bundle(&pem)
            .map_err(|e| HarnessError::CaParseFailed(format!("{}: {}", self.ca.display(), e)))?;
        if roots.is_empty() {
            return Err(HarnessError::CaParseFailed(format!(
                "{}: no certificate found",
                self.ca.display()
            )));
        }
        Ok(roots)
    }

    pub fn build(&self) -> Result<Client> {
        // Every file is checked before any is parsed, so a missing fixture
        // is always reported as missing.
        for path in [&self.ca, &self.cert, &self.key] {
            if !path.is_file() {
                return Err(HarnessError::FileNotFound(path.clone()));
            }
        }

        let roots = self.trusted_roots()?;
        let identity = self.identity()?;

        let mut builder = Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .identity(identity);
        for root in roots {
            builder = builder.add_root_certificate(root);
        }

        debug!(
            "Built mTLS client: ca={} cert={}",
            self.ca.display(),
            self.cert.display()
        );
        // rustls checks that the private key matches the certificate here.
        builder.build().map_err(|e| {
            HarnessError::KeyPairInvalid(format!(
                "{} / {}: {}",
                self.cert.display(),
                self.key.display(),
                e
            ))
        })
    }
}

/// Shorthand for `MtlsClientBuilder::new(ca, cert, key).build()`.
pub fn build_client(ca: &Path, cert: &Path, key: &Path) -> Result<Client> {
    MtlsClientBuilder::new(ca, cert, key).build()
}

/// Where the mutual TLS suites find their certificates: the server CA under
/// the credential root, client material under the certs directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixturePaths {
    pub credential_root: PathBuf,
    pub certs_dir: PathBuf,
}

impl FixturePaths {
    pub fn from_config(config: &TestConfig) -> Result<Self> {
        Ok(Self {
            credential_root: config.credential_root()?.to_path_buf(),
            certs_dir: config.certs_dir()?,
        })
    }

    #[must_use]
    pub fn server_ca(&self, file: &str) -> PathBuf {
        self.credential_root.join(file)
    }

    #[must_use]
    pub fn client_file(&self, file: &str) -> PathBuf {
        self.certs_dir.join(file)
    }

    /// Builder for a client trusting `ca_file` and presenting `cert_file`/`key_file`.
    #[must_use]
    pub fn client_builder(&self, ca_file: &str, cert_file: &str, key_file: &str) -> MtlsClientBuilder {
        MtlsClientBuilder::new(
            self.server_ca(ca_file),
            self.client_file(cert_file),
            self.client_file(key_file),
        )
    }
}

/// Body posted by the mutual TLS probe.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ProbeRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub credential_type: String,
}

impl Default for ProbeRequest {
    fn default() -> Self {
        Self {
            name: "mtlstest".to_string(),
            credential_type: "password".to_string(),
        }
    }
}

/// POSTs `body` as JSON and returns the response text, whatever the status.
pub async fn mtls_post<T: Serialize + ?Sized>(client: &Client, url: &str, body: &T) -> Result<String> {
    let response = client.post(url).json(body).send().await?;
    debug!("{} answered {}", url, response.status());
    Ok(response.text().await?)
}

/// Outcome of one mutual TLS request.
///
/// A rejected handshake is a normal outcome: `error` is set and `body` is
/// empty, never partially read.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MtlsProbe {
    pub status: Option<u16>,
    pub body: String,
    pub error: Option<String>,
}

impl MtlsProbe {
    #[must_use]
    pub fn accepted(&self) -> bool {
        self.error.is_none()
    }
}

fn describe(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Sends `body` over a client built from `builder`.
///
/// Fixture problems are returned as errors; transport failures, including
/// the server rejecting the client certificate, are recorded in the probe.
pub async fn probe<T: Serialize + ?Sized>(
    builder: &MtlsClientBuilder,
    url: &str,
    body: &T,
) -> Result<MtlsProbe> {
    let client = builder.build()?;

    let response = match client.post(url).json(body).send().await {
        Ok(response) => response,
        Err(err) => {
            info!("mTLS request to {} rejected", url);
            return Ok(MtlsProbe {
                status: None,
                body: String::new(),
                error: Some(describe(&err)),
            });
        }
    };

    let status = response.status().as_u16();
    match response.text().await {
        Ok(body) => Ok(MtlsProbe {
            status: Some(status),
            body,
            error: None,
        }),
        Err(err) => Ok(MtlsProbe {
            status: Some(status),
            body: String::new(),
            error: Some(describe(&err)),
        }),
    }
}
