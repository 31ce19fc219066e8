//! Thin client for the credential service's JSON API.
//!
//! Only the calls the acceptance suites need are wrapped. Every call maps an
//! error status to [`HarnessError::Api`] with the raw body, so a test can
//! assert on the service's message.

use crate::assertions::{collection, decode_collections};
use crate::configuration::TestConfig;
use crate::errors::{HarnessError, Result};
use crate::metadata::{CertificateMetadata, CERTIFICATES_COLLECTION};
use crate::output::CredentialType;
use crate::pki::CA_FILE;
use derive_builder::Builder;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const DATA_PATH: &str = "/api/v1/data";
pub const CERTIFICATES_PATH: &str = "/api/v1/certificates/";
pub const INFO_PATH: &str = "/info";
pub const TOKEN_PATH: &str = "/oauth/token";

/// What the service does when the credential name already exists.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OverwriteMode {
    #[default]
    Overwrite,
    NoOverwrite,
    Converge,
}

/// Body of `GET /info`.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ServerInfo {
    #[serde(rename = "auth-server")]
    pub auth_server: AuthServer,
    #[serde(default)]
    pub app: Option<AppInfo>,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AuthServer {
    pub url: String,
}

#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct AppInfo {
    pub name: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Parameters of a generated certificate. Unset fields are omitted.
#[derive(Serialize, Builder, Clone, Debug, Default, PartialEq, Eq)]
#[builder(setter(into), default)]
pub struct CertificateParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub common_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub organization: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub alternative_names: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub ca: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub is_ca: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub self_sign: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(setter(into, strip_option))]
    pub key_length: Option<u32>,
}

/// Value of a certificate credential.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct CertificateValue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_name: Option<String>,
    #[serde(default)]
    pub certificate: String,
    #[serde(default)]
    pub private_key: String,
}

/// A stored credential as returned by the data endpoints.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Credential<V> {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub credential_type: CredentialType,
    pub value: V,
    #[serde(default)]
    pub version_created_at: Option<String>,
}

pub type CertificateCredential = Credential<CertificateValue>;

#[derive(Serialize)]
struct GenerateRequest<'a, P> {
    name: &'a str,
    #[serde(rename = "type")]
    credential_type: CredentialType,
    parameters: &'a P,
    mode: OverwriteMode,
}

#[derive(Serialize)]
struct SetRequest<'a, V> {
    name: &'a str,
    #[serde(rename = "type")]
    credential_type: CredentialType,
    value: &'a V,
}

/// HTTP client for one credential service.
#[derive(Clone, Debug)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(api_url: &str, http: Client) -> Self {
        Self {
            http,
            base_url: api_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Client for the configured API. When a credential root is set, its
    /// `ca.pem` is trusted in addition to the built-in roots.
    pub fn from_config(config: &TestConfig) -> Result<Self> {
        let mut builder = Client::builder().use_rustls_tls();
        if let Some(root) = &config.credential_root {
            let ca = root.join(CA_FILE);
            if ca.is_file() {
                for certificate in reqwest::Certificate::from_pem_bundle(&std::fs::read(&ca)?)? {
                    builder = builder.add_root_certificate(certificate);
                }
                debug!("Trusting {}", ca.display());
            }
        }
        Ok(Self::new(&config.api_url, builder.build()?))
    }

    /// Authenticates with the configured UAA client.
    pub async fn authenticate_from_config(&mut self, config: &TestConfig) -> Result<()> {
        match (&config.client_name, &config.client_secret) {
            (Some(name), Some(secret)) => self.authenticate(name, secret).await,
            _ => Err(HarnessError::ConfigMalformed(
                "client_name and client_secret are required for API authentication".to_string(),
            )),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn info(&self) -> Result<ServerInfo> {
        let response = self.http.get(self.url(INFO_PATH)).send().await?;
        let body = check_status(response).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Obtains a bearer token from the service's UAA with the client
    /// credentials grant. Later requests carry the token.
    pub async fn authenticate(&mut self, client_name: &str, client_secret: &str) -> Result<()> {
        let info = self.info().await?;
        let token_url = format!(
            "{}{}",
            info.auth_server.url.trim_end_matches('/'),
            TOKEN_PATH
        );
        debug!("Requesting token from {}", token_url);

        let response = self
            .http
            .post(&token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", client_name),
                ("client_secret", client_secret),
                ("response_type", "token"),
            ])
            .send()
            .await?;
        let body = check_status(response).await?;
        let token: TokenResponse = serde_json::from_slice(&body)?;

        info!("Authenticated as {}", client_name);
        self.token = Some(token.access_token);
        Ok(())
    }

    /// Sends a request and returns the body of a successful response.
    pub async fn request<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<Vec<u8>> {
        let url = self.url(path);
        debug!("{} {}", method, url);

        let mut builder = self.http.request(method, &url).query(query);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        check_status(response).await
    }

    pub async fn generate_certificate(
        &self,
        name: &str,
        parameters: &CertificateParameters,
        mode: OverwriteMode,
    ) -> Result<CertificateCredential> {
        let request = GenerateRequest {
            name,
            credential_type: CredentialType::Certificate,
            parameters,
            mode,
        };
        let body = self
            .request(Method::POST, DATA_PATH, &[], Some(&request))
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn set_certificate(
        &self,
        name: &str,
        value: &CertificateValue,
    ) -> Result<CertificateCredential> {
        let request = SetRequest {
            name,
            credential_type: CredentialType::Certificate,
            value,
        };
        let body = self
            .request(Method::PUT, DATA_PATH, &[], Some(&request))
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Metadata records for one certificate name.
    pub async fn certificate_metadata(&self, name: &str) -> Result<Vec<CertificateMetadata>> {
        let body = self
            .request::<()>(Method::GET, CERTIFICATES_PATH, &[("name", name)], None)
            .await?;
        let collections = decode_collections(&body)?;
        Ok(collection(&collections, CERTIFICATES_COLLECTION).to_vec())
    }

    pub async fn all_certificates_metadata(&self) -> Result<Vec<CertificateMetadata>> {
        let body = self
            .request::<()>(Method::GET, CERTIFICATES_PATH, &[], None)
            .await?;
        let collections = decode_collections(&body)?;
        Ok(collection(&collections, CERTIFICATES_COLLECTION).to_vec())
    }
}

async fn check_status(response: reqwest::Response) -> Result<Vec<u8>> {
    let status = response.status();
    let body = response.bytes().await?.to_vec();
    if status.is_client_error() || status.is_server_error() {
        return Err(HarnessError::Api {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        });
    }
    Ok(body)
}
