//! Ephemeral PKI for the mutual TLS suites.
//!
//! Every run mints a fresh root CA and the client certificates the suites
//! present, so no fixture can silently expire in the repository. Validity
//! windows are fixed dates: far in the future for usable certificates and
//! long past for the expired one.

use crate::errors::Result;
use rcgen::{
    date_time_ymd, BasicConstraints, Certificate, CertificateParams, DnType,
    ExtendedKeyUsagePurpose, IsCa, KeyPair, KeyUsagePurpose,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const CA_FILE: &str = "ca.pem";
pub const CA_KEY_FILE: &str = "ca_key.pem";
pub const SERVER_FILE: &str = "server.pem";
pub const SERVER_KEY_FILE: &str = "server_key.pem";
pub const CLIENT_FILE: &str = "client.pem";
pub const CLIENT_KEY_FILE: &str = "client_key.pem";
pub const EXPIRED_FILE: &str = "expired.pem";
pub const EXPIRED_KEY_FILE: &str = "expired_key.pem";
pub const UNTRUSTED_FILE: &str = "untrusted.pem";
pub const UNTRUSTED_KEY_FILE: &str = "untrusted_key.pem";
pub const INTERMEDIATE_CA_FILE: &str = "intermediate_ca.pem";
pub const INTERMEDIATE_CA_KEY_FILE: &str = "intermediate_ca_key.pem";

/// Host names the generated server certificate is valid for.
pub const SERVER_NAMES: [&str; 2] = ["localhost", "127.0.0.1"];

/// One certificate and its private key, in PEM and DER.
#[derive(Clone, Debug)]
pub struct IssuedCertificate {
    pub certificate_pem: String,
    pub private_key_pem: String,
    pub certificate_der: Vec<u8>,
    /// PKCS#8 encoded.
    pub private_key_der: Vec<u8>,
}

impl IssuedCertificate {
    fn new(certificate: &Certificate, key: &KeyPair) -> Self {
        Self {
            certificate_pem: certificate.pem(),
            private_key_pem: key.serialize_pem(),
            certificate_der: certificate.der().to_vec(),
            private_key_der: key.serialize_der(),
        }
    }

    fn write(&self, dir: &Path, cert_file: &str, key_file: &str) -> Result<Vec<PathBuf>> {
        let cert_path = dir.join(cert_file);
        let key_path = dir.join(key_file);
        std::fs::write(&cert_path, &self.certificate_pem)?;
        std::fs::write(&key_path, &self.private_key_pem)?;
        debug!("Wrote {} and {}", cert_path.display(), key_path.display());
        Ok(vec![cert_path, key_path])
    }
}

/// The full fixture set for one run.
#[derive(Clone, Debug)]
pub struct GeneratedPki {
    /// Root CA trusted by both server and client.
    pub ca: IssuedCertificate,
    /// Server certificate for [`SERVER_NAMES`], signed by the root.
    pub server: IssuedCertificate,
    /// Valid client certificate signed by the root.
    pub client: IssuedCertificate,
    /// Client certificate signed by the root whose validity ended in 2001.
    pub expired: IssuedCertificate,
    /// Client certificate signed by an unrelated CA.
    pub untrusted: IssuedCertificate,
    /// CA signed by the root, path length 0.
    pub intermediate_ca: IssuedCertificate,
}

struct Authority {
    certificate: Certificate,
    key: KeyPair,
}

fn ca_params(common_name: &str) -> Result<CertificateParams> {
    let mut params = CertificateParams::new(Vec::<String>::new())?;
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = vec![
        KeyUsagePurpose::KeyCertSign,
        KeyUsagePurpose::CrlSign,
        KeyUsagePurpose::DigitalSignature,
    ];
    params.not_before = date_time_ymd(2020, 1, 1);
    params.not_after = date_time_ymd(2099, 12, 31);
    Ok(params)
}

fn leaf_params(
    common_name: &str,
    names: Vec<String>,
    purpose: ExtendedKeyUsagePurpose,
) -> Result<CertificateParams> {
    let mut params = CertificateParams::new(names)?;
    params
        .distinguished_name
        .push(DnType::CommonName, common_name);
    params.is_ca = IsCa::ExplicitNoCa;
    params.key_usages = vec![
        KeyUsagePurpose::DigitalSignature,
        KeyUsagePurpose::KeyEncipherment,
    ];
    params.extended_key_usages = vec![purpose];
    params.not_before = date_time_ymd(2020, 1, 1);
    params.not_after = date_time_ymd(2099, 12, 31);
    Ok(params)
}

impl Authority {
    fn root(common_name: &str) -> Result<Self> {
        let key = KeyPair::generate()?;
        let certificate = ca_params(common_name)?.self_signed(&key)?;
        Ok(Self { certificate, key })
    }

    fn issue(&self, params: CertificateParams) -> Result<IssuedCertificate> {
        let key = KeyPair::generate()?;
        let certificate = params.signed_by(&key, &self.certificate, &self.key)?;
        Ok(IssuedCertificate::new(&certificate, &key))
    }

    fn issued(&self) -> IssuedCertificate {
        IssuedCertificate::new(&self.certificate, &self.key)
    }
}

impl GeneratedPki {
    pub fn generate() -> Result<Self> {
        let root = Authority::root("credhub-acceptance root CA")?;
        let rogue = Authority::root("credhub-acceptance untrusted CA")?;

        let server = root.issue(leaf_params(
            "localhost",
            SERVER_NAMES.iter().map(|n| n.to_string()).collect(),
            ExtendedKeyUsagePurpose::ServerAuth,
        )?)?;

        let client = root.issue(leaf_params(
            "credhub-acceptance client",
            Vec::new(),
            ExtendedKeyUsagePurpose::ClientAuth,
        )?)?;

        let mut expired_params = leaf_params(
            "credhub-acceptance expired client",
            Vec::new(),
            ExtendedKeyUsagePurpose::ClientAuth,
        )?;
        expired_params.not_before = date_time_ymd(2000, 1, 1);
        expired_params.not_after = date_time_ymd(2001, 1, 1);
        let expired = root.issue(expired_params)?;

        let untrusted = rogue.issue(leaf_params(
            "credhub-acceptance untrusted client",
            Vec::new(),
            ExtendedKeyUsagePurpose::ClientAuth,
        )?)?;

        let mut intermediate_params = ca_params("credhub-acceptance intermediate CA")?;
        intermediate_params.is_ca = IsCa::Ca(BasicConstraints::Constrained(0));
        let intermediate_ca = root.issue(intermediate_params)?;

        info!("Generated ephemeral PKI");
        Ok(Self {
            ca: root.issued(),
            server,
            client,
            expired,
            untrusted,
            intermediate_ca,
        })
    }

    /// Writes every certificate and key under `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        written.extend(self.ca.write(dir, CA_FILE, CA_KEY_FILE)?);
        written.extend(self.server.write(dir, SERVER_FILE, SERVER_KEY_FILE)?);
        written.extend(self.client.write(dir, CLIENT_FILE, CLIENT_KEY_FILE)?);
        written.extend(self.expired.write(dir, EXPIRED_FILE, EXPIRED_KEY_FILE)?);
        written.extend(self.untrusted.write(dir, UNTRUSTED_FILE, UNTRUSTED_KEY_FILE)?);
        written.extend(self.intermediate_ca.write(
            dir,
            INTERMEDIATE_CA_FILE,
            INTERMEDIATE_CA_KEY_FILE,
        )?);
        info!("Wrote {} PKI files to {}", written.len(), dir.display());
        Ok(written)
    }
}
