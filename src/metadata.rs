//! Certificate metadata records returned by `/api/v1/certificates/`.
//!
//! Fields the harness does not know about are kept in `extra`, so two
//! records compare equal only when the service returned identical JSON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Collection name used by the certificates endpoint.
pub const CERTIFICATES_COLLECTION: &str = "certificates";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CertificateMetadata {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub signed_by: String,
    #[serde(default)]
    pub signs: Vec<String>,
    #[serde(default)]
    pub versions: Vec<CertificateVersion>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CertificateVersion {
    pub id: String,
    pub expiry_date: String,
    #[serde(default)]
    pub transitional: bool,
    #[serde(default)]
    pub certificate_authority: bool,
    #[serde(default)]
    pub self_signed: bool,
    /// Absent on services that predate the field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl CertificateMetadata {
    /// Most recent version; the service lists versions newest first.
    #[must_use]
    pub fn current_version(&self) -> Option<&CertificateVersion> {
        self.versions.first()
    }

    #[must_use]
    pub fn is_self_signed_root(&self) -> bool {
        self.signed_by == self.name
    }
}

/// Body of `GET /api/v1/certificates/`.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct CertificatesResponse {
    #[serde(default)]
    pub certificates: Vec<CertificateMetadata>,
}
