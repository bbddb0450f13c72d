//! Request and response bodies for the binding operations.
//!
//! Field names follow the wire format: `name`, `version`, `csr` and
//! `certificate_chain` on requests; `name`, `type` and `csr` on the sign
//! response.

use crate::key_type::KeyType;
use crate::service::{BindingService, SignedCsr};
use crate::store::KeyVersionStore;
use crate::Result;
use serde::{Deserialize, Serialize};

/// Body of a sign-CSR request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignCsrRequest {
    /// Name of the key.
    pub name: String,
    /// Key version; the latest version if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// PEM-encoded CSR template; an empty subject if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub csr: Option<String>,
}

/// Body of a sign-CSR response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignCsrResponse {
    pub name: String,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    /// PEM-encoded CSR signed by the key version.
    pub csr: String,
}

impl From<SignedCsr> for SignCsrResponse {
    fn from(signed: SignedCsr) -> Self {
        Self {
            name: signed.name,
            key_type: signed.key_type,
            csr: signed.csr,
        }
    }
}

/// Body of a set-certificate request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetCertificateRequest {
    /// Name of the key.
    pub name: String,
    /// Key version; the latest version if absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
    /// PEM-encoded certificate chain.
    pub certificate_chain: String,
}

impl<S: KeyVersionStore> BindingService<S> {
    /// Handles a sign-CSR request body.
    pub fn handle_sign_csr(&self, request: &SignCsrRequest) -> Result<SignCsrResponse> {
        self.sign_certificate_request(&request.name, request.version, request.csr.as_deref())
            .map(SignCsrResponse::from)
    }

    /// Handles a set-certificate request body. Success carries no payload.
    pub fn handle_set_certificate(&self, request: &SetCertificateRequest) -> Result<()> {
        self.import_certificate(&request.name, request.version, &request.certificate_chain)
    }
}
