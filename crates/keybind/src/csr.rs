//! Certificate Signing Request (CSR) template decoding.
//!
//! A CSR template is a PEM-encoded PKCS#10 request whose subject and
//! requested extensions seed the CSR produced for a managed key version.
//! The template's own key and signature are ignored.
//!
//! # Example
//!
//! ```
//! use keybind::decode_csr;
//!
//! // An empty template is valid and produces a CSR with an empty subject.
//! let template = decode_csr("").unwrap();
//! assert!(template.is_empty());
//! ```

use crate::{Error, Result};
use openssl::stack::Stack;
use openssl::x509::{X509Extension, X509NameRef, X509Req, X509ReqRef};

const CSR_LABEL: &str = "CERTIFICATE REQUEST";
const LEGACY_CSR_LABEL: &str = "NEW CERTIFICATE REQUEST";

/// Subject and extension attributes taken from a caller-supplied CSR.
#[derive(Default)]
pub struct CsrTemplate {
    /// The decoded request, or `None` for the empty template.
    request: Option<X509Req>,
}

impl CsrTemplate {
    /// Returns true if this is the empty template.
    pub fn is_empty(&self) -> bool {
        self.request.is_none()
    }

    /// Returns the template's subject name, if a template was supplied.
    pub fn subject(&self) -> Option<&X509NameRef> {
        self.request.as_deref().map(X509ReqRef::subject_name)
    }

    /// Returns the subject entries as `(short name, value)` pairs, in order.
    pub fn subject_entries(&self) -> Vec<(String, String)> {
        let Some(subject) = self.subject() else {
            return Vec::new();
        };
        subject
            .entries()
            .map(|entry| {
                let field = entry
                    .object()
                    .nid()
                    .short_name()
                    .map(str::to_string)
                    .unwrap_or_else(|_| entry.object().to_string());
                let value = String::from_utf8_lossy(entry.data().as_slice()).into_owned();
                (field, value)
            })
            .collect()
    }

    /// Returns the extensions the template requests, if any.
    pub fn requested_extensions(&self) -> Option<Stack<X509Extension>> {
        // OpenSSL reports a request without an extension attribute as an error.
        self.request.as_deref().and_then(|req| req.extensions().ok())
    }
}

impl std::fmt::Debug for CsrTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrTemplate")
            .field("subject", &self.subject_entries())
            .finish()
    }
}

/// Decodes a PEM-encoded CSR template.
///
/// An empty (or whitespace-only) string yields [`CsrTemplate::default`].
/// Otherwise the first PEM block must be a certificate request whose DER
/// parses as PKCS#10.
///
/// # Errors
///
/// Returns [`Error::MalformedInput`] if the PEM or the request cannot be decoded.
pub fn decode_csr(pem_str: &str) -> Result<CsrTemplate> {
    if pem_str.trim().is_empty() {
        return Ok(CsrTemplate::default());
    }

    let block = pem::parse(pem_str)
        .map_err(|e| Error::MalformedInput(format!("could not decode PEM certificate request: {e}")))?;

    if block.tag() != CSR_LABEL && block.tag() != LEGACY_CSR_LABEL {
        return Err(Error::MalformedInput(format!(
            "expected a PEM '{CSR_LABEL}' block, found '{}'",
            block.tag()
        )));
    }

    let request = X509Req::from_der(block.contents())
        .map_err(|e| Error::MalformedInput(format!("failed to parse certificate request: {e}")))?;

    Ok(CsrTemplate {
        request: Some(request),
    })
}
