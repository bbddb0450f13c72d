//! X.509 certificate chain decoding.
//!
//! A certificate chain arrives as one or more concatenated PEM
//! `CERTIFICATE` blocks. Each block is parsed twice: structurally with
//! `x509-parser` (basic constraints) and with OpenSSL (the subject public
//! key, used for key matching).

use crate::{Error, Result};
use openssl::pkey::{Id, PKey, PKeyRef, Public};
use openssl::x509::X509;
use std::fmt;

const CERTIFICATE_LABEL: &str = "CERTIFICATE";
const PEM_BEGIN: &str = "-----BEGIN ";
const PEM_DASHES: &str = "-----";

/// Public key algorithm of a certificate's subject public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublicKeyAlgorithm {
    Rsa,
    Dsa,
    Ecdsa,
    Ed25519,
    Unknown,
}

impl PublicKeyAlgorithm {
    fn from_pkey_id(id: Id) -> Self {
        match id {
            Id::RSA => PublicKeyAlgorithm::Rsa,
            Id::DSA => PublicKeyAlgorithm::Dsa,
            Id::EC => PublicKeyAlgorithm::Ecdsa,
            Id::ED25519 => PublicKeyAlgorithm::Ed25519,
            _ => PublicKeyAlgorithm::Unknown,
        }
    }
}

impl fmt::Display for PublicKeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PublicKeyAlgorithm::Rsa => "RSA",
            PublicKeyAlgorithm::Dsa => "DSA",
            PublicKeyAlgorithm::Ecdsa => "ECDSA",
            PublicKeyAlgorithm::Ed25519 => "Ed25519",
            PublicKeyAlgorithm::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// A parsed X.509 certificate.
#[derive(Clone)]
pub struct Certificate {
    /// DER-encoded certificate data.
    der: Vec<u8>,
    /// OpenSSL view of the same certificate.
    x509: X509,
    /// Subject public key.
    public_key: PKey<Public>,
    public_key_algorithm: PublicKeyAlgorithm,
    /// The basic constraints extension is present and well-formed.
    basic_constraints_valid: bool,
    /// The basic constraints extension asserts `cA = TRUE`.
    is_ca: bool,
    subject: String,
}

impl Certificate {
    /// Parses a certificate from DER-encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedInput`] if the certificate cannot be parsed
    /// or its public key cannot be loaded.
    pub fn from_der(der: Vec<u8>) -> Result<Self> {
        let (basic_constraints_valid, is_ca, subject) = {
            let (remainder, cert) = x509_parser::parse_x509_certificate(&der).map_err(|e| {
                Error::MalformedInput(format!("failed to parse certificate in certificate chain: {e}"))
            })?;
            if !remainder.is_empty() {
                return Err(Error::MalformedInput(
                    "trailing data after certificate".to_string(),
                ));
            }

            // A duplicated or undecodable extension counts as absent.
            let constraints = cert.basic_constraints().ok().flatten();
            (
                constraints.is_some(),
                constraints.map(|bc| bc.value.ca).unwrap_or(false),
                cert.subject().to_string(),
            )
        };

        let x509 = X509::from_der(&der).map_err(|e| {
            Error::MalformedInput(format!("failed to parse certificate in certificate chain: {e}"))
        })?;
        let public_key = x509.public_key().map_err(|e| {
            Error::MalformedInput(format!("failed to load certificate public key: {e}"))
        })?;
        let public_key_algorithm = PublicKeyAlgorithm::from_pkey_id(public_key.id());

        Ok(Self {
            der,
            x509,
            public_key,
            public_key_algorithm,
            basic_constraints_valid,
            is_ca,
            subject,
        })
    }

    /// Returns the DER-encoded certificate.
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the OpenSSL certificate.
    pub fn x509(&self) -> &X509 {
        &self.x509
    }

    /// Returns the PEM-encoded certificate.
    pub fn to_pem(&self) -> Result<String> {
        let pem = self
            .x509
            .to_pem()
            .map_err(|e| Error::Internal(format!("failed to PEM-encode certificate: {e}")))?;
        String::from_utf8(pem)
            .map_err(|e| Error::Internal(format!("PEM encoding is not UTF-8: {e}")))
    }

    /// Returns the subject public key.
    pub fn public_key(&self) -> &PKeyRef<Public> {
        &self.public_key
    }

    /// Returns the subject public key algorithm.
    pub fn public_key_algorithm(&self) -> PublicKeyAlgorithm {
        self.public_key_algorithm
    }

    /// Returns true if the certificate carries a well-formed basic
    /// constraints extension.
    pub fn basic_constraints_valid(&self) -> bool {
        self.basic_constraints_valid
    }

    /// Returns true if basic constraints mark this certificate as a CA.
    pub fn is_ca(&self) -> bool {
        self.is_ca
    }

    /// Returns the certificate's subject as a string.
    pub fn subject(&self) -> &str {
        &self.subject
    }
}

impl PartialEq for Certificate {
    fn eq(&self, other: &Self) -> bool {
        self.der == other.der
    }
}

impl Eq for Certificate {}

impl fmt::Debug for Certificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Certificate")
            .field("subject", &self.subject)
            .field("public_key_algorithm", &self.public_key_algorithm)
            .field("basic_constraints_valid", &self.basic_constraints_valid)
            .field("is_ca", &self.is_ca)
            .finish()
    }
}

/// An ordered sequence of certificates, in input order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    certificates: Vec<Certificate>,
}

impl CertificateChain {
    /// Creates a chain from already-parsed certificates.
    pub fn new(certificates: Vec<Certificate>) -> Self {
        Self { certificates }
    }

    /// Returns the certificates in order.
    pub fn certificates(&self) -> &[Certificate] {
        &self.certificates
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Certificate> {
        self.certificates.iter()
    }

    /// Returns the chain as concatenated PEM blocks.
    pub fn to_pem(&self) -> Result<String> {
        self.certificates
            .iter()
            .map(Certificate::to_pem)
            .collect::<Result<Vec<_>>>()
            .map(|blocks| blocks.concat())
    }
}

impl<'a> IntoIterator for &'a CertificateChain {
    type Item = &'a Certificate;
    type IntoIter = std::slice::Iter<'a, Certificate>;

    fn into_iter(self) -> Self::IntoIter {
        self.certificates.iter()
    }
}

/// Splits the first PEM block off the front of `input`.
///
/// Only whitespace may precede the block. Returns `None` once nothing but
/// whitespace remains.
fn next_pem_block(input: &str) -> Result<Option<(pem::Pem, &str)>> {
    let input = input.trim_start();
    if input.is_empty() {
        return Ok(None);
    }

    let Some(header) = input.strip_prefix(PEM_BEGIN) else {
        return Err(Error::MalformedInput(
            "unexpected data outside of a PEM block in certificate chain".to_string(),
        ));
    };
    let label = header
        .split_once(PEM_DASHES)
        .map(|(label, _)| label)
        .filter(|label| !label.contains('\n'))
        .ok_or_else(|| {
            Error::MalformedInput("malformed PEM header in certificate chain".to_string())
        })?;

    let end_marker = format!("-----END {label}-----");
    let end = input
        .find(&end_marker)
        .filter(|&end| !input[PEM_BEGIN.len()..end].contains(PEM_BEGIN))
        .ok_or_else(|| {
            Error::MalformedInput(format!("PEM block '{label}' in certificate chain has no END line"))
        })?;

    let mut block_end = end + end_marker.len();
    let tail = &input[block_end..];
    if tail.starts_with("\r\n") {
        block_end += 2;
    } else if tail.starts_with('\n') {
        block_end += 1;
    }

    let (block, rest) = input.split_at(block_end);
    let block = pem::parse(block).map_err(|e| {
        Error::MalformedInput(format!("could not decode certificate in certificate chain: {e}"))
    })?;
    Ok(Some((block, rest)))
}

/// Decodes a PEM-encoded certificate chain.
///
/// Blocks are consumed from the front until only whitespace remains. Every
/// block must be a `CERTIFICATE`; the output preserves input order.
///
/// # Errors
///
/// Returns [`Error::MalformedInput`] if a block cannot be decoded or parsed,
/// if anything other than whitespace lies outside the blocks, or if the
/// input contains no certificates.
pub fn decode_certificate_chain(pem_str: &str) -> Result<CertificateChain> {
    let mut certificates = Vec::new();
    let mut rest = pem_str;

    while let Some((block, remainder)) = next_pem_block(rest)? {
        if block.tag() != CERTIFICATE_LABEL {
            return Err(Error::MalformedInput(format!(
                "block {} of certificate chain is '{}', expected '{CERTIFICATE_LABEL}'",
                certificates.len(),
                block.tag()
            )));
        }
        certificates.push(Certificate::from_der(block.into_contents())?);
        rest = remainder;
    }

    if certificates.is_empty() {
        return Err(Error::MalformedInput(
            "no certificates provided in certificate chain".to_string(),
        ));
    }

    Ok(CertificateChain::new(certificates))
}
