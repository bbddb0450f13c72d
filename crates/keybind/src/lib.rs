//! Certificate binding for versioned signing keys.
//!
//! This crate lets a caller obtain a certificate signing request built from a
//! managed key version, and later attach an externally issued certificate
//! chain back onto that same key version.
//!
//! # Components
//!
//! - [`csr`] - CSR template decoding
//! - [`certificate`] - certificate chain decoding
//! - [`chain`] - leaf detection and the key-type/algorithm compatibility table
//! - [`verifier`] - key-match verification against a key version
//! - [`store`] - the key-version store contract and an in-memory implementation
//! - [`service`] - [`BindingService`], which orchestrates the two operations
//! - [`api`] - request and response bodies for the two operations
//! - [`config`] - deployment configuration
//!
//! # Example
//!
//! ```no_run
//! use keybind::{BindingConfig, BindingService, InMemoryKeyStore, KeyType};
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryKeyStore::new());
//! store.create_key("web", KeyType::EcdsaP256).unwrap();
//!
//! let service = BindingService::new(store, BindingConfig::default());
//! let signed = service.sign_certificate_request("web", None, None).unwrap();
//! assert!(signed.csr.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
//!
//! // ... have a CA issue a certificate for `signed.csr`, then:
//! # let issued_pem = String::new();
//! service.import_certificate("web", None, &issued_pem).unwrap();
//! ```

pub mod api;
pub mod certificate;
pub mod chain;
pub mod config;
pub mod csr;
pub mod key_type;
pub mod service;
pub mod store;
pub mod verifier;

#[cfg(test)]
pub(crate) mod test_support;

pub use api::{SetCertificateRequest, SignCsrRequest, SignCsrResponse};
pub use certificate::{decode_certificate_chain, Certificate, CertificateChain, PublicKeyAlgorithm};
pub use chain::{algorithm_matches_key_type, count_leaf_certificates, has_exactly_one_leaf};
pub use config::{BindingConfig, LockingPolicy};
pub use csr::{decode_csr, CsrTemplate};
pub use key_type::KeyType;
pub use service::{BindingService, SignedCsr};
pub use store::{InMemoryKeyStore, KeyHandle, KeyLock, KeyVersionStore, LockMode};

/// Errors that can occur while binding certificates to key versions.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The named key does not exist.
    #[error("key with provided name '{0}' not found")]
    KeyNotFound(String),

    /// A key with this name already exists.
    #[error("key with provided name '{0}' already exists")]
    KeyExists(String),

    /// The key's type cannot sign and so cannot hold a certificate.
    #[error("key type '{0}' does not support signing")]
    SigningUnsupported(KeyType),

    /// PEM, CSR or certificate decoding failed.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The certificate chain did not contain exactly one leaf certificate.
    #[error("invalid certificate chain: {0}")]
    InvalidChain(String),

    /// The leaf certificate's public key algorithm is incompatible with the key type.
    #[error(
        "provided leaf certificate public key type '{algorithm}' does not match the key type '{key_type}'"
    )]
    KeyTypeMismatch {
        algorithm: PublicKeyAlgorithm,
        key_type: KeyType,
    },

    /// The leaf certificate's public key does not belong to the key version.
    #[error("leaf certificate public key does not match version {version} of key '{name}'")]
    KeyMismatch { name: String, version: u32 },

    /// The requested key version does not exist.
    #[error("version {version} of key '{name}' not found")]
    VersionNotFound { name: String, version: u32 },

    /// The key-version store failed to persist a certificate chain.
    #[error("failed to persist certificate chain: {0}")]
    PersistenceFailed(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true if the error was caused by caller input rather than by
    /// the store or the deployment.
    pub fn is_user_error(&self) -> bool {
        !matches!(
            self,
            Error::PersistenceFailed(_) | Error::Config(_) | Error::Internal(_)
        )
    }
}

/// Result type for keybind operations.
pub type Result<T> = std::result::Result<T, Error>;
