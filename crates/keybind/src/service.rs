//! Certificate binding service.
//!
//! [`BindingService`] exposes the two operations that tie a certificate
//! identity to a key version:
//!
//! - [`BindingService::sign_certificate_request`] produces a CSR signed by a
//!   key version, under the key's shared lock.
//! - [`BindingService::import_certificate`] validates an issued certificate
//!   chain and attaches it to a key version, under the key's exclusive lock.
//!
//! Import validates everything before it persists anything, so a rejected
//! chain never changes stored state.

use crate::certificate::decode_certificate_chain;
use crate::chain::{algorithm_matches_key_type, single_leaf};
use crate::config::BindingConfig;
use crate::csr::decode_csr;
use crate::key_type::KeyType;
use crate::store::{KeyHandle, KeyLock, KeyVersionStore, LockMode};
use crate::verifier::verify_leaf_key_matches;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A CSR produced for a key version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedCsr {
    /// Name of the key that signed the CSR.
    pub name: String,
    /// Type of that key.
    pub key_type: KeyType,
    /// PEM-encoded CSR.
    pub csr: String,
}

/// Binds certificates to versions of keys held in a [`KeyVersionStore`].
pub struct BindingService<S: KeyVersionStore> {
    store: Arc<S>,
    config: BindingConfig,
}

impl<S: KeyVersionStore> BindingService<S> {
    /// Creates a service over the given store.
    pub fn new(store: Arc<S>, config: BindingConfig) -> Self {
        Self { store, config }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns the service configuration.
    pub fn config(&self) -> &BindingConfig {
        &self.config
    }

    /// Produces a CSR signed by `version` of the named key (latest if `None`).
    ///
    /// The CSR carries the subject and requested extensions of `csr_template`
    /// (PEM); with no template the subject is empty.
    ///
    /// # Errors
    ///
    /// - [`Error::KeyNotFound`] if the key does not exist
    /// - [`Error::SigningUnsupported`] if the key type cannot sign
    /// - [`Error::MalformedInput`] if the template cannot be decoded
    /// - any error from the store, e.g. [`Error::VersionNotFound`]
    pub fn sign_certificate_request(
        &self,
        name: &str,
        version: Option<u32>,
        csr_template: Option<&str>,
    ) -> Result<SignedCsr> {
        debug!(key = %name, ?version, "signing certificate request");

        let key = self.resolve(name)?;
        let _lock = self.acquire(&key, LockMode::Shared);

        let key_type = key.key_type();
        if !key_type.signing_supported() {
            return Err(Error::SigningUnsupported(key_type));
        }

        let template = decode_csr(csr_template.unwrap_or_default())?;
        let version = version.unwrap_or_else(|| key.latest_version());

        let csr = key.create_csr(version, &template)?;
        info!(key = %name, version, key_type = %key_type, "issued certificate signing request");

        Ok(SignedCsr {
            name: key.name().to_string(),
            key_type,
            csr,
        })
    }

    /// Validates a PEM certificate chain and attaches it to `version` of the
    /// named key (latest if `None`).
    ///
    /// The chain must contain exactly one leaf certificate, whose public key
    /// must be of the key's algorithm family and must belong to the key
    /// version. Certificates other than the leaf are stored as given.
    ///
    /// # Errors
    ///
    /// - [`Error::KeyNotFound`] if the key does not exist
    /// - [`Error::SigningUnsupported`] if the key type cannot sign
    /// - [`Error::MalformedInput`] if the chain cannot be decoded
    /// - [`Error::InvalidChain`] unless there is exactly one leaf
    /// - [`Error::KeyTypeMismatch`] if the leaf algorithm does not fit the key type
    /// - [`Error::VersionNotFound`] if the version does not exist
    /// - [`Error::KeyMismatch`] if the leaf key is not the version's key
    /// - [`Error::Internal`] if the key match could not be checked
    /// - [`Error::PersistenceFailed`] if the store could not save the chain
    pub fn import_certificate(
        &self,
        name: &str,
        version: Option<u32>,
        certificate_chain: &str,
    ) -> Result<()> {
        debug!(key = %name, ?version, "importing certificate chain");

        let result = self.import_locked(name, version, certificate_chain);
        if let Err(e) = &result {
            warn!(key = %name, ?version, error = %e, "rejected certificate import");
        }
        result
    }

    fn import_locked(&self, name: &str, version: Option<u32>, certificate_chain: &str) -> Result<()> {
        let key = self.resolve(name)?;
        let _lock = self.acquire(&key, LockMode::Exclusive);

        let key_type = key.key_type();
        if !key_type.signing_supported() {
            return Err(Error::SigningUnsupported(key_type));
        }

        let chain = decode_certificate_chain(certificate_chain)?;
        let leaf = single_leaf(&chain)?;

        let version = version.unwrap_or_else(|| key.latest_version());

        let algorithm = leaf.public_key_algorithm();
        if !algorithm_matches_key_type(algorithm, key_type) {
            return Err(Error::KeyTypeMismatch {
                algorithm,
                key_type,
            });
        }

        if !verify_leaf_key_matches(&key, version, algorithm, leaf.public_key())? {
            return Err(Error::KeyMismatch {
                name: key.name().to_string(),
                version,
            });
        }

        key.persist_certificate_chain(version, &chain)
            .map_err(|e| match e {
                Error::PersistenceFailed(_) => e,
                other => Error::PersistenceFailed(other.to_string()),
            })?;

        info!(
            key = %name,
            version,
            certificates = chain.len(),
            subject = %leaf.subject(),
            "imported certificate chain"
        );
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<S::Handle> {
        self.store
            .get_key(name)?
            .ok_or_else(|| Error::KeyNotFound(name.to_string()))
    }

    fn acquire<'k>(&self, key: &'k S::Handle, mode: LockMode) -> KeyLock<'k> {
        if self.config.locking_enabled() {
            key.lock(mode)
        } else {
            KeyLock::Elided
        }
    }
}
