//! In-memory key-version store.
//!
//! Each key carries two locks: the operation lock handed out through
//! [`KeyHandle::lock`], and an internal lock over its versions that makes
//! every single read or write atomic even when callers skip the operation
//! lock.
//!
//! # Example
//!
//! ```
//! use keybind::{InMemoryKeyStore, KeyHandle, KeyType, KeyVersionStore};
//!
//! let store = InMemoryKeyStore::new();
//! store.create_key("signer", KeyType::Ed25519).unwrap();
//! assert_eq!(store.rotate_key("signer").unwrap(), 2);
//!
//! let key = store.get_key("signer").unwrap().unwrap();
//! assert_eq!(key.latest_version(), 2);
//! ```

use super::material::KeyMaterial;
use super::{KeyHandle, KeyLock, KeyVersionStore, LockMode};
use crate::certificate::{CertificateChain, PublicKeyAlgorithm};
use crate::csr::CsrTemplate;
use crate::key_type::KeyType;
use crate::{Error, Result};
use openssl::pkey::{PKeyRef, Public};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info};

/// A thread-safe key-version store held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryKeyStore {
    keys: RwLock<HashMap<String, MemoryKey>>,
}

/// One version of a key.
#[derive(Debug)]
struct KeyVersionEntry {
    material: KeyMaterial,
    certificate_chain: Option<CertificateChain>,
}

#[derive(Debug)]
struct KeyState {
    name: String,
    key_type: KeyType,
    /// Operation lock handed out to callers.
    access: RwLock<()>,
    versions: RwLock<BTreeMap<u32, KeyVersionEntry>>,
}

/// Handle to a key in an [`InMemoryKeyStore`].
#[derive(Debug, Clone)]
pub struct MemoryKey {
    state: Arc<KeyState>,
}

impl InMemoryKeyStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a key with freshly generated material as version 1.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyExists`] if the name is taken.
    pub fn create_key(&self, name: &str, key_type: KeyType) -> Result<()> {
        let material = KeyMaterial::generate(key_type)?;
        self.insert(name, key_type, material)?;
        info!(key = %name, key_type = %key_type, "created key");
        Ok(())
    }

    /// Creates a signing key whose version 1 holds only a public key.
    ///
    /// Such a key can have certificates bound to it but cannot produce CSRs.
    pub fn import_public_key(&self, name: &str, key_type: KeyType, public_key_pem: &str) -> Result<()> {
        let material = KeyMaterial::from_public_pem(key_type, public_key_pem)?;
        self.insert(name, key_type, material)?;
        info!(key = %name, key_type = %key_type, "imported public key");
        Ok(())
    }

    /// Adds a new version with fresh material and returns its number.
    ///
    /// Takes the key's operation lock exclusively.
    pub fn rotate_key(&self, name: &str) -> Result<u32> {
        let key = self.lookup(name)?;
        let _lock = key.lock(LockMode::Exclusive);

        let material = KeyMaterial::generate(key.state.key_type)?;
        let mut versions = key.write_versions();
        let version = versions.keys().next_back().copied().unwrap_or(0) + 1;
        versions.insert(
            version,
            KeyVersionEntry {
                material,
                certificate_chain: None,
            },
        );
        info!(key = %name, version, "rotated key");
        Ok(version)
    }

    /// Removes a key and all of its versions.
    pub fn delete_key(&self, name: &str) -> Result<()> {
        let removed = self
            .keys
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(name);
        match removed {
            Some(_) => {
                info!(key = %name, "deleted key");
                Ok(())
            }
            None => Err(Error::KeyNotFound(name.to_string())),
        }
    }

    /// Returns the certificate chain attached to a key version, if any.
    pub fn certificate_chain(&self, name: &str, version: u32) -> Result<Option<CertificateChain>> {
        let key = self.lookup(name)?;
        let versions = key.read_versions();
        let entry = versions.get(&version).ok_or_else(|| key.version_not_found(version))?;
        Ok(entry.certificate_chain.clone())
    }

    /// Returns the names of all keys, sorted.
    pub fn key_names(&self) -> Vec<String> {
        let keys = self.keys.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut names: Vec<_> = keys.keys().cloned().collect();
        names.sort();
        names
    }

    fn insert(&self, name: &str, key_type: KeyType, material: KeyMaterial) -> Result<()> {
        let mut keys = self.keys.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if keys.contains_key(name) {
            return Err(Error::KeyExists(name.to_string()));
        }

        let mut versions = BTreeMap::new();
        versions.insert(
            1,
            KeyVersionEntry {
                material,
                certificate_chain: None,
            },
        );
        keys.insert(
            name.to_string(),
            MemoryKey {
                state: Arc::new(KeyState {
                    name: name.to_string(),
                    key_type,
                    access: RwLock::new(()),
                    versions: RwLock::new(versions),
                }),
            },
        );
        Ok(())
    }

    fn lookup(&self, name: &str) -> Result<MemoryKey> {
        self.get_key(name)?
            .ok_or_else(|| Error::KeyNotFound(name.to_string()))
    }
}

impl KeyVersionStore for InMemoryKeyStore {
    type Handle = MemoryKey;

    fn get_key(&self, name: &str) -> Result<Option<MemoryKey>> {
        let keys = self.keys.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(keys.get(name).cloned())
    }
}

impl MemoryKey {
    fn read_versions(&self) -> RwLockReadGuard<'_, BTreeMap<u32, KeyVersionEntry>> {
        self.state
            .versions
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_versions(&self) -> RwLockWriteGuard<'_, BTreeMap<u32, KeyVersionEntry>> {
        self.state
            .versions
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn version_not_found(&self, version: u32) -> Error {
        Error::VersionNotFound {
            name: self.state.name.clone(),
            version,
        }
    }

    /// Clones a version's material so no internal lock is held while using it.
    fn material(&self, version: u32) -> Result<KeyMaterial> {
        self.read_versions()
            .get(&version)
            .map(|entry| entry.material.clone())
            .ok_or_else(|| self.version_not_found(version))
    }
}

impl KeyHandle for MemoryKey {
    fn name(&self) -> &str {
        &self.state.name
    }

    fn key_type(&self) -> KeyType {
        self.state.key_type
    }

    fn latest_version(&self) -> u32 {
        self.read_versions().keys().next_back().copied().unwrap_or(0)
    }

    fn lock(&self, mode: LockMode) -> KeyLock<'_> {
        KeyLock::acquire(&self.state.access, mode)
    }

    fn create_csr(&self, version: u32, template: &CsrTemplate) -> Result<String> {
        let material = self.material(version)?;
        let csr = material.create_csr(self.state.key_type, template)?;
        debug!(key = %self.state.name, version, "created CSR");
        Ok(csr)
    }

    fn validate_leaf_key_match(
        &self,
        version: u32,
        algorithm: PublicKeyAlgorithm,
        public_key: &PKeyRef<Public>,
    ) -> Result<bool> {
        if !self.state.key_type.signing_supported() {
            return Err(Error::SigningUnsupported(self.state.key_type));
        }
        self.material(version)?.matches_public_key(algorithm, public_key)
    }

    fn persist_certificate_chain(&self, version: u32, chain: &CertificateChain) -> Result<()> {
        let mut versions = self.write_versions();
        let entry = versions
            .get_mut(&version)
            .ok_or_else(|| self.version_not_found(version))?;
        entry.certificate_chain = Some(chain.clone());
        debug!(
            key = %self.state.name,
            version,
            certificates = chain.len(),
            "persisted certificate chain"
        );
        Ok(())
    }
}
