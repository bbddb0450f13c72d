//! Key-version store contract.
//!
//! The binding service never touches key material directly. It resolves a
//! named key to a [`KeyHandle`] and asks that handle to lock the key, produce
//! a CSR, check a public key, or persist a certificate chain against one of
//! the key's versions.
//!
//! - [`InMemoryKeyStore`] - complete in-process implementation

mod material;
mod memory;

pub use memory::{InMemoryKeyStore, MemoryKey};

use crate::certificate::{CertificateChain, PublicKeyAlgorithm};
use crate::csr::CsrTemplate;
use crate::key_type::KeyType;
use crate::Result;
use openssl::pkey::{PKeyRef, Public};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A store of named, versioned keys.
pub trait KeyVersionStore: Send + Sync {
    /// Handle to one named key.
    type Handle: KeyHandle;

    /// Looks up a key by name, returning `None` if it does not exist.
    fn get_key(&self, name: &str) -> Result<Option<Self::Handle>>;
}

/// Operations on one named key and its versions.
///
/// Versions are numbered from 1. Every method taking a version reports
/// [`crate::Error::VersionNotFound`] for a version the key does not have.
pub trait KeyHandle {
    /// The key's name.
    fn name(&self) -> &str;

    /// The key's type, shared by all of its versions.
    fn key_type(&self) -> KeyType;

    /// The newest version of the key.
    fn latest_version(&self) -> u32;

    /// Acquires the key's operation lock in the given mode.
    ///
    /// The lock is released when the returned guard is dropped.
    fn lock(&self, mode: LockMode) -> KeyLock<'_>;

    /// Produces a PEM-encoded CSR signed by `version`, carrying the
    /// template's subject and requested extensions.
    fn create_csr(&self, version: u32, template: &CsrTemplate) -> Result<String>;

    /// Answers whether `version`'s key material corresponds to `public_key`.
    ///
    /// `Ok(false)` is a definitive non-match; an error means the check could
    /// not be completed.
    fn validate_leaf_key_match(
        &self,
        version: u32,
        algorithm: PublicKeyAlgorithm,
        public_key: &PKeyRef<Public>,
    ) -> Result<bool>;

    /// Attaches a certificate chain to `version`, replacing any previous one.
    fn persist_certificate_chain(&self, version: u32, chain: &CertificateChain) -> Result<()>;
}

/// How a key's operation lock is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Shared with other readers; excludes writers.
    Shared,
    /// Excludes everyone else.
    Exclusive,
}

/// Guard for a key's operation lock.
#[derive(Debug)]
pub enum KeyLock<'a> {
    Shared(RwLockReadGuard<'a, ()>),
    Exclusive(RwLockWriteGuard<'a, ()>),
    /// No lock was taken because locking is disabled.
    Elided,
}

impl<'a> KeyLock<'a> {
    /// Acquires `lock` in the given mode.
    ///
    /// The lock guards no data, so a poisoned lock is recovered rather than reported.
    pub fn acquire(lock: &'a RwLock<()>, mode: LockMode) -> Self {
        match mode {
            LockMode::Shared => {
                KeyLock::Shared(lock.read().unwrap_or_else(|poisoned| poisoned.into_inner()))
            }
            LockMode::Exclusive => {
                KeyLock::Exclusive(lock.write().unwrap_or_else(|poisoned| poisoned.into_inner()))
            }
        }
    }

    /// The mode the lock is held in, or `None` if elided.
    pub fn mode(&self) -> Option<LockMode> {
        match self {
            KeyLock::Shared(_) => Some(LockMode::Shared),
            KeyLock::Exclusive(_) => Some(LockMode::Exclusive),
            KeyLock::Elided => None,
        }
    }
}
