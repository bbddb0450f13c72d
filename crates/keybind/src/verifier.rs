//! Key-match verification.
//!
//! Whether a certificate's public key belongs to a key version is decided by
//! the key-version store; this module only normalizes the store's errors.

use crate::certificate::PublicKeyAlgorithm;
use crate::store::KeyHandle;
use crate::{Error, Result};
use openssl::pkey::{PKeyRef, Public};

/// Asks the store whether `version` of `key` holds the private key for `public_key`.
///
/// `Ok(false)` means the keys definitively differ. A missing version is
/// reported as [`Error::VersionNotFound`]; any other failure to complete the
/// check becomes [`Error::Internal`].
pub fn verify_leaf_key_matches<H: KeyHandle + ?Sized>(
    key: &H,
    version: u32,
    algorithm: PublicKeyAlgorithm,
    public_key: &PKeyRef<Public>,
) -> Result<bool> {
    key.validate_leaf_key_match(version, algorithm, public_key)
        .map_err(|e| match e {
            Error::VersionNotFound { .. } | Error::Internal(_) => e,
            other => Error::Internal(format!(
                "could not validate key match between leaf certificate key and key version: {other}"
            )),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::CertificateChain;
    use crate::csr::CsrTemplate;
    use crate::key_type::KeyType;
    use crate::store::{KeyLock, LockMode};
    use openssl::pkey::PKey;

    /// A handle whose key-match check always returns a fixed outcome.
    struct FixedAnswer(fn() -> Result<bool>);

    impl KeyHandle for FixedAnswer {
        fn name(&self) -> &str {
            "fixed"
        }

        fn key_type(&self) -> KeyType {
            KeyType::Ed25519
        }

        fn latest_version(&self) -> u32 {
            1
        }

        fn lock(&self, _mode: LockMode) -> KeyLock<'_> {
            KeyLock::Elided
        }

        fn create_csr(&self, _version: u32, _template: &CsrTemplate) -> Result<String> {
            unreachable!("not used by the verifier")
        }

        fn validate_leaf_key_match(
            &self,
            _version: u32,
            _algorithm: PublicKeyAlgorithm,
            _public_key: &PKeyRef<Public>,
        ) -> Result<bool> {
            (self.0)()
        }

        fn persist_certificate_chain(&self, _version: u32, _chain: &CertificateChain) -> Result<()> {
            unreachable!("not used by the verifier")
        }
    }

    fn any_public_key() -> PKey<Public> {
        let private = PKey::generate_ed25519().unwrap();
        PKey::public_key_from_der(&private.public_key_to_der().unwrap()).unwrap()
    }

    fn verify(handle: FixedAnswer) -> Result<bool> {
        verify_leaf_key_matches(&handle, 1, PublicKeyAlgorithm::Ed25519, &any_public_key())
    }

    #[test]
    fn test_answers_pass_through() {
        assert!(verify(FixedAnswer(|| Ok(true))).unwrap());
        assert!(!verify(FixedAnswer(|| Ok(false))).unwrap());
    }

    #[test]
    fn test_version_not_found_is_kept() {
        let err = verify(FixedAnswer(|| {
            Err(Error::VersionNotFound {
                name: "fixed".into(),
                version: 1,
            })
        }))
        .unwrap_err();
        assert!(matches!(err, Error::VersionNotFound { .. }));
    }

    #[test]
    fn test_store_failures_become_internal() {
        let err = verify(FixedAnswer(|| {
            Err(Error::SigningUnsupported(KeyType::Hmac))
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Internal(ref msg) if msg.contains("could not validate key match")));
    }
}
