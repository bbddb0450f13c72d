//! Certificate chain validation.
//!
//! These checks are structural only: no signatures or issuer links are
//! verified, and no trust decision is made.

use crate::certificate::{Certificate, CertificateChain, PublicKeyAlgorithm};
use crate::key_type::KeyType;
use crate::{Error, Result};

/// Public key algorithms a certificate may use to bind to each key type.
///
/// Key types that cannot sign accept no algorithm at all.
const KEY_TYPE_ALGORITHMS: &[(KeyType, &[PublicKeyAlgorithm])] = &[
    (KeyType::Aes128Gcm96, &[]),
    (KeyType::Aes256Gcm96, &[]),
    (KeyType::ChaCha20Poly1305, &[]),
    (KeyType::Hmac, &[]),
    (KeyType::Ed25519, &[PublicKeyAlgorithm::Ed25519]),
    (KeyType::EcdsaP256, &[PublicKeyAlgorithm::Ecdsa]),
    (KeyType::EcdsaP384, &[PublicKeyAlgorithm::Ecdsa]),
    (KeyType::EcdsaP521, &[PublicKeyAlgorithm::Ecdsa]),
    (KeyType::Rsa2048, &[PublicKeyAlgorithm::Rsa]),
    (KeyType::Rsa3072, &[PublicKeyAlgorithm::Rsa]),
    (KeyType::Rsa4096, &[PublicKeyAlgorithm::Rsa]),
];

/// Returns true if the certificate has a well-formed basic constraints extension.
pub fn has_valid_basic_constraints(cert: &Certificate) -> bool {
    cert.basic_constraints_valid()
}

/// Returns true if the certificate is marked as a certificate authority.
pub fn is_ca(cert: &Certificate) -> bool {
    cert.is_ca()
}

/// A leaf has valid basic constraints and is not a CA.
///
/// A certificate without the extension is not a leaf, even though it is not a CA either.
pub fn is_leaf(cert: &Certificate) -> bool {
    has_valid_basic_constraints(cert) && !is_ca(cert)
}

/// Counts the leaf certificates in a chain.
pub fn count_leaf_certificates(chain: &CertificateChain) -> usize {
    chain.iter().filter(|cert| is_leaf(cert)).count()
}

/// Returns true if the chain contains exactly one leaf certificate.
pub fn has_exactly_one_leaf(chain: &CertificateChain) -> bool {
    count_leaf_certificates(chain) == 1
}

/// Returns the chain's single leaf certificate.
///
/// # Errors
///
/// Returns [`Error::InvalidChain`] unless exactly one leaf is present.
pub fn single_leaf(chain: &CertificateChain) -> Result<&Certificate> {
    let mut leaves = chain.iter().filter(|cert| is_leaf(cert));
    match (leaves.next(), leaves.next()) {
        (Some(leaf), None) => Ok(leaf),
        _ => Err(Error::InvalidChain(format!(
            "expected a single leaf certificate in the certificate chain, found {}",
            count_leaf_certificates(chain)
        ))),
    }
}

/// Returns true if a certificate key of `algorithm` can bind to a key of `key_type`.
pub fn algorithm_matches_key_type(algorithm: PublicKeyAlgorithm, key_type: KeyType) -> bool {
    KEY_TYPE_ALGORITHMS
        .iter()
        .find(|(ty, _)| *ty == key_type)
        .is_some_and(|(_, allowed)| allowed.contains(&algorithm))
}
