//! Key material for one key version.

use crate::certificate::PublicKeyAlgorithm;
use crate::csr::CsrTemplate;
use crate::key_type::KeyType;
use crate::{Error, Result};
use openssl::bn::BigNumContext;
use openssl::ec::{EcGroup, EcKey};
use openssl::error::ErrorStack;
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{HasPublic, Id, PKey, PKeyRef, Private, Public};
use openssl::rsa::Rsa;
use openssl::x509::{X509Name, X509ReqBuilder};

/// PKCS#10 version 1 is encoded as 0.
const CSR_VERSION_1: i32 = 0;

/// The key material backing a key version.
#[derive(Clone)]
pub(crate) enum KeyMaterial {
    /// A signing key pair.
    KeyPair(PKey<Private>),
    /// Only the public half of a signing key is held.
    PublicOnly(PKey<Public>),
    /// A symmetric key. No secret bytes are held here.
    Symmetric,
}

impl KeyMaterial {
    /// Generates fresh material for a key of the given type.
    pub(crate) fn generate(key_type: KeyType) -> Result<Self> {
        if key_type.symmetric_key_len().is_some() {
            return Ok(KeyMaterial::Symmetric);
        }

        let pkey = generate_key_pair(key_type)
            .map_err(|e| Error::Internal(format!("failed to generate {key_type} key: {e}")))?;
        Ok(KeyMaterial::KeyPair(pkey))
    }

    /// Loads the public half of a signing key from PEM (SubjectPublicKeyInfo).
    ///
    /// The key's algorithm and curve must agree with `key_type`.
    pub(crate) fn from_public_pem(key_type: KeyType, pem: &str) -> Result<Self> {
        let public = PKey::public_key_from_pem(pem.as_bytes())
            .map_err(|e| Error::MalformedInput(format!("failed to parse public key: {e}")))?;

        let consistent = match key_type {
            KeyType::Ed25519 => public.id() == Id::ED25519,
            KeyType::EcdsaP256 | KeyType::EcdsaP384 | KeyType::EcdsaP521 => public
                .ec_key()
                .ok()
                .and_then(|ec| ec.group().curve_name())
                .is_some_and(|nid| Some(nid) == curve_nid(key_type)),
            KeyType::Rsa2048 | KeyType::Rsa3072 | KeyType::Rsa4096 => public
                .rsa()
                .ok()
                .is_some_and(|rsa| Some(rsa.n().num_bits() as u32) == key_type.rsa_bits()),
            _ => return Err(Error::SigningUnsupported(key_type)),
        };

        if !consistent {
            return Err(Error::MalformedInput(format!(
                "public key is not a valid {key_type} key"
            )));
        }
        Ok(KeyMaterial::PublicOnly(public))
    }

    /// Builds and signs a CSR from the template.
    ///
    /// `key_type` selects the signature digest.
    pub(crate) fn create_csr(&self, key_type: KeyType, template: &CsrTemplate) -> Result<String> {
        let key = match self {
            KeyMaterial::KeyPair(key) => key,
            KeyMaterial::PublicOnly(_) => {
                return Err(Error::Internal(
                    "private key material missing for key version".to_string(),
                ))
            }
            KeyMaterial::Symmetric => return Err(Error::SigningUnsupported(key_type)),
        };

        build_csr(key, key_type, template)
            .map_err(|e| Error::Internal(format!("failed to create CSR: {e}")))
    }

    /// Compares this material's public key with a certificate public key.
    pub(crate) fn matches_public_key(
        &self,
        algorithm: PublicKeyAlgorithm,
        public_key: &PKeyRef<Public>,
    ) -> Result<bool> {
        let result = match self {
            KeyMaterial::KeyPair(key) => public_keys_match(key, algorithm, public_key),
            KeyMaterial::PublicOnly(key) => public_keys_match(key, algorithm, public_key),
            KeyMaterial::Symmetric => {
                return Err(Error::Internal(
                    "key version holds no public key".to_string(),
                ))
            }
        };
        result.map_err(|e| Error::Internal(format!("failed to compare public keys: {e}")))
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            KeyMaterial::KeyPair(_) => "KeyPair",
            KeyMaterial::PublicOnly(_) => "PublicOnly",
            KeyMaterial::Symmetric => "Symmetric",
        };
        f.debug_tuple(kind).field(&"[REDACTED]").finish()
    }
}

fn curve_nid(key_type: KeyType) -> Option<Nid> {
    match key_type {
        KeyType::EcdsaP256 => Some(Nid::X9_62_PRIME256V1),
        KeyType::EcdsaP384 => Some(Nid::SECP384R1),
        KeyType::EcdsaP521 => Some(Nid::SECP521R1),
        _ => None,
    }
}

fn generate_key_pair(key_type: KeyType) -> std::result::Result<PKey<Private>, ErrorStack> {
    if let Some(bits) = key_type.rsa_bits() {
        return PKey::from_rsa(Rsa::generate(bits)?);
    }
    if let Some(nid) = curve_nid(key_type) {
        let group = EcGroup::from_curve_name(nid)?;
        return PKey::from_ec_key(EcKey::generate(&group)?);
    }
    // Symmetric types never reach here; Ed25519 is the remaining signing type.
    PKey::generate_ed25519()
}

fn digest_for(key_type: KeyType) -> MessageDigest {
    match key_type {
        KeyType::EcdsaP384 => MessageDigest::sha384(),
        KeyType::EcdsaP521 => MessageDigest::sha512(),
        // Ed25519 signs the message directly.
        KeyType::Ed25519 => MessageDigest::null(),
        _ => MessageDigest::sha256(),
    }
}

fn build_csr(
    key: &PKeyRef<Private>,
    key_type: KeyType,
    template: &CsrTemplate,
) -> std::result::Result<String, ErrorStack> {
    let mut builder = X509ReqBuilder::new()?;
    builder.set_version(CSR_VERSION_1)?;

    match template.subject() {
        Some(subject) => builder.set_subject_name(subject)?,
        None => builder.set_subject_name(&X509Name::builder()?.build())?,
    }

    if let Some(extensions) = template.requested_extensions() {
        if !extensions.is_empty() {
            builder.add_extensions(&extensions)?;
        }
    }

    builder.set_pubkey(key)?;
    builder.sign(key, digest_for(key_type))?;

    let pem = builder.build().to_pem()?;
    // OpenSSL PEM output is ASCII.
    Ok(String::from_utf8_lossy(&pem).into_owned())
}

/// Compares two public keys the way their algorithm defines identity:
/// RSA by modulus and exponent, EC by curve and point, Ed25519 by raw bytes.
fn public_keys_match<T: HasPublic>(
    ours: &PKeyRef<T>,
    algorithm: PublicKeyAlgorithm,
    theirs: &PKeyRef<Public>,
) -> std::result::Result<bool, ErrorStack> {
    match algorithm {
        PublicKeyAlgorithm::Rsa => {
            if ours.id() != Id::RSA || theirs.id() != Id::RSA {
                return Ok(false);
            }
            let (ours, theirs) = (ours.rsa()?, theirs.rsa()?);
            Ok(ours.n() == theirs.n() && ours.e() == theirs.e())
        }
        PublicKeyAlgorithm::Ecdsa => {
            if ours.id() != Id::EC || theirs.id() != Id::EC {
                return Ok(false);
            }
            let (ours, theirs) = (ours.ec_key()?, theirs.ec_key()?);
            let curve = ours.group().curve_name();
            if curve.is_none() || curve != theirs.group().curve_name() {
                return Ok(false);
            }
            let mut ctx = BigNumContext::new()?;
            ours.public_key()
                .eq(ours.group(), theirs.public_key(), &mut ctx)
        }
        PublicKeyAlgorithm::Ed25519 => {
            if ours.id() != Id::ED25519 || theirs.id() != Id::ED25519 {
                return Ok(false);
            }
            Ok(ours.raw_public_key()? == theirs.raw_public_key()?)
        }
        PublicKeyAlgorithm::Dsa | PublicKeyAlgorithm::Unknown => Ok(false),
    }
}
