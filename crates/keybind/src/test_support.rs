//! Certificate fixtures for unit tests.

use crate::key_type::KeyType;
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{HasPublic, Id, PKey, PKeyRef, Private};
use openssl::rsa::Rsa;
use openssl::stack::Stack;
use openssl::x509::extension::{BasicConstraints, SubjectAlternativeName};
use openssl::x509::{X509Name, X509NameRef, X509Req, X509ReqBuilder, X509};

const X509_VERSION_3: i32 = 2;

#[derive(Debug, Clone, Copy)]
pub(crate) enum CertKind {
    /// `CA:FALSE`
    Leaf,
    /// `CA:TRUE`
    Ca,
    NoBasicConstraints,
}

pub(crate) fn private_key(key_type: KeyType) -> PKey<Private> {
    if let Some(bits) = key_type.rsa_bits() {
        return PKey::from_rsa(Rsa::generate(bits).unwrap()).unwrap();
    }
    let nid = match key_type {
        KeyType::Ed25519 => return PKey::generate_ed25519().unwrap(),
        KeyType::EcdsaP256 => Nid::X9_62_PRIME256V1,
        KeyType::EcdsaP384 => Nid::SECP384R1,
        KeyType::EcdsaP521 => Nid::SECP521R1,
        other => panic!("{other} has no key pair"),
    };
    let group = EcGroup::from_curve_name(nid).unwrap();
    PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap()
}

fn digest_for<T>(key: &PKeyRef<T>) -> MessageDigest {
    if key.id() == Id::ED25519 {
        MessageDigest::null()
    } else {
        MessageDigest::sha256()
    }
}

fn name(cn: &str) -> X509Name {
    let mut builder = X509Name::builder().unwrap();
    builder.append_entry_by_text("CN", cn).unwrap();
    builder.build()
}

fn build_cert<T: HasPublic>(
    subject: &X509NameRef,
    public_key: &PKeyRef<T>,
    issuer: &X509NameRef,
    issuer_key: &PKeyRef<Private>,
    kind: CertKind,
) -> X509 {
    let mut builder = X509::builder().unwrap();
    builder.set_version(X509_VERSION_3).unwrap();

    let mut serial = BigNum::new().unwrap();
    serial.rand(128, MsbOption::MAYBE_ZERO, false).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();

    builder.set_subject_name(subject).unwrap();
    builder.set_issuer_name(issuer).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder.set_pubkey(public_key).unwrap();

    match kind {
        CertKind::Leaf => {
            let bc = BasicConstraints::new().critical().build().unwrap();
            builder.append_extension(bc).unwrap();
        }
        CertKind::Ca => {
            let bc = BasicConstraints::new().critical().ca().build().unwrap();
            builder.append_extension(bc).unwrap();
        }
        CertKind::NoBasicConstraints => {}
    }

    builder.sign(issuer_key, digest_for(issuer_key)).unwrap();
    builder.build()
}

/// A self-signed certificate of the given kind over a fresh P-256 key.
pub(crate) fn self_signed(kind: CertKind) -> (PKey<Private>, X509) {
    let key = private_key(KeyType::EcdsaP256);
    let cert = self_signed_with_key(&key, kind);
    (key, cert)
}

pub(crate) fn self_signed_with_key(key: &PKeyRef<Private>, kind: CertKind) -> X509 {
    let subject = name("fixture");
    build_cert(&subject, key, &subject, key, kind)
}

/// A CSR template with the given subject entries and DNS SANs.
pub(crate) fn csr_template_pem(subject: &[(&str, &str)], dns_names: &[&str]) -> String {
    let key = private_key(KeyType::EcdsaP256);
    let mut builder = X509ReqBuilder::new().unwrap();

    let mut name = X509Name::builder().unwrap();
    for (field, value) in subject {
        name.append_entry_by_text(field, value).unwrap();
    }
    builder.set_subject_name(&name.build()).unwrap();

    if !dns_names.is_empty() {
        let mut san = SubjectAlternativeName::new();
        for dns in dns_names {
            san.dns(dns);
        }
        let extension = san.build(&builder.x509v3_context(None)).unwrap();
        let mut extensions = Stack::new().unwrap();
        extensions.push(extension).unwrap();
        builder.add_extensions(&extensions).unwrap();
    }

    builder.set_pubkey(&key).unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    String::from_utf8(builder.build().to_pem().unwrap()).unwrap()
}

/// Issues a `CA:FALSE` certificate for a CSR from a throwaway CA, returned as PEM.
pub(crate) fn issue_leaf_from_csr(csr_pem: &str) -> String {
    let csr = X509Req::from_pem(csr_pem.as_bytes()).unwrap();
    let public_key = csr.public_key().unwrap();
    let ca_key = private_key(KeyType::EcdsaP256);

    let leaf = build_cert(
        csr.subject_name(),
        &public_key,
        &name("fixture CA"),
        &ca_key,
        CertKind::Leaf,
    );
    String::from_utf8(leaf.to_pem().unwrap()).unwrap()
}
