//! A minimal certificate authority for integration tests.
//!
//! Plays the role of the external PKI: it issues certificates for CSRs
//! produced by the binding service.

#![allow(dead_code)]

use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::ec::{EcGroup, EcKey};
use openssl::hash::MessageDigest;
use openssl::nid::Nid;
use openssl::pkey::{PKey, PKeyRef, Private, Public};
use openssl::x509::extension::{BasicConstraints, KeyUsage};
use openssl::x509::{X509Name, X509NameRef, X509Req, X509};

const X509_VERSION_3: i32 = 2;

pub struct TestCa {
    key: PKey<Private>,
    cert: X509,
}

impl TestCa {
    /// Creates a self-signed P-256 root.
    pub fn new(common_name: &str) -> Self {
        let group = EcGroup::from_curve_name(Nid::X9_62_PRIME256V1).unwrap();
        let key = PKey::from_ec_key(EcKey::generate(&group).unwrap()).unwrap();

        let mut name = X509Name::builder().unwrap();
        name.append_entry_by_nid(Nid::COMMONNAME, common_name).unwrap();
        let name = name.build();

        let ca_constraints = BasicConstraints::new().critical().ca().pathlen(0).build().unwrap();
        let cert = issue(&name, &key, &name, &key, ca_constraints);
        Self { key, cert }
    }

    pub fn cert_pem(&self) -> String {
        String::from_utf8(self.cert.to_pem().unwrap()).unwrap()
    }

    /// Issues an end-entity certificate for the CSR's subject and public key.
    pub fn sign_csr(&self, csr_pem: &str) -> String {
        let csr = X509Req::from_pem(csr_pem.as_bytes()).unwrap();
        let public_key = csr.public_key().unwrap();
        let leaf_constraints = BasicConstraints::new().critical().build().unwrap();

        let cert = issue(
            csr.subject_name(),
            &public_key,
            self.cert.subject_name(),
            &self.key,
            leaf_constraints,
        );
        String::from_utf8(cert.to_pem().unwrap()).unwrap()
    }
}

fn issue(
    subject: &X509NameRef,
    public_key: &PKeyRef<impl openssl::pkey::HasPublic>,
    issuer: &X509NameRef,
    issuer_key: &PKeyRef<Private>,
    constraints: openssl::x509::X509Extension,
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
        .set_not_after(&Asn1Time::days_from_now(1).unwrap())
        .unwrap();
    builder.set_pubkey(public_key).unwrap();
    builder.append_extension(constraints).unwrap();
    builder
        .append_extension(KeyUsage::new().critical().digital_signature().build().unwrap())
        .unwrap();

    builder.sign(issuer_key, MessageDigest::sha256()).unwrap();
    builder.build()
}

/// Public half of a key, for comparisons.
pub fn public_der(key: &PKeyRef<Public>) -> Vec<u8> {
    key.public_key_to_der().unwrap()
}

/// Installs a test subscriber so `RUST_LOG=keybind=debug` shows service logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
