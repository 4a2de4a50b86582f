//! X.509 certificate issuance.
//!
//! Every node owns a self-signed Ed25519 CA. Server and client leaves are
//! signed by it, so a peer that trusts the CA trusts both.

use std::time::SystemTime;

use rand::RngCore;
use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, ExtendedKeyUsagePurpose, IsCa,
    KeyPair, KeyUsagePurpose, SerialNumber, PKCS_ED25519,
};
use time::OffsetDateTime;

use crate::error::{CoreError, Result};

const ORGANIZATION: &str = "disco";

/// The CA that signs a new certificate.
#[derive(Debug, Clone, Copy)]
pub struct Issuer<'a> {
    /// PEM encoded CA certificate.
    pub cert_pem: &'a str,
    /// PEM encoded PKCS#8 CA private key.
    pub key_pem: &'a str,
}

/// A freshly issued certificate and its private key.
#[derive(Clone)]
pub struct IssuedCertificate {
    /// PEM `CERTIFICATE` block.
    pub cert_pem: String,
    /// PEM PKCS#8 `PRIVATE KEY` block.
    pub key_pem: String,
}

impl std::fmt::Debug for IssuedCertificate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IssuedCertificate")
            .field("cert_pem", &self.cert_pem)
            .finish_non_exhaustive()
    }
}

fn cert_err(e: rcgen::Error) -> CoreError {
    CoreError::CertificateError(e.to_string())
}

fn random_serial() -> SerialNumber {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    // Keep the DER integer positive.
    bytes[0] &= 0x7f;
    SerialNumber::from_slice(&bytes)
}

/// Issue an Ed25519 certificate for `subject`.
///
/// Without an issuer the certificate is self-signed and marked as a CA. With
/// one, it is an end-entity certificate signed by that CA. Both carry the
/// ServerAuth and ClientAuth extended key usages.
pub fn issue_certificate(
    subject: &str,
    subject_alt_names: &[String],
    not_after: SystemTime,
    issuer: Option<Issuer<'_>>,
) -> Result<IssuedCertificate> {
    let mut params = CertificateParams::new(subject_alt_names.to_vec()).map_err(cert_err)?;

    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, subject);
    dn.push(DnType::OrganizationName, ORGANIZATION);
    params.distinguished_name = dn;
    params.serial_number = Some(random_serial());
    params.not_before = OffsetDateTime::now_utc();
    params.not_after = OffsetDateTime::from(not_after);
    if params.not_after <= params.not_before {
        return Err(CoreError::CertificateError(
            "expiry must be in the future".to_string(),
        ));
    }
    params.extended_key_usages = vec![
        ExtendedKeyUsagePurpose::ServerAuth,
        ExtendedKeyUsagePurpose::ClientAuth,
    ];

    let key_pair = KeyPair::generate_for(&PKCS_ED25519).map_err(cert_err)?;

    let cert = match issuer {
        None => {
            params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
            params.key_usages = vec![
                KeyUsagePurpose::DigitalSignature,
                KeyUsagePurpose::KeyEncipherment,
                KeyUsagePurpose::KeyCertSign,
            ];
            params.self_signed(&key_pair).map_err(cert_err)?
        }
        Some(issuer) => {
            params.is_ca = IsCa::ExplicitNoCa;
            params.key_usages = vec![
                KeyUsagePurpose::DigitalSignature,
                KeyUsagePurpose::KeyEncipherment,
            ];
            let issuer_key = KeyPair::from_pem(issuer.key_pem).map_err(cert_err)?;
            let issuer_cert = CertificateParams::from_ca_cert_pem(issuer.cert_pem)
                .map_err(cert_err)?
                .self_signed(&issuer_key)
                .map_err(cert_err)?;
            params
                .signed_by(&key_pair, &issuer_cert, &issuer_key)
                .map_err(cert_err)?
        }
    };

    Ok(IssuedCertificate {
        cert_pem: cert.pem(),
        key_pem: key_pair.serialize_pem(),
    })
}
