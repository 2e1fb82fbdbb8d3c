//! Certificate manager
//!
//! Produces the DER forms of matter certificates, validates certificate chains
//! and handles certificate signing requests. Operational certificates (root,
//! ICAC, NOC) are stored with raw signatures, so their to-be-signed DER is
//! re-derived and verified against the issuer key. Attestation certificates
//! (PAA, PAI, DAC) are signed here and returned as complete X.509.

use anyhow::{Context, Result};
use rand::RngCore;

use crate::{
    cd,
    cert_matter::{
        BasicConstraints, CertificateKind, DistinguishedName, DnAttribute, ExtendedKeyUsage,
        Extensions, KeyUsage, MatterCertificate, ELLIPTIC_CURVE_PRIME256V1,
        PUBLIC_KEY_ALGORITHM_EC, SIGNATURE_ALGORITHM_ECDSA_SHA256,
    },
    cert_x509,
    der::{self, DerObject},
    error::CertificateError,
    util::cryptoutil,
};

const CSR_VERSION: u64 = 0;
const SERIAL_NUMBER_LEN: usize = 8;

fn tbs_der(cert: &MatterCertificate, kind: CertificateKind) -> Result<Vec<u8>> {
    Ok(cert_x509::tbs_certificate(cert, kind)?.encode())
}

/// Unsigned TBSCertificate DER of root certificate.
pub fn root_cert_to_asn1(cert: &MatterCertificate) -> Result<Vec<u8>> {
    tbs_der(cert, CertificateKind::Root)
}

/// Unsigned TBSCertificate DER of intermediate certificate.
pub fn icac_cert_to_asn1(cert: &MatterCertificate) -> Result<Vec<u8>> {
    tbs_der(cert, CertificateKind::Intermediate)
}

/// Unsigned TBSCertificate DER of node operational certificate.
/// Case authenticated tags in subject are validated first.
pub fn noc_cert_to_asn1(cert: &MatterCertificate) -> Result<Vec<u8>> {
    tbs_der(cert, CertificateKind::Operational)
}

/// Signed X.509 DER of device attestation certificate.
pub fn dac_cert_to_asn1(cert: &MatterCertificate, key: &p256::SecretKey) -> Result<Vec<u8>> {
    cert_x509::encode_x509(cert, CertificateKind::DeviceAttestation, key)
}

/// Signed X.509 DER of product attestation intermediate certificate.
pub fn pai_cert_to_asn1(cert: &MatterCertificate, key: &p256::SecretKey) -> Result<Vec<u8>> {
    cert_x509::encode_x509(cert, CertificateKind::ProductAttestationIntermediate, key)
}

/// Signed X.509 DER of product attestation authority certificate.
pub fn paa_cert_to_asn1(cert: &MatterCertificate, key: &p256::SecretKey) -> Result<Vec<u8>> {
    cert_x509::encode_x509(cert, CertificateKind::ProductAttestationAuthority, key)
}

/// CMS SignedData wrapping certification declaration `content` (TLV).
pub fn certification_declaration_to_asn1(
    content: &[u8],
    subject_key_identifier: &[u8],
    key: &p256::SecretKey,
) -> Result<Vec<u8>> {
    cd::sign_content(content, subject_key_identifier, key)
}

fn validate(cert: &MatterCertificate, kind: CertificateKind, issuer: &MatterCertificate) -> Result<()> {
    if cert.issuer != issuer.subject {
        log::debug!("{} issuer {:?} differs from {:?}", kind, cert.issuer, issuer.subject);
        return Err(CertificateError::ChainMismatch("issuer does not match subject of signing certificate").into());
    }
    if let Some(aki) = &cert.extensions.authority_key_identifier {
        if *aki != issuer.extensions.subject_key_identifier {
            log::debug!("{} authority key id {} differs", kind, hex::encode(aki));
            return Err(CertificateError::ChainMismatch(
                "authority key identifier does not match signing certificate",
            )
            .into());
        }
    }
    if !issuer.extensions.basic_constraints.is_ca {
        return Err(CertificateError::ChainMismatch("signing certificate is not a CA").into());
    }
    let tbs = tbs_der(cert, kind)?;
    cryptoutil::verify_raw(&issuer.public_key, &tbs, &cert.signature)
        .with_context(|| format!("verifying {} certificate", kind))?;
    log::debug!("{} certificate signature verified", kind);
    Ok(())
}

/// Verify self signed root certificate.
pub fn validate_root_certificate(root: &MatterCertificate) -> Result<()> {
    validate(root, CertificateKind::Root, root)
}

pub fn validate_icac_certificate(root: &MatterCertificate, icac: &MatterCertificate) -> Result<()> {
    validate(icac, CertificateKind::Intermediate, root)
}

/// Verify NOC issued directly by root.
pub fn validate_noc_certificate(root: &MatterCertificate, noc: &MatterCertificate) -> Result<()> {
    validate(noc, CertificateKind::Operational, root)
}

pub fn validate_noc_certificate_with_icac(
    icac: &MatterCertificate,
    noc: &MatterCertificate,
) -> Result<()> {
    validate(noc, CertificateKind::Operational, icac)
}

fn signing_request(key: &p256::SecretKey, version: u64) -> Result<Vec<u8>> {
    let request = DerObject::Sequence(vec![
        DerObject::uint(version),
        DerObject::Sequence(vec![der::organisation_name("CSR")?]),
        der::ec_public_key(&cryptoutil::public_key_bytes(key))?,
        DerObject::ContextTagged(0, None),
    ]);
    let signature = cryptoutil::sign_der(key, &request.encode())?;
    Ok(DerObject::Sequence(vec![
        request,
        der::ecdsa_with_sha256()?,
        DerObject::bit_string(&signature),
    ])
    .encode())
}

/// PKCS#10 request with subject O=CSR signed by `key`.
pub fn create_certificate_signing_request(key: &p256::SecretKey) -> Result<Vec<u8>> {
    signing_request(key, CSR_VERSION)
}

/// Check CSR signature and return its uncompressed public key.
pub fn get_public_key_from_csr(csr: &[u8]) -> Result<Vec<u8>> {
    let root = der::decode(csr).context("decoding CSR")?;
    let [request, signature_algorithm, signature] = root.elements.as_slice() else {
        return Err(CertificateError::InvalidCsr.into());
    };
    let [version, _subject, public_key_info, _attributes] = request.elements.as_slice() else {
        return Err(CertificateError::InvalidCsr.into());
    };
    match version.value.first() {
        Some(0) => {}
        Some(v) => return Err(CertificateError::UnsupportedRequestVersion(*v).into()),
        None => return Err(CertificateError::InvalidCsr.into()),
    }
    let [_algorithm, public_key] = public_key_info.elements.as_slice() else {
        return Err(CertificateError::InvalidCsr.into());
    };
    let public_key = public_key.bit_string_bytes()?;

    let expected = DerObject::oid(der::OID_SIG_ECDSA_WITH_SHA256)?.encode();
    if signature_algorithm.element(0).map(|n| n.encode()) != Some(expected) {
        return Err(CertificateError::UnsupportedSignatureType.into());
    }
    cryptoutil::verify_der(public_key, &request.encode(), signature.bit_string_bytes()?)?;
    log::debug!("CSR verified, public key {}", hex::encode(public_key));
    Ok(public_key.to_vec())
}

/// Validity window in matter epoch seconds. Zero `not_after` means no well defined expiration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validity {
    pub not_before: u32,
    pub not_after: u32,
}

fn random_serial_number() -> Vec<u8> {
    let mut serial = vec![0; SERIAL_NUMBER_LEN];
    rand::thread_rng().fill_bytes(&mut serial);
    // positive and without leading zero byte
    serial[0] = (serial[0] & 0x7f) | 0x40;
    serial
}

fn unsigned_certificate(
    issuer: DistinguishedName,
    subject: DistinguishedName,
    public_key: &[u8],
    validity: Validity,
    extensions: Extensions,
) -> MatterCertificate {
    MatterCertificate {
        serial_number: random_serial_number(),
        signature_algorithm: SIGNATURE_ALGORITHM_ECDSA_SHA256,
        issuer,
        not_before: validity.not_before,
        not_after: validity.not_after,
        subject,
        public_key_algorithm: PUBLIC_KEY_ALGORITHM_EC,
        elliptic_curve_id: ELLIPTIC_CURVE_PRIME256V1,
        public_key: public_key.to_vec(),
        extensions,
        signature: Vec::new(),
    }
}

/// Create self signed root certificate for `key`.
pub fn create_root_certificate(
    key: &p256::SecretKey,
    rcac_id: u64,
    fabric_id: Option<u64>,
    validity: Validity,
) -> Result<MatterCertificate> {
    let public_key = cryptoutil::public_key_bytes(key);
    let key_id = cryptoutil::key_identifier(&public_key);
    let mut dn = vec![DnAttribute::RcacId(rcac_id)];
    if let Some(fabric_id) = fabric_id {
        dn.push(DnAttribute::FabricId(fabric_id));
    }
    let dn = DistinguishedName::new(dn);
    let extensions = Extensions {
        basic_constraints: BasicConstraints {
            is_ca: true,
            path_len: None,
        },
        key_usage: KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN,
        extended_key_usage: None,
        subject_key_identifier: key_id.clone(),
        authority_key_identifier: Some(key_id),
        future_extension: None,
    };
    let mut cert = unsigned_certificate(dn.clone(), dn, &public_key, validity, extensions);
    cert.signature = cryptoutil::sign_raw(key, &root_cert_to_asn1(&cert)?)?;
    log::debug!("created root certificate {:016X}", rcac_id);
    Ok(cert)
}

/// Create NOC for `public_key` signed by `root_key`.
pub fn create_noc_certificate(
    root: &MatterCertificate,
    root_key: &p256::SecretKey,
    public_key: &[u8],
    node_id: u64,
    fabric_id: u64,
    case_authenticated_tags: &[u32],
    validity: Validity,
) -> Result<MatterCertificate> {
    let mut subject = vec![DnAttribute::FabricId(fabric_id), DnAttribute::NodeId(node_id)];
    subject.extend(
        case_authenticated_tags
            .iter()
            .map(|tag| DnAttribute::CaseAuthenticatedTag(*tag)),
    );
    let extensions = Extensions {
        basic_constraints: BasicConstraints::default(),
        key_usage: KeyUsage::DIGITAL_SIGNATURE,
        extended_key_usage: Some(vec![
            ExtendedKeyUsage::ClientAuth,
            ExtendedKeyUsage::ServerAuth,
        ]),
        subject_key_identifier: cryptoutil::key_identifier(public_key),
        authority_key_identifier: Some(root.extensions.subject_key_identifier.clone()),
        future_extension: None,
    };
    let mut cert = unsigned_certificate(
        root.subject.clone(),
        DistinguishedName::new(subject),
        public_key,
        validity,
        extensions,
    );
    cert.signature = cryptoutil::sign_raw(root_key, &noc_cert_to_asn1(&cert)?)?;
    log::debug!("created node certificate {:016X} in fabric {:016X}", node_id, fabric_id);
    Ok(cert)
}
