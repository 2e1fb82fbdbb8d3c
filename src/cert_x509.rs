//! Handling of x509 certificate compatible with matter
//!
//! Renders [MatterCertificate] as X.509 DER. The to-be-signed part is fully
//! determined by the certificate content and its [CertificateKind], so the
//! same bytes are produced for signing and for verification.

use anyhow::Result;

use crate::{
    cert_matter::{CertificateKind, DistinguishedName, DnAttribute, KeyUsage, MatterCertificate, StandardAttribute},
    der::{self, DerObject},
    epoch,
    util::cryptoutil,
};

const OID_MATTER_DN_ROOT: &str = "2b0601040182a27c01";
const OID_MATTER_ATTESTATION_ROOT: &str = "2b0601040182a27c02";

const X509_VERSION_3: u64 = 2;

/// Matter specific DN attribute. Value is rendered as uppercase hex of fixed width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatterDnField {
    oid_root: &'static str,
    id: u8,
    hex_width: usize,
}

impl MatterDnField {
    pub const fn new(oid_root: &'static str, id: u8, hex_width: usize) -> Self {
        Self {
            oid_root,
            id,
            hex_width,
        }
    }

    pub fn oid(&self) -> Result<DerObject> {
        DerObject::oid_from_hex(&format!("{}{:02x}", self.oid_root, self.id))
    }

    pub fn format_value(&self, value: u64) -> String {
        format!("{:0width$X}", value, width = self.hex_width)
    }

    pub fn render(&self, value: u64) -> Result<DerObject> {
        Ok(der::rdn(
            self.oid()?,
            DerObject::Utf8String(self.format_value(value)),
        ))
    }
}

pub const NODE_ID: MatterDnField = MatterDnField::new(OID_MATTER_DN_ROOT, 1, 16);
pub const FIRMWARE_SIGNING_ID: MatterDnField = MatterDnField::new(OID_MATTER_DN_ROOT, 2, 8);
pub const ICAC_ID: MatterDnField = MatterDnField::new(OID_MATTER_DN_ROOT, 3, 16);
pub const RCAC_ID: MatterDnField = MatterDnField::new(OID_MATTER_DN_ROOT, 4, 16);
pub const FABRIC_ID: MatterDnField = MatterDnField::new(OID_MATTER_DN_ROOT, 5, 16);
pub const NOC_CAT: MatterDnField = MatterDnField::new(OID_MATTER_DN_ROOT, 6, 8);
pub const VENDOR_ID: MatterDnField = MatterDnField::new(OID_MATTER_ATTESTATION_ROOT, 1, 4);
pub const PRODUCT_ID: MatterDnField = MatterDnField::new(OID_MATTER_ATTESTATION_ROOT, 2, 4);

fn render_attribute(attribute: &DnAttribute) -> Result<DerObject> {
    match attribute {
        DnAttribute::Standard {
            attribute,
            value,
            printable,
        } => {
            let value = if *printable {
                DerObject::PrintableString(value.clone())
            } else if *attribute == StandardAttribute::DomainComponent {
                DerObject::Ia5String(value.clone())
            } else {
                DerObject::Utf8String(value.clone())
            };
            Ok(der::rdn(DerObject::oid(attribute.oid())?, value))
        }
        DnAttribute::NodeId(v) => NODE_ID.render(*v),
        DnAttribute::FirmwareSigningId(v) => FIRMWARE_SIGNING_ID.render(*v as u64),
        DnAttribute::IcacId(v) => ICAC_ID.render(*v),
        DnAttribute::RcacId(v) => RCAC_ID.render(*v),
        DnAttribute::FabricId(v) => FABRIC_ID.render(*v),
        DnAttribute::CaseAuthenticatedTag(v) => NOC_CAT.render(*v as u64),
        DnAttribute::VendorId(v) => VENDOR_ID.render(*v as u64),
        DnAttribute::ProductId(v) => PRODUCT_ID.render(*v as u64),
    }
}

/// Name as SEQUENCE of single valued RDNs, in stored order.
pub fn render_dn(dn: &DistinguishedName) -> Result<DerObject> {
    let rdns = dn
        .attributes()
        .iter()
        .map(render_attribute)
        .collect::<Result<Vec<_>>>()?;
    Ok(DerObject::Sequence(rdns))
}

fn validity(cert: &MatterCertificate) -> Result<DerObject> {
    Ok(DerObject::Sequence(vec![
        DerObject::Time(epoch::matter_to_date(cert.not_before)?),
        DerObject::Time(epoch::matter_to_date(cert.not_after)?),
    ]))
}

fn extensions(cert: &MatterCertificate, kind: CertificateKind) -> Result<DerObject> {
    let ext = &cert.extensions;
    let ca_usage = (KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN).bits();
    let leaf_usage = KeyUsage::DIGITAL_SIGNATURE.bits();
    let mut out = match kind {
        CertificateKind::Root | CertificateKind::Intermediate => vec![
            der::basic_constraints(true, ext.basic_constraints.path_len)?,
            der::key_usage(ca_usage)?,
        ],
        CertificateKind::Operational => vec![
            der::basic_constraints(false, None)?,
            der::key_usage(leaf_usage)?,
            der::extended_key_usage(&[der::OID_KP_CLIENT_AUTH, der::OID_KP_SERVER_AUTH])?,
        ],
        CertificateKind::DeviceAttestation => vec![
            der::basic_constraints(false, None)?,
            der::key_usage(leaf_usage)?,
        ],
        CertificateKind::ProductAttestationIntermediate => vec![
            der::basic_constraints(true, Some(0))?,
            der::key_usage(ca_usage)?,
        ],
        CertificateKind::ProductAttestationAuthority => vec![
            der::basic_constraints(false, None)?,
            der::key_usage(ca_usage)?,
        ],
    };
    out.push(der::subject_key_identifier(&ext.subject_key_identifier)?);
    if let Some(aki) = &ext.authority_key_identifier {
        out.push(der::authority_key_identifier(aki)?);
    }
    if let Some(future) = &ext.future_extension {
        out.push(DerObject::Raw(future.clone()));
    }
    Ok(DerObject::Sequence(out))
}

/// TBSCertificate of `cert` interpreted as `kind`. Fails when the
/// certificate breaks the rules of the kind.
pub fn tbs_certificate(cert: &MatterCertificate, kind: CertificateKind) -> Result<DerObject> {
    kind.check(cert)?;
    Ok(DerObject::Sequence(vec![
        DerObject::tagged(0, DerObject::uint(X509_VERSION_3)),
        DerObject::uint_bytes(&cert.serial_number),
        der::ecdsa_with_sha256()?,
        render_dn(&cert.issuer)?,
        validity(cert)?,
        render_dn(&cert.subject)?,
        der::ec_public_key(&cert.public_key)?,
        DerObject::tagged(3, extensions(cert, kind)?),
    ]))
}

/// Complete X.509 certificate from TBS and DER encoded signature.
pub fn assemble(tbs: DerObject, der_signature: &[u8]) -> Result<Vec<u8>> {
    Ok(DerObject::Sequence(vec![
        tbs,
        der::ecdsa_with_sha256()?,
        DerObject::bit_string(der_signature),
    ])
    .encode())
}

/// Sign TBS of `cert` with `key` and return complete X.509 certificate.
pub fn encode_x509(
    cert: &MatterCertificate,
    kind: CertificateKind,
    key: &p256::SecretKey,
) -> Result<Vec<u8>> {
    let tbs = tbs_certificate(cert, kind)?;
    let signature = cryptoutil::sign_der(key, &tbs.encode())?;
    assemble(tbs, &signature)
}

/// X.509 form of already signed matter certificate.
pub fn to_x509(cert: &MatterCertificate, kind: CertificateKind) -> Result<Vec<u8>> {
    let tbs = tbs_certificate(cert, kind)?;
    assemble(tbs, &cryptoutil::raw_signature_to_der(&cert.signature)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert_matter::tests::{
        decode_hex, GENERAL_NOC_TLV, GENERAL_ROOT_TLV, GOOGLE_ROOT_TLV, MATTER_ROOT_TLV,
    };
    use x509_cert::der::Decode;

    #[test]
    fn matter_fields() -> Result<()> {
        assert_eq!(NODE_ID.format_value(0xda), "00000000000000DA");
        assert_eq!(NOC_CAT.format_value(0x12345678), "12345678");
        assert_eq!(VENDOR_ID.format_value(0xfff1), "FFF1");
        assert_eq!(
            hex::encode(RCAC_ID.render(0)?.encode()),
            "3120301e060a2b0601040182a27c01040c1030303030303030303030303030303030"
        );
        assert_eq!(
            hex::encode(PRODUCT_ID.oid()?.encode()),
            "060a2b0601040182a27c0202"
        );
        Ok(())
    }

    #[test]
    fn standard_attribute_string_types() -> Result<()> {
        let dn = DistinguishedName::new(vec![
            DnAttribute::Standard {
                attribute: StandardAttribute::CountryName,
                value: "US".to_owned(),
                printable: true,
            },
            DnAttribute::Standard {
                attribute: StandardAttribute::DomainComponent,
                value: "io".to_owned(),
                printable: false,
            },
            DnAttribute::common_name("x"),
        ]);
        assert_eq!(
            hex::encode(render_dn(&dn)?.encode()),
            "302d310b300906035504061302555331123010060a0992268993f22c6401191602696f310a300806035504030c0178"
        );
        Ok(())
    }

    #[test]
    fn attestation_extensions() -> Result<()> {
        let mut cert = decode_hex(GENERAL_NOC_TLV);
        cert.issuer = DistinguishedName::new(vec![
            DnAttribute::common_name("PAI"),
            DnAttribute::VendorId(0xfff1),
        ]);
        cert.subject = DistinguishedName::new(vec![
            DnAttribute::common_name("DAC"),
            DnAttribute::VendorId(0xfff1),
            DnAttribute::ProductId(0x8000),
        ]);
        let tbs = hex::encode(tbs_certificate(&cert, CertificateKind::DeviceAttestation)?.encode());
        // basic constraints not CA followed by digitalSignature key usage
        assert!(tbs.contains("300c0603551d130101ff04023000300e0603551d0f0101ff040403020780"));
        assert!(tbs.contains("0c0446464631"));
        assert!(!tbs.contains("551d25"));

        cert.subject.0.pop();
        let tbs = hex::encode(
            tbs_certificate(&cert, CertificateKind::ProductAttestationIntermediate)?.encode(),
        );
        assert!(tbs.contains("30120603551d130101ff040830060101ff020100"));

        // DAC needs product id in subject
        assert!(tbs_certificate(&cert, CertificateKind::DeviceAttestation).is_err());
        Ok(())
    }

    #[test]
    fn to_x509_parses() -> Result<()> {
        for (data, kind) in [
            (GENERAL_ROOT_TLV, CertificateKind::Root),
            (GENERAL_NOC_TLV, CertificateKind::Operational),
            (GOOGLE_ROOT_TLV, CertificateKind::Root),
        ] {
            let cert = decode_hex(data);
            let x509 = to_x509(&cert, kind)?;
            let parsed = x509_cert::Certificate::from_der(&x509)?;
            assert_eq!(
                parsed.tbs_certificate.serial_number.as_bytes(),
                cert.serial_number.as_slice()
            );
            assert_eq!(MatterCertificate::from_x509(&x509)?, cert);
        }

        // multi byte serial is encoded whole
        let root = decode_hex(MATTER_ROOT_TLV);
        assert_eq!(root.serial_number, hex::decode("59eaa632947f541c")?);
        let x509 = to_x509(&root, CertificateKind::Root)?;
        assert!(hex::encode(&x509).contains("020859eaa632947f541c"));
        let parsed = x509_cert::Certificate::from_der(&x509)?;
        assert_eq!(
            parsed.tbs_certificate.serial_number.as_bytes(),
            root.serial_number.as_slice()
        );
        Ok(())
    }
}
