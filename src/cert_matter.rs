//! Handling of certificates in Matter format
//!
//! [MatterCertificate] is the typed form of the Matter TLV certificate
//! (Matter core specification 6.5). It can be decoded from and encoded to
//! TLV, or imported from an X.509 DER certificate. [CertificateKind] carries
//! the per-kind rules for distinguished names.

use std::fmt;

use anyhow::{Context, Result};
use x509_cert::der::{Decode, Encode, Tag, Tagged};

use crate::{
    cat,
    config::CodecConfig,
    der,
    epoch,
    error::{CertificateError, TlvError},
    tlv::{self, TlvBuffer, TlvItem, TlvItemValue},
    tlv_schema::{self, optional, repeated, required, Field, FieldType, U16, U32, U64, U8},
    util::cryptoutil,
};

pub const SIGNATURE_ALGORITHM_ECDSA_SHA256: u8 = 1;
pub const PUBLIC_KEY_ALGORITHM_EC: u8 = 1;
pub const ELLIPTIC_CURVE_PRIME256V1: u8 = 1;

pub const KEY_IDENTIFIER_LEN: usize = 20;
pub const PUBLIC_KEY_LEN: usize = 65;
pub const SIGNATURE_LEN: usize = 64;

const OID_MATTER_DN_NODE: &str = "1.3.6.1.4.1.37244.1.1";
const OID_MATTER_DN_FIRMWARE_SIGNING: &str = "1.3.6.1.4.1.37244.1.2";
const OID_MATTER_DN_ICAC: &str = "1.3.6.1.4.1.37244.1.3";
const OID_MATTER_DN_RCAC: &str = "1.3.6.1.4.1.37244.1.4";
const OID_MATTER_DN_FABRIC: &str = "1.3.6.1.4.1.37244.1.5";
const OID_MATTER_DN_NOC_CAT: &str = "1.3.6.1.4.1.37244.1.6";
const OID_MATTER_DN_VENDOR: &str = "1.3.6.1.4.1.37244.2.1";
const OID_MATTER_DN_PRODUCT: &str = "1.3.6.1.4.1.37244.2.2";

const TLV_TAG_NODE_ID: u8 = 17;
const TLV_TAG_FIRMWARE_SIGNING_ID: u8 = 18;
const TLV_TAG_ICAC_ID: u8 = 19;
const TLV_TAG_RCAC_ID: u8 = 20;
const TLV_TAG_FABRIC_ID: u8 = 21;
const TLV_TAG_NOC_CAT: u8 = 22;
const TLV_TAG_PRINTABLE_OFFSET: u8 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CertificateKind {
    Root,
    Intermediate,
    Operational,
    DeviceAttestation,
    ProductAttestationIntermediate,
    ProductAttestationAuthority,
}

impl fmt::Display for CertificateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CertificateKind::Root => "root",
            CertificateKind::Intermediate => "intermediate",
            CertificateKind::Operational => "operational",
            CertificateKind::DeviceAttestation => "device attestation",
            CertificateKind::ProductAttestationIntermediate => "product attestation intermediate",
            CertificateKind::ProductAttestationAuthority => "product attestation authority",
        };
        f.write_str(name)
    }
}

/// DN attributes which are subject to per-kind rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DnField {
    CommonName,
    NodeId,
    FirmwareSigningId,
    IcacId,
    RcacId,
    FabricId,
    CaseAuthenticatedTag,
    VendorId,
    ProductId,
}

impl DnField {
    pub fn name(self) -> &'static str {
        match self {
            DnField::CommonName => "commonName",
            DnField::NodeId => "nodeId",
            DnField::FirmwareSigningId => "firmwareSigningId",
            DnField::IcacId => "icacId",
            DnField::RcacId => "rcacId",
            DnField::FabricId => "fabricId",
            DnField::CaseAuthenticatedTag => "caseAuthenticatedTag",
            DnField::VendorId => "vendorId",
            DnField::ProductId => "productId",
        }
    }
}

struct KindRules {
    subject_required: &'static [DnField],
    /// Matter attributes allowed in subject. Standard attributes are always allowed.
    subject_allowed: &'static [DnField],
    issuer_required: &'static [DnField],
    issuer_allowed: &'static [DnField],
    authority_key_required: bool,
}

const ROOT_RULES: KindRules = KindRules {
    subject_required: &[DnField::RcacId],
    subject_allowed: &[DnField::RcacId, DnField::FabricId],
    issuer_required: &[],
    issuer_allowed: &[DnField::RcacId, DnField::FabricId],
    authority_key_required: true,
};

const INTERMEDIATE_RULES: KindRules = KindRules {
    subject_required: &[DnField::IcacId],
    subject_allowed: &[DnField::IcacId, DnField::FabricId],
    issuer_required: &[],
    issuer_allowed: &[DnField::RcacId, DnField::FabricId],
    authority_key_required: true,
};

const OPERATIONAL_RULES: KindRules = KindRules {
    subject_required: &[DnField::NodeId, DnField::FabricId],
    subject_allowed: &[
        DnField::NodeId,
        DnField::FabricId,
        DnField::CaseAuthenticatedTag,
    ],
    issuer_required: &[],
    issuer_allowed: &[DnField::RcacId, DnField::IcacId, DnField::FabricId],
    authority_key_required: true,
};

const DAC_RULES: KindRules = KindRules {
    subject_required: &[DnField::CommonName, DnField::VendorId, DnField::ProductId],
    subject_allowed: &[DnField::VendorId, DnField::ProductId],
    issuer_required: &[DnField::CommonName],
    issuer_allowed: &[DnField::VendorId, DnField::ProductId],
    authority_key_required: true,
};

const PAI_RULES: KindRules = KindRules {
    subject_required: &[DnField::CommonName, DnField::VendorId],
    subject_allowed: &[DnField::VendorId, DnField::ProductId],
    issuer_required: &[DnField::CommonName],
    issuer_allowed: &[DnField::VendorId],
    authority_key_required: true,
};

const PAA_RULES: KindRules = KindRules {
    subject_required: &[DnField::CommonName],
    subject_allowed: &[DnField::VendorId],
    issuer_required: &[DnField::CommonName],
    issuer_allowed: &[DnField::VendorId],
    authority_key_required: false,
};

impl CertificateKind {
    fn rules(self) -> &'static KindRules {
        match self {
            CertificateKind::Root => &ROOT_RULES,
            CertificateKind::Intermediate => &INTERMEDIATE_RULES,
            CertificateKind::Operational => &OPERATIONAL_RULES,
            CertificateKind::DeviceAttestation => &DAC_RULES,
            CertificateKind::ProductAttestationIntermediate => &PAI_RULES,
            CertificateKind::ProductAttestationAuthority => &PAA_RULES,
        }
    }

    /// Check mandatory and allowed fields of `cert` for this kind.
    pub fn check(self, cert: &MatterCertificate) -> Result<()> {
        let rules = self.rules();
        self.check_dn(
            "subject",
            &cert.subject,
            rules.subject_required,
            rules.subject_allowed,
        )?;
        self.check_dn(
            "issuer",
            &cert.issuer,
            rules.issuer_required,
            rules.issuer_allowed,
        )?;
        if rules.authority_key_required && cert.extensions.authority_key_identifier.is_none() {
            return Err(CertificateError::MissingField {
                kind: self,
                field: "extensions.authorityKeyIdentifier".to_owned(),
            }
            .into());
        }
        if self == CertificateKind::Operational {
            cat::validate_noc_tag_list(&cert.subject.case_authenticated_tags())?;
        }
        cert.check_algorithms()
    }

    fn check_dn(
        self,
        part: &str,
        dn: &DistinguishedName,
        required: &[DnField],
        allowed: &[DnField],
    ) -> Result<()> {
        for field in required {
            if !dn.has(*field) {
                return Err(CertificateError::MissingField {
                    kind: self,
                    field: format!("{}.{}", part, field.name()),
                }
                .into());
            }
        }
        for attribute in &dn.0 {
            if let Some(field) = attribute.matter_field() {
                if !allowed.contains(&field) {
                    return Err(CertificateError::UnexpectedField {
                        kind: self,
                        field: format!("{}.{}", part, field.name()),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }
}

/// X.520 attributes, numbered by their TLV tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StandardAttribute {
    CommonName = 1,
    Surname = 2,
    SerialNumber = 3,
    CountryName = 4,
    LocalityName = 5,
    StateOrProvinceName = 6,
    OrganizationName = 7,
    OrganizationalUnitName = 8,
    Title = 9,
    Name = 10,
    GivenName = 11,
    Initials = 12,
    GenerationQualifier = 13,
    DnQualifier = 14,
    Pseudonym = 15,
    DomainComponent = 16,
}

impl StandardAttribute {
    const ALL: [StandardAttribute; 16] = [
        StandardAttribute::CommonName,
        StandardAttribute::Surname,
        StandardAttribute::SerialNumber,
        StandardAttribute::CountryName,
        StandardAttribute::LocalityName,
        StandardAttribute::StateOrProvinceName,
        StandardAttribute::OrganizationName,
        StandardAttribute::OrganizationalUnitName,
        StandardAttribute::Title,
        StandardAttribute::Name,
        StandardAttribute::GivenName,
        StandardAttribute::Initials,
        StandardAttribute::GenerationQualifier,
        StandardAttribute::DnQualifier,
        StandardAttribute::Pseudonym,
        StandardAttribute::DomainComponent,
    ];

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.get((tag as usize).checked_sub(1)?).copied()
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn oid(self) -> &'static str {
        match self {
            StandardAttribute::CommonName => "2.5.4.3",
            StandardAttribute::Surname => "2.5.4.4",
            StandardAttribute::SerialNumber => "2.5.4.5",
            StandardAttribute::CountryName => "2.5.4.6",
            StandardAttribute::LocalityName => "2.5.4.7",
            StandardAttribute::StateOrProvinceName => "2.5.4.8",
            StandardAttribute::OrganizationName => "2.5.4.10",
            StandardAttribute::OrganizationalUnitName => "2.5.4.11",
            StandardAttribute::Title => "2.5.4.12",
            StandardAttribute::Name => "2.5.4.41",
            StandardAttribute::GivenName => "2.5.4.42",
            StandardAttribute::Initials => "2.5.4.43",
            StandardAttribute::GenerationQualifier => "2.5.4.44",
            StandardAttribute::DnQualifier => "2.5.4.46",
            StandardAttribute::Pseudonym => "2.5.4.65",
            StandardAttribute::DomainComponent => "0.9.2342.19200300.100.1.25",
        }
    }

    pub fn from_oid(oid: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.oid() == oid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnAttribute {
    /// `printable` selects PrintableString instead of UTF8String in X.509 form.
    Standard {
        attribute: StandardAttribute,
        value: String,
        printable: bool,
    },
    NodeId(u64),
    FirmwareSigningId(u32),
    IcacId(u64),
    RcacId(u64),
    FabricId(u64),
    CaseAuthenticatedTag(u32),
    VendorId(u16),
    ProductId(u16),
}

impl DnAttribute {
    pub fn common_name(name: &str) -> Self {
        DnAttribute::Standard {
            attribute: StandardAttribute::CommonName,
            value: name.to_owned(),
            printable: false,
        }
    }

    pub fn matter_field(&self) -> Option<DnField> {
        match self {
            DnAttribute::Standard { .. } => None,
            DnAttribute::NodeId(_) => Some(DnField::NodeId),
            DnAttribute::FirmwareSigningId(_) => Some(DnField::FirmwareSigningId),
            DnAttribute::IcacId(_) => Some(DnField::IcacId),
            DnAttribute::RcacId(_) => Some(DnField::RcacId),
            DnAttribute::FabricId(_) => Some(DnField::FabricId),
            DnAttribute::CaseAuthenticatedTag(_) => Some(DnField::CaseAuthenticatedTag),
            DnAttribute::VendorId(_) => Some(DnField::VendorId),
            DnAttribute::ProductId(_) => Some(DnField::ProductId),
        }
    }
}

/// Ordered list of DN attributes. Order is kept in both TLV and X.509 form.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DistinguishedName(pub Vec<DnAttribute>);

impl DistinguishedName {
    pub fn new(attributes: Vec<DnAttribute>) -> Self {
        Self(attributes)
    }

    pub fn attributes(&self) -> &[DnAttribute] {
        &self.0
    }

    pub fn has(&self, field: DnField) -> bool {
        match field {
            DnField::CommonName => self.common_name().is_some(),
            _ => self.0.iter().any(|a| a.matter_field() == Some(field)),
        }
    }

    pub fn common_name(&self) -> Option<&str> {
        self.0.iter().find_map(|a| match a {
            DnAttribute::Standard {
                attribute: StandardAttribute::CommonName,
                value,
                ..
            } => Some(value.as_str()),
            _ => None,
        })
    }
    pub fn node_id(&self) -> Option<u64> {
        self.0.iter().find_map(|a| match a {
            DnAttribute::NodeId(v) => Some(*v),
            _ => None,
        })
    }
    pub fn icac_id(&self) -> Option<u64> {
        self.0.iter().find_map(|a| match a {
            DnAttribute::IcacId(v) => Some(*v),
            _ => None,
        })
    }
    pub fn rcac_id(&self) -> Option<u64> {
        self.0.iter().find_map(|a| match a {
            DnAttribute::RcacId(v) => Some(*v),
            _ => None,
        })
    }
    pub fn fabric_id(&self) -> Option<u64> {
        self.0.iter().find_map(|a| match a {
            DnAttribute::FabricId(v) => Some(*v),
            _ => None,
        })
    }
    pub fn vendor_id(&self) -> Option<u16> {
        self.0.iter().find_map(|a| match a {
            DnAttribute::VendorId(v) => Some(*v),
            _ => None,
        })
    }
    pub fn product_id(&self) -> Option<u16> {
        self.0.iter().find_map(|a| match a {
            DnAttribute::ProductId(v) => Some(*v),
            _ => None,
        })
    }
    pub fn case_authenticated_tags(&self) -> Vec<u32> {
        self.0
            .iter()
            .filter_map(|a| match a {
                DnAttribute::CaseAuthenticatedTag(v) => Some(*v),
                _ => None,
            })
            .collect()
    }
}

bitflags::bitflags! {
    /// Key usage bitmap as stored in TLV. Bit n corresponds to X.509 KeyUsage bit n.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyUsage: u16 {
        const DIGITAL_SIGNATURE = 1 << 0;
        const NON_REPUDIATION = 1 << 1;
        const KEY_ENCIPHERMENT = 1 << 2;
        const DATA_ENCIPHERMENT = 1 << 3;
        const KEY_AGREEMENT = 1 << 4;
        const KEY_CERT_SIGN = 1 << 5;
        const CRL_SIGN = 1 << 6;
        const ENCIPHER_ONLY = 1 << 7;
        const DECIPHER_ONLY = 1 << 8;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ExtendedKeyUsage {
    ServerAuth = 1,
    ClientAuth = 2,
    CodeSigning = 3,
    EmailProtection = 4,
    TimeStamping = 5,
    OcspSigning = 6,
}

impl ExtendedKeyUsage {
    const ALL: [ExtendedKeyUsage; 6] = [
        ExtendedKeyUsage::ServerAuth,
        ExtendedKeyUsage::ClientAuth,
        ExtendedKeyUsage::CodeSigning,
        ExtendedKeyUsage::EmailProtection,
        ExtendedKeyUsage::TimeStamping,
        ExtendedKeyUsage::OcspSigning,
    ];

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| *e as u8 == id)
    }

    pub fn oid(self) -> &'static str {
        match self {
            ExtendedKeyUsage::ServerAuth => der::OID_KP_SERVER_AUTH,
            ExtendedKeyUsage::ClientAuth => der::OID_KP_CLIENT_AUTH,
            ExtendedKeyUsage::CodeSigning => der::OID_KP_CODE_SIGNING,
            ExtendedKeyUsage::EmailProtection => der::OID_KP_EMAIL_PROTECTION,
            ExtendedKeyUsage::TimeStamping => der::OID_KP_TIME_STAMPING,
            ExtendedKeyUsage::OcspSigning => der::OID_KP_OCSP_SIGNING,
        }
    }

    pub fn from_oid(oid: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.oid() == oid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BasicConstraints {
    pub is_ca: bool,
    pub path_len: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extensions {
    pub basic_constraints: BasicConstraints,
    pub key_usage: KeyUsage,
    pub extended_key_usage: Option<Vec<ExtendedKeyUsage>>,
    pub subject_key_identifier: Vec<u8>,
    pub authority_key_identifier: Option<Vec<u8>>,
    /// Complete DER of one additional X.509 extension.
    pub future_extension: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatterCertificate {
    pub serial_number: Vec<u8>,
    pub signature_algorithm: u8,
    pub issuer: DistinguishedName,
    pub not_before: u32,
    pub not_after: u32,
    pub subject: DistinguishedName,
    pub public_key_algorithm: u8,
    pub elliptic_curve_id: u8,
    pub public_key: Vec<u8>,
    pub extensions: Extensions,
    /// Raw r||s signature. Empty for certificates which were not signed yet.
    pub signature: Vec<u8>,
}

const UTF8_ANY: FieldType = FieldType::Utf8 {
    min: 0,
    max: usize::MAX,
};

const DN_FIELDS: &[Field] = &[
    optional(1, "commonName", UTF8_ANY),
    optional(2, "surname", UTF8_ANY),
    optional(3, "serialNumber", UTF8_ANY),
    optional(4, "countryName", UTF8_ANY),
    optional(5, "localityName", UTF8_ANY),
    optional(6, "stateOrProvinceName", UTF8_ANY),
    optional(7, "organizationName", UTF8_ANY),
    optional(8, "organizationalUnitName", UTF8_ANY),
    optional(9, "title", UTF8_ANY),
    optional(10, "name", UTF8_ANY),
    optional(11, "givenName", UTF8_ANY),
    optional(12, "initials", UTF8_ANY),
    optional(13, "generationQualifier", UTF8_ANY),
    optional(14, "dnQualifier", UTF8_ANY),
    optional(15, "pseudonym", UTF8_ANY),
    optional(16, "domainComponent", UTF8_ANY),
    optional(TLV_TAG_NODE_ID, "nodeId", U64),
    optional(TLV_TAG_FIRMWARE_SIGNING_ID, "firmwareSigningId", U32),
    optional(TLV_TAG_ICAC_ID, "icacId", U64),
    optional(TLV_TAG_RCAC_ID, "rcacId", U64),
    optional(TLV_TAG_FABRIC_ID, "fabricId", U64),
    repeated(
        TLV_TAG_NOC_CAT,
        "caseAuthenticatedTag",
        U32,
        cat::MAX_CASE_AUTHENTICATED_TAGS,
    ),
    optional(129, "commonNamePs", UTF8_ANY),
    optional(130, "surnamePs", UTF8_ANY),
    optional(131, "serialNumberPs", UTF8_ANY),
    optional(132, "countryNamePs", UTF8_ANY),
    optional(133, "localityNamePs", UTF8_ANY),
    optional(134, "stateOrProvinceNamePs", UTF8_ANY),
    optional(135, "organizationNamePs", UTF8_ANY),
    optional(136, "organizationalUnitNamePs", UTF8_ANY),
    optional(137, "titlePs", UTF8_ANY),
    optional(138, "namePs", UTF8_ANY),
    optional(139, "givenNamePs", UTF8_ANY),
    optional(140, "initialsPs", UTF8_ANY),
    optional(141, "generationQualifierPs", UTF8_ANY),
    optional(142, "dnQualifierPs", UTF8_ANY),
    optional(143, "pseudonymPs", UTF8_ANY),
];

const KEY_ID: FieldType = FieldType::Bytes {
    min: KEY_IDENTIFIER_LEN,
    max: KEY_IDENTIFIER_LEN,
};

const EXTENSION_FIELDS: &[Field] = &[
    required(
        1,
        "basicConstraints",
        FieldType::Struct(&[
            required(1, "isCa", FieldType::Bool),
            optional(2, "pathLen", U8),
        ]),
    ),
    required(2, "keyUsage", U16),
    optional(
        3,
        "extendedKeyUsage",
        FieldType::Array {
            element: &U8,
            min: 0,
            max: 6,
        },
    ),
    required(4, "subjectKeyIdentifier", KEY_ID),
    optional(5, "authorityKeyIdentifier", KEY_ID),
    optional(
        6,
        "futureExtension",
        FieldType::Bytes {
            min: 0,
            max: usize::MAX,
        },
    ),
];

/// TLV layout of a Matter certificate.
pub const CERTIFICATE_SCHEMA: FieldType = FieldType::Struct(&[
    required(1, "serialNumber", FieldType::Bytes { min: 1, max: 20 }),
    required(2, "signatureAlgorithm", U8),
    required(3, "issuer", FieldType::TaggedList(DN_FIELDS)),
    required(4, "notBefore", U32),
    required(5, "notAfter", U32),
    required(6, "subject", FieldType::TaggedList(DN_FIELDS)),
    required(7, "publicKeyAlgorithm", U8),
    required(8, "ellipticCurveId", U8),
    required(
        9,
        "ellipticCurvePublicKey",
        FieldType::Bytes {
            min: PUBLIC_KEY_LEN,
            max: PUBLIC_KEY_LEN,
        },
    ),
    required(10, "extensions", FieldType::TaggedList(EXTENSION_FIELDS)),
    required(
        11,
        "signature",
        FieldType::Bytes {
            min: SIGNATURE_LEN,
            max: SIGNATURE_LEN,
        },
    ),
]);

fn dn_from_tlv(item: &TlvItem) -> Result<DistinguishedName> {
    let mut attributes = Vec::new();
    for child in item.children().unwrap_or_default() {
        let tag = child.tag.context_id().context("dn attribute without context tag")?;
        let attribute = match (tag, &child.value) {
            (TLV_TAG_NODE_ID, TlvItemValue::Int(v)) => DnAttribute::NodeId(*v),
            (TLV_TAG_FIRMWARE_SIGNING_ID, TlvItemValue::Int(v)) => {
                DnAttribute::FirmwareSigningId(u32::try_from(*v)?)
            }
            (TLV_TAG_ICAC_ID, TlvItemValue::Int(v)) => DnAttribute::IcacId(*v),
            (TLV_TAG_RCAC_ID, TlvItemValue::Int(v)) => DnAttribute::RcacId(*v),
            (TLV_TAG_FABRIC_ID, TlvItemValue::Int(v)) => DnAttribute::FabricId(*v),
            (TLV_TAG_NOC_CAT, TlvItemValue::Int(v)) => {
                DnAttribute::CaseAuthenticatedTag(u32::try_from(*v)?)
            }
            (tag, TlvItemValue::String(value)) => {
                let printable = tag > TLV_TAG_PRINTABLE_OFFSET;
                let standard_tag = if printable {
                    tag - TLV_TAG_PRINTABLE_OFFSET
                } else {
                    tag
                };
                let attribute = StandardAttribute::from_tag(standard_tag).ok_or_else(|| {
                    TlvError::Schema {
                        field: "dn".to_owned(),
                        reason: format!("unknown attribute tag {}", tag),
                    }
                })?;
                DnAttribute::Standard {
                    attribute,
                    value: value.clone(),
                    printable,
                }
            }
            (tag, _) => {
                return Err(TlvError::Schema {
                    field: "dn".to_owned(),
                    reason: format!("unexpected value for attribute tag {}", tag),
                }
                .into())
            }
        };
        attributes.push(attribute);
    }
    Ok(DistinguishedName(attributes))
}

fn write_dn(tlv: &mut TlvBuffer, tag: u8, dn: &DistinguishedName) -> Result<()> {
    tlv.write_list(tag)?;
    for attribute in &dn.0 {
        match attribute {
            DnAttribute::Standard {
                attribute,
                value,
                printable,
            } => {
                let tag = if *printable {
                    if *attribute == StandardAttribute::DomainComponent {
                        return Err(CertificateError::Invalid(
                            "domain component has no printable string form".to_owned(),
                        )
                        .into());
                    }
                    attribute.tag() + TLV_TAG_PRINTABLE_OFFSET
                } else {
                    attribute.tag()
                };
                tlv.write_string(tag, value)?
            }
            DnAttribute::NodeId(v) => tlv.write_uint(TLV_TAG_NODE_ID, *v)?,
            DnAttribute::FirmwareSigningId(v) => {
                tlv.write_uint(TLV_TAG_FIRMWARE_SIGNING_ID, *v as u64)?
            }
            DnAttribute::IcacId(v) => tlv.write_uint(TLV_TAG_ICAC_ID, *v)?,
            DnAttribute::RcacId(v) => tlv.write_uint(TLV_TAG_RCAC_ID, *v)?,
            DnAttribute::FabricId(v) => tlv.write_uint(TLV_TAG_FABRIC_ID, *v)?,
            DnAttribute::CaseAuthenticatedTag(v) => tlv.write_uint(TLV_TAG_NOC_CAT, *v as u64)?,
            DnAttribute::VendorId(_) | DnAttribute::ProductId(_) => {
                return Err(CertificateError::Invalid(
                    "vendor and product id have no TLV representation".to_owned(),
                )
                .into())
            }
        }
    }
    tlv.write_struct_end()
}

fn parse_hex_id(value: &str, width: usize) -> Result<u64> {
    if value.len() != width {
        return Err(CertificateError::Invalid(format!(
            "matter dn value {:?} should have {} hex digits",
            value, width
        ))
        .into());
    }
    if !value
        .bytes()
        .all(|b| b.is_ascii_digit() || (b'A'..=b'F').contains(&b))
    {
        return Err(CertificateError::Invalid(format!(
            "matter dn value {:?} is not uppercase hex",
            value
        ))
        .into());
    }
    Ok(u64::from_str_radix(value, 16)?)
}

fn dn_from_x509(dn: &x509_cert::name::RdnSequence) -> Result<DistinguishedName> {
    let mut attributes = Vec::new();
    for rdn in &dn.0 {
        for atv in rdn.0.as_slice() {
            let value = std::str::from_utf8(atv.value.value())?;
            let oid = atv.oid.to_string();
            let attribute = match oid.as_str() {
                OID_MATTER_DN_NODE => DnAttribute::NodeId(parse_hex_id(value, 16)?),
                OID_MATTER_DN_FIRMWARE_SIGNING => {
                    DnAttribute::FirmwareSigningId(parse_hex_id(value, 8)? as u32)
                }
                OID_MATTER_DN_ICAC => DnAttribute::IcacId(parse_hex_id(value, 16)?),
                OID_MATTER_DN_RCAC => DnAttribute::RcacId(parse_hex_id(value, 16)?),
                OID_MATTER_DN_FABRIC => DnAttribute::FabricId(parse_hex_id(value, 16)?),
                OID_MATTER_DN_NOC_CAT => {
                    DnAttribute::CaseAuthenticatedTag(parse_hex_id(value, 8)? as u32)
                }
                OID_MATTER_DN_VENDOR => DnAttribute::VendorId(parse_hex_id(value, 4)? as u16),
                OID_MATTER_DN_PRODUCT => DnAttribute::ProductId(parse_hex_id(value, 4)? as u16),
                other => {
                    let attribute = StandardAttribute::from_oid(other).ok_or_else(|| {
                        CertificateError::Invalid(format!("unsupported dn attribute {}", other))
                    })?;
                    // only string types that render back to the same bytes
                    let printable = match (attribute, atv.value.tag()) {
                        (StandardAttribute::DomainComponent, Tag::Ia5String) => false,
                        (StandardAttribute::DomainComponent, _) => {
                            return Err(CertificateError::Invalid(
                                "domain component must be IA5String".to_owned(),
                            )
                            .into())
                        }
                        (_, Tag::PrintableString) => true,
                        (_, Tag::Utf8String) => false,
                        (_, tag) => {
                            return Err(CertificateError::Invalid(format!(
                                "unsupported string type {} for dn attribute {}",
                                tag, other
                            ))
                            .into())
                        }
                    };
                    DnAttribute::Standard {
                        attribute,
                        value: value.to_owned(),
                        printable,
                    }
                }
            };
            attributes.push(attribute);
        }
    }
    Ok(DistinguishedName(attributes))
}

fn extensions_from_x509(tbs: &x509_cert::TbsCertificate) -> Result<Extensions> {
    let mut basic_constraints = BasicConstraints::default();
    let mut key_usage = None;
    let mut extended_key_usage = None;
    let mut subject_key_identifier = None;
    let mut authority_key_identifier = None;
    let mut future_extension = None;
    for extension in tbs.extensions.as_deref().unwrap_or_default() {
        let value = extension.extn_value.as_bytes();
        match extension.extn_id.to_string().as_str() {
            der::OID_CE_BASIC_CONSTRAINTS => {
                let bc = x509_cert::ext::pkix::BasicConstraints::from_der(value)?;
                basic_constraints = BasicConstraints {
                    is_ca: bc.ca,
                    path_len: bc.path_len_constraint,
                };
            }
            der::OID_CE_KEY_USAGE => {
                let ku = x509_cert::ext::pkix::KeyUsage::from_der(value)?;
                key_usage = Some(KeyUsage::from_bits_truncate(ku.0.bits()));
            }
            der::OID_CE_EXT_KEY_USAGE => {
                let eku = x509_cert::ext::pkix::ExtendedKeyUsage::from_der(value)?;
                let usages = eku
                    .0
                    .iter()
                    .map(|oid| {
                        ExtendedKeyUsage::from_oid(&oid.to_string()).ok_or_else(|| {
                            CertificateError::Invalid(format!(
                                "unsupported oid in extendedKeyUsage {}",
                                oid
                            ))
                        })
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                extended_key_usage = Some(usages);
            }
            der::OID_CE_SUBJECT_KEY_IDENTIFIER => {
                let ski = x509_cert::ext::pkix::SubjectKeyIdentifier::from_der(value)?;
                subject_key_identifier = Some(ski.0.as_bytes().to_vec());
            }
            der::OID_CE_AUTHORITY_KEY_IDENTIFIER => {
                let aki = x509_cert::ext::pkix::AuthorityKeyIdentifier::from_der(value)?;
                authority_key_identifier = aki.key_identifier.map(|k| k.as_bytes().to_vec());
            }
            other => {
                if future_extension.is_some() {
                    return Err(CertificateError::Invalid(format!(
                        "more than one unsupported extension ({})",
                        other
                    ))
                    .into());
                }
                future_extension = Some(extension.to_der()?);
            }
        }
    }
    Ok(Extensions {
        basic_constraints,
        key_usage: key_usage.context("certificate has no key usage extension")?,
        extended_key_usage,
        subject_key_identifier: subject_key_identifier
            .context("certificate has no subject key identifier")?,
        authority_key_identifier,
        future_extension,
    })
}

impl MatterCertificate {
    pub fn decode_tlv(data: &[u8]) -> Result<Self> {
        Self::decode_tlv_with_config(data, &CodecConfig::default())
    }

    pub fn decode_tlv_with_config(data: &[u8], config: &CodecConfig) -> Result<Self> {
        let item = tlv::decode_tlv_with_config(data, config)?;
        Self::from_tlv_item(&item)
    }

    pub fn from_tlv_item(item: &TlvItem) -> Result<Self> {
        tlv_schema::validate(item, &CERTIFICATE_SCHEMA, "certificate")?;
        let missing = |name: &str| format!("certificate field {} missing", name);

        let extended_key_usage = match item.get(&[10, 3]) {
            Some(TlvItemValue::Array(ids)) => Some(
                ids.iter()
                    .map(|i| match i.value {
                        TlvItemValue::Int(id) => u8::try_from(id)
                            .ok()
                            .and_then(ExtendedKeyUsage::from_id)
                            .ok_or_else(|| {
                                CertificateError::Invalid(format!("unknown extended key usage {}", id))
                            }),
                        _ => Err(CertificateError::Invalid("extended key usage".to_owned())),
                    })
                    .collect::<std::result::Result<Vec<_>, _>>()?,
            ),
            _ => None,
        };

        let extensions = Extensions {
            basic_constraints: BasicConstraints {
                is_ca: item
                    .get_bool(&[10, 1, 1])
                    .with_context(|| missing("isCa"))?,
                path_len: item.get_u8(&[10, 1, 2]),
            },
            key_usage: KeyUsage::from_bits_truncate(
                item.get_u16(&[10, 2]).with_context(|| missing("keyUsage"))?,
            ),
            extended_key_usage,
            subject_key_identifier: item
                .get_octet_string_owned(&[10, 4])
                .with_context(|| missing("subjectKeyIdentifier"))?,
            authority_key_identifier: item.get_octet_string_owned(&[10, 5]),
            future_extension: item.get_octet_string_owned(&[10, 6]),
        };

        let cert = Self {
            serial_number: item
                .get_octet_string_owned(&[1])
                .with_context(|| missing("serialNumber"))?,
            signature_algorithm: item.get_u8(&[2]).with_context(|| missing("signatureAlgorithm"))?,
            issuer: dn_from_tlv(item.get_item(&[3]).with_context(|| missing("issuer"))?)?,
            not_before: item.get_u32(&[4]).with_context(|| missing("notBefore"))?,
            not_after: item.get_u32(&[5]).with_context(|| missing("notAfter"))?,
            subject: dn_from_tlv(item.get_item(&[6]).with_context(|| missing("subject"))?)?,
            public_key_algorithm: item.get_u8(&[7]).with_context(|| missing("publicKeyAlgorithm"))?,
            elliptic_curve_id: item.get_u8(&[8]).with_context(|| missing("ellipticCurveId"))?,
            public_key: item
                .get_octet_string_owned(&[9])
                .with_context(|| missing("ellipticCurvePublicKey"))?,
            extensions,
            signature: item
                .get_octet_string_owned(&[11])
                .with_context(|| missing("signature"))?,
        };
        log::debug!(
            "decoded matter certificate serial {}",
            hex::encode(&cert.serial_number)
        );
        Ok(cert)
    }

    /// Encode to Matter TLV. Fields are written in canonical tag order.
    pub fn encode_tlv(&self) -> Result<Vec<u8>> {
        if self.signature.len() != SIGNATURE_LEN {
            return Err(CertificateError::Invalid(format!(
                "signature length {} instead of {}",
                self.signature.len(),
                SIGNATURE_LEN
            ))
            .into());
        }
        let mut tlv = TlvBuffer::new();
        tlv.write_anon_struct()?;
        tlv.write_octetstring(1, &self.serial_number)?;
        tlv.write_uint(2, self.signature_algorithm as u64)?;
        write_dn(&mut tlv, 3, &self.issuer)?;
        tlv.write_uint(4, self.not_before as u64)?;
        tlv.write_uint(5, self.not_after as u64)?;
        write_dn(&mut tlv, 6, &self.subject)?;
        tlv.write_uint(7, self.public_key_algorithm as u64)?;
        tlv.write_uint(8, self.elliptic_curve_id as u64)?;
        tlv.write_octetstring(9, &self.public_key)?;

        let ext = &self.extensions;
        tlv.write_list(10)?;
        tlv.write_struct(1)?;
        tlv.write_bool(1, ext.basic_constraints.is_ca)?;
        if let Some(path_len) = ext.basic_constraints.path_len {
            tlv.write_uint(2, path_len as u64)?;
        }
        tlv.write_struct_end()?;
        tlv.write_uint(2, ext.key_usage.bits() as u64)?;
        if let Some(eku) = &ext.extended_key_usage {
            tlv.write_array(3)?;
            for usage in eku {
                tlv.write_uint8_notag(*usage as u8)?;
            }
            tlv.write_struct_end()?;
        }
        tlv.write_octetstring(4, &ext.subject_key_identifier)?;
        if let Some(aki) = &ext.authority_key_identifier {
            tlv.write_octetstring(5, aki)?;
        }
        if let Some(future) = &ext.future_extension {
            tlv.write_octetstring(6, future)?;
        }
        tlv.write_struct_end()?;

        tlv.write_octetstring(11, &self.signature)?;
        tlv.write_struct_end()?;
        Ok(tlv.into_vec())
    }

    /// Import X.509 DER certificate.
    pub fn from_x509(data: &[u8]) -> Result<Self> {
        let x509 = x509_cert::Certificate::from_der(data)?;
        let tbs = &x509.tbs_certificate;
        if x509.signature_algorithm.oid != der::parse_oid(der::OID_SIG_ECDSA_WITH_SHA256)? {
            return Err(CertificateError::UnsupportedSignatureType.into());
        }
        let public_key = tbs
            .subject_public_key_info
            .subject_public_key
            .as_bytes()
            .context("can't extract subject public key")?
            .to_vec();
        let signature = x509
            .signature
            .as_bytes()
            .context("can't get signature from x509")?;
        Ok(Self {
            serial_number: tbs.serial_number.as_bytes().to_vec(),
            signature_algorithm: SIGNATURE_ALGORITHM_ECDSA_SHA256,
            issuer: dn_from_x509(&tbs.issuer)?,
            not_before: epoch::date_to_matter(&tbs.validity.not_before.to_date_time())?,
            not_after: epoch::date_to_matter(&tbs.validity.not_after.to_date_time())?,
            subject: dn_from_x509(&tbs.subject)?,
            public_key_algorithm: PUBLIC_KEY_ALGORITHM_EC,
            elliptic_curve_id: ELLIPTIC_CURVE_PRIME256V1,
            public_key,
            extensions: extensions_from_x509(tbs)?,
            signature: cryptoutil::der_signature_to_raw(signature)?,
        })
    }

    fn check_algorithms(&self) -> Result<()> {
        if self.signature_algorithm != SIGNATURE_ALGORITHM_ECDSA_SHA256 {
            return Err(CertificateError::UnsupportedSignatureType.into());
        }
        if self.public_key_algorithm != PUBLIC_KEY_ALGORITHM_EC
            || self.elliptic_curve_id != ELLIPTIC_CURVE_PRIME256V1
        {
            return Err(CertificateError::Invalid("unsupported public key type".to_owned()).into());
        }
        if self.public_key.len() != PUBLIC_KEY_LEN {
            return Err(CertificateError::Invalid(format!(
                "public key length {}",
                self.public_key.len()
            ))
            .into());
        }
        Ok(())
    }
}

/// Convert certificate from X509/DER array of bytes to matter format
pub fn convert_x509_bytes_to_matter(bytes: &[u8]) -> Result<Vec<u8>> {
    MatterCertificate::from_x509(bytes)?.encode_tlv()
}

/// Convert certificate in PEM file to matter format
pub fn convert_x509_to_matter(fname: &str) -> Result<Vec<u8>> {
    let x509_raw = cryptoutil::read_data_from_pem(fname)?;
    convert_x509_bytes_to_matter(&x509_raw)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const GENERAL_ROOT_TLV: &str = "153001010024020137032414001826048012542826058015203b37062414001824070124080130094104d89eb7e3f3226d0918f4b85832457bb9981bca7aaef58c18fb5ec07525e472b2bd1617fb75ee41bd388f94ae6a6070efc896777516a5c54aff74ec0804cdde9d370a3501290118240260300414e766069362d7e35b79687161644d222bdde93a68300514e766069362d7e35b79687161644d222bdde93a6818300b404e8fb06526f0332b3e928166864a6d29cade53fb5b8918a6d134d0994bf1ae6dce6762dcba99e80e96249d2f1ccedb336b26990f935dba5a0b9e5b4c9e5d1d8f18";
    pub const GENERAL_NOC_TLV: &str = "153001010124020137032414001826048012542826058015203b37062415012411da1824070124080130094104e0bf14a052dd7ab08d485e20570c6e6ac6fbb99513d3aacd66808c722941ae0538e9323ec89f39228bd228270f1716539cecc64e62b26c58c3355d68935d87b2370a350128011824020136030402040118300414c524e05cad04a826ecda84501766732b5f181354300514e766069362d7e35b79687161644d222bdde93a6818300b40aca27ff4b68e81168295b85753e128226ec3d7b35916be9b32f4311bb4eb39a3b9e5583c8d762be1e9332647d61088bb057b6844892654c97624797d0390c9c318";
    pub const MATTER_ROOT_TLV: &str = "1530010859eaa632947f541c2402013703271401000000cacacaca182604ef171b2726056eb5b94c3706271401000000cacacaca18240701240801300941041353a3b3ef1da708c4908048014e407d5990ce22bc4eb33e9a5acb25a85603eba6dcd8213666a4e44f5aca13eb767fafa7dcdddc33411f82a30b543dd1d24ba8370a350129011824026030041413af81ab37374b2ed2a9649b12b7a3a4287e151d30051413af81ab37374b2ed2a9649b12b7a3a4287e151d18300b40458164466c8f195abc0abb7c6cb5a27a83f41d37f8d53beec520abd2a0da0509b8a7c25c042e30cf64dc30fe334e120019664e515049134f5781238444fc753118";
    pub const MATTER_ICAC_TLV: &str = "153001082db444855641aedf2402013703271401000000cacacaca182604ef171b2726056eb5b94c3706271303000000cacacaca1824070124080130094104c5d0861bb8f90c405c12314e4c5ebeea939f72774bcc33239e2f59f6f46af8dc7d4682a0e3ccc646e6df29ea86bf562ae720a898337d383f32c0a09e416019ea370a35012901182402603004145352d7059e9c15a508906862864801a29f1f41d330051413af81ab37374b2ed2a9649b12b7a3a4287e151d18300b40841a06d43b5e9fecd24e87b1244eb51c6a2cf20d9b5e6ba07f11e6002f7e0ca34e32a602c3609d0092d348bdbd198a114646bd41cf103783641ae25e3f23fd2618";
    pub const MATTER_NOC_TLV: &str = "153001083efcff1702b9a17a2402013703271303000000cacacaca182604ef171b2726056eb5b94c3706271101000100dededede27151d0000000000b0fa18240701240801300941049a2a216fb39dd6b6fa211b835c89e3e6afb66c14f75831954f9ff4f7a3f0112c8a0d8eaf29c653294d48eee0708a032cca39393c3a7b46f181aea078fead8383370a3501280118240201360304020401183004149f55a26b7e4303e60883e913bf94f4fb5e2a61613005145352d7059e9c15a508906862864801a29f1f41d318300b407955c202630b4ba4d5912526322fdf28f89edfe5af9c0e572bd8a14aaabb4d12b83ca17c7b05fb164b77d79c529613316bcfd17895e4b2a4f2404b981732715918";
    pub const GOOGLE_ROOT_TLV: &str = "153001010124020137032c840255532c0706476f6f676c652c010b4d617474657220526f6f74271401000000feffffff1826047fd2432926057f945be537062c840255532c0706476f6f676c652c010b4d617474657220526f6f74271401000000feffffff18240701240801300941045b37df6549c20dc8d722a6b8acb660a8a764ce7baf6c6c224f7ee84349684ad7d809ff650033d1527dcf1fbaac6a9c3ad8b41edac909f7b5c760fd542c892375370a350129012402011824026030041472c201f7571913b348ca00ca7b45f4774668c97e30051472c201f7571913b348ca00ca7b45f4774668c97e18300b4065164b166adff18c15610a8ce91bd703e9c1f677b711ce133505152df0da15111675ac5591cee786851cdd9efdad296674bebcb2a3a3209bcde7b309db552c6f18";
    pub const AMAZON_ROOT_TLV: &str = "15300111008f7e89d8d67b0aecdeae6d212deaa3b724020137032714d894477fd1553601182604537ac72a2605e378cd5937062714d894477fd15536011824070124080130094104047302d8c1c429049055346a31cf2c7e62d7266a3ddeb60a854810d9a8d3ed50a2e90bb5f1fad51b29b727c153946b64718ae2422ea10dfc9b7db0cbc48164d4370a3501290118300414c6e675219d6a1ebb8e664f86d80fe11c3758b859240261300514c6e675219d6a1ebb8e664f86d80fe11c3758b85918300b40092a586ace30018a5fa614cca2c2b23c58ab6c75dc8e759f95a7ba13db97d84043b532505e0cf61c187d29c00f56f90a4952dfb195163d49bbb1f5402e52ad9818";

    pub fn decode_hex(data: &str) -> MatterCertificate {
        MatterCertificate::decode_tlv(&hex::decode(data).unwrap()).unwrap()
    }

    #[test]
    fn decode_general_root() {
        let root = decode_hex(GENERAL_ROOT_TLV);
        assert_eq!(root.serial_number, vec![0]);
        assert_eq!(root.issuer.rcac_id(), Some(0));
        assert_eq!(root.subject, DistinguishedName(vec![DnAttribute::RcacId(0)]));
        assert_eq!(root.not_before, 0x28541280);
        assert_eq!(root.not_after, 0x3b201580);
        assert!(root.extensions.basic_constraints.is_ca);
        assert_eq!(root.extensions.basic_constraints.path_len, None);
        assert_eq!(
            root.extensions.key_usage,
            KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN
        );
        assert_eq!(
            root.extensions.subject_key_identifier,
            hex::decode("e766069362d7e35b79687161644d222bdde93a68").unwrap()
        );
        assert_eq!(root.public_key.len(), PUBLIC_KEY_LEN);
        assert_eq!(root.signature.len(), SIGNATURE_LEN);
        CertificateKind::Root.check(&root).unwrap();
    }

    #[test]
    fn decode_noc_keeps_dn_order() {
        let noc = decode_hex(GENERAL_NOC_TLV);
        assert_eq!(
            noc.subject,
            DistinguishedName(vec![DnAttribute::FabricId(1), DnAttribute::NodeId(0xda)])
        );
        assert_eq!(
            noc.extensions.extended_key_usage,
            Some(vec![ExtendedKeyUsage::ClientAuth, ExtendedKeyUsage::ServerAuth])
        );
        assert!(!noc.extensions.basic_constraints.is_ca);
        CertificateKind::Operational.check(&noc).unwrap();
    }

    #[test]
    fn decode_printable_attributes() {
        let root = decode_hex(GOOGLE_ROOT_TLV);
        assert_eq!(
            root.subject.0[0],
            DnAttribute::Standard {
                attribute: StandardAttribute::CountryName,
                value: "US".to_owned(),
                printable: true
            }
        );
        assert_eq!(root.subject.common_name(), Some("Matter Root"));
        assert_eq!(root.subject.rcac_id(), Some(0xFFFFFFFE00000001));
        assert_eq!(root.extensions.basic_constraints.path_len, Some(1));
    }

    #[test]
    fn decode_any_extension_order() {
        let root = decode_hex(AMAZON_ROOT_TLV);
        assert_eq!(root.serial_number.len(), 17);
        assert_eq!(
            root.extensions.key_usage,
            KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN
        );
        CertificateKind::Root.check(&root).unwrap();
    }

    #[test]
    fn tlv_roundtrip() {
        for data in [
            GENERAL_ROOT_TLV,
            GENERAL_NOC_TLV,
            MATTER_ROOT_TLV,
            MATTER_ICAC_TLV,
            MATTER_NOC_TLV,
            GOOGLE_ROOT_TLV,
        ] {
            let cert = decode_hex(data);
            assert_eq!(hex::encode(cert.encode_tlv().unwrap()), data);
        }
    }

    #[test]
    fn schema_violations() {
        // serial number longer than 20 bytes
        let mut tlv = TlvBuffer::new();
        tlv.write_anon_struct().unwrap();
        tlv.write_octetstring(1, &[1; 21]).unwrap();
        tlv.write_struct_end().unwrap();
        let err = MatterCertificate::decode_tlv(tlv.data()).unwrap_err();
        match err.downcast_ref::<TlvError>() {
            Some(TlvError::Schema { field, .. }) => assert_eq!(field, "certificate.serialNumber"),
            other => panic!("unexpected {:?}", other),
        }

        // truncated certificate
        let data = hex::decode(GENERAL_ROOT_TLV).unwrap();
        assert!(MatterCertificate::decode_tlv(&data[..data.len() - 1]).is_err());
    }

    #[test]
    fn kind_rules() {
        let mut noc = decode_hex(GENERAL_NOC_TLV);
        let err = CertificateKind::Root.check(&noc).unwrap_err();
        assert_eq!(
            err.downcast_ref::<CertificateError>(),
            Some(&CertificateError::MissingField {
                kind: CertificateKind::Root,
                field: "subject.rcacId".to_owned()
            })
        );

        noc.subject.0.push(DnAttribute::IcacId(5));
        let err = CertificateKind::Operational.check(&noc).unwrap_err();
        assert_eq!(
            err.downcast_ref::<CertificateError>(),
            Some(&CertificateError::UnexpectedField {
                kind: CertificateKind::Operational,
                field: "subject.icacId".to_owned()
            })
        );

        let mut noc = decode_hex(GENERAL_NOC_TLV);
        noc.subject.0.extend([
            DnAttribute::CaseAuthenticatedTag(0x0001_0001),
            DnAttribute::CaseAuthenticatedTag(0x0001_0002),
        ]);
        let err = CertificateKind::Operational.check(&noc).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CertificateError>(),
            Some(CertificateError::InvalidCaseAuthenticatedTags(_))
        ));

        let mut noc = decode_hex(GENERAL_NOC_TLV);
        noc.extensions.authority_key_identifier = None;
        assert!(CertificateKind::Operational.check(&noc).is_err());
    }

    #[test]
    fn attestation_dn_has_no_tlv_form() {
        let mut root = decode_hex(GENERAL_ROOT_TLV);
        root.subject.0.push(DnAttribute::VendorId(0xfff1));
        assert!(root.encode_tlv().is_err());
    }

    fn assert_invalid(err: anyhow::Error) {
        assert!(
            matches!(err.downcast_ref::<CertificateError>(), Some(CertificateError::Invalid(_))),
            "unexpected {:?}",
            err
        );
    }

    #[test]
    fn domain_component_forms() {
        let mut root = decode_hex(GENERAL_ROOT_TLV);
        root.subject.0.push(DnAttribute::Standard {
            attribute: StandardAttribute::DomainComponent,
            value: "io".to_owned(),
            printable: false,
        });
        let tlv = root.encode_tlv().unwrap();
        assert_eq!(MatterCertificate::decode_tlv(&tlv).unwrap(), root);
        let x509 = crate::cert_x509::to_x509(&root, CertificateKind::Root).unwrap();
        assert_eq!(MatterCertificate::from_x509(&x509).unwrap(), root);

        // UTF8String domain component would come back as IA5String
        let ia5_dc = "060a0992268993f22c6401191602696f";
        let x509 = hex::encode(x509);
        assert!(x509.contains(ia5_dc));
        let utf8 = x509.replace(ia5_dc, "060a0992268993f22c6401190c02696f");
        assert_invalid(MatterCertificate::from_x509(&hex::decode(utf8).unwrap()).unwrap_err());

        if let Some(DnAttribute::Standard { printable, .. }) = root.subject.0.last_mut() {
            *printable = true;
        }
        assert_invalid(root.encode_tlv().unwrap_err());
        let x509 = crate::cert_x509::to_x509(&root, CertificateKind::Root).unwrap();
        assert_invalid(MatterCertificate::from_x509(&x509).unwrap_err());
    }

    #[test]
    fn x509_string_types() {
        let mut root = decode_hex(GENERAL_ROOT_TLV);
        root.subject.0.push(DnAttribute::common_name("x"));
        let x509 = hex::encode(crate::cert_x509::to_x509(&root, CertificateKind::Root).unwrap());
        let utf8_cn = "06035504030c0178";
        assert!(x509.contains(utf8_cn));
        // TeletexString, IA5String
        for tag in ["14", "16"] {
            let changed = x509.replace(utf8_cn, &format!("0603550403{}0178", tag));
            assert_invalid(MatterCertificate::from_x509(&hex::decode(changed).unwrap()).unwrap_err());
        }
    }

    #[test]
    fn matter_dn_values_are_uppercase_hex() {
        assert_eq!(parse_hex_id("00000000000000DA", 16).unwrap(), 0xda);
        assert_eq!(parse_hex_id("FFF1", 4).unwrap(), 0xfff1);
        assert_invalid(parse_hex_id("00000000000000da", 16).unwrap_err());
        assert_invalid(parse_hex_id("+000000000000001", 16).unwrap_err());
        assert_invalid(parse_hex_id("-001", 4).unwrap_err());
        assert_invalid(parse_hex_id("DA", 16).unwrap_err());
    }

    #[test]
    fn attribute_tables() {
        for tag in 1..=16 {
            let attribute = StandardAttribute::from_tag(tag).unwrap();
            assert_eq!(attribute.tag(), tag);
            assert_eq!(StandardAttribute::from_oid(attribute.oid()), Some(attribute));
        }
        assert_eq!(StandardAttribute::from_tag(0), None);
        assert_eq!(StandardAttribute::from_tag(17), None);
        assert_eq!(ExtendedKeyUsage::from_id(2), Some(ExtendedKeyUsage::ClientAuth));
        assert_eq!(ExtendedKeyUsage::from_id(7), None);
        assert_eq!(
            CertificateKind::ProductAttestationAuthority.to_string(),
            "product attestation authority"
        );
    }
}
