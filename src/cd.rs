//! Certification Declaration.
//!
//! The declaration is a TLV structure carried as the encapsulated content of a
//! CMS SignedData message:
//!
//! ```text
//! ContentInfo { pkcs7-signedData, [0] SignedData {
//!     version 3,
//!     digestAlgorithms SET { sha256 },
//!     encapContentInfo { pkcs7-data, [0] OCTET STRING <tlv> },
//!     signerInfos SET { { version 3, [0] subjectKeyIdentifier,
//!                         sha256, ecdsa-with-SHA256, OCTET STRING <der signature> } } } }
//! ```

use anyhow::Result;

use crate::{
    config::CodecConfig,
    der::{self, DerNode, DerObject},
    error::{DerError, TlvError},
    tlv::{self, TlvBuffer, TlvItem, TlvItemValue},
    tlv_schema::{self, optional, required, FieldType, U16, U32, U8},
    util::cryptoutil,
};

pub const MAX_PRODUCT_IDS: usize = 100;
pub const CERTIFICATE_ID_LEN: usize = 19;
pub const MAX_AUTHORIZED_PAA_LIST: usize = 10;
pub const PAA_KEY_ID_LEN: usize = 20;

const CMS_VERSION: u64 = 3;

const TAG_FORMAT_VERSION: u8 = 0;
const TAG_VENDOR_ID: u8 = 1;
const TAG_PRODUCT_ID_ARRAY: u8 = 2;
const TAG_DEVICE_TYPE_ID: u8 = 3;
const TAG_CERTIFICATE_ID: u8 = 4;
const TAG_SECURITY_LEVEL: u8 = 5;
const TAG_SECURITY_INFORMATION: u8 = 6;
const TAG_VERSION_NUMBER: u8 = 7;
const TAG_CERTIFICATION_TYPE: u8 = 8;
const TAG_DAC_ORIGIN_VENDOR_ID: u8 = 9;
const TAG_DAC_ORIGIN_PRODUCT_ID: u8 = 10;
const TAG_AUTHORIZED_PAA_LIST: u8 = 11;

const PAA_KEY_ID: FieldType = FieldType::Bytes {
    min: PAA_KEY_ID_LEN,
    max: PAA_KEY_ID_LEN,
};

pub const CERTIFICATION_DECLARATION_SCHEMA: FieldType = FieldType::Struct(&[
    required(TAG_FORMAT_VERSION, "formatVersion", U16),
    required(TAG_VENDOR_ID, "vendorId", U16),
    required(
        TAG_PRODUCT_ID_ARRAY,
        "productIdArray",
        FieldType::Array {
            element: &U16,
            min: 1,
            max: MAX_PRODUCT_IDS,
        },
    ),
    required(TAG_DEVICE_TYPE_ID, "deviceTypeId", U32),
    required(
        TAG_CERTIFICATE_ID,
        "certificateId",
        FieldType::Utf8 {
            min: CERTIFICATE_ID_LEN,
            max: CERTIFICATE_ID_LEN,
        },
    ),
    required(TAG_SECURITY_LEVEL, "securityLevel", U8),
    required(TAG_SECURITY_INFORMATION, "securityInformation", U16),
    required(TAG_VERSION_NUMBER, "versionNumber", U16),
    required(
        TAG_CERTIFICATION_TYPE,
        "certificationType",
        FieldType::UInt { max: 2 },
    ),
    optional(TAG_DAC_ORIGIN_VENDOR_ID, "dacOriginVendorId", U16),
    optional(TAG_DAC_ORIGIN_PRODUCT_ID, "dacOriginProductId", U16),
    optional(
        TAG_AUTHORIZED_PAA_LIST,
        "authorizedPaaList",
        FieldType::Array {
            element: &PAA_KEY_ID,
            min: 1,
            max: MAX_AUTHORIZED_PAA_LIST,
        },
    ),
]);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CertificationType {
    DevelopmentAndTest = 0,
    Provisional = 1,
    Official = 2,
}

impl TryFrom<u8> for CertificationType {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Self::DevelopmentAndTest),
            1 => Ok(Self::Provisional),
            2 => Ok(Self::Official),
            _ => Err(TlvError::Schema {
                field: "certificationDeclaration.certificationType".to_owned(),
                reason: format!("unknown certification type {}", value),
            }
            .into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DacOrigin {
    pub vendor_id: u16,
    pub product_id: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificationDeclaration {
    pub format_version: u16,
    pub vendor_id: u16,
    pub product_ids: Vec<u16>,
    pub device_type_id: u32,
    pub certificate_id: String,
    pub security_level: u8,
    pub security_information: u16,
    pub version_number: u16,
    pub certification_type: CertificationType,
    pub dac_origin: Option<DacOrigin>,
    pub authorized_paa_list: Option<Vec<Vec<u8>>>,
}

impl CertificationDeclaration {
    pub fn decode_tlv(data: &[u8]) -> Result<Self> {
        Self::decode_tlv_with_config(data, &CodecConfig::default())
    }

    pub fn decode_tlv_with_config(data: &[u8], config: &CodecConfig) -> Result<Self> {
        let item = tlv::decode_tlv_with_config(data, config)?;
        Self::from_tlv_item(&item)
    }

    pub fn from_tlv_item(item: &TlvItem) -> Result<Self> {
        tlv_schema::validate(item, &CERTIFICATION_DECLARATION_SCHEMA, "certificationDeclaration")?;
        let field = |tag: u8, name: &str| -> Result<u64> {
            item.get_int(&[tag]).ok_or_else(|| {
                TlvError::Schema {
                    field: format!("certificationDeclaration.{}", name),
                    reason: "missing".to_owned(),
                }
                .into()
            })
        };

        let dac_origin = match (
            item.get_u16(&[TAG_DAC_ORIGIN_VENDOR_ID]),
            item.get_u16(&[TAG_DAC_ORIGIN_PRODUCT_ID]),
        ) {
            (Some(vendor_id), Some(product_id)) => Some(DacOrigin {
                vendor_id,
                product_id,
            }),
            (None, None) => None,
            _ => {
                return Err(TlvError::Schema {
                    field: "certificationDeclaration.dacOrigin".to_owned(),
                    reason: "vendor id and product id must be present together".to_owned(),
                }
                .into())
            }
        };

        let array = |tag: u8| -> Vec<&TlvItem> {
            match item.get(&[tag]) {
                Some(TlvItemValue::Array(items)) => items.iter().collect(),
                _ => Vec::new(),
            }
        };
        let product_ids = array(TAG_PRODUCT_ID_ARRAY)
            .into_iter()
            .filter_map(|i| i.get_u16(&[]))
            .collect();
        let authorized_paa_list = item.get(&[TAG_AUTHORIZED_PAA_LIST]).map(|_| {
            array(TAG_AUTHORIZED_PAA_LIST)
                .into_iter()
                .filter_map(|i| i.get_octet_string_owned(&[]))
                .collect()
        });

        // ranges below are already enforced by the schema
        Ok(Self {
            format_version: field(TAG_FORMAT_VERSION, "formatVersion")? as u16,
            vendor_id: field(TAG_VENDOR_ID, "vendorId")? as u16,
            product_ids,
            device_type_id: field(TAG_DEVICE_TYPE_ID, "deviceTypeId")? as u32,
            certificate_id: item
                .get_string_owned(&[TAG_CERTIFICATE_ID])
                .unwrap_or_default(),
            security_level: field(TAG_SECURITY_LEVEL, "securityLevel")? as u8,
            security_information: field(TAG_SECURITY_INFORMATION, "securityInformation")? as u16,
            version_number: field(TAG_VERSION_NUMBER, "versionNumber")? as u16,
            certification_type: CertificationType::try_from(
                field(TAG_CERTIFICATION_TYPE, "certificationType")? as u8,
            )?,
            dac_origin,
            authorized_paa_list,
        })
    }

    pub fn encode_tlv(&self) -> Result<Vec<u8>> {
        let mut tlv = TlvBuffer::new();
        tlv.write_anon_struct()?;
        tlv.write_uint(TAG_FORMAT_VERSION, self.format_version as u64)?;
        tlv.write_uint(TAG_VENDOR_ID, self.vendor_id as u64)?;
        tlv.write_array(TAG_PRODUCT_ID_ARRAY)?;
        for product_id in &self.product_ids {
            tlv.write_uint_notag(*product_id as u64)?;
        }
        tlv.write_struct_end()?;
        tlv.write_uint(TAG_DEVICE_TYPE_ID, self.device_type_id as u64)?;
        tlv.write_string(TAG_CERTIFICATE_ID, &self.certificate_id)?;
        tlv.write_uint(TAG_SECURITY_LEVEL, self.security_level as u64)?;
        tlv.write_uint(TAG_SECURITY_INFORMATION, self.security_information as u64)?;
        tlv.write_uint(TAG_VERSION_NUMBER, self.version_number as u64)?;
        tlv.write_uint(TAG_CERTIFICATION_TYPE, self.certification_type as u64)?;
        if let Some(origin) = &self.dac_origin {
            tlv.write_uint(TAG_DAC_ORIGIN_VENDOR_ID, origin.vendor_id as u64)?;
            tlv.write_uint(TAG_DAC_ORIGIN_PRODUCT_ID, origin.product_id as u64)?;
        }
        if let Some(list) = &self.authorized_paa_list {
            tlv.write_array(TAG_AUTHORIZED_PAA_LIST)?;
            for key_id in list {
                tlv.write_octetstring_notag(key_id)?;
            }
            tlv.write_struct_end()?;
        }
        tlv.write_struct_end()?;
        let out = tlv.into_vec();
        // reject what decode would reject
        Self::decode_tlv(&out)?;
        Ok(out)
    }
}

/// Pieces of CMS SignedData message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedContent {
    pub content: Vec<u8>,
    pub signer_key_id: Vec<u8>,
    /// DER encoded ECDSA signature.
    pub signature: Vec<u8>,
}

/// Build CMS SignedData over `content` signed by `key`.
pub fn sign_content(content: &[u8], subject_key_id: &[u8], key: &p256::SecretKey) -> Result<Vec<u8>> {
    let signature = cryptoutil::sign_der(key, content)?;
    let signer_info = DerObject::Sequence(vec![
        DerObject::uint(CMS_VERSION),
        DerObject::ContextTaggedBytes(0, subject_key_id.to_vec()),
        der::sha256_cms()?,
        der::ecdsa_with_sha256()?,
        DerObject::OctetString(signature),
    ]);
    let signed_data = DerObject::Sequence(vec![
        DerObject::uint(CMS_VERSION),
        DerObject::Set(vec![der::sha256_cms()?]),
        der::pkcs7_data(content)?,
        DerObject::Set(vec![signer_info]),
    ]);
    Ok(der::pkcs7_signed_data(signed_data)?.encode())
}

fn malformed(what: &str) -> anyhow::Error {
    DerError::Malformed(format!("signed data: {}", what)).into()
}

fn child<'a>(node: &'a DerNode, index: usize, tag: u8, what: &str) -> Result<&'a DerNode> {
    match node.element(index) {
        Some(n) if n.tag == tag => Ok(n),
        _ => Err(malformed(what)),
    }
}

fn expect_oid(node: &DerNode, oid: &str, what: &str) -> Result<()> {
    if node.oid()? != der::parse_oid(oid)? {
        return Err(malformed(what));
    }
    Ok(())
}

fn expect_version(node: &DerNode) -> Result<()> {
    if node.value != [CMS_VERSION as u8] {
        return Err(malformed("unsupported version"));
    }
    Ok(())
}

/// Split CMS SignedData message. Signature is not checked.
pub fn parse_signed_content(data: &[u8]) -> Result<SignedContent> {
    let root = der::decode(data)?;
    if root.tag != der::TAG_SEQUENCE {
        return Err(malformed("content info"));
    }
    expect_oid(
        child(&root, 0, der::TAG_OID, "content type")?,
        der::OID_PKCS7_SIGNED_DATA,
        "content type is not signedData",
    )?;
    let wrapper = child(&root, 1, 0xa0, "signed data wrapper")?;
    let signed_data = child(wrapper, 0, der::TAG_SEQUENCE, "signed data")?;
    expect_version(child(signed_data, 0, der::TAG_INTEGER, "version")?)?;

    let digests = child(signed_data, 1, der::TAG_SET, "digest algorithms")?;
    let digest = child(digests, 0, der::TAG_SEQUENCE, "digest algorithm")?;
    expect_oid(
        child(digest, 0, der::TAG_OID, "digest algorithm")?,
        der::OID_SHA256,
        "digest algorithm is not sha256",
    )?;

    let encap = child(signed_data, 2, der::TAG_SEQUENCE, "encapsulated content")?;
    expect_oid(
        child(encap, 0, der::TAG_OID, "encapsulated content type")?,
        der::OID_PKCS7_DATA,
        "encapsulated content is not data",
    )?;
    let content = child(
        child(encap, 1, 0xa0, "encapsulated content wrapper")?,
        0,
        der::TAG_OCTET_STRING,
        "encapsulated content",
    )?;

    let signers = child(signed_data, 3, der::TAG_SET, "signer infos")?;
    let signer = child(signers, 0, der::TAG_SEQUENCE, "signer info")?;
    expect_version(child(signer, 0, der::TAG_INTEGER, "signer version")?)?;
    let key_id = child(signer, 1, 0x80, "signer key identifier")?;
    expect_oid(
        child(child(signer, 2, der::TAG_SEQUENCE, "signer digest")?, 0, der::TAG_OID, "signer digest")?,
        der::OID_SHA256,
        "signer digest is not sha256",
    )?;
    expect_oid(
        child(child(signer, 3, der::TAG_SEQUENCE, "signature algorithm")?, 0, der::TAG_OID, "signature algorithm")?,
        der::OID_SIG_ECDSA_WITH_SHA256,
        "signature algorithm is not ecdsa-with-SHA256",
    )?;
    let signature = child(signer, 4, der::TAG_OCTET_STRING, "signature")?;

    Ok(SignedContent {
        content: content.value.clone(),
        signer_key_id: key_id.value.clone(),
        signature: signature.value.clone(),
    })
}

/// Check signature of CMS message with `public_key` and decode the declaration.
pub fn verify_certification_declaration(
    data: &[u8],
    public_key: &[u8],
) -> Result<CertificationDeclaration> {
    let signed = parse_signed_content(data)?;
    if let Err(e) = cryptoutil::verify_der(public_key, &signed.content, &signed.signature) {
        log::debug!(
            "certification declaration signed by {} failed verification",
            hex::encode(&signed.signer_key_id)
        );
        return Err(e);
    }
    CertificationDeclaration::decode_tlv(&signed.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CertificateError;

    const CD_CONTENT_01: &str = "152400012501f1ff360205008018250334122c04135a494732303134315a423333303030312d32342405002406002507942624080018";
    const CD_CONTENT_02: &str = "152400012501f2ff360205018005028018250334122c04135a494732303134325a423333303030322d3234240500240600250794262408002509f1ff250a008018";
    const CMS_SIGNED_01: &str = "3081e806092a864886f70d010702a081da3081d7020103310d300b0609608648016503040201304506092a864886f70d010701a0380436152400012501f1ff360205008018250334122c04135a494732303134315a423333303030312d32342405002406002507942624080018317c307a020103801462fa823359acfaa9963e1cfa140addf504f37160300b0609608648016503040201300a06082a8648ce3d04030204463044022043a63f2b943df33c38b3e02fcaa75fe3532aebbf5e63f5bbdbc0b1f01d3c4f6002204c1abf5f1807b81894b1576c47e4724e4d966c612ed3fa25c118c3f2b3f90369";
    const TEST_CD_KEY_ID: &str = "62fa823359acfaa9963e1cfa140addf504f37160";

    fn unhex(data: &str) -> Vec<u8> {
        hex::decode(data).unwrap()
    }

    fn example() -> CertificationDeclaration {
        CertificationDeclaration {
            format_version: 1,
            vendor_id: 0xfff1,
            product_ids: vec![0x8000],
            device_type_id: 0x1234,
            certificate_id: "ZIG20141ZB330001-24".to_owned(),
            security_level: 0,
            security_information: 0,
            version_number: 0x2694,
            certification_type: CertificationType::DevelopmentAndTest,
            dac_origin: None,
            authorized_paa_list: None,
        }
    }

    #[test]
    fn decode_declarations() -> Result<()> {
        let cd = CertificationDeclaration::decode_tlv(&unhex(CD_CONTENT_01))?;
        assert_eq!(cd, example());
        assert_eq!(hex::encode(cd.encode_tlv()?), CD_CONTENT_01);

        let cd = CertificationDeclaration::decode_tlv(&unhex(CD_CONTENT_02))?;
        assert_eq!(cd.vendor_id, 0xfff2);
        assert_eq!(cd.product_ids, vec![0x8001, 0x8002]);
        assert_eq!(cd.certificate_id, "ZIG20142ZB330002-24");
        assert_eq!(
            cd.dac_origin,
            Some(DacOrigin {
                vendor_id: 0xfff1,
                product_id: 0x8000
            })
        );
        assert_eq!(cd.encode_tlv()?, unhex(CD_CONTENT_02));
        Ok(())
    }

    #[test]
    fn paa_list() -> Result<()> {
        let mut cd = example();
        cd.authorized_paa_list = Some(vec![vec![0x11; PAA_KEY_ID_LEN], vec![0x22; PAA_KEY_ID_LEN]]);
        let decoded = CertificationDeclaration::decode_tlv(&cd.encode_tlv()?)?;
        assert_eq!(decoded, cd);

        cd.authorized_paa_list = Some(vec![vec![0x11; 19]]);
        assert!(cd.encode_tlv().is_err());
        Ok(())
    }

    #[test]
    fn invalid_declarations() {
        let mut cd = example();
        cd.certificate_id = "short".to_owned();
        assert!(cd.encode_tlv().is_err());

        let mut cd = example();
        cd.product_ids.clear();
        assert!(cd.encode_tlv().is_err());

        // dac origin vendor id without product id
        let mut data = unhex(CD_CONTENT_01);
        data.pop();
        data.extend_from_slice(&[0x25, 0x09, 0xf1, 0xff, 0x18]);
        let err = CertificationDeclaration::decode_tlv(&data).unwrap_err();
        assert!(err.to_string().contains("dacOrigin"));

        // certification type 3
        let mut data = unhex(CD_CONTENT_01);
        let len = data.len();
        data[len - 2] = 3;
        assert!(CertificationDeclaration::decode_tlv(&data).is_err());
    }

    #[test]
    fn parse_cms() -> Result<()> {
        let signed = parse_signed_content(&unhex(CMS_SIGNED_01))?;
        assert_eq!(signed.content, unhex(CD_CONTENT_01));
        assert_eq!(hex::encode(&signed.signer_key_id), TEST_CD_KEY_ID);
        assert_eq!(cryptoutil::der_signature_to_raw(&signed.signature)?.len(), 64);

        assert!(parse_signed_content(&[]).is_err());
        assert!(parse_signed_content(&[0x01, 0x02, 0x03]).is_err());
        assert!(parse_signed_content(&[0x30, 0x04, 0x06, 0x02, 0x55, 0x04]).is_err());
        Ok(())
    }

    #[test]
    fn sign_and_verify() -> Result<()> {
        let key = p256::SecretKey::random(&mut rand::thread_rng());
        let public_key = cryptoutil::public_key_bytes(&key);
        let content = unhex(CD_CONTENT_01);
        let key_id = unhex(TEST_CD_KEY_ID);
        let cms = sign_content(&content, &key_id, &key)?;

        // same layout as the reference message between the outer headers and the signer infos
        let reference = unhex(CMS_SIGNED_01);
        let signer_infos = reference.len() - 0x7c - 2;
        assert_eq!(&cms[20..signer_infos], &reference[20..signer_infos]);
        let signed = parse_signed_content(&cms)?;
        assert_eq!(signed.content, content);
        assert_eq!(signed.signer_key_id, key_id);

        assert_eq!(verify_certification_declaration(&cms, &public_key)?, example());

        let other = p256::SecretKey::random(&mut rand::thread_rng());
        let err = verify_certification_declaration(&cms, &cryptoutil::public_key_bytes(&other))
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<CertificateError>(),
            Some(&CertificateError::SignatureVerificationFailed)
        );
        Ok(())
    }
}
