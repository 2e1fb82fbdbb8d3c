//! Declarative ASN.1 DER objects and decoder.
//!
//! [DerObject] describes a value, [DerObject::encode] renders it using the
//! length fixing [asn1::Encoder]. [decode] parses DER into a [DerNode] tree.
//! The remaining functions are X.509 and CMS building blocks used by the
//! certificate encoders.

use anyhow::Result;
use const_oid::ObjectIdentifier;
use x509_cert::der::DateTime;

use crate::{
    config::CodecConfig,
    error::DerError,
    util::{asn1, binary::DataReader},
};

pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_BIT_STRING: u8 = 0x03;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_NULL: u8 = 0x05;
pub const TAG_OID: u8 = 0x06;
pub const TAG_UTF8_STRING: u8 = 0x0c;
pub const TAG_PRINTABLE_STRING: u8 = 0x13;
pub const TAG_IA5_STRING: u8 = 0x16;
pub const TAG_UTC_TIME: u8 = 0x17;
pub const TAG_GENERALIZED_TIME: u8 = 0x18;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_SET: u8 = 0x31;
const TAG_CONTEXT_CONSTRUCTED: u8 = 0xa0;
const TAG_CONTEXT_PRIMITIVE: u8 = 0x80;
const TAG_CONSTRUCTED_BIT: u8 = 0x20;

pub const OID_SIG_ECDSA_WITH_SHA256: &str = "1.2.840.10045.4.3.2";
pub const OID_EC_PUBLIC_KEY: &str = "1.2.840.10045.2.1";
pub const OID_EC_PRIME256V1: &str = "1.2.840.10045.3.1.7";
pub const OID_SHA256: &str = "2.16.840.1.101.3.4.2.1";
pub const OID_PKCS7_DATA: &str = "1.2.840.113549.1.7.1";
pub const OID_PKCS7_SIGNED_DATA: &str = "1.2.840.113549.1.7.2";

pub const OID_CE_SUBJECT_KEY_IDENTIFIER: &str = "2.5.29.14";
pub const OID_CE_KEY_USAGE: &str = "2.5.29.15";
pub const OID_CE_BASIC_CONSTRAINTS: &str = "2.5.29.19";
pub const OID_CE_EXT_KEY_USAGE: &str = "2.5.29.37";
pub const OID_CE_AUTHORITY_KEY_IDENTIFIER: &str = "2.5.29.35";

pub const OID_KP_SERVER_AUTH: &str = "1.3.6.1.5.5.7.3.1";
pub const OID_KP_CLIENT_AUTH: &str = "1.3.6.1.5.5.7.3.2";
pub const OID_KP_CODE_SIGNING: &str = "1.3.6.1.5.5.7.3.3";
pub const OID_KP_EMAIL_PROTECTION: &str = "1.3.6.1.5.5.7.3.4";
pub const OID_KP_TIME_STAMPING: &str = "1.3.6.1.5.5.7.3.8";
pub const OID_KP_OCSP_SIGNING: &str = "1.3.6.1.5.5.7.3.9";

pub const OID_AT_COMMON_NAME: &str = "2.5.4.3";
pub const OID_AT_ORGANIZATION_NAME: &str = "2.5.4.10";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerObject {
    Boolean(bool),
    /// Content bytes of INTEGER, big-endian two's complement.
    Integer(Vec<u8>),
    BitString {
        unused_bits: u8,
        data: Vec<u8>,
    },
    OctetString(Vec<u8>),
    Null,
    ObjectId(ObjectIdentifier),
    Utf8String(String),
    PrintableString(String),
    Ia5String(String),
    Time(DateTime),
    Sequence(Vec<DerObject>),
    Set(Vec<DerObject>),
    /// Constructed `[n]`, empty when the value is absent.
    ContextTagged(u8, Option<Box<DerObject>>),
    /// Primitive implicit `[n]`.
    ContextTaggedBytes(u8, Vec<u8>),
    /// Already encoded DER inserted as is.
    Raw(Vec<u8>),
}

impl DerObject {
    pub fn uint(val: u64) -> Self {
        DerObject::Integer(asn1::uint_content(val))
    }

    /// INTEGER from unsigned big-endian bytes of any length (serial numbers).
    pub fn uint_bytes(val: &[u8]) -> Self {
        let skip = val
            .iter()
            .take_while(|b| **b == 0)
            .count()
            .min(val.len().saturating_sub(1));
        let val = &val[skip..];
        let mut out = Vec::with_capacity(val.len() + 1);
        if val.is_empty() || val[0] & 0x80 != 0 {
            out.push(0);
        }
        out.extend_from_slice(val);
        DerObject::Integer(out)
    }

    pub fn bit_string(data: &[u8]) -> Self {
        DerObject::BitString {
            unused_bits: 0,
            data: data.to_vec(),
        }
    }

    pub fn oid(dotted: &str) -> Result<Self> {
        Ok(DerObject::ObjectId(parse_oid(dotted)?))
    }

    /// OID from hex of its encoded content, e.g. `2b0601040182a27c0101`.
    pub fn oid_from_hex(raw: &str) -> Result<Self> {
        let bytes = hex::decode(raw).map_err(|_| DerError::InvalidOid(raw.to_owned()))?;
        let oid = ObjectIdentifier::from_bytes(&bytes)
            .map_err(|_| DerError::InvalidOid(raw.to_owned()))?;
        Ok(DerObject::ObjectId(oid))
    }

    pub fn tagged(tag: u8, value: DerObject) -> Self {
        DerObject::ContextTagged(tag, Some(Box::new(value)))
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = asn1::Encoder::new();
        self.write(&mut encoder);
        encoder.encode()
    }

    fn write(&self, encoder: &mut asn1::Encoder) {
        match self {
            DerObject::Boolean(v) => encoder.write_bool(*v),
            DerObject::Integer(v) => encoder.write_tlv(TAG_INTEGER, v),
            DerObject::BitString { unused_bits, data } => {
                let mut content = Vec::with_capacity(data.len() + 1);
                content.push(*unused_bits);
                content.extend_from_slice(data);
                encoder.write_tlv(TAG_BIT_STRING, &content)
            }
            DerObject::OctetString(v) => encoder.write_octet_string(v),
            DerObject::Null => encoder.write_tlv(TAG_NULL, &[]),
            DerObject::ObjectId(oid) => encoder.write_tlv(TAG_OID, oid.as_bytes()),
            DerObject::Utf8String(s) => encoder.write_string_with_tag(TAG_UTF8_STRING, s),
            DerObject::PrintableString(s) => {
                encoder.write_string_with_tag(TAG_PRINTABLE_STRING, s)
            }
            DerObject::Ia5String(s) => encoder.write_string_with_tag(TAG_IA5_STRING, s),
            DerObject::Time(t) => {
                let (tag, s) = encode_time(t);
                encoder.write_string_with_tag(tag, &s)
            }
            DerObject::Sequence(items) | DerObject::Set(items) => {
                let tag = if matches!(self, DerObject::Sequence(_)) {
                    TAG_SEQUENCE
                } else {
                    TAG_SET
                };
                encoder.start_seq(tag);
                for item in items {
                    item.write(encoder);
                }
                encoder.end_seq();
            }
            DerObject::ContextTagged(n, value) => {
                encoder.start_seq(TAG_CONTEXT_CONSTRUCTED | n);
                if let Some(value) = value {
                    value.write(encoder);
                }
                encoder.end_seq();
            }
            DerObject::ContextTaggedBytes(n, v) => encoder.write_tlv(TAG_CONTEXT_PRIMITIVE | n, v),
            DerObject::Raw(v) => encoder.write_raw(v),
        }
    }
}

pub fn parse_oid(dotted: &str) -> Result<ObjectIdentifier> {
    ObjectIdentifier::new(dotted).map_err(|e| DerError::InvalidOid(format!("{} ({})", dotted, e)).into())
}

/// UTCTime for years 1950-2049, GeneralizedTime otherwise.
fn encode_time(t: &DateTime) -> (u8, String) {
    let rest = format!(
        "{:02}{:02}{:02}{:02}{:02}Z",
        t.month(),
        t.day(),
        t.hour(),
        t.minutes(),
        t.seconds()
    );
    if (1950..2050).contains(&t.year()) {
        (TAG_UTC_TIME, format!("{:02}{}", t.year() % 100, rest))
    } else {
        (TAG_GENERALIZED_TIME, format!("{:04}{}", t.year(), rest))
    }
}

/// Decoded DER element. `elements` is filled for constructed tags only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerNode {
    pub tag: u8,
    pub value: Vec<u8>,
    pub elements: Vec<DerNode>,
}

impl DerNode {
    pub fn is_constructed(&self) -> bool {
        self.tag & TAG_CONSTRUCTED_BIT != 0
    }

    pub fn element(&self, index: usize) -> Option<&DerNode> {
        self.elements.get(index)
    }

    /// Exact DER of this node.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.value.len() + 6);
        asn1::write_tlv(&mut out, self.tag, &self.value);
        out
    }

    /// Payload of a BIT STRING without the unused-bits byte.
    pub fn bit_string_bytes(&self) -> Result<&[u8]> {
        if self.tag != TAG_BIT_STRING {
            return Err(DerError::Malformed(format!("expected bit string, found tag 0x{:02x}", self.tag)).into());
        }
        match self.value.split_first() {
            Some((0, rest)) => Ok(rest),
            _ => Err(DerError::Malformed("bit string with unused bits".to_owned()).into()),
        }
    }

    pub fn oid(&self) -> Result<ObjectIdentifier> {
        if self.tag != TAG_OID {
            return Err(DerError::Malformed(format!("expected object identifier, found tag 0x{:02x}", self.tag)).into());
        }
        ObjectIdentifier::from_bytes(&self.value)
            .map_err(|_| DerError::InvalidOid(hex::encode(&self.value)).into())
    }
}

fn decode_node(reader: &mut DataReader, depth: usize, max_depth: usize) -> Result<DerNode> {
    let (tag, value) = asn1::read_element(reader)?;
    let mut elements = Vec::new();
    if tag & TAG_CONSTRUCTED_BIT != 0 {
        if depth >= max_depth {
            return Err(DerError::MaxDepthExceeded(max_depth).into());
        }
        let mut inner = DataReader::new(value);
        while !inner.is_empty() {
            elements.push(decode_node(&mut inner, depth + 1, max_depth)?);
        }
    }
    Ok(DerNode {
        tag,
        value: value.to_vec(),
        elements,
    })
}

pub fn decode_with_config(data: &[u8], config: &CodecConfig) -> Result<DerNode> {
    let mut reader = DataReader::new(data);
    let node = decode_node(&mut reader, 0, config.max_der_depth)?;
    if !reader.is_empty() {
        return Err(DerError::TrailingData(reader.remaining()).into());
    }
    Ok(node)
}

/// Decode single DER element which must span the whole buffer.
pub fn decode(data: &[u8]) -> Result<DerNode> {
    decode_with_config(data, &CodecConfig::default())
}

pub fn ecdsa_with_sha256() -> Result<DerObject> {
    Ok(DerObject::Sequence(vec![DerObject::oid(OID_SIG_ECDSA_WITH_SHA256)?]))
}

pub fn sha256_cms() -> Result<DerObject> {
    Ok(DerObject::Sequence(vec![DerObject::oid(OID_SHA256)?]))
}

/// SubjectPublicKeyInfo of uncompressed P-256 point.
pub fn ec_public_key(public_key: &[u8]) -> Result<DerObject> {
    Ok(DerObject::Sequence(vec![
        DerObject::Sequence(vec![
            DerObject::oid(OID_EC_PUBLIC_KEY)?,
            DerObject::oid(OID_EC_PRIME256V1)?,
        ]),
        DerObject::bit_string(public_key),
    ]))
}

pub fn extension(oid: &str, critical: bool, value: DerObject) -> Result<DerObject> {
    let mut items = vec![DerObject::oid(oid)?];
    if critical {
        items.push(DerObject::Boolean(true));
    }
    items.push(DerObject::OctetString(value.encode()));
    Ok(DerObject::Sequence(items))
}

pub fn basic_constraints(is_ca: bool, path_len: Option<u8>) -> Result<DerObject> {
    let mut items = Vec::new();
    if is_ca {
        items.push(DerObject::Boolean(true));
    }
    if let Some(path_len) = path_len {
        items.push(DerObject::uint(path_len as u64));
    }
    extension(OID_CE_BASIC_CONSTRAINTS, true, DerObject::Sequence(items))
}

/// KeyUsage BIT STRING in minimal form. Bit n of `bits` is X.509 bit n.
pub fn key_usage(bits: u16) -> Result<DerObject> {
    let value = if bits == 0 {
        DerObject::BitString {
            unused_bits: 0,
            data: Vec::new(),
        }
    } else {
        let highest = 15 - bits.leading_zeros() as usize;
        let mut data = vec![0u8; highest / 8 + 1];
        for n in 0..=highest {
            if bits & (1 << n) != 0 {
                data[n / 8] |= 0x80 >> (n % 8);
            }
        }
        DerObject::BitString {
            unused_bits: (7 - highest % 8) as u8,
            data,
        }
    };
    extension(OID_CE_KEY_USAGE, true, value)
}

pub fn extended_key_usage(oids: &[&str]) -> Result<DerObject> {
    let oids = oids
        .iter()
        .map(|o| DerObject::oid(o))
        .collect::<Result<Vec<_>>>()?;
    extension(OID_CE_EXT_KEY_USAGE, true, DerObject::Sequence(oids))
}

pub fn subject_key_identifier(id: &[u8]) -> Result<DerObject> {
    extension(
        OID_CE_SUBJECT_KEY_IDENTIFIER,
        false,
        DerObject::OctetString(id.to_vec()),
    )
}

pub fn authority_key_identifier(id: &[u8]) -> Result<DerObject> {
    extension(
        OID_CE_AUTHORITY_KEY_IDENTIFIER,
        false,
        DerObject::Sequence(vec![DerObject::ContextTaggedBytes(0, id.to_vec())]),
    )
}

/// Single valued RDN: SET { SEQUENCE { oid, value } }.
pub fn rdn(oid: DerObject, value: DerObject) -> DerObject {
    DerObject::Set(vec![DerObject::Sequence(vec![oid, value])])
}

pub fn common_name(name: &str) -> Result<DerObject> {
    Ok(rdn(
        DerObject::oid(OID_AT_COMMON_NAME)?,
        DerObject::Utf8String(name.to_owned()),
    ))
}

pub fn organisation_name(name: &str) -> Result<DerObject> {
    Ok(rdn(
        DerObject::oid(OID_AT_ORGANIZATION_NAME)?,
        DerObject::Utf8String(name.to_owned()),
    ))
}

/// ContentInfo of type pkcs7-data.
pub fn pkcs7_data(content: &[u8]) -> Result<DerObject> {
    Ok(DerObject::Sequence(vec![
        DerObject::oid(OID_PKCS7_DATA)?,
        DerObject::tagged(0, DerObject::OctetString(content.to_vec())),
    ]))
}

/// ContentInfo of type pkcs7-signedData wrapping `signed_data`.
pub fn pkcs7_signed_data(signed_data: DerObject) -> Result<DerObject> {
    Ok(DerObject::Sequence(vec![
        DerObject::oid(OID_PKCS7_SIGNED_DATA)?,
        DerObject::tagged(0, signed_data),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives() -> Result<()> {
        assert_eq!(DerObject::Boolean(true).encode(), vec![0x01, 0x01, 0xff]);
        assert_eq!(DerObject::Null.encode(), vec![0x05, 0x00]);
        assert_eq!(DerObject::uint(2).encode(), vec![0x02, 0x01, 0x02]);
        assert_eq!(DerObject::uint_bytes(&[0]).encode(), vec![0x02, 0x01, 0x00]);
        assert_eq!(
            hex::encode(DerObject::uint_bytes(&hex::decode("59eaa632947f541c")?).encode()),
            "020859eaa632947f541c"
        );
        assert_eq!(
            DerObject::uint_bytes(&[0, 0, 0x8f]).encode(),
            vec![0x02, 0x02, 0x00, 0x8f]
        );
        assert_eq!(
            DerObject::ContextTagged(0, None).encode(),
            vec![0xa0, 0x00]
        );
        assert_eq!(
            DerObject::tagged(0, DerObject::uint(2)).encode(),
            vec![0xa0, 0x03, 0x02, 0x01, 0x02]
        );
        assert_eq!(
            DerObject::ContextTaggedBytes(0, vec![1, 2]).encode(),
            vec![0x80, 0x02, 1, 2]
        );
        Ok(())
    }

    #[test]
    fn oids() -> Result<()> {
        assert_eq!(
            hex::encode(DerObject::oid("1.3.6.1.4.1.37244.1.4")?.encode()),
            "060a2b0601040182a27c0104"
        );
        assert_eq!(
            DerObject::oid_from_hex("2b0601040182a27c0104")?,
            DerObject::oid("1.3.6.1.4.1.37244.1.4")?
        );
        assert!(DerObject::oid("1").is_err());
        assert!(DerObject::oid_from_hex("zz").is_err());
        Ok(())
    }

    #[test]
    fn times() -> Result<()> {
        let t = DateTime::new(2021, 6, 10, 0, 0, 0)?;
        assert_eq!(
            hex::encode(DerObject::Time(t).encode()),
            "170d3231303631303030303030305a"
        );
        // DateTime starts at 1970, so the 1950 edge is not representable here
        let t = DateTime::new(1970, 1, 1, 0, 0, 0)?;
        assert_eq!(DerObject::Time(t).encode()[0], TAG_UTC_TIME);
        let t = DateTime::new(2049, 12, 31, 23, 59, 59)?;
        assert_eq!(DerObject::Time(t).encode()[0], TAG_UTC_TIME);
        let t = DateTime::new(2050, 1, 1, 0, 0, 0)?;
        assert_eq!(
            hex::encode(DerObject::Time(t).encode()),
            "180f32303530303130313030303030305a"
        );
        assert_eq!(
            hex::encode(DerObject::Time(DateTime::INFINITY).encode()),
            "180f39393939313233313233353935395a"
        );
        let t = DateTime::new(2121, 12, 8, 20, 30, 55)?;
        assert_eq!(
            hex::encode(DerObject::Time(t).encode()),
            "180f32313231313230383230333035355a"
        );
        Ok(())
    }

    #[test]
    fn extensions() -> Result<()> {
        assert_eq!(
            hex::encode(basic_constraints(true, None)?.encode()),
            "300f0603551d130101ff040530030101ff"
        );
        assert_eq!(
            hex::encode(basic_constraints(false, None)?.encode()),
            "300c0603551d130101ff04023000"
        );
        assert_eq!(
            hex::encode(basic_constraints(true, Some(1))?.encode()),
            "30120603551d130101ff040830060101ff020101"
        );
        assert_eq!(
            hex::encode(key_usage(0x60)?.encode()),
            "300e0603551d0f0101ff040403020106"
        );
        assert_eq!(
            hex::encode(key_usage(0x01)?.encode()),
            "300e0603551d0f0101ff040403020780"
        );
        assert_eq!(
            hex::encode(key_usage(0x61)?.encode()),
            "300e0603551d0f0101ff040403020186"
        );
        assert_eq!(
            hex::encode(extended_key_usage(&[OID_KP_CLIENT_AUTH, OID_KP_SERVER_AUTH])?.encode()),
            "30200603551d250101ff0416301406082b0601050507030206082b06010505070301"
        );
        let id = hex::decode("e766069362d7e35b79687161644d222bdde93a68")?;
        assert_eq!(
            hex::encode(subject_key_identifier(&id)?.encode()),
            "301d0603551d0e04160414e766069362d7e35b79687161644d222bdde93a68"
        );
        assert_eq!(
            hex::encode(authority_key_identifier(&id)?.encode()),
            "301f0603551d23041830168014e766069362d7e35b79687161644d222bdde93a68"
        );
        Ok(())
    }

    #[test]
    fn decode_tree() -> Result<()> {
        let obj = DerObject::Sequence(vec![
            DerObject::uint(0),
            DerObject::Sequence(vec![organisation_name("CSR")?]),
            DerObject::bit_string(&[4, 1, 2]),
            DerObject::ContextTagged(0, None),
        ]);
        let data = obj.encode();
        let node = decode(&data)?;
        assert_eq!(node.tag, TAG_SEQUENCE);
        assert_eq!(node.elements.len(), 4);
        assert_eq!(node.elements[0].value, vec![0]);
        assert_eq!(node.elements[2].bit_string_bytes()?, &[4, 1, 2]);
        assert!(node.elements[0].bit_string_bytes().is_err());
        assert_eq!(
            node.elements[1].elements[0].elements[0].elements[0].oid()?,
            parse_oid(OID_AT_ORGANIZATION_NAME)?
        );
        assert_eq!(node.elements[3].encode(), vec![0xa0, 0x00]);
        assert_eq!(node.encode(), data);
        Ok(())
    }

    #[test]
    fn decode_errors() {
        let err = decode(&[0x05, 0x00, 0x00]).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DerError>(),
            Some(&DerError::TrailingData(1))
        );
        assert!(decode(&[0x30, 0x80, 0x00, 0x00]).is_err());
        assert!(decode(&[0x30, 0x05, 0x02, 0x01]).is_err());

        let mut data = Vec::new();
        for _ in 0..40 {
            data = DerObject::Sequence(vec![DerObject::Raw(data)]).encode();
        }
        let err = decode(&data).unwrap_err();
        assert_eq!(
            err.downcast_ref::<DerError>(),
            Some(&DerError::MaxDepthExceeded(crate::config::DEFAULT_MAX_DER_DEPTH))
        );
        let config = CodecConfig {
            max_der_depth: 64,
            ..Default::default()
        };
        assert!(decode_with_config(&data, &config).is_ok());
    }
}
