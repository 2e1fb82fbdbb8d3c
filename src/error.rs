//! Error kinds reported by the codecs and the certificate manager.
//!
//! Public functions return [anyhow::Result]. The root cause is always one of the
//! enums below, so callers can inspect it with `err.downcast_ref::<TlvError>()`.

use thiserror::Error;

use crate::{cert_matter::CertificateKind, tlv::TlvType};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BinaryError {
    #[error("unexpected end of data: need {needed} bytes, {remaining} remaining")]
    UnexpectedEnd { needed: usize, remaining: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TlvError {
    #[error("unknown TLV element type 0x{0:02x}")]
    UnknownType(u8),

    #[error("unsupported implicit profile tag control {0}")]
    UnsupportedTagControl(u8),

    #[error("unexpected TLV type {0:?}")]
    UnexpectedType(TlvType),

    #[error("invalid TLV tag: id should be defined for a {0} tag")]
    MissingTagId(&'static str),

    #[error("invalid TLV tag: context specific id {0} does not fit in 8 bits")]
    ContextTagOutOfRange(u32),

    #[error("value {value} does not fit TLV type {element_type:?}")]
    IntegerOutOfRange { element_type: TlvType, value: u64 },

    #[error("end of container without open container")]
    UnexpectedEndOfContainer,

    #[error("end of data with {0} unterminated container(s)")]
    UnterminatedContainer(usize),

    #[error("container nesting exceeds maximum depth {0}")]
    MaxDepthExceeded(usize),

    #[error("invalid utf-8 in TLV string")]
    InvalidUtf8,

    #[error("expected exactly one top-level element, found {0}")]
    TopLevelCount(usize),

    #[error("{field}: {reason}")]
    Schema { field: String, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DerError {
    #[error("unsupported DER tag 0x{0:02x}")]
    UnsupportedTag(u8),

    #[error("invalid DER length encoding")]
    InvalidLength,

    #[error("DER nesting exceeds maximum depth {0}")]
    MaxDepthExceeded(usize),

    #[error("invalid object identifier {0}")]
    InvalidOid(String),

    #[error("{0} trailing bytes after DER element")]
    TrailingData(usize),

    #[error("malformed DER element: {0}")]
    Malformed(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CertificateError {
    #[error("invalid CSR data")]
    InvalidCsr,

    #[error("unsupported request version {0}")]
    UnsupportedRequestVersion(u8),

    #[error("unsupported signature type")]
    UnsupportedSignatureType,

    #[error("signature verification failed")]
    SignatureVerificationFailed,

    #[error("{kind} certificate is missing mandatory field {field}")]
    MissingField {
        kind: CertificateKind,
        field: String,
    },

    #[error("{kind} certificate must not contain field {field}")]
    UnexpectedField {
        kind: CertificateKind,
        field: String,
    },

    #[error("invalid case authenticated tags: {0}")]
    InvalidCaseAuthenticatedTags(String),

    #[error("date {0} can not be represented as matter epoch time")]
    InvalidDate(String),

    #[error("certificate chain mismatch: {0}")]
    ChainMismatch(&'static str),

    #[error("invalid certificate: {0}")]
    Invalid(String),

    #[error("invalid certification declaration: {0}")]
    InvalidCertificationDeclaration(String),
}
