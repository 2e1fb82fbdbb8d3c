//! Matter certificate toolkit
//!
//! This library implements the data formats used by Matter credentials. It is synchronous and
//! works on in-memory buffers only.
//! Following are main parts of api:
//! - [tlv](tlv) - Matter TLV reader/writer with typed element tree. [tlv_schema] validates decoded
//!                trees against declarative field tables.
//! - [der](der) - DER/ASN.1 encoder ([DerObject](der::DerObject)) and decoder ([DerNode](der::DerNode)).
//! - [MatterCertificate](cert_matter::MatterCertificate) - typed matter certificate decoded from TLV
//!                       or imported from X.509. [cert_x509] renders it back as X.509 DER.
//! - [certmanager](certmanager) - to-be-signed DER of operational certificates, signing of attestation
//!                certificates, chain validation, certificate signing requests.
//! - [cd](cd) - Certification Declaration TLV and its CMS envelope.
//! - [config](config) - decoder limits loadable from JSON.
//!
//! Errors are returned as [anyhow::Error]. Root cause can be inspected by downcasting to one of
//! the enums in [error].
//!
//! Example how to create root certificate and NOC for key from CSR:
//! ```no_run
//! # use matcert::certmanager::{self, Validity};
//! # use anyhow::Result;
//! # fn main() -> Result<()> {
//! let validity = Validity { not_before: 0x28541280, not_after: 0 };
//! let root_key = p256::SecretKey::random(&mut rand::thread_rng());
//! let root = certmanager::create_root_certificate(&root_key, 1, None, validity)?;
//!
//! let node_key = p256::SecretKey::random(&mut rand::thread_rng());
//! let csr = certmanager::create_certificate_signing_request(&node_key)?;
//! let public_key = certmanager::get_public_key_from_csr(&csr)?;
//! let noc = certmanager::create_noc_certificate(&root, &root_key, &public_key, 100, 1000, &[], validity)?;
//! certmanager::validate_noc_certificate(&root, &noc)?;
//!
//! // TLV form as sent to device
//! let tlv = noc.encode_tlv()?;
//! # Ok(())
//! # }
//! ```
//!
//! Example how to decode certificate and write its X.509 form to PEM file:
//! ```no_run
//! # use matcert::{cert_matter::{CertificateKind, MatterCertificate}, cert_x509, util::cryptoutil};
//! # use anyhow::Result;
//! # fn main() -> Result<()> {
//! let data = std::fs::read("rcac.tlv")?;
//! let cert = MatterCertificate::decode_tlv(&data)?;
//! println!("{:?}", cert.subject);
//! let x509 = cert_x509::to_x509(&cert, CertificateKind::Root)?;
//! cryptoutil::write_pem("CERTIFICATE", &x509, "rcac.pem")?;
//! # Ok(())
//! # }
//! ```

pub mod cat;
pub mod cd;
pub mod cert_matter;
pub mod cert_x509;
pub mod certmanager;
pub mod config;
pub mod der;
pub mod epoch;
pub mod error;
pub mod tlv;
pub mod tlv_schema;
pub mod util;
