use anyhow::{Context, Result};
use ecdsa::signature::{Signer, Verifier};

use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::CertificateError;

type SigningKey = ecdsa::SigningKey<p256::NistP256>;
type VerifyingKey = ecdsa::VerifyingKey<p256::NistP256>;
type Signature = ecdsa::Signature<p256::NistP256>;

pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}
pub fn sha1_enc(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Key identifier as used in SKI/AKI extensions: SHA-1 of the uncompressed public key.
pub fn key_identifier(public_key: &[u8]) -> Vec<u8> {
    sha1_enc(public_key)
}

pub fn public_key_bytes(key: &p256::SecretKey) -> Vec<u8> {
    key.public_key().to_sec1_bytes().to_vec()
}

fn sign(key: &p256::SecretKey, data: &[u8]) -> Result<Signature> {
    let key = SigningKey::from(key);
    Ok(key.try_sign(data)?)
}

/// ECDSA-SHA256 signature in ASN.1 DER form.
pub fn sign_der(key: &p256::SecretKey, data: &[u8]) -> Result<Vec<u8>> {
    Ok(sign(key, data)?.to_der().as_bytes().to_vec())
}

/// ECDSA-SHA256 signature as raw r||s (64 bytes) as stored in matter certificates.
pub fn sign_raw(key: &p256::SecretKey, data: &[u8]) -> Result<Vec<u8>> {
    Ok(sign(key, data)?.to_bytes().to_vec())
}

fn verify(public_key: &[u8], data: &[u8], signature: &Signature) -> Result<()> {
    let key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|_| CertificateError::Invalid("invalid EC public key".to_owned()))?;
    key.verify(data, signature).map_err(|_| {
        log::debug!("signature verification failed");
        CertificateError::SignatureVerificationFailed
    })?;
    Ok(())
}

pub fn verify_raw(public_key: &[u8], data: &[u8], signature: &[u8]) -> Result<()> {
    let signature =
        Signature::from_slice(signature).map_err(|_| CertificateError::SignatureVerificationFailed)?;
    verify(public_key, data, &signature)
}

pub fn verify_der(public_key: &[u8], data: &[u8], signature: &[u8]) -> Result<()> {
    let signature =
        Signature::from_der(signature).map_err(|_| CertificateError::SignatureVerificationFailed)?;
    verify(public_key, data, &signature)
}

/// Convert raw r||s signature to DER form.
pub fn raw_signature_to_der(signature: &[u8]) -> Result<Vec<u8>> {
    let signature =
        Signature::from_slice(signature).map_err(|_| CertificateError::SignatureVerificationFailed)?;
    Ok(signature.to_der().as_bytes().to_vec())
}

/// Convert DER signature to raw r||s form.
pub fn der_signature_to_raw(signature: &[u8]) -> Result<Vec<u8>> {
    let signature =
        Signature::from_der(signature).map_err(|_| CertificateError::SignatureVerificationFailed)?;
    Ok(signature.to_bytes().to_vec())
}

pub fn to_pem(tag: &str, data: &[u8]) -> String {
    pem::encode(&pem::Pem::new(tag, data))
}

pub fn from_pem(data: &str) -> Result<Vec<u8>> {
    Ok(pem::parse(data)?.contents().to_vec())
}

pub fn write_pem(tag: &str, data: &[u8], fname: &str) -> Result<()> {
    std::fs::write(fname, to_pem(tag, data)).context(format!("can't write {}", fname))
}

pub fn read_data_from_pem(fname: &str) -> Result<Vec<u8>> {
    let file_contents = std::fs::read_to_string(fname).context(format!("can't read {}", fname))?;
    from_pem(&file_contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() -> Result<()> {
        let key = p256::SecretKey::random(&mut rand::thread_rng());
        let public_key = public_key_bytes(&key);
        assert_eq!(public_key.len(), 65);

        let raw = sign_raw(&key, b"hello")?;
        assert_eq!(raw.len(), 64);
        verify_raw(&public_key, b"hello", &raw)?;
        let err = verify_raw(&public_key, b"hellO", &raw).unwrap_err();
        assert_eq!(
            err.downcast_ref::<CertificateError>(),
            Some(&CertificateError::SignatureVerificationFailed)
        );

        let der = sign_der(&key, b"hello")?;
        verify_der(&public_key, b"hello", &der)?;
        assert!(verify_der(&public_key, b"other", &der).is_err());

        let converted = raw_signature_to_der(&raw)?;
        verify_der(&public_key, b"hello", &converted)?;
        assert_eq!(der_signature_to_raw(&converted)?, raw);
        Ok(())
    }

    #[test]
    fn pem_file() -> Result<()> {
        let fname = std::env::temp_dir().join(format!("matcert-pem-{}.pem", std::process::id()));
        let fname = fname.to_string_lossy().to_string();
        write_pem("CERTIFICATE", &[1, 2, 3], &fname)?;
        let data = read_data_from_pem(&fname)?;
        std::fs::remove_file(&fname)?;
        assert_eq!(data, vec![1, 2, 3]);
        assert!(to_pem("CERTIFICATE", &[1, 2, 3]).starts_with("-----BEGIN CERTIFICATE-----"));
        Ok(())
    }

    #[test]
    fn key_id() {
        assert_eq!(
            hex::encode(key_identifier(b"abc")),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
    }
}
