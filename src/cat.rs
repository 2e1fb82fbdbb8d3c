//! CASE Authenticated Tags carried in NOC subjects.
//!
//! A tag is a u32: identifier in the upper 16 bits, version in the lower 16 bits.

use anyhow::Result;

use crate::error::CertificateError;

pub const MAX_CASE_AUTHENTICATED_TAGS: usize = 3;

pub fn identifier(tag: u32) -> u16 {
    (tag >> 16) as u16
}

pub fn version(tag: u32) -> u16 {
    tag as u16
}

pub fn validate_noc_tag_list(tags: &[u32]) -> Result<()> {
    if tags.len() > MAX_CASE_AUTHENTICATED_TAGS {
        return Err(CertificateError::InvalidCaseAuthenticatedTags(format!(
            "{} tags, at most {} allowed",
            tags.len(),
            MAX_CASE_AUTHENTICATED_TAGS
        ))
        .into());
    }
    for (i, tag) in tags.iter().enumerate() {
        if version(*tag) == 0 {
            return Err(CertificateError::InvalidCaseAuthenticatedTags(format!(
                "tag {:08X} has version 0",
                tag
            ))
            .into());
        }
        if tags[..i].iter().any(|t| identifier(*t) == identifier(*tag)) {
            return Err(CertificateError::InvalidCaseAuthenticatedTags(format!(
                "identifier {:04X} used more than once",
                identifier(*tag)
            ))
            .into());
        }
    }
    Ok(())
}
