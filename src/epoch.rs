//! Matter epoch time: seconds since 2000-01-01T00:00:00Z stored as u32.
//!
//! Value 0 has special meaning "no well-defined expiration" and maps to
//! 9999-12-31T23:59:59Z in X.509.

use std::time::Duration;

use anyhow::Result;
use x509_cert::der::DateTime;

use crate::error::CertificateError;

/// Unix time of 2000-01-01T00:00:00Z.
pub const MATTER_EPOCH_OFFSET: u64 = 946684800;

pub const NON_WELL_DEFINED_DATE: u32 = 0;

pub fn matter_to_date(epoch: u32) -> Result<DateTime> {
    if epoch == NON_WELL_DEFINED_DATE {
        return Ok(DateTime::INFINITY);
    }
    Ok(DateTime::from_unix_duration(Duration::from_secs(
        epoch as u64 + MATTER_EPOCH_OFFSET,
    ))?)
}

pub fn date_to_matter(date: &DateTime) -> Result<u32> {
    if *date == DateTime::INFINITY {
        return Ok(NON_WELL_DEFINED_DATE);
    }
    let secs = date.unix_duration().as_secs();
    // the epoch itself would collide with the sentinel
    if secs <= MATTER_EPOCH_OFFSET {
        return Err(CertificateError::InvalidDate(date.to_string()).into());
    }
    u32::try_from(secs - MATTER_EPOCH_OFFSET)
        .map_err(|_| CertificateError::InvalidDate(date.to_string()).into())
}
