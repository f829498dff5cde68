//! Shared-secret authorization for the publish trigger

use axum::http::{HeaderMap, header::AUTHORIZATION};
use sha2::{Digest, Sha256};

use crate::error::PublishError;

/// Pull the presented secret from `Authorization: Bearer` or the `secret` query value
pub fn presented_secret<'a>(headers: &'a HeaderMap, query_secret: Option<&'a str>) -> Option<&'a str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or(query_secret.filter(|s| !s.is_empty()))
}

/// Check a presented secret against the configured one.
///
/// An unset or empty configured secret rejects everything.
pub fn verify_trigger_secret(expected: Option<&str>, presented: Option<&str>) -> Result<(), PublishError> {
    let expected = expected.filter(|s| !s.is_empty()).ok_or(PublishError::Authorization)?;
    let presented = presented.ok_or(PublishError::Authorization)?;

    // Compare fixed-length digests so timing does not depend on the shared prefix
    let a = Sha256::digest(expected.as_bytes());
    let b = Sha256::digest(presented.as_bytes());
    let diff = a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y));

    if diff == 0 {
        Ok(())
    } else {
        Err(PublishError::Authorization)
    }
}
