//! Signed webhook event verification.
//!
//! Stripe signs the exact bytes of the request body, so verification must happen against the raw payload before any
//! parsing. The `Stripe-Signature` header carries a unix timestamp and one or more HMAC-SHA256 signatures over
//! `"{timestamp}.{payload}"`.
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{data_objects::Event, StripeApiError};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Verify the signature header against the raw payload and parse the event.
///
/// `tolerance` bounds the age of the signed timestamp; pass `None` to skip the replay check (tests).
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance: Option<i64>,
) -> Result<Event, StripeApiError> {
    let (timestamp, signatures) = parse_signature_header(header)?;
    if signatures.is_empty() {
        return Err(StripeApiError::SignatureHeader("no v1 signature present".to_string()));
    }
    if let Some(tolerance) = tolerance {
        let age = Utc::now().timestamp() - timestamp;
        if age.abs() > tolerance {
            return Err(StripeApiError::TimestampOutOfTolerance);
        }
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| StripeApiError::SignatureHeader(e.to_string()))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    if signatures.iter().any(|candidate| constant_time_eq(candidate.as_bytes(), expected.as_bytes())) {
        parse_event(payload)
    } else {
        Err(StripeApiError::SignatureMismatch)
    }
}

/// Parse an event envelope without verification. Only acceptable outside production, when no signing secret exists.
pub fn parse_event(payload: &[u8]) -> Result<Event, StripeApiError> {
    serde_json::from_slice(payload).map_err(|e| StripeApiError::JsonError(e.to_string()))
}

fn parse_signature_header(header: &str) -> Result<(i64, Vec<String>), StripeApiError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => {
                let t = value
                    .parse::<i64>()
                    .map_err(|_| StripeApiError::SignatureHeader(format!("invalid timestamp '{value}'")))?;
                timestamp = Some(t);
            },
            "v1" => signatures.push(value.to_string()),
            _ => {},
        }
    }
    let timestamp = timestamp.ok_or_else(|| StripeApiError::SignatureHeader("no timestamp present".to_string()))?;
    Ok((timestamp, signatures))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
