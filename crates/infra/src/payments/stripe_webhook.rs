//! Stripe webhook signatures: https://stripe.com/docs/webhooks/signatures

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use domain::{
    repositories::payment_gateway::{GatewayError, GatewayResult},
    value_objects::payment_processor::ProcessorEvent,
};

use super::stripe_dto::StripeEvent;

type HmacSha256 = Hmac<Sha256>;

pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, PartialEq, Eq)]
struct SignatureHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(signature_header: &str) -> GatewayResult<SignatureHeader> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in signature_header.split(',') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("t=") {
            timestamp = rest.parse::<i64>().ok();
        } else if let Some(rest) = part.strip_prefix("v1=") {
            // Malformed entries are skipped; another v1 may still match.
            if let Ok(bytes) = hex::decode(rest) {
                signatures.push(bytes);
            }
        }
    }

    match timestamp {
        Some(timestamp) if !signatures.is_empty() => Ok(SignatureHeader {
            timestamp,
            signatures,
        }),
        _ => Err(GatewayError::InvalidSignature),
    }
}

/// Checks the `Stripe-Signature` header against the raw payload.
pub fn verify_signature(
    secret: &str,
    payload: &str,
    signature_header: &str,
    now: DateTime<Utc>,
    tolerance_secs: i64,
) -> GatewayResult<()> {
    let header = parse_header(signature_header)?;

    if (now.timestamp() - header.timestamp).abs() > tolerance_secs {
        return Err(GatewayError::InvalidSignature);
    }

    let signed_payload = format!("{}.{}", header.timestamp, payload);
    let matched = header.signatures.iter().any(|candidate| {
        HmacSha256::new_from_slice(secret.as_bytes())
            .map(|mut mac| {
                mac.update(signed_payload.as_bytes());
                mac.verify_slice(candidate).is_ok()
            })
            .unwrap_or(false)
    });

    if matched {
        Ok(())
    } else {
        Err(GatewayError::InvalidSignature)
    }
}

pub fn decode_event(payload: &str) -> GatewayResult<ProcessorEvent> {
    let event: StripeEvent = serde_json::from_str(payload)
        .map_err(|err| GatewayError::InvalidPayload(format!("webhook event: {err}")))?;
    Ok(event.into())
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, payload: &str, timestamp: i64) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key");
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}
