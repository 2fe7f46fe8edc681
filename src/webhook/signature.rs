use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{AppError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Verify the webhook HMAC-SHA256 signature.
///
/// GitHub sends it in the `X-Hub-Signature-256` header as `sha256=<hex>`.
/// Verification happens before any payload parsing so unauthenticated events
/// never reach the reconciliation queue.
pub fn verify_signature(secret: &str, payload: &[u8], signature_header: &str) -> Result<()> {
    let signature_hex = signature_header
        .strip_prefix("sha256=")
        .ok_or_else(|| AppError::WebhookVerification("Missing sha256= prefix".to_string()))?;

    let signature_bytes = hex::decode(signature_hex)
        .map_err(|e| AppError::WebhookVerification(format!("Invalid hex in signature: {e}")))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::WebhookVerification(format!("Invalid HMAC key: {e}")))?;

    mac.update(payload);

    mac.verify_slice(&signature_bytes)
        .map_err(|_| AppError::WebhookVerification("Signature mismatch".to_string()))
}
