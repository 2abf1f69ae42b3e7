use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    response::IntoResponse,
    Json,
};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use crate::error::AppError;
use crate::services::webhook::PaymentWebhookPayload;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "X-Webhook-Signature";

/// Verify the gateway's HMAC-SHA256 signature over the raw request body.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&signature).is_ok()
}

pub async fn payment_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("missing webhook signature".to_string()))?;

    if !verify_signature(&state.webhook_secret, &body, signature) {
        return Err(AppError::Unauthorized("invalid webhook signature".to_string()));
    }

    let payload: PaymentWebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::InvalidPayload(format!("malformed webhook body: {}", e)))?;

    let outcome = state.webhooks.handle_payment_webhook(payload).await?;

    Ok(Json(json!({
        "status": "ok",
        "transaction_id": outcome.transaction_id,
        "reference": outcome.reference,
        "payment_status": outcome.payment_status.as_str(),
        "overall_status": outcome.overall_status.as_str(),
        "replayed": outcome.replayed,
    })))
}
