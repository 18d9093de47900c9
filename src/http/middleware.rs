//! Operator request authentication

use axum::{
    body::Body,
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use crate::app::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying `hex(HMAC-SHA256(ADMIN_SECRET, body))`
pub const SIGNATURE_HEADER: &str = "x-admin-signature";

/// Admin payloads are small JSON documents
const MAX_ADMIN_BODY: usize = 64 * 1024;

/// Check a hex signature against the raw request body
pub fn verify_signature(body: &[u8], signature: &str, secret: &str) -> Result<(), AdminAuthError> {
    let provided = hex::decode(signature.trim()).map_err(|_| AdminAuthError::InvalidSignature)?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AdminAuthError::InvalidSignature)?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| AdminAuthError::InvalidSignature)
}

/// Middleware guarding the admin routes. The body is buffered, verified
/// and handed on unchanged.
pub async fn require_admin_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AdminAuthError> {
    let secret = state
        .config
        .admin_secret
        .as_deref()
        .ok_or(AdminAuthError::Disabled)?;

    let (parts, body) = request.into_parts();
    let signature = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
        .ok_or(AdminAuthError::MissingSignature)?;

    let bytes = axum::body::to_bytes(body, MAX_ADMIN_BODY)
        .await
        .map_err(|_| AdminAuthError::PayloadTooLarge)?;

    if let Err(e) = verify_signature(&bytes, &signature, secret) {
        warn!(path = %parts.uri.path(), "Rejected admin request with bad signature");
        return Err(e);
    }

    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}

#[derive(Debug, thiserror::Error)]
pub enum AdminAuthError {
    #[error("Not found")]
    Disabled,

    #[error("Missing signature header")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Payload too large")]
    PayloadTooLarge,
}

impl IntoResponse for AdminAuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AdminAuthError::Disabled => StatusCode::NOT_FOUND,
            AdminAuthError::MissingSignature => StatusCode::UNAUTHORIZED,
            AdminAuthError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AdminAuthError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        };

        (status, self.to_string()).into_response()
    }
}
