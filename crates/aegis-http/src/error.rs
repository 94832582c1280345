use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use aegis_core::error::AegisError;
use aegis_facilitator::{PaymentRequiredBody, PaymentRequirements};

/// Map a clearing error to its HTTP reply. Everything user-facing is a 400
/// with the error's own message; ledger failures keep their full detail in the
/// logs only.
pub fn bad_request(err: AegisError) -> Response {
    if let AegisError::Ledger(detail) = &err {
        warn!(%detail, "ledger error surfaced to caller");
    }
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "success": false, "error": err.to_string() })),
    )
        .into_response()
}

/// `402 Payment Required` with the x402 requirement objects for this route.
pub fn payment_required(accepts: Vec<PaymentRequirements>, message: &str) -> Response {
    (
        StatusCode::PAYMENT_REQUIRED,
        Json(PaymentRequiredBody::new(accepts, message)),
    )
        .into_response()
}
