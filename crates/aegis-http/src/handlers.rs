use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use aegis_clearing::SubscribeRequest;
use aegis_core::error::AegisError;
use aegis_core::types::{Address, AgentId, TxHash};
use aegis_facilitator::PaymentRequirements;

use crate::app::App;
use crate::error::{bad_request, payment_required};
use crate::types::{
    extract_submission, MerchantView, QuoteBody, SettleBody, SlashBody, SubscribeBody,
};

/// Verify an x402 payload against the server-derived requirements, settle it,
/// and return the payer address the facilitator recovered.
async fn verify_and_settle(
    app: &App,
    payload: &serde_json::Value,
    requirements: &PaymentRequirements,
) -> Result<Address, AegisError> {
    let verdict = app.facilitator.verify(payload, requirements).await?;
    if !verdict.is_valid {
        return Err(AegisError::PaymentVerificationFailed(
            verdict
                .invalid_reason
                .unwrap_or_else(|| "invalid payment payload".to_string()),
        ));
    }
    let payer = verdict.payer.ok_or_else(|| {
        AegisError::PaymentVerificationFailed("facilitator returned no payer".to_string())
    })?;
    let payer = Address::new(&payer)?;

    let settled = app.facilitator.settle(payload, requirements).await?;
    if !settled.success {
        return Err(AegisError::PaymentSettlementFailed(
            settled
                .error_reason
                .unwrap_or_else(|| "settlement rejected".to_string()),
        ));
    }
    Ok(payer)
}

// ── POST /subscribe ──────────────────────────────────────────────────────────

pub async fn subscribe(State(app): State<App>, Json(body): Json<SubscribeBody>) -> Response {
    let Some(endpoint) = body.endpoint.filter(|e| !e.is_empty()) else {
        return bad_request(AegisError::Validation("endpoint is required".to_string()));
    };
    if body.skills.is_empty() {
        return bad_request(AegisError::Validation(
            "at least one skill is required".to_string(),
        ));
    }
    let agent_id = AgentId(body.agent_id.unwrap_or_else(|| "0".to_string()));

    let stake = match &body.stake_amount {
        Some(field) => match field.to_amount() {
            Ok(a) => a,
            Err(e) => return bad_request(e),
        },
        None => app.gate.min_stake,
    };
    if stake < app.gate.min_stake {
        return bad_request(AegisError::StakeBelowMinimum {
            stake,
            minimum: app.gate.min_stake,
        });
    }

    let requirements = app.gate.stake_requirements(stake);
    let submission = match extract_submission(body.payment_payload, body.requirements) {
        Ok(s) => s,
        Err(e) => return bad_request(e),
    };
    let Some(submission) = submission else {
        return payment_required(
            vec![requirements],
            "payment required: merchant stake deposit",
        );
    };

    let merchant =
        match verify_and_settle(&app, &submission.payment_payload, &requirements).await {
            Ok(payer) => payer,
            Err(e) => return bad_request(e),
        };

    let request = SubscribeRequest {
        endpoint,
        skills: body.skills,
        agent_id,
    };
    match app.clearing.subscribe(request, merchant, stake).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => bad_request(e),
    }
}

// ── POST /quote ──────────────────────────────────────────────────────────────

pub async fn quote(State(app): State<App>, Json(body): Json<QuoteBody>) -> Response {
    let Some(skill) = body.skill.filter(|s| !s.is_empty()) else {
        return bad_request(AegisError::Validation("skill is required".to_string()));
    };
    let price = match body.price.as_ref().map(|f| f.to_amount()) {
        Some(Ok(p)) if p > 0 => p,
        Some(Ok(_)) => {
            return bad_request(AegisError::Validation("price must be positive".to_string()))
        }
        Some(Err(e)) => return bad_request(e),
        None => return bad_request(AegisError::Validation("price is required".to_string())),
    };

    match app.clearing.quote(&skill, price).await {
        Ok(merchants) => Json(json!({ "merchants": merchants })).into_response(),
        Err(e) => bad_request(e),
    }
}

// ── POST /settle ─────────────────────────────────────────────────────────────

pub async fn settle(State(app): State<App>, Json(body): Json<SettleBody>) -> Response {
    let tx_hash = match parse_tx_hash(body.tx_hash) {
        Ok(h) => h,
        Err(e) => return bad_request(e),
    };
    match app.clearing.settle(tx_hash).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => bad_request(e),
    }
}

// ── POST /slash ──────────────────────────────────────────────────────────────

pub async fn slash(State(app): State<App>, Json(body): Json<SlashBody>) -> Response {
    let tx_hash = match parse_tx_hash(body.tx_hash) {
        Ok(h) => h,
        Err(e) => return bad_request(e),
    };

    let requirements = app.gate.bond_requirements();
    let submission = match extract_submission(body.payment_payload, body.requirements) {
        Ok(s) => s,
        Err(e) => return bad_request(e),
    };
    let Some(submission) = submission else {
        return payment_required(vec![requirements], "payment required: slash bond");
    };

    // The bond payer is the only address allowed to slash this payment.
    let client = match verify_and_settle(&app, &submission.payment_payload, &requirements).await
    {
        Ok(payer) => payer,
        Err(e) => return bad_request(e),
    };

    match app.clearing.slash(tx_hash, client).await {
        Ok(resp) => Json(resp).into_response(),
        Err(e) => bad_request(e),
    }
}

// ── GET /health ──────────────────────────────────────────────────────────────

pub async fn health(State(app): State<App>) -> Response {
    Json(json!({
        "status": "ok",
        "agent": app.gate.agent_address,
        "credit_manager": app.gate.credit_manager,
        "timestamp": chrono::Utc::now().timestamp(),
    }))
    .into_response()
}

// ── GET /merchants ───────────────────────────────────────────────────────────

pub async fn merchants(State(app): State<App>) -> Response {
    let merchants: Vec<MerchantView> = app
        .registry
        .merchants()
        .into_iter()
        .map(MerchantView::from)
        .collect();
    Json(json!({ "merchants": merchants })).into_response()
}

fn parse_tx_hash(raw: Option<String>) -> Result<TxHash, AegisError> {
    let raw = raw.ok_or_else(|| AegisError::Validation("tx_hash is required".to_string()))?;
    TxHash::new(&raw)
}
