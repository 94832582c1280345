use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use aegis_core::error::AegisError;
use aegis_core::types::{Address, Amount, GatedPurpose};

/// Protocol version advertised on 402 responses.
pub const X402_VERSION: u32 = 1;

// ── Requirements ─────────────────────────────────────────────────────────────

/// Discriminates what a gated payment buys: a merchant stake deposit or a
/// client's anti-griefing slash bond.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequirementExtra {
    pub purpose: GatedPurpose,
}

/// One acceptable way to pay for a gated request. Field names follow the x402
/// wire convention (camelCase).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequirements {
    /// Always `"exact"` — the payload must transfer exactly the required amount.
    pub scheme: String,
    pub network: String,
    /// Address of the value asset contract.
    pub asset: String,
    /// The clearinghouse agent address that receives the payment.
    pub pay_to: String,
    /// Required amount in atomic units, as a decimal string.
    pub max_amount_required: String,
    /// Path of the gated resource (e.g. `/subscribe`).
    pub resource: String,
    pub description: String,
    pub max_timeout_seconds: u64,
    pub extra: RequirementExtra,
}

impl PaymentRequirements {
    pub fn new(
        purpose: GatedPurpose,
        network: &str,
        asset: &Address,
        pay_to: &Address,
        amount: Amount,
        resource: &str,
        description: &str,
        max_timeout_seconds: u64,
    ) -> Self {
        Self {
            scheme: "exact".to_string(),
            network: network.to_string(),
            asset: asset.to_string(),
            pay_to: pay_to.to_string(),
            max_amount_required: amount.to_string(),
            resource: resource.to_string(),
            description: description.to_string(),
            max_timeout_seconds,
            extra: RequirementExtra { purpose },
        }
    }

    /// The required amount parsed back out of its wire form.
    pub fn amount(&self) -> Result<Amount, AegisError> {
        self.max_amount_required
            .parse()
            .map_err(|_| AegisError::Validation("invalid maxAmountRequired".to_string()))
    }
}

/// Body of a `402 Payment Required` response.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentRequiredBody {
    #[serde(rename = "x402Version")]
    pub x402_version: u32,
    pub accepts: Vec<PaymentRequirements>,
    pub error: String,
}

impl PaymentRequiredBody {
    pub fn new(accepts: Vec<PaymentRequirements>, error: &str) -> Self {
        Self {
            x402_version: X402_VERSION,
            accepts,
            error: error.to_string(),
        }
    }
}

// ── Submission ───────────────────────────────────────────────────────────────

/// The optional payment pocket embedded in a gated request body. The payload is
/// scheme-specific JSON passed through to the facilitator untouched.
#[derive(Clone, Debug, Deserialize)]
pub struct PaymentSubmission {
    pub payment_payload: serde_json::Value,
    pub requirements: PaymentRequirements,
}

// ── Facilitator verdicts ─────────────────────────────────────────────────────

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
    pub is_valid: bool,
    #[serde(default)]
    pub payer: Option<String>,
    #[serde(default)]
    pub invalid_reason: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleOutcome {
    pub success: bool,
    #[serde(default)]
    pub transaction: Option<String>,
    #[serde(default)]
    pub payer: Option<String>,
    #[serde(default)]
    pub error_reason: Option<String>,
}

/// External service that verifies and settles x402 payment payloads.
#[async_trait]
pub trait Facilitator: Send + Sync {
    async fn verify(
        &self,
        payload: &serde_json::Value,
        requirements: &PaymentRequirements,
    ) -> Result<VerifyOutcome, AegisError>;

    async fn settle(
        &self,
        payload: &serde_json::Value,
        requirements: &PaymentRequirements,
    ) -> Result<SettleOutcome, AegisError>;
}
