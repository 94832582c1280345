use serde::{Deserialize, Serialize};

use aegis_core::error::AegisError;
use aegis_core::merchant::Merchant;
use aegis_core::types::Amount;
use aegis_facilitator::{PaymentRequirements, PaymentSubmission};

// ── Request bodies ───────────────────────────────────────────────────────────

/// An amount field that accepts either a JSON number or a decimal string.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum AmountField {
    Number(u64),
    Text(String),
}

impl AmountField {
    pub fn to_amount(&self) -> Result<Amount, AegisError> {
        match self {
            AmountField::Number(n) => Ok(*n as Amount),
            AmountField::Text(s) => s
                .parse()
                .map_err(|_| AegisError::Validation(format!("invalid amount: {s}"))),
        }
    }
}

#[derive(Deserialize)]
pub struct SubscribeBody {
    pub endpoint: Option<String>,
    #[serde(default)]
    pub skills: Vec<String>,
    pub agent_id: Option<String>,
    pub stake_amount: Option<AmountField>,
    pub payment_payload: Option<serde_json::Value>,
    pub requirements: Option<PaymentRequirements>,
}

#[derive(Deserialize)]
pub struct QuoteBody {
    pub skill: Option<String>,
    pub price: Option<AmountField>,
}

#[derive(Deserialize)]
pub struct SettleBody {
    pub tx_hash: Option<String>,
}

#[derive(Deserialize)]
pub struct SlashBody {
    pub tx_hash: Option<String>,
    pub payment_payload: Option<serde_json::Value>,
    pub requirements: Option<PaymentRequirements>,
}

/// Assemble the optional payment pocket out of its two body fields. Presenting
/// only one of the pair is a caller error.
pub fn extract_submission(
    payload: Option<serde_json::Value>,
    requirements: Option<PaymentRequirements>,
) -> Result<Option<PaymentSubmission>, AegisError> {
    match (payload, requirements) {
        (Some(payment_payload), Some(requirements)) => Ok(Some(PaymentSubmission {
            payment_payload,
            requirements,
        })),
        (None, None) => Ok(None),
        _ => Err(AegisError::Validation(
            "payment_payload and requirements must be provided together".to_string(),
        )),
    }
}

// ── Response bodies ──────────────────────────────────────────────────────────

/// Merchant listing entry; amounts rendered as decimal strings.
#[derive(Serialize)]
pub struct MerchantView {
    pub address: String,
    pub agent_id: String,
    pub endpoint: String,
    pub skills: Vec<String>,
    pub stake: String,
    pub credit_limit: String,
    pub exposure: String,
    pub available_capacity: String,
    pub active: bool,
    pub registered_at: i64,
}

impl From<Merchant> for MerchantView {
    fn from(m: Merchant) -> Self {
        let capacity = m.capacity();
        Self {
            address: m.address.to_string(),
            agent_id: m.agent_id.to_string(),
            endpoint: m.endpoint,
            skills: m.skills.into_iter().collect(),
            stake: m.stake.to_string(),
            credit_limit: m.credit_limit.to_string(),
            exposure: m.exposure.to_string(),
            available_capacity: capacity.to_string(),
            active: m.active,
            registered_at: m.registered_at,
        }
    }
}
