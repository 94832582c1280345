use thiserror::Error;

use crate::merchant::PaymentStatus;
use crate::types::{Amount, Timestamp};

#[derive(Debug, Error)]
pub enum AegisError {
    // ── Validation ───────────────────────────────────────────────────────────
    #[error("{0}")]
    Validation(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid tx hash: {0}")]
    InvalidTxHash(String),

    #[error("invalid agent key: {0}")]
    InvalidKey(String),

    // ── Payment lifecycle ────────────────────────────────────────────────────
    #[error("Payment record not found")]
    PaymentNotFound,

    #[error("Payment already {0}")]
    PaymentAlreadyTerminal(PaymentStatus),

    #[error("Deadline not yet passed. Wait {remaining} seconds")]
    DeadlineNotPassed { remaining: Timestamp },

    #[error("Only the original client can slash")]
    SlashNotByClient,

    // ── Credit accounting ────────────────────────────────────────────────────
    #[error("merchant not registered: {0}")]
    MerchantNotFound(String),

    #[error("merchant already subscribed: {0}")]
    MerchantAlreadySubscribed(String),

    #[error("exposure {exposure} + {amount} exceeds credit limit {limit}")]
    CreditLimitExceeded {
        exposure: Amount,
        amount: Amount,
        limit: Amount,
    },

    #[error("amount {amount} exceeds outstanding exposure {exposure}")]
    AmountExceedsExposure { amount: Amount, exposure: Amount },

    #[error("amount {amount} exceeds remaining stake {stake}")]
    AmountExceedsStake { amount: Amount, stake: Amount },

    #[error("allowance {allowance} below required stake {required}")]
    AllowanceTooLow {
        allowance: Amount,
        required: Amount,
    },

    #[error("stake {stake} below minimum {minimum}")]
    StakeBelowMinimum { stake: Amount, minimum: Amount },

    // ── Payment gate (x402) ──────────────────────────────────────────────────
    #[error("payment required")]
    PaymentRequired,

    #[error("payment verification failed: {0}")]
    PaymentVerificationFailed(String),

    #[error("payment settlement failed: {0}")]
    PaymentSettlementFailed(String),

    // ── External collaborators ───────────────────────────────────────────────
    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("reputation oracle error: {0}")]
    Reputation(String),

    #[error("facilitator error: {0}")]
    Facilitator(String),

    // ── Recovery / internal ──────────────────────────────────────────────────
    #[error("recovery error: {0}")]
    Recovery(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}
