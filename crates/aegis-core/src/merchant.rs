//! Merchant and payment records — the clearinghouse's in-memory view of the
//! on-ledger credit state.
//!
//! - [`Merchant`] — one per subscribed service agent; tracks stake, credit
//!   limit and outstanding exposure
//! - [`Payment`] — one per attributed client→merchant transfer
//! - [`PaymentStatus`] — the payment lifecycle state machine
//!
//! After every committed clearing-core transition the local tables satisfy
//! `0 ≤ exposure ≤ credit_limit` and `exposure = Σ amount of pending payments`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

use crate::types::{Address, AgentId, Amount, Timestamp, TxHash};

// ── Merchant ─────────────────────────────────────────────────────────────────

/// A subscribed service agent. One record per ledger address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Merchant {
    /// Ledger address the merchant receives payments at (registry key).
    pub address: Address,
    /// Identity in the external reputation namespace ("0" = unknown).
    pub agent_id: AgentId,
    /// URL clients use to transact with the merchant directly.
    pub endpoint: String,
    /// Skill tags offered, mirrored into the skill index while active.
    pub skills: BTreeSet<String>,
    /// Collateral locked with the credit contract, atomic units.
    pub stake: Amount,
    /// Maximum concurrent exposure, `⌊stake · ρ⌋`.
    pub credit_limit: Amount,
    /// Sum of amounts across this merchant's pending payments.
    pub exposure: Amount,
    /// Write-once for the clearinghouse's lifetime.
    pub active: bool,
    pub registered_at: Timestamp,
}

impl Merchant {
    /// Headroom left for new payments: `credit_limit − exposure`.
    pub fn capacity(&self) -> Amount {
        self.credit_limit.saturating_sub(self.exposure)
    }
}

// ── Payment ──────────────────────────────────────────────────────────────────

/// Lifecycle of an attributed payment. Terminal states are permanent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Settled,
    Slashed,
    Expired,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Settled => "settled",
            PaymentStatus::Slashed => "slashed",
            PaymentStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One observed client→merchant transfer carrying credit exposure.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    /// Ledger transaction hash of the transfer (unique primary key).
    pub tx_hash: TxHash,
    pub merchant: Address,
    pub client: Address,
    pub amount: Amount,
    /// Wall-clock time by which the merchant must deliver or face slashing.
    pub deadline: Timestamp,
    pub status: PaymentStatus,
    pub created_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::from_bytes(&[n; 20])
    }

    #[test]
    fn capacity_is_limit_minus_exposure() {
        let m = Merchant {
            address: addr(1),
            agent_id: AgentId::unknown(),
            endpoint: "http://merchant.local".into(),
            skills: BTreeSet::from(["translate".to_string()]),
            stake: 100_000,
            credit_limit: 100_000,
            exposure: 10_000,
            active: true,
            registered_at: 0,
        };
        assert_eq!(m.capacity(), 90_000);
    }

    #[test]
    fn terminal_statuses() {
        assert!(!PaymentStatus::Pending.is_terminal());
        assert!(PaymentStatus::Settled.is_terminal());
        assert!(PaymentStatus::Slashed.is_terminal());
        assert!(PaymentStatus::Expired.is_terminal());
        assert_eq!(PaymentStatus::Expired.to_string(), "expired");
    }
}
