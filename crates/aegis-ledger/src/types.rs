use serde::{Deserialize, Serialize};
use std::fmt;

use aegis_core::error::AegisError;
use aegis_core::types::{Address, AgentId, Amount, BlockNumber, Timestamp, TxHash};

// ── Transfer ─────────────────────────────────────────────────────────────────

/// One `Transfer(from, to, amount)` log entry of the value asset.
///
/// The ledger delivers transfers for a given recipient in block order and, within
/// a block, in log-index order. The same transfer may be observed more than once
/// after a poll failure; consumers key on `tx_hash`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub tx_hash: TxHash,
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    pub block: BlockNumber,
    pub log_index: u32,
    pub timestamp: Timestamp,
}

// ── Credit-manager events ────────────────────────────────────────────────────

/// The four event kinds the credit contract emits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreditEventKind {
    Subscribed,
    ExposureIncreased,
    ExposureCleared,
    Slashed,
}

impl CreditEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditEventKind::Subscribed => "Subscribed",
            CreditEventKind::ExposureIncreased => "ExposureIncreased",
            CreditEventKind::ExposureCleared => "ExposureCleared",
            CreditEventKind::Slashed => "Slashed",
        }
    }
}

impl fmt::Display for CreditEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A historical credit-contract event, used by start-up recovery.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditEvent {
    pub kind: CreditEventKind,
    pub merchant: Address,
    /// Set for `Slashed` events only.
    pub client: Option<Address>,
    pub amount: Amount,
    /// Set for `Subscribed` events only.
    pub agent_id: Option<AgentId>,
    pub block: BlockNumber,
    pub block_timestamp: Timestamp,
    /// Hash of the transaction that emitted the event (the *record* tx, not the
    /// client's original transfer).
    pub tx_hash: TxHash,
}

// ── Write receipts / merchant state ──────────────────────────────────────────

/// Confirmation of a committed on-ledger write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: TxHash,
    pub block: BlockNumber,
}

/// Current on-ledger state of a merchant, as read from the credit contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MerchantState {
    pub stake: Amount,
    pub credit_limit: Amount,
    pub exposure: Amount,
    pub agent_id: AgentId,
    pub endpoint: String,
    pub active: bool,
}

// ── Wire DTOs ────────────────────────────────────────────────────────────────
//
// Atomic-unit amounts travel as decimal strings; everything else is plain JSON.

#[derive(Deserialize)]
pub(crate) struct TransferDto {
    pub tx_hash: String,
    pub from: String,
    pub to: String,
    pub amount: String,
    pub block: BlockNumber,
    #[serde(default)]
    pub log_index: u32,
    pub timestamp: Timestamp,
}

impl TransferDto {
    pub fn into_transfer(self) -> Result<Transfer, AegisError> {
        Ok(Transfer {
            tx_hash: TxHash::new(&self.tx_hash)?,
            from: Address::new(&self.from)?,
            to: Address::new(&self.to)?,
            amount: parse_amount(&self.amount)?,
            block: self.block,
            log_index: self.log_index,
            timestamp: self.timestamp,
        })
    }
}

#[derive(Deserialize)]
pub(crate) struct MerchantStateDto {
    pub stake: String,
    pub credit_limit: String,
    pub exposure: String,
    pub agent_id: String,
    pub endpoint: String,
    pub active: bool,
}

impl MerchantStateDto {
    pub fn into_state(self) -> Result<MerchantState, AegisError> {
        Ok(MerchantState {
            stake: parse_amount(&self.stake)?,
            credit_limit: parse_amount(&self.credit_limit)?,
            exposure: parse_amount(&self.exposure)?,
            agent_id: AgentId(self.agent_id),
            endpoint: self.endpoint,
            active: self.active,
        })
    }
}

#[derive(Deserialize)]
pub(crate) struct CreditEventDto {
    pub kind: String,
    pub merchant: String,
    #[serde(default)]
    pub client: Option<String>,
    pub amount: String,
    #[serde(default)]
    pub agent_id: Option<String>,
    pub block: BlockNumber,
    pub block_timestamp: Timestamp,
    pub tx_hash: String,
}

impl CreditEventDto {
    pub fn into_event(self) -> Result<CreditEvent, AegisError> {
        let kind = match self.kind.as_str() {
            "Subscribed" => CreditEventKind::Subscribed,
            "ExposureIncreased" => CreditEventKind::ExposureIncreased,
            "ExposureCleared" => CreditEventKind::ExposureCleared,
            "Slashed" => CreditEventKind::Slashed,
            other => {
                return Err(AegisError::Serialization(format!(
                    "unknown credit event kind: {other}"
                )))
            }
        };
        let client = match self.client {
            Some(c) => Some(Address::new(&c)?),
            None => None,
        };
        Ok(CreditEvent {
            kind,
            merchant: Address::new(&self.merchant)?,
            client,
            amount: parse_amount(&self.amount)?,
            agent_id: self.agent_id.map(AgentId),
            block: self.block,
            block_timestamp: self.block_timestamp,
            tx_hash: TxHash::new(&self.tx_hash)?,
        })
    }
}

#[derive(Deserialize)]
pub(crate) struct ReceiptDto {
    pub tx_hash: String,
    pub block: BlockNumber,
}

impl ReceiptDto {
    pub fn into_receipt(self) -> Result<Receipt, AegisError> {
        Ok(Receipt {
            tx_hash: TxHash::new(&self.tx_hash)?,
            block: self.block,
        })
    }
}

pub(crate) fn parse_amount(s: &str) -> Result<Amount, AegisError> {
    s.parse()
        .map_err(|_| AegisError::Serialization(format!("invalid amount: {s}")))
}
