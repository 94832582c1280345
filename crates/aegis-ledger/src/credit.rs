use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use aegis_core::constants::EVENT_CHUNK_BLOCKS;
use aegis_core::error::AegisError;
use aegis_core::types::{Address, AgentId, Amount, BlockNumber};
use aegis_crypto::AgentKey;

use crate::client::RpcClient;
use crate::traits::CreditOps;
use crate::types::{
    CreditEvent, CreditEventDto, CreditEventKind, MerchantState, MerchantStateDto, Receipt,
    ReceiptDto,
};

/// Typed wrapper around the on-ledger credit-manager contract.
///
/// All writes are signed with the clearinghouse agent key; all writes happen on
/// the clearing core's single-writer path, so no request ordering is needed
/// here. Historical event queries are chunked: a failing chunk is split in half
/// and each half retried once before being skipped, so one bad range cannot
/// abort recovery.
pub struct CreditManagerAdapter {
    rpc: Arc<RpcClient>,
    contract: Address,
    agent: Arc<AgentKey>,
    chunk_blocks: u64,
}

impl CreditManagerAdapter {
    pub fn new(rpc: Arc<RpcClient>, contract: Address, agent: Arc<AgentKey>) -> Self {
        Self {
            rpc,
            contract,
            agent,
            chunk_blocks: EVENT_CHUNK_BLOCKS,
        }
    }

    pub fn contract(&self) -> &Address {
        &self.contract
    }

    fn signed_params(&self, body: serde_json::Value) -> Result<serde_json::Value, AegisError> {
        let signature = self.agent.sign_body(&body)?;
        Ok(json!({
            "body": body,
            "public_key": self.agent.public_key_hex(),
            "signature": signature,
        }))
    }

    async fn write(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<Receipt, AegisError> {
        let result = self.rpc.call(method, self.signed_params(body)?).await?;
        let dto: ReceiptDto = serde_json::from_value(result)
            .map_err(|e| AegisError::Serialization(format!("{method} receipt: {e}")))?;
        dto.into_receipt()
    }

    async fn events_chunk(
        &self,
        kind: CreditEventKind,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<CreditEvent>, AegisError> {
        let result = self
            .rpc
            .call(
                "credit_events",
                json!([self.contract.as_str(), kind.as_str(), from, to]),
            )
            .await?;
        let dtos: Vec<CreditEventDto> = serde_json::from_value(result)
            .map_err(|e| AegisError::Serialization(format!("{kind} events: {e}")))?;
        dtos.into_iter().map(CreditEventDto::into_event).collect()
    }
}

/// Inclusive `(from, to)` block ranges of at most `size` blocks covering
/// `[from, to]`.
pub fn chunk_ranges(
    from: BlockNumber,
    to: BlockNumber,
    size: u64,
) -> Vec<(BlockNumber, BlockNumber)> {
    assert!(size > 0, "chunk size must be positive");
    let mut ranges = Vec::new();
    let mut start = from;
    while start <= to {
        let end = start.saturating_add(size - 1).min(to);
        ranges.push((start, end));
        if end == BlockNumber::MAX {
            break;
        }
        start = end + 1;
    }
    ranges
}

#[async_trait]
impl CreditOps for CreditManagerAdapter {
    async fn get_merchant(&self, addr: &Address) -> Result<MerchantState, AegisError> {
        let result = self
            .rpc
            .call(
                "credit_getMerchant",
                json!([self.contract.as_str(), addr.as_str()]),
            )
            .await?;
        let dto: MerchantStateDto = serde_json::from_value(result)
            .map_err(|e| AegisError::Serialization(format!("merchant state: {e}")))?;
        dto.into_state()
    }

    async fn get_merchant_skills(&self, addr: &Address) -> Result<Vec<String>, AegisError> {
        let result = self
            .rpc
            .call(
                "credit_getMerchantSkills",
                json!([self.contract.as_str(), addr.as_str()]),
            )
            .await?;
        serde_json::from_value(result)
            .map_err(|e| AegisError::Serialization(format!("merchant skills: {e}")))
    }

    async fn subscribe_for(
        &self,
        addr: &Address,
        stake: Amount,
        agent_id: &AgentId,
        endpoint: &str,
        skills: &[String],
    ) -> Result<Receipt, AegisError> {
        self.write(
            "credit_subscribeFor",
            json!({
                "contract": self.contract.as_str(),
                "merchant": addr.as_str(),
                "stake": stake.to_string(),
                "agent_id": agent_id.as_str(),
                "endpoint": endpoint,
                "skills": skills,
            }),
        )
        .await
    }

    async fn set_credit_limit(
        &self,
        addr: &Address,
        limit: Amount,
    ) -> Result<Receipt, AegisError> {
        self.write(
            "credit_setCreditLimit",
            json!({
                "contract": self.contract.as_str(),
                "merchant": addr.as_str(),
                "limit": limit.to_string(),
            }),
        )
        .await
    }

    async fn record_payment(
        &self,
        addr: &Address,
        amount: Amount,
    ) -> Result<Receipt, AegisError> {
        self.write(
            "credit_recordPayment",
            json!({
                "contract": self.contract.as_str(),
                "merchant": addr.as_str(),
                "amount": amount.to_string(),
            }),
        )
        .await
    }

    async fn clear_exposure(
        &self,
        addr: &Address,
        amount: Amount,
    ) -> Result<Receipt, AegisError> {
        self.write(
            "credit_clearExposure",
            json!({
                "contract": self.contract.as_str(),
                "merchant": addr.as_str(),
                "amount": amount.to_string(),
            }),
        )
        .await
    }

    async fn slash(
        &self,
        addr: &Address,
        client: &Address,
        amount: Amount,
    ) -> Result<Receipt, AegisError> {
        self.write(
            "credit_slash",
            json!({
                "contract": self.contract.as_str(),
                "merchant": addr.as_str(),
                "client": client.as_str(),
                "amount": amount.to_string(),
            }),
        )
        .await
    }

    async fn query_events(
        &self,
        kind: CreditEventKind,
        from_block: BlockNumber,
        to_block: BlockNumber,
    ) -> Result<Vec<CreditEvent>, AegisError> {
        let mut events = Vec::new();
        for (start, end) in chunk_ranges(from_block, to_block, self.chunk_blocks) {
            match self.events_chunk(kind, start, end).await {
                Ok(mut chunk) => events.append(&mut chunk),
                Err(e) => {
                    warn!(%kind, start, end, error = %e, "event chunk failed; splitting");
                    let mid = start + (end - start) / 2;
                    for (lo, hi) in [(start, mid), (mid.saturating_add(1), end)] {
                        if lo > hi {
                            continue;
                        }
                        match self.events_chunk(kind, lo, hi).await {
                            Ok(mut chunk) => events.append(&mut chunk),
                            Err(e) => {
                                warn!(%kind, lo, hi, error = %e, "skipping event chunk")
                            }
                        }
                    }
                }
            }
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_chunk_when_range_fits() {
        assert_eq!(chunk_ranges(10, 20, 2_000), vec![(10, 20)]);
    }

    #[test]
    fn chunks_cover_range_without_overlap() {
        let ranges = chunk_ranges(0, 4_999, 2_000);
        assert_eq!(ranges, vec![(0, 1_999), (2_000, 3_999), (4_000, 4_999)]);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let ranges = chunk_ranges(100, 4_099, 2_000);
        assert_eq!(ranges, vec![(100, 2_099), (2_100, 4_099)]);
    }

    #[test]
    fn single_block_range() {
        assert_eq!(chunk_ranges(7, 7, 2_000), vec![(7, 7)]);
    }

    #[test]
    fn empty_when_from_exceeds_to() {
        assert!(chunk_ranges(10, 9, 2_000).is_empty());
    }
}
