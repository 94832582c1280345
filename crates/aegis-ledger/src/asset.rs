use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use aegis_core::error::AegisError;
use aegis_core::types::{Address, Amount, BlockNumber};
use aegis_crypto::AgentKey;

use crate::client::RpcClient;
use crate::traits::LedgerView;
use crate::types::{parse_amount, Receipt, ReceiptDto, Transfer, TransferDto};

/// Concrete [`LedgerView`] over the value asset's RPC interface.
///
/// Reads are plain queries; `approve` is signed with the agent key the same way
/// credit-manager writes are (canonical JSON body + detached Ed25519 signature).
pub struct AssetAdapter {
    rpc: Arc<RpcClient>,
    asset: Address,
    agent: Arc<AgentKey>,
}

impl AssetAdapter {
    pub fn new(rpc: Arc<RpcClient>, asset: Address, agent: Arc<AgentKey>) -> Self {
        Self { rpc, asset, agent }
    }

    fn signed_params(&self, body: serde_json::Value) -> Result<serde_json::Value, AegisError> {
        let signature = self.agent.sign_body(&body)?;
        Ok(json!({
            "body": body,
            "public_key": self.agent.public_key_hex(),
            "signature": signature,
        }))
    }
}

#[async_trait]
impl LedgerView for AssetAdapter {
    async fn head_block(&self) -> Result<BlockNumber, AegisError> {
        let result = self.rpc.call("ledger_headBlock", json!([])).await?;
        result
            .as_u64()
            .ok_or_else(|| AegisError::Serialization("expected numeric head block".into()))
    }

    async fn transfers_in_range(
        &self,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<Transfer>, AegisError> {
        let result = self
            .rpc
            .call(
                "asset_transferLog",
                json!([self.asset.as_str(), from, to]),
            )
            .await?;
        let dtos: Vec<TransferDto> = serde_json::from_value(result)
            .map_err(|e| AegisError::Serialization(format!("transfer log: {e}")))?;
        let mut transfers = dtos
            .into_iter()
            .map(TransferDto::into_transfer)
            .collect::<Result<Vec<_>, _>>()?;
        // Block-then-log order is part of the watcher's delivery guarantee.
        transfers.sort_by_key(|t| (t.block, t.log_index));
        Ok(transfers)
    }

    async fn find_transfer(
        &self,
        to: &Address,
        amount: Amount,
        end_block: BlockNumber,
        lookback: u64,
    ) -> Result<Option<Transfer>, AegisError> {
        let start = end_block.saturating_sub(lookback);
        let transfers = self.transfers_in_range(start, end_block).await?;
        Ok(transfers
            .into_iter()
            .filter(|t| &t.to == to && t.amount == amount)
            .next_back())
    }

    async fn approve(&self, spender: &Address, amount: Amount) -> Result<Receipt, AegisError> {
        let body = json!({
            "method": "approve",
            "asset": self.asset.as_str(),
            "owner": self.agent.address().as_str(),
            "spender": spender.as_str(),
            "amount": amount.to_string(),
        });
        let result = self
            .rpc
            .call("asset_approve", self.signed_params(body)?)
            .await?;
        let dto: ReceiptDto = serde_json::from_value(result)
            .map_err(|e| AegisError::Serialization(format!("approve receipt: {e}")))?;
        dto.into_receipt()
    }

    async fn allowance(
        &self,
        owner: &Address,
        spender: &Address,
    ) -> Result<Amount, AegisError> {
        let result = self
            .rpc
            .call(
                "asset_allowance",
                json!([self.asset.as_str(), owner.as_str(), spender.as_str()]),
            )
            .await?;
        let s = result
            .as_str()
            .ok_or_else(|| AegisError::Serialization("expected string allowance".into()))?;
        parse_amount(s)
    }
}
