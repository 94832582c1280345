use async_trait::async_trait;

use aegis_core::error::AegisError;
use aegis_core::types::{Address, AgentId, Amount, BlockNumber};

use crate::types::{CreditEvent, CreditEventKind, MerchantState, Receipt, Transfer};

/// Read-mostly view of the value asset's ledger, plus the two token-level
/// writes the subscribe flow needs (approve + allowance check).
#[async_trait]
pub trait LedgerView: Send + Sync {
    /// Current head block height.
    async fn head_block(&self) -> Result<BlockNumber, AegisError>;

    /// All asset transfers in the inclusive block range `[from, to]`, in
    /// block-then-log order.
    async fn transfers_in_range(
        &self,
        from: BlockNumber,
        to: BlockNumber,
    ) -> Result<Vec<Transfer>, AegisError>;

    /// Latest transfer to `to` of exactly `amount` within
    /// `[end_block − lookback, end_block]`. Recovery-only historical search.
    async fn find_transfer(
        &self,
        to: &Address,
        amount: Amount,
        end_block: BlockNumber,
        lookback: u64,
    ) -> Result<Option<Transfer>, AegisError>;

    /// Approve `spender` to pull `amount` from the agent's account.
    async fn approve(&self, spender: &Address, amount: Amount) -> Result<Receipt, AegisError>;

    /// Current allowance granted by `owner` to `spender`.
    async fn allowance(&self, owner: &Address, spender: &Address)
        -> Result<Amount, AegisError>;
}

/// Read/write interface of the on-ledger credit-manager contract.
///
/// Writes return a receipt once committed; a rejected write (credit limit
/// exceeded, exposure underflow, stake underflow) surfaces as
/// [`AegisError::Ledger`] and is never retried by the adapter.
#[async_trait]
pub trait CreditOps: Send + Sync {
    async fn get_merchant(&self, addr: &Address) -> Result<MerchantState, AegisError>;

    async fn get_merchant_skills(&self, addr: &Address) -> Result<Vec<String>, AegisError>;

    /// Register `addr` with `stake` pulled from the caller's prior approval.
    /// Fails if the merchant is already active.
    async fn subscribe_for(
        &self,
        addr: &Address,
        stake: Amount,
        agent_id: &AgentId,
        endpoint: &str,
        skills: &[String],
    ) -> Result<Receipt, AegisError>;

    async fn set_credit_limit(&self, addr: &Address, limit: Amount)
        -> Result<Receipt, AegisError>;

    /// Record `amount` of new exposure. Fails if `exposure + amount` would
    /// exceed the merchant's credit limit.
    async fn record_payment(&self, addr: &Address, amount: Amount)
        -> Result<Receipt, AegisError>;

    /// Release `amount` of exposure. Fails if `amount > exposure`.
    async fn clear_exposure(&self, addr: &Address, amount: Amount)
        -> Result<Receipt, AegisError>;

    /// Burn `amount` of the merchant's stake and transfer it to `client`
    /// on-ledger. Fails if `amount` exceeds stake or exposure.
    async fn slash(
        &self,
        addr: &Address,
        client: &Address,
        amount: Amount,
    ) -> Result<Receipt, AegisError>;

    /// Historical events of `kind` in `[from_block, to_block]`, queried in
    /// fixed-size chunks. Chunk failures are logged and skipped; the call as a
    /// whole does not fail because of them.
    async fn query_events(
        &self,
        kind: CreditEventKind,
        from_block: BlockNumber,
        to_block: BlockNumber,
    ) -> Result<Vec<CreditEvent>, AegisError>;
}
