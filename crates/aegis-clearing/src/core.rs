use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use aegis_core::error::AegisError;
use aegis_core::merchant::{Merchant, Payment, PaymentStatus};
use aegis_core::types::{
    amount_str, credit_limit_for, Address, AgentId, Amount, RepPermille, Timestamp, TxHash,
};
use aegis_ledger::{CreditOps, LedgerView, Transfer};
use aegis_registry::Registry;
use aegis_reputation::ReputationReader;
use aegis_watcher::WatchSet;

// ── Requests / responses ─────────────────────────────────────────────────────

/// Merchant-supplied subscription details (the verified stake payment and its
/// payer arrive separately from the HTTP boundary).
#[derive(Clone, Debug, Deserialize)]
pub struct SubscribeRequest {
    pub endpoint: String,
    pub skills: Vec<String>,
    pub agent_id: AgentId,
}

#[derive(Clone, Debug, Serialize)]
pub struct SubscribeResponse {
    pub success: bool,
    pub merchant: Address,
    #[serde(with = "amount_str")]
    pub stake: Amount,
    #[serde(with = "amount_str")]
    pub credit_limit: Amount,
    pub rep_permille: RepPermille,
    pub message: String,
}

/// One ranked discovery result.
#[derive(Clone, Debug, Serialize)]
pub struct QuoteEntry {
    pub address: Address,
    pub endpoint: String,
    #[serde(with = "amount_str")]
    pub available_capacity: Amount,
    pub rep_factor: f64,
    pub skills: Vec<String>,
}

#[derive(Clone, Debug, Serialize)]
pub struct SettleResponse {
    pub success: bool,
    pub merchant: Address,
    #[serde(with = "amount_str")]
    pub amount: Amount,
}

#[derive(Clone, Debug, Serialize)]
pub struct SlashResponse {
    pub success: bool,
    pub merchant: Address,
    pub client: Address,
    #[serde(with = "amount_str")]
    pub slashed_amount: Amount,
    pub refund_tx: TxHash,
}

// ── Core ─────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct ClearingConfig {
    /// The clearinghouse's own ledger address; transfers *from* it are stake
    /// forwarding, not client payments.
    pub agent_address: Address,
    /// Credit-manager contract address (the approve spender).
    pub credit_manager: Address,
    /// Delivery window added to a detected payment's timestamp.
    pub default_deadline_secs: i64,
    /// Settling delay between subscription confirmation and the credit-limit
    /// write.
    pub settle_delay_ms: u64,
}

/// The clearing state machine. All methods that mutate the registry are called
/// from the single writer task (see [`crate::command`]); [`Self::quote`] is
/// read-only and may run concurrently.
pub struct ClearingCore {
    pub(crate) registry: Arc<Registry>,
    pub(crate) ledger: Arc<dyn LedgerView>,
    pub(crate) credit: Arc<dyn CreditOps>,
    pub(crate) reputation: Arc<dyn ReputationReader>,
    pub(crate) watch: WatchSet,
    pub(crate) config: ClearingConfig,
}

impl ClearingCore {
    pub fn new(
        registry: Arc<Registry>,
        ledger: Arc<dyn LedgerView>,
        credit: Arc<dyn CreditOps>,
        reputation: Arc<dyn ReputationReader>,
        watch: WatchSet,
        config: ClearingConfig,
    ) -> Self {
        Self {
            registry,
            ledger,
            credit,
            reputation,
            watch,
            config,
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &ClearingConfig {
        &self.config
    }

    async fn rep_factor(
        &self,
        agent_id: &AgentId,
        addr: &Address,
    ) -> Result<RepPermille, AegisError> {
        if agent_id.is_unknown() {
            self.reputation.factor_by_address(addr).await
        } else {
            self.reputation.factor_by_id(agent_id).await
        }
    }

    // ── Subscribe ────────────────────────────────────────────────────────────

    /// Register a merchant whose stake payment has already been verified and
    /// settled to the clearinghouse account. Nothing is written to the registry
    /// until every on-ledger step has succeeded.
    pub async fn subscribe(
        &self,
        request: SubscribeRequest,
        merchant: Address,
        stake: Amount,
        now: Timestamp,
    ) -> Result<SubscribeResponse, AegisError> {
        let permille = self.rep_factor(&request.agent_id, &merchant).await?;
        let credit_limit = credit_limit_for(stake, permille);

        // Forward the stake: approve the credit contract to pull it, then
        // verify the allowance actually landed before subscribing.
        self.ledger
            .approve(&self.config.credit_manager, stake)
            .await?;
        let allowance = self
            .ledger
            .allowance(&self.config.agent_address, &self.config.credit_manager)
            .await?;
        if allowance < stake {
            return Err(AegisError::AllowanceTooLow {
                allowance,
                required: stake,
            });
        }

        let state = self.credit.get_merchant(&merchant).await?;
        if !state.active {
            self.credit
                .subscribe_for(
                    &merchant,
                    stake,
                    &request.agent_id,
                    &request.endpoint,
                    &request.skills,
                )
                .await?;
        }

        // Give the subscription a moment to settle before the limit write.
        if self.config.settle_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
        }
        self.credit.set_credit_limit(&merchant, credit_limit).await?;

        self.registry.upsert_merchant(Merchant {
            address: merchant.clone(),
            agent_id: request.agent_id,
            endpoint: request.endpoint,
            skills: request.skills.into_iter().collect(),
            stake,
            credit_limit,
            exposure: 0,
            active: true,
            registered_at: now,
        });
        self.watch.insert(merchant.clone());

        info!(%merchant, stake, credit_limit, permille, "merchant subscribed");
        Ok(SubscribeResponse {
            success: true,
            merchant,
            stake,
            credit_limit,
            rep_permille: permille,
            message: format!("Subscribed with repFactor {:.2}", permille as f64 / 1_000.0),
        })
    }

    // ── Quote ────────────────────────────────────────────────────────────────

    /// Rank active merchants offering `skill` whose fresh on-ledger capacity
    /// covers `price`. Per-merchant read failures drop that merchant; the call
    /// itself succeeds.
    pub async fn quote(&self, skill: &str, price: Amount) -> Result<Vec<QuoteEntry>, AegisError> {
        let mut entries = Vec::new();
        for addr in self.registry.merchants_for_skill(skill) {
            let Some(known) = self.registry.merchant(&addr) else {
                continue;
            };
            let state = match self.credit.get_merchant(&addr).await {
                Ok(s) => s,
                Err(e) => {
                    debug!(merchant = %addr, error = %e, "quote: merchant read failed");
                    continue;
                }
            };
            let capacity = state.credit_limit.saturating_sub(state.exposure);
            if capacity < price {
                continue;
            }
            let permille = match self.rep_factor(&known.agent_id, &addr).await {
                Ok(p) => p,
                Err(e) => {
                    debug!(merchant = %addr, error = %e, "quote: reputation read failed");
                    continue;
                }
            };
            entries.push(QuoteEntry {
                address: addr,
                endpoint: known.endpoint,
                available_capacity: capacity,
                rep_factor: permille as f64 / 1_000.0,
                skills: known.skills.into_iter().collect(),
            });
        }
        // capacity/price descending — price is constant across entries, so
        // capacity order is the ratio order. Stable sort keeps ties stable.
        entries.sort_by(|a, b| b.available_capacity.cmp(&a.available_capacity));
        Ok(entries)
    }

    // ── PaymentDetected ──────────────────────────────────────────────────────

    /// Attribute an observed transfer. Transfers that are self-initiated, to an
    /// unknown merchant, already known, or beyond the merchant's credit limit
    /// are dropped — the ledger transfer stands either way; the clearinghouse
    /// just refuses to carry the exposure.
    pub async fn payment_detected(&self, transfer: Transfer) {
        if transfer.from == self.config.agent_address {
            debug!(tx_hash = %transfer.tx_hash, "ignoring self-initiated transfer");
            return;
        }
        if self.registry.merchant(&transfer.to).is_none() {
            debug!(tx_hash = %transfer.tx_hash, to = %transfer.to, "transfer to unknown merchant");
            return;
        }
        if self.registry.contains_payment(&transfer.tx_hash) {
            debug!(tx_hash = %transfer.tx_hash, "duplicate transfer observation");
            return;
        }

        if let Err(e) = self
            .credit
            .record_payment(&transfer.to, transfer.amount)
            .await
        {
            warn!(
                tx_hash = %transfer.tx_hash,
                merchant = %transfer.to,
                amount = transfer.amount,
                error = %e,
                "payment exceeds merchant credit; not recording"
            );
            return;
        }

        let deadline = transfer.timestamp + self.config.default_deadline_secs;
        info!(
            tx_hash = %transfer.tx_hash,
            merchant = %transfer.to,
            client = %transfer.from,
            amount = transfer.amount,
            deadline,
            "payment recorded"
        );
        self.registry.apply_payment(Payment {
            tx_hash: transfer.tx_hash,
            merchant: transfer.to,
            client: transfer.from,
            amount: transfer.amount,
            deadline,
            status: PaymentStatus::Pending,
            created_at: transfer.timestamp,
        });
    }

    // ── Settle ───────────────────────────────────────────────────────────────

    /// Release a pending payment's exposure. Caller-agnostic: any party holding
    /// the tx hash may settle.
    pub async fn settle(&self, tx_hash: &TxHash) -> Result<SettleResponse, AegisError> {
        let payment = self
            .registry
            .payment(tx_hash)
            .ok_or(AegisError::PaymentNotFound)?;
        if payment.status.is_terminal() {
            return Err(AegisError::PaymentAlreadyTerminal(payment.status));
        }

        self.credit
            .clear_exposure(&payment.merchant, payment.amount)
            .await?;
        self.registry
            .finalize_payment(tx_hash, PaymentStatus::Settled);

        info!(%tx_hash, merchant = %payment.merchant, amount = payment.amount, "payment settled");
        Ok(SettleResponse {
            success: true,
            merchant: payment.merchant,
            amount: payment.amount,
        })
    }

    // ── Slash ────────────────────────────────────────────────────────────────

    /// Burn a defaulting merchant's stake back to the original client. Only the
    /// client that made (and bonded) the payment may slash, and only after the
    /// deadline.
    pub async fn slash(
        &self,
        tx_hash: &TxHash,
        client: &Address,
        now: Timestamp,
    ) -> Result<SlashResponse, AegisError> {
        let payment = self
            .registry
            .payment(tx_hash)
            .ok_or(AegisError::PaymentNotFound)?;
        if payment.status.is_terminal() {
            return Err(AegisError::PaymentAlreadyTerminal(payment.status));
        }
        if now < payment.deadline {
            return Err(AegisError::DeadlineNotPassed {
                remaining: payment.deadline - now,
            });
        }
        if &payment.client != client {
            return Err(AegisError::SlashNotByClient);
        }

        let receipt = self
            .credit
            .slash(&payment.merchant, client, payment.amount)
            .await?;
        self.registry.apply_slash(tx_hash);

        info!(
            %tx_hash,
            merchant = %payment.merchant,
            client = %client,
            amount = payment.amount,
            refund_tx = %receipt.tx_hash,
            "merchant slashed"
        );
        Ok(SlashResponse {
            success: true,
            merchant: payment.merchant,
            client: client.clone(),
            slashed_amount: payment.amount,
            refund_tx: receipt.tx_hash,
        })
    }

    // ── DeadlineTick ─────────────────────────────────────────────────────────

    /// Expire every pending payment past its deadline. A failed clear is left
    /// pending and retried on the next tick; a racing slash that lands first
    /// wins on-ledger and this side keeps the rejection.
    pub async fn deadline_tick(&self, now: Timestamp) -> usize {
        let mut expired = 0;
        for payment in self.registry.pending_due(now) {
            match self
                .credit
                .clear_exposure(&payment.merchant, payment.amount)
                .await
            {
                Ok(_) => {
                    self.registry
                        .finalize_payment(&payment.tx_hash, PaymentStatus::Expired);
                    info!(
                        tx_hash = %payment.tx_hash,
                        merchant = %payment.merchant,
                        amount = payment.amount,
                        "payment expired"
                    );
                    expired += 1;
                }
                Err(e) => {
                    warn!(
                        tx_hash = %payment.tx_hash,
                        merchant = %payment.merchant,
                        error = %e,
                        "expiry clear failed; will retry"
                    );
                }
            }
        }
        expired
    }
}
