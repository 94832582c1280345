//! Start-up recovery: rebuild the registry from credit-contract history.
//!
//! The clearinghouse persists nothing, so a fresh process replays `Subscribed`
//! events to reseed merchants and `ExposureIncreased` events to reseed pending
//! payments, linking each back to its originating Transfer where the lookback
//! finds one. Every failure here is logged and skipped — partial recovery is
//! always preferable to refusing to start.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use aegis_core::constants::FIND_TRANSFER_LOOKBACK_BLOCKS;
use aegis_core::merchant::{Merchant, Payment, PaymentStatus};
use aegis_core::types::{Address, Amount, BlockNumber};
use aegis_ledger::CreditEventKind;

use crate::core::ClearingCore;

/// What a recovery run changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    pub merchants_loaded: usize,
    pub payments_loaded: usize,
}

impl ClearingCore {
    /// Rebuild the registry from ledger history starting at `start_block`.
    /// Idempotent: merchants and payments already present are left untouched.
    pub async fn recover(&self, start_block: BlockNumber) -> RecoveryReport {
        let mut report = RecoveryReport::default();

        let head = match self.ledger.head_block().await {
            Ok(h) => h,
            Err(e) => {
                warn!(error = %e, "recovery: head block unavailable; skipping");
                return report;
            }
        };

        self.recover_merchants(start_block, head, &mut report).await;
        self.recover_payments(start_block, head, &mut report).await;

        info!(
            merchants = report.merchants_loaded,
            payments = report.payments_loaded,
            head,
            "recovery complete"
        );
        report
    }

    async fn recover_merchants(
        &self,
        from: BlockNumber,
        to: BlockNumber,
        report: &mut RecoveryReport,
    ) {
        let subscribed = match self
            .credit
            .query_events(CreditEventKind::Subscribed, from, to)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "recovery: Subscribed query failed");
                return;
            }
        };

        let mut seen: HashSet<Address> = HashSet::new();
        for event in subscribed {
            if !seen.insert(event.merchant.clone()) {
                continue;
            }
            if self.registry.merchant(&event.merchant).is_some() {
                self.watch.insert(event.merchant.clone());
                continue;
            }
            let state = match self.credit.get_merchant(&event.merchant).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(merchant = %event.merchant, error = %e, "recovery: merchant read failed");
                    continue;
                }
            };
            if !state.active {
                debug!(merchant = %event.merchant, "recovery: merchant inactive; skipping");
                continue;
            }
            let skills = match self.credit.get_merchant_skills(&event.merchant).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(merchant = %event.merchant, error = %e, "recovery: skills read failed");
                    Vec::new()
                }
            };

            self.registry.upsert_merchant(Merchant {
                address: event.merchant.clone(),
                agent_id: state.agent_id,
                endpoint: state.endpoint,
                skills: skills.into_iter().collect(),
                stake: state.stake,
                credit_limit: state.credit_limit,
                exposure: 0,
                active: true,
                registered_at: event.block_timestamp,
            });
            self.watch.insert(event.merchant);
            report.merchants_loaded += 1;
        }
    }

    async fn recover_payments(
        &self,
        from: BlockNumber,
        to: BlockNumber,
        report: &mut RecoveryReport,
    ) {
        let increased = match self
            .credit
            .query_events(CreditEventKind::ExposureIncreased, from, to)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "recovery: ExposureIncreased query failed");
                return;
            }
        };

        // Per-(merchant, amount) count of exposure already released on-ledger.
        // A matching increase is consumed instead of reseeded, so a payment the
        // ledger shows cleared or slashed for that exact amount never comes
        // back pending.
        let mut released: HashMap<(Address, Amount), usize> = HashMap::new();
        for kind in [CreditEventKind::ExposureCleared, CreditEventKind::Slashed] {
            match self.credit.query_events(kind, from, to).await {
                Ok(events) => {
                    for event in events {
                        *released.entry((event.merchant, event.amount)).or_default() += 1;
                    }
                }
                Err(e) => warn!(%kind, error = %e, "recovery: release query failed"),
            }
        }

        for event in increased {
            if self.registry.merchant(&event.merchant).is_none() {
                debug!(merchant = %event.merchant, "recovery: exposure for unknown merchant");
                continue;
            }
            if let Some(count) = released.get_mut(&(event.merchant.clone(), event.amount)) {
                if *count > 0 {
                    *count -= 1;
                    debug!(
                        merchant = %event.merchant,
                        amount = event.amount,
                        "recovery: exposure already released"
                    );
                    continue;
                }
            }

            // Prefer keying by the originating Transfer — that is the hash
            // clients hold for Settle and Slash. The record-event hash with the
            // agent as client is the safe fallback.
            let (tx_hash, client, created_at) = match self
                .ledger
                .find_transfer(
                    &event.merchant,
                    event.amount,
                    event.block,
                    FIND_TRANSFER_LOOKBACK_BLOCKS,
                )
                .await
            {
                Ok(Some(t)) => (t.tx_hash, t.from, t.timestamp),
                Ok(None) => (
                    event.tx_hash.clone(),
                    self.config.agent_address.clone(),
                    event.block_timestamp,
                ),
                Err(e) => {
                    debug!(error = %e, "recovery: transfer lookback failed; using record hash");
                    (
                        event.tx_hash.clone(),
                        self.config.agent_address.clone(),
                        event.block_timestamp,
                    )
                }
            };

            if self.registry.contains_payment(&tx_hash) {
                continue;
            }
            let applied = self.registry.apply_payment(Payment {
                tx_hash,
                merchant: event.merchant,
                client,
                amount: event.amount,
                deadline: event.block_timestamp + self.config.default_deadline_secs,
                status: PaymentStatus::Pending,
                created_at,
            });
            if applied {
                report.payments_loaded += 1;
            }
        }
    }
}
