//! aegis-watcher
//!
//! Polling observer over the value asset's Transfer log. Holds the watch-set of
//! merchant addresses and forwards every transfer *to* a watched address into
//! the clearing core's channel.
//!
//! Delivery is at-least-once: the previous head only advances after a range is
//! processed successfully, so a failed poll replays the same range on the next
//! tick. The core deduplicates on `tx_hash`.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use aegis_core::types::{Address, BlockNumber};
use aegis_ledger::{LedgerView, Transfer};

// ── Watch-set ────────────────────────────────────────────────────────────────

/// Shared set of merchant addresses whose incoming transfers are observed.
/// The clearing core inserts on subscribe/recovery; the watcher reads per poll.
#[derive(Clone, Default)]
pub struct WatchSet(Arc<RwLock<HashSet<Address>>>);

impl WatchSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, addr: Address) {
        self.0.write().expect("watch-set lock poisoned").insert(addr);
    }

    pub fn contains(&self, addr: &Address) -> bool {
        self.0.read().expect("watch-set lock poisoned").contains(addr)
    }

    pub fn len(&self) -> usize {
        self.0.read().expect("watch-set lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Chain watcher ────────────────────────────────────────────────────────────

/// Polls the ledger head every `poll_interval` and emits watched transfers in
/// block-then-log order.
pub struct ChainWatcher {
    ledger: Arc<dyn LedgerView>,
    watch: WatchSet,
    sink: mpsc::Sender<Transfer>,
    poll_interval: Duration,
}

impl ChainWatcher {
    pub fn new(
        ledger: Arc<dyn LedgerView>,
        watch: WatchSet,
        sink: mpsc::Sender<Transfer>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            ledger,
            watch,
            sink,
            poll_interval,
        }
    }

    /// Run until the receiving side of the sink is dropped.
    pub async fn run(self) {
        let mut prev = self.initial_head().await;
        info!(head = prev, watched = self.watch.len(), "chain watcher started");

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.poll_once(prev).await {
                Ok(Some(new_head)) => prev = new_head,
                // Head unchanged: the same range is retried next tick.
                Ok(None) => {}
                Err(PollAbort) => return,
            }
        }
    }

    /// Wait (with the poll cadence) for the first successful head read so that
    /// transfers before start-up are never replayed as fresh payments.
    async fn initial_head(&self) -> BlockNumber {
        loop {
            match self.ledger.head_block().await {
                Ok(h) => return h,
                Err(e) => {
                    warn!(error = %e, "head block unavailable; retrying");
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        }
    }

    /// One poll: returns the new previous-head on success, `None` when the
    /// range should be retried, or `PollAbort` when the core is gone.
    async fn poll_once(&self, prev: BlockNumber) -> Result<Option<BlockNumber>, PollAbort> {
        let head = match self.ledger.head_block().await {
            Ok(h) => h,
            Err(e) => {
                debug!(error = %e, "head poll failed");
                return Ok(None);
            }
        };
        if head <= prev {
            return Ok(None);
        }

        let transfers = match self.ledger.transfers_in_range(prev + 1, head).await {
            Ok(t) => t,
            Err(e) => {
                debug!(from = prev + 1, to = head, error = %e, "transfer poll failed; range will be retried");
                return Ok(None);
            }
        };

        for transfer in transfers {
            if !self.watch.contains(&transfer.to) {
                continue;
            }
            debug!(
                tx_hash = %transfer.tx_hash,
                to = %transfer.to,
                amount = transfer.amount,
                "watched transfer"
            );
            if self.sink.send(transfer).await.is_err() {
                return Err(PollAbort);
            }
        }
        Ok(Some(head))
    }
}

/// The clearing core dropped its receiver; the watcher has nothing to feed.
struct PollAbort;

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::error::AegisError;
    use aegis_core::types::{Amount, TxHash};
    use aegis_ledger::Receipt;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Scripted ledger: a head height and transfer log that tests mutate, plus
    /// a failure switch and a record of queried ranges.
    #[derive(Default)]
    struct ScriptedLedger {
        head: Mutex<BlockNumber>,
        transfers: Mutex<Vec<Transfer>>,
        fail_next_range: Mutex<bool>,
        queried: Mutex<Vec<(BlockNumber, BlockNumber)>>,
    }

    #[async_trait]
    impl LedgerView for ScriptedLedger {
        async fn head_block(&self) -> Result<BlockNumber, AegisError> {
            Ok(*self.head.lock().unwrap())
        }

        async fn transfers_in_range(
            &self,
            from: BlockNumber,
            to: BlockNumber,
        ) -> Result<Vec<Transfer>, AegisError> {
            self.queried.lock().unwrap().push((from, to));
            if std::mem::take(&mut *self.fail_next_range.lock().unwrap()) {
                return Err(AegisError::Ledger("poll failure".into()));
            }
            Ok(self
                .transfers
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.block >= from && t.block <= to)
                .cloned()
                .collect())
        }

        async fn find_transfer(
            &self,
            _to: &Address,
            _amount: Amount,
            _end_block: BlockNumber,
            _lookback: u64,
        ) -> Result<Option<Transfer>, AegisError> {
            Ok(None)
        }

        async fn approve(
            &self,
            _spender: &Address,
            _amount: Amount,
        ) -> Result<Receipt, AegisError> {
            Err(AegisError::Ledger("not used".into()))
        }

        async fn allowance(
            &self,
            _owner: &Address,
            _spender: &Address,
        ) -> Result<Amount, AegisError> {
            Err(AegisError::Ledger("not used".into()))
        }
    }

    fn transfer(block: BlockNumber, to: Address, amount: Amount) -> Transfer {
        Transfer {
            tx_hash: TxHash::from_bytes(&[block as u8; 32]),
            from: Address::from_bytes(&[99u8; 20]),
            to,
            amount,
            block,
            log_index: 0,
            timestamp: block as i64 * 10,
        }
    }

    fn watcher_with(
        ledger: Arc<ScriptedLedger>,
        watch: WatchSet,
    ) -> (ChainWatcher, mpsc::Receiver<Transfer>) {
        let (tx, rx) = mpsc::channel(16);
        let w = ChainWatcher::new(ledger, watch, tx, Duration::from_millis(1));
        (w, rx)
    }

    /// Let the spawned watcher observe its start-up head before the test moves
    /// the chain forward.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn emits_only_watched_recipients() {
        let merchant = Address::from_bytes(&[1u8; 20]);
        let other = Address::from_bytes(&[2u8; 20]);
        let ledger = Arc::new(ScriptedLedger::default());
        *ledger.head.lock().unwrap() = 10;
        ledger.transfers.lock().unwrap().extend([
            transfer(12, merchant.clone(), 500),
            transfer(13, other, 700),
        ]);

        let watch = WatchSet::new();
        watch.insert(merchant.clone());
        let (w, mut rx) = watcher_with(Arc::clone(&ledger), watch);

        let _task = tokio::spawn(w.run());
        settle().await;
        *ledger.head.lock().unwrap() = 15;

        let got = rx.recv().await.expect("one transfer emitted");
        assert_eq!(got.to, merchant);
        assert_eq!(got.amount, 500);
        // Range starts strictly after the start-up head.
        let ranges = ledger.queried.lock().unwrap().clone();
        assert_eq!(ranges[0], (11, 15));
    }

    #[tokio::test]
    async fn failed_range_is_retried_with_same_start() {
        let merchant = Address::from_bytes(&[1u8; 20]);
        let ledger = Arc::new(ScriptedLedger::default());
        *ledger.head.lock().unwrap() = 20;
        ledger
            .transfers
            .lock()
            .unwrap()
            .push(transfer(25, merchant.clone(), 900));

        let watch = WatchSet::new();
        watch.insert(merchant);
        let (w, mut rx) = watcher_with(Arc::clone(&ledger), watch);

        let _task = tokio::spawn(w.run());
        settle().await;
        *ledger.fail_next_range.lock().unwrap() = true;
        *ledger.head.lock().unwrap() = 25;

        let got = rx.recv().await.expect("transfer after retry");
        assert_eq!(got.amount, 900);

        let ranges = ledger.queried.lock().unwrap().clone();
        // First attempt failed; the second covers the identical range.
        assert!(ranges.len() >= 2);
        assert_eq!(ranges[0], (21, 25));
        assert_eq!(ranges[1], (21, 25));
    }
}
