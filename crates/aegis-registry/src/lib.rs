//! aegis-registry
//!
//! The clearinghouse's in-memory state: merchant table, payment table and the
//! skill index. Nothing here is persisted — the whole registry is rebuilt from
//! ledger history on start-up.
//!
//! All mutation goes through the clearing core's single-writer path; the locks
//! below exist so that Quote and the HTTP read endpoints can read concurrently.
//! Every mutator leaves the tables satisfying:
//!
//!   1. `exposure(m) = Σ amount over payments where merchant = m ∧ pending`
//!   2. `tx_hash` is unique across payments
//!   3. `m ∈ skill_index[s]` ⇔ `s ∈ merchants[m].skills ∧ merchants[m].active`
//!   4. terminal payment statuses are write-once
//!
//! A caller that would break 1, 2 or 4 is a programmer error (the core
//! validates before mutating) and aborts the process.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use aegis_core::merchant::{Merchant, Payment, PaymentStatus};
use aegis_core::types::{Address, Amount, Timestamp, TxHash};

/// In-memory merchant/payment registry. Address keys are lowercase by
/// construction ([`Address`] normalizes), so case-variant duplicates cannot
/// occur.
#[derive(Default)]
pub struct Registry {
    merchants: RwLock<HashMap<Address, Merchant>>,
    payments: RwLock<HashMap<TxHash, Payment>>,
    skill_index: RwLock<HashMap<String, HashSet<Address>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Merchants ────────────────────────────────────────────────────────────

    /// Insert or overwrite a merchant record and re-sync the skill index.
    ///
    /// Exposure is always recomputed from the payment table rather than taken
    /// from the argument, so a re-subscribe while payments are pending cannot
    /// desynchronize the exposure invariant.
    pub fn upsert_merchant(&self, mut merchant: Merchant) {
        merchant.exposure = self.pending_exposure(&merchant.address);

        let mut merchants = self.merchants.write().expect("registry lock poisoned");
        let mut index = self.skill_index.write().expect("registry lock poisoned");

        if let Some(old) = merchants.get(&merchant.address) {
            for skill in &old.skills {
                if let Some(set) = index.get_mut(skill) {
                    set.remove(&merchant.address);
                    if set.is_empty() {
                        index.remove(skill);
                    }
                }
            }
        }
        if merchant.active {
            for skill in &merchant.skills {
                index
                    .entry(skill.clone())
                    .or_default()
                    .insert(merchant.address.clone());
            }
        }
        merchants.insert(merchant.address.clone(), merchant);
    }

    pub fn merchant(&self, addr: &Address) -> Option<Merchant> {
        self.merchants
            .read()
            .expect("registry lock poisoned")
            .get(addr)
            .cloned()
    }

    pub fn merchants(&self) -> Vec<Merchant> {
        let mut all: Vec<Merchant> = self
            .merchants
            .read()
            .expect("registry lock poisoned")
            .values()
            .cloned()
            .collect();
        all.sort_by(|a, b| a.registered_at.cmp(&b.registered_at));
        all
    }

    pub fn merchant_count(&self) -> usize {
        self.merchants.read().expect("registry lock poisoned").len()
    }

    /// Active merchants offering `skill`, in stable (address) order.
    pub fn merchants_for_skill(&self, skill: &str) -> Vec<Address> {
        let index = self.skill_index.read().expect("registry lock poisoned");
        let mut addrs: Vec<Address> = index
            .get(skill)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        addrs.sort();
        addrs
    }

    // ── Payments ─────────────────────────────────────────────────────────────

    pub fn payment(&self, tx_hash: &TxHash) -> Option<Payment> {
        self.payments
            .read()
            .expect("registry lock poisoned")
            .get(tx_hash)
            .cloned()
    }

    pub fn contains_payment(&self, tx_hash: &TxHash) -> bool {
        self.payments
            .read()
            .expect("registry lock poisoned")
            .contains_key(tx_hash)
    }

    pub fn payment_count(&self) -> usize {
        self.payments.read().expect("registry lock poisoned").len()
    }

    /// Record a newly attributed pending payment and add its amount to the
    /// merchant's exposure. Returns `false` (and changes nothing) if the
    /// `tx_hash` is already known.
    pub fn apply_payment(&self, payment: Payment) -> bool {
        assert_eq!(
            payment.status,
            PaymentStatus::Pending,
            "new payments enter the registry pending"
        );

        let mut merchants = self.merchants.write().expect("registry lock poisoned");
        let mut payments = self.payments.write().expect("registry lock poisoned");

        if payments.contains_key(&payment.tx_hash) {
            return false;
        }
        let merchant = merchants
            .get_mut(&payment.merchant)
            .unwrap_or_else(|| panic!("payment for unregistered merchant {}", payment.merchant));
        merchant.exposure += payment.amount;
        payments.insert(payment.tx_hash.clone(), payment);
        true
    }

    /// Move a pending payment to `Settled` or `Expired` and release its
    /// exposure.
    pub fn finalize_payment(&self, tx_hash: &TxHash, status: PaymentStatus) {
        assert!(
            matches!(status, PaymentStatus::Settled | PaymentStatus::Expired),
            "finalize_payment only settles or expires; slashing decrements stake too"
        );
        self.complete(tx_hash, status, false);
    }

    /// Move a pending payment to `Slashed`: release exposure and burn the
    /// refunded amount out of the merchant's stake.
    pub fn apply_slash(&self, tx_hash: &TxHash) {
        self.complete(tx_hash, PaymentStatus::Slashed, true);
    }

    fn complete(&self, tx_hash: &TxHash, status: PaymentStatus, burn_stake: bool) {
        let mut merchants = self.merchants.write().expect("registry lock poisoned");
        let mut payments = self.payments.write().expect("registry lock poisoned");

        let payment = payments
            .get_mut(tx_hash)
            .unwrap_or_else(|| panic!("completing unknown payment {tx_hash}"));
        assert_eq!(
            payment.status,
            PaymentStatus::Pending,
            "payment {tx_hash} already terminal ({})",
            payment.status
        );
        let merchant = merchants
            .get_mut(&payment.merchant)
            .unwrap_or_else(|| panic!("payment for unregistered merchant {}", payment.merchant));
        merchant.exposure = merchant
            .exposure
            .checked_sub(payment.amount)
            .unwrap_or_else(|| panic!("exposure underflow for {}", payment.merchant));
        if burn_stake {
            merchant.stake = merchant
                .stake
                .checked_sub(payment.amount)
                .unwrap_or_else(|| panic!("stake underflow for {}", payment.merchant));
        }
        payment.status = status;
    }

    /// Pending payments whose deadline has passed at `now`, oldest deadline
    /// first.
    pub fn pending_due(&self, now: Timestamp) -> Vec<Payment> {
        let payments = self.payments.read().expect("registry lock poisoned");
        let mut due: Vec<Payment> = payments
            .values()
            .filter(|p| p.status == PaymentStatus::Pending && now >= p.deadline)
            .cloned()
            .collect();
        due.sort_by_key(|p| (p.deadline, p.tx_hash.clone()));
        due
    }

    /// Sum of pending amounts for `merchant` (the exposure invariant's RHS).
    fn pending_exposure(&self, merchant: &Address) -> Amount {
        self.payments
            .read()
            .expect("registry lock poisoned")
            .values()
            .filter(|p| &p.merchant == merchant && p.status == PaymentStatus::Pending)
            .map(|p| p.amount)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aegis_core::types::AgentId;
    use std::collections::BTreeSet;

    fn addr(n: u8) -> Address {
        Address::from_bytes(&[n; 20])
    }

    fn hash(n: u8) -> TxHash {
        TxHash::from_bytes(&[n; 32])
    }

    fn merchant(n: u8, skills: &[&str]) -> Merchant {
        Merchant {
            address: addr(n),
            agent_id: AgentId::unknown(),
            endpoint: format!("http://merchant-{n}.local"),
            skills: skills.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>(),
            stake: 100_000,
            credit_limit: 100_000,
            exposure: 0,
            active: true,
            registered_at: n as i64,
        }
    }

    fn payment(tx: u8, merchant: u8, amount: Amount) -> Payment {
        Payment {
            tx_hash: hash(tx),
            merchant: addr(merchant),
            client: addr(200),
            amount,
            deadline: 3_600,
            status: PaymentStatus::Pending,
            created_at: 0,
        }
    }

    #[test]
    fn skill_index_tracks_merchant_skills() {
        let reg = Registry::new();
        reg.upsert_merchant(merchant(1, &["translate", "ocr"]));
        assert_eq!(reg.merchants_for_skill("translate"), vec![addr(1)]);
        assert_eq!(reg.merchants_for_skill("ocr"), vec![addr(1)]);
        assert!(reg.merchants_for_skill("render").is_empty());

        // Re-subscribe with a different skill set: stale entries drop out.
        reg.upsert_merchant(merchant(1, &["render"]));
        assert!(reg.merchants_for_skill("translate").is_empty());
        assert_eq!(reg.merchants_for_skill("render"), vec![addr(1)]);
    }

    #[test]
    fn duplicate_payment_does_not_double_count() {
        let reg = Registry::new();
        reg.upsert_merchant(merchant(1, &["translate"]));
        assert!(reg.apply_payment(payment(1, 1, 10_000)));
        assert!(!reg.apply_payment(payment(1, 1, 10_000)));
        assert_eq!(reg.merchant(&addr(1)).unwrap().exposure, 10_000);
        assert_eq!(reg.payment_count(), 1);
    }

    #[test]
    fn settle_releases_exposure_and_keeps_stake() {
        let reg = Registry::new();
        reg.upsert_merchant(merchant(1, &["translate"]));
        reg.apply_payment(payment(1, 1, 10_000));
        reg.finalize_payment(&hash(1), PaymentStatus::Settled);

        let m = reg.merchant(&addr(1)).unwrap();
        assert_eq!(m.exposure, 0);
        assert_eq!(m.stake, 100_000);
        assert_eq!(reg.payment(&hash(1)).unwrap().status, PaymentStatus::Settled);
    }

    #[test]
    fn slash_burns_stake_with_exposure() {
        let reg = Registry::new();
        reg.upsert_merchant(merchant(1, &["translate"]));
        reg.apply_payment(payment(1, 1, 50_000));
        reg.apply_slash(&hash(1));

        let m = reg.merchant(&addr(1)).unwrap();
        assert_eq!(m.exposure, 0);
        assert_eq!(m.stake, 50_000);
        assert_eq!(reg.payment(&hash(1)).unwrap().status, PaymentStatus::Slashed);
    }

    #[test]
    fn upsert_preserves_pending_exposure() {
        let reg = Registry::new();
        reg.upsert_merchant(merchant(1, &["translate"]));
        reg.apply_payment(payment(1, 1, 25_000));

        // Overwrite (e.g. recovery rerun or re-subscribe) claims exposure = 0…
        reg.upsert_merchant(merchant(1, &["translate"]));
        // …but the table recomputes it from pending payments.
        assert_eq!(reg.merchant(&addr(1)).unwrap().exposure, 25_000);
    }

    #[test]
    fn pending_due_filters_by_deadline_and_status() {
        let reg = Registry::new();
        reg.upsert_merchant(merchant(1, &["translate"]));
        let mut early = payment(1, 1, 1_000);
        early.deadline = 100;
        let mut late = payment(2, 1, 2_000);
        late.deadline = 500;
        reg.apply_payment(early);
        reg.apply_payment(late);

        assert!(reg.pending_due(99).is_empty());
        assert_eq!(reg.pending_due(100).len(), 1);
        assert_eq!(reg.pending_due(500).len(), 2);

        reg.finalize_payment(&hash(1), PaymentStatus::Expired);
        assert_eq!(reg.pending_due(500).len(), 1);
    }

    #[test]
    #[should_panic(expected = "already terminal")]
    fn double_finalize_aborts() {
        let reg = Registry::new();
        reg.upsert_merchant(merchant(1, &["translate"]));
        reg.apply_payment(payment(1, 1, 10_000));
        reg.finalize_payment(&hash(1), PaymentStatus::Settled);
        reg.finalize_payment(&hash(1), PaymentStatus::Expired);
    }
}
