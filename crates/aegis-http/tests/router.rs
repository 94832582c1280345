//! HTTP surface tests: validation failures, the 402 payment gate, and the
//! read-only endpoints, exercised through the router with stub collaborators.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::util::ServiceExt;

use aegis_clearing::{spawn_writer, ClearingConfig, ClearingCore};
use aegis_core::error::AegisError;
use aegis_core::merchant::Merchant;
use aegis_core::types::{Address, AgentId, Amount, BlockNumber, TxHash};
use aegis_facilitator::{Facilitator, PaymentRequirements, SettleOutcome, VerifyOutcome};
use aegis_http::{router, App, GateConfig};
use aegis_ledger::{CreditEvent, CreditEventKind, CreditOps, LedgerView, MerchantState, Receipt, Transfer};
use aegis_registry::Registry;
use aegis_reputation::FixedReputation;
use aegis_watcher::WatchSet;

// ── Stub collaborators ───────────────────────────────────────────────────────
//
// These tests never reach the ledger: validation and the payment gate reject
// first, and the read endpoints touch only the registry.

struct NullLedger;

#[async_trait]
impl LedgerView for NullLedger {
    async fn head_block(&self) -> Result<BlockNumber, AegisError> {
        Err(AegisError::Ledger("unreachable in router tests".into()))
    }
    async fn transfers_in_range(
        &self,
        _from: BlockNumber,
        _to: BlockNumber,
    ) -> Result<Vec<Transfer>, AegisError> {
        Err(AegisError::Ledger("unreachable in router tests".into()))
    }
    async fn find_transfer(
        &self,
        _to: &Address,
        _amount: Amount,
        _end_block: BlockNumber,
        _lookback: u64,
    ) -> Result<Option<Transfer>, AegisError> {
        Err(AegisError::Ledger("unreachable in router tests".into()))
    }
    async fn approve(&self, _spender: &Address, _amount: Amount) -> Result<Receipt, AegisError> {
        Err(AegisError::Ledger("unreachable in router tests".into()))
    }
    async fn allowance(
        &self,
        _owner: &Address,
        _spender: &Address,
    ) -> Result<Amount, AegisError> {
        Err(AegisError::Ledger("unreachable in router tests".into()))
    }
}

struct NullCredit;

#[async_trait]
impl CreditOps for NullCredit {
    async fn get_merchant(&self, _addr: &Address) -> Result<MerchantState, AegisError> {
        Err(AegisError::Ledger("unreachable in router tests".into()))
    }
    async fn get_merchant_skills(&self, _addr: &Address) -> Result<Vec<String>, AegisError> {
        Err(AegisError::Ledger("unreachable in router tests".into()))
    }
    async fn subscribe_for(
        &self,
        _addr: &Address,
        _stake: Amount,
        _agent_id: &AgentId,
        _endpoint: &str,
        _skills: &[String],
    ) -> Result<Receipt, AegisError> {
        Err(AegisError::Ledger("unreachable in router tests".into()))
    }
    async fn set_credit_limit(
        &self,
        _addr: &Address,
        _limit: Amount,
    ) -> Result<Receipt, AegisError> {
        Err(AegisError::Ledger("unreachable in router tests".into()))
    }
    async fn record_payment(
        &self,
        _addr: &Address,
        _amount: Amount,
    ) -> Result<Receipt, AegisError> {
        Err(AegisError::Ledger("unreachable in router tests".into()))
    }
    async fn clear_exposure(
        &self,
        _addr: &Address,
        _amount: Amount,
    ) -> Result<Receipt, AegisError> {
        Err(AegisError::Ledger("unreachable in router tests".into()))
    }
    async fn slash(
        &self,
        _addr: &Address,
        _client: &Address,
        _amount: Amount,
    ) -> Result<Receipt, AegisError> {
        Err(AegisError::Ledger("unreachable in router tests".into()))
    }
    async fn query_events(
        &self,
        _kind: CreditEventKind,
        _from_block: BlockNumber,
        _to_block: BlockNumber,
    ) -> Result<Vec<CreditEvent>, AegisError> {
        Err(AegisError::Ledger("unreachable in router tests".into()))
    }
}

struct NullFacilitator;

#[async_trait]
impl Facilitator for NullFacilitator {
    async fn verify(
        &self,
        _payload: &serde_json::Value,
        _requirements: &PaymentRequirements,
    ) -> Result<VerifyOutcome, AegisError> {
        Err(AegisError::Facilitator("unreachable in router tests".into()))
    }
    async fn settle(
        &self,
        _payload: &serde_json::Value,
        _requirements: &PaymentRequirements,
    ) -> Result<SettleOutcome, AegisError> {
        Err(AegisError::Facilitator("unreachable in router tests".into()))
    }
}

fn addr(n: u8) -> Address {
    Address::from_bytes(&[n; 20])
}

fn test_app() -> (App, Arc<Registry>) {
    let registry = Arc::new(Registry::new());
    let core = Arc::new(ClearingCore::new(
        Arc::clone(&registry),
        Arc::new(NullLedger),
        Arc::new(NullCredit),
        Arc::new(FixedReputation::neutral()),
        WatchSet::new(),
        ClearingConfig {
            agent_address: addr(0xEE),
            credit_manager: addr(0xCC),
            default_deadline_secs: 3_600,
            settle_delay_ms: 0,
        },
    ));
    let clearing = spawn_writer(core, 16);
    let app = App {
        clearing,
        registry: Arc::clone(&registry),
        facilitator: Arc::new(NullFacilitator),
        gate: Arc::new(GateConfig {
            network: "testnet".to_string(),
            asset: addr(0xAA),
            agent_address: addr(0xEE),
            credit_manager: addr(0xCC),
            min_stake: 10_000_000,
            slash_bond: 1_000_000,
        }),
    };
    (app, registry)
}

async fn post_json(app: &App, path: &str, body: &str) -> (StatusCode, serde_json::Value) {
    let response = router(app.clone())
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}

async fn get_json(app: &App, path: &str) -> (StatusCode, serde_json::Value) {
    let response = router(app.clone())
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_reports_ok() {
    let (app, _) = test_app();
    let (status, json) = get_json(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["agent"], addr(0xEE).to_string());
    assert_eq!(json["credit_manager"], addr(0xCC).to_string());
}

#[tokio::test]
async fn quote_without_fields_is_rejected() {
    let (app, _) = test_app();
    let (status, json) = post_json(&app, "/quote", "{}").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "skill is required");

    let (status, json) = post_json(&app, "/quote", r#"{"skill":"x"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "price is required");
}

#[tokio::test]
async fn subscribe_without_payment_gets_402_with_stake_requirements() {
    let (app, _) = test_app();
    let body = r#"{"endpoint":"http://merchant.local","skills":["translate"]}"#;
    let (status, json) = post_json(&app, "/subscribe", body).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json["x402Version"], 1);
    let accepts = json["accepts"].as_array().unwrap();
    assert_eq!(accepts.len(), 1);
    assert_eq!(accepts[0]["scheme"], "exact");
    assert_eq!(accepts[0]["extra"]["purpose"], "stake");
    assert_eq!(accepts[0]["payTo"], addr(0xEE).to_string());
    assert_eq!(accepts[0]["maxAmountRequired"], "10000000");
}

#[tokio::test]
async fn subscribe_below_minimum_stake_is_rejected() {
    let (app, _) = test_app();
    let body = r#"{"endpoint":"http://merchant.local","skills":["translate"],"stake_amount":5}"#;
    let (status, json) = post_json(&app, "/subscribe", body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("below minimum"));
}

#[tokio::test]
async fn slash_without_bond_gets_402_with_bond_requirements() {
    let (app, _) = test_app();
    let tx = TxHash::from_bytes(&[1u8; 32]);
    let body = format!(r#"{{"tx_hash":"{tx}"}}"#);
    let (status, json) = post_json(&app, "/slash", &body).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(json["accepts"][0]["extra"]["purpose"], "slash_bond");
    assert_eq!(json["accepts"][0]["maxAmountRequired"], "1000000");
    assert_eq!(json["accepts"][0]["resource"], "/slash");
}

#[tokio::test]
async fn settle_of_unknown_payment_is_a_clean_400() {
    let (app, _) = test_app();
    let tx = TxHash::from_bytes(&[2u8; 32]);
    let body = format!(r#"{{"tx_hash":"{tx}"}}"#);
    let (status, json) = post_json(&app, "/settle", &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "Payment record not found");

    let (status, json) = post_json(&app, "/settle", r#"{"tx_hash":"nonsense"}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().contains("invalid tx hash"));
}

#[tokio::test]
async fn merchants_lists_registry_contents() {
    let (app, registry) = test_app();
    let (status, json) = get_json(&app, "/merchants").await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["merchants"].as_array().unwrap().is_empty());

    registry.upsert_merchant(Merchant {
        address: addr(1),
        agent_id: AgentId::unknown(),
        endpoint: "http://merchant.local".into(),
        skills: BTreeSet::from(["translate".to_string()]),
        stake: 100_000,
        credit_limit: 100_000,
        exposure: 0,
        active: true,
        registered_at: 7,
    });

    let (_, json) = get_json(&app, "/merchants").await;
    let merchants = json["merchants"].as_array().unwrap();
    assert_eq!(merchants.len(), 1);
    assert_eq!(merchants[0]["stake"], "100000");
    assert_eq!(merchants[0]["available_capacity"], "100000");
    assert_eq!(merchants[0]["skills"][0], "translate");
}
