use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use aegis_clearing::ClearingHandle;
use aegis_core::constants::GATE_TIMEOUT_SECS;
use aegis_core::types::{Address, Amount, GatedPurpose};
use aegis_facilitator::{Facilitator, PaymentRequirements};
use aegis_registry::Registry;

use crate::handlers;

/// Payment-gate parameters shared by every handler that issues 402 responses.
pub struct GateConfig {
    /// Network identifier advertised in payment requirements.
    pub network: String,
    /// Value asset contract address.
    pub asset: Address,
    /// The clearinghouse agent address payments are made to.
    pub agent_address: Address,
    /// Credit-manager contract address (reported by /health).
    pub credit_manager: Address,
    /// Minimum merchant stake in atomic units.
    pub min_stake: Amount,
    /// Anti-griefing bond for /slash in atomic units.
    pub slash_bond: Amount,
}

impl GateConfig {
    /// Requirements for a merchant stake deposit of `amount`.
    pub fn stake_requirements(&self, amount: Amount) -> PaymentRequirements {
        PaymentRequirements::new(
            GatedPurpose::Stake,
            &self.network,
            &self.asset,
            &self.agent_address,
            amount,
            "/subscribe",
            "Merchant stake deposit held as clearing collateral",
            GATE_TIMEOUT_SECS,
        )
    }

    /// Requirements for the client's slash bond.
    pub fn bond_requirements(&self) -> PaymentRequirements {
        PaymentRequirements::new(
            GatedPurpose::SlashBond,
            &self.network,
            &self.asset,
            &self.agent_address,
            self.slash_bond,
            "/slash",
            "Anti-griefing bond for invoking a slash",
            GATE_TIMEOUT_SECS,
        )
    }
}

/// Shared handler state, constructed once at start-up and cloned per request.
#[derive(Clone)]
pub struct App {
    pub clearing: ClearingHandle,
    pub registry: Arc<Registry>,
    pub facilitator: Arc<dyn Facilitator>,
    pub gate: Arc<GateConfig>,
}

/// Build the HTTP surface with permissive CORS.
pub fn router(app: App) -> Router {
    Router::new()
        .route("/subscribe", post(handlers::subscribe))
        .route("/quote", post(handlers::quote))
        .route("/settle", post(handlers::settle))
        .route("/slash", post(handlers::slash))
        .route("/health", get(handlers::health))
        .route("/merchants", get(handlers::merchants))
        .layer(
            CorsLayer::new()
                .allow_methods(Any)
                .allow_origin(Any)
                .allow_headers(Any),
        )
        .with_state(app)
}
